//! Supervision events and the failure currency they carry.
//!
//! A message closure that fails, by returning `Err` or by unwinding,
//! terminates its actor's message loop and is wrapped into a
//! [`Signal::Panic`] for the actor's signal handler. Explicit
//! termination requests travel as [`Signal::Shutdown`].

use std::any::Any;
use thiserror::Error;

/// Boxed user-level failure, as raised by message closures, behavior
/// factories and signal handlers.
pub type Fault = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Supervision event delivered to an actor's signal handler.
///
/// The set is closed: any failure escaping a message closure arrives as
/// `Panic`, and every termination request arrives as `Shutdown`. There
/// are no other lifecycle events.
#[derive(Debug)]
pub enum Signal {
    /// A message closure (or the behavior factory) raised a failure.
    /// The original error is preserved and can be inspected with
    /// `downcast_ref`.
    Panic(Fault),

    /// Explicit termination request, either from the actor itself via
    /// `ActorContext::shutdown`, from a peer's signal handler, or from
    /// a terminating parent.
    Shutdown,
}

/// Carrier for panic payloads that were not `Error` values (plain
/// `panic!` messages, `assert!` failures and the like).
#[derive(Error, Debug)]
#[error("{0}")]
pub struct PanicPayload(String);

impl PanicPayload {
    pub fn message(&self) -> &str {
        &self.0
    }
}

/// Convert a caught unwind payload into the boxed failure currency.
///
/// Panic payloads are almost always `String` or `&str`; anything else is
/// reported opaquely.
pub(crate) fn fault_from_panic(payload: Box<dyn Any + Send>) -> Fault {
    let message = if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic".to_string()
    };
    Box::new(PanicPayload(message))
}
