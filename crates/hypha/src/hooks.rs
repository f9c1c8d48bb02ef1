//! Process-wide configuration hooks.
//!
//! The runtime exposes exactly two process-level knobs, both write-once:
//! a handler for failures that have nowhere else to go, and an optional
//! debug-mode policy inspecting messages as they are enqueued. Neither
//! is required; defaults are structured log lines and no inspection.

use crate::actor::ActorHandle;
use crate::error::{ActorError, Result};
use crate::signal::Fault;
use std::sync::OnceLock;

type UncaughtHook = Box<dyn Fn(&ActorHandle, &(dyn std::error::Error + Send + Sync)) + Send + Sync>;

static UNCAUGHT: OnceLock<UncaughtHook> = OnceLock::new();

/// Install the process-wide uncaught-failure handler.
///
/// Invoked from supervision paths that cannot deliver a failure anywhere
/// else: a panic in an actor with no signal handler, or a failure raised
/// by a signal handler itself. Write-once; a second installation fails
/// with [`ActorError::HookAlreadyInstalled`].
pub fn uncaught_exception_handler<F>(hook: F) -> Result<()>
where
    F: Fn(&ActorHandle, &(dyn std::error::Error + Send + Sync)) + Send + Sync + 'static,
{
    UNCAUGHT
        .set(Box::new(hook))
        .map_err(|_| ActorError::HookAlreadyInstalled)
}

/// Route a failure with no other destination. Falls back to an error log
/// line when no hook is installed.
pub(crate) fn report_uncaught(actor: &ActorHandle, fault: &Fault) {
    match UNCAUGHT.get() {
        Some(hook) => hook(actor, fault.as_ref()),
        None => tracing::error!("Uncaught failure in actor {}: {}", actor.name(), fault),
    }
}

/// What the debug-mode policy gets to see about a message about to be
/// enqueued.
///
/// Rust closures are opaque at runtime, so the inspection surface is
/// what the language can tell us statically: the closure's type name and
/// the size of its captured state. A message capturing nothing has size
/// zero; a policy can therefore insist that messages carry only handles
/// and small copied values.
#[derive(Debug)]
pub struct MessageInfo<'a> {
    /// Name of the receiving actor.
    pub actor: &'a str,
    /// Type name of the message closure.
    pub type_name: &'static str,
    /// Size in bytes of the closure's captured state.
    pub size: usize,
}

type MessagePolicy = Box<dyn for<'a> Fn(&MessageInfo<'a>) -> bool + Send + Sync>;

static POLICY: OnceLock<MessagePolicy> = OnceLock::new();

/// Enable debug mode with a pluggable message policy.
///
/// While installed, every `post_to` runs the policy over the outgoing
/// closure and fails the post with [`ActorError::MessageRejected`] when
/// the policy returns `false`. Disabled by default; production posts are
/// never inspected. Write-once.
pub fn debug_mode<F>(policy: F) -> Result<()>
where
    F: for<'a> Fn(&MessageInfo<'a>) -> bool + Send + Sync + 'static,
{
    POLICY
        .set(Box::new(policy))
        .map_err(|_| ActorError::HookAlreadyInstalled)
}

/// Run the debug policy (if any) over a message of closure type `F`
/// bound for `actor`.
pub(crate) fn inspect_message<F>(actor: &str) -> Result<()> {
    if let Some(policy) = POLICY.get() {
        let info = MessageInfo {
            actor,
            type_name: std::any::type_name::<F>(),
            size: std::mem::size_of::<F>(),
        };
        if !policy(&info) {
            return Err(ActorError::MessageRejected(format!(
                "{} ({} captured bytes)",
                info.type_name, info.size
            )));
        }
        tracing::trace!(
            "Message {} ({} bytes) accepted for actor {}",
            info.type_name,
            info.size,
            info.actor
        );
    }
    Ok(())
}
