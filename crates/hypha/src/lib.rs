//! Actor runtime with closure mailboxes on top of Tokio tasks.
//!
//! Each actor owns a private mailbox and a behavior instance, consumes
//! one message at a time, and talks to other actors only by posting
//! messages. Messages are not data records but deferred invocations:
//! the mailbox carries closures applied to whatever behavior instance
//! the actor currently holds. Failures escaping a closure become
//! supervision signals, and a signal handler may atomically replace the
//! failed actor's mailbox and behavior via restart.
//!
//! Operations are contexts, not globals: posting, spawning, shutdown and
//! restart are only reachable through capability objects bound to the
//! task that received them, so a context smuggled across tasks (or kept
//! past its lifetime) fails instead of corrupting an actor.
//!
//! # Example
//!
//! ```rust,ignore
//! use hypha::{Actor, ActorContext, Fault};
//!
//! struct Hello {
//!     ctx: ActorContext,
//! }
//!
//! impl Hello {
//!     fn say(&mut self, message: &str) -> Result<(), Fault> {
//!         println!("Hello {message}");
//!         Ok(())
//!     }
//!
//!     fn end(&mut self) -> Result<(), Fault> {
//!         self.ctx.shutdown()?;
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> hypha::Result<()> {
//!     let hello = Actor::new();
//!     hello.behavior(|ctx| Hello { ctx })?;
//!     hypha::run([hello.handle()], |start| {
//!         let hello = hello.clone();
//!         async move {
//!             start.post_to(&hello, |h| h.say("actors on tokio"))?;
//!             start.post_to(&hello, |h| h.end())?;
//!             Ok(())
//!         }
//!     })
//!     .await
//! }
//! ```

pub mod actor;
pub mod context;
pub mod error;
pub mod hooks;
pub mod signal;

mod mailbox;
mod runtime;
mod supervisor;

pub use actor::{Actor, ActorHandle, ActorId, State};
pub use context::{ActorContext, HandlerContext, StartContext};
pub use error::{ActorError, Result};
pub use hooks::{debug_mode, uncaught_exception_handler, MessageInfo};
pub use runtime::run;
pub use signal::{Fault, PanicPayload, Signal};
