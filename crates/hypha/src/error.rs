use crate::actor::State;
use thiserror::Error;

/// Synchronous API-misuse failures.
///
/// Every variant is raised to the offending caller; none of these travel
/// through mailboxes or signals. User-level failures inside message
/// closures are a different currency (see [`crate::Fault`]).
#[derive(Error, Debug)]
pub enum ActorError {
    #[error("actor '{name}' is {actual}, operation requires {expected}")]
    WrongState {
        name: String,
        expected: State,
        actual: State,
    },

    #[error("actor '{name}' may only be configured by the task that created it")]
    ForeignTask { name: String },

    #[error("context invoked from outside its owning task")]
    ContextOutsideTask,

    #[error("context used after its owning scope ended")]
    ContextExpired,

    #[error("actor '{name}' has no behavior attached")]
    MissingBehavior { name: String },

    #[error("actor '{name}' already has a behavior attached")]
    BehaviorAlreadySet { name: String },

    #[error("actor '{name}' already has a signal handler attached")]
    HandlerAlreadySet { name: String },

    #[error("actor '{name}' was already spawned")]
    AlreadySpawned { name: String },

    #[error("behavior type mismatch: actor '{name}' runs {actual}, caller asked for {requested}")]
    BehaviorMismatch {
        name: String,
        actual: &'static str,
        requested: &'static str,
    },

    #[error("no actor is running on the current task")]
    NoCurrentActor,

    #[error("run() may not be called from inside an actor task")]
    NestedRun,

    #[error("actor task interrupted")]
    Interrupted,

    #[error("process-wide hook is already installed")]
    HookAlreadyInstalled,

    #[error("message rejected by debug policy: {0}")]
    MessageRejected(String),
}

pub type Result<T> = std::result::Result<T, ActorError>;
