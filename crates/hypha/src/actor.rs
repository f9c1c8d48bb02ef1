//! Actor handles and lifecycle state.
//!
//! An [`Actor<B>`] is a cheap, shareable handle to an actor whose
//! behavior type is `B`. The handle is all other parties ever touch:
//! posting through it only enqueues a closure, it never reaches the
//! behavior instance directly. The behavior itself is owned by the actor
//! task and is created (and on restart, re-created) from the attached
//! factory.

use crate::context::{ActorContext, HandlerContext, TaskOrigin};
use crate::error::{ActorError, Result};
use crate::mailbox::{Envelope, MailboxSender};
use crate::signal::{Fault, Signal};
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

/// Unique identifier for an actor instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActorId(u64);

impl ActorId {
    pub(crate) fn new() -> Self {
        Self(rand::random())
    }

    /// Get the underlying u64 value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Lifecycle state of an actor.
///
/// Progression is strictly monotone: `Created < Running < Shutdown`,
/// with no cycles. A reader that has observed `Running` will never
/// observe `Created` again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum State {
    Created,
    Running,
    Shutdown,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            State::Created => "created",
            State::Running => "running",
            State::Shutdown => "shutdown",
        };
        f.write_str(s)
    }
}

/// Atomic, monotone state cell.
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(State::Created as u8))
    }

    pub(crate) fn get(&self) -> State {
        match self.0.load(Ordering::Acquire) {
            0 => State::Created,
            1 => State::Running,
            _ => State::Shutdown,
        }
    }

    /// Transition `from -> to`; returns `false` if the cell was not in
    /// `from`. Transitions only ever move forward.
    pub(crate) fn advance(&self, from: State, to: State) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Poison-proof mutex access: these locks only ever guard plain data and
/// are never held across user code, so a poisoned lock carries no broken
/// invariant.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Factory producing a fresh behavior instance; invoked at spawn and on
/// every restart.
pub(crate) type BehaviorFactory<B> = Box<dyn Fn(ActorContext) -> B + Send>;

/// Installed signal handler.
pub(crate) type SignalHandler =
    Box<dyn FnMut(Signal, &HandlerContext) -> std::result::Result<(), Fault> + Send>;

pub(crate) struct ActorInner<B> {
    pub(crate) id: ActorId,
    pub(crate) name: String,
    pub(crate) owner: TaskOrigin,
    pub(crate) state: StateCell,
    pub(crate) factory: Mutex<Option<BehaviorFactory<B>>>,
    pub(crate) handler: Mutex<Option<SignalHandler>>,
    pub(crate) sender: Mutex<Option<MailboxSender<B>>>,
    pub(crate) control: Mutex<Option<mpsc::UnboundedSender<Signal>>>,
    pub(crate) children: Mutex<Vec<ActorHandle>>,
}

/// Object-safe view of an actor used wherever behavior types must mix:
/// the run list, child registries and the uncaught-failure hook.
pub(crate) trait ActorCell: Send + Sync {
    fn id(&self) -> ActorId;
    fn name(&self) -> &str;
    fn state(&self) -> State;
    fn behavior_type(&self) -> TypeId;
    fn behavior_type_name(&self) -> &'static str;
    fn has_behavior(&self) -> bool;
    /// Deliver an out-of-band supervision signal. Silently dropped if the
    /// actor is not running.
    fn push_signal(&self, signal: Signal);
    /// Record a child to be shut down when this actor terminates.
    fn adopt(&self, child: ActorHandle);
    /// Transition `Created -> Running` and launch the actor task.
    fn start(self: Arc<Self>, rt: crate::runtime::RuntimeHandle) -> Result<()>;
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// Type-erased actor handle.
///
/// Carries everything the runtime needs without knowing the behavior
/// type; recover the typed handle with [`ActorHandle::downcast`].
#[derive(Clone)]
pub struct ActorHandle {
    pub(crate) cell: Arc<dyn ActorCell>,
}

impl ActorHandle {
    pub fn id(&self) -> ActorId {
        self.cell.id()
    }

    pub fn name(&self) -> &str {
        self.cell.name()
    }

    pub fn state(&self) -> State {
        self.cell.state()
    }

    /// Recover the typed handle, if `B` is this actor's behavior type.
    pub fn downcast<B: Send + 'static>(&self) -> Option<Actor<B>> {
        if self.cell.behavior_type() != TypeId::of::<B>() {
            return None;
        }
        self.cell
            .clone()
            .as_any()
            .downcast::<ActorInner<B>>()
            .ok()
            .map(|inner| Actor { inner })
    }
}

impl fmt::Debug for ActorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorHandle")
            .field("id", &self.cell.id())
            .field("name", &self.cell.name())
            .field("state", &self.cell.state())
            .finish()
    }
}

/// Handle to an actor with behavior type `B`.
///
/// # Example
///
/// ```rust,ignore
/// struct Greeter {
///     ctx: ActorContext,
/// }
///
/// impl Greeter {
///     fn greet(&mut self, who: &str) -> Result<(), Fault> {
///         println!("hello {who}");
///         Ok(())
///     }
///
///     fn done(&mut self) -> Result<(), Fault> {
///         self.ctx.shutdown()?;
///         Ok(())
///     }
/// }
///
/// let greeter = Actor::new();
/// greeter.behavior(|ctx| Greeter { ctx })?;
/// hypha::run([greeter.handle()], |start| {
///     let greeter = greeter.clone();
///     async move {
///         start.post_to(&greeter, |g| g.greet("actors"))?;
///         start.post_to(&greeter, |g| g.done())?;
///         Ok(())
///     }
/// })
/// .await?;
/// ```
pub struct Actor<B> {
    pub(crate) inner: Arc<ActorInner<B>>,
}

impl<B> Clone for Actor<B> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<B: Send + 'static> Actor<B> {
    /// Create a fresh handle in the `Created` state, named after the
    /// behavior type.
    pub fn new() -> Self {
        Self::named(short_type_name(std::any::type_name::<B>()))
    }

    /// Create a fresh handle with an explicit name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(ActorInner {
                id: ActorId::new(),
                name: name.into(),
                owner: TaskOrigin::current(),
                state: StateCell::new(),
                factory: Mutex::new(None),
                handler: Mutex::new(None),
                sender: Mutex::new(None),
                control: Mutex::new(None),
                children: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Attach the behavior factory. Write-once; legal only while the
    /// actor is `Created` and only from the task that created the
    /// handle. Returns the handle again for fluent chaining.
    pub fn behavior<F>(&self, factory: F) -> Result<&Self>
    where
        F: Fn(ActorContext) -> B + Send + 'static,
    {
        self.check_configurable()?;
        let mut slot = lock(&self.inner.factory);
        if slot.is_some() {
            return Err(ActorError::BehaviorAlreadySet {
                name: self.inner.name.clone(),
            });
        }
        *slot = Some(Box::new(factory));
        Ok(self)
    }

    /// Attach the signal handler. Write-once, same restrictions as
    /// [`Actor::behavior`].
    pub fn on_signal<F>(&self, handler: F) -> Result<&Self>
    where
        F: FnMut(Signal, &HandlerContext) -> std::result::Result<(), Fault> + Send + 'static,
    {
        self.check_configurable()?;
        let mut slot = lock(&self.inner.handler);
        if slot.is_some() {
            return Err(ActorError::HandlerAlreadySet {
                name: self.inner.name.clone(),
            });
        }
        *slot = Some(Box::new(handler));
        Ok(self)
    }

    pub fn id(&self) -> ActorId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Current lifecycle state. Observable from any thread; observations
    /// are monotone.
    pub fn state(&self) -> State {
        self.inner.state.get()
    }

    /// Type-erased handle for heterogeneous actor lists.
    pub fn handle(&self) -> ActorHandle {
        ActorHandle {
            cell: self.inner.clone(),
        }
    }

    fn check_configurable(&self) -> Result<()> {
        if TaskOrigin::current() != self.inner.owner {
            return Err(ActorError::ForeignTask {
                name: self.inner.name.clone(),
            });
        }
        let state = self.inner.state.get();
        if state != State::Created {
            return Err(ActorError::WrongState {
                name: self.inner.name.clone(),
                expected: State::Created,
                actual: state,
            });
        }
        Ok(())
    }

    /// Enqueue a message, dropping it silently if the mailbox is gone.
    pub(crate) fn post(&self, envelope: Envelope<B>) {
        let sender = lock(&self.inner.sender).clone();
        let delivered = match sender {
            Some(sender) => sender.offer(envelope),
            None => false,
        };
        if !delivered {
            tracing::trace!("Dead letter for actor {} ({})", self.inner.name, self.inner.id);
        }
    }
}

impl<B: Send + 'static> Default for Actor<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B> fmt::Debug for Actor<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Actor")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("state", &self.inner.state.get())
            .finish()
    }
}

/// Last path segment of a type name, without generic arguments.
fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_names() {
        assert_eq!(short_type_name("alloc::vec::Vec<u32>"), "Vec");
        assert_eq!(short_type_name("my_crate::worker::Pool"), "Pool");
        assert_eq!(short_type_name("Plain"), "Plain");
    }

    #[test]
    fn state_cell_is_monotone() {
        let cell = StateCell::new();
        assert_eq!(cell.get(), State::Created);
        assert!(cell.advance(State::Created, State::Running));
        assert!(!cell.advance(State::Created, State::Running));
        assert!(cell.advance(State::Running, State::Shutdown));
        assert_eq!(cell.get(), State::Shutdown);
        assert!(State::Created < State::Running && State::Running < State::Shutdown);
    }

    #[test]
    fn fresh_actor_is_created_and_named_after_behavior() {
        struct Ticker;
        let actor: Actor<Ticker> = Actor::new();
        assert_eq!(actor.state(), State::Created);
        assert_eq!(actor.name(), "Ticker");
        assert_eq!(Actor::<Ticker>::named("ticks").name(), "ticks");
    }

    #[test]
    fn behavior_is_write_once() {
        struct Empty;
        let actor: Actor<Empty> = Actor::new();
        actor.behavior(|_| Empty).unwrap();
        assert!(matches!(
            actor.behavior(|_| Empty),
            Err(ActorError::BehaviorAlreadySet { .. })
        ));
    }

    #[test]
    fn handler_is_write_once() {
        struct Empty;
        let actor: Actor<Empty> = Actor::new();
        actor.on_signal(|_, _| Ok(())).unwrap();
        assert!(matches!(
            actor.on_signal(|_, _| Ok(())),
            Err(ActorError::HandlerAlreadySet { .. })
        ));
    }

    #[test]
    fn configuring_from_another_thread_is_rejected() {
        struct Empty;
        let actor: Actor<Empty> = Actor::new();
        let moved = actor.clone();
        let outcome = std::thread::spawn(move || moved.behavior(|_| Empty).map(|_| ()))
            .join()
            .unwrap();
        assert!(matches!(outcome, Err(ActorError::ForeignTask { .. })));
        assert!(lock(&actor.inner.factory).is_none());
    }

    #[test]
    fn downcast_checks_behavior_type() {
        struct A;
        struct B;
        let actor: Actor<A> = Actor::new();
        let handle = actor.handle();
        assert!(handle.downcast::<A>().is_some());
        assert!(handle.downcast::<B>().is_none());
    }
}
