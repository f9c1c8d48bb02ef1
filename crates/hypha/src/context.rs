//! Capability contexts.
//!
//! Operations on the runtime are never global: each is exposed through a
//! context bound to the task (or handler call) that received it. A
//! context is a small record carrying the identity of its owning task, a
//! back-reference to the runtime, and a live flag flipped when the
//! owning scope ends. Every operation re-validates both, so a context
//! smuggled to another task (or stashed past its lifetime) fails
//! instead of corrupting the actor it belonged to.

use crate::actor::{Actor, ActorCell, ActorHandle};
use crate::error::{ActorError, Result};
use crate::hooks;
use crate::runtime::{self, RuntimeHandle, RuntimeShared};
use crate::signal::{Fault, Signal};
use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Identity of the execution context a value was created on: a tokio
/// task where available, otherwise the bare OS thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TaskOrigin {
    Task(tokio::task::Id),
    Thread(std::thread::ThreadId),
}

impl TaskOrigin {
    pub(crate) fn current() -> Self {
        match tokio::task::try_id() {
            Some(id) => TaskOrigin::Task(id),
            None => TaskOrigin::Thread(std::thread::current().id()),
        }
    }
}

/// Shared plumbing of all three context kinds.
#[derive(Clone)]
pub(crate) struct ContextCore {
    origin: TaskOrigin,
    alive: Arc<AtomicBool>,
    rt: RuntimeHandle,
}

impl ContextCore {
    pub(crate) fn new(rt: RuntimeHandle) -> Self {
        Self {
            origin: TaskOrigin::current(),
            alive: Arc::new(AtomicBool::new(true)),
            rt,
        }
    }

    /// The live flag, kept by the owning scope so it can retire the
    /// context when it ends.
    pub(crate) fn alive_flag(&self) -> Arc<AtomicBool> {
        self.alive.clone()
    }

    pub(crate) fn retire(&self) {
        self.alive.store(false, Ordering::Release);
    }

    fn ensure_usable(&self) -> Result<()> {
        if !self.alive.load(Ordering::Acquire) {
            return Err(ActorError::ContextExpired);
        }
        if TaskOrigin::current() != self.origin {
            return Err(ActorError::ContextOutsideTask);
        }
        Ok(())
    }

    fn post_to<B, F>(&self, target: &Actor<B>, message: F) -> Result<()>
    where
        B: Send + 'static,
        F: FnOnce(&mut B) -> std::result::Result<(), Fault> + Send + 'static,
    {
        self.ensure_usable()?;
        hooks::inspect_message::<F>(target.name())?;
        target.post(Box::new(message));
        Ok(())
    }

    fn spawn<B: Send + 'static>(&self, actor: &Actor<B>) -> Result<()> {
        self.ensure_usable()?;
        RuntimeShared::launch(&self.rt, actor.handle())
    }
}

/// Capability object handed to the startup code of [`crate::run`].
///
/// Valid on the calling task for the duration of the startup future;
/// every operation afterwards fails with `ContextExpired`.
pub struct StartContext {
    core: ContextCore,
}

impl StartContext {
    pub(crate) fn new(rt: RuntimeHandle) -> Self {
        Self {
            core: ContextCore::new(rt),
        }
    }

    pub(crate) fn alive_flag(&self) -> Arc<AtomicBool> {
        self.core.alive_flag()
    }

    /// Enqueue a message on `target`'s mailbox. Never blocks; posting to
    /// an actor that is already shut down is a silent drop.
    pub fn post_to<B, F>(&self, target: &Actor<B>, message: F) -> Result<()>
    where
        B: Send + 'static,
        F: FnOnce(&mut B) -> std::result::Result<(), Fault> + Send + 'static,
    {
        self.core.post_to(target, message)
    }

    /// Spawn an additional actor into the running system. The actor must
    /// be `Created` and have a behavior attached.
    pub fn spawn<B: Send + 'static>(&self, actor: &Actor<B>) -> Result<()> {
        self.core.spawn(actor)
    }
}

/// Per-incarnation flags shared between an [`ActorContext`] and its
/// actor's message loop.
pub(crate) struct IncarnationFlags {
    shutdown: AtomicBool,
    interrupt: AtomicBool,
}

impl IncarnationFlags {
    pub(crate) fn new() -> Self {
        Self {
            shutdown: AtomicBool::new(false),
            interrupt: AtomicBool::new(false),
        }
    }

    pub(crate) fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    pub(crate) fn interrupted(&self) -> bool {
        self.interrupt.load(Ordering::Acquire)
    }
}

/// Capability object of a running actor.
///
/// Created on the actor task and passed to the behavior factory, which
/// typically stores it inside the behavior. A fresh context is issued on
/// every restart; the previous one is retired and refuses all further
/// operations.
#[derive(Clone)]
pub struct ActorContext {
    core: ContextCore,
    me: ActorHandle,
    flags: Arc<IncarnationFlags>,
}

impl ActorContext {
    pub(crate) fn new(rt: RuntimeHandle, me: ActorHandle, flags: Arc<IncarnationFlags>) -> Self {
        Self {
            core: ContextCore::new(rt),
            me,
            flags,
        }
    }

    pub(crate) fn retire(&self) {
        self.core.retire();
    }

    /// The context of the actor running on the current task, if any.
    pub fn current() -> Result<ActorContext> {
        runtime::current_context().ok_or(ActorError::NoCurrentActor)
    }

    /// Handle of the actor running this task, checked against the
    /// behavior type the caller expects.
    ///
    /// A mismatch is an API-misuse failure; behaviors normally surface
    /// it with `?`, which routes it through the panic path to the signal
    /// handler.
    pub fn current_actor<B: Send + 'static>(&self) -> Result<Actor<B>> {
        self.core.ensure_usable()?;
        self.me
            .downcast::<B>()
            .ok_or_else(|| ActorError::BehaviorMismatch {
                name: self.me.name().to_string(),
                actual: self.me.cell.behavior_type_name(),
                requested: std::any::type_name::<B>(),
            })
    }

    /// Annotate a failure the caller is about to raise.
    ///
    /// The supervision path derives the panic signal from whatever
    /// failure escapes the closure, so this is written
    /// `return Err(ctx.panic(fault))`. On a retired or foreign context
    /// the misuse error is returned instead of the annotated fault.
    pub fn panic(&self, fault: impl Into<Fault>) -> Fault {
        if let Err(misuse) = self.core.ensure_usable() {
            return misuse.into();
        }
        let fault = fault.into();
        tracing::trace!("Actor {} raising panic: {}", self.me.name(), fault);
        fault
    }

    /// Enqueue a message on `target`'s mailbox. Never blocks; posting to
    /// an actor that is already shut down is a silent drop.
    pub fn post_to<B, F>(&self, target: &Actor<B>, message: F) -> Result<()>
    where
        B: Send + 'static,
        F: FnOnce(&mut B) -> std::result::Result<(), Fault> + Send + 'static,
    {
        self.core.post_to(target, message)
    }

    /// Spawn `actor` as a child of the current actor: when this actor
    /// terminates, the child is asked to shut down as well.
    pub fn spawn<B: Send + 'static>(&self, actor: &Actor<B>) -> Result<()> {
        self.core.spawn(actor)?;
        self.me.cell.adopt(actor.handle());
        Ok(())
    }

    /// Request shutdown after the currently executing message.
    ///
    /// Takes effect when the closure returns; posts made before or after
    /// this call within the same closure are still enqueued.
    pub fn shutdown(&self) -> Result<()> {
        self.core.ensure_usable()?;
        self.flags.shutdown.store(true, Ordering::Release);
        Ok(())
    }

    /// Self-interrupt: after the currently executing message returns,
    /// the actor enters supervision with a panic signal carrying
    /// [`ActorError::Interrupted`].
    pub fn interrupt(&self) -> Result<()> {
        self.core.ensure_usable()?;
        self.flags.interrupt.store(true, Ordering::Release);
        Ok(())
    }
}

/// Capability object of a single signal-handler invocation.
pub struct HandlerContext {
    core: ContextCore,
    restart: Cell<bool>,
}

impl HandlerContext {
    pub(crate) fn new(rt: RuntimeHandle) -> Self {
        Self {
            core: ContextCore::new(rt),
            restart: Cell::new(false),
        }
    }

    pub(crate) fn retire(&self) {
        self.core.retire();
    }

    pub(crate) fn restart_requested(&self) -> bool {
        self.restart.get()
    }

    /// Enqueue a message on `target`'s mailbox.
    pub fn post_to<B, F>(&self, target: &Actor<B>, message: F) -> Result<()>
    where
        B: Send + 'static,
        F: FnOnce(&mut B) -> std::result::Result<(), Fault> + Send + 'static,
    {
        self.core.post_to(target, message)
    }

    /// Ask the runtime to restart the failed actor: fresh mailbox, fresh
    /// behavior from the factory, state stays `Running`.
    pub fn restart(&self) -> Result<()> {
        self.core.ensure_usable()?;
        self.restart.set(true);
        Ok(())
    }

    /// Deliver a supervision signal to another actor, letting a dying
    /// actor's supervisor propagate termination (or a panic) to a peer.
    pub fn signal<B: Send + 'static>(&self, target: &Actor<B>, signal: Signal) -> Result<()> {
        self.core.ensure_usable()?;
        target.inner.push_signal(signal);
        Ok(())
    }
}
