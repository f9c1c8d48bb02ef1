//! Runtime entry and the per-actor task loop.
//!
//! Each actor runs as one tokio task looping over its mailbox, so many
//! actors execute in parallel on the carrier pool while any single
//! actor's messages stay totally ordered. [`run`] spawns the supplied
//! actors, drives the startup code, and then waits for quiescence:
//! every actor, supplied or transitively spawned, in `Shutdown`.

use crate::actor::{
    lock, ActorCell, ActorHandle, ActorId, ActorInner, BehaviorFactory, SignalHandler, State,
};
use crate::context::{ActorContext, IncarnationFlags, StartContext};
use crate::error::{ActorError, Result};
use crate::mailbox::{self, Mailbox};
use crate::signal::{fault_from_panic, Signal};
use crate::supervisor::{self, Verdict};
use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

tokio::task_local! {
    /// Context of the actor currently executing on this task, if any.
    static CURRENT_CONTEXT: RefCell<Option<ActorContext>>;
}

/// Context of the actor running on the current task.
pub(crate) fn current_context() -> Option<ActorContext> {
    CURRENT_CONTEXT
        .try_with(|current| current.borrow().clone())
        .ok()
        .flatten()
}

fn in_actor_task() -> bool {
    CURRENT_CONTEXT.try_with(|_| ()).is_ok()
}

/// State shared by one `run` invocation: the task registry awaited for
/// quiescence, the handles of every spawned actor, and the cancellation
/// channel actors watch while blocked on their mailboxes.
pub(crate) struct RuntimeShared {
    tasks: Mutex<Vec<JoinHandle<()>>>,
    actors: Mutex<Vec<ActorHandle>>,
    cancel: watch::Sender<bool>,
}

pub(crate) type RuntimeHandle = Arc<RuntimeShared>;

impl RuntimeShared {
    pub(crate) fn new() -> RuntimeHandle {
        let (cancel, _) = watch::channel(false);
        Arc::new(RuntimeShared {
            tasks: Mutex::new(Vec::new()),
            actors: Mutex::new(Vec::new()),
            cancel,
        })
    }

    /// Spawn an actor into this runtime. The actor must be `Created`
    /// with a behavior attached; spawning twice fails.
    pub(crate) fn launch(rt: &RuntimeHandle, handle: ActorHandle) -> Result<()> {
        ensure_spawnable(&handle)?;
        handle.cell.clone().start(rt.clone())?;
        lock(&rt.actors).push(handle);
        Ok(())
    }

    fn next_task(&self) -> Option<JoinHandle<()>> {
        lock(&self.tasks).pop()
    }

    fn broadcast_shutdown(&self) {
        let actors: Vec<ActorHandle> = lock(&self.actors).clone();
        for actor in actors {
            actor.cell.push_signal(Signal::Shutdown);
        }
    }
}

/// Spawn precondition: `Created`, with a behavior attached. The state
/// check comes first so a second spawn reports `AlreadySpawned` rather
/// than the factory having been consumed by the first one.
fn ensure_spawnable(handle: &ActorHandle) -> Result<()> {
    let state = handle.state();
    if state != State::Created {
        return Err(match state {
            State::Running => ActorError::AlreadySpawned {
                name: handle.name().to_string(),
            },
            _ => ActorError::WrongState {
                name: handle.name().to_string(),
                expected: State::Created,
                actual: state,
            },
        });
    }
    if !handle.cell.has_behavior() {
        return Err(ActorError::MissingBehavior {
            name: handle.name().to_string(),
        });
    }
    Ok(())
}

/// Fires cancellation if `run` is dropped before reaching quiescence, so
/// detached actor tasks observe the interruption at their next dequeue
/// and wind down instead of lingering forever.
struct CancelOnDrop {
    rt: RuntimeHandle,
    armed: bool,
}

impl CancelOnDrop {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if self.armed {
            let _ = self.rt.cancel.send(true);
        }
    }
}

/// Spawn `actors`, execute `startup` with a [`StartContext`], and wait
/// until every actor in the system has shut down.
///
/// Panics inside actors never make `run` fail; they are supervision
/// events. The returned error is either an upfront validation failure
/// (an actor without behavior, a nested `run`) or the error of the
/// startup future; in both cases the actors already spawned are asked
/// to shut down and are awaited before returning.
///
/// # Example
///
/// ```rust,ignore
/// let worker = Actor::new();
/// worker.behavior(|ctx| Worker { ctx })?;
/// hypha::run([worker.handle()], |start| {
///     let worker = worker.clone();
///     async move {
///         start.post_to(&worker, |w| w.process(42))?;
///         start.post_to(&worker, |w| w.stop())?;
///         Ok(())
///     }
/// })
/// .await?;
/// assert_eq!(worker.state(), State::Shutdown);
/// ```
pub async fn run<I, F, Fut>(actors: I, startup: F) -> Result<()>
where
    I: IntoIterator<Item = ActorHandle>,
    F: FnOnce(StartContext) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    if in_actor_task() {
        return Err(ActorError::NestedRun);
    }

    let actors: Vec<ActorHandle> = actors.into_iter().collect();
    for actor in &actors {
        ensure_spawnable(actor)?;
    }

    let rt = RuntimeShared::new();
    let guard = CancelOnDrop {
        rt: rt.clone(),
        armed: true,
    };

    let mut outcome = Ok(());
    for actor in actors {
        if let Err(err) = RuntimeShared::launch(&rt, actor) {
            outcome = Err(err);
            break;
        }
    }

    if outcome.is_ok() {
        let start = StartContext::new(rt.clone());
        let alive = start.alive_flag();
        outcome = startup(start).await;
        alive.store(false, Ordering::Release);
    }

    if outcome.is_err() {
        rt.broadcast_shutdown();
    }

    // Quiescence: actors spawned while draining register their task
    // before the spawning closure returns, so the list cannot go empty
    // while live actors remain.
    while let Some(task) = rt.next_task() {
        if let Err(err) = task.await {
            tracing::error!("Actor task failed to join: {}", err);
        }
    }

    guard.disarm();
    outcome
}

impl<B: Send + 'static> ActorCell for ActorInner<B> {
    fn id(&self) -> ActorId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> State {
        self.state.get()
    }

    fn behavior_type(&self) -> TypeId {
        TypeId::of::<B>()
    }

    fn behavior_type_name(&self) -> &'static str {
        std::any::type_name::<B>()
    }

    fn has_behavior(&self) -> bool {
        lock(&self.factory).is_some()
    }

    fn push_signal(&self, signal: Signal) {
        let control = lock(&self.control).clone();
        let delivered = match control {
            Some(tx) => tx.send(signal).is_ok(),
            None => false,
        };
        if !delivered {
            tracing::trace!("Signal dropped for actor {} ({})", self.name, self.id);
        }
    }

    fn adopt(&self, child: ActorHandle) {
        lock(&self.children).push(child);
    }

    fn start(self: Arc<Self>, rt: RuntimeHandle) -> Result<()> {
        if !self.state.advance(State::Created, State::Running) {
            let actual = self.state.get();
            return Err(match actual {
                State::Running => ActorError::AlreadySpawned {
                    name: self.name.clone(),
                },
                _ => ActorError::WrongState {
                    name: self.name.clone(),
                    expected: State::Created,
                    actual,
                },
            });
        }

        let factory = lock(&self.factory)
            .take()
            .ok_or_else(|| ActorError::MissingBehavior {
                name: self.name.clone(),
            })?;
        let handler = lock(&self.handler).take();

        let (tx, inbox) = mailbox::mailbox();
        *lock(&self.sender) = Some(tx);
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        *lock(&self.control) = Some(control_tx);
        let cancel_rx = rt.cancel.subscribe();

        let task = tokio::spawn(CURRENT_CONTEXT.scope(
            RefCell::new(None),
            actor_task(self, rt.clone(), factory, handler, inbox, control_rx, cancel_rx),
        ));
        lock(&rt.tasks).push(task);
        Ok(())
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// The actor task: one incarnation per behavior instance, re-entered on
/// restart with a fresh mailbox and context.
async fn actor_task<B: Send + 'static>(
    inner: Arc<ActorInner<B>>,
    rt: RuntimeHandle,
    factory: BehaviorFactory<B>,
    mut handler: Option<SignalHandler>,
    mut inbox: Mailbox<B>,
    mut control: mpsc::UnboundedReceiver<Signal>,
    mut cancel: watch::Receiver<bool>,
) {
    let me = ActorHandle {
        cell: inner.clone(),
    };
    tracing::debug!("Actor {} ({}) started", me.name(), me.id());

    'incarnation: loop {
        let flags = Arc::new(IncarnationFlags::new());
        let ctx = ActorContext::new(rt.clone(), me.clone(), flags.clone());
        CURRENT_CONTEXT.with(|current| *current.borrow_mut() = Some(ctx.clone()));

        // A factory failure is an initial panic: same supervision path,
        // just with no messages processed yet.
        let cause = match catch_unwind(AssertUnwindSafe(|| factory(ctx.clone()))) {
            Err(payload) => Signal::Panic(fault_from_panic(payload)),
            Ok(mut behavior) => 'messages: loop {
                if *cancel.borrow() {
                    break 'messages Signal::Shutdown;
                }
                tokio::select! {
                    biased;
                    signal = control.recv() => {
                        break 'messages signal.unwrap_or(Signal::Shutdown);
                    }
                    _ = cancel.changed() => {
                        break 'messages Signal::Shutdown;
                    }
                    envelope = inbox.take() => {
                        let Some(envelope) = envelope else {
                            break 'messages Signal::Shutdown;
                        };
                        match catch_unwind(AssertUnwindSafe(|| envelope(&mut behavior))) {
                            Ok(Ok(())) => {
                                if flags.shutdown_requested() {
                                    break 'messages Signal::Shutdown;
                                }
                                if flags.interrupted() {
                                    break 'messages Signal::Panic(ActorError::Interrupted.into());
                                }
                            }
                            Ok(Err(fault)) => break 'messages Signal::Panic(fault),
                            Err(payload) => break 'messages Signal::Panic(fault_from_panic(payload)),
                        }
                    }
                }
            },
        };

        ctx.retire();
        let discarded = inbox.close_and_discard();
        if discarded > 0 {
            tracing::trace!("Actor {} discarded {} pending messages", me.name(), discarded);
        }

        match supervisor::deliver(&rt, &me, &mut handler, cause) {
            Verdict::Restart => {
                let (tx, fresh) = mailbox::mailbox();
                *lock(&inner.sender) = Some(tx);
                inbox = fresh;
                tracing::debug!("Actor {} ({}) restarted", me.name(), me.id());
                continue 'incarnation;
            }
            Verdict::Stop => break 'incarnation,
        }
    }

    *lock(&inner.sender) = None;
    *lock(&inner.control) = None;
    inner.state.advance(State::Running, State::Shutdown);
    CURRENT_CONTEXT.with(|current| *current.borrow_mut() = None);

    let children = std::mem::take(&mut *lock(&inner.children));
    for child in children {
        child.cell.push_signal(Signal::Shutdown);
    }
    tracing::debug!("Actor {} ({}) stopped", me.name(), me.id());
}
