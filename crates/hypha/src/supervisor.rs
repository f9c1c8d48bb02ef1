//! Signal delivery and restart verdicts.
//!
//! Every way out of an actor's message loop funnels through
//! [`deliver`]: panics, explicit shutdown requests, cross-actor signals
//! and interrupts all become one handler invocation whose outcome is a
//! [`Verdict`]. Failures raised by the handler itself are routed to the
//! process-wide uncaught hook; supervision never recurses.

use crate::actor::{ActorHandle, SignalHandler};
use crate::context::HandlerContext;
use crate::hooks;
use crate::runtime::RuntimeHandle;
use crate::signal::{fault_from_panic, Signal};
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Outcome of a supervision round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Verdict {
    /// Re-create mailbox and behavior, keep running.
    Restart,
    /// Terminate the actor.
    Stop,
}

/// Deliver `signal` to the actor's handler and decide its fate.
///
/// With no handler installed, a panic goes to the uncaught hook and the
/// actor stops; a shutdown just stops it. A restart request is honored
/// only when the handler returns cleanly.
pub(crate) fn deliver(
    rt: &RuntimeHandle,
    actor: &ActorHandle,
    handler: &mut Option<SignalHandler>,
    signal: Signal,
) -> Verdict {
    match &signal {
        Signal::Panic(fault) => {
            tracing::warn!("Actor {} ({}) panicked: {}", actor.name(), actor.id(), fault);
        }
        Signal::Shutdown => {
            tracing::debug!("Actor {} ({}) received shutdown", actor.name(), actor.id());
        }
    }

    let Some(handler) = handler.as_mut() else {
        if let Signal::Panic(fault) = &signal {
            hooks::report_uncaught(actor, fault);
        }
        return Verdict::Stop;
    };

    let ctx = HandlerContext::new(rt.clone());
    let outcome = catch_unwind(AssertUnwindSafe(|| handler(signal, &ctx)));
    ctx.retire();

    match outcome {
        Ok(Ok(())) => {
            if ctx.restart_requested() {
                Verdict::Restart
            } else {
                Verdict::Stop
            }
        }
        Ok(Err(fault)) => {
            hooks::report_uncaught(actor, &fault);
            Verdict::Stop
        }
        Err(payload) => {
            hooks::report_uncaught(actor, &fault_from_panic(payload));
            Verdict::Stop
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::Actor;
    use crate::runtime::RuntimeShared;
    use crate::signal::Fault;

    struct Empty;

    fn probe() -> (RuntimeHandle, ActorHandle) {
        let actor: Actor<Empty> = Actor::named("probe");
        (RuntimeShared::new(), actor.handle())
    }

    #[tokio::test]
    async fn no_handler_means_stop() {
        let (rt, actor) = probe();
        let verdict = deliver(&rt, &actor, &mut None, Signal::Shutdown);
        assert_eq!(verdict, Verdict::Stop);
    }

    #[tokio::test]
    async fn restart_request_is_honored() {
        let (rt, actor) = probe();
        let mut handler: Option<SignalHandler> = Some(Box::new(|_, ctx| {
            ctx.restart()?;
            Ok(())
        }));
        let fault: Fault = "oops".into();
        let verdict = deliver(&rt, &actor, &mut handler, Signal::Panic(fault));
        assert_eq!(verdict, Verdict::Restart);
    }

    #[tokio::test]
    async fn failing_handler_stops_even_after_restart_request() {
        let (rt, actor) = probe();
        let mut handler: Option<SignalHandler> = Some(Box::new(|_, ctx| {
            ctx.restart()?;
            Err("handler gave up".into())
        }));
        let verdict = deliver(&rt, &actor, &mut handler, Signal::Shutdown);
        assert_eq!(verdict, Verdict::Stop);
    }

    #[tokio::test]
    async fn panicking_handler_stops() {
        let (rt, actor) = probe();
        let mut handler: Option<SignalHandler> =
            Some(Box::new(|_, _| panic!("handler exploded")));
        let verdict = deliver(&rt, &actor, &mut handler, Signal::Shutdown);
        assert_eq!(verdict, Verdict::Stop);
    }
}
