//! Panic capture and restart.
//!
//! A counting actor panics on negative input. Its signal handler
//! restarts it once, discarding the accumulated state along with the
//! poisoned mailbox, and lets the second failure terminate it.

use hypha::{Actor, ActorContext, Fault, Signal};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Duration};

struct Counter {
    ctx: ActorContext,
    sum: i64,
}

impl Counter {
    fn add(&mut self, value: i64) -> Result<(), Fault> {
        if value < 0 {
            return Err(self.ctx.panic(format!("negative amount: {value}")));
        }
        self.sum += value;
        println!("sum = {}", self.sum);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> hypha::Result<()> {
    tracing_subscriber::fmt::init();

    let counter = Actor::named("counter");
    counter.behavior(|ctx| Counter { ctx, sum: 0 })?;

    let restart_budget = Arc::new(AtomicBool::new(true));
    counter.on_signal(move |signal, handler| {
        if let Signal::Panic(fault) = &signal {
            println!("supervisor saw: {fault}");
            if restart_budget.swap(false, Ordering::SeqCst) {
                println!("supervisor: restarting with fresh state");
                handler.restart()?;
            } else {
                println!("supervisor: giving up");
            }
        }
        Ok(())
    })?;

    hypha::run([counter.handle()], |start| {
        let counter = counter.clone();
        async move {
            start.post_to(&counter, |c| c.add(10))?;
            start.post_to(&counter, |c| c.add(-1))?;
            sleep(Duration::from_millis(200)).await;
            start.post_to(&counter, |c| c.add(30))?;
            start.post_to(&counter, |c| c.add(-2))?;
            Ok(())
        }
    })
    .await
}
