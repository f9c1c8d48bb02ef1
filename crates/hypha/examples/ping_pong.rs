//! Two actors exchanging messages until a rally count runs out.
//!
//! Handles are plain values: the pong actor receives the ping actor's
//! handle inside the message itself and posts the return stroke through
//! it.

use hypha::{Actor, ActorContext, Fault};

struct Ping {
    ctx: ActorContext,
    peer: Actor<Pong>,
    remaining: u32,
}

impl Ping {
    fn volley(&mut self) -> Result<(), Fault> {
        if self.remaining == 0 {
            println!("ping: out of strokes, calling it");
            self.ctx.post_to(&self.peer, |p| p.stop())?;
            self.ctx.shutdown()?;
            return Ok(());
        }
        self.remaining -= 1;
        println!("ping ({} left)", self.remaining);
        let me = self.ctx.current_actor::<Ping>()?;
        self.ctx.post_to(&self.peer, move |p| p.bounce(me))?;
        Ok(())
    }
}

struct Pong {
    ctx: ActorContext,
}

impl Pong {
    fn bounce(&mut self, from: Actor<Ping>) -> Result<(), Fault> {
        println!("pong");
        self.ctx.post_to(&from, |p| p.volley())?;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), Fault> {
        self.ctx.shutdown()?;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> hypha::Result<()> {
    tracing_subscriber::fmt::init();

    let ping: Actor<Ping> = Actor::new();
    let pong: Actor<Pong> = Actor::new();

    let peer = pong.clone();
    ping.behavior(move |ctx| Ping {
        ctx,
        peer: peer.clone(),
        remaining: 5,
    })?;
    pong.behavior(|ctx| Pong { ctx })?;

    hypha::run([ping.handle(), pong.handle()], |start| {
        let ping = ping.clone();
        async move {
            start.post_to(&ping, |p| p.volley())?;
            Ok(())
        }
    })
    .await
}
