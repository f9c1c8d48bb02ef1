//! Smallest possible actor program: one actor, two messages.

use hypha::{Actor, ActorContext, Fault};

struct Hello {
    ctx: ActorContext,
}

impl Hello {
    fn say(&mut self, message: &str) -> Result<(), Fault> {
        println!("Hello {message}");
        Ok(())
    }

    fn end(&mut self) -> Result<(), Fault> {
        self.ctx.shutdown()?;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> hypha::Result<()> {
    tracing_subscriber::fmt::init();

    let hello = Actor::new();
    hello.behavior(|ctx| Hello { ctx })?;

    hypha::run([hello.handle()], |start| {
        let hello = hello.clone();
        async move {
            start.post_to(&hello, |h| h.say("actors on tokio"))?;
            start.post_to(&hello, |h| h.end())?;
            Ok(())
        }
    })
    .await
}
