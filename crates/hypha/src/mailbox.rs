//! Per-actor message queue.
//!
//! A mailbox is an unbounded FIFO of deferred invocations against the
//! actor's behavior. The consuming side lives inside the actor task; the
//! producing side is a cheap clone stored in the actor handle and
//! replaced wholesale on restart.

use crate::signal::Fault;
use tokio::sync::mpsc;

/// A queued message: a one-shot application against the behavior.
pub(crate) type Envelope<B> = Box<dyn FnOnce(&mut B) -> Result<(), Fault> + Send + 'static>;

/// Producer half of a mailbox.
pub(crate) struct MailboxSender<B> {
    tx: mpsc::UnboundedSender<Envelope<B>>,
}

impl<B> Clone for MailboxSender<B> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<B> MailboxSender<B> {
    /// Enqueue a message. Never blocks.
    ///
    /// Returns `false` once the mailbox is closed; the message is dropped
    /// and the caller must not treat that as an error (dead-letter
    /// semantics).
    pub(crate) fn offer(&self, envelope: Envelope<B>) -> bool {
        self.tx.send(envelope).is_ok()
    }
}

/// Consumer half of a mailbox. Owned exclusively by the actor task.
pub(crate) struct Mailbox<B> {
    rx: mpsc::UnboundedReceiver<Envelope<B>>,
}

impl<B> Mailbox<B> {
    /// Wait for the next message.
    ///
    /// Returns `None` only after the mailbox has been closed and drained;
    /// this is the only designed suspension point of an actor task.
    pub(crate) async fn take(&mut self) -> Option<Envelope<B>> {
        self.rx.recv().await
    }

    /// Close the mailbox and drop everything still queued, without
    /// running it. Idempotent. Returns the number of discarded messages.
    pub(crate) fn close_and_discard(&mut self) -> usize {
        self.rx.close();
        let mut discarded = 0;
        while self.rx.try_recv().is_ok() {
            discarded += 1;
        }
        discarded
    }
}

/// Create a fresh mailbox pair.
pub(crate) fn mailbox<B>() -> (MailboxSender<B>, Mailbox<B>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (MailboxSender { tx }, Mailbox { rx })
}
