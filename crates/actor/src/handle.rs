use std::sync::Arc;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::mailbox::{Mailbox, MailboxParts, Query};
use crate::scheduler::run_actor;
use crate::{MailboxClosed, Message};

/// Handle to an actor.
///
/// The actor stops when its shutdown token is cancelled, or when the last
/// handle is dropped.
pub struct Actor<S> {
    mailbox: Arc<Mailbox<S>>,
    shutdown: CancellationToken,
}

impl<S: Send + 'static> Actor<S> {
    /// Spawns a new actor with the specified state and an optional label.
    ///
    /// Cancelling `shutdown` stops the actor after the message currently
    /// being handled; messages still queued are dropped.
    pub fn spawn(
        state: S,
        label: Option<&str>,
        shutdown: CancellationToken,
    ) -> Self {
        let MailboxParts { mailbox, msg_rx } = Mailbox::new();
        let mailbox = Arc::new(mailbox);
        tokio::spawn(
            run_actor(Arc::downgrade(&mailbox), state, msg_rx, shutdown.clone())
                .instrument(trace_span!("actor", label = label)),
        );
        Self { mailbox, shutdown }
    }

    #[inline]
    pub(crate) fn from_parts(
        mailbox: Arc<Mailbox<S>>,
        shutdown: CancellationToken,
    ) -> Self {
        Self { mailbox, shutdown }
    }

    /// Sends a message to the actor.
    #[inline]
    pub fn send<M: Message<S> + 'static>(
        &self,
        msg: M,
    ) -> Result<(), MailboxClosed> {
        self.mailbox.send(Box::new(msg))
    }

    /// Runs `f` against the actor's state in turn with the other messages
    /// and returns its result.
    pub async fn ask<F, R>(&self, f: F) -> Result<R, MailboxClosed>
    where
        F: FnOnce(&mut S) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.mailbox.send(Box::new(Query { f, reply_tx }))?;
        reply_rx.await.map_err(|_| MailboxClosed)
    }

    /// Requests the actor to stop.
    #[inline]
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Returns the token that stops this actor when cancelled.
    #[inline]
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Returns `true` if the actor no longer accepts messages.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled() || self.mailbox.is_closed()
    }
}

impl<S> Clone for Actor<S> {
    #[inline]
    fn clone(&self) -> Self {
        Self {
            mailbox: Arc::clone(&self.mailbox),
            shutdown: self.shutdown.clone(),
        }
    }
}
