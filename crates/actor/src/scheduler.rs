use std::sync::Weak;

use tokio::select;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::mailbox::Mailbox;
use crate::{Actor, Message};

#[inline]
pub async fn run_actor<S: Send + 'static>(
    mailbox: Weak<Mailbox<S>>,
    mut state: S,
    mut msg_rx: mpsc::UnboundedReceiver<Box<dyn Message<S>>>,
    shutdown: CancellationToken,
) {
    debug!("started");
    loop {
        let msg = select! {
            biased;

            _ = shutdown.cancelled() => {
                debug!("shutdown requested");
                break;
            }
            msg = msg_rx.recv() => {
                let Some(msg) = msg else {
                    break;
                };
                msg
            }
        };
        trace!("received message: {msg:?}");

        let Some(mailbox) = mailbox.upgrade() else {
            warn!("last mailbox has been dropped, discard the message");
            break;
        };
        let handle = Actor::from_parts(mailbox, shutdown.clone());

        let proc_span = trace_span!("proc msg");
        proc_span.in_scope(|| {
            msg.handle(&mut state, &handle);
            trace!("finished");
        });
    }

    // Stop accepting messages before the state (and every reply channel it
    // holds) is dropped.
    msg_rx.close();
    drop(state);
    debug!("terminated");
}
