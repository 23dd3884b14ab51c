mod builder;
mod state;
mod turn;

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use confab_actor::Actor;
use tokio::sync::{oneshot, watch};

use crate::model_client::ModelClient;
use crate::retry::RetryPolicy;
use crate::status::DispatchStatus;
use crate::transcript::{Message, Transcript};
pub use builder::DispatcherBuilder;
use state::{PendingTurn, SubmitMessage};

/// The reply appended when every attempt of a turn has failed.
pub const DEFAULT_FALLBACK_REPLY: &str =
    "The service is unreachable right now. Please try again shortly.";

type MessageObserver = Box<dyn Fn(&Message) + Send + Sync>;
type StatusObserver = Box<dyn Fn(&DispatchStatus) + Send + Sync>;

/// What happens to a submission that arrives while a turn is in flight.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AdmissionPolicy {
    /// Hold it and start it once the current turn has finished.
    #[default]
    Queue,
    /// Turn it away with [`TurnOutcome::Rejected`].
    Reject,
}

/// Why a submission was dropped without touching the transcript.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IgnoreReason {
    /// The input was empty after trimming.
    EmptyInput,
    /// The session was not ready when the turn was about to start.
    SessionNotReady,
}

/// Where the text of an assistant message came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Delivery {
    /// The model's reply.
    Model,
    /// The call succeeded but the response had no reply text.
    Placeholder,
    /// Every attempt failed.
    Fallback,
}

/// The assistant side of a completed turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnReport {
    /// The assistant message appended to the transcript.
    pub message: Message,
    /// Where the message text came from.
    pub delivery: Delivery,
    /// Remote calls made, including the first one.
    pub attempts: u32,
}

/// The result of a [`Dispatcher::submit`] call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The turn ran; both of its messages are in the transcript.
    Replied(TurnReport),
    /// The submission was dropped, nothing was appended.
    Ignored(IgnoreReason),
    /// Another turn was in flight and the dispatcher rejects overlaps.
    Rejected,
    /// The dispatcher shut down before the turn could complete.
    Cancelled,
}

/// Resolves to the [`TurnOutcome`] of a submission.
///
/// Dropping the handle does not affect the turn.
#[derive(Debug)]
pub struct TurnHandle {
    rx: oneshot::Receiver<TurnOutcome>,
}

impl Future for TurnHandle {
    type Output = TurnOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // A dropped sender means the dispatcher went away with the turn.
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|res| res.unwrap_or(TurnOutcome::Cancelled))
    }
}

pub(crate) struct DispatcherState {
    // `None` while a turn is in flight.
    model_client: Option<ModelClient>,
    persona: Arc<str>,
    transcript: Transcript,
    window_size: usize,
    retry_policy: RetryPolicy,
    fallback_reply: Arc<str>,
    admission: AdmissionPolicy,
    session_ready: watch::Receiver<bool>,
    status_tx: watch::Sender<DispatchStatus>,
    pending: VecDeque<PendingTurn>,
    in_flight: Option<oneshot::Sender<TurnOutcome>>,

    on_message: Option<MessageObserver>,
    on_status: Option<StatusObserver>,
}

impl Drop for DispatcherState {
    fn drop(&mut self) {
        // Pending handles resolve to `Cancelled` right after this.
        self.status_tx.send_replace(DispatchStatus::Idle);
    }
}

/// Turns user submissions into ordered, confirmed assistant replies.
///
/// The dispatcher owns the transcript and runs at most one turn at a time:
/// it appends the user message, calls the model with the recent context,
/// retries failed calls with exponential backoff and finally appends exactly
/// one assistant message, which is the model's reply, a placeholder when
/// the reply was empty, or a fallback once the retries are exhausted.
///
/// Handles are cheap to clone; they all talk to the same dispatcher.
#[derive(Clone)]
pub struct Dispatcher {
    actor: Actor<DispatcherState>,
    status_rx: watch::Receiver<DispatchStatus>,
}

impl Dispatcher {
    /// Submits a user input.
    ///
    /// This returns immediately. The returned handle may be awaited for the
    /// outcome or dropped; the transcript and the status reflect the turn
    /// either way.
    pub fn submit<S: Into<String>>(&self, input: S) -> TurnHandle {
        let (reply_tx, rx) = oneshot::channel();
        let msg = SubmitMessage {
            input: input.into(),
            reply_tx,
        };
        if self.actor.send(msg).is_err() {
            debug!("dispatcher is gone, submission cancelled");
        }
        TurnHandle { rx }
    }

    /// Returns a copy of the transcript.
    ///
    /// The transcript does not outlive the dispatcher: after shutdown this
    /// returns an empty list.
    pub async fn transcript(&self) -> Vec<Message> {
        self.actor
            .ask(|state: &mut DispatcherState| state.transcript.snapshot().to_vec())
            .await
            .unwrap_or_default()
    }

    /// Returns a receiver that observes the dispatch status.
    #[inline]
    pub fn status(&self) -> watch::Receiver<DispatchStatus> {
        self.status_rx.clone()
    }

    /// Returns `true` while a turn is in flight.
    #[inline]
    pub fn is_busy(&self) -> bool {
        self.status_rx.borrow().is_busy()
    }

    /// Stops the dispatcher.
    ///
    /// An in-flight remote call or backoff wait is abandoned, and every
    /// outstanding [`TurnHandle`] resolves to [`TurnOutcome::Cancelled`].
    #[inline]
    pub fn shutdown(&self) {
        self.actor.shutdown();
    }

    /// Returns `true` once the dispatcher has been shut down.
    #[inline]
    pub fn is_shut_down(&self) -> bool {
        self.actor.is_closed()
    }
}
