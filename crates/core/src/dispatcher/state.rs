use std::fmt::{self, Debug};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use confab_actor::{Actor, Message as ActorMessage};
use tokio::sync::oneshot;
use tracing::Instrument;

use super::turn::{TurnRequest, TurnResult, run_turn};
use super::{
    AdmissionPolicy, Delivery, DispatcherState, IgnoreReason, TurnOutcome,
    TurnReport,
};
use crate::context::window;
use crate::model_client::ModelClient;
use crate::retry::RetryPolicy;
use crate::status::DispatchStatus;
use crate::transcript::Message;

pub struct PendingTurn {
    input: String,
    reply_tx: oneshot::Sender<TurnOutcome>,
}

impl DispatcherState {
    fn submit(
        &mut self,
        input: String,
        reply_tx: oneshot::Sender<TurnOutcome>,
        handle: &Actor<Self>,
    ) {
        let input = input.trim();
        if input.is_empty() {
            reply_tx.send(TurnOutcome::Ignored(IgnoreReason::EmptyInput)).ok();
            return;
        }

        let Some(model_client) = self.model_client.take() else {
            // A turn is in flight.
            match self.admission {
                AdmissionPolicy::Queue => {
                    debug!("busy, queued the input");
                    self.pending.push_back(PendingTurn {
                        input: input.to_owned(),
                        reply_tx,
                    });
                }
                AdmissionPolicy::Reject => {
                    debug!("busy, rejected the input");
                    reply_tx.send(TurnOutcome::Rejected).ok();
                }
            }
            return;
        };

        self.start_turn_checked(model_client, input.to_owned(), reply_tx, handle);
    }

    fn process_next_input(&mut self, handle: &Actor<Self>) {
        while let Some(PendingTurn { input, reply_tx }) = self.pending.pop_front()
        {
            let Some(model_client) = self.model_client.take() else {
                // Still busy; this will be called again when the turn ends.
                self.pending.push_front(PendingTurn { input, reply_tx });
                return;
            };
            self.start_turn_checked(model_client, input, reply_tx, handle);
        }
    }

    /// Starts a turn unless the session is not ready, in which case the
    /// model client is put back and the input is dropped.
    fn start_turn_checked(
        &mut self,
        model_client: ModelClient,
        input: String,
        reply_tx: oneshot::Sender<TurnOutcome>,
        handle: &Actor<Self>,
    ) {
        if !*self.session_ready.borrow() {
            debug!("session is not ready, ignored the input");
            self.model_client = Some(model_client);
            reply_tx
                .send(TurnOutcome::Ignored(IgnoreReason::SessionNotReady))
                .ok();
            return;
        }

        // The new input travels as the current turn, so the window is taken
        // before it is appended.
        let context = window(self.transcript.snapshot(), self.window_size);
        self.append(Message::user(input.clone()));
        self.set_status(DispatchStatus::Composing { attempt: 0 });
        self.in_flight = Some(reply_tx);

        let request = TurnRequest {
            persona: Arc::clone(&self.persona),
            context,
            input,
        };
        let retry_policy = self.retry_policy;
        let handle = handle.clone();
        tokio::spawn(
            async move {
                let attempts = Arc::new(AtomicU32::new(1));
                // A panicking provider must still end the turn.
                let turn = tokio::spawn(
                    drive_turn(
                        model_client.clone(),
                        request,
                        retry_policy,
                        handle.clone(),
                        Arc::clone(&attempts),
                    )
                    .in_current_span(),
                );
                let result = match turn.await {
                    Ok(result) => result,
                    Err(err) if err.is_panic() => {
                        error!("turn task panicked, giving up: {err}");
                        TurnResult::Exhausted {
                            attempts: attempts.load(Ordering::Relaxed),
                        }
                    }
                    Err(_) => TurnResult::Cancelled,
                };
                handle
                    .send(TurnFinishedMessage {
                        model_client,
                        result,
                    })
                    .ok();
            }
            .instrument(debug_span!("turn")),
        );
    }

    fn finish_turn(
        &mut self,
        model_client: ModelClient,
        result: TurnResult,
        handle: &Actor<Self>,
    ) {
        let reply_tx = self.in_flight.take();
        let (text, delivery, attempts) = match result {
            TurnResult::Delivered { reply, attempts } => {
                let delivery = if reply.placeholder {
                    Delivery::Placeholder
                } else {
                    Delivery::Model
                };
                (reply.text, delivery, attempts)
            }
            TurnResult::Exhausted { attempts } => {
                (self.fallback_reply.to_string(), Delivery::Fallback, attempts)
            }
            // The turn shares the actor's shutdown token, so this only arrives
            // if the two are ever split.
            TurnResult::Cancelled => {
                self.model_client = Some(model_client);
                self.set_status(DispatchStatus::Idle);
                if let Some(reply_tx) = reply_tx {
                    reply_tx.send(TurnOutcome::Cancelled).ok();
                }
                return;
            }
        };

        let message = self.append(Message::assistant(text));
        self.model_client = Some(model_client);
        self.set_status(DispatchStatus::Idle);
        if let Some(reply_tx) = reply_tx {
            reply_tx
                .send(TurnOutcome::Replied(TurnReport {
                    message,
                    delivery,
                    attempts,
                }))
                .ok();
        }

        self.process_next_input(handle);
    }

    fn append(&mut self, message: Message) -> Message {
        let message = self.transcript.append(message);
        trace!("appended a {:?} message", message.role());
        if let Some(on_message) = &self.on_message {
            on_message(message);
        }
        message.clone()
    }

    fn set_status(&mut self, status: DispatchStatus) {
        self.status_tx.send_replace(status);
        if let Some(on_status) = &self.on_status {
            on_status(&status);
        }
    }
}

/// Runs the retry loop, forwarding status changes to the actor and
/// keeping `attempts` at the number of calls started so far.
async fn drive_turn(
    model_client: ModelClient,
    request: TurnRequest,
    retry_policy: RetryPolicy,
    handle: Actor<DispatcherState>,
    attempts: Arc<AtomicU32>,
) -> TurnResult {
    let cancel = handle.shutdown_token().clone();
    run_turn(&model_client, &request, &retry_policy, &cancel, |status| {
        if let DispatchStatus::Composing { attempt } = status {
            attempts.store(attempt + 1, Ordering::Relaxed);
        }
        handle.send(TurnStatusMessage(status)).ok();
    })
    .await
}

pub struct SubmitMessage {
    pub input: String,
    pub reply_tx: oneshot::Sender<TurnOutcome>,
}

impl Debug for SubmitMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubmitMessage")
            .field("input", &self.input)
            .finish_non_exhaustive()
    }
}

impl ActorMessage<DispatcherState> for SubmitMessage {
    #[inline]
    fn handle(self, state: &mut DispatcherState, handle: &Actor<DispatcherState>) {
        state.submit(self.input, self.reply_tx, handle);
    }
}

#[derive(Debug)]
struct TurnStatusMessage(DispatchStatus);

impl ActorMessage<DispatcherState> for TurnStatusMessage {
    #[inline]
    fn handle(self, state: &mut DispatcherState, _handle: &Actor<DispatcherState>) {
        if state.in_flight.is_some() {
            state.set_status(self.0);
        }
    }
}

struct TurnFinishedMessage {
    model_client: ModelClient,
    result: TurnResult,
}

impl Debug for TurnFinishedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TurnFinishedMessage")
            .field("result", &self.result)
            .finish_non_exhaustive()
    }
}

impl ActorMessage<DispatcherState> for TurnFinishedMessage {
    #[inline]
    fn handle(self, state: &mut DispatcherState, handle: &Actor<DispatcherState>) {
        state.finish_turn(self.model_client, self.result, handle);
    }
}
