use std::sync::Arc;

use confab_model::ModelProviderError;
use tokio::select;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::model_client::{GeneratedReply, ModelClient};
use crate::retry::RetryPolicy;
use crate::status::DispatchStatus;

/// Everything the remote call of one turn needs.
pub struct TurnRequest {
    pub persona: Arc<str>,
    pub context: String,
    pub input: String,
}

#[derive(Debug)]
pub enum TurnResult {
    Delivered {
        reply: GeneratedReply,
        attempts: u32,
    },
    Exhausted {
        attempts: u32,
    },
    Cancelled,
}

/// Bookkeeping of one turn's attempts.
#[derive(Default)]
struct DispatchAttempt {
    retry_count: u32,
    last_error: Option<Box<dyn ModelProviderError>>,
}

/// Calls the model until it delivers or the retry policy gives up.
///
/// Only a failed call is retried; a reply without text was still delivered.
/// `report` is told about every status change after the first attempt has
/// started. The loop suspends only on the remote call and on the backoff
/// wait, and both are abandoned as soon as `cancel` fires.
pub async fn run_turn(
    model_client: &ModelClient,
    request: &TurnRequest,
    retry_policy: &RetryPolicy,
    cancel: &CancellationToken,
    report: impl Fn(DispatchStatus),
) -> TurnResult {
    let mut attempt = DispatchAttempt::default();
    let mut delays = retry_policy.delays();

    loop {
        if attempt.retry_count > 0 {
            report(DispatchStatus::Composing {
                attempt: attempt.retry_count,
            });
        }

        let result = select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("cancelled while waiting for the model");
                return TurnResult::Cancelled;
            }
            result = model_client.generate(
                &request.persona,
                &request.context,
                &request.input,
            ) => result,
        };

        match result {
            Ok(reply) => {
                return TurnResult::Delivered {
                    reply,
                    attempts: attempt.retry_count + 1,
                };
            }
            Err(err) => {
                warn!(attempt = attempt.retry_count, "remote call failed: {err}");
                attempt.last_error = Some(err);
            }
        }

        let Some(delay) = delays.next_delay() else {
            if let Some(err) = &attempt.last_error {
                error!(
                    "giving up after {} attempts, last error: {err}",
                    attempt.retry_count + 1
                );
            }
            return TurnResult::Exhausted {
                attempts: attempt.retry_count + 1,
            };
        };

        report(DispatchStatus::BackingOff {
            attempt: attempt.retry_count,
            delay,
        });
        select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("cancelled while backing off");
                return TurnResult::Cancelled;
            }
            _ = sleep(delay) => {}
        }
        attempt.retry_count += 1;
    }
}
