//! A local fake model for testing purpose.

mod preset;

use std::collections::VecDeque;
use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use confab_model::{
    ErrorKind, ModelProvider, ModelProviderError, ModelReply, ModelRequest,
};
use tokio::time::{Instant, sleep};

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    #[allow(dead_code)]
    message: &'static str,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(self, f)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// A request the provider has received, with the (tokio) instant it
/// arrived at.
#[derive(Clone, Debug)]
pub struct RecordedCall {
    pub request: ModelRequest,
    pub at: Instant,
}

#[derive(Default)]
struct Script {
    steps: VecDeque<PresetResponse>,
    // Failures already served for the step at the front.
    failed: u64,
    calls: Vec<RecordedCall>,
}

impl Script {
    fn next_result(&mut self) -> Result<ModelReply, Error> {
        let Some(step) = self.steps.front() else {
            return Err(Error {
                message: "no enough steps",
                kind: ErrorKind::Other,
            });
        };
        match step.failures {
            Some(0) => Err(Error {
                message: "endpoint is down",
                kind: ErrorKind::Unreachable,
            }),
            Some(failures) if self.failed < failures => {
                self.failed += 1;
                Err(Error {
                    message: "transient failure",
                    kind: ErrorKind::Unreachable,
                })
            }
            _ => {
                self.failed = 0;
                let step = self.steps.pop_front().unwrap_or_else(PresetResponse::empty);
                Ok(ModelReply { text: step.text })
            }
        }
    }
}

/// A local fake model for testing purpose.
///
/// Before sending requests, you need to setup the script, which is how the
/// model should respond to consecutive requests. Each step is consumed once
/// it produces a successful reply; failures configured on a step are served
/// first. If there are no enough steps in the script, an error will be
/// returned.
///
/// Clones share the same script and call log, so a test can keep a clone to
/// inspect the calls after handing the provider to a dispatcher.
///
/// # Note
///
/// This type is not optimized for production use, there are heavy memory
/// copies involved. You should only use it for testing.
#[derive(Clone, Default)]
pub struct TestModelProvider {
    script: Arc<Mutex<Script>>,
    delay: Option<Duration>,
}

impl TestModelProvider {
    #[inline]
    pub fn add_response_step(&mut self, preset: PresetResponse) {
        self.lock().steps.push_back(preset);
    }

    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Returns the number of requests received so far.
    #[inline]
    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    /// Returns all requests received so far, in arrival order.
    #[inline]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    #[inline]
    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ModelProvider for TestModelProvider {
    type Error = crate::Error;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<ModelReply, Self::Error>> + Send + 'static
    {
        let result = {
            let mut script = self.lock();
            script.calls.push(RecordedCall {
                request: req.clone(),
                at: Instant::now(),
            });
            script.next_result()
        };
        let delay = self.delay;
        async move {
            if let Some(delay) = delay {
                sleep(delay).await;
            }
            result
        }
    }
}

#[cfg(test)]
mod tests {
    use confab_model::ModelMessage;

    use super::*;

    fn request(text: &str) -> ModelRequest {
        ModelRequest {
            messages: vec![ModelMessage::User(text.to_owned())],
        }
    }

    #[tokio::test]
    async fn test_send_request() {
        let mut provider = TestModelProvider::default();
        provider.add_response_step(PresetResponse::with_text("Hello, world!"));
        provider.add_response_step(PresetResponse::empty());

        let reply = provider.send_request(&request("Hi")).await.unwrap();
        assert_eq!(reply.text(), Some("Hello, world!"));

        let reply = provider.send_request(&request("Again")).await.unwrap();
        assert_eq!(reply.text(), None);

        let err = provider.send_request(&request("More")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Other);
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn test_failures_then_success() {
        let mut provider = TestModelProvider::default();
        provider
            .add_response_step(PresetResponse::with_text("ok").with_failures(2));

        for _ in 0..2 {
            let err = provider.send_request(&request("x")).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Unreachable);
        }
        let reply = provider.send_request(&request("x")).await.unwrap();
        assert_eq!(reply.text(), Some("ok"));
    }

    #[tokio::test]
    async fn test_always_failing() {
        let mut provider = TestModelProvider::default();
        provider.add_response_step(PresetResponse::unreachable());

        for _ in 0..10 {
            assert!(provider.send_request(&request("x")).await.is_err());
        }
        assert_eq!(provider.call_count(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_and_shared_log() {
        let mut provider = TestModelProvider::default();
        provider.set_delay(Duration::from_secs(3));
        provider.add_response_step(PresetResponse::with_text("late"));

        let observer = provider.clone();
        let start = Instant::now();
        let reply = provider.send_request(&request("Hi")).await.unwrap();
        assert_eq!(reply.text(), Some("late"));
        assert!(start.elapsed() >= Duration::from_secs(3));

        let calls = observer.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].request, request("Hi"));
    }
}
