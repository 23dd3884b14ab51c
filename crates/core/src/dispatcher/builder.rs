use std::sync::Arc;

use confab_actor::Actor;
use confab_model::ModelProvider;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::{
    AdmissionPolicy, DEFAULT_FALLBACK_REPLY, Dispatcher, DispatcherState,
    MessageObserver, StatusObserver,
};
use crate::context::DEFAULT_WINDOW_SIZE;
use crate::model_client::ModelClient;
use crate::retry::RetryPolicy;
use crate::status::DispatchStatus;
use crate::transcript::Message;

/// [`Dispatcher`] builder.
pub struct DispatcherBuilder {
    model_client: ModelClient,
    persona: String,
    window_size: usize,
    retry_policy: RetryPolicy,
    fallback_reply: String,
    admission: AdmissionPolicy,
    session_ready: Option<watch::Receiver<bool>>,
    shutdown: Option<CancellationToken>,
    on_message: Option<MessageObserver>,
    on_status: Option<StatusObserver>,
}

impl DispatcherBuilder {
    /// Creates a new builder with the specified model provider.
    #[inline]
    pub fn with_model_provider<P: ModelProvider + 'static>(
        provider: P,
    ) -> Self {
        Self {
            model_client: ModelClient::new(provider),
            persona: String::new(),
            window_size: DEFAULT_WINDOW_SIZE,
            retry_policy: RetryPolicy::default(),
            fallback_reply: DEFAULT_FALLBACK_REPLY.to_owned(),
            admission: AdmissionPolicy::default(),
            session_ready: None,
            shutdown: None,
            on_message: None,
            on_status: None,
        }
    }

    /// Sets the persona instruction sent with every request.
    ///
    /// The text is passed to the model as is.
    #[inline]
    pub fn with_persona<S: Into<String>>(mut self, persona: S) -> Self {
        self.persona = persona.into();
        self
    }

    /// Sets how many recent messages are sent as context.
    #[inline]
    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size;
        self
    }

    /// Sets the retry policy for failed remote calls.
    #[inline]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Sets the reply used when a call succeeds without reply text.
    #[inline]
    pub fn with_placeholder_reply<S: Into<String>>(mut self, text: S) -> Self {
        self.model_client.set_placeholder(text.into());
        self
    }

    /// Sets the reply used once all retries have failed.
    #[inline]
    pub fn with_fallback_reply<S: Into<String>>(mut self, text: S) -> Self {
        self.fallback_reply = text.into();
        self
    }

    /// Sets how overlapping submissions are handled.
    #[inline]
    pub fn with_admission_policy(mut self, admission: AdmissionPolicy) -> Self {
        self.admission = admission;
        self
    }

    /// Gates turns on a session readiness signal.
    ///
    /// Without one, the session is always considered ready.
    #[inline]
    pub fn with_session_readiness(
        mut self,
        session_ready: watch::Receiver<bool>,
    ) -> Self {
        self.session_ready = Some(session_ready);
        self
    }

    /// Ties the dispatcher's lifetime to a cancellation token, typically one
    /// owned by the session. Cancelling it has the same effect as
    /// [`Dispatcher::shutdown`].
    #[inline]
    pub fn with_shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown = Some(token);
        self
    }

    /// Attaches a callback invoked for every message appended to the
    /// transcript, in order.
    #[inline]
    pub fn on_message(
        mut self,
        on_message: impl Fn(&Message) + Send + Sync + 'static,
    ) -> Self {
        self.on_message = Some(Box::new(on_message));
        self
    }

    /// Attaches a callback invoked whenever the dispatch status changes.
    #[inline]
    pub fn on_status(
        mut self,
        on_status: impl Fn(&DispatchStatus) + Send + Sync + 'static,
    ) -> Self {
        self.on_status = Some(Box::new(on_status));
        self
    }

    /// Builds the dispatcher.
    ///
    /// Must be called within a tokio runtime.
    pub fn build(self) -> Dispatcher {
        let DispatcherBuilder {
            model_client,
            persona,
            window_size,
            retry_policy,
            fallback_reply,
            admission,
            session_ready,
            shutdown,
            on_message,
            on_status,
        } = self;

        let session_ready = session_ready.unwrap_or_else(|| watch::channel(true).1);
        let (status_tx, status_rx) = watch::channel(DispatchStatus::Idle);

        let state = DispatcherState {
            model_client: Some(model_client),
            persona: Arc::from(persona),
            transcript: Default::default(),
            window_size,
            retry_policy,
            fallback_reply: Arc::from(fallback_reply),
            admission,
            session_ready,
            status_tx,
            pending: Default::default(),
            in_flight: None,
            on_message,
            on_status,
        };
        let actor = Actor::spawn(
            state,
            Some("dispatcher"),
            shutdown.unwrap_or_default(),
        );
        Dispatcher { actor, status_rx }
    }
}
