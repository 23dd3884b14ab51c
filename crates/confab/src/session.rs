use confab_core::transcript::Message;
use confab_core::{
    AdmissionPolicy, DispatchStatus, Dispatcher, DispatcherBuilder, RetryPolicy,
    TurnHandle,
};
use confab_model::ModelProvider;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// A session builder.
///
/// See [`Session`].
pub struct SessionBuilder {
    dispatcher_builder: DispatcherBuilder,
    ready: bool,
}

impl SessionBuilder {
    /// Creates a session builder with a specified model provider.
    pub fn with_model_provider<M: ModelProvider + 'static>(
        provider: M,
    ) -> Self {
        let dispatcher_builder = DispatcherBuilder::with_model_provider(provider);
        Self {
            dispatcher_builder,
            ready: true,
        }
    }

    /// Sets the persona instruction for the model.
    #[inline]
    pub fn with_persona<S: Into<String>>(mut self, persona: S) -> Self {
        self.dispatcher_builder = self.dispatcher_builder.with_persona(persona);
        self
    }

    /// Sets the retry policy for failed remote calls.
    #[inline]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.dispatcher_builder =
            self.dispatcher_builder.with_retry_policy(retry_policy);
        self
    }

    /// Sets how messages sent while a reply is pending are handled.
    #[inline]
    pub fn with_admission_policy(mut self, admission: AdmissionPolicy) -> Self {
        self.dispatcher_builder =
            self.dispatcher_builder.with_admission_policy(admission);
        self
    }

    /// Sets whether the session accepts messages right after it is built.
    ///
    /// Defaults to `true`. A session that starts unready ignores messages
    /// until [`Session::set_ready`] is called.
    #[inline]
    pub fn with_ready(mut self, ready: bool) -> Self {
        self.ready = ready;
        self
    }

    /// Attaches a callback to be invoked for every new transcript message.
    #[inline]
    pub fn on_message(
        mut self,
        on_message: impl Fn(&Message) + Send + Sync + 'static,
    ) -> Self {
        self.dispatcher_builder = self.dispatcher_builder.on_message(on_message);
        self
    }

    /// Attaches a callback to be invoked when the dispatch status changes.
    #[inline]
    pub fn on_status(
        mut self,
        on_status: impl Fn(&DispatchStatus) + Send + Sync + 'static,
    ) -> Self {
        self.dispatcher_builder = self.dispatcher_builder.on_status(on_status);
        self
    }

    /// Builds a new session.
    ///
    /// Must be called within a tokio runtime.
    pub fn build(self) -> Session {
        let (ready_tx, ready_rx) = watch::channel(self.ready);
        let shutdown = CancellationToken::new();
        let dispatcher = self
            .dispatcher_builder
            .with_session_readiness(ready_rx)
            .with_shutdown_token(shutdown.clone())
            .build();

        Session {
            dispatcher,
            ready_tx,
            shutdown,
        }
    }
}

/// A chat session, like a window that displays messages and has a input box.
///
/// The session owns its dispatcher. Dropping the session, or calling
/// [`Session::shutdown`], abandons any reply still pending.
pub struct Session {
    dispatcher: Dispatcher,
    ready_tx: watch::Sender<bool>,
    shutdown: CancellationToken,
}

impl Session {
    /// Sends a message to the session.
    ///
    /// The returned handle resolves once the message has been answered, or
    /// tells why it was not.
    #[inline]
    pub fn send_message(&self, message: &str) -> TurnHandle {
        self.dispatcher.submit(message)
    }

    /// Marks the session as ready or not.
    ///
    /// Messages that would start while the session is not ready are ignored.
    #[inline]
    pub fn set_ready(&self, ready: bool) {
        self.ready_tx.send_replace(ready);
    }

    /// Returns `true` if the session accepts messages.
    #[inline]
    pub fn is_ready(&self) -> bool {
        *self.ready_tx.borrow()
    }

    /// Returns a copy of the transcript.
    #[inline]
    pub async fn transcript(&self) -> Vec<Message> {
        self.dispatcher.transcript().await
    }

    /// Returns a receiver that observes the dispatch status.
    #[inline]
    pub fn status(&self) -> watch::Receiver<DispatchStatus> {
        self.dispatcher.status()
    }

    /// Returns `true` while a reply is pending.
    #[inline]
    pub fn is_busy(&self) -> bool {
        self.dispatcher.is_busy()
    }

    /// Ends the session.
    #[inline]
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
