use std::pin::Pin;
use std::sync::Arc;

use confab_model::{
    ModelMessage, ModelProvider, ModelProviderError, ModelReply, ModelRequest,
};
use tracing::Instrument;

type SendRequestResult = Result<ModelReply, Box<dyn ModelProviderError>>;
type BoxedSendRequestFuture =
    Pin<Box<dyn Future<Output = SendRequestResult> + Send>>;
type HandlerFn =
    Arc<dyn Fn(ModelRequest) -> BoxedSendRequestFuture + Send + Sync>;

/// The text used when a call succeeds but carries no reply.
pub const DEFAULT_PLACEHOLDER_REPLY: &str =
    "Sorry, I didn't quite get that. Could you rephrase?";

/// A wrapper around a model provider that turns one turn's inputs into a
/// single remote call, and provides a type-erased interface for the other
/// modules.
#[derive(Clone)]
pub struct ModelClient {
    handler_fn: HandlerFn,
    placeholder: Arc<str>,
}

impl ModelClient {
    #[inline]
    pub fn new<P: ModelProvider + 'static>(provider: P) -> Self {
        // We have to erase the type `P`, since `ModelClient` doesn't have a
        // generic parameter and we don't want it either.
        let provider = Arc::new(provider);
        let handler_fn: HandlerFn =
            Arc::new(move |req: ModelRequest| -> BoxedSendRequestFuture {
                let provider = Arc::clone(&provider);
                Box::pin(
                    async move {
                        trace!("got a request: {req:?}");
                        match provider.send_request(&req).await {
                            Ok(reply) => {
                                trace!("got a reply: {reply:?}");
                                Ok(reply)
                            }
                            Err(err) => {
                                debug!("request failed: {err}");
                                let err: Box<dyn ModelProviderError> =
                                    Box::new(err);
                                Err(err)
                            }
                        }
                    }
                    .instrument(trace_span!("model client req")),
                )
            });
        Self {
            handler_fn,
            placeholder: DEFAULT_PLACEHOLDER_REPLY.into(),
        }
    }

    /// Replaces the text used for replies without content.
    #[inline]
    pub fn set_placeholder(&mut self, placeholder: impl Into<Arc<str>>) {
        self.placeholder = placeholder.into();
    }

    /// Performs one remote generation call.
    ///
    /// The request carries `persona` as the system instruction and a single
    /// user payload made of the context window followed by the current
    /// input. Every call reaches the provider; nothing is cached.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe. Dropping the future abandons the call.
    pub async fn generate(
        &self,
        persona: &str,
        context: &str,
        input: &str,
    ) -> Result<GeneratedReply, Box<dyn ModelProviderError>> {
        let req = build_request(persona, context, input);
        let reply = (self.handler_fn)(req).await?;
        Ok(into_generated(reply.text(), &self.placeholder))
    }
}

/// A successfully delivered reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratedReply {
    pub text: String,
    /// Whether `text` is the placeholder rather than model output.
    pub placeholder: bool,
}

fn into_generated(text: Option<&str>, placeholder: &str) -> GeneratedReply {
    match text {
        Some(text) => GeneratedReply {
            text: text.to_owned(),
            placeholder: false,
        },
        None => {
            warn!("reply has no text, using placeholder");
            GeneratedReply {
                text: placeholder.to_owned(),
                placeholder: true,
            }
        }
    }
}

fn build_request(persona: &str, context: &str, input: &str) -> ModelRequest {
    let mut messages = Vec::with_capacity(2);
    if !persona.is_empty() {
        messages.push(ModelMessage::System(persona.to_owned()));
    }
    messages.push(ModelMessage::User(format!(
        "Previous conversation: {context}\nUser: {input}"
    )));
    ModelRequest { messages }
}
