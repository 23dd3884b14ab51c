use serde::{Deserialize, Serialize};

/// A reply from the model provider.
///
/// A provider returns `Ok(ModelReply)` whenever the remote call itself
/// succeeded, even if the payload did not contain the text the caller
/// expected. In that case `text` is `None` and it is up to the caller to
/// decide what to show instead.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelReply {
    /// The generated text, if the response carried any.
    pub text: Option<String>,
}

impl ModelReply {
    /// Creates a reply that carries the given text.
    #[inline]
    pub fn with_text<S: Into<String>>(text: S) -> Self {
        Self {
            text: Some(text.into()),
        }
    }

    /// Creates a reply whose payload had no usable text.
    #[inline]
    pub fn empty() -> Self {
        Self { text: None }
    }

    /// Returns the reply text, treating an empty string as absent.
    #[inline]
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref().filter(|text| !text.is_empty())
    }
}
