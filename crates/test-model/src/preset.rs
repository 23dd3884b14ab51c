use serde::{Deserialize, Serialize};

/// The preset response for one scripted turn.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresetResponse {
    /// Text of the reply. `None` simulates a successful call whose payload
    /// has no reply text.
    pub text: Option<String>,
    /// If set, the request will fail in the first `failures` attempts.
    /// `Some(0)` means the request will fail infinitely.
    pub failures: Option<u64>,
}

impl PresetResponse {
    /// Creates a `PresetResponse` that replies with the specified text.
    #[inline]
    pub fn with_text<S: Into<String>>(text: S) -> Self {
        Self {
            text: Some(text.into()),
            failures: None,
        }
    }

    /// Creates a `PresetResponse` that succeeds without any reply text.
    #[inline]
    pub fn empty() -> Self {
        Self {
            text: None,
            failures: None,
        }
    }

    /// Creates a `PresetResponse` that never succeeds.
    #[inline]
    pub fn unreachable() -> Self {
        Self::empty().with_failures(0)
    }

    /// Sets failure times before a successful response. `0` means the
    /// response will always be a failure.
    #[inline]
    pub fn with_failures(mut self, failures: u64) -> Self {
        self.failures = Some(failures);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_deserialize() {
        let response = PresetResponse::with_text("Vanakkam!").with_failures(3);

        let serialized = serde_json::to_string(&response).unwrap();
        let deserialized: PresetResponse =
            serde_json::from_str(&serialized).unwrap();

        assert_eq!(response, deserialized);
        assert_eq!(
            serialized,
            r#"{"text":"Vanakkam!","failures":3}"#
        );
    }
}
