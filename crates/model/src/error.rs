use std::fmt::{self, Display};

/// The kind of error that occurred.
///
/// Every kind is a failed delivery from the dispatcher's point of view. A
/// response that arrived intact but carried no reply text is not an error
/// at all, see [`crate::ModelReply`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The endpoint could not be reached (connect failure, timeout).
    Unreachable,
    /// The endpoint answered with a non-success status.
    HttpStatus(u16),
    /// The model provider is rate limited.
    RateLimitExceeded,
    /// The response body could not be decoded.
    InvalidPayload,
    /// Any other errors.
    Other,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Unreachable => write!(f, "Endpoint unreachable"),
            ErrorKind::HttpStatus(code) => write!(f, "HTTP status {code}"),
            ErrorKind::RateLimitExceeded => write!(f, "Rate limit exceeded"),
            ErrorKind::InvalidPayload => write!(f, "Invalid payload"),
            ErrorKind::Other => write!(f, "Other error"),
        }
    }
}
