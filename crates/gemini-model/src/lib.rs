//! A model provider for the Gemini `generateContent` API.

#[macro_use]
extern crate tracing;

mod config;
mod proto;

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::sync::Arc;

use confab_model::{
    ErrorKind, ModelProvider, ModelProviderError, ModelReply, ModelRequest,
};
use mime::Mime;
use reqwest::{Client, StatusCode, header};
use serde_json::Value;

pub use config::{GeminiConfig, GeminiConfigBuilder};

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Error type for [`GeminiProvider`].
#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Error {
    fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }

    fn from_reqwest(err: reqwest::Error) -> Self {
        let kind = if err.is_connect() || err.is_timeout() {
            ErrorKind::Unreachable
        } else if err.is_decode() || err.is_body() {
            ErrorKind::InvalidPayload
        } else {
            ErrorKind::Other
        };
        Self::new(format!("{err}"), kind)
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// Gemini model provider.
#[derive(Clone, Debug)]
pub struct GeminiProvider {
    client: Client,
    config: Arc<GeminiConfig>,
}

impl GeminiProvider {
    /// Creates a new `GeminiProvider` with the given configuration.
    #[inline]
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            client: Client::new(),
            config: Arc::new(config),
        }
    }
}

impl ModelProvider for GeminiProvider {
    type Error = Error;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<ModelReply, Self::Error>> + Send + 'static
    {
        let gemini_req = proto::create_request(req);
        let resp_fut = self
            .client
            .post(self.config.generate_content_url())
            .header(API_KEY_HEADER, &self.config.api_key)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "application/json")
            .timeout(self.config.timeout)
            .json(&gemini_req)
            .send();

        async move {
            let resp = resp_fut.await.map_err(Error::from_reqwest)?;

            let status = resp.status();
            if !status.is_success() {
                let kind = if status == StatusCode::TOO_MANY_REQUESTS {
                    ErrorKind::RateLimitExceeded
                } else {
                    ErrorKind::HttpStatus(status.as_u16())
                };
                return Err(Error::new(format!("server returned {status}"), kind));
            }

            // A missing content type is tolerated, a wrong one is not.
            let content_type = resp
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(ToOwned::to_owned);
            if let Some(content_type) = &content_type {
                let is_json = content_type
                    .parse()
                    .map(|m: Mime| m.subtype() == mime::JSON)
                    .unwrap_or(false);
                if !is_json {
                    return Err(Error::new(
                        format!("Unexpected content type: {content_type:?}"),
                        ErrorKind::InvalidPayload,
                    ));
                }
            }

            let body = resp.bytes().await.map_err(Error::from_reqwest)?;
            // Only a body that is not JSON at all is a failure; a JSON body of
            // any shape is a delivered reply.
            let parsed: Value = serde_json::from_slice(&body).map_err(|err| {
                Error::new(format!("{err}"), ErrorKind::InvalidPayload)
            })?;
            trace!("got a response: {parsed}");

            Ok(proto::into_reply(&parsed))
        }
    }
}

#[cfg(test)]
mod tests {
    use confab_model::ModelMessage;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    use super::*;

    /// Serves a single canned HTTP response and hands back the raw request.
    async fn serve_once(
        status_line: &'static str,
        content_type: &'static str,
        body: &'static str,
    ) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let (req_tx, req_rx) = oneshot::channel();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = stream.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&raw).to_string();
                let Some(head_end) = text.find("\r\n\r\n") else {
                    continue;
                };
                let content_length = text[..head_end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if raw.len() >= head_end + 4 + content_length {
                    break;
                }
            }
            let resp = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: {content_type}\r\n\
                 Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(resp.as_bytes()).await.unwrap();
            stream.shutdown().await.ok();
            req_tx.send(String::from_utf8_lossy(&raw).to_string()).ok();
        });
        (base_url, req_rx)
    }

    fn provider(base_url: &str) -> GeminiProvider {
        let config = GeminiConfigBuilder::with_api_key("secret")
            .with_base_url(base_url)
            .with_model("test-model")
            .build();
        GeminiProvider::new(config)
    }

    fn request() -> ModelRequest {
        ModelRequest {
            messages: vec![
                ModelMessage::System("Be nice.".to_owned()),
                ModelMessage::User(
                    "Previous conversation: \nUser: hello".to_owned(),
                ),
            ],
        }
    }

    #[tokio::test]
    async fn test_successful_reply() {
        let (base_url, req_rx) = serve_once(
            "200 OK",
            "application/json; charset=UTF-8",
            r#"{"candidates":[{"content":{"parts":[{"text":"hi there"}]}}]}"#,
        )
        .await;
        let reply = provider(&base_url).send_request(&request()).await.unwrap();
        assert_eq!(reply.text(), Some("hi there"));

        let raw = req_rx.await.unwrap();
        let lowered = raw.to_ascii_lowercase();
        assert!(
            lowered.starts_with("post /models/test-model:generatecontent ")
        );
        assert!(lowered.contains("x-goog-api-key: secret"));
        assert!(raw.contains(r#""systemInstruction":{"parts":[{"text":"Be nice."}]}"#));
    }

    #[tokio::test]
    async fn test_missing_candidates_is_not_an_error() {
        let (base_url, _req_rx) =
            serve_once("200 OK", "application/json", r#"{"candidates":[]}"#)
                .await;
        let reply = provider(&base_url).send_request(&request()).await.unwrap();
        assert_eq!(reply, ModelReply::empty());
    }

    #[tokio::test]
    async fn test_unexpected_shape_is_not_an_error() {
        for body in [
            r#"{"candidates":{"oops":1}}"#,
            r#"{"candidates":[{"content":{"parts":[{"text":5}]}}]}"#,
        ] {
            let (base_url, _req_rx) =
                serve_once("200 OK", "application/json", body).await;
            let reply =
                provider(&base_url).send_request(&request()).await.unwrap();
            assert_eq!(reply, ModelReply::empty(), "{body}");
        }
    }

    #[tokio::test]
    async fn test_error_status() {
        let (base_url, _req_rx) = serve_once(
            "503 Service Unavailable",
            "application/json",
            r#"{"error":{}}"#,
        )
        .await;
        let err = provider(&base_url)
            .send_request(&request())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::HttpStatus(503));

        let (base_url, _req_rx) = serve_once(
            "429 Too Many Requests",
            "application/json",
            r#"{"error":{}}"#,
        )
        .await;
        let err = provider(&base_url)
            .send_request(&request())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RateLimitExceeded);
    }

    #[tokio::test]
    async fn test_invalid_payload() {
        let (base_url, _req_rx) =
            serve_once("200 OK", "text/html", "<html></html>").await;
        let err = provider(&base_url)
            .send_request(&request())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPayload);

        let (base_url, _req_rx) =
            serve_once("200 OK", "application/json", "{not json").await;
        let err = provider(&base_url)
            .send_request(&request())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPayload);
    }

    #[tokio::test]
    async fn test_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let err = provider(&base_url)
            .send_request(&request())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unreachable);
    }
}
