use confab_model::{ModelMessage, ModelReply, ModelRequest};
use serde::Serialize;
use serde_json::Value;

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Part {
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
}

// -----------
// Conversions
// -----------

pub fn create_request(req: &ModelRequest) -> GenerateContentRequest {
    let contents = req
        .messages
        .iter()
        .filter_map(|msg| match msg {
            ModelMessage::System(_) => None,
            ModelMessage::User(text) => Some(content("user", text)),
            ModelMessage::Assistant(text) => Some(content("model", text)),
        })
        .collect();
    GenerateContentRequest {
        contents,
        system_instruction: req.system_instruction().map(|text| {
            SystemInstruction {
                parts: vec![Part { text }],
            }
        }),
    }
}

#[inline]
fn content(role: &'static str, text: &str) -> Content {
    Content {
        role,
        parts: vec![Part {
            text: text.to_owned(),
        }],
    }
}

const REPLY_TEXT_POINTER: &str = "/candidates/0/content/parts/0/text";

/// Picks `candidates[0].content.parts[0].text`, if it is a string.
///
/// Any other shape is a reply without text, not an error.
pub fn into_reply(resp: &Value) -> ModelReply {
    let text = resp
        .pointer(REPLY_TEXT_POINTER)
        .and_then(Value::as_str)
        .map(ToOwned::to_owned);
    ModelReply { text }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_create_request() {
        let request = ModelRequest {
            messages: vec![
                ModelMessage::System("You are a pirate.".to_owned()),
                ModelMessage::User(
                    "Previous conversation: hi\nUser: ahoy".to_owned(),
                ),
            ],
        };
        let body = serde_json::to_value(create_request(&request)).unwrap();
        assert_eq!(
            body,
            json!({
                "contents": [{
                    "role": "user",
                    "parts": [{ "text": "Previous conversation: hi\nUser: ahoy" }]
                }],
                "systemInstruction": {
                    "parts": [{ "text": "You are a pirate." }]
                }
            })
        );
    }

    #[test]
    fn test_create_request_without_persona() {
        let request = ModelRequest {
            messages: vec![
                ModelMessage::User("hi".to_owned()),
                ModelMessage::Assistant("hello".to_owned()),
            ],
        };
        let body = serde_json::to_value(create_request(&request)).unwrap();
        assert!(body.get("systemInstruction").is_none());
        assert_eq!(body["contents"][1]["role"], "model");
    }

    #[test]
    fn test_into_reply() {
        let resp = json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{ "text": "first" }, { "text": "second" }]
                },
                "finishReason": "STOP"
            }]
        });
        assert_eq!(into_reply(&resp).text(), Some("first"));
    }

    #[test]
    fn test_into_reply_missing_fields() {
        for value in [
            json!({}),
            json!({ "candidates": null }),
            json!({ "candidates": [] }),
            json!({ "candidates": [{ "finishReason": "SAFETY" }] }),
            json!({ "candidates": [{ "content": { "parts": [] } }] }),
            json!({ "candidates": [{ "content": { "parts": [{}] } }] }),
        ] {
            assert_eq!(into_reply(&value), ModelReply::empty(), "{value}");
        }
    }

    #[test]
    fn test_into_reply_unexpected_shapes() {
        for value in [
            json!({ "candidates": { "oops": 1 } }),
            json!({ "candidates": [{ "content": { "parts": [{ "text": 5 }] } }] }),
            json!({ "candidates": [{ "content": "text" }] }),
            json!([1, 2, 3]),
            json!("hello"),
        ] {
            assert_eq!(into_reply(&value), ModelReply::empty(), "{value}");
        }
    }
}
