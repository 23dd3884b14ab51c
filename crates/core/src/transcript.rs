//! The transcript log: what the user sees and what the model is grounded
//! on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who produced a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person typing.
    User,
    /// The remote model, or the dispatcher speaking on its behalf.
    Assistant,
}

/// A message in the transcript.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Message {
    role: Role,
    content: String,
    timestamp: DateTime<Utc>,
}

impl Message {
    /// Creates a message stamped with the current time.
    #[inline]
    pub fn new<S: Into<String>>(role: Role, content: S) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Creates a user message.
    #[inline]
    pub fn user<S: Into<String>>(content: S) -> Self {
        Self::new(Role::User, content)
    }

    /// Creates an assistant message.
    #[inline]
    pub fn assistant<S: Into<String>>(content: S) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Returns who produced this message.
    #[inline]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Returns the message text.
    #[inline]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Returns when the message was created.
    #[inline]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// An append-only, ordered log of messages.
#[derive(Clone, Default, Debug)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    /// Appends a message to the end of the log and returns the stored copy.
    ///
    /// Timestamps never go backwards within a log: if the wall clock has
    /// moved back since the previous entry, the new entry takes the
    /// previous timestamp.
    pub fn append(&mut self, mut message: Message) -> &Message {
        if let Some(last) = self.messages.last() {
            if message.timestamp < last.timestamp {
                message.timestamp = last.timestamp;
            }
        }
        self.messages.push(message);
        let last = self.messages.len() - 1;
        &self.messages[last]
    }

    /// Returns the current ordered sequence.
    #[inline]
    pub fn snapshot(&self) -> &[Message] {
        &self.messages
    }

    /// Returns the number of messages.
    #[inline]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns `true` if nothing has been appended yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;

    #[test]
    fn test_append_keeps_order() {
        let mut transcript = Transcript::default();
        transcript.append(Message::user("one"));
        transcript.append(Message::assistant("two"));
        transcript.append(Message::user("three"));

        let contents: Vec<_> =
            transcript.snapshot().iter().map(Message::content).collect();
        assert_eq!(contents, ["one", "two", "three"]);
        assert_eq!(transcript.snapshot()[1].role(), Role::Assistant);
    }

    #[test]
    fn test_timestamps_never_decrease() {
        let mut transcript = Transcript::default();
        let first = transcript.append(Message::user("now")).timestamp();

        let mut stale = Message::assistant("from the past");
        stale.timestamp = first - TimeDelta::seconds(30);
        let stored = transcript.append(stale);
        assert_eq!(stored.timestamp(), first);
    }

    #[test]
    fn test_serialize_role() {
        let value = serde_json::to_value(Message::user("hi")).unwrap();
        assert_eq!(value["role"], "user");
        assert_eq!(value["content"], "hi");
    }
}
