//! Builds the conversational grounding sent along with each new input.

use crate::transcript::Message;

/// The number of recent messages sent as context by default.
pub const DEFAULT_WINDOW_SIZE: usize = 5;

/// Returns the content of the last `n` messages, oldest first, one per line.
///
/// Roles are not included. An empty slice gives an empty string.
pub fn window(messages: &[Message], n: usize) -> String {
    let start = messages.len().saturating_sub(n);
    messages[start..]
        .iter()
        .map(Message::content)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log(len: usize) -> Vec<Message> {
        (0..len)
            .map(|i| {
                if i % 2 == 0 {
                    Message::user(format!("m{i}"))
                } else {
                    Message::assistant(format!("m{i}"))
                }
            })
            .collect()
    }

    #[test]
    fn test_empty_log() {
        assert_eq!(window(&[], DEFAULT_WINDOW_SIZE), "");
    }

    #[test]
    fn test_shorter_than_window() {
        assert_eq!(window(&log(3), DEFAULT_WINDOW_SIZE), "m0\nm1\nm2");
    }

    #[test]
    fn test_takes_most_recent() {
        assert_eq!(
            window(&log(8), DEFAULT_WINDOW_SIZE),
            "m3\nm4\nm5\nm6\nm7"
        );
        assert_eq!(window(&log(8), 1), "m7");
        assert_eq!(window(&log(8), 0), "");
    }

    #[test]
    fn test_min_len_entries() {
        for len in 0..12 {
            let text = window(&log(len), DEFAULT_WINDOW_SIZE);
            let lines = if text.is_empty() {
                0
            } else {
                text.lines().count()
            };
            assert_eq!(lines, len.min(DEFAULT_WINDOW_SIZE));
        }
    }
}
