use std::error::Error;
use std::fmt;

/// Returned when a message is sent to an actor that has stopped.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct MailboxClosed;

impl fmt::Debug for MailboxClosed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailboxClosed").finish()
    }
}

impl fmt::Display for MailboxClosed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        "the actor mailbox is closed".fmt(f)
    }
}

impl Error for MailboxClosed {}
