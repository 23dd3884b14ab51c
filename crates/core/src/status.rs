use std::time::Duration;

/// What the dispatcher is doing right now.
///
/// The presentation layer shows a "composing" indicator whenever
/// [`DispatchStatus::is_busy`] is `true`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DispatchStatus {
    /// No turn is in flight.
    #[default]
    Idle,
    /// Waiting on the remote call of the given attempt (0 is the first).
    Composing {
        /// Index of the attempt being made.
        attempt: u32,
    },
    /// Attempt `attempt` failed; waiting `delay` before the next one.
    BackingOff {
        /// Index of the attempt that failed.
        attempt: u32,
        /// Time to wait before retrying.
        delay: Duration,
    },
}

impl DispatchStatus {
    /// Returns `true` while a turn is in flight.
    #[inline]
    pub fn is_busy(&self) -> bool {
        !matches!(self, DispatchStatus::Idle)
    }
}
