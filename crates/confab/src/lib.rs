//! A chat session that delivers every message it accepts.
//!
//! The crate wires a [`Dispatcher`](core::Dispatcher) to a session
//! lifecycle, and ships a small CLI that talks to Gemini. Use it as a
//! library to put the same delivery guarantees behind your own front-end.

#![deny(missing_docs)]

#[allow(unused_imports)]
#[macro_use]
extern crate tracing;

mod session;

pub use session::{Session, SessionBuilder};

/// Re-exports of [`confab_core`] crate.
pub mod core {
    pub use confab_core::*;
}
