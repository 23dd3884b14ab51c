//! An abstraction layer for remote text generation endpoints.
//!
//! This crate establishes the protocol the dispatcher uses to talk to a
//! generative model, so that the transport (an HTTP API, a scripted fake
//! for tests, ...) can be swapped without touching the dispatch logic.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that the implementors should adhere to.

#![deny(missing_docs)]

mod error;
mod provider;
mod request;
mod response;

pub use error::*;
pub use provider::*;
pub use request::*;
pub use response::*;
