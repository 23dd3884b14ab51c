//! Message dispatch with delivery guarantees: the transcript, the context
//! window, the retry loop and the dispatcher that ties them together.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

pub mod context;
mod dispatcher;
mod model_client;
mod retry;
mod status;
pub mod transcript;

pub use dispatcher::{
    AdmissionPolicy, DEFAULT_FALLBACK_REPLY, Delivery, Dispatcher,
    DispatcherBuilder, IgnoreReason, TurnHandle, TurnOutcome, TurnReport,
};
pub use model_client::DEFAULT_PLACEHOLDER_REPLY;
pub use retry::RetryPolicy;
pub use status::DispatchStatus;
