//! Route DetectIntent responses to handler chains by intent name.
//!
//! Handlers are registered under a regex over the intent's display name. The
//! most specific (longest) pattern that matches the start of the name
//! selects the chain; the response is folded through it in order.

pub mod error;
pub mod handler;
pub mod registry;

pub use {
    error::{Error, Result},
    handler::{AsyncFnIntentHandler, FnIntentHandler, IntentHandler, handler_async, handler_fn},
    registry::{IntentAssignor, IntentHandlerRegistry},
};
