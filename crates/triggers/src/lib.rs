//! Trigger markers embedded in fulfillment messages and the handlers that
//! react to them.
//!
//! A response's messages are scanned for every [`TriggerKind`]; each kind
//! found is passed to the handler bound in the [`TriggerRegistry`].

pub mod handler;
pub mod kind;
pub mod registry;
pub mod response;

pub use {
    handler::{FnTriggerHandler, NotImplemented, PartialSend, TriggerHandler},
    kind::{FoundTriggers, TriggerKind, UnknownTrigger},
    registry::{TriggerRegistry, scan},
    response::{check_for_triggers, remove_triggers},
};
