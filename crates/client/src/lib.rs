//! Clients for the backends the gateway fronts.
//!
//! [`NluClient`] covers turn detection and session-context CRUD on the NLU
//! backend, [`QaClient`] the question-answering backend. Both have an HTTP
//! implementation; [`MemoryNluClient`] and [`MemoryQaClient`] keep everything
//! in process for local runs and tests.

pub mod error;
pub mod helpers;
mod http;
mod memory;
mod traits;

pub use {
    error::{Error, Result},
    http::{HttpNluClient, HttpQaClient},
    memory::{MemoryNluClient, MemoryQaClient},
    traits::{NluClient, QaClient},
};
