//! The DetectIntent session pipeline.
//!
//! - [`service`]: truncation, backend call, trigger dispatch, intent routing
//! - [`race`]: NLU against QA, first good answer wins
//! - [`loops`]: per-session gates and idle eviction for the race
//! - [`reconcile`]: writing handler-made context changes back to the backend

pub mod error;
pub mod loops;
pub mod race;
pub mod reconcile;
pub mod service;

pub use {
    error::{Error, Result},
    loops::SessionLoops,
    race::{QaRace, RaceOutcome},
    reconcile::{ContextSnapshot, ReconcileHandle, Reconciler},
    service::{BpiService, BpiServiceBuilder, Turn, prepare_request},
};
