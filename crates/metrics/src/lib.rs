//! Metrics collection and export for the bpi gateway.
//!
//! Every crate records through the `metrics` facade using the names defined
//! here. When the `prometheus` feature is enabled, [`init_metrics`] installs a Prometheus recorder whose text
//! rendering is served at `/metrics`.
//!
//! ```rust,ignore
//! use bpi_metrics::{counter, detect_intent, labels};
//!
//! counter!(detect_intent::REQUESTS_TOTAL, labels::SOURCE => "nlu").increment(1);
//! ```

mod definitions;
mod recorder;

pub use {
    definitions::*,
    recorder::{MetricsHandle, MetricsRecorderConfig, init_metrics},
};

pub use metrics::{counter, gauge, histogram};
