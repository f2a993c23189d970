//! Metric name and label definitions.
//!
//! All metric names used by the gateway live here so the exported surface is
//! documented in one place.

/// HTTP request metrics
pub mod http {
    /// Total number of HTTP requests handled
    pub const REQUESTS_TOTAL: &str = "bpi_http_requests_total";
    /// Duration of HTTP requests in seconds
    pub const REQUEST_DURATION_SECONDS: &str = "bpi_http_request_duration_seconds";
    /// Requests currently being processed
    pub const REQUESTS_IN_FLIGHT: &str = "bpi_http_requests_in_flight";
}

/// DetectIntent pipeline metrics
pub mod detect_intent {
    /// Total number of DetectIntent requests
    pub const REQUESTS_TOTAL: &str = "bpi_detect_intent_requests_total";
    /// End-to-end DetectIntent duration in seconds
    pub const DURATION_SECONDS: &str = "bpi_detect_intent_duration_seconds";
    /// Requests whose input text was cut to the truncation limit
    pub const TRUNCATED_TOTAL: &str = "bpi_detect_intent_truncated_total";
    /// Requests answered with the empty fallback response
    pub const FAILURES_TOTAL: &str = "bpi_detect_intent_failures_total";
}

/// Trigger dispatch metrics
pub mod triggers {
    /// Triggers found in fulfillment messages
    pub const FOUND_TOTAL: &str = "bpi_triggers_found_total";
    /// Trigger handler errors
    pub const HANDLER_ERRORS_TOTAL: &str = "bpi_trigger_handler_errors_total";
    /// Dispatches that ended early with an override response
    pub const OVERRIDES_TOTAL: &str = "bpi_trigger_overrides_total";
}

/// Intent handler metrics
pub mod intents {
    /// Responses routed to a registered handler chain
    pub const ROUTED_TOTAL: &str = "bpi_intents_routed_total";
    /// Intent handler errors
    pub const HANDLER_ERRORS_TOTAL: &str = "bpi_intent_handler_errors_total";
}

/// Context reconciliation metrics
pub mod reconcile {
    /// Context updates pushed to the backend
    pub const UPDATES_TOTAL: &str = "bpi_reconcile_updates_total";
    /// Failed context updates
    pub const ERRORS_TOTAL: &str = "bpi_reconcile_errors_total";
    /// Changed contexts skipped because their lifespan expired
    pub const SKIPPED_TOTAL: &str = "bpi_reconcile_skipped_total";
}

/// QA race and session loop metrics
pub mod race {
    /// Race outcomes by winning source
    pub const WINNERS_TOTAL: &str = "bpi_race_winners_total";
    /// Number of live session loops
    pub const SESSIONS_ACTIVE: &str = "bpi_race_sessions_active";
    /// Session loops evicted after the idle timeout
    pub const SESSIONS_EVICTED_TOTAL: &str = "bpi_race_sessions_evicted_total";
}

/// Backend client metrics
pub mod backend {
    /// Backend calls by operation
    pub const CALLS_TOTAL: &str = "bpi_backend_calls_total";
    /// Backend call duration in seconds
    pub const CALL_DURATION_SECONDS: &str = "bpi_backend_call_duration_seconds";
    /// Failed backend calls
    pub const ERRORS_TOTAL: &str = "bpi_backend_errors_total";
}

/// Common label keys used across metrics
pub mod labels {
    pub const ENDPOINT: &str = "endpoint";
    pub const METHOD: &str = "method";
    pub const STATUS: &str = "status";
    pub const OPERATION: &str = "operation";
    pub const TRIGGER: &str = "trigger";
    pub const SOURCE: &str = "source";
    pub const BACKEND: &str = "backend";
}

/// Standard histogram buckets
pub mod buckets {
    use once_cell::sync::Lazy;

    /// HTTP request duration buckets (in seconds)
    /// Covers 1ms to 60s
    pub static HTTP_DURATION: Lazy<Vec<f64>> = Lazy::new(|| {
        vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
        ]
    });

    /// Backend call buckets (in seconds)
    /// NLU and QA calls sit between 10ms and 30s
    pub static BACKEND_DURATION: Lazy<Vec<f64>> = Lazy::new(|| {
        vec![
            0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 30.0,
        ]
    });
}
