//! Semantic validation of a loaded configuration.
//!
//! Parsing already guarantees the shape; these checks catch values that
//! parse but cannot work (zero workers, an invalid URL filter regex, ...).

use crate::schema::BpiConfig;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. "server.workers"
    pub path: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    fn push(&mut self, severity: Severity, path: &'static str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity,
            path,
            message: message.into(),
        });
    }
}

#[must_use]
pub fn validate(config: &BpiConfig) -> ValidationResult {
    let mut result = ValidationResult::default();

    if config.server.workers == 0 {
        result.push(Severity::Error, "server.workers", "must be at least 1");
    }
    if config.reconcile.max_concurrency == 0 {
        result.push(
            Severity::Error,
            "reconcile.max_concurrency",
            "must be at least 1",
        );
    }
    if config.session.sentence_truncation == 0 {
        result.push(
            Severity::Warning,
            "session.sentence_truncation",
            "every inbound text will be cut to nothing",
        );
    }
    if config.session.session_sweep_interval_secs == 0 {
        result.push(
            Severity::Error,
            "session.session_sweep_interval_secs",
            "must be at least 1",
        );
    }
    if config.nlu.host.trim().is_empty() {
        result.push(Severity::Error, "nlu.host", "must not be empty");
    }
    if config.qa.active {
        if config.qa.host.trim().is_empty() {
            result.push(Severity::Error, "qa.host", "must not be empty when qa is active");
        }
        if let Err(e) = regex::Regex::new(&config.qa.url_filter.fallback) {
            result.push(
                Severity::Warning,
                "qa.url_filter.fallback",
                format!("not a valid regex: {e}"),
            );
        }
    }
    if config.nlu.token.is_some() && !config.nlu.secure {
        result.push(
            Severity::Warning,
            "nlu.token",
            "token is sent over plain http",
        );
    }

    result
}
