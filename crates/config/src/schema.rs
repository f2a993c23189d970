//! Config schema types.
use std::collections::BTreeMap;

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BpiConfig {
    pub server: ServerConfig,
    pub nlu: NluConfig,
    pub qa: QaConfig,
    pub session: SessionConfig,
    pub reconcile: ReconcileConfig,
    pub metrics: MetricsConfig,
}

/// Listener and runtime sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to. Defaults to "0.0.0.0".
    pub bind: String,
    pub port: u16,
    /// Worker threads of the request runtime.
    pub workers: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 50051,
            workers: 10,
        }
    }
}

/// Connection to the NLU backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NluConfig {
    pub host: String,
    pub port: u16,
    /// Use https when talking to the backend.
    pub secure: bool,
    /// Bearer token sent with every backend call.
    #[serde(
        default,
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub token: Option<Secret<String>>,
    pub user: Option<String>,
    #[serde(
        default,
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub password: Option<Secret<String>>,
    /// Language used by helper requests that do not carry one.
    pub default_language: String,
}

impl Default for NluConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 50055,
            secure: false,
            token: None,
            user: None,
            password: None,
            default_language: "de-DE".into(),
        }
    }
}

impl NluConfig {
    #[must_use]
    pub fn base_url(&self) -> String {
        base_url(self.secure, &self.host, self.port)
    }
}

/// Question-answering backend and the race against the NLU backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QaConfig {
    /// Race every turn against the QA backend.
    pub active: bool,
    pub host: String,
    pub port: u16,
    pub secure: bool,
    pub language: String,
    pub max_answers: u32,
    pub threshold_reader: f32,
    pub threshold_retriever: f32,
    pub url_filter: QaUrlFilterConfig,
}

impl Default for QaConfig {
    fn default() -> Self {
        Self {
            active: false,
            host: "localhost".into(),
            port: 50056,
            secure: false,
            language: "de".into(),
            max_answers: 1,
            threshold_reader: 0.5,
            threshold_retriever: 0.5,
            url_filter: QaUrlFilterConfig::default(),
        }
    }
}

impl QaConfig {
    #[must_use]
    pub fn base_url(&self) -> String {
        base_url(self.secure, &self.host, self.port)
    }
}

/// Where the per-session QA URL filter is read from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QaUrlFilterConfig {
    /// Short name of the session context holding the filter.
    pub context: String,
    /// Parameter with the session's standing filter.
    pub default_param: String,
    /// Parameter with a one-off filter that wins over the standing one.
    pub provisional_param: String,
    /// Filter used when the context cannot be read.
    pub fallback: String,
}

impl Default for QaUrlFilterConfig {
    fn default() -> Self {
        Self {
            context: "qa_url_filter".into(),
            default_param: "default_url_filter".into(),
            provisional_param: "provisional_url_filter".into(),
            fallback: ".*".into(),
        }
    }
}

/// Per-request session handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Inbound text is cut to this many characters.
    pub sentence_truncation: usize,
    /// Idle session loops are evicted after this many minutes.
    pub session_timeout_minutes: u64,
    /// Tick of the background eviction sweep.
    pub session_sweep_interval_secs: u64,
    /// Intent display name that lets the QA backend answer instead.
    pub fallback_intent: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sentence_truncation: 130,
            session_timeout_minutes: 10,
            session_sweep_interval_secs: 60,
            fallback_intent: "Default Fallback Intent".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Concurrent context updates across all requests.
    pub max_concurrency: usize,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self { max_concurrency: 10 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Install the Prometheus recorder and serve `/metrics`. Defaults to true.
    pub enabled: bool,
    /// Extra labels added to every exported metric.
    pub labels: BTreeMap<String, String>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            labels: BTreeMap::new(),
        }
    }
}

fn base_url(secure: bool, host: &str, port: u16) -> String {
    let scheme = if secure { "https" } else { "http" };
    format!("{scheme}://{host}:{port}")
}

// ── Serde helpers for Secret<String> ────────────────────────────────────────

fn serialize_option_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}
