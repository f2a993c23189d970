//! Wire data model shared by the gateway, the backend clients and the
//! dispatch pipeline.
//!
//! All types serialize to the camel-cased JSON used by the NLU backend:
//! - `DetectIntentRequest` / `DetectIntentResponse`: one conversational turn
//! - `Message`: a fulfillment message (text, card or an opaque payload)
//! - `Context`: a named, lifespan-bounded parameter bag
//! - `GetAnswerRequest` / `GetAnswerResponse`: the question-answering backend

mod context;
mod message;
pub mod names;
mod qa;
mod session;

use serde::{Deserialize, Serialize};

pub use {
    context::{Context, ContextParameter},
    message::{Card, CardButton, Message, TextMessage},
    qa::{GetAnswerRequest, GetAnswerResponse, UrlFilter},
    session::{
        DetectIntentRequest, DetectIntentResponse, Intent, QueryInput, QueryParameters,
        QueryResult, TextInput,
    },
};

// ── Constants ────────────────────────────────────────────────────────────────

/// Display name the backend assigns when no intent matched.
pub const DEFAULT_FALLBACK_INTENT: &str = "Default Fallback Intent";
/// Key of the session id inside `diagnostic_info`.
pub const DIAGNOSTIC_SESSION_ID: &str = "sessionId";
/// Text used in place of a missing text input.
pub const ERROR_SENTINEL_TEXT: &str = "error";
pub const DEFAULT_LANGUAGE: &str = "de-DE";

// ── Error codes ──────────────────────────────────────────────────────────────

pub mod error_codes {
    pub const INVALID_REQUEST: &str = "INVALID_REQUEST";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const BACKEND_UNAVAILABLE: &str = "BACKEND_UNAVAILABLE";
    pub const INTERNAL: &str = "INTERNAL";
}

// ── Error shape ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorShape {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

impl ErrorShape {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            retryable: None,
        }
    }

    #[must_use]
    pub fn retryable(mut self, retryable: bool) -> Self {
        self.retryable = Some(retryable);
        self
    }
}
