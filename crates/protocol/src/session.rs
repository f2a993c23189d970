use serde::{Deserialize, Serialize};

use crate::{Context, DIAGNOSTIC_SESSION_ID, Message};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TextInput {
    pub text: String,
    pub language_code: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<TextInput>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryParameters {
    pub contexts: Vec<Context>,
}

/// One conversational turn sent to the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DetectIntentRequest {
    pub session: String,
    pub query_input: QueryInput,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_params: Option<QueryParameters>,
}

impl DetectIntentRequest {
    /// A plain text request for `session`.
    pub fn text(
        session: impl Into<String>,
        text: impl Into<String>,
        language_code: impl Into<String>,
    ) -> Self {
        Self {
            session: session.into(),
            query_input: QueryInput {
                text: Some(TextInput {
                    text: text.into(),
                    language_code: language_code.into(),
                }),
            },
            query_params: None,
        }
    }

    #[must_use]
    pub fn with_contexts(mut self, contexts: Vec<Context>) -> Self {
        self.query_params = Some(QueryParameters { contexts });
        self
    }

    #[must_use]
    pub fn input_text(&self) -> Option<&str> {
        self.query_input.text.as_ref().map(|t| t.text.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Intent {
    pub name: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QueryResult {
    pub query_text: String,
    pub language_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<Intent>,
    pub intent_detection_confidence: f32,
    pub fulfillment_messages: Vec<Message>,
    pub output_contexts: Vec<Context>,
    pub diagnostic_info: serde_json::Map<String, serde_json::Value>,
}

/// The backend's answer to a [`DetectIntentRequest`].
///
/// The default value is the empty response returned when a turn cannot be
/// completed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DetectIntentResponse {
    pub response_id: String,
    pub query_result: QueryResult,
}

impl DetectIntentResponse {
    /// Session id recorded by the backend in `diagnostic_info`.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.query_result
            .diagnostic_info
            .get(DIAGNOSTIC_SESSION_ID)
            .and_then(|v| v.as_str())
    }

    /// Display name of the matched intent, empty if none.
    #[must_use]
    pub fn intent_display_name(&self) -> &str {
        self.query_result
            .intent
            .as_ref()
            .map_or("", |i| i.display_name.as_str())
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.query_result.fulfillment_messages
    }

    #[must_use]
    pub fn contexts(&self) -> &[Context] {
        &self.query_result.output_contexts
    }
}
