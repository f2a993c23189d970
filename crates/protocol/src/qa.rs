use serde::{Deserialize, Serialize};

use crate::{DetectIntentResponse, TextInput};

/// Regex inclusion filter over source URLs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UrlFilter {
    pub regex_filter_include: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GetAnswerRequest {
    pub session_id: String,
    pub text: TextInput,
    pub max_num_answers: u32,
    pub threshold_reader: f32,
    pub threshold_retriever: f32,
    pub url_filter: UrlFilter,
}

/// The QA backend wraps its answer in a full DetectIntent response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GetAnswerResponse {
    pub query_result: DetectIntentResponse,
}

impl GetAnswerResponse {
    /// True when the embedded response carries at least one fulfillment message.
    #[must_use]
    pub fn has_answer(&self) -> bool {
        !self.query_result.messages().is_empty()
    }
}
