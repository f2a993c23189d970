//! In-process backends for local runs and tests. No persistence.

use std::{
    collections::{BTreeMap, VecDeque},
    sync::{
        Mutex,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use {
    async_trait::async_trait,
    bpi_protocol::{
        Context, DEFAULT_FALLBACK_INTENT, DIAGNOSTIC_SESSION_ID, DetectIntentRequest,
        DetectIntentResponse, GetAnswerRequest, GetAnswerResponse, Intent, QueryResult,
    },
};

use crate::{Error, NluClient, QaClient, Result};

/// NLU backend that answers from a queue of scripted responses and keeps
/// contexts in a map.
///
/// When the queue is empty, `detect_intent` answers with the fallback intent
/// and the session's current contexts.
#[derive(Default)]
pub struct MemoryNluClient {
    responses: Mutex<VecDeque<DetectIntentResponse>>,
    contexts: Mutex<BTreeMap<String, Context>>,
    requests: Mutex<Vec<DetectIntentRequest>>,
    updates: Mutex<Vec<Context>>,
    delay: Option<Duration>,
    failure: Option<String>,
    counter: AtomicU64,
}

impl MemoryNluClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every `detect_intent` call.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Make every `detect_intent` call fail with `message`.
    #[must_use]
    pub fn with_failure(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    pub fn push_response(&self, response: DetectIntentResponse) {
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(response);
    }

    pub fn insert_context(&self, context: Context) {
        self.contexts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(context.name.clone(), context);
    }

    #[must_use]
    pub fn context(&self, name: &str) -> Option<Context> {
        self.contexts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
    }

    /// Every `detect_intent` request received, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<DetectIntentRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Every context passed to `update_context`, in order.
    #[must_use]
    pub fn updates(&self) -> Vec<Context> {
        self.updates
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn session_contexts(&self, session: &str) -> Vec<Context> {
        let prefix = format!("{session}/contexts/");
        self.contexts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .filter(|c| c.name.starts_with(&prefix))
            .cloned()
            .collect()
    }

    fn fallback_response(&self, request: &DetectIntentRequest) -> DetectIntentResponse {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        let mut diagnostic_info = serde_json::Map::new();
        diagnostic_info.insert(
            DIAGNOSTIC_SESSION_ID.to_string(),
            serde_json::Value::String(request.session.clone()),
        );
        DetectIntentResponse {
            response_id: format!("memory-{n}"),
            query_result: QueryResult {
                query_text: request.input_text().unwrap_or_default().to_string(),
                language_code: request
                    .query_input
                    .text
                    .as_ref()
                    .map(|t| t.language_code.clone())
                    .unwrap_or_default(),
                intent: Some(Intent {
                    name: String::new(),
                    display_name: DEFAULT_FALLBACK_INTENT.to_string(),
                }),
                output_contexts: self.session_contexts(&request.session),
                diagnostic_info,
                ..QueryResult::default()
            },
        }
    }
}

#[async_trait]
impl NluClient for MemoryNluClient {
    async fn detect_intent(&self, request: DetectIntentRequest) -> Result<DetectIntentResponse> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = &self.failure {
            return Err(Error::message(message.clone()));
        }
        for context in request
            .query_params
            .iter()
            .flat_map(|p| p.contexts.iter())
        {
            self.insert_context(context.clone());
        }
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());

        let scripted = self
            .responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        Ok(scripted.unwrap_or_else(|| self.fallback_response(&request)))
    }

    async fn get_context(&self, name: &str) -> Result<Context> {
        self.context(name).ok_or_else(|| Error::not_found(name))
    }

    async fn update_context(&self, context: Context) -> Result<Context> {
        self.updates
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(context.clone());
        let mut contexts = self.contexts.lock().unwrap_or_else(|e| e.into_inner());
        if !contexts.contains_key(&context.name) {
            return Err(Error::not_found(context.name));
        }
        contexts.insert(context.name.clone(), context.clone());
        Ok(context)
    }

    async fn create_context(&self, session: &str, context: Context) -> Result<Context> {
        if !context.name.starts_with(session) {
            return Err(Error::message(format!(
                "context {} does not belong to session {session}",
                context.name
            )));
        }
        self.insert_context(context.clone());
        Ok(context)
    }

    async fn delete_context(&self, name: &str) -> Result<()> {
        self.contexts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(name))
    }
}

/// QA backend with a fixed answer.
#[derive(Default)]
pub struct MemoryQaClient {
    answer: GetAnswerResponse,
    delay: Option<Duration>,
    failure: Option<String>,
    requests: Mutex<Vec<GetAnswerRequest>>,
}

impl MemoryQaClient {
    pub fn new(answer: GetAnswerResponse) -> Self {
        Self {
            answer,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    #[must_use]
    pub fn with_failure(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    #[must_use]
    pub fn requests(&self) -> Vec<GetAnswerRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl QaClient for MemoryQaClient {
    async fn get_answer(&self, request: GetAnswerRequest) -> Result<GetAnswerResponse> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.failure {
            Some(message) => Err(Error::message(message.clone())),
            None => Ok(self.answer.clone()),
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    const SESSION: &str = "projects/p/agent/sessions/s";

    #[tokio::test]
    async fn scripted_responses_come_first() {
        let client = MemoryNluClient::new();
        client.push_response(DetectIntentResponse {
            response_id: "scripted".into(),
            ..DetectIntentResponse::default()
        });

        let request = DetectIntentRequest::text(SESSION, "hallo", "de-DE");
        let first = client.detect_intent(request.clone()).await.unwrap();
        let second = client.detect_intent(request).await.unwrap();

        assert_eq!(first.response_id, "scripted");
        assert_eq!(second.intent_display_name(), DEFAULT_FALLBACK_INTENT);
        assert_eq!(second.session_id(), Some(SESSION));
        assert_eq!(client.requests().len(), 2);
    }

    #[tokio::test]
    async fn query_param_contexts_are_stored() {
        let client = MemoryNluClient::new();
        let ctx = Context::new(format!("{SESSION}/contexts/exact_intent"), 1);
        let request =
            DetectIntentRequest::text(SESSION, "x", "de-DE").with_contexts(vec![ctx.clone()]);
        let response = client.detect_intent(request).await.unwrap();
        assert_eq!(response.contexts(), [ctx]);
    }

    #[tokio::test]
    async fn update_of_unknown_context_is_not_found() {
        let client = MemoryNluClient::new();
        let err = client
            .update_context(Context::new("nope", 1))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(client.updates().len(), 1);
    }

    #[tokio::test]
    async fn qa_failure() {
        let client = MemoryQaClient::default().with_failure("qa down");
        assert!(client.get_answer(GetAnswerRequest::default()).await.is_err());
        assert_eq!(client.requests().len(), 1);
    }
}
