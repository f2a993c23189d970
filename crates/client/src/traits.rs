use {
    async_trait::async_trait,
    bpi_protocol::{
        Context, DetectIntentRequest, DetectIntentResponse, GetAnswerRequest, GetAnswerResponse,
    },
};

use crate::Result;

/// Turn detection and session-context access on the NLU backend.
#[async_trait]
pub trait NluClient: Send + Sync {
    async fn detect_intent(&self, request: DetectIntentRequest) -> Result<DetectIntentResponse>;

    /// Fetch a context by its full name. A missing context is
    /// [`Error::NotFound`](crate::Error::NotFound).
    async fn get_context(&self, name: &str) -> Result<Context>;

    async fn update_context(&self, context: Context) -> Result<Context>;

    async fn create_context(&self, session: &str, context: Context) -> Result<Context>;

    async fn delete_context(&self, name: &str) -> Result<()>;
}

/// The question-answering backend.
#[async_trait]
pub trait QaClient: Send + Sync {
    async fn get_answer(&self, request: GetAnswerRequest) -> Result<GetAnswerResponse>;
}
