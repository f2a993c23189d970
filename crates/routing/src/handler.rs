use std::{future::Future, sync::Arc};

use {
    anyhow::Result,
    async_trait::async_trait,
    bpi_client::NluClient,
    bpi_protocol::DetectIntentResponse,
};

/// One step of an intent's handler chain.
///
/// Receives the response produced by the previous step and the backend
/// client, and returns the response for the next step.
#[async_trait]
pub trait IntentHandler: Send + Sync {
    async fn handle(
        &self,
        response: DetectIntentResponse,
        client: &Arc<dyn NluClient>,
    ) -> Result<DetectIntentResponse>;
}

/// Wraps a synchronous closure as an [`IntentHandler`].
pub struct FnIntentHandler<F>(F);

impl<F> FnIntentHandler<F>
where
    F: Fn(DetectIntentResponse, &dyn NluClient) -> Result<DetectIntentResponse> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F> IntentHandler for FnIntentHandler<F>
where
    F: Fn(DetectIntentResponse, &dyn NluClient) -> Result<DetectIntentResponse> + Send + Sync,
{
    async fn handle(
        &self,
        response: DetectIntentResponse,
        client: &Arc<dyn NluClient>,
    ) -> Result<DetectIntentResponse> {
        (self.0)(response, client.as_ref())
    }
}

/// Wraps an async closure as an [`IntentHandler`]. The closure gets its own
/// handle on the client so the returned future can be `'static`.
pub struct AsyncFnIntentHandler<F>(F);

impl<F, Fut> AsyncFnIntentHandler<F>
where
    F: Fn(DetectIntentResponse, Arc<dyn NluClient>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<DetectIntentResponse>> + Send + 'static,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F, Fut> IntentHandler for AsyncFnIntentHandler<F>
where
    F: Fn(DetectIntentResponse, Arc<dyn NluClient>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<DetectIntentResponse>> + Send + 'static,
{
    async fn handle(
        &self,
        response: DetectIntentResponse,
        client: &Arc<dyn NluClient>,
    ) -> Result<DetectIntentResponse> {
        (self.0)(response, Arc::clone(client)).await
    }
}

/// Box a synchronous closure for [`register`](crate::IntentHandlerRegistry::register).
pub fn handler_fn<F>(f: F) -> Arc<dyn IntentHandler>
where
    F: Fn(DetectIntentResponse, &dyn NluClient) -> Result<DetectIntentResponse>
        + Send
        + Sync
        + 'static,
{
    Arc::new(FnIntentHandler::new(f))
}

/// Box an async closure for [`register`](crate::IntentHandlerRegistry::register).
pub fn handler_async<F, Fut>(f: F) -> Arc<dyn IntentHandler>
where
    F: Fn(DetectIntentResponse, Arc<dyn NluClient>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<DetectIntentResponse>> + Send + 'static,
{
    Arc::new(AsyncFnIntentHandler::new(f))
}
