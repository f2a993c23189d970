use {
    anyhow::Result,
    async_trait::async_trait,
    bpi_protocol::{DetectIntentResponse, Message},
    tracing::warn,
};

use crate::kind::{FoundTriggers, TriggerKind};

/// Reacts to one trigger found in one message.
///
/// Returning a response whose `response_id` differs from the input ends
/// dispatch and replaces the whole turn's answer. Returning `None` (or a
/// response with the same id) continues with the next trigger.
#[async_trait]
pub trait TriggerHandler: Send + Sync {
    async fn handle(
        &self,
        response: &DetectIntentResponse,
        message: &Message,
        trigger: TriggerKind,
        found: &FoundTriggers,
    ) -> Result<Option<DetectIntentResponse>>;
}

/// Default binding for every kind until something else is registered.
pub struct NotImplemented;

#[async_trait]
impl TriggerHandler for NotImplemented {
    async fn handle(
        &self,
        _response: &DetectIntentResponse,
        _message: &Message,
        trigger: TriggerKind,
        found: &FoundTriggers,
    ) -> Result<Option<DetectIntentResponse>> {
        warn!(
            trigger = %trigger,
            content = ?found.get(trigger).unwrap_or_default(),
            "no handler registered for trigger"
        );
        Ok(None)
    }
}

/// Wraps a synchronous closure as a [`TriggerHandler`].
pub struct FnTriggerHandler<F>(F);

impl<F> FnTriggerHandler<F>
where
    F: Fn(
            &DetectIntentResponse,
            &Message,
            TriggerKind,
            &FoundTriggers,
        ) -> Result<Option<DetectIntentResponse>>
        + Send
        + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F> TriggerHandler for FnTriggerHandler<F>
where
    F: Fn(
            &DetectIntentResponse,
            &Message,
            TriggerKind,
            &FoundTriggers,
        ) -> Result<Option<DetectIntentResponse>>
        + Send
        + Sync,
{
    async fn handle(
        &self,
        response: &DetectIntentResponse,
        message: &Message,
        trigger: TriggerKind,
        found: &FoundTriggers,
    ) -> Result<Option<DetectIntentResponse>> {
        (self.0)(response, message, trigger, found)
    }
}

/// Out-of-turn delivery of messages, e.g. to a telephony endpoint that wants
/// to speak each message as soon as it is ready.
///
/// Called once per message after that message's triggers ran, with the
/// message index. A response without messages produces a single call with
/// `None` and index 0.
#[async_trait]
pub trait PartialSend: Send + Sync {
    async fn send(&self, response: &DetectIntentResponse, message: Option<&Message>, index: usize);
}
