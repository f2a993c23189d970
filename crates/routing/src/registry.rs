use std::{cmp::Reverse, sync::Arc};

use {
    bpi_client::NluClient,
    bpi_protocol::DetectIntentResponse,
    regex::Regex,
    tracing::{debug, info, warn},
};

#[cfg(feature = "metrics")]
use bpi_metrics::{counter, intents as intent_metrics, labels};

use crate::{
    Error, Result,
    handler::{IntentHandler, handler_fn},
};

/// An intent pattern and the handlers it routes to.
pub struct IntentAssignor {
    pattern: String,
    re: Regex,
    handlers: Vec<Arc<dyn IntentHandler>>,
}

impl IntentAssignor {
    /// Compile `pattern` anchored at the start of the intent name.
    pub fn new(pattern: impl Into<String>, handlers: Vec<Arc<dyn IntentHandler>>) -> Result<Self> {
        let pattern = pattern.into();
        let re = Regex::new(&format!("^(?:{pattern})")).map_err(|source| Error::InvalidPattern {
            pattern: pattern.clone(),
            source,
        })?;
        Ok(Self {
            pattern,
            re,
            handlers,
        })
    }

    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Longer patterns are considered more specific.
    #[must_use]
    pub fn sort_key(&self) -> usize {
        self.pattern.len()
    }

    #[must_use]
    pub fn matches(&self, intent_name: &str) -> bool {
        self.re.is_match(intent_name)
    }

    #[must_use]
    pub fn handlers(&self) -> &[Arc<dyn IntentHandler>] {
        &self.handlers
    }
}

/// Routes responses to handler chains by intent display name.
///
/// Assignors are kept ordered by pattern length, longest first; equal
/// lengths keep registration order. The first assignor whose pattern matches
/// the start of the intent name wins.
#[derive(Default)]
pub struct IntentHandlerRegistry {
    assignors: Vec<IntentAssignor>,
}

impl IntentHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        intent_pattern: impl Into<String>,
        handlers: Vec<Arc<dyn IntentHandler>>,
    ) -> Result<()> {
        let assignor = IntentAssignor::new(intent_pattern, handlers)?;
        info!(
            pattern = assignor.pattern(),
            handlers = assignor.handlers().len(),
            "intent handlers registered"
        );
        self.assignors.push(assignor);
        // sort_by_key is stable
        self.assignors.sort_by_key(|a| Reverse(a.sort_key()));
        Ok(())
    }

    /// [`Self::register`] for a single synchronous closure.
    pub fn register_fn<F>(&mut self, intent_pattern: impl Into<String>, f: F) -> Result<()>
    where
        F: Fn(DetectIntentResponse, &dyn NluClient) -> anyhow::Result<DetectIntentResponse>
            + Send
            + Sync
            + 'static,
    {
        self.register(intent_pattern, vec![handler_fn(f)])
    }

    /// Patterns in selection order.
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.assignors.iter().map(IntentAssignor::pattern)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assignors.is_empty()
    }

    /// The handler chain for `intent_name`, empty when nothing matches.
    #[must_use]
    pub fn select(&self, intent_name: &str) -> &[Arc<dyn IntentHandler>] {
        self.assignors
            .iter()
            .find(|a| a.matches(intent_name))
            .map(IntentAssignor::handlers)
            .unwrap_or_default()
    }

    /// Pass the response through the chain selected by its intent.
    ///
    /// A failing handler is skipped; the chain continues with the response
    /// it was given.
    pub async fn apply(
        &self,
        response: DetectIntentResponse,
        client: &Arc<dyn NluClient>,
    ) -> DetectIntentResponse {
        let intent_name = response.intent_display_name().to_string();
        let handlers = self.select(&intent_name);
        if handlers.is_empty() {
            debug!(intent = %intent_name, "no intent handlers matched");
            return response;
        }

        #[cfg(feature = "metrics")]
        counter!(intent_metrics::ROUTED_TOTAL).increment(1);

        let mut current = response;
        for (step, handler) in handlers.iter().enumerate() {
            let before = current.clone();
            match handler.handle(current, client).await {
                Ok(next) => {
                    let texts: Vec<&str> = next
                        .messages()
                        .iter()
                        .filter_map(|m| m.first_text())
                        .collect();
                    info!(intent = %intent_name, step, ?texts, "intent handler applied");
                    current = next;
                },
                Err(e) => {
                    warn!(intent = %intent_name, step, error = %e, "intent handler failed");
                    #[cfg(feature = "metrics")]
                    counter!(intent_metrics::HANDLER_ERRORS_TOTAL, labels::OPERATION => "apply")
                        .increment(1);
                    current = before;
                },
            }
        }
        current
    }
}
