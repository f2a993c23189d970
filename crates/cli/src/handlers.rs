//! Handlers registered by the stock binary.
//!
//! Deployments with their own business logic embed `bpi-sessions` and
//! register handlers on [`BpiServiceBuilder`] instead.

use std::sync::Arc;

use {
    bpi_protocol::{DetectIntentResponse, Message},
    bpi_routing::handler_fn,
    bpi_sessions::BpiServiceBuilder,
    bpi_triggers::{FnTriggerHandler, FoundTriggers, TriggerHandler, TriggerKind},
    tracing::{info, warn},
};

/// Marker the demo intents carry in their answers.
pub const REPLACE_MARKER: &str = "<REPLACE:REPLACE_THIS_TEXT>";

pub fn register(builder: &mut BpiServiceBuilder, fallback_intent: &str) -> anyhow::Result<()> {
    builder
        .register_intent_handler(regex::escape(fallback_intent), vec![handler_fn(|resp, _| {
            warn!(response_id = %resp.response_id, "default fallback was triggered");
            Ok(resp)
        })])?
        .register_intent_handler("Default Exit Intent", vec![handler_fn(|resp, _| {
            warn!(response_id = %resp.response_id, "default exit was triggered");
            Ok(resp)
        })])?
        .register_intent_handler(r"i\.my_.*", vec![handler_fn(|resp, _| Ok(reformat(resp)))])?;

    builder
        .register_trigger_handler(TriggerKind::SipHangup, log_trigger())
        .register_trigger_handler(TriggerKind::SipHumanHandover, log_trigger())
        .register_trigger_handler(TriggerKind::SipSendNow, log_trigger());
    Ok(())
}

fn reformat(response: DetectIntentResponse) -> DetectIntentResponse {
    bpi_messages::response::substitute_pattern(response, &regex::escape(REPLACE_MARKER), "new text")
}

fn log_trigger() -> Arc<dyn TriggerHandler> {
    Arc::new(FnTriggerHandler::new(
        |resp: &DetectIntentResponse, _: &Message, trigger: TriggerKind, found: &FoundTriggers| {
            info!(
                session_id = resp.session_id().unwrap_or_default(),
                %trigger,
                values = ?found.get(trigger),
                "trigger received"
            );
            Ok(None)
        },
    ))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        bpi_client::{MemoryNluClient, NluClient},
        bpi_config::BpiConfig,
        bpi_protocol::{DetectIntentRequest, Intent, QueryResult},
        bpi_sessions::BpiService,
    };

    fn scripted(intent: &str, text: &str) -> DetectIntentResponse {
        DetectIntentResponse {
            response_id: "r1".into(),
            query_result: QueryResult {
                intent: Some(Intent {
                    name: String::new(),
                    display_name: intent.into(),
                }),
                fulfillment_messages: vec![Message::text(text)],
                ..QueryResult::default()
            },
        }
    }

    #[tokio::test]
    async fn my_intents_get_the_marker_replaced() {
        let backend = Arc::new(MemoryNluClient::new());
        backend.push_response(scripted(
            "i.my_handled_intent",
            "Hier steht <REPLACE:REPLACE_THIS_TEXT>.",
        ));
        let nlu: Arc<dyn NluClient> = backend;
        let config = BpiConfig::default();
        let mut builder = BpiService::builder(nlu, &config);
        register(&mut builder, &config.session.fallback_intent).unwrap();
        let service = builder.build();

        let out = service
            .detect_intent(DetectIntentRequest::text("s", "hallo", "de"))
            .await
            .unwrap();
        assert_eq!(out.messages()[0].first_text(), Some("Hier steht new text."));
    }

    #[tokio::test]
    async fn trigger_handlers_leave_the_answer_alone() {
        let backend = Arc::new(MemoryNluClient::new());
        backend.push_response(scripted("i.bye", "Tschüss [SIP:HANGUP]"));
        let nlu: Arc<dyn NluClient> = backend;
        let config = BpiConfig::default();
        let mut builder = BpiService::builder(nlu, &config);
        register(&mut builder, &config.session.fallback_intent).unwrap();
        let service = builder.build();

        let out = service
            .detect_intent(DetectIntentRequest::text("s", "bye", "de"))
            .await
            .unwrap();
        assert_eq!(out.response_id, "r1");
        assert_eq!(out.messages()[0].first_text(), Some("Tschüss [SIP:HANGUP]"));
    }
}
