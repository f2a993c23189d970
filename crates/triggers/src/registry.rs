use std::{collections::HashMap, sync::Arc};

use {
    bpi_protocol::{DetectIntentResponse, Message},
    tracing::{debug, info, warn},
};

#[cfg(feature = "metrics")]
use bpi_metrics::{counter, labels, triggers as trigger_metrics};

use crate::{
    handler::{FnTriggerHandler, NotImplemented, PartialSend, TriggerHandler},
    kind::{FoundTriggers, TriggerKind},
};

/// Find every trigger in `message`, in [`TriggerKind::ALL`] order.
///
/// Only kinds with at least one occurrence are recorded.
#[must_use]
pub fn scan(message: &Message, session: Option<&str>) -> FoundTriggers {
    let mut found = FoundTriggers::new();
    for &kind in TriggerKind::ALL {
        let Some(re) = kind.regex() else {
            continue;
        };
        if bpi_messages::matches(message, re) {
            found.insert(kind, bpi_messages::extract_with(message, re));
            #[cfg(feature = "metrics")]
            counter!(trigger_metrics::FOUND_TOTAL, labels::TRIGGER => kind.id()).increment(1);
        }
    }
    if !found.is_empty() {
        info!(session_id = session.unwrap_or_default(), found = %found, "found triggers");
    }
    found
}

/// Maps each [`TriggerKind`] to one handler and runs them over a response.
pub struct TriggerRegistry {
    handlers: HashMap<TriggerKind, Arc<dyn TriggerHandler>>,
    partial_send: Option<Arc<dyn PartialSend>>,
    strip_triggers: bool,
}

impl TriggerRegistry {
    /// A registry with every kind bound to [`NotImplemented`].
    pub fn new() -> Self {
        let fallback: Arc<dyn TriggerHandler> = Arc::new(NotImplemented);
        Self {
            handlers: TriggerKind::ALL
                .iter()
                .map(|&kind| (kind, Arc::clone(&fallback)))
                .collect(),
            partial_send: None,
            strip_triggers: false,
        }
    }

    /// Send every message out of turn once its triggers are handled.
    #[must_use]
    pub fn with_partial_send(mut self, partial_send: Arc<dyn PartialSend>) -> Self {
        self.partial_send = Some(partial_send);
        self
    }

    /// Remove trigger markers from message text after handling them.
    #[must_use]
    pub fn with_strip_triggers(mut self, strip: bool) -> Self {
        self.strip_triggers = strip;
        self
    }

    /// Bind `handler` to `kind`, replacing the previous binding.
    pub fn register(&mut self, kind: TriggerKind, handler: Arc<dyn TriggerHandler>) {
        self.handlers.insert(kind, handler);
        info!(trigger = %kind, "trigger handler registered");
    }

    /// [`Self::register`] for a synchronous closure.
    pub fn register_fn<F>(&mut self, kind: TriggerKind, f: F)
    where
        F: Fn(
                &DetectIntentResponse,
                &Message,
                TriggerKind,
                &FoundTriggers,
            ) -> anyhow::Result<Option<DetectIntentResponse>>
            + Send
            + Sync
            + 'static,
    {
        self.register(kind, Arc::new(FnTriggerHandler::new(f)));
    }

    #[must_use]
    pub fn handler(&self, kind: TriggerKind) -> Option<&Arc<dyn TriggerHandler>> {
        self.handlers.get(&kind)
    }

    /// Run the handlers for every trigger found in the response's messages.
    ///
    /// Messages are visited in order and, within a message, triggers in scan
    /// order. A handler answer with a new `response_id` is returned at once.
    /// An answer with the same id becomes the response seen by later
    /// handlers. Handler errors are logged and ignored.
    pub async fn dispatch(&self, response: DetectIntentResponse) -> DetectIntentResponse {
        let session = response.session_id().map(str::to_string);
        let mut current = response;

        let mut index = 0;
        while let Some(message) = current.messages().get(index).cloned() {
            let found = scan(&message, session.as_deref());
            for kind in found.kinds() {
                let Some(handler) = self.handlers.get(&kind) else {
                    warn!(trigger = %kind, "no handler registered for trigger");
                    continue;
                };
                match handler.handle(&current, &message, kind, &found).await {
                    Ok(Some(next)) if next.response_id != current.response_id => {
                        info!(
                            trigger = %kind,
                            session_id = session.as_deref().unwrap_or_default(),
                            response_id = %next.response_id,
                            "trigger handler replaced response"
                        );
                        #[cfg(feature = "metrics")]
                        counter!(trigger_metrics::OVERRIDES_TOTAL, labels::TRIGGER => kind.id())
                            .increment(1);
                        return next;
                    },
                    Ok(Some(next)) => current = next,
                    Ok(None) => {},
                    Err(e) => {
                        warn!(trigger = %kind, error = %e, "trigger handler failed");
                        #[cfg(feature = "metrics")]
                        counter!(
                            trigger_metrics::HANDLER_ERRORS_TOTAL,
                            labels::TRIGGER => kind.id()
                        )
                        .increment(1);
                    },
                }
            }

            if let Some(partial_send) = &self.partial_send {
                partial_send
                    .send(&current, current.messages().get(index), index)
                    .await;
            }
            if self.strip_triggers && !found.is_empty() {
                strip_message(&mut current, index, &found);
            }
            index += 1;
        }

        if index == 0
            && let Some(partial_send) = &self.partial_send
        {
            partial_send.send(&current, None, 0).await;
        }
        current
    }
}

impl Default for TriggerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn strip_message(response: &mut DetectIntentResponse, index: usize, found: &FoundTriggers) {
    let Some(slot) = response.query_result.fulfillment_messages.get_mut(index) else {
        return;
    };
    let stripped = found.kinds().fold(slot.clone(), |message, kind| {
        bpi_messages::substitute(&message, kind.pattern(), "", false)
    });
    debug!(index, "removed trigger markers from message");
    *slot = stripped;
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use {
        super::*,
        async_trait::async_trait,
        bpi_protocol::{DIAGNOSTIC_SESSION_ID, QueryResult},
    };

    fn response(id: &str, messages: Vec<Message>) -> DetectIntentResponse {
        let mut diagnostic_info = serde_json::Map::new();
        diagnostic_info.insert(DIAGNOSTIC_SESSION_ID.into(), "projects/p/agent/sessions/s".into());
        DetectIntentResponse {
            response_id: id.into(),
            query_result: QueryResult {
                fulfillment_messages: messages,
                diagnostic_info,
                ..QueryResult::default()
            },
        }
    }

    /// Records every call as `(kind, payloads, message text)`.
    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<(TriggerKind, Vec<String>, String)>>,
    }

    #[async_trait]
    impl TriggerHandler for Recorder {
        async fn handle(
            &self,
            _response: &DetectIntentResponse,
            message: &Message,
            trigger: TriggerKind,
            found: &FoundTriggers,
        ) -> anyhow::Result<Option<DetectIntentResponse>> {
            self.calls.lock().unwrap().push((
                trigger,
                found.get(trigger).unwrap_or_default().to_vec(),
                message.first_text().unwrap_or_default().to_string(),
            ));
            Ok(None)
        }
    }

    #[derive(Default)]
    struct SendLog {
        sent: Mutex<Vec<(Option<String>, usize)>>,
    }

    #[async_trait]
    impl PartialSend for SendLog {
        async fn send(
            &self,
            _response: &DetectIntentResponse,
            message: Option<&Message>,
            index: usize,
        ) {
            self.sent.lock().unwrap().push((
                message.and_then(|m| m.first_text()).map(str::to_string),
                index,
            ));
        }
    }

    #[test]
    fn scan_finds_kinds_in_fixed_order() {
        let message = Message::text("[QUERY:SEARCH('wetter')] [SIP:PAUSE('2')] [SIP:HANGUP]");
        let found = scan(&message, Some("s"));

        let kinds: Vec<_> = found.kinds().collect();
        assert_eq!(kinds, vec![
            TriggerKind::SipHangup,
            TriggerKind::SipPause,
            TriggerKind::QuerySearch
        ]);
        assert_eq!(found.get(TriggerKind::SipPause).unwrap(), ["2"]);
        assert_eq!(found.get(TriggerKind::QuerySearch).unwrap(), ["wetter"]);
        assert_eq!(found.get(TriggerKind::SipHangup).unwrap(), ["[SIP:HANGUP]"]);
    }

    #[test]
    fn scan_of_plain_text_is_empty() {
        assert!(scan(&Message::text("Guten Tag"), None).is_empty());
    }

    #[test]
    fn new_registry_binds_every_kind() {
        let registry = TriggerRegistry::new();
        for &kind in TriggerKind::ALL {
            assert!(registry.handler(kind).is_some());
        }
    }

    #[tokio::test]
    async fn one_call_per_found_trigger_with_payloads() {
        let recorder = Arc::new(Recorder::default());
        let mut registry = TriggerRegistry::new();
        registry.register(TriggerKind::SipSendNow, recorder.clone());
        registry.register(TriggerKind::SipPause, recorder.clone());

        let input = response("r1", vec![
            Message::text("[SIP:SEND_NOW('a')] eins"),
            Message::text("zwei"),
            Message::text("[SIP:PAUSE('3')] [SIP:SEND_NOW('b')]"),
        ]);
        let out = registry.dispatch(input.clone()).await;

        assert_eq!(out, input);
        let calls = recorder.calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].0, TriggerKind::SipSendNow);
        assert_eq!(calls[0].1, vec!["a".to_string()]);
        assert_eq!(calls[1].0, TriggerKind::SipSendNow);
        assert_eq!(calls[1].1, vec!["b".to_string()]);
        assert_eq!(calls[2].0, TriggerKind::SipPause);
        assert_eq!(calls[2].1, vec!["3".to_string()]);
    }

    #[tokio::test]
    async fn override_with_new_id_short_circuits() {
        let recorder = Arc::new(Recorder::default());
        let mut registry = TriggerRegistry::new();
        registry.register_fn(TriggerKind::SipHangup, |_, _, _, _| {
            Ok(Some(response("goodbye", vec![Message::text("Auf Wiedersehen")])))
        });
        registry.register(TriggerKind::SipPause, recorder.clone());

        let out = registry
            .dispatch(response("r1", vec![
                Message::text("Tschüss [SIP:HANGUP]"),
                Message::text("[SIP:PAUSE('1')]"),
            ]))
            .await;

        assert_eq!(out.response_id, "goodbye");
        assert!(recorder.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn same_id_answer_is_carried_forward() {
        let mut registry = TriggerRegistry::new();
        registry.register_fn(TriggerKind::SipPause, |resp, _, _, _| {
            let mut next = resp.clone();
            next.query_result.query_text = "paused".into();
            Ok(Some(next))
        });

        let out = registry
            .dispatch(response("r1", vec![Message::text("[SIP:PAUSE('1')]")]))
            .await;
        assert_eq!(out.response_id, "r1");
        assert_eq!(out.query_result.query_text, "paused");
    }

    #[tokio::test]
    async fn failing_handler_is_no_override() {
        let mut registry = TriggerRegistry::new();
        registry.register_fn(TriggerKind::SipHangup, |_, _, _, _| {
            Err(anyhow::anyhow!("telephony down"))
        });

        let input = response("r1", vec![Message::text("[SIP:HANGUP]")]);
        let out = registry.dispatch(input.clone()).await;
        assert_eq!(out, input);
    }

    #[tokio::test]
    async fn unregistered_kinds_only_warn() {
        let registry = TriggerRegistry::new();
        let input = response("r1", vec![Message::text("[SIP:TRANSFER('+49')] bitte warten")]);
        assert_eq!(registry.dispatch(input.clone()).await, input);
    }

    #[tokio::test]
    async fn partial_send_runs_per_message() {
        let log = Arc::new(SendLog::default());
        let registry = TriggerRegistry::new().with_partial_send(log.clone());

        registry
            .dispatch(response("r1", vec![Message::text("a"), Message::text("b")]))
            .await;
        assert_eq!(log.sent.lock().unwrap().clone(), vec![
            (Some("a".to_string()), 0),
            (Some("b".to_string()), 1),
        ]);
    }

    #[tokio::test]
    async fn partial_send_runs_once_without_messages() {
        let log = Arc::new(SendLog::default());
        let registry = TriggerRegistry::new().with_partial_send(log.clone());

        registry.dispatch(response("r1", Vec::new())).await;
        assert_eq!(log.sent.lock().unwrap().clone(), vec![(None, 0)]);
    }

    #[tokio::test]
    async fn strip_triggers_removes_markers_after_handling() {
        let recorder = Arc::new(Recorder::default());
        let sends = Arc::new(SendLog::default());
        let mut registry = TriggerRegistry::new()
            .with_strip_triggers(true)
            .with_partial_send(sends.clone());
        registry.register(TriggerKind::SipPause, recorder.clone());

        let out = registry
            .dispatch(response("r1", vec![Message::text("Moment[SIP:PAUSE('2')] bitte")]))
            .await;

        assert_eq!(out.messages()[0].first_text(), Some("Moment bitte"));
        let calls = recorder.calls.lock().unwrap().clone();
        assert_eq!(calls[0].2, "Moment[SIP:PAUSE('2')] bitte");
        let sent = sends.sent.lock().unwrap().clone();
        assert_eq!(sent, vec![(Some("Moment[SIP:PAUSE('2')] bitte".to_string()), 0)]);
    }
}
