//! The DetectIntent turn: truncate, ask the backend (or race it against QA),
//! run triggers and intent handlers, and write changed contexts back.

use std::{sync::Arc, time::Duration};

use {
    bpi_client::{NluClient, QaClient},
    bpi_config::BpiConfig,
    bpi_protocol::{DetectIntentRequest, DetectIntentResponse, ERROR_SENTINEL_TEXT, TextInput},
    bpi_routing::{IntentHandler, IntentHandlerRegistry},
    bpi_triggers::{PartialSend, TriggerHandler, TriggerKind, TriggerRegistry},
    tracing::{debug, error, info, warn},
};

#[cfg(feature = "metrics")]
use {
    bpi_metrics::{counter, detect_intent as detect_metrics, histogram},
    std::time::Instant,
};

use crate::{
    Result,
    loops::SessionLoops,
    race::{QaRace, RaceOutcome},
    reconcile::{ReconcileHandle, Reconciler, snapshot},
};

/// Cut the request text to `limit` characters.
///
/// Returns whether the text was cut. A request without a text input gets
/// the sentinel text `"error"` in `language`.
pub fn prepare_request(
    request: &mut DetectIntentRequest,
    limit: usize,
    language: &str,
) -> bool {
    let Some(input) = request.query_input.text.as_mut() else {
        error!(
            session_id = %request.session,
            "request has no text input, continuing with sentinel text"
        );
        request.query_input.text = Some(TextInput {
            text: ERROR_SENTINEL_TEXT.to_string(),
            language_code: language.to_string(),
        });
        return false;
    };

    if input.text.chars().count() <= limit {
        return false;
    }
    warn!(
        session_id = %request.session,
        limit,
        "received text is too long, truncating"
    );
    input.text = input.text.chars().take(limit).collect();
    true
}

/// A processed turn and the context updates it started.
pub struct Turn {
    pub response: DetectIntentResponse,
    /// `None` when the response did not go through the handler pipeline.
    pub reconcile: Option<ReconcileHandle>,
}

/// Collects handlers and backends before the service starts serving.
pub struct BpiServiceBuilder {
    nlu: Arc<dyn NluClient>,
    qa: Option<Arc<dyn QaClient>>,
    config: BpiConfig,
    intents: IntentHandlerRegistry,
    triggers: TriggerRegistry,
}

impl BpiServiceBuilder {
    /// Race turns against `qa`. Only takes effect when `qa.active` is set.
    #[must_use]
    pub fn with_qa(mut self, qa: Arc<dyn QaClient>) -> Self {
        self.qa = Some(qa);
        self
    }

    #[must_use]
    pub fn with_partial_send(mut self, partial_send: Arc<dyn PartialSend>) -> Self {
        self.triggers = self.triggers.with_partial_send(partial_send);
        self
    }

    #[must_use]
    pub fn with_strip_triggers(mut self, strip: bool) -> Self {
        self.triggers = self.triggers.with_strip_triggers(strip);
        self
    }

    /// Route intents whose display name starts with a match of
    /// `intent_pattern` through `handlers`.
    pub fn register_intent_handler(
        &mut self,
        intent_pattern: impl Into<String>,
        handlers: Vec<Arc<dyn IntentHandler>>,
    ) -> Result<&mut Self> {
        self.intents.register(intent_pattern, handlers)?;
        Ok(self)
    }

    pub fn register_trigger_handler(
        &mut self,
        trigger: TriggerKind,
        handler: Arc<dyn TriggerHandler>,
    ) -> &mut Self {
        self.triggers.register(trigger, handler);
        self
    }

    pub fn build(self) -> BpiService {
        let session = &self.config.session;
        let race = match self.qa {
            Some(qa) if self.config.qa.active => {
                let timeout = Duration::from_secs(session.session_timeout_minutes * 60);
                Some(QaRace::new(
                    Arc::clone(&self.nlu),
                    qa,
                    self.config.qa.clone(),
                    session.fallback_intent.clone(),
                    Arc::new(SessionLoops::new(timeout)),
                ))
            },
            _ => None,
        };
        info!(
            qa_race = race.is_some(),
            intent_patterns = self.intents.patterns().count(),
            "bpi service ready"
        );
        BpiService {
            reconciler: Reconciler::new(
                Arc::clone(&self.nlu),
                self.config.reconcile.max_concurrency,
            ),
            nlu: self.nlu,
            race,
            intents: self.intents,
            triggers: self.triggers,
            sentence_truncation: session.sentence_truncation,
            default_language: self.config.nlu.default_language.clone(),
            sweep_interval: Duration::from_secs(session.session_sweep_interval_secs),
        }
    }
}

/// Serves DetectIntent turns. Build with [`BpiService::builder`].
pub struct BpiService {
    nlu: Arc<dyn NluClient>,
    race: Option<QaRace>,
    intents: IntentHandlerRegistry,
    triggers: TriggerRegistry,
    reconciler: Reconciler,
    sentence_truncation: usize,
    default_language: String,
    sweep_interval: Duration,
}

impl BpiService {
    pub fn builder(nlu: Arc<dyn NluClient>, config: &BpiConfig) -> BpiServiceBuilder {
        BpiServiceBuilder {
            nlu,
            qa: None,
            config: config.clone(),
            intents: IntentHandlerRegistry::new(),
            triggers: TriggerRegistry::new(),
        }
    }

    #[must_use]
    pub fn client(&self) -> &Arc<dyn NluClient> {
        &self.nlu
    }

    #[must_use]
    pub fn session_loops(&self) -> Option<&Arc<SessionLoops>> {
        self.race.as_ref().map(QaRace::loops)
    }

    /// Start the idle-session sweeper when the QA race is enabled.
    pub fn spawn_maintenance(&self) -> Option<tokio::task::JoinHandle<()>> {
        self.session_loops()
            .map(|loops| loops.spawn_sweeper(self.sweep_interval))
    }

    /// Answer one turn. Context updates continue in the background.
    pub async fn detect_intent(&self, request: DetectIntentRequest) -> Result<DetectIntentResponse> {
        Ok(self.detect_intent_turn(request).await?.response)
    }

    /// [`Self::detect_intent`], also handing back the context updates.
    pub async fn detect_intent_turn(&self, mut request: DetectIntentRequest) -> Result<Turn> {
        #[cfg(feature = "metrics")]
        let start = Instant::now();
        #[cfg(feature = "metrics")]
        counter!(detect_metrics::REQUESTS_TOTAL).increment(1);

        let truncated = prepare_request(
            &mut request,
            self.sentence_truncation,
            &self.default_language,
        );
        #[cfg(feature = "metrics")]
        {
            if truncated {
                counter!(detect_metrics::TRUNCATED_TOTAL).increment(1);
            }
        }
        debug!(
            session_id = %request.session,
            text = request.input_text().unwrap_or_default(),
            truncated,
            "DetectIntent request"
        );

        let turn: Result<Turn> = match &self.race {
            Some(race) => match race.run(request).await {
                RaceOutcome::Nlu(response) => Ok(self.process(response).await),
                RaceOutcome::Qa(response) => Ok(Turn {
                    response,
                    reconcile: None,
                }),
                RaceOutcome::Failed => {
                    #[cfg(feature = "metrics")]
                    counter!(detect_metrics::FAILURES_TOTAL).increment(1);
                    Ok(Turn {
                        response: DetectIntentResponse::default(),
                        reconcile: None,
                    })
                },
            },
            None => match self.nlu.detect_intent(request).await {
                Ok(raw) => Ok(self.process(raw).await),
                Err(e) => {
                    warn!(error = %e, "DetectIntent backend call failed");
                    #[cfg(feature = "metrics")]
                    counter!(detect_metrics::FAILURES_TOTAL).increment(1);
                    Err(e.into())
                },
            },
        };

        #[cfg(feature = "metrics")]
        histogram!(detect_metrics::DURATION_SECONDS).record(start.elapsed().as_secs_f64());
        turn
    }

    /// Run triggers and intent handlers over a backend response and start
    /// writing back the contexts they changed.
    pub async fn process(&self, raw: DetectIntentResponse) -> Turn {
        info!(
            session_id = raw.session_id().unwrap_or_default(),
            intent = raw.intent_display_name(),
            "DetectIntent response from backend"
        );
        let before = snapshot(&raw);

        let response = self.triggers.dispatch(raw).await;
        let response = self.intents.apply(response, &self.nlu).await;

        let reconcile = self.reconciler.reconcile(&before, &snapshot(&response));
        if !reconcile.is_empty() {
            debug!(updates = reconcile.len(), "writing changed contexts back");
        }
        Turn {
            response,
            reconcile: Some(reconcile),
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        bpi_client::{MemoryNluClient, MemoryQaClient},
        bpi_protocol::{
            Context, DIAGNOSTIC_SESSION_ID, GetAnswerResponse, Intent, Message, QueryResult,
        },
        bpi_routing::handler_fn,
        bpi_triggers::{FnTriggerHandler, FoundTriggers},
        rstest::rstest,
        std::sync::atomic::{AtomicUsize, Ordering},
        tracing_subscriber::layer::SubscriberExt,
    };

    const SESSION: &str = "projects/p/agent/sessions/s1";

    fn backend_response(id: &str, intent: &str, messages: Vec<Message>) -> DetectIntentResponse {
        let mut diagnostic_info = serde_json::Map::new();
        diagnostic_info.insert(DIAGNOSTIC_SESSION_ID.into(), SESSION.into());
        DetectIntentResponse {
            response_id: id.into(),
            query_result: QueryResult {
                intent: Some(Intent {
                    name: String::new(),
                    display_name: intent.into(),
                }),
                fulfillment_messages: messages,
                output_contexts: vec![
                    Context::new(format!("{SESSION}/contexts/order"), 3)
                        .with_parameter("size", "large"),
                ],
                diagnostic_info,
                ..QueryResult::default()
            },
        }
    }

    fn config() -> BpiConfig {
        BpiConfig::default()
    }

    #[rstest]
    #[case("kurz", 10, "kurz", false)]
    #[case("genau zehn", 10, "genau zehn", false)]
    #[case("viel zu lang", 8, "viel zu ", true)]
    #[case("Grüße über Öl", 5, "Grüße", true)]
    fn truncation_cuts_characters(
        #[case] text: &str,
        #[case] limit: usize,
        #[case] expected: &str,
        #[case] truncated: bool,
    ) {
        let mut request = DetectIntentRequest::text(SESSION, text, "de-DE");
        assert_eq!(prepare_request(&mut request, limit, "de-DE"), truncated);
        assert_eq!(request.input_text(), Some(expected));
    }

    /// Counts warning events.
    struct WarnCounter(Arc<AtomicUsize>);

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for WarnCounter {
        fn on_event(
            &self,
            event: &tracing::Event<'_>,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            if *event.metadata().level() == tracing::Level::WARN {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[test]
    fn truncation_warns_once_per_cut() {
        let warnings = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(WarnCounter(warnings.clone()));

        tracing::subscriber::with_default(subscriber, || {
            let mut request = DetectIntentRequest::text(SESSION, "viel zu lang", "de-DE");
            assert!(prepare_request(&mut request, 8, "de-DE"));
            assert!(!prepare_request(&mut request, 8, "de-DE"));

            let mut short = DetectIntentRequest::text(SESSION, "kurz", "de-DE");
            assert!(!prepare_request(&mut short, 8, "de-DE"));
        });
        assert_eq!(warnings.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn missing_text_uses_sentinel() {
        let mut request = DetectIntentRequest {
            session: SESSION.into(),
            ..DetectIntentRequest::default()
        };
        assert!(!prepare_request(&mut request, 130, "de-DE"));
        assert_eq!(request.input_text(), Some(ERROR_SENTINEL_TEXT));
    }

    #[tokio::test]
    async fn long_text_reaches_the_backend_truncated() {
        let nlu = Arc::new(MemoryNluClient::new());
        let mut config = config();
        config.session.sentence_truncation = 5;
        let service = BpiService::builder(nlu.clone(), &config).build();

        service
            .detect_intent(DetectIntentRequest::text(SESSION, "abcdefghij", "de-DE"))
            .await
            .unwrap();
        assert_eq!(nlu.requests()[0].input_text(), Some("abcde"));
    }

    #[tokio::test]
    async fn handlers_run_and_changed_contexts_are_written_back() {
        let nlu = Arc::new(MemoryNluClient::new());
        nlu.insert_context(Context::new(format!("{SESSION}/contexts/order"), 3));
        nlu.push_response(backend_response("r1", "i.order.pizza", vec![Message::text(
            "Gerne!",
        )]));

        let mut builder = BpiService::builder(nlu.clone(), &config());
        builder
            .register_intent_handler("i.order", vec![handler_fn(|mut resp, _| {
                resp.query_result.output_contexts[0] = resp.query_result.output_contexts[0]
                    .clone()
                    .with_parameter("size", "small");
                Ok(resp)
            })])
            .unwrap();
        let service = builder.build();

        let turn = service
            .detect_intent_turn(DetectIntentRequest::text(SESSION, "Pizza bitte", "de-DE"))
            .await
            .unwrap();
        assert_eq!(turn.response.contexts()[0].parameters["size"].value, "small");
        turn.reconcile.unwrap().wait().await;

        let updates = nlu.updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].parameters["size"].value, "small");
    }

    #[tokio::test]
    async fn untouched_contexts_are_not_written_back() {
        let nlu = Arc::new(MemoryNluClient::new());
        nlu.push_response(backend_response("r1", "i.greeting", vec![Message::text("Hallo")]));
        let service = BpiService::builder(nlu.clone(), &config()).build();

        let turn = service
            .detect_intent_turn(DetectIntentRequest::text(SESSION, "Hallo", "de-DE"))
            .await
            .unwrap();
        let reconcile = turn.reconcile.unwrap();
        assert!(reconcile.is_empty());
        reconcile.wait().await;
        assert!(nlu.updates().is_empty());
    }

    #[tokio::test]
    async fn trigger_override_replaces_the_answer() {
        let nlu = Arc::new(MemoryNluClient::new());
        nlu.push_response(backend_response("r1", "i.bye", vec![Message::text(
            "Tschüss [SIP:HANGUP]",
        )]));

        let mut builder = BpiService::builder(nlu.clone(), &config());
        builder.register_trigger_handler(
            TriggerKind::SipHangup,
            Arc::new(FnTriggerHandler::new(
                |resp: &DetectIntentResponse, _: &Message, _: TriggerKind, _: &FoundTriggers| {
                    let mut hangup = resp.clone();
                    hangup.response_id = "hangup".into();
                    hangup.query_result.fulfillment_messages =
                        vec![Message::text("Auf Wiederhören")];
                    Ok(Some(hangup))
                },
            )),
        );
        let service = builder.build();

        let response = service
            .detect_intent(DetectIntentRequest::text(SESSION, "Tschüss", "de-DE"))
            .await
            .unwrap();
        assert_eq!(response.response_id, "hangup");
        assert_eq!(response.messages()[0].first_text(), Some("Auf Wiederhören"));
    }

    #[tokio::test]
    async fn backend_failure_without_race_is_an_error() {
        let nlu = Arc::new(MemoryNluClient::new().with_failure("unavailable"));
        let service = BpiService::builder(nlu, &config()).build();
        let err = service
            .detect_intent(DetectIntentRequest::text(SESSION, "Hallo", "de-DE"))
            .await
            .unwrap_err();
        assert!(matches!(err, crate::Error::Backend(_)));
    }

    fn qa_config() -> BpiConfig {
        let mut config = config();
        config.qa.active = true;
        config
    }

    fn qa_answer(text: &str) -> GetAnswerResponse {
        GetAnswerResponse {
            query_result: DetectIntentResponse {
                response_id: "qa-1".into(),
                query_result: QueryResult {
                    fulfillment_messages: vec![Message::text(text)],
                    ..QueryResult::default()
                },
            },
        }
    }

    #[tokio::test]
    async fn qa_answer_replaces_fallback_without_post_processing() {
        let nlu = Arc::new(MemoryNluClient::new());
        let qa = Arc::new(MemoryQaClient::new(qa_answer("Montag bis Freitag [SIP:HANGUP]")));

        let mut builder = BpiService::builder(nlu.clone(), &qa_config()).with_qa(qa);
        builder.register_trigger_handler(
            TriggerKind::SipHangup,
            Arc::new(FnTriggerHandler::new(
                |_: &DetectIntentResponse, _: &Message, _: TriggerKind, _: &FoundTriggers| {
                    Ok(Some(DetectIntentResponse {
                        response_id: "should-not-run".into(),
                        ..DetectIntentResponse::default()
                    }))
                },
            )),
        );
        let service = builder.build();

        let turn = service
            .detect_intent_turn(DetectIntentRequest::text(SESSION, "Öffnungszeiten?", "de-DE"))
            .await
            .unwrap();
        assert_eq!(turn.response.response_id, "qa-1");
        assert!(turn.reconcile.is_none());
        assert!(service.session_loops().unwrap().contains(SESSION));
    }

    #[tokio::test]
    async fn matched_intent_beats_qa() {
        let nlu = Arc::new(MemoryNluClient::new());
        nlu.push_response(backend_response("r1", "i.opening_hours", vec![Message::text(
            "9 Uhr",
        )]));
        let qa = Arc::new(MemoryQaClient::new(qa_answer("QA")));
        let service = BpiService::builder(nlu, &qa_config()).with_qa(qa).build();

        let response = service
            .detect_intent(DetectIntentRequest::text(SESSION, "Wann?", "de-DE"))
            .await
            .unwrap();
        assert_eq!(response.response_id, "r1");
    }

    #[tokio::test]
    async fn failed_race_returns_empty_response() {
        let nlu = Arc::new(MemoryNluClient::new().with_failure("unavailable"));
        let qa = Arc::new(MemoryQaClient::new(qa_answer("QA")));
        let service = BpiService::builder(nlu, &qa_config()).with_qa(qa).build();

        let response = service
            .detect_intent(DetectIntentRequest::text(SESSION, "Wann?", "de-DE"))
            .await
            .unwrap();
        assert_eq!(response, DetectIntentResponse::default());
    }

    #[test]
    fn qa_client_without_active_flag_does_not_race() {
        let nlu = Arc::new(MemoryNluClient::new());
        let qa = Arc::new(MemoryQaClient::new(qa_answer("QA")));
        let service = BpiService::builder(nlu, &config()).with_qa(qa).build();
        assert!(service.session_loops().is_none());
    }
}
