//! Integration tests for the DetectIntent route.

use std::{net::SocketAddr, sync::Arc};

use {
    bpi_client::{MemoryNluClient, MemoryQaClient, NluClient},
    bpi_config::BpiConfig,
    bpi_gateway::{build_gateway_app, state::GatewayState},
    bpi_protocol::{
        DetectIntentRequest, DetectIntentResponse, GetAnswerResponse, Intent, Message, QueryResult,
    },
    bpi_routing::handler_fn,
    bpi_sessions::{BpiService, BpiServiceBuilder},
    bpi_triggers::{FnTriggerHandler, FoundTriggers, TriggerKind},
    tokio::net::TcpListener,
};

async fn start_server(builder: BpiServiceBuilder) -> SocketAddr {
    let state = GatewayState::new(Arc::new(builder.build()));
    let app = build_gateway_app(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });
    addr
}

fn scripted(intent: &str, text: &str) -> DetectIntentResponse {
    DetectIntentResponse {
        response_id: "nlu-1".into(),
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

fn texts(resp: &DetectIntentResponse) -> Vec<String> {
    resp.messages()
        .iter()
        .filter_map(|m| m.first_text().map(str::to_string))
        .collect()
}

async fn detect(addr: SocketAddr, request: &DetectIntentRequest) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("http://{addr}/v2/sessions/detect-intent"))
        .json(request)
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn health_reports_ok() {
    let nlu: Arc<dyn NluClient> = Arc::new(MemoryNluClient::new());
    let addr = start_server(BpiService::builder(nlu, &BpiConfig::default())).await;

    let resp = reqwest::get(format!("http://{addr}/health")).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["qa_sessions"], 0);
}

#[tokio::test]
async fn intent_handlers_shape_the_answer() {
    let backend = Arc::new(MemoryNluClient::new());
    backend.push_response(scripted("i.weather.today", "Es ist sonnig."));
    let nlu: Arc<dyn NluClient> = backend.clone();

    let mut builder = BpiService::builder(nlu, &BpiConfig::default());
    builder
        .register_intent_handler(r"i\..*", vec![handler_fn(|mut resp, _| {
            resp.query_result
                .fulfillment_messages
                .push(Message::text("generic"));
            Ok(resp)
        })])
        .unwrap()
        .register_intent_handler("i.weather", vec![handler_fn(|mut resp, _| {
            resp.query_result
                .fulfillment_messages
                .push(Message::text("weather"));
            Ok(resp)
        })])
        .unwrap();
    let addr = start_server(builder).await;

    let resp = detect(addr, &DetectIntentRequest::text("s1", "Wie ist das Wetter?", "de")).await;
    assert_eq!(resp.status(), 200);
    let body: DetectIntentResponse = resp.json().await.unwrap();
    assert_eq!(texts(&body), vec!["Es ist sonnig.", "weather"]);
    assert_eq!(backend.requests()[0].input_text(), Some("Wie ist das Wetter?"));
}

#[tokio::test]
async fn hangup_trigger_overrides_the_answer() {
    let backend = Arc::new(MemoryNluClient::new());
    backend.push_response(scripted("i.goodbye", "Auf Wiederhören [SIP:HANGUP]"));
    let nlu: Arc<dyn NluClient> = backend;

    let mut builder = BpiService::builder(nlu, &BpiConfig::default());
    builder.register_trigger_handler(
        TriggerKind::SipHangup,
        Arc::new(FnTriggerHandler::new(|_: &DetectIntentResponse, _: &Message, _: TriggerKind, _: &FoundTriggers| {
            Ok(Some(DetectIntentResponse {
                response_id: "hangup".into(),
                query_result: QueryResult {
                    fulfillment_messages: vec![Message::text("call ended")],
                    ..QueryResult::default()
                },
            }))
        })),
    );
    let addr = start_server(builder).await;

    let body: DetectIntentResponse = detect(addr, &DetectIntentRequest::text("s1", "tschüss", "de"))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body.response_id, "hangup");
    assert_eq!(texts(&body), vec!["call ended"]);
}

#[tokio::test]
async fn long_text_is_truncated_before_the_backend_sees_it() {
    let backend = Arc::new(MemoryNluClient::new());
    let nlu: Arc<dyn NluClient> = backend.clone();
    let mut config = BpiConfig::default();
    config.session.sentence_truncation = 5;
    let addr = start_server(BpiService::builder(nlu, &config)).await;

    let resp = detect(addr, &DetectIntentRequest::text("s1", "Grüße aus Wien", "de")).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(backend.requests()[0].input_text(), Some("Grüße"));
}

#[tokio::test]
async fn fallback_turns_are_answered_by_qa() {
    let nlu: Arc<dyn NluClient> = Arc::new(MemoryNluClient::new());
    let answer = GetAnswerResponse {
        query_result: DetectIntentResponse {
            response_id: "qa-1".into(),
            query_result: QueryResult {
                fulfillment_messages: vec![Message::text("Die Öffnungszeiten sind 8 bis 16 Uhr.")],
                ..QueryResult::default()
            },
        },
    };
    let mut config = BpiConfig::default();
    config.qa.active = true;
    let builder = BpiService::builder(nlu, &config).with_qa(Arc::new(MemoryQaClient::new(answer)));
    let addr = start_server(builder).await;

    let body: DetectIntentResponse =
        detect(addr, &DetectIntentRequest::text("s1", "Wann habt ihr offen?", "de"))
            .await
            .json()
            .await
            .unwrap();
    assert_eq!(body.response_id, "qa-1");

    let health: serde_json::Value = reqwest::get(format!("http://{addr}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["qa_sessions"], 1);
}

#[tokio::test]
async fn backend_failure_is_a_bad_gateway() {
    let nlu: Arc<dyn NluClient> = Arc::new(MemoryNluClient::new().with_failure("nlu down"));
    let addr = start_server(BpiService::builder(nlu, &BpiConfig::default())).await;

    let resp = detect(addr, &DetectIntentRequest::text("s1", "Hallo", "de")).await;
    assert_eq!(resp.status(), 502);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "BACKEND_UNAVAILABLE");
    assert_eq!(body["retryable"], true);
}

#[tokio::test]
async fn missing_session_is_rejected() {
    let nlu: Arc<dyn NluClient> = Arc::new(MemoryNluClient::new());
    let addr = start_server(BpiService::builder(nlu, &BpiConfig::default())).await;

    let resp = detect(addr, &DetectIntentRequest::text("", "Hallo", "de")).await;
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "INVALID_REQUEST");
}
