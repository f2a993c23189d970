//! Integration tests for the context relay routes.

use std::{net::SocketAddr, sync::Arc};

use {
    bpi_client::{MemoryNluClient, NluClient},
    bpi_config::BpiConfig,
    bpi_gateway::{build_gateway_app, state::GatewayState},
    bpi_protocol::Context,
    bpi_sessions::BpiService,
    tokio::net::TcpListener,
};

const SESSION: &str = "projects/p/agent/sessions/s1";
const NAME: &str = "projects/p/agent/sessions/s1/contexts/order";

async fn start_server() -> (SocketAddr, Arc<MemoryNluClient>) {
    let backend = Arc::new(MemoryNluClient::new());
    let nlu: Arc<dyn NluClient> = backend.clone();
    let service = BpiService::builder(nlu, &BpiConfig::default()).build();
    let app = build_gateway_app(GatewayState::new(Arc::new(service)));

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
    (addr, backend)
}

fn url(addr: SocketAddr) -> String {
    format!("http://{addr}/v2/contexts")
}

#[tokio::test]
async fn create_get_update_delete() {
    let (addr, backend) = start_server().await;
    let client = reqwest::Client::new();

    let created = client
        .post(url(addr))
        .json(&serde_json::json!({
            "session": SESSION,
            "context": Context::new(NAME, 5).with_parameter("pizza", "margherita"),
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status(), 201);
    assert_eq!(backend.context(NAME).unwrap().lifespan_count, 5);

    let fetched: Context = client
        .get(url(addr))
        .query(&[("name", NAME)])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched.parameters["pizza"].value, "margherita");

    let updated = client
        .patch(url(addr))
        .json(&fetched.with_parameter("size", "large"))
        .send()
        .await
        .unwrap();
    assert_eq!(updated.status(), 200);
    assert_eq!(backend.context(NAME).unwrap().parameters["size"].value, "large");

    let deleted = client
        .delete(url(addr))
        .query(&[("name", NAME)])
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status(), 204);
    assert!(backend.context(NAME).is_none());
}

#[tokio::test]
async fn unknown_context_is_not_found() {
    let (addr, _) = start_server().await;

    let resp = reqwest::Client::new()
        .get(url(addr))
        .query(&[("name", NAME)])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn create_requires_a_session() {
    let (addr, _) = start_server().await;

    let resp = reqwest::Client::new()
        .post(url(addr))
        .json(&serde_json::json!({ "session": "", "context": Context::new(NAME, 1) }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn prometheus_endpoint_without_recorder_is_unavailable() {
    let (addr, _) = start_server().await;

    let resp = reqwest::get(format!("http://{addr}/metrics")).await.unwrap();
    assert_eq!(resp.status(), 503);
}
