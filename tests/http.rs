//! HTTP surface tests against a real listener.

use std::net::SocketAddr;
use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::Value;
use tokio::net::TcpListener;

use popgate::catalog::{PromptCatalog, StaticSettings};
use popgate::engine::DecisionEngine;
use popgate::model::{Frequency, Placement, PromptPolicy, SiteSettings};
use popgate::server::{ServerState, create_app};
use popgate::store::MemoryStore;
use popgate::test_utils::fixtures::FailingStore;

async fn spawn(engine: DecisionEngine) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = create_app(ServerState::new(Arc::new(engine)));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn catalog() -> PromptCatalog {
    PromptCatalog::new()
        .with_prompt("1", PromptPolicy::new(Frequency::Once, Placement::Center))
        .with_prompt(
            "2",
            PromptPolicy::new(Frequency::Always, Placement::Inline).with_newsletter_form(),
        )
}

fn engine() -> DecisionEngine {
    DecisionEngine::new(
        Arc::new(MemoryStore::default()),
        Arc::new(catalog()),
        Arc::new(StaticSettings(SiteSettings {
            suppress_newsletter_campaigns: true,
            suppress_all_newsletter_campaigns_if_one_dismissed: false,
        })),
    )
}

const PAGE: &str = "https%3A%2F%2Fnews.example.com%2Fstory";

#[tokio::test]
async fn test_health() {
    let addr = spawn(engine()).await;
    let body: Value = reqwest::get(format!("http://{addr}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["store"], "memory");
}

#[tokio::test]
async fn test_query_then_acknowledge() {
    let addr = spawn(engine()).await;
    let client = reqwest::Client::new();
    let query_url = format!("http://{addr}/reader?rid=r1&popup_id=1&url={PAGE}");

    let response = client.get(&query_url).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["displayPopup"], true);
    assert_eq!(body["currentViews"], 0);
    assert_eq!(body["frequency"], "once");

    let body: Value = client
        .post(format!("http://{addr}/reader"))
        .json(&serde_json::json!({
            "rid": "r1",
            "popup_id": 1,
            "url": "https://news.example.com/story",
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["displayPopup"], false);
    assert_eq!(body["currentViews"], 1);

    let body: Value = client.get(&query_url).send().await.unwrap().json().await.unwrap();
    assert_eq!(body["displayPopup"], false);
}

#[tokio::test]
async fn test_missing_reader_is_a_quiet_no() {
    let addr = spawn(engine()).await;
    let response = reqwest::get(format!("http://{addr}/reader?popup_id=1&url={PAGE}"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, serde_json::json!({"currentViews": 0, "displayPopup": false}));
}

#[tokio::test]
async fn test_referer_and_cookie_headers() {
    let addr = spawn(engine()).await;
    let client = reqwest::Client::new();

    let body: Value = client
        .get(format!("http://{addr}/reader?popup_id=2&url={PAGE}"))
        .header("Cookie", "amp-access=cookie-reader")
        .header("Referer", "https://news.example.com/?utm_medium=email")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["displayPopup"], false);

    // The email flag was remembered for the cookie's reader only.
    let body: Value = client
        .get(format!("http://{addr}/reader?rid=cookie-reader&popup_id=2&url={PAGE}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["displayPopup"], false);

    let body: Value = client
        .get(format!("http://{addr}/reader?rid=someone-else&popup_id=2&url={PAGE}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["displayPopup"], true);
}

#[tokio::test]
async fn test_form_encoded_acknowledgment() {
    let addr = spawn(engine()).await;
    let client = reqwest::Client::new();
    let body: Value = client
        .post(format!("http://{addr}/reader"))
        .header("Content-Type", "application/x-www-form-urlencoded")
        .body(format!("rid=r2&popup_id=2&url={PAGE}&mailing_list_status=subscribed"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["displayPopup"], false);
    assert_eq!(body["currentViews"], 1);
}

#[tokio::test]
async fn test_store_outage_fails_closed() {
    let engine = DecisionEngine::new(
        Arc::new(FailingStore),
        Arc::new(catalog()),
        Arc::new(StaticSettings::default()),
    );
    let addr = spawn(engine).await;

    let response = reqwest::get(format!("http://{addr}/reader?rid=r1&popup_id=1&url={PAGE}"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["displayPopup"], false);
    assert_eq!(body["status"], 503);

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/reader?rid=r1&popup_id=1&url={PAGE}"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
