mod support;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode as AxumStatus},
    routing::post,
};
use reqwest::StatusCode;
use serde_json::{Value, json};
use server::config::Config;
use support::{serve, spawn, spawn_with};
use tokio::sync::Mutex;

type Received = Arc<Mutex<Vec<(Option<String>, Value)>>>;

async fn webhook(status: AxumStatus) -> (String, Received) {
    let received: Received = Arc::default();

    let record = move |State(received): State<Received>,
                       headers: HeaderMap,
                       Json(body): Json<Value>| async move {
        let secret = headers
            .get("x-webhook-secret")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        received.lock().await.push((secret, body));
        status
    };

    let app = Router::new()
        .route("/hook", post(record))
        .with_state(received.clone());

    let addr = serve(app).await;
    (format!("http://{addr}/hook"), received)
}

fn boarding() -> Value {
    json!({
        "name": "Anna Berg",
        "email": "anna@example.com",
        "message": "Wir fahren im Sommer weg.",
        "availability": "abends",
        "service": "hundepension",
        "hundeName": "Bello",
        "hunderasse": "Labrador",
        "hundeAlter": "4",
        "konkreterUrlaub": "ja",
        "urlaubVon": "2026-07-01",
        "urlaubBis": "2026-07-14",
    })
}

#[tokio::test]
async fn test_contact_validation() {
    let app = spawn().await;

    let mut missing_dates = boarding();
    missing_dates.as_object_mut().unwrap().remove("urlaubVon");
    missing_dates.as_object_mut().unwrap().remove("urlaubBis");

    let mut reversed = boarding();
    reversed["urlaubVon"] = json!("2026-07-14");
    reversed["urlaubBis"] = json!("2026-07-01");

    let mut bad_email = boarding();
    bad_email["email"] = json!("anna-at-example");

    for body in [missing_dates, reversed, bad_email, json!({ "name": "Anna" })] {
        let response = app.post("/api/contact").json(&body).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");

        let error: Value = response.json().await.unwrap();
        assert!(error["error"].is_string());
    }

    assert!(app.rows("contact_requests").await.is_empty());
}

#[tokio::test]
async fn test_contact_without_webhook_is_accepted() {
    let app = spawn().await;

    let response = app
        .post("/api/contact")
        .json(&boarding())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "success": true }));

    let leads = app.rows("contact_requests").await;
    assert_eq!(leads.len(), 1);
    assert_eq!(leads[0]["status"], "new");
    assert_eq!(leads[0]["service"], "hundepension");
}

#[tokio::test]
async fn test_contact_forwards_to_webhook() {
    let (url, received) = webhook(AxumStatus::OK).await;
    let app = spawn_with(Config {
        webhook_url: Some(url),
        webhook_secret: Some("s3cret".to_string()),
        ..Config::default()
    })
    .await;

    let response = app
        .post("/api/contact")
        .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
        .header("user-agent", "contact-test")
        .json(&boarding())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let received = received.lock().await;
    assert_eq!(received.len(), 1);

    let (secret, payload) = &received[0];
    assert_eq!(secret.as_deref(), Some("s3cret"));
    assert_eq!(payload["hundeName"], "Bello");
    assert_eq!(payload["clientIp"], "203.0.113.7");
    assert_eq!(payload["userAgent"], "contact-test");
    assert!(payload["submittedAt"].as_str().unwrap().ends_with('Z'));
}

#[tokio::test]
async fn test_webhook_failure_is_server_error() {
    let (url, _received) = webhook(AxumStatus::BAD_GATEWAY).await;
    let app = spawn_with(Config {
        webhook_url: Some(url),
        ..Config::default()
    })
    .await;

    let response = app
        .post("/api/contact")
        .json(&boarding())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
