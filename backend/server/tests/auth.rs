mod support;

use reqwest::{StatusCode, header::SET_COOKIE};
use serde_json::{Value, json};
use support::{ADMIN_EMAIL, CUSTOMER_EMAIL, PASSWORD, spawn};

fn set_cookies(response: &reqwest::Response) -> Vec<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect()
}

#[tokio::test]
async fn test_login_sets_session_cookies() {
    let app = spawn().await;

    let response = app
        .post("/api/auth/login")
        .json(&json!({ "email": ADMIN_EMAIL, "password": PASSWORD }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let cookies = set_cookies(&response);
    let access = cookies
        .iter()
        .find(|c| c.starts_with("sb-access-token="))
        .expect("access cookie");
    let refresh = cookies
        .iter()
        .find(|c| c.starts_with("sb-refresh-token="))
        .expect("refresh cookie");

    assert!(access.contains("HttpOnly"));
    assert!(access.contains("SameSite=Lax"));
    assert!(access.contains("Path=/"));
    assert!(access.contains("Max-Age=3600"));
    assert!(!access.contains("Secure"));
    assert!(refresh.contains("Max-Age=2592000"));

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["user"]["email"], ADMIN_EMAIL);
    assert_eq!(body["user"]["role"], "admin");
    assert!(body["session"]["access_token"].is_string());
    assert_eq!(body["session"]["expires_in"], 3600);
}

#[tokio::test]
async fn test_login_rejects_bad_password() {
    let app = spawn().await;

    let response = app
        .post("/api/auth/login")
        .json(&json!({ "email": CUSTOMER_EMAIL, "password": "wrong-password" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(set_cookies(&response).is_empty());

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Invalid email or password");
}

#[tokio::test]
async fn test_login_requires_fields() {
    let app = spawn().await;

    let response = app
        .post("/api/auth/login")
        .json(&json!({ "email": CUSTOMER_EMAIL }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_session_cookie_authenticates() {
    let app = spawn().await;

    let login: Value = app
        .post("/api/auth/login")
        .json(&json!({ "email": CUSTOMER_EMAIL, "password": PASSWORD }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let token = login["session"]["access_token"].as_str().unwrap();

    let response = app
        .get("/api/auth/me")
        .header("cookie", format!("sb-access-token={token}"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["user"]["role"], "customer");
}

#[tokio::test]
async fn test_me_without_token() {
    let app = spawn().await;

    let response = app.get("/api/auth/me").send().await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_creates_customer_profile() {
    let app = spawn().await;

    let short = app
        .post("/api/auth/register")
        .json(&json!({ "email": "new@example.com", "password": "12345" }))
        .send()
        .await
        .unwrap();
    assert_eq!(short.status(), StatusCode::BAD_REQUEST);

    let response = app
        .post("/api/auth/register")
        .json(&json!({
            "email": "New@Example.com",
            "password": "123456",
            "firstName": "Nina",
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["user"]["role"], "customer");

    let profiles = app.rows("profiles").await;
    let profile = profiles
        .iter()
        .find(|p| p["email"] == "new@example.com")
        .expect("profile row");
    assert_eq!(profile["role"], "customer");
    assert_eq!(profile["first_name"], "Nina");
}

#[tokio::test]
async fn test_logout_clears_cookies() {
    let app = spawn().await;

    let response = app
        .post("/api/auth/logout")
        .bearer_auth(&app.customer_token)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let cookies = set_cookies(&response);
    assert_eq!(cookies.len(), 2);
    assert!(cookies.iter().all(|c| c.contains("Max-Age=0")));

    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "success": true }));

    let after = app
        .get("/api/auth/me")
        .bearer_auth(&app.customer_token)
        .send()
        .await
        .unwrap();
    assert_eq!(after.status(), StatusCode::UNAUTHORIZED);
}
