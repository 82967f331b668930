#![allow(dead_code)]

use std::{net::SocketAddr, sync::Arc};

use axum::Router;
use platform::{AuthUser, MemoryPlatform};
use serde_json::{Value, json};
use server::{build_router, config::Config, state::State};
use uuid::Uuid;

pub const ADMIN_EMAIL: &str = "admin@pawcare.test";
pub const CUSTOMER_EMAIL: &str = "anna@example.com";
pub const PASSWORD: &str = "hunter22";

pub struct TestApp {
    pub base: String,
    pub platform: Arc<MemoryPlatform>,
    pub client: reqwest::Client,
    pub admin: AuthUser,
    pub admin_token: String,
    pub customer: AuthUser,
    pub customer_token: String,
    pub customer_id: Uuid,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.get(self.url(path))
    }

    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.post(self.url(path))
    }

    pub fn put(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.put(self.url(path))
    }

    pub fn patch(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.patch(self.url(path))
    }

    pub fn delete(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.delete(self.url(path))
    }

    pub async fn seed(&self, table: &str, row: Value) -> Value {
        self.platform.seed(table, row).await
    }

    pub async fn rows(&self, table: &str) -> Vec<Value> {
        self.platform.rows(table).await
    }
}

/// Serves `app` on an ephemeral local port.
pub async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move { axum::serve(listener, app).await.expect("serve app") });
    addr
}

pub async fn spawn() -> TestApp {
    spawn_with(Config::default()).await
}

/// Starts the backend over an in-memory platform with one admin and one active customer.
pub async fn spawn_with(config: Config) -> TestApp {
    let platform = Arc::new(MemoryPlatform::new());

    let admin = platform.add_user(ADMIN_EMAIL, PASSWORD).await;
    platform
        .seed(
            "profiles",
            json!({ "id": admin.id, "email": ADMIN_EMAIL, "role": "admin" }),
        )
        .await;

    let customer = platform.add_user(CUSTOMER_EMAIL, PASSWORD).await;
    platform
        .seed(
            "profiles",
            json!({ "id": customer.id, "email": CUSTOMER_EMAIL, "role": "customer" }),
        )
        .await;
    let customer_row = platform
        .seed(
            "customers",
            json!({
                "user_id": customer.id,
                "first_name": "Anna",
                "last_name": "Berg",
                "email": CUSTOMER_EMAIL,
                "status": "active",
            }),
        )
        .await;
    let customer_id = serde_json::from_value(customer_row["id"].clone()).expect("customer id");

    let admin_token = platform.issue_token(&admin).await;
    let customer_token = platform.issue_token(&customer).await;

    let state = State::with_platform(config, platform.clone()).expect("state");
    let app = build_router(state).expect("router");
    let addr = serve(app).await;

    TestApp {
        base: format!("http://{addr}"),
        platform,
        client: reqwest::Client::new(),
        admin,
        admin_token,
        customer,
        customer_token,
        customer_id,
    }
}

/// Adds another customer with a login of their own.
pub async fn other_customer(app: &TestApp, email: &str) -> (String, Uuid) {
    let user = app.platform.add_user(email, PASSWORD).await;
    app.seed(
        "profiles",
        json!({ "id": user.id, "email": email, "role": "customer" }),
    )
    .await;
    let row = app
        .seed(
            "customers",
            json!({
                "user_id": user.id,
                "first_name": "Ben",
                "last_name": "Kraus",
                "email": email,
                "status": "active",
            }),
        )
        .await;

    let token = app.platform.issue_token(&user).await;
    (token, serde_json::from_value(row["id"].clone()).expect("customer id"))
}
