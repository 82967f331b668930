use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde_json::{Value, json};
use tracing::debug;

use crate::{
    AuthUser, Database, Filter, Identity, PlatformError, Query, Session, SignUp, Storage,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// HTTP client for the hosted platform.
///
/// Data and storage calls use the service key; identity calls use the anon key plus, where the
/// call is about a specific user, that user's access token.
pub struct RestPlatform {
    client: Client,
    url: String,
    anon_key: String,
    service_key: String,
}

impl RestPlatform {
    pub fn new(url: &str, anon_key: &str, service_key: &str) -> Result<Self, PlatformError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            client,
            url: url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            service_key: service_key.to_string(),
        })
    }

    fn data(&self, method: Method, table: &str, prefer: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/rest/v1/{table}", self.url))
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .header("Prefer", prefer)
    }

    fn auth(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/auth/v1/{path}", self.url))
            .header("apikey", &self.anon_key)
    }

    fn storage(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/storage/v1/{path}", self.url))
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }
}

fn filter_params(filters: &[Filter]) -> Vec<(String, String)> {
    filters.iter().map(Filter::to_param).collect()
}

async fn read_json(response: Response) -> Result<Value, PlatformError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        debug!("Platform responded {status}: {body}");
        return Err(PlatformError::api(status, error_message(status, &body)));
    }

    if body.trim().is_empty() {
        return Ok(Value::Null);
    }

    Ok(serde_json::from_str(&body)?)
}

async fn read_rows(response: Response) -> Result<Vec<Value>, PlatformError> {
    match read_json(response).await? {
        Value::Array(rows) => Ok(rows),
        Value::Null => Ok(Vec::new()),
        row => Ok(vec![row]),
    }
}

/// Picks the human readable part out of the platform's various error bodies.
fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            ["message", "msg", "error_description", "error"]
                .iter()
                .find_map(|key| value.get(*key).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                status.to_string()
            } else {
                body.trim().to_string()
            }
        })
}

#[async_trait]
impl Database for RestPlatform {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>, PlatformError> {
        let response = self
            .data(Method::GET, table, "count=none")
            .query(&query.params())
            .send()
            .await?;

        read_rows(response).await
    }

    async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>, PlatformError> {
        let response = self
            .data(Method::POST, table, "return=representation")
            .json(&rows)
            .send()
            .await?;

        read_rows(response).await
    }

    async fn upsert(
        &self,
        table: &str,
        rows: Vec<Value>,
        on_conflict: &[&str],
    ) -> Result<Vec<Value>, PlatformError> {
        let response = self
            .data(
                Method::POST,
                table,
                "resolution=merge-duplicates,return=representation",
            )
            .query(&[("on_conflict", on_conflict.join(","))])
            .json(&rows)
            .send()
            .await?;

        read_rows(response).await
    }

    async fn update(
        &self,
        table: &str,
        filters: &[Filter],
        patch: Value,
    ) -> Result<Vec<Value>, PlatformError> {
        let response = self
            .data(Method::PATCH, table, "return=representation")
            .query(&filter_params(filters))
            .json(&patch)
            .send()
            .await?;

        read_rows(response).await
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<Vec<Value>, PlatformError> {
        let response = self
            .data(Method::DELETE, table, "return=representation")
            .query(&filter_params(filters))
            .send()
            .await?;

        read_rows(response).await
    }
}

#[async_trait]
impl Identity for RestPlatform {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, PlatformError> {
        let response = self
            .auth(Method::POST, "token")
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        if response.status() == StatusCode::BAD_REQUEST {
            return Err(PlatformError::InvalidCredentials);
        }

        Ok(serde_json::from_value(read_json(response).await?)?)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUp, PlatformError> {
        let response = self
            .auth(Method::POST, "signup")
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        let body = read_json(response).await?;

        if body.get("access_token").is_some() {
            let session: Session = serde_json::from_value(body)?;
            return Ok(SignUp {
                user: session.user.clone(),
                session: Some(session),
            });
        }

        let user = body.get("user").cloned().unwrap_or(body);
        Ok(SignUp {
            user: serde_json::from_value(user)?,
            session: None,
        })
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), PlatformError> {
        let response = self
            .auth(Method::POST, "logout")
            .bearer_auth(access_token)
            .send()
            .await?;

        read_json(response).await.map(|_| ())
    }

    async fn get_user(&self, access_token: &str) -> Result<AuthUser, PlatformError> {
        let response = self
            .auth(Method::GET, "user")
            .bearer_auth(access_token)
            .send()
            .await?;

        Ok(serde_json::from_value(read_json(response).await?)?)
    }
}

#[async_trait]
impl Storage for RestPlatform {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), PlatformError> {
        let response = self
            .storage(Method::POST, &format!("object/{bucket}/{path}"))
            .header("Content-Type", content_type)
            .header("x-upsert", "false")
            .body(bytes)
            .send()
            .await?;

        read_json(response).await.map(|_| ())
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<(), PlatformError> {
        let response = self
            .storage(Method::DELETE, &format!("object/{bucket}"))
            .json(&json!({ "prefixes": paths }))
            .send()
            .await?;

        read_json(response).await.map(|_| ())
    }

    async fn create_signed_url(
        &self,
        bucket: &str,
        path: &str,
        expires_in_secs: u64,
    ) -> Result<String, PlatformError> {
        let response = self
            .storage(Method::POST, &format!("object/sign/{bucket}/{path}"))
            .json(&json!({ "expiresIn": expires_in_secs }))
            .send()
            .await?;

        let body = read_json(response).await?;
        let signed = body
            .get("signedURL")
            .or_else(|| body.get("signedUrl"))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                PlatformError::api(StatusCode::BAD_GATEWAY, "Signed URL missing from response")
            })?;

        Ok(format!("{}/storage/v1{signed}", self.url))
    }
}
