//! In-process stand-in for the hosted platform, used by tests and local runs.

use std::{cmp::Ordering, collections::HashMap};

use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    AuthUser, Database, Filter, Identity, PlatformError, Query, Session, SignUp, Storage,
    query::render,
};

const SESSION_TTL_SECS: i64 = 3600;

struct MemoryUser {
    user: AuthUser,
    password: String,
}

#[derive(Default)]
pub struct MemoryPlatform {
    tables: Mutex<HashMap<String, Vec<Value>>>,
    users: Mutex<Vec<MemoryUser>>,
    sessions: Mutex<HashMap<String, AuthUser>>,
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
    failures: Mutex<Vec<(String, Filter)>>,
    fail_removals: Mutex<bool>,
}

impl MemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a row as-is, filling `id` and `created_at` when absent.
    pub async fn seed(&self, table: &str, row: Value) -> Value {
        let row = with_defaults(row);
        self.tables
            .lock()
            .await
            .entry(table.to_string())
            .or_default()
            .push(row.clone());
        row
    }

    pub async fn rows(&self, table: &str) -> Vec<Value> {
        self.tables
            .lock()
            .await
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn add_user(&self, email: &str, password: &str) -> AuthUser {
        let user = AuthUser {
            id: Uuid::new_v4(),
            email: Some(email.to_string()),
        };

        self.users.lock().await.push(MemoryUser {
            user: user.clone(),
            password: password.to_string(),
        });

        user
    }

    /// Mints an access token for a user without going through sign-in.
    pub async fn issue_token(&self, user: &AuthUser) -> String {
        let token = Uuid::new_v4().simple().to_string();
        self.sessions
            .lock()
            .await
            .insert(token.clone(), user.clone());
        token
    }

    /// Every later insert, update or delete touching a row of `table` that matches `filter` fails.
    pub async fn fail_writes_where(&self, table: &str, filter: Filter) {
        self.failures.lock().await.push((table.to_string(), filter));
    }

    pub async fn fail_storage_removals(&self) {
        *self.fail_removals.lock().await = true;
    }

    pub async fn object(&self, bucket: &str, path: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .await
            .get(&(bucket.to_string(), path.to_string()))
            .cloned()
    }

    async fn check_failure(&self, table: &str, row: &Value) -> Result<(), PlatformError> {
        let failures = self.failures.lock().await;

        if failures
            .iter()
            .any(|(failing, filter)| failing == table && filter.matches(row))
        {
            return Err(PlatformError::api(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Write to {table} rejected"),
            ));
        }

        Ok(())
    }

    async fn session_for(&self, user: &AuthUser) -> Session {
        let access_token = self.issue_token(user).await;

        Session {
            access_token,
            refresh_token: Uuid::new_v4().simple().to_string(),
            expires_in: SESSION_TTL_SECS,
            expires_at: Some(Utc::now().timestamp() + SESSION_TTL_SECS),
            user: user.clone(),
        }
    }
}

fn with_defaults(row: Value) -> Value {
    let mut object = match row {
        Value::Object(object) => object,
        _ => Map::new(),
    };

    object
        .entry("id")
        .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
    object
        .entry("created_at")
        .or_insert_with(|| Value::String(Utc::now().to_rfc3339()));

    Value::Object(object)
}

fn merge(row: &mut Value, patch: &Value) {
    if let (Value::Object(target), Value::Object(source)) = (row, patch) {
        for (key, value) in source {
            target.insert(key.clone(), value.clone());
        }
    }
}

fn compare(a: &Value, b: &Value, column: &str) -> Ordering {
    match (a.get(column), b.get(column)) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (x, y) => {
            let x = x.and_then(render);
            let y = y.and_then(render);

            match (x, y) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
        }
    }
}

fn conflicts(existing: &Value, row: &Value, on_conflict: &[&str]) -> bool {
    on_conflict.iter().all(|column| {
        let left = existing.get(*column).and_then(render);
        left.is_some() && left == row.get(*column).and_then(render)
    })
}

#[async_trait]
impl Database for MemoryPlatform {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>, PlatformError> {
        let mut rows: Vec<Value> = self
            .rows(table)
            .await
            .into_iter()
            .filter(|row| query.filters.iter().all(|f| f.matches(row)))
            .collect();

        rows.sort_by(|a, b| {
            query
                .order
                .iter()
                .map(|order| {
                    let ordering = compare(a, b, &order.column);
                    if order.ascending { ordering } else { ordering.reverse() }
                })
                .find(|ordering| *ordering != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });

        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }

        Ok(rows)
    }

    async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>, PlatformError> {
        let rows: Vec<Value> = rows.into_iter().map(with_defaults).collect();

        for row in &rows {
            self.check_failure(table, row).await?;
        }

        self.tables
            .lock()
            .await
            .entry(table.to_string())
            .or_default()
            .extend(rows.iter().cloned());

        Ok(rows)
    }

    async fn upsert(
        &self,
        table: &str,
        rows: Vec<Value>,
        on_conflict: &[&str],
    ) -> Result<Vec<Value>, PlatformError> {
        let mut written = Vec::with_capacity(rows.len());

        for row in rows {
            self.check_failure(table, &row).await?;

            let mut tables = self.tables.lock().await;
            let stored = tables.entry(table.to_string()).or_default();

            match stored
                .iter_mut()
                .find(|existing| conflicts(existing, &row, on_conflict))
            {
                Some(existing) => {
                    merge(existing, &row);
                    written.push(existing.clone());
                }
                None => {
                    let row = with_defaults(row);
                    stored.push(row.clone());
                    written.push(row);
                }
            }
        }

        Ok(written)
    }

    async fn update(
        &self,
        table: &str,
        filters: &[Filter],
        patch: Value,
    ) -> Result<Vec<Value>, PlatformError> {
        let matching: Vec<Value> = self
            .rows(table)
            .await
            .into_iter()
            .filter(|row| filters.iter().all(|f| f.matches(row)))
            .collect();

        for row in &matching {
            self.check_failure(table, row).await?;
        }

        let mut tables = self.tables.lock().await;
        let mut updated = Vec::new();

        for row in tables.entry(table.to_string()).or_default().iter_mut() {
            if filters.iter().all(|f| f.matches(row)) {
                merge(row, &patch);
                updated.push(row.clone());
            }
        }

        Ok(updated)
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<Vec<Value>, PlatformError> {
        let stored = self.rows(table).await;

        for row in stored.iter().filter(|row| filters.iter().all(|f| f.matches(row))) {
            self.check_failure(table, row).await?;
        }

        let (removed, kept): (Vec<Value>, Vec<Value>) = stored
            .into_iter()
            .partition(|row| filters.iter().all(|f| f.matches(row)));

        self.tables.lock().await.insert(table.to_string(), kept);

        Ok(removed)
    }
}

#[async_trait]
impl Identity for MemoryPlatform {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, PlatformError> {
        let user = self
            .users
            .lock()
            .await
            .iter()
            .find(|u| u.user.email.as_deref() == Some(email) && u.password == password)
            .map(|u| u.user.clone())
            .ok_or(PlatformError::InvalidCredentials)?;

        Ok(self.session_for(&user).await)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUp, PlatformError> {
        let taken = self
            .users
            .lock()
            .await
            .iter()
            .any(|u| u.user.email.as_deref() == Some(email));

        if taken {
            return Err(PlatformError::api(
                StatusCode::UNPROCESSABLE_ENTITY,
                "User already registered",
            ));
        }

        let user = self.add_user(email, password).await;
        let session = self.session_for(&user).await;

        Ok(SignUp {
            user,
            session: Some(session),
        })
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), PlatformError> {
        self.sessions.lock().await.remove(access_token);
        Ok(())
    }

    async fn get_user(&self, access_token: &str) -> Result<AuthUser, PlatformError> {
        self.sessions
            .lock()
            .await
            .get(access_token)
            .cloned()
            .ok_or_else(|| PlatformError::api(StatusCode::UNAUTHORIZED, "Invalid JWT"))
    }
}

#[async_trait]
impl Storage for MemoryPlatform {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), PlatformError> {
        self.objects
            .lock()
            .await
            .insert((bucket.to_string(), path.to_string()), bytes);
        Ok(())
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<(), PlatformError> {
        if *self.fail_removals.lock().await {
            return Err(PlatformError::api(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Storage unavailable",
            ));
        }

        let mut objects = self.objects.lock().await;
        for path in paths {
            objects.remove(&(bucket.to_string(), path.clone()));
        }

        Ok(())
    }

    async fn create_signed_url(
        &self,
        bucket: &str,
        path: &str,
        expires_in_secs: u64,
    ) -> Result<String, PlatformError> {
        if !self
            .objects
            .lock()
            .await
            .contains_key(&(bucket.to_string(), path.to_string()))
        {
            return Err(PlatformError::api(StatusCode::NOT_FOUND, "Object not found"));
        }

        Ok(format!(
            "memory://{bucket}/{path}?expires_in={expires_in_secs}"
        ))
    }
}
