//! # Platform
//!
//! Client for the managed backend the service runs on. Everything stateful lives there:
//!
//! - **Database**: relational tables behind a PostgREST endpoint (`/rest/v1`)
//! - **Identity**: password sign-in, sign-up and token introspection (`/auth/v1`)
//! - **Storage**: private buckets for customer documents (`/storage/v1`)
//!
//! The server only ever talks to these through the [`Platform`] trait. [`RestPlatform`] is the
//! production implementation, [`MemoryPlatform`] keeps everything in process for tests and local
//! runs.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub mod error;
pub mod memory;
pub mod query;
pub mod rest;

pub use error::PlatformError;
pub use memory::MemoryPlatform;
pub use query::{Filter, Query};
pub use rest::RestPlatform;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: AuthUser,
}

#[derive(Debug, Clone)]
pub struct SignUp {
    pub user: AuthUser,
    /// Absent when the platform requires email confirmation first.
    pub session: Option<Session>,
}

#[async_trait]
pub trait Database: Send + Sync {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>, PlatformError>;

    async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>, PlatformError>;

    /// Insert, merging into existing rows that collide on `on_conflict`.
    async fn upsert(
        &self,
        table: &str,
        rows: Vec<Value>,
        on_conflict: &[&str],
    ) -> Result<Vec<Value>, PlatformError>;

    async fn update(
        &self,
        table: &str,
        filters: &[Filter],
        patch: Value,
    ) -> Result<Vec<Value>, PlatformError>;

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<Vec<Value>, PlatformError>;
}

#[async_trait]
pub trait Identity: Send + Sync {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, PlatformError>;

    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUp, PlatformError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), PlatformError>;

    /// Resolves an access token to its user, the platform's "who is this" call.
    async fn get_user(&self, access_token: &str) -> Result<AuthUser, PlatformError>;
}

#[async_trait]
pub trait Storage: Send + Sync {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), PlatformError>;

    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<(), PlatformError>;

    async fn create_signed_url(
        &self,
        bucket: &str,
        path: &str,
        expires_in_secs: u64,
    ) -> Result<String, PlatformError>;
}

pub trait Platform: Database + Identity + Storage {}

impl<T: Database + Identity + Storage> Platform for T {}
