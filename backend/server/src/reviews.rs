//! # Google reviews
//!
//! Proxy for the Places details endpoint so the API key never reaches the browser. Responses
//! are normalized into [`ReviewSummary`] and cached, in Redis when `REDIS_URL` is set and in
//! process otherwise. The Places quota is small, so the TTL defaults to six hours.
use std::time::{Duration, Instant};

use redis::{
    AsyncCommands, Client, RedisResult,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::{error::AppError, state::State};

const CACHE_KEY: &str = "reviews:google";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSummary {
    pub rating: Option<f64>,
    pub total_reviews: u64,
    pub reviews: Vec<Review>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub author_name: String,
    pub rating: u8,
    pub text: String,
    pub relative_time: Option<String>,
    pub time: Option<i64>,
    pub profile_photo_url: Option<String>,
}

#[derive(Deserialize)]
struct PlacesResponse {
    status: String,
    error_message: Option<String>,
    result: Option<PlaceResult>,
}

#[derive(Deserialize)]
struct PlaceResult {
    rating: Option<f64>,
    user_ratings_total: Option<u64>,
    #[serde(default)]
    reviews: Vec<PlaceReview>,
}

#[derive(Deserialize)]
struct PlaceReview {
    author_name: String,
    rating: u8,
    #[serde(default)]
    text: String,
    relative_time_description: Option<String>,
    time: Option<i64>,
    profile_photo_url: Option<String>,
}

impl From<PlaceResult> for ReviewSummary {
    fn from(result: PlaceResult) -> Self {
        Self {
            rating: result.rating,
            total_reviews: result.user_ratings_total.unwrap_or(0),
            reviews: result
                .reviews
                .into_iter()
                .map(|review| Review {
                    author_name: review.author_name,
                    rating: review.rating,
                    text: review.text,
                    relative_time: review.relative_time_description,
                    time: review.time,
                    profile_photo_url: review.profile_photo_url,
                })
                .collect(),
        }
    }
}

pub enum ReviewsCache {
    Memory(RwLock<Option<(Instant, ReviewSummary)>>),
    Redis(ConnectionManager),
}

impl ReviewsCache {
    pub fn memory() -> Self {
        ReviewsCache::Memory(RwLock::new(None))
    }

    pub async fn redis(redis_url: &str) -> Result<Self, AppError> {
        let config = ConnectionManagerConfig::new()
            .set_number_of_retries(1)
            .set_connection_timeout(Duration::from_millis(500));

        let client = Client::open(redis_url).map_err(|e| AppError::InternalError(e.to_string()))?;
        let connection_manager = client
            .get_connection_manager_with_config(config)
            .await
            .map_err(|e| AppError::InternalError(e.to_string()))?;

        info!("Caching reviews in Redis");
        Ok(ReviewsCache::Redis(connection_manager))
    }

    async fn get(&self, ttl: Duration) -> Option<ReviewSummary> {
        match self {
            ReviewsCache::Memory(slot) => slot
                .read()
                .await
                .as_ref()
                .filter(|(stored_at, _)| stored_at.elapsed() < ttl)
                .map(|(_, summary)| summary.clone()),
            ReviewsCache::Redis(connection) => {
                let mut connection = connection.clone();
                let cached: RedisResult<Option<String>> = connection.get(CACHE_KEY).await;

                match cached {
                    Ok(json) => json.and_then(|json| serde_json::from_str(&json).ok()),
                    Err(e) => {
                        warn!("Reading reviews cache failed: {e}");
                        None
                    }
                }
            }
        }
    }

    async fn put(&self, summary: &ReviewSummary, ttl: Duration) {
        match self {
            ReviewsCache::Memory(slot) => {
                *slot.write().await = Some((Instant::now(), summary.clone()));
            }
            ReviewsCache::Redis(connection) => {
                let Ok(json) = serde_json::to_string(summary) else {
                    return;
                };

                let mut connection = connection.clone();
                let result: RedisResult<()> = connection
                    .set_ex(CACHE_KEY, json, ttl.as_secs().max(1))
                    .await;

                if let Err(e) = result {
                    warn!("Writing reviews cache failed: {e}");
                }
            }
        }
    }
}

async fn fetch(state: &State) -> Result<Option<ReviewSummary>, AppError> {
    let config = &state.config;

    let (Some(api_key), Some(place_id)) = (&config.places_api_key, &config.place_id) else {
        info!("Places credentials not set, serving empty reviews");
        return Ok(None);
    };

    let response = state
        .http
        .get(&config.places_url)
        .query(&[
            ("place_id", place_id.as_str()),
            ("fields", "rating,user_ratings_total,reviews"),
            ("language", "de"),
            ("key", api_key.as_str()),
        ])
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(AppError::Upstream(format!(
            "Places API responded {}",
            response.status()
        )));
    }

    let body: PlacesResponse = response.json().await?;

    if body.status != "OK" {
        return Err(AppError::Upstream(format!(
            "Places API status {}: {}",
            body.status,
            body.error_message.unwrap_or_default()
        )));
    }

    let result = body
        .result
        .ok_or_else(|| AppError::Upstream("Places API returned no result".to_string()))?;

    Ok(Some(result.into()))
}

/// Cached summary unless `refresh` is set or the entry has expired.
pub async fn summary(state: &State, refresh: bool) -> Result<ReviewSummary, AppError> {
    let ttl = state.config.reviews_ttl;

    if !refresh {
        if let Some(cached) = state.reviews.get(ttl).await {
            return Ok(cached);
        }
    }

    match fetch(state).await? {
        Some(summary) => {
            state.reviews.put(&summary, ttl).await;
            Ok(summary)
        }
        None => Ok(ReviewSummary::default()),
    }
}
