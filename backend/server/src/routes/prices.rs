use std::sync::Arc;

use axum::{Json, extract::State};
use chrono::Utc;
use platform::Query;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;
use uuid::Uuid;

use crate::{
    auth::AdminUser,
    error::AppError,
    models::Price,
    state::State as AppState,
    store::{self, Journal},
    utils::{Payload, patch, present},
};

#[derive(Deserialize)]
pub struct PricesRequest {
    prices: Vec<PriceUpdate>,
}

#[derive(Deserialize)]
pub struct PriceUpdate {
    id: Uuid,
    amount: f64,
    label: Option<String>,
    unit: Option<String>,
}

async fn all(state: &AppState) -> Result<Vec<Price>, AppError> {
    store::fetch_all(state.platform.as_ref(), Query::new().order("sort_order", true)).await
}

pub async fn list(State(state): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    Ok(Json(json!({ "prices": all(&state).await? })))
}

/// Applies every update or none of them.
pub async fn update(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    Payload(request): Payload<PricesRequest>,
) -> Result<Json<Value>, AppError> {
    if let Some(bad) = request
        .prices
        .iter()
        .find(|p| !p.amount.is_finite() || p.amount < 0.0)
    {
        return Err(AppError::bad_request(format!(
            "Invalid amount for price {}",
            bad.id
        )));
    }

    let platform = state.platform.as_ref();
    let mut journal = Journal::new(platform);

    let written = async {
        for update in &request.prices {
            let previous: Price = store::find_by_id(platform, update.id)
                .await?
                .ok_or_else(|| AppError::not_found(format!("Price {} not found", update.id)))?;

            let fields = patch([
                ("amount", Some(json!(update.amount))),
                ("label", present(&update.label).map(|l| json!(l))),
                ("unit", present(&update.unit).map(|u| json!(u))),
                ("updated_at", Some(json!(Utc::now()))),
            ]);

            store::update_by_id::<Price>(platform, update.id, fields).await?;
            journal.updated(&previous)?;
        }

        Ok::<_, AppError>(())
    }
    .await;

    if let Err(e) = written {
        journal.unwind().await;
        return Err(e);
    }

    info!("{} prices updated by {}", request.prices.len(), admin.user.id);

    Ok(Json(json!({ "prices": all(&state).await? })))
}
