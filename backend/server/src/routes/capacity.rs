use std::sync::Arc;

use axum::{Json, extract::State};
use chrono::Utc;
use platform::{Filter, Query};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    auth::AdminUser,
    error::AppError,
    models::CapacitySetting,
    state::State as AppState,
    store,
    utils::{Payload, present},
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityRequest {
    service_type: Option<String>,
    max_capacity: i64,
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> Result<Json<Value>, AppError> {
    let settings: Vec<CapacitySetting> = store::fetch_all(
        state.platform.as_ref(),
        Query::new().order("service_type", true),
    )
    .await?;

    Ok(Json(json!({ "settings": settings })))
}

/// Sets the capacity for one service type, or the global default when none is given.
pub async fn update(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Payload(request): Payload<CapacityRequest>,
) -> Result<Json<Value>, AppError> {
    if request.max_capacity < 0 {
        return Err(AppError::bad_request("maxCapacity must not be negative"));
    }

    let platform = state.platform.as_ref();
    let service_type = present(&request.service_type);

    let scope = match service_type {
        Some(service_type) => Filter::eq("service_type", service_type),
        None => Filter::is_null("service_type"),
    };

    let existing: Option<CapacitySetting> =
        store::fetch_one(platform, Query::new().filter(scope)).await?;

    let setting: CapacitySetting = match existing {
        Some(existing) => store::update_by_id(
            platform,
            existing.id,
            json!({ "max_capacity": request.max_capacity, "updated_at": Utc::now() }),
        )
        .await?
        .ok_or_else(|| AppError::not_found("Capacity setting not found"))?,
        None => {
            store::insert_one(
                platform,
                json!({
                    "service_type": service_type,
                    "max_capacity": request.max_capacity,
                    "updated_at": Utc::now(),
                }),
            )
            .await?
        }
    };

    Ok(Json(json!({ "setting": setting })))
}
