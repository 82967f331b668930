use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use platform::Query;
use serde_json::{Value, json};
use tracing::info;
use uuid::Uuid;

use super::{CellEdit, check_text_cell, remove_with_values};
use crate::{
    auth::AdminUser,
    error::AppError,
    models::{Customer, CustomerStatus, EntityType, Lead, LeadStatus},
    properties::{self, Cell},
    state::State as AppState,
    store::{self, Journal},
    utils::{PathParam, Payload, split_name},
};

const STANDARD_COLUMNS: [&str; 8] = [
    "name",
    "email",
    "phone",
    "service",
    "message",
    "availability",
    "status",
    "notes",
];

const REQUIRED_COLUMNS: [&str; 3] = ["name", "message", "availability"];

pub async fn list(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> Result<Json<Value>, AppError> {
    let platform = state.platform.as_ref();

    let leads: Vec<Lead> =
        store::fetch_all(platform, Query::new().order("created_at", false)).await?;
    let leads = properties::with_properties(platform, EntityType::Lead, leads, |l| l.id).await?;
    let definitions = properties::definitions(platform, Some(EntityType::Lead)).await?;

    Ok(Json(json!({ "leads": leads, "properties": definitions })))
}

pub async fn update_cell(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    PathParam(id): PathParam<Uuid>,
    Payload(edit): Payload<CellEdit>,
) -> Result<Json<Value>, AppError> {
    let cell = Cell::resolve(&edit.column_id, &STANDARD_COLUMNS)?;

    if let Cell::Column(column) = &cell {
        if column == "status" {
            serde_json::from_value::<LeadStatus>(edit.value.clone())
                .map_err(|_| AppError::bad_request("Invalid lead status"))?;
        } else {
            check_text_cell(column, &edit.value, &REQUIRED_COLUMNS)?;
        }
    }

    properties::update_cell::<Lead>(state.platform.as_ref(), EntityType::Lead, id, cell, edit.value)
        .await?;

    Ok(Json(json!({ "success": true })))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    PathParam(id): PathParam<Uuid>,
) -> Result<Json<Value>, AppError> {
    remove_with_values::<Lead>(state.platform.as_ref(), EntityType::Lead, id).await?;

    info!("Lead {id} deleted by {}", admin.user.id);

    Ok(Json(json!({ "success": true })))
}

/// Creates a pending customer from a lead and marks the lead converted.
pub async fn convert(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    PathParam(id): PathParam<Uuid>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let platform = state.platform.as_ref();

    let lead: Lead = store::find_by_id(platform, id)
        .await?
        .ok_or_else(|| AppError::not_found("Lead not found"))?;

    if lead.status == LeadStatus::Converted {
        return Err(AppError::bad_request("Lead already converted"));
    }

    let (first_name, last_name) = split_name(&lead.name);
    let mut journal = Journal::new(platform);

    let converted = async {
        let customer: Customer = store::insert_one(
            platform,
            json!({
                "first_name": first_name,
                "last_name": last_name,
                "email": lead.email.to_lowercase(),
                "phone": lead.phone,
                "notes": lead.notes,
                "status": CustomerStatus::Pending,
            }),
        )
        .await?;
        journal.inserted::<Customer>(customer.id);

        store::update_by_id::<Lead>(platform, lead.id, json!({ "status": LeadStatus::Converted }))
            .await?
            .ok_or_else(|| AppError::not_found("Lead not found"))?;

        Ok::<_, AppError>(customer)
    }
    .await;

    match converted {
        Ok(customer) => {
            info!(
                "Lead {} converted to customer {} by {}",
                lead.id, customer.id, admin.user.id
            );
            Ok((StatusCode::CREATED, Json(json!({ "customer": customer }))))
        }
        Err(e) => {
            journal.unwind().await;
            Err(e)
        }
    }
}
