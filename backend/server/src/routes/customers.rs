use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use platform::Query;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;
use uuid::Uuid;

use super::{CellEdit, check_text_cell, remove_with_values};
use crate::{
    auth::AdminUser,
    error::AppError,
    models::{Customer, CustomerStatus, EntityType},
    onboarding::{self, Invitation},
    properties::{self, Cell},
    state::State as AppState,
    store,
    utils::{PathParam, Payload, is_email, present, require},
};

const STANDARD_COLUMNS: [&str; 9] = [
    "first_name",
    "last_name",
    "email",
    "phone",
    "street",
    "postal_code",
    "city",
    "status",
    "notes",
];

const REQUIRED_COLUMNS: [&str; 2] = ["first_name", "last_name"];

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCustomer {
    first_name: Option<String>,
    last_name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    street: Option<String>,
    postal_code: Option<String>,
    city: Option<String>,
    notes: Option<String>,
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> Result<Json<Value>, AppError> {
    let platform = state.platform.as_ref();

    let customers: Vec<Customer> =
        store::fetch_all(platform, Query::new().order("created_at", false)).await?;
    let customers =
        properties::with_properties(platform, EntityType::Customer, customers, |c| c.id).await?;
    let definitions = properties::definitions(platform, Some(EntityType::Customer)).await?;

    Ok(Json(json!({ "customers": customers, "properties": definitions })))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    Payload(request): Payload<NewCustomer>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let first_name = require(&request.first_name, "firstName")?;
    let last_name = require(&request.last_name, "lastName")?;
    let email = require(&request.email, "email")?.to_lowercase();

    if !is_email(&email) {
        return Err(AppError::bad_request("email is invalid"));
    }

    let customer: Customer = store::insert_one(
        state.platform.as_ref(),
        json!({
            "first_name": first_name,
            "last_name": last_name,
            "email": email,
            "phone": present(&request.phone),
            "street": present(&request.street),
            "postal_code": present(&request.postal_code),
            "city": present(&request.city),
            "notes": present(&request.notes),
            "status": CustomerStatus::Pending,
        }),
    )
    .await?;

    info!("Customer {} created by {}", customer.id, admin.user.id);

    Ok((StatusCode::CREATED, Json(json!({ "customer": customer }))))
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
            serde_json::from_value::<CustomerStatus>(edit.value.clone())
                .map_err(|_| AppError::bad_request("Invalid customer status"))?;
        } else {
            check_text_cell(column, &edit.value, &REQUIRED_COLUMNS)?;
        }
    }

    properties::update_cell::<Customer>(
        state.platform.as_ref(),
        EntityType::Customer,
        id,
        cell,
        edit.value,
    )
    .await?;

    Ok(Json(json!({ "success": true })))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    PathParam(id): PathParam<Uuid>,
) -> Result<Json<Value>, AppError> {
    remove_with_values::<Customer>(state.platform.as_ref(), EntityType::Customer, id).await?;

    info!("Customer {id} deleted by {}", admin.user.id);

    Ok(Json(json!({ "success": true })))
}

pub async fn invite(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    PathParam(id): PathParam<Uuid>,
) -> Result<Json<Invitation>, AppError> {
    let customer: Customer = store::find_by_id(state.platform.as_ref(), id)
        .await?
        .ok_or_else(|| AppError::not_found("Customer not found"))?;

    let invitation = onboarding::issue(&state, &customer).await?;

    info!(
        "Invitation for customer {} issued, delivered: {}",
        customer.id, invitation.delivered
    );

    Ok(Json(invitation))
}
