use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use chrono::Utc;
use platform::Query;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;
use uuid::Uuid;

use crate::{
    auth::PortalCustomer,
    error::AppError,
    models::{Customer, Pet},
    state::State as AppState,
    store,
    utils::{PathParam, Payload, parse_date, patch, present, require},
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileChanges {
    first_name: Option<String>,
    last_name: Option<String>,
    phone: Option<String>,
    street: Option<String>,
    postal_code: Option<String>,
    city: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PetRequest {
    name: Option<String>,
    species: Option<String>,
    breed: Option<String>,
    birth_date: Option<String>,
    weight_kg: Option<f64>,
    notes: Option<String>,
}

impl PetRequest {
    fn fields(&self) -> Result<Value, AppError> {
        let birth_date = present(&self.birth_date)
            .map(|d| parse_date(d, "birthDate"))
            .transpose()?;

        if self
            .weight_kg
            .is_some_and(|w| !w.is_finite() || w <= 0.0)
        {
            return Err(AppError::bad_request("weightKg must be a positive number"));
        }

        Ok(json!({
            "name": require(&self.name, "name")?,
            "species": require(&self.species, "species")?,
            "breed": present(&self.breed),
            "birth_date": birth_date,
            "weight_kg": self.weight_kg,
            "notes": present(&self.notes),
        }))
    }
}

/// Loads a pet and checks that it belongs to the calling customer.
pub(super) async fn owned_pet(
    state: &AppState,
    customer: &Customer,
    id: Uuid,
) -> Result<Pet, AppError> {
    let pet: Pet = store::find_by_id(state.platform.as_ref(), id)
        .await?
        .ok_or_else(|| AppError::not_found("Pet not found"))?;

    if pet.customer_id != customer.id {
        return Err(AppError::Forbidden("Forbidden".to_string()));
    }

    Ok(pet)
}

pub async fn profile(portal: PortalCustomer) -> Json<Value> {
    Json(json!({ "customer": portal.customer }))
}

pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    portal: PortalCustomer,
    Payload(changes): Payload<ProfileChanges>,
) -> Result<Json<Value>, AppError> {
    for (value, field) in [
        (&changes.first_name, "firstName"),
        (&changes.last_name, "lastName"),
    ] {
        if value.is_some() {
            require(value, field)?;
        }
    }

    let text = |value: &Option<String>| {
        value
            .as_ref()
            .map(|v| if v.trim().is_empty() { Value::Null } else { json!(v.trim()) })
    };

    let fields = patch([
        ("first_name", text(&changes.first_name)),
        ("last_name", text(&changes.last_name)),
        ("phone", text(&changes.phone)),
        ("street", text(&changes.street)),
        ("postal_code", text(&changes.postal_code)),
        ("city", text(&changes.city)),
        ("updated_at", Some(json!(Utc::now()))),
    ]);

    let customer: Customer =
        store::update_by_id(state.platform.as_ref(), portal.customer.id, fields)
            .await?
            .ok_or_else(|| AppError::not_found("Customer not found"))?;

    Ok(Json(json!({ "customer": customer })))
}

pub async fn pets(
    State(state): State<Arc<AppState>>,
    portal: PortalCustomer,
) -> Result<Json<Value>, AppError> {
    let pets: Vec<Pet> = store::fetch_all(
        state.platform.as_ref(),
        Query::new()
            .eq("customer_id", portal.customer.id)
            .order("created_at", true),
    )
    .await?;

    Ok(Json(json!({ "pets": pets })))
}

pub async fn add_pet(
    State(state): State<Arc<AppState>>,
    portal: PortalCustomer,
    Payload(request): Payload<PetRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let mut fields = request.fields()?;
    fields["customer_id"] = json!(portal.customer.id);

    let pet: Pet = store::insert_one(state.platform.as_ref(), fields).await?;

    info!("Customer {} added pet {}", portal.customer.id, pet.id);

    Ok((StatusCode::CREATED, Json(json!({ "pet": pet }))))
}

pub async fn update_pet(
    State(state): State<Arc<AppState>>,
    portal: PortalCustomer,
    PathParam(id): PathParam<Uuid>,
    Payload(request): Payload<PetRequest>,
) -> Result<Json<Value>, AppError> {
    owned_pet(&state, &portal.customer, id).await?;

    let pet: Pet = store::update_by_id(state.platform.as_ref(), id, request.fields()?)
        .await?
        .ok_or_else(|| AppError::not_found("Pet not found"))?;

    Ok(Json(json!({ "pet": pet })))
}

pub async fn delete_pet(
    State(state): State<Arc<AppState>>,
    portal: PortalCustomer,
    PathParam(id): PathParam<Uuid>,
) -> Result<Json<Value>, AppError> {
    owned_pet(&state, &portal.customer, id).await?;
    store::delete_by_id::<Pet>(state.platform.as_ref(), id).await?;

    info!("Customer {} removed pet {id}", portal.customer.id);

    Ok(Json(json!({ "success": true })))
}
