use std::{collections::HashMap, sync::Arc};

use axum::{Json, extract::State};
use chrono::Utc;
use platform::{Filter, Query};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;
use uuid::Uuid;

use crate::{
    auth::AdminUser,
    error::AppError,
    models::{Booking, BookingStatus, Customer, Pet},
    state::State as AppState,
    store,
    utils::{PathParam, Payload, QueryParams, patch, present},
};

#[derive(Deserialize)]
pub struct BookingFilter {
    status: Option<String>,
}

#[derive(Deserialize)]
pub struct BookingResponse {
    status: BookingStatus,
    notes: Option<String>,
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    QueryParams(filter): QueryParams<BookingFilter>,
) -> Result<Json<Value>, AppError> {
    let platform = state.platform.as_ref();

    let mut query = Query::new().order("created_at", false);
    if let Some(status) = present(&filter.status) {
        let status: BookingStatus = serde_json::from_value(json!(status))
            .map_err(|_| AppError::bad_request(format!("Unknown booking status {status}")))?;
        query = query.eq("status", status.as_str());
    }

    let bookings: Vec<Booking> = store::fetch_all(platform, query).await?;

    let customer_ids: Vec<Uuid> = bookings.iter().map(|b| b.customer_id).collect();
    let pet_ids: Vec<Uuid> = bookings.iter().map(|b| b.pet_id).collect();

    let (customers, pets): (HashMap<Uuid, Customer>, HashMap<Uuid, Pet>) = if bookings.is_empty() {
        (HashMap::new(), HashMap::new())
    } else {
        let customers: Vec<Customer> =
            store::fetch_all(platform, Query::new().filter(Filter::is_in("id", &customer_ids)))
                .await?;
        let pets: Vec<Pet> =
            store::fetch_all(platform, Query::new().filter(Filter::is_in("id", &pet_ids))).await?;

        (
            customers.into_iter().map(|c| (c.id, c)).collect(),
            pets.into_iter().map(|p| (p.id, p)).collect(),
        )
    };

    let bookings = bookings
        .into_iter()
        .map(|booking| {
            let customer = customers.get(&booking.customer_id).map(|c| {
                json!({
                    "id": c.id,
                    "first_name": c.first_name,
                    "last_name": c.last_name,
                    "email": c.email,
                })
            });
            let pet = pets
                .get(&booking.pet_id)
                .map(|p| json!({ "id": p.id, "name": p.name, "species": p.species }));

            let mut row = json!(booking);
            row["customer"] = json!(customer);
            row["pet"] = json!(pet);
            row
        })
        .collect::<Vec<_>>();

    Ok(Json(json!({ "bookings": bookings })))
}

pub async fn respond(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    PathParam(id): PathParam<Uuid>,
    Payload(response): Payload<BookingResponse>,
) -> Result<Json<Value>, AppError> {
    if response.status == BookingStatus::Pending {
        return Err(AppError::bad_request("status must be approved or rejected"));
    }

    let fields = patch([
        ("status", Some(json!(response.status))),
        ("notes", present(&response.notes).map(|n| json!(n))),
        ("responded_by", Some(json!(admin.user.id))),
        ("responded_at", Some(json!(Utc::now()))),
    ]);

    let booking: Booking = store::update_by_id(state.platform.as_ref(), id, fields)
        .await?
        .ok_or_else(|| AppError::not_found("Booking not found"))?;

    info!(
        "Booking {} marked {:?} by {}",
        booking.id, booking.status, admin.user.id
    );

    Ok(Json(json!({ "booking": booking })))
}
