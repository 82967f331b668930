//! HTTP handlers, grouped by the area of the site they serve.
use platform::{Filter, Platform};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{EntityType, PropertyValueRow, Table},
    store::{self, Journal},
    utils::is_email,
};

pub mod auth;
pub mod bookings;
pub mod capacity;
pub mod contact;
pub mod customers;
pub mod documents;
pub mod leads;
pub mod newsbar;
pub mod onboarding;
pub mod portal;
pub mod prices;
pub mod properties;
pub mod reviews;

/// A single edited cell from the admin tables.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellEdit {
    column_id: String,
    #[serde(default)]
    value: Value,
}

/// Checks a standard text column edit: `required` columns need a non-blank string, `email`
/// must look like an address, the rest take a string or null.
fn check_text_cell(column: &str, value: &Value, required: &[&str]) -> Result<(), AppError> {
    if column == "email" {
        return match value.as_str() {
            Some(email) if is_email(email) => Ok(()),
            _ => Err(AppError::bad_request("email is invalid")),
        };
    }

    if required.contains(&column) {
        return match value.as_str() {
            Some(text) if !text.trim().is_empty() => Ok(()),
            _ => Err(AppError::bad_request(format!("{column} is required"))),
        };
    }

    match value {
        Value::String(_) | Value::Null => Ok(()),
        _ => Err(AppError::bad_request(format!("{column} must be text"))),
    }
}

pub async fn health() -> &'static str {
    "ok"
}

/// Deletes an entity and its property values; values come back if the entity delete fails.
async fn remove_with_values<T: Table>(
    platform: &dyn Platform,
    entity_type: EntityType,
    id: Uuid,
) -> Result<(), AppError> {
    if store::find_by_id::<T>(platform, id).await?.is_none() {
        return Err(AppError::not_found("Record not found"));
    }

    let mut journal = Journal::new(platform);

    let removed = async {
        let values: Vec<PropertyValueRow> = store::delete_where(
            platform,
            &[
                Filter::eq("entity_type", entity_type.as_str()),
                Filter::eq("entity_id", id),
            ],
        )
        .await?;
        for value in &values {
            journal.deleted(value)?;
        }

        store::delete_by_id::<T>(platform, id).await?;
        Ok::<_, AppError>(())
    }
    .await;

    if let Err(e) = removed {
        journal.unwind().await;
        return Err(e);
    }

    Ok(())
}
