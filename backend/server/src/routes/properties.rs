use std::sync::{Arc, LazyLock};

use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use platform::Filter;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;
use uuid::Uuid;

use crate::{
    auth::AdminUser,
    error::AppError,
    models::{EntityType, FieldType, PropertyDefinition, PropertyValueRow},
    properties,
    state::State as AppState,
    store::{self, Journal},
    utils::{PathParam, Payload, QueryParams, patch, present, require},
};

static PROPERTY_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("property name pattern"));

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyFilter {
    entity_type: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProperty {
    name: Option<String>,
    label: Option<String>,
    field_type: FieldType,
    entity_type: EntityType,
    options: Option<Vec<String>>,
    #[serde(default)]
    required: bool,
    sort_order: Option<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyChanges {
    label: Option<String>,
    options: Option<Vec<String>>,
    required: Option<bool>,
    sort_order: Option<i64>,
}

fn clean_options(options: Option<Vec<String>>) -> Option<Vec<String>> {
    options.map(|options| {
        options
            .into_iter()
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect()
    })
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    QueryParams(filter): QueryParams<PropertyFilter>,
) -> Result<Json<Value>, AppError> {
    let entity_type = present(&filter.entity_type)
        .map(|e| {
            serde_json::from_value::<EntityType>(json!(e))
                .map_err(|_| AppError::bad_request(format!("Unknown entity type {e}")))
        })
        .transpose()?;

    let definitions = properties::definitions(state.platform.as_ref(), entity_type).await?;

    Ok(Json(json!({ "properties": definitions })))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    Payload(request): Payload<NewProperty>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let platform = state.platform.as_ref();

    let name = require(&request.name, "name")?;
    let label = require(&request.label, "label")?;

    if !PROPERTY_NAME.is_match(name) {
        return Err(AppError::bad_request(
            "name must start with a lowercase letter and contain only a-z, 0-9 and _",
        ));
    }

    let options = clean_options(request.options);
    if request.field_type == FieldType::Select && options.as_ref().is_none_or(Vec::is_empty) {
        return Err(AppError::bad_request("select properties need options"));
    }

    let existing = properties::definitions(platform, Some(request.entity_type)).await?;

    if existing.iter().any(|d| d.name == name) {
        return Err(AppError::bad_request(format!(
            "A property named {name} already exists"
        )));
    }

    let sort_order = request.sort_order.unwrap_or_else(|| {
        existing
            .iter()
            .map(|d| d.sort_order)
            .max()
            .map_or(0, |max| max + 1)
    });

    let definition: PropertyDefinition = store::insert_one(
        platform,
        json!({
            "name": name,
            "label": label,
            "field_type": request.field_type,
            "entity_type": request.entity_type,
            "options": options,
            "required": request.required,
            "sort_order": sort_order,
        }),
    )
    .await?;

    info!(
        "Property {} ({}) created by {}",
        definition.name,
        definition.entity_type.as_str(),
        admin.user.id
    );

    Ok((StatusCode::CREATED, Json(json!({ "property": definition }))))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    PathParam(id): PathParam<Uuid>,
    Payload(changes): Payload<PropertyChanges>,
) -> Result<Json<Value>, AppError> {
    let platform = state.platform.as_ref();

    let definition: PropertyDefinition = store::find_by_id(platform, id)
        .await?
        .ok_or_else(|| AppError::not_found("Property not found"))?;

    let options = clean_options(changes.options);
    if definition.field_type == FieldType::Select
        && options.as_ref().is_some_and(Vec::is_empty)
    {
        return Err(AppError::bad_request("select properties need options"));
    }

    if changes.label.is_some() && present(&changes.label).is_none() {
        return Err(AppError::bad_request("label must not be empty"));
    }

    let fields = patch([
        ("label", present(&changes.label).map(|l| json!(l))),
        ("options", options.map(|o| json!(o))),
        ("required", changes.required.map(|r| json!(r))),
        ("sort_order", changes.sort_order.map(|s| json!(s))),
    ]);

    let definition: PropertyDefinition = store::update_by_id(platform, id, fields)
        .await?
        .ok_or_else(|| AppError::not_found("Property not found"))?;

    Ok(Json(json!({ "property": definition })))
}

/// Removes a definition together with every value recorded for it.
pub async fn delete(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    PathParam(id): PathParam<Uuid>,
) -> Result<Json<Value>, AppError> {
    let platform = state.platform.as_ref();

    let definition: PropertyDefinition = store::find_by_id(platform, id)
        .await?
        .ok_or_else(|| AppError::not_found("Property not found"))?;

    let mut journal = Journal::new(platform);

    let removed = async {
        let values: Vec<PropertyValueRow> =
            store::delete_where(platform, &[Filter::eq("definition_id", id)]).await?;
        for value in &values {
            journal.deleted(value)?;
        }

        store::delete_by_id::<PropertyDefinition>(platform, id).await?;
        Ok::<_, AppError>(())
    }
    .await;

    if let Err(e) = removed {
        journal.unwind().await;
        return Err(e);
    }

    info!("Property {} deleted by {}", definition.name, admin.user.id);

    Ok(Json(json!({ "success": true })))
}
