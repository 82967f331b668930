//! Admin-defined custom fields.
//!
//! Values are stored one row per (definition, entity) with one typed column populated. At read
//! time they are folded into the owning row under `property_<definitionId>` keys. Writes go
//! through [`PropertyValue`] so exactly one column is ever populated; legacy rows with several
//! columns set resolve by the order text, number, date, boolean.
use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use platform::{Filter, Platform, Query};
use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::warn;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{EntityType, FieldType, PropertyDefinition, PropertyValueRow, Table},
    store,
    utils::parse_date,
};

pub const KEY_PREFIX: &str = "property_";

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Text(String),
    Number(f64),
    Date(NaiveDate),
    Boolean(bool),
}

impl PropertyValue {
    pub fn to_json(&self) -> Value {
        match self {
            PropertyValue::Text(text) => json!(text),
            PropertyValue::Number(number) => json!(number),
            PropertyValue::Date(date) => json!(date),
            PropertyValue::Boolean(flag) => json!(flag),
        }
    }

    /// All four value columns, the one for this variant set and the rest null.
    pub fn columns(&self) -> Value {
        let mut columns = json!({
            "value_text": null,
            "value_number": null,
            "value_date": null,
            "value_boolean": null,
        });

        let column = match self {
            PropertyValue::Text(_) => "value_text",
            PropertyValue::Number(_) => "value_number",
            PropertyValue::Date(_) => "value_date",
            PropertyValue::Boolean(_) => "value_boolean",
        };
        columns[column] = self.to_json();

        columns
    }

    /// Interprets raw cell input for a definition. `Ok(None)` means "clear the value".
    pub fn coerce(definition: &PropertyDefinition, raw: &Value) -> Result<Option<Self>, AppError> {
        let blank = match raw {
            Value::Null => true,
            Value::String(s) => s.trim().is_empty(),
            _ => false,
        };
        if blank {
            return Ok(None);
        }

        let invalid = || AppError::bad_request(format!("Invalid value for {}", definition.label));

        let value = match definition.field_type {
            FieldType::Text | FieldType::Textarea => match raw {
                Value::String(s) => PropertyValue::Text(s.clone()),
                Value::Number(n) => PropertyValue::Text(n.to_string()),
                _ => return Err(invalid()),
            },
            FieldType::Select => {
                let choice = raw.as_str().ok_or_else(invalid)?;
                let allowed = definition
                    .options
                    .as_ref()
                    .is_some_and(|options| options.iter().any(|o| o == choice));

                if !allowed {
                    return Err(AppError::bad_request(format!(
                        "{choice} is not an option of {}",
                        definition.label
                    )));
                }
                PropertyValue::Text(choice.to_string())
            }
            FieldType::Number => {
                let number = match raw {
                    Value::Number(n) => n.as_f64(),
                    Value::String(s) => s.trim().replace(',', ".").parse::<f64>().ok(),
                    _ => None,
                };
                PropertyValue::Number(number.filter(|n| n.is_finite()).ok_or_else(invalid)?)
            }
            FieldType::Date => {
                let text = raw.as_str().ok_or_else(invalid)?;
                PropertyValue::Date(parse_date(text, &definition.label)?)
            }
            FieldType::Checkbox => match raw {
                Value::Bool(flag) => PropertyValue::Boolean(*flag),
                Value::String(s) if s == "true" => PropertyValue::Boolean(true),
                Value::String(s) if s == "false" => PropertyValue::Boolean(false),
                _ => return Err(invalid()),
            },
        };

        Ok(Some(value))
    }
}

impl PropertyValueRow {
    pub fn value(&self) -> Option<PropertyValue> {
        let populated = [
            self.value_text.is_some(),
            self.value_number.is_some(),
            self.value_date.is_some(),
            self.value_boolean.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count();

        if populated > 1 {
            warn!(
                "Property value {} has {populated} typed columns set, using the first",
                self.id
            );
        }

        self.value_text
            .clone()
            .map(PropertyValue::Text)
            .or(self.value_number.map(PropertyValue::Number))
            .or(self.value_date.map(PropertyValue::Date))
            .or(self.value_boolean.map(PropertyValue::Boolean))
    }
}

pub fn property_key(definition_id: Uuid) -> String {
    format!("{KEY_PREFIX}{definition_id}")
}

/// Groups value rows by entity into `property_<definitionId>` maps.
pub fn group_values(rows: &[PropertyValueRow]) -> HashMap<Uuid, Map<String, Value>> {
    let mut grouped: HashMap<Uuid, Map<String, Value>> = HashMap::new();

    for row in rows {
        if let Some(value) = row.value() {
            grouped
                .entry(row.entity_id)
                .or_default()
                .insert(property_key(row.definition_id), value.to_json());
        }
    }

    grouped
}

pub async fn definitions(
    platform: &dyn Platform,
    entity_type: Option<EntityType>,
) -> Result<Vec<PropertyDefinition>, AppError> {
    let mut query = Query::new().order("sort_order", true).order("created_at", true);

    if let Some(entity_type) = entity_type {
        query = query.eq("entity_type", entity_type.as_str());
    }

    store::fetch_all(platform, query).await
}

/// Serializes `rows` and folds each one's property values into it.
pub async fn with_properties<T, F>(
    platform: &dyn Platform,
    entity_type: EntityType,
    rows: Vec<T>,
    id_of: F,
) -> Result<Vec<Value>, AppError>
where
    T: Serialize,
    F: Fn(&T) -> Uuid,
{
    let ids: Vec<Uuid> = rows.iter().map(&id_of).collect();

    let mut grouped = if ids.is_empty() {
        HashMap::new()
    } else {
        let values: Vec<PropertyValueRow> = store::fetch_all(
            platform,
            Query::new()
                .eq("entity_type", entity_type.as_str())
                .filter(Filter::is_in("entity_id", &ids)),
        )
        .await?;
        group_values(&values)
    };

    rows.into_iter()
        .map(|row| {
            let id = id_of(&row);
            let mut value = serde_json::to_value(row)
                .map_err(|e| AppError::InternalError(e.to_string()))?;

            if let (Value::Object(object), Some(properties)) = (&mut value, grouped.remove(&id)) {
                object.extend(properties);
            }

            Ok(value)
        })
        .collect()
}

/// Where a cell edit from the admin tables lands.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Column(String),
    Property(Uuid),
}

impl Cell {
    pub fn resolve(column_id: &str, standard: &[&str]) -> Result<Self, AppError> {
        if let Some(id) = column_id.strip_prefix(KEY_PREFIX) {
            return Uuid::parse_str(id)
                .map(Cell::Property)
                .map_err(|_| AppError::bad_request(format!("Unknown column {column_id}")));
        }

        if standard.contains(&column_id) {
            return Ok(Cell::Column(column_id.to_string()));
        }

        Err(AppError::bad_request(format!("Unknown column {column_id}")))
    }
}

/// Applies a single cell edit to an entity row or its property values.
pub async fn update_cell<T: Table>(
    platform: &dyn Platform,
    entity_type: EntityType,
    entity_id: Uuid,
    cell: Cell,
    value: Value,
) -> Result<(), AppError> {
    if store::find_by_id::<T>(platform, entity_id).await?.is_none() {
        return Err(AppError::not_found("Record not found"));
    }

    match cell {
        Cell::Column(column) => {
            let mut patch = Map::new();
            patch.insert(column, value);
            if entity_type == EntityType::Customer {
                patch.insert("updated_at".to_string(), json!(Utc::now()));
            }

            store::update_by_id::<T>(platform, entity_id, Value::Object(patch)).await?;
        }
        Cell::Property(definition_id) => {
            let definition: PropertyDefinition = store::find_by_id(platform, definition_id)
                .await?
                .filter(|d: &PropertyDefinition| d.entity_type == entity_type)
                .ok_or_else(|| AppError::not_found("Property not found"))?;

            write_value(platform, &definition, entity_id, &value).await?;
        }
    }

    Ok(())
}

pub async fn write_value(
    platform: &dyn Platform,
    definition: &PropertyDefinition,
    entity_id: Uuid,
    raw: &Value,
) -> Result<(), AppError> {
    let filters = [
        Filter::eq("definition_id", definition.id),
        Filter::eq("entity_id", entity_id),
    ];

    match PropertyValue::coerce(definition, raw)? {
        None => {
            if definition.required {
                return Err(AppError::bad_request(format!(
                    "{} is required",
                    definition.label
                )));
            }
            platform.delete(PropertyValueRow::NAME, &filters).await?;
        }
        Some(value) => {
            let mut row = value.columns();
            row["definition_id"] = json!(definition.id);
            row["entity_id"] = json!(entity_id);
            row["entity_type"] = json!(definition.entity_type);
            row["updated_at"] = json!(Utc::now());

            platform
                .upsert(
                    PropertyValueRow::NAME,
                    vec![row],
                    &["definition_id", "entity_id"],
                )
                .await?;
        }
    }

    Ok(())
}
