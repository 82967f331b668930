//! Rows as the platform stores them. Field names match the table columns.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use uuid::Uuid;

/// A struct that maps one-to-one onto a platform table.
pub trait Table: Serialize + DeserializeOwned + Send {
    const NAME: &'static str;
}

macro_rules! table {
    ($row:ty, $name:literal) => {
        impl Table for $row {
            const NAME: &'static str = $name;
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Customer,
}

impl Role {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "admin" => Some(Role::Admin),
            "customer" => Some(Role::Customer),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub email: Option<String>,
    pub role: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}
table!(Profile, "profiles");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomerStatus {
    Pending,
    Active,
    Inactive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub street: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub status: CustomerStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}
table!(Customer, "customers");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pet {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub name: String,
    pub species: String,
    pub breed: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub weight_kg: Option<f64>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}
table!(Pet, "pets");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub pet_id: Option<Uuid>,
    pub file_name: String,
    pub storage_path: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub created_at: DateTime<Utc>,
}
table!(Document, "documents");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeadStatus {
    New,
    Contacted,
    Converted,
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub service: Option<String>,
    pub message: String,
    pub availability: String,
    pub status: LeadStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}
table!(Lead, "contact_requests");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Approved,
    Rejected,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Approved => "approved",
            BookingStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub pet_id: Uuid,
    pub service_type: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: BookingStatus,
    pub notes: Option<String>,
    pub responded_by: Option<Uuid>,
    pub responded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
table!(Booking, "bookings");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Number,
    Date,
    Select,
    Checkbox,
    Textarea,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Customer,
    Lead,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Customer => "customer",
            EntityType::Lead => "lead",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyDefinition {
    pub id: Uuid,
    pub name: String,
    pub label: String,
    pub field_type: FieldType,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub required: bool,
    pub entity_type: EntityType,
    #[serde(default)]
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
}
table!(PropertyDefinition, "property_definitions");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyValueRow {
    pub id: Uuid,
    pub definition_id: Uuid,
    pub entity_id: Uuid,
    pub entity_type: EntityType,
    pub value_text: Option<String>,
    pub value_number: Option<f64>,
    pub value_date: Option<NaiveDate>,
    pub value_boolean: Option<bool>,
    pub updated_at: Option<DateTime<Utc>>,
}
table!(PropertyValueRow, "property_values");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapacitySetting {
    pub id: Uuid,
    pub service_type: Option<String>,
    pub max_capacity: i64,
    pub updated_at: Option<DateTime<Utc>>,
}
table!(CapacitySetting, "capacity_settings");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsbarSettings {
    pub id: Uuid,
    pub is_active: bool,
    pub message: String,
    pub link_text: Option<String>,
    pub dialog_title: Option<String>,
    pub dialog_body: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}
table!(NewsbarSettings, "newsbar_settings");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VacationDate {
    pub id: Uuid,
    pub settings_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub label: Option<String>,
    pub sort_order: i64,
}
table!(VacationDate, "vacation_dates");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Price {
    pub id: Uuid,
    pub service: String,
    pub label: String,
    pub amount: f64,
    pub unit: Option<String>,
    pub sort_order: i64,
    pub updated_at: Option<DateTime<Utc>>,
}
table!(Price, "prices");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnboardingToken {
    pub id: Uuid,
    pub token: String,
    pub email: String,
    pub customer_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
table!(OnboardingToken, "onboarding_tokens");
