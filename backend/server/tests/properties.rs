mod support;

use platform::Filter;
use reqwest::StatusCode;
use serde_json::{Value, json};
use support::{TestApp, spawn};

async fn define(app: &TestApp, body: Value) -> reqwest::Response {
    app.post("/api/admin/properties")
        .bearer_auth(&app.admin_token)
        .json(&body)
        .send()
        .await
        .unwrap()
}

async fn edit_customer(app: &TestApp, column: &str, value: Value) -> StatusCode {
    app.patch(&format!("/api/admin/customers/{}", app.customer_id))
        .bearer_auth(&app.admin_token)
        .json(&json!({ "columnId": column, "value": value }))
        .send()
        .await
        .unwrap()
        .status()
}

#[tokio::test]
async fn test_definition_rules() {
    let app = spawn().await;

    let bad_name = define(
        &app,
        json!({ "name": "Size", "label": "Größe", "fieldType": "text", "entityType": "customer" }),
    )
    .await;
    assert_eq!(bad_name.status(), StatusCode::BAD_REQUEST);

    let no_options = define(
        &app,
        json!({ "name": "size", "label": "Größe", "fieldType": "select", "entityType": "customer" }),
    )
    .await;
    assert_eq!(no_options.status(), StatusCode::BAD_REQUEST);

    let first = define(
        &app,
        json!({
            "name": "size",
            "label": "Größe",
            "fieldType": "select",
            "entityType": "customer",
            "options": ["klein", "mittel", "groß"],
        }),
    )
    .await;
    assert_eq!(first.status(), StatusCode::CREATED);

    let duplicate = define(
        &app,
        json!({ "name": "size", "label": "Größe", "fieldType": "text", "entityType": "customer" }),
    )
    .await;
    assert_eq!(duplicate.status(), StatusCode::BAD_REQUEST);

    let lead_field = define(
        &app,
        json!({ "name": "size", "label": "Größe", "fieldType": "text", "entityType": "lead" }),
    )
    .await;
    assert_eq!(lead_field.status(), StatusCode::CREATED);

    let second = define(
        &app,
        json!({ "name": "vaccinated", "label": "Geimpft", "fieldType": "checkbox", "entityType": "customer" }),
    )
    .await;
    let second: Value = second.json().await.unwrap();
    assert_eq!(second["property"]["sort_order"], 1);

    let listed: Value = app
        .get("/api/admin/properties?entityType=customer")
        .bearer_auth(&app.admin_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let names: Vec<&str> = listed["properties"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["size", "vaccinated"]);
}

#[tokio::test]
async fn test_cell_edits_merge_into_rows() {
    let app = spawn().await;

    let size: Value = define(
        &app,
        json!({
            "name": "size",
            "label": "Größe",
            "fieldType": "select",
            "entityType": "customer",
            "options": ["klein", "groß"],
        }),
    )
    .await
    .json()
    .await
    .unwrap();
    let weight: Value = define(
        &app,
        json!({ "name": "weight", "label": "Gewicht", "fieldType": "number", "entityType": "customer" }),
    )
    .await
    .json()
    .await
    .unwrap();

    let size_key = format!("property_{}", size["property"]["id"].as_str().unwrap());
    let weight_key = format!("property_{}", weight["property"]["id"].as_str().unwrap());

    assert_eq!(edit_customer(&app, &size_key, json!("riesig")).await, StatusCode::BAD_REQUEST);
    assert_eq!(edit_customer(&app, &size_key, json!("groß")).await, StatusCode::OK);
    assert_eq!(edit_customer(&app, &weight_key, json!("12.5")).await, StatusCode::OK);
    assert_eq!(edit_customer(&app, &weight_key, json!("schwer")).await, StatusCode::BAD_REQUEST);
    assert_eq!(
        edit_customer(&app, "property_not-a-uuid", json!("x")).await,
        StatusCode::BAD_REQUEST
    );

    let listed: Value = app
        .get("/api/admin/customers")
        .bearer_auth(&app.admin_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let anna = &listed["customers"][0];
    assert_eq!(anna[&size_key], "groß");
    assert_eq!(anna[&weight_key], 12.5);

    let rows = app.rows("property_values").await;
    let weight_row = rows
        .iter()
        .find(|r| r["definition_id"] == weight["property"]["id"])
        .unwrap();
    assert!(weight_row["value_text"].is_null());
    assert_eq!(weight_row["value_number"], 12.5);

    assert_eq!(edit_customer(&app, &size_key, json!("")).await, StatusCode::OK);
    assert_eq!(app.rows("property_values").await.len(), 1);
}

#[tokio::test]
async fn test_multi_column_value_resolves_by_precedence() {
    let app = spawn().await;

    let definition = app
        .seed(
            "property_definitions",
            json!({
                "name": "legacy",
                "label": "Alt",
                "field_type": "text",
                "entity_type": "customer",
                "required": false,
                "sort_order": 0,
            }),
        )
        .await;
    app.seed(
        "property_values",
        json!({
            "definition_id": definition["id"],
            "entity_id": app.customer_id,
            "entity_type": "customer",
            "value_number": 3,
            "value_boolean": true,
            "value_date": "2026-01-01",
        }),
    )
    .await;

    let listed: Value = app
        .get("/api/admin/customers")
        .bearer_auth(&app.admin_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let key = format!("property_{}", definition["id"].as_str().unwrap());
    assert_eq!(listed["customers"][0][&key], 3.0);
}

#[tokio::test]
async fn test_lead_property_on_customer_is_rejected() {
    let app = spawn().await;

    let lead_field: Value = define(
        &app,
        json!({ "name": "source", "label": "Quelle", "fieldType": "text", "entityType": "lead" }),
    )
    .await
    .json()
    .await
    .unwrap();
    let key = format!("property_{}", lead_field["property"]["id"].as_str().unwrap());

    assert_eq!(edit_customer(&app, &key, json!("Flyer")).await, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_definition_removes_values() {
    let app = spawn().await;

    let field: Value = define(
        &app,
        json!({ "name": "chip", "label": "Chip", "fieldType": "text", "entityType": "customer" }),
    )
    .await
    .json()
    .await
    .unwrap();
    let id = field["property"]["id"].as_str().unwrap();

    assert_eq!(
        edit_customer(&app, &format!("property_{id}"), json!("276")).await,
        StatusCode::OK
    );

    let renamed: Value = app
        .patch(&format!("/api/admin/properties/{id}"))
        .bearer_auth(&app.admin_token)
        .json(&json!({ "label": "Chipnummer", "required": true }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(renamed["property"]["label"], "Chipnummer");
    assert_eq!(renamed["property"]["required"], true);

    assert_eq!(
        edit_customer(&app, &format!("property_{id}"), json!(" ")).await,
        StatusCode::BAD_REQUEST
    );

    let response = app
        .delete(&format!("/api/admin/properties/{id}"))
        .bearer_auth(&app.admin_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert!(app.rows("property_definitions").await.is_empty());
    assert!(app.rows("property_values").await.is_empty());
}

#[tokio::test]
async fn test_failed_definition_delete_restores_values() {
    let app = spawn().await;

    let field: Value = define(
        &app,
        json!({ "name": "chip", "label": "Chip", "fieldType": "text", "entityType": "customer" }),
    )
    .await
    .json()
    .await
    .unwrap();
    let id = field["property"]["id"].as_str().unwrap();

    assert_eq!(
        edit_customer(&app, &format!("property_{id}"), json!("276")).await,
        StatusCode::OK
    );

    app.platform
        .fail_writes_where("property_definitions", Filter::eq("id", id))
        .await;

    let response = app
        .delete(&format!("/api/admin/properties/{id}"))
        .bearer_auth(&app.admin_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    assert_eq!(app.rows("property_definitions").await.len(), 1);

    let values = app.rows("property_values").await;
    assert_eq!(values.len(), 1);
    assert_eq!(values[0]["value_text"], "276");
    assert_eq!(values[0]["definition_id"], id);
    assert!(values[0]["updated_at"].is_string());
}
