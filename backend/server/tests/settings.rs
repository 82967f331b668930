mod support;

use platform::Filter;
use reqwest::StatusCode;
use serde_json::{Value, json};
use support::{TestApp, spawn};

async fn seed_prices(app: &TestApp) -> Vec<Value> {
    let mut prices = Vec::new();

    for (sort_order, (service, label, amount)) in [
        ("daycare", "Tagesbetreuung", 32.0),
        ("hundepension", "Übernachtung", 45.0),
        ("walking", "Gassi-Runde", 18.0),
    ]
    .into_iter()
    .enumerate()
    {
        prices.push(
            app.seed(
                "prices",
                json!({
                    "service": service,
                    "label": label,
                    "amount": amount,
                    "unit": "pro Tag",
                    "sort_order": sort_order,
                }),
            )
            .await,
        );
    }

    prices
}

#[tokio::test]
async fn test_public_prices_ordered() {
    let app = spawn().await;
    seed_prices(&app).await;

    let body: Value = app
        .get("/api/prices")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let services: Vec<&str> = body["prices"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["service"].as_str().unwrap())
        .collect();
    assert_eq!(services, ["daycare", "hundepension", "walking"]);
}

#[tokio::test]
async fn test_price_update_applies_all_rows() {
    let app = spawn().await;
    let prices = seed_prices(&app).await;

    let response = app
        .put("/api/admin/prices")
        .bearer_auth(&app.admin_token)
        .json(&json!({
            "prices": [
                { "id": prices[0]["id"], "amount": 35.0 },
                { "id": prices[2]["id"], "amount": 20.0, "label": "Gassi" },
            ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["prices"][0]["amount"], 35.0);
    assert_eq!(body["prices"][1]["amount"], 45.0);
    assert_eq!(body["prices"][2]["amount"], 20.0);
    assert_eq!(body["prices"][2]["label"], "Gassi");
}

#[tokio::test]
async fn test_failed_price_update_is_rolled_back() {
    let app = spawn().await;
    let prices = seed_prices(&app).await;

    app.platform
        .fail_writes_where("prices", Filter::eq("service", "walking"))
        .await;

    let response = app
        .put("/api/admin/prices")
        .bearer_auth(&app.admin_token)
        .json(&json!({
            "prices": [
                { "id": prices[0]["id"], "amount": 35.0 },
                { "id": prices[1]["id"], "amount": 50.0 },
                { "id": prices[2]["id"], "amount": 20.0 },
            ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let amounts: Vec<f64> = app
        .rows("prices")
        .await
        .iter()
        .map(|p| p["amount"].as_f64().unwrap())
        .collect();
    assert_eq!(amounts, [32.0, 45.0, 18.0]);
}

#[tokio::test]
async fn test_price_validation() {
    let app = spawn().await;
    let prices = seed_prices(&app).await;

    let negative = app
        .put("/api/admin/prices")
        .bearer_auth(&app.admin_token)
        .json(&json!({ "prices": [{ "id": prices[0]["id"], "amount": -1.0 }] }))
        .send()
        .await
        .unwrap();
    assert_eq!(negative.status(), StatusCode::BAD_REQUEST);

    let unknown = app
        .put("/api/admin/prices")
        .bearer_auth(&app.admin_token)
        .json(&json!({
            "prices": [
                { "id": prices[0]["id"], "amount": 40.0 },
                { "id": uuid::Uuid::new_v4(), "amount": 1.0 },
            ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.rows("prices").await[0]["amount"], 32.0);
}

#[tokio::test]
async fn test_newsbar_round_trip() {
    let app = spawn().await;

    let empty: Value = app
        .get("/api/newsbar")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(empty, json!({ "settings": null, "vacationDates": [] }));

    let reversed = app
        .put("/api/admin/newsbar")
        .bearer_auth(&app.admin_token)
        .json(&json!({
            "isActive": true,
            "message": "Betriebsferien",
            "vacationDates": [{ "startDate": "2026-12-24", "endDate": "2026-12-20" }],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(reversed.status(), StatusCode::BAD_REQUEST);

    for dates in [
        json!([
            { "startDate": "2026-08-01", "endDate": "2026-08-14", "label": "Sommer" },
            { "startDate": "2026-12-24", "endDate": "2027-01-01" },
        ]),
        json!([{ "startDate": "2026-12-24", "endDate": "2027-01-02", "label": "Winter" }]),
    ] {
        let response = app
            .put("/api/admin/newsbar")
            .bearer_auth(&app.admin_token)
            .json(&json!({
                "isActive": true,
                "message": "Betriebsferien",
                "linkText": "Details",
                "vacationDates": dates,
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert_eq!(app.rows("newsbar_settings").await.len(), 1);

    let public: Value = app
        .get("/api/newsbar")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(public["settings"]["message"], "Betriebsferien");
    assert_eq!(public["vacationDates"].as_array().unwrap().len(), 1);
    assert_eq!(public["vacationDates"][0]["label"], "Winter");

    let hidden = app
        .put("/api/admin/newsbar")
        .bearer_auth(&app.admin_token)
        .json(&json!({ "isActive": false, "message": "" }))
        .send()
        .await
        .unwrap();
    assert_eq!(hidden.status(), StatusCode::OK);

    let public: Value = app
        .get("/api/newsbar")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(public["settings"].is_null());

    let admin: Value = app
        .get("/api/admin/newsbar")
        .bearer_auth(&app.admin_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(admin["settings"]["is_active"], false);
}

#[tokio::test]
async fn test_failed_newsbar_update_restores_dates() {
    let app = spawn().await;

    let response = app
        .put("/api/admin/newsbar")
        .bearer_auth(&app.admin_token)
        .json(&json!({
            "isActive": true,
            "message": "Betriebsferien",
            "vacationDates": [{ "startDate": "2026-08-01", "endDate": "2026-08-14" }],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    app.platform
        .fail_writes_where("vacation_dates", Filter::eq("label", "Winter"))
        .await;

    let response = app
        .put("/api/admin/newsbar")
        .bearer_auth(&app.admin_token)
        .json(&json!({
            "isActive": true,
            "message": "Neue Ferien",
            "vacationDates": [{ "startDate": "2026-12-24", "endDate": "2027-01-02", "label": "Winter" }],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let settings = app.rows("newsbar_settings").await;
    assert_eq!(settings[0]["message"], "Betriebsferien");

    let dates = app.rows("vacation_dates").await;
    assert_eq!(dates.len(), 1);
    assert_eq!(dates[0]["start_date"], "2026-08-01");
}
