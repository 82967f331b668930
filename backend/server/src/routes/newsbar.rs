use std::sync::Arc;

use axum::{Json, extract::State};
use chrono::Utc;
use platform::{Filter, Platform, Query};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use crate::{
    auth::AdminUser,
    error::AppError,
    models::{NewsbarSettings, VacationDate},
    state::State as AppState,
    store::{self, Journal},
    utils::{Payload, parse_date, present},
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsbarRequest {
    #[serde(default)]
    is_active: bool,
    message: Option<String>,
    link_text: Option<String>,
    dialog_title: Option<String>,
    dialog_body: Option<String>,
    #[serde(default)]
    vacation_dates: Vec<VacationRequest>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VacationRequest {
    start_date: String,
    end_date: String,
    label: Option<String>,
}

async fn load(platform: &dyn Platform, active_only: bool) -> Result<Value, AppError> {
    let mut query = Query::new().order("updated_at", false);
    if active_only {
        query = query.eq("is_active", true);
    }

    let Some(settings) = store::fetch_one::<NewsbarSettings>(platform, query).await? else {
        return Ok(json!({ "settings": null, "vacationDates": [] }));
    };

    let vacation_dates: Vec<VacationDate> = store::fetch_all(
        platform,
        Query::new()
            .eq("settings_id", settings.id)
            .order("sort_order", true),
    )
    .await?;

    Ok(json!({ "settings": settings, "vacationDates": vacation_dates }))
}

pub async fn public(State(state): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    Ok(Json(load(state.platform.as_ref(), true).await?))
}

pub async fn admin(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> Result<Json<Value>, AppError> {
    Ok(Json(load(state.platform.as_ref(), false).await?))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    Payload(request): Payload<NewsbarRequest>,
) -> Result<Json<Value>, AppError> {
    let message = present(&request.message).unwrap_or_default();
    if request.is_active && message.is_empty() {
        return Err(AppError::bad_request("message is required"));
    }

    let mut dates = Vec::with_capacity(request.vacation_dates.len());
    for vacation in &request.vacation_dates {
        let start = parse_date(&vacation.start_date, "startDate")?;
        let end = parse_date(&vacation.end_date, "endDate")?;
        if end < start {
            return Err(AppError::bad_request("endDate must not be before startDate"));
        }
        dates.push((start, end, present(&vacation.label)));
    }

    let platform = state.platform.as_ref();
    let mut journal = Journal::new(platform);

    let fields = json!({
        "is_active": request.is_active,
        "message": message,
        "link_text": present(&request.link_text),
        "dialog_title": present(&request.dialog_title),
        "dialog_body": present(&request.dialog_body),
        "updated_at": Utc::now(),
    });

    let written = async {
        let latest: Option<NewsbarSettings> =
            store::fetch_one(platform, Query::new().order("updated_at", false)).await?;

        let settings: NewsbarSettings = match latest {
            Some(previous) => {
                let updated = store::update_by_id::<NewsbarSettings>(platform, previous.id, fields)
                    .await?
                    .ok_or_else(|| AppError::not_found("Newsbar settings not found"))?;
                journal.updated(&previous)?;
                updated
            }
            None => {
                let inserted: NewsbarSettings = store::insert_one(platform, fields).await?;
                journal.inserted::<NewsbarSettings>(inserted.id);
                inserted
            }
        };

        let removed: Vec<VacationDate> =
            store::delete_where(platform, &[Filter::eq("settings_id", settings.id)]).await?;
        for previous in &removed {
            journal.deleted(previous)?;
        }

        for (index, (start, end, label)) in dates.iter().enumerate() {
            let row: VacationDate = store::insert_one(
                platform,
                json!({
                    "settings_id": settings.id,
                    "start_date": start,
                    "end_date": end,
                    "label": label,
                    "sort_order": index,
                }),
            )
            .await?;
            journal.inserted::<VacationDate>(row.id);
        }

        Ok::<_, AppError>(settings)
    }
    .await;

    match written {
        Ok(settings) => {
            info!("Newsbar {} updated by {}", settings.id, admin.user.id);
            Ok(Json(load(platform, false).await?))
        }
        Err(e) => {
            journal.unwind().await;
            Err(e)
        }
    }
}
