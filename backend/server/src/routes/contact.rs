use std::sync::Arc;

use axum::{Json, extract::State, http::HeaderMap};
use chrono::Utc;
use serde_json::{Value, json};
use tracing::warn;

use crate::{
    contact::{self, ContactForm, Submission, webhook_payload},
    error::AppError,
    models::{Lead, LeadStatus, Table},
    state::State as AppState,
    utils::{Payload, client_ip, present, user_agent},
};

pub async fn submit(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Payload(form): Payload<ContactForm>,
) -> Result<Json<Value>, AppError> {
    form.validate()?;

    let submission = Submission {
        submitted_at: Utc::now(),
        client_ip: client_ip(&headers),
        user_agent: user_agent(&headers),
    };

    record_lead(&state, &form).await;

    let payload = webhook_payload(&form, &submission)?;
    contact::forward(&state.http, &state.config, &payload).await?;

    Ok(Json(json!({ "success": true })))
}

async fn record_lead(state: &AppState, form: &ContactForm) {
    let row = json!({
        "name": present(&form.name),
        "email": present(&form.email),
        "phone": present(&form.phone),
        "service": present(&form.service),
        "message": present(&form.message),
        "availability": present(&form.availability),
        "status": LeadStatus::New,
    });

    if let Err(e) = state.platform.insert(Lead::NAME, vec![row]).await {
        warn!("Storing contact request as lead failed: {e}");
    }
}
