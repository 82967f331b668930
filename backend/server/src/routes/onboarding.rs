use std::sync::Arc;

use axum::{Json, extract::State};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{
    auth::MaybeAuthenticated,
    error::AppError,
    onboarding,
    state::State as AppState,
    utils::{Payload, require},
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    token: Option<String>,
    #[serde(default)]
    mark_as_used: bool,
    user_id: Option<Uuid>,
}

/// A signed-in caller's own id wins over one named in the body.
pub async fn verify(
    State(state): State<Arc<AppState>>,
    MaybeAuthenticated(caller): MaybeAuthenticated,
    Payload(request): Payload<VerifyRequest>,
) -> Result<Json<Value>, AppError> {
    let token = require(&request.token, "token")?;
    let user_id = caller.map(|c| c.user.id).or(request.user_id);

    let token = onboarding::redeem(
        state.platform.as_ref(),
        token,
        request.mark_as_used,
        user_id,
    )
    .await?;

    Ok(Json(json!({
        "valid": true,
        "email": token.email,
        "customerId": token.customer_id,
    })))
}
