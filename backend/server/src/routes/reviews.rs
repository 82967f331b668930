use std::sync::Arc;

use axum::{Json, extract::State};
use tracing::info;

use crate::{
    auth::AdminUser,
    error::AppError,
    reviews::{self, ReviewSummary},
    state::State as AppState,
};

pub async fn google(State(state): State<Arc<AppState>>) -> Result<Json<ReviewSummary>, AppError> {
    Ok(Json(reviews::summary(&state, false).await?))
}

pub async fn refresh(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
) -> Result<Json<ReviewSummary>, AppError> {
    let summary = reviews::summary(&state, true).await?;

    info!(
        "Reviews refreshed by {}: {} reviews",
        admin.user.id,
        summary.reviews.len()
    );

    Ok(Json(summary))
}
