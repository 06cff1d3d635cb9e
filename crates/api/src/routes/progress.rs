use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use training_core::model::{ModuleId, ProgressStatus};

use crate::dto::{ProgressBody, ProgressDto, SectionSummaryDto};
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath, CurrentUser};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/progress", get(list_progress).post(update_progress))
        .route("/api/progress/sections", get(section_summaries))
        .route("/api/progress/:id", get(module_progress))
}

async fn list_progress(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<ProgressDto>>, ApiError> {
    let rows = state.services.progress().list_for_user(&user.id).await?;
    Ok(Json(rows.into_iter().map(ProgressDto::from).collect()))
}

/// `null` until the user opens the module.
async fn module_progress(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    ApiPath(module_id): ApiPath<ModuleId>,
) -> Result<Json<Option<ProgressDto>>, ApiError> {
    let row = state
        .services
        .progress()
        .get_progress(&user.id, module_id)
        .await?;
    Ok(Json(row.map(ProgressDto::from)))
}

async fn update_progress(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ProgressBody>,
) -> Result<Json<ProgressDto>, ApiError> {
    let status =
        ProgressStatus::parse(&body.status).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let row = state
        .services
        .progress()
        .update_status(&user.id, body.module_id, status, body.last_viewed_page_id)
        .await?;
    Ok(Json(row.into()))
}

async fn section_summaries(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<SectionSummaryDto>>, ApiError> {
    let summaries = state.services.progress().section_summaries(&user.id).await?;
    Ok(Json(summaries.into_iter().map(SectionSummaryDto::from).collect()))
}
