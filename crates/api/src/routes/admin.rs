use axum::extract::State;
use axum::routing::{delete, get};
use axum::{Json, Router};
use serde_json::{Value, json};
use training_core::model::UserId;

use crate::dto::{ProgressReportDto, ResetQuery, ResultReportDto, UserDto};
use crate::error::ApiError;
use crate::extract::{AdminUser, ApiPath, ApiQuery};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/admin/progress", get(all_progress))
        .route("/api/admin/assessment/results", get(all_results))
        .route("/api/admin/assessment/results/:id", delete(reset_results))
        .route("/api/admin/users", get(users))
}

async fn all_progress(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<ProgressReportDto>>, ApiError> {
    let rows = state.services.progress().admin_report().await?;
    Ok(Json(rows.into_iter().map(ProgressReportDto::from).collect()))
}

async fn all_results(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<ResultReportDto>>, ApiError> {
    let rows = state.services.assessments().all_results().await?;
    Ok(Json(rows.into_iter().map(ResultReportDto::from).collect()))
}

async fn reset_results(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<UserId>,
    ApiQuery(query): ApiQuery<ResetQuery>,
) -> Result<Json<Value>, ApiError> {
    let removed = state
        .services
        .assessments()
        .reset_results(&user_id, query.section_id)
        .await?;
    tracing::info!(admin = %admin.id, user_id = %user_id, removed, "assessment results reset by admin");
    Ok(Json(json!({
        "message": "Assessment results reset successfully",
        "removed": removed,
    })))
}

async fn users(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<UserDto>>, ApiError> {
    let users = state.services.auth().list_users().await?;
    Ok(Json(users.into_iter().map(UserDto::from).collect()))
}
