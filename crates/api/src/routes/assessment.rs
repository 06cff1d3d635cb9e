//! Questions, attempts, results and certificates.

use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use training_core::model::{QuestionDraft, QuestionId, QuestionPatch, ResultId, SectionId};

use crate::dto::{
    AttemptDto, CreateQuestionBody, Message, QuestionDto, ResultDto, SubmitBody,
    UpdateQuestionBody, marker_text,
};
use crate::error::ApiError;
use crate::extract::{AdminUser, ApiJson, ApiPath, CurrentUser};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/sections/:id/assessment/questions", get(section_questions))
        .route("/api/sections/:id/assessment/start", post(start_attempt))
        .route(
            "/api/assessment/questions",
            get(all_questions).post(create_question),
        )
        .route(
            "/api/assessment/questions/:id",
            put(update_question).delete(delete_question),
        )
        .route("/api/assessment/results", get(my_results).post(submit))
        .route("/api/certificate/:id", get(certificate))
}

/// Admins see the answer key; everyone else gets the questions without it.
async fn section_questions(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    ApiPath(section_id): ApiPath<SectionId>,
) -> Result<Json<Vec<QuestionDto>>, ApiError> {
    let questions = state
        .services
        .assessments()
        .questions_for_section(section_id)
        .await?;
    let shape = if user.is_admin() {
        QuestionDto::with_key
    } else {
        QuestionDto::redacted
    };
    Ok(Json(questions.into_iter().map(shape).collect()))
}

async fn start_attempt(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    ApiPath(section_id): ApiPath<SectionId>,
) -> Result<Json<AttemptDto>, ApiError> {
    let ticket = state
        .services
        .assessments()
        .start_attempt(&user.id, section_id)
        .await?;
    Ok(Json(ticket.into()))
}

async fn all_questions(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<QuestionDto>>, ApiError> {
    let questions = state.services.assessments().list_all_questions().await?;
    Ok(Json(questions.into_iter().map(QuestionDto::with_key).collect()))
}

async fn create_question(
    _admin: AdminUser,
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CreateQuestionBody>,
) -> Result<Json<QuestionDto>, ApiError> {
    let question = state
        .services
        .assessments()
        .create_question(QuestionDraft {
            section_id: body.section_id,
            question: body.question,
            options: body.options,
            correct_answer: marker_text(&body.correct_answer),
            order: body.order,
        })
        .await?;
    Ok(Json(QuestionDto::with_key(question)))
}

async fn update_question(
    _admin: AdminUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<QuestionId>,
    ApiJson(body): ApiJson<UpdateQuestionBody>,
) -> Result<Json<QuestionDto>, ApiError> {
    let question = state
        .services
        .assessments()
        .update_question(
            id,
            QuestionPatch {
                section_id: body.section_id,
                question: body.question,
                options: body.options,
                correct_answer: body.correct_answer.as_ref().map(marker_text),
                order: body.order,
            },
        )
        .await?;
    Ok(Json(QuestionDto::with_key(question)))
}

async fn delete_question(
    _admin: AdminUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<QuestionId>,
) -> Result<Json<Message>, ApiError> {
    state.services.assessments().delete_question(id).await?;
    Ok(Json(Message::new("Question deleted successfully")))
}

async fn my_results(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<ResultDto>>, ApiError> {
    let results = state.services.assessments().results_for_user(&user.id).await?;
    Ok(Json(results.into_iter().map(ResultDto::from).collect()))
}

/// Grading happens here; client-sent scores are never trusted.
async fn submit(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    ApiJson(body): ApiJson<SubmitBody>,
) -> Result<Json<ResultDto>, ApiError> {
    let result = state
        .services
        .assessments()
        .submit(&user.id, body.section_id, &body.answers)
        .await?;
    Ok(Json(result.into()))
}

async fn certificate(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    ApiPath(result_id): ApiPath<ResultId>,
) -> Result<Response, ApiError> {
    let certificate = state
        .services
        .certificates()
        .issue(&user.id, result_id)
        .await?;
    let disposition = format!("attachment; filename=\"{}\"", certificate.file_name);
    Ok((
        [
            (header::CONTENT_TYPE, "text/html; charset=utf-8".to_owned()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        certificate.html,
    )
        .into_response())
}
