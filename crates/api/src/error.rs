//! HTTP error taxonomy. Every failure leaves the API as `{"message": ...}`.

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use services::{
    AssessmentServiceError, AuthError, CertificateError, ModuleServiceError, ProgressServiceError,
    SectionServiceError,
};
use storage::repository::StorageError;
use thiserror::Error;
use training_core::model::AssessmentError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Admin access required")]
    Forbidden,
    #[error("{0}")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Unavailable(&'static str),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn bad_request(e: impl std::fmt::Display) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "request failed");
                "Internal server error".to_owned()
            }
            other => other.to_string(),
        };
        (status, Json(json!({ "message": message }))).into_response()
    }
}

fn storage(e: StorageError) -> ApiError {
    match e {
        StorageError::NotFound => ApiError::NotFound("Not found"),
        StorageError::Conflict => ApiError::Conflict("Conflicting change".into()),
        other => ApiError::Internal(other.to_string()),
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<SectionServiceError> for ApiError {
    fn from(e: SectionServiceError) -> Self {
        match e {
            SectionServiceError::NotFound => ApiError::NotFound("Section not found"),
            SectionServiceError::Section(e) => ApiError::bad_request(e),
            SectionServiceError::Storage(e) => storage(e),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<ModuleServiceError> for ApiError {
    fn from(e: ModuleServiceError) -> Self {
        match e {
            ModuleServiceError::ModuleNotFound => ApiError::NotFound("Module not found"),
            ModuleServiceError::PageNotFound => ApiError::NotFound("Page not found"),
            e @ ModuleServiceError::UnknownSection(_) => ApiError::bad_request(e),
            ModuleServiceError::Module(e) => ApiError::bad_request(e),
            ModuleServiceError::Page(e) => ApiError::bad_request(e),
            ModuleServiceError::Storage(e) => storage(e),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<ProgressServiceError> for ApiError {
    fn from(e: ProgressServiceError) -> Self {
        match e {
            ProgressServiceError::ModuleNotFound => ApiError::NotFound("Module not found"),
            ProgressServiceError::PageNotFound => ApiError::NotFound("Page not found"),
            ProgressServiceError::Storage(e) => storage(e),
            other => ApiError::bad_request(other),
        }
    }
}

impl From<AssessmentServiceError> for ApiError {
    fn from(e: AssessmentServiceError) -> Self {
        match e {
            AssessmentServiceError::SectionNotFound => ApiError::NotFound("Section not found"),
            AssessmentServiceError::QuestionNotFound => ApiError::NotFound("Question not found"),
            AssessmentServiceError::AlreadyPassed => {
                ApiError::Conflict("Assessment already passed for this section".into())
            }
            AssessmentServiceError::Assessment(AssessmentError::TimeLimitExceeded) => {
                ApiError::BadRequest("Time limit exceeded".into())
            }
            AssessmentServiceError::Storage(e) => storage(e),
            other => ApiError::bad_request(other),
        }
    }
}

impl From<CertificateError> for ApiError {
    fn from(e: CertificateError) -> Self {
        match e {
            CertificateError::ResultNotFound => ApiError::NotFound("Assessment result not found"),
            CertificateError::NotPassed => ApiError::BadRequest(
                "Certificate only available for passed assessments".into(),
            ),
            CertificateError::Storage(e) => storage(e),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Unauthorized => ApiError::Unauthorized,
            AuthError::NotConfigured => ApiError::Unavailable("Sign-in is not configured"),
            AuthError::Profile(e) => ApiError::bad_request(e),
            e if e.is_unknown_user() => ApiError::NotFound("User not found"),
            AuthError::Storage(e) => storage(e),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use http_body_util::BodyExt;
    use serde_json::Value;

    async fn body(err: ApiError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn internal_detail_is_not_leaked() {
        let (status, body) = body(ApiError::Internal("disk I/O error".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Internal server error");
    }

    #[tokio::test]
    async fn auth_failures_use_fixed_messages() {
        let (status, body) = body(ApiError::Unauthorized).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Unauthorized");

        let (status, body) = self::body(ApiError::Forbidden).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "Admin access required");
    }

    #[test]
    fn service_errors_map_to_statuses() {
        assert_eq!(
            ApiError::from(AssessmentServiceError::AlreadyPassed).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(CertificateError::NotPassed).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(ModuleServiceError::UnknownSection(
                training_core::model::SectionId::new(4)
            ))
            .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(SectionServiceError::Storage(StorageError::Connection(
                "closed".into()
            )))
            .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
