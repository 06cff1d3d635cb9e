//! Shared error types for the services crate.

use thiserror::Error;

use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;
use training_core::model::{
    AssessmentError, ModuleError, PageError, ProgressError, SectionError, UserError,
};

/// Errors emitted by `SectionService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SectionServiceError {
    #[error("section not found")]
    NotFound,
    #[error(transparent)]
    Section(#[from] SectionError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ModuleService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ModuleServiceError {
    #[error("module not found")]
    ModuleNotFound,
    #[error("page not found")]
    PageNotFound,
    #[error("section {0} does not exist")]
    UnknownSection(training_core::model::SectionId),
    #[error(transparent)]
    Module(#[from] ModuleError),
    #[error(transparent)]
    Page(#[from] PageError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressServiceError {
    #[error("module not found")]
    ModuleNotFound,
    #[error("page not found")]
    PageNotFound,
    #[error("page does not belong to this module")]
    PageNotInModule,
    #[error("module has no pages to complete")]
    EmptyModule,
    #[error("a page id is required to record progress")]
    MissingPage,
    #[error("status cannot be set to {0}")]
    UnsupportedStatus(&'static str),
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `AssessmentService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AssessmentServiceError {
    #[error("section not found")]
    SectionNotFound,
    #[error("question not found")]
    QuestionNotFound,
    #[error("assessment already passed for this section")]
    AlreadyPassed,
    #[error("no assessment attempt in progress; start the assessment first")]
    NoOpenAttempt,
    #[error(transparent)]
    Assessment(#[from] AssessmentError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `CertificateService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CertificateError {
    #[error("assessment result not found")]
    ResultNotFound,
    #[error("certificates are only issued for passed assessments")]
    NotPassed,
    #[error("certificate template failed: {0}")]
    Template(#[from] tera::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `AuthService` and the OAuth client.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("sign-in is not configured")]
    NotConfigured,
    #[error("identity provider responded with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error("identity provider response is missing {0}")]
    MissingClaim(&'static str),
    #[error("invalid identity provider url: {0}")]
    Url(#[from] url::ParseError),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Profile(#[from] UserError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl AuthError {
    /// True when login was refused because of the email domain.
    #[must_use]
    pub fn is_domain_restricted(&self) -> bool {
        matches!(self, AuthError::Profile(UserError::DomainNotAllowed(_)))
    }
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Template(#[from] tera::Error),
}

/// Errors emitted while loading sample content.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SeedError {
    #[error(transparent)]
    Section(#[from] SectionServiceError),
    #[error(transparent)]
    Module(#[from] ModuleServiceError),
    #[error(transparent)]
    Assessment(#[from] AssessmentServiceError),
}
