use thiserror::Error;

use crate::model::{
    AssessmentError, ModuleError, PageError, ProgressError, SectionError, UserError,
};

/// Umbrella for every domain validation failure.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    User(#[from] UserError),
    #[error(transparent)]
    Section(#[from] SectionError),
    #[error(transparent)]
    Module(#[from] ModuleError),
    #[error(transparent)]
    Page(#[from] PageError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    Assessment(#[from] AssessmentError),
}
