pub mod assessment;
mod ids;
mod module;
mod page;
pub mod progress;
mod result;
mod section;
mod user;

pub use assessment::{
    AnswerKey, AnswerSheet, AssessmentAttempt, AssessmentError, AssessmentOutcome,
    AssessmentQuestion, AttemptWindow, QuestionContent, QuestionDraft, QuestionPatch,
    grade_submission,
};
pub use ids::{ModuleId, PageId, ParseIdError, QuestionId, ResultId, SectionId, UserId};
pub use module::{ModuleDraft, ModuleError, ModulePatch, TrainingModule};
pub use page::{ModulePage, PageDraft, PageError, PageKind, PagePatch};
pub use progress::{
    EmployeeProgress, ProgressError, ProgressStatus, ProgressUpdate, SectionProgress,
    summarize_sections,
};
pub use result::{AssessmentResult, NewAssessmentResult};
pub use section::{SectionDraft, SectionError, SectionPatch, TrainingSection};
pub use user::{Role, User, UserError, UserProfile};

/// Trim an optional free-text field, collapsing blanks to `None`.
pub(crate) fn trim_optional(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_owned())
        }
    })
}
