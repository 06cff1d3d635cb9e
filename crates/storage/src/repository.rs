use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use training_core::model::{
    AssessmentAttempt, AssessmentQuestion, AssessmentResult, EmployeeProgress, ModuleDraft,
    ModuleId, ModulePage, NewAssessmentResult, PageDraft, PageId, ProgressUpdate,
    QuestionContent, QuestionId, ResultId, Role, SectionDraft, SectionId, TrainingModule,
    TrainingSection, User, UserId, UserProfile,
};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Server-side login session keyed by an opaque cookie token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub token: String,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Progress row joined with its user and module for admin reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressReportRow {
    pub progress: EmployeeProgress,
    pub user: User,
    pub module: TrainingModule,
}

/// Result row joined with its user for admin reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultReportRow {
    pub result: AssessmentResult,
    pub user: User,
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a first-time user or refresh the profile of a returning one.
    ///
    /// The role of an existing user is never changed by this call.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the user cannot be stored.
    async fn upsert_user(&self, profile: &UserProfile, now: DateTime<Utc>)
    -> Result<User, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn get_user(&self, id: &UserId) -> Result<Option<User>, StorageError>;

    /// All users, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn list_users(&self) -> Result<Vec<User>, StorageError>;

    /// Change the role of the user with the given email.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if no user has that email.
    async fn set_role_by_email(
        &self,
        email: &str,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<User, StorageError>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the session cannot be stored.
    async fn create_session(&self, session: &SessionRecord) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn get_session(&self, token: &str) -> Result<Option<SessionRecord>, StorageError>;

    /// Removing a missing session is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn delete_session(&self, token: &str) -> Result<(), StorageError>;

    /// Delete sessions that expired before `now`, returning how many went.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StorageError>;
}

#[async_trait]
pub trait SectionRepository: Send + Sync {
    /// Sections ordered by `order`, then id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn list_sections(&self) -> Result<Vec<TrainingSection>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn get_section(&self, id: SectionId) -> Result<Option<TrainingSection>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the section cannot be stored.
    async fn insert_section(
        &self,
        draft: &SectionDraft,
        now: DateTime<Utc>,
    ) -> Result<TrainingSection, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the section does not exist.
    async fn update_section(&self, section: &TrainingSection) -> Result<(), StorageError>;

    /// Delete a section with its modules (and their pages and progress),
    /// questions, open attempts and results, atomically.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the section does not exist; the
    /// transaction is rolled back on any failure.
    async fn delete_section(&self, id: SectionId) -> Result<(), StorageError>;
}

#[async_trait]
pub trait ModuleRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn list_modules(&self) -> Result<Vec<TrainingModule>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn list_modules_by_section(
        &self,
        section_id: SectionId,
    ) -> Result<Vec<TrainingModule>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn get_module(&self, id: ModuleId) -> Result<Option<TrainingModule>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the referenced section is missing.
    async fn insert_module(
        &self,
        draft: &ModuleDraft,
        now: DateTime<Utc>,
    ) -> Result<TrainingModule, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` for a missing module and
    /// `StorageError::Conflict` for a missing section.
    async fn update_module(&self, module: &TrainingModule) -> Result<(), StorageError>;

    /// Move a module into a section, or unassign it with `None`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` for a missing module and
    /// `StorageError::Conflict` for a missing section.
    async fn assign_section(
        &self,
        id: ModuleId,
        section_id: Option<SectionId>,
        now: DateTime<Utc>,
    ) -> Result<TrainingModule, StorageError>;

    /// Delete a module with its progress rows and pages, atomically.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the module does not exist.
    async fn delete_module(&self, id: ModuleId) -> Result<(), StorageError>;
}

#[async_trait]
pub trait PageRepository: Send + Sync {
    /// Pages of a module by `page_order`, then id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn list_pages(&self, module_id: ModuleId) -> Result<Vec<ModulePage>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn get_page(&self, id: PageId) -> Result<Option<ModulePage>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the module is missing.
    async fn insert_page(
        &self,
        draft: &PageDraft,
        now: DateTime<Utc>,
    ) -> Result<ModulePage, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the page does not exist.
    async fn update_page(&self, page: &ModulePage) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the page does not exist.
    async fn delete_page(&self, id: PageId) -> Result<(), StorageError>;
}

#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Insert or overwrite the `(user, module)` row; never duplicates.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the user or module is missing.
    async fn upsert_progress(
        &self,
        update: &ProgressUpdate,
    ) -> Result<EmployeeProgress, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn get_progress(
        &self,
        user_id: &UserId,
        module_id: ModuleId,
    ) -> Result<Option<EmployeeProgress>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn list_progress_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<EmployeeProgress>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn list_all_progress(&self) -> Result<Vec<ProgressReportRow>, StorageError>;
}

#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Questions of a section by `order`, then id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn list_questions_by_section(
        &self,
        section_id: SectionId,
    ) -> Result<Vec<AssessmentQuestion>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn list_all_questions(&self) -> Result<Vec<AssessmentQuestion>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn get_question(
        &self,
        id: QuestionId,
    ) -> Result<Option<AssessmentQuestion>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the section is missing.
    async fn insert_question(
        &self,
        content: &QuestionContent,
        now: DateTime<Utc>,
    ) -> Result<AssessmentQuestion, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the question does not exist.
    async fn update_question(&self, question: &AssessmentQuestion) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the question does not exist.
    async fn delete_question(&self, id: QuestionId) -> Result<(), StorageError>;
}

#[async_trait]
pub trait AttemptRepository: Send + Sync {
    /// Open an attempt. An attempt that is already open keeps its original
    /// start time, so restarting cannot extend the clock.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn start_attempt(
        &self,
        user_id: &UserId,
        section_id: SectionId,
        now: DateTime<Utc>,
    ) -> Result<AssessmentAttempt, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn get_attempt(
        &self,
        user_id: &UserId,
        section_id: SectionId,
    ) -> Result<Option<AssessmentAttempt>, StorageError>;

    /// Closing a missing attempt is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn close_attempt(&self, user_id: &UserId, section_id: SectionId)
    -> Result<(), StorageError>;
}

#[async_trait]
pub trait ResultRepository: Send + Sync {
    /// Store a graded attempt.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` for a second passing result of the
    /// same user and section.
    async fn insert_result(
        &self,
        result: &NewAssessmentResult,
    ) -> Result<AssessmentResult, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn get_result(&self, id: ResultId) -> Result<Option<AssessmentResult>, StorageError>;

    /// A user's results, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn list_results_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<AssessmentResult>, StorageError>;

    /// Every result joined with its user, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn list_all_results(&self) -> Result<Vec<ResultReportRow>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the result does not exist.
    async fn mark_certificate_issued(&self, id: ResultId) -> Result<(), StorageError>;

    /// Delete a user's results, for one section or for all of them.
    /// Returns the number of deleted rows.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn delete_results_for_user(
        &self,
        user_id: &UserId,
        section_id: Option<SectionId>,
    ) -> Result<u64, StorageError>;
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub users: Arc<dyn UserRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub sections: Arc<dyn SectionRepository>,
    pub modules: Arc<dyn ModuleRepository>,
    pub pages: Arc<dyn PageRepository>,
    pub progress: Arc<dyn ProgressRepository>,
    pub questions: Arc<dyn QuestionRepository>,
    pub attempts: Arc<dyn AttemptRepository>,
    pub results: Arc<dyn ResultRepository>,
}
