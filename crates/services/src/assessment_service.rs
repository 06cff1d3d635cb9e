use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use storage::repository::{
    AttemptRepository, QuestionRepository, ResultReportRow, ResultRepository, SectionRepository,
    StorageError,
};
use training_core::model::{
    AssessmentError, AssessmentQuestion, AssessmentResult, AttemptWindow, NewAssessmentResult,
    QuestionDraft, QuestionId, QuestionPatch, SectionId, UserId, grade_submission,
};

use crate::Clock;
use crate::error::AssessmentServiceError;

/// Server-side view of a started attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptTicket {
    pub section_id: SectionId,
    pub started_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    pub time_limit_minutes: i64,
    pub question_count: usize,
}

/// Questions, attempts, grading and results of section assessments.
#[derive(Clone)]
pub struct AssessmentService {
    clock: Clock,
    window: AttemptWindow,
    sections: Arc<dyn SectionRepository>,
    questions: Arc<dyn QuestionRepository>,
    attempts: Arc<dyn AttemptRepository>,
    results: Arc<dyn ResultRepository>,
}

impl AssessmentService {
    #[must_use]
    pub fn new(
        clock: Clock,
        window: AttemptWindow,
        sections: Arc<dyn SectionRepository>,
        questions: Arc<dyn QuestionRepository>,
        attempts: Arc<dyn AttemptRepository>,
        results: Arc<dyn ResultRepository>,
    ) -> Self {
        Self {
            clock,
            window,
            sections,
            questions,
            attempts,
            results,
        }
    }

    #[must_use]
    pub fn window(&self) -> AttemptWindow {
        self.window
    }

    /// Questions of a section in display order, answer keys included.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentServiceError::SectionNotFound` for an unknown section.
    pub async fn questions_for_section(
        &self,
        section_id: SectionId,
    ) -> Result<Vec<AssessmentQuestion>, AssessmentServiceError> {
        self.ensure_section(section_id).await?;
        Ok(self.questions.list_questions_by_section(section_id).await?)
    }

    /// # Errors
    ///
    /// Returns `AssessmentServiceError::Storage` if repository access fails.
    pub async fn list_all_questions(
        &self,
    ) -> Result<Vec<AssessmentQuestion>, AssessmentServiceError> {
        Ok(self.questions.list_all_questions().await?)
    }

    /// Validate a question and normalize its answer marker.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentServiceError::Assessment` for invalid content and
    /// `AssessmentServiceError::SectionNotFound` for an unknown section.
    pub async fn create_question(
        &self,
        draft: QuestionDraft,
    ) -> Result<AssessmentQuestion, AssessmentServiceError> {
        let content = draft.validate()?;
        self.ensure_section(content.section_id).await?;
        let question = self
            .questions
            .insert_question(&content, self.clock.now())
            .await
            .map_err(section_vanished)?;
        tracing::info!(question_id = %question.id, section_id = %question.section_id, "question created");
        Ok(question)
    }

    /// # Errors
    ///
    /// Returns `AssessmentServiceError::QuestionNotFound`, or the validation
    /// errors of `create_question` for the merged question.
    pub async fn update_question(
        &self,
        id: QuestionId,
        patch: QuestionPatch,
    ) -> Result<AssessmentQuestion, AssessmentServiceError> {
        let current = self
            .questions
            .get_question(id)
            .await?
            .ok_or(AssessmentServiceError::QuestionNotFound)?;
        let updated = current.apply(patch)?;
        if updated.section_id != current.section_id {
            self.ensure_section(updated.section_id).await?;
        }
        self.questions
            .update_question(&updated)
            .await
            .map_err(|e| match e {
                StorageError::NotFound => AssessmentServiceError::QuestionNotFound,
                other => section_vanished(other),
            })?;
        Ok(updated)
    }

    /// # Errors
    ///
    /// Returns `AssessmentServiceError::QuestionNotFound` for an unknown id.
    pub async fn delete_question(&self, id: QuestionId) -> Result<(), AssessmentServiceError> {
        self.questions.delete_question(id).await.map_err(|e| match e {
            StorageError::NotFound => AssessmentServiceError::QuestionNotFound,
            other => AssessmentServiceError::Storage(other),
        })
    }

    /// Stamp the start of an attempt.
    ///
    /// Restarting an open attempt keeps its clock; an attempt that already ran
    /// out is discarded and a fresh one begins.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentServiceError::AlreadyPassed` once the section is
    /// passed and `AssessmentError::NoQuestions` for an empty assessment.
    pub async fn start_attempt(
        &self,
        user_id: &UserId,
        section_id: SectionId,
    ) -> Result<AttemptTicket, AssessmentServiceError> {
        self.ensure_section(section_id).await?;
        if self.has_passed(user_id, section_id).await? {
            return Err(AssessmentServiceError::AlreadyPassed);
        }
        let questions = self.questions.list_questions_by_section(section_id).await?;
        if questions.is_empty() {
            return Err(AssessmentError::NoQuestions.into());
        }

        let now = self.clock.now();
        if let Some(open) = self.attempts.get_attempt(user_id, section_id).await? {
            if self.window.check(&open, now).is_err() {
                self.attempts.close_attempt(user_id, section_id).await?;
            }
        }
        let attempt = self.attempts.start_attempt(user_id, section_id, now).await?;
        tracing::info!(user_id = %user_id, section_id = %section_id, started_at = %attempt.started_at, "assessment attempt started");

        Ok(AttemptTicket {
            section_id,
            started_at: attempt.started_at,
            deadline: self.window.deadline(attempt.started_at),
            time_limit_minutes: self.window.limit.num_minutes(),
            question_count: questions.len(),
        })
    }

    /// Grade a submission against the open attempt and store the result.
    ///
    /// The attempt is closed whether or not grading succeeds.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentServiceError::AlreadyPassed` for a section that is
    /// already passed, `AssessmentServiceError::NoOpenAttempt` without a
    /// started attempt, and `AssessmentError::TimeLimitExceeded` or
    /// `AssessmentError::NoQuestions` from grading.
    pub async fn submit(
        &self,
        user_id: &UserId,
        section_id: SectionId,
        answers: &HashMap<QuestionId, Value>,
    ) -> Result<AssessmentResult, AssessmentServiceError> {
        self.ensure_section(section_id).await?;
        if self.has_passed(user_id, section_id).await? {
            return Err(AssessmentServiceError::AlreadyPassed);
        }
        let attempt = self
            .attempts
            .get_attempt(user_id, section_id)
            .await?
            .ok_or(AssessmentServiceError::NoOpenAttempt)?;
        self.attempts.close_attempt(user_id, section_id).await?;

        let now = self.clock.now();
        if let Err(e) = self.window.check(&attempt, now) {
            tracing::warn!(user_id = %user_id, section_id = %section_id, started_at = %attempt.started_at, "late assessment submission rejected");
            return Err(e.into());
        }

        let questions = self.questions.list_questions_by_section(section_id).await?;
        let (outcome, sheet) = grade_submission(&questions, answers)?;
        let result = self
            .results
            .insert_result(&NewAssessmentResult {
                user_id: user_id.clone(),
                section_id,
                outcome,
                answers: sheet,
                date_taken: now,
            })
            .await
            .map_err(|e| match e {
                StorageError::Conflict => AssessmentServiceError::AlreadyPassed,
                other => AssessmentServiceError::Storage(other),
            })?;

        tracing::info!(
            user_id = %user_id,
            section_id = %section_id,
            score = result.score,
            passed = result.passed,
            "assessment graded"
        );
        Ok(result)
    }

    /// A user's results, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentServiceError::Storage` if repository access fails.
    pub async fn results_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<AssessmentResult>, AssessmentServiceError> {
        Ok(self.results.list_results_for_user(user_id).await?)
    }

    /// # Errors
    ///
    /// Returns `AssessmentServiceError::Storage` if repository access fails.
    pub async fn all_results(&self) -> Result<Vec<ResultReportRow>, AssessmentServiceError> {
        Ok(self.results.list_all_results().await?)
    }

    /// Delete a user's results so the assessment can be taken again.
    /// Returns the number of removed results.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentServiceError::Storage` if repository access fails.
    pub async fn reset_results(
        &self,
        user_id: &UserId,
        section_id: Option<SectionId>,
    ) -> Result<u64, AssessmentServiceError> {
        let removed = self
            .results
            .delete_results_for_user(user_id, section_id)
            .await?;
        tracing::info!(user_id = %user_id, section_id = ?section_id, removed, "assessment results reset");
        Ok(removed)
    }

    async fn has_passed(
        &self,
        user_id: &UserId,
        section_id: SectionId,
    ) -> Result<bool, AssessmentServiceError> {
        Ok(self
            .results
            .list_results_for_user(user_id)
            .await?
            .iter()
            .any(|r| r.section_id == section_id && r.passed))
    }

    async fn ensure_section(&self, section_id: SectionId) -> Result<(), AssessmentServiceError> {
        self.sections
            .get_section(section_id)
            .await?
            .map(|_| ())
            .ok_or(AssessmentServiceError::SectionNotFound)
    }
}

fn section_vanished(e: StorageError) -> AssessmentServiceError {
    match e {
        StorageError::Conflict => AssessmentServiceError::SectionNotFound,
        other => AssessmentServiceError::Storage(other),
    }
}
