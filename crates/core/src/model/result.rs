use chrono::{DateTime, Utc};

use crate::model::assessment::{AnswerSheet, AssessmentOutcome};
use crate::model::ids::{ResultId, SectionId, UserId};

/// A graded assessment attempt.
///
/// `passed` is fixed when the row is written and never recomputed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssessmentResult {
    pub id: ResultId,
    pub user_id: UserId,
    pub section_id: SectionId,
    pub score: u8,
    pub total_questions: u32,
    pub correct_answers: u32,
    pub answers: AnswerSheet,
    pub passed: bool,
    pub date_taken: DateTime<Utc>,
    pub certificate_generated: bool,
}

/// Insert payload for a graded attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAssessmentResult {
    pub user_id: UserId,
    pub section_id: SectionId,
    pub outcome: AssessmentOutcome,
    pub answers: AnswerSheet,
    pub date_taken: DateTime<Utc>,
}

impl NewAssessmentResult {
    #[must_use]
    pub fn assign_id(self, id: ResultId) -> AssessmentResult {
        AssessmentResult {
            id,
            user_id: self.user_id,
            section_id: self.section_id,
            score: self.outcome.score,
            total_questions: self.outcome.total_questions,
            correct_answers: self.outcome.correct_answers,
            answers: self.answers,
            passed: self.outcome.passed,
            date_taken: self.date_taken,
            certificate_generated: false,
        }
    }
}
