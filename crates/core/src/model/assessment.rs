//! Section assessments: answer keys, scoring and the attempt clock.
//!
//! Every answer, whether an admin-authored key or a submitted choice, is
//! reduced to a zero-based option index before it is stored or compared.
//! Older content used letter codes (`"c"`) or the literal option text; both
//! are accepted on input and normalized against the question's options.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use thiserror::Error;

use crate::model::ids::{QuestionId, SectionId, UserId};

/// A section assessment is passed only with a perfect score.
pub const PASS_THRESHOLD: u8 = 100;

/// Default wall-clock budget for one attempt.
pub const DEFAULT_TIME_LIMIT_MINUTES: i64 = 30;

/// Slack for network latency and client auto-submit on expiry.
pub const DEFAULT_GRACE_SECONDS: i64 = 60;

const MIN_OPTIONS: usize = 2;
const MAX_OPTIONS: usize = 26;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AssessmentError {
    #[error("question text cannot be empty")]
    EmptyQuestion,

    #[error("a question needs between {MIN_OPTIONS} and {MAX_OPTIONS} options, got {0}")]
    OptionCount(usize),

    #[error("option {0} is empty")]
    EmptyOption(usize),

    #[error("question order must be >= 0")]
    NegativeOrder,

    #[error("answer {marker:?} does not match any option")]
    UnknownAnswer { marker: String },

    #[error("section has no assessment questions")]
    NoQuestions,

    #[error("time limit exceeded")]
    TimeLimitExceeded,
}

/// Zero-based index of the correct option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnswerKey(usize);

impl AnswerKey {
    #[must_use]
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }

    /// Letter code used by imported content (`0 -> "a"`).
    #[must_use]
    pub fn letter(self) -> char {
        // MAX_OPTIONS keeps the index inside the alphabet
        char::from(b'a' + u8::try_from(self.0).unwrap_or(25).min(25))
    }

    /// Resolve a marker against a question's options.
    ///
    /// Accepted, in order: a decimal index (`"2"`), a single letter code
    /// (`"c"`, case-insensitive), or the exact option text (trimmed).
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError::UnknownAnswer` when nothing matches.
    pub fn resolve(marker: &str, options: &[String]) -> Result<Self, AssessmentError> {
        let trimmed = marker.trim();
        let unknown = || AssessmentError::UnknownAnswer {
            marker: marker.to_owned(),
        };

        // Out-of-range digits may still be the literal text of a numeric option.
        if let Some(key) = trimmed
            .parse::<usize>()
            .ok()
            .filter(|_| trimmed.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|index| Self::checked(index, options.len()))
        {
            return Ok(key);
        }

        let mut chars = trimmed.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            if c.is_ascii_alphabetic() {
                let index = usize::from(c.to_ascii_lowercase() as u8 - b'a');
                if let Some(key) = Self::checked(index, options.len()) {
                    return Ok(key);
                }
            }
        }

        options
            .iter()
            .position(|option| option.trim() == trimmed)
            .map(Self)
            .ok_or_else(unknown)
    }

    /// Resolve a submitted JSON answer (number or string).
    ///
    /// Returns `None` for anything that cannot name one of the options; the
    /// scorer counts those as wrong.
    #[must_use]
    pub fn from_submission(value: &Value, options: &[String]) -> Option<Self> {
        match value {
            Value::Number(n) => n
                .as_u64()
                .and_then(|i| usize::try_from(i).ok())
                .and_then(|i| Self::checked(i, options.len())),
            Value::String(s) => Self::resolve(s, options).ok(),
            _ => None,
        }
    }

    fn checked(index: usize, len: usize) -> Option<Self> {
        (index < len).then_some(Self(index))
    }
}

/// A multiple-choice question scoped to a section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssessmentQuestion {
    pub id: QuestionId,
    pub section_id: SectionId,
    pub question: String,
    pub options: Vec<String>,
    pub answer_key: AnswerKey,
    pub order: i32,
    pub created_at: DateTime<Utc>,
}

/// Admin input for a question; `correct_answer` is any accepted marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionDraft {
    pub section_id: SectionId,
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub order: i32,
}

/// A validated question ready to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionContent {
    pub section_id: SectionId,
    pub question: String,
    pub options: Vec<String>,
    pub answer_key: AnswerKey,
    pub order: i32,
}

impl QuestionDraft {
    /// Validate text and options and normalize the answer marker.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError` for blank text, a bad option list, a negative
    /// order or a marker that names no option.
    pub fn validate(self) -> Result<QuestionContent, AssessmentError> {
        let question = self.question.trim().to_owned();
        if question.is_empty() {
            return Err(AssessmentError::EmptyQuestion);
        }
        if self.order < 0 {
            return Err(AssessmentError::NegativeOrder);
        }
        let options = validate_options(self.options)?;
        let answer_key = AnswerKey::resolve(&self.correct_answer, &options)?;
        Ok(QuestionContent {
            section_id: self.section_id,
            question,
            options,
            answer_key,
            order: self.order,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QuestionPatch {
    pub section_id: Option<SectionId>,
    pub question: Option<String>,
    pub options: Option<Vec<String>>,
    pub correct_answer: Option<String>,
    pub order: Option<i32>,
}

impl AssessmentQuestion {
    /// Apply a patch. Without a new marker the existing key is kept and must
    /// still point into the (possibly replaced) options.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError` if the merged question is invalid.
    pub fn apply(&self, patch: QuestionPatch) -> Result<Self, AssessmentError> {
        let correct_answer = patch
            .correct_answer
            .unwrap_or_else(|| self.answer_key.index().to_string());
        let merged = QuestionDraft {
            section_id: patch.section_id.unwrap_or(self.section_id),
            question: patch.question.unwrap_or_else(|| self.question.clone()),
            options: patch.options.unwrap_or_else(|| self.options.clone()),
            correct_answer,
            order: patch.order.unwrap_or(self.order),
        }
        .validate()?;

        Ok(Self {
            id: self.id,
            section_id: merged.section_id,
            question: merged.question,
            options: merged.options,
            answer_key: merged.answer_key,
            order: merged.order,
            created_at: self.created_at,
        })
    }
}

fn validate_options(options: Vec<String>) -> Result<Vec<String>, AssessmentError> {
    if !(MIN_OPTIONS..=MAX_OPTIONS).contains(&options.len()) {
        return Err(AssessmentError::OptionCount(options.len()));
    }
    options
        .into_iter()
        .enumerate()
        .map(|(i, option)| {
            let trimmed = option.trim();
            if trimmed.is_empty() {
                Err(AssessmentError::EmptyOption(i))
            } else {
                Ok(trimmed.to_owned())
            }
        })
        .collect()
}

/// Score and verdict of one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssessmentOutcome {
    pub total_questions: u32,
    pub correct_answers: u32,
    pub score: u8,
    pub passed: bool,
}

impl AssessmentOutcome {
    /// `score = round(correct / total * 100)`, `passed = score >= 100`.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError::NoQuestions` when `total` is zero.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_counts(correct: u32, total: u32) -> Result<Self, AssessmentError> {
        if total == 0 {
            return Err(AssessmentError::NoQuestions);
        }
        let correct = correct.min(total);
        let score = (f64::from(correct) / f64::from(total) * 100.0)
            .round()
            .clamp(0.0, 100.0) as u8;
        Ok(Self {
            total_questions: total,
            correct_answers: correct,
            score,
            passed: score >= PASS_THRESHOLD,
        })
    }
}

/// Normalized answers of a graded submission, keyed by question.
pub type AnswerSheet = BTreeMap<QuestionId, AnswerKey>;

/// Grade raw submitted answers against a section's questions.
///
/// Answers for questions outside the set are dropped; missing or
/// unresolvable answers count as wrong.
///
/// # Errors
///
/// Returns `AssessmentError::NoQuestions` for an empty question set.
pub fn grade_submission(
    questions: &[AssessmentQuestion],
    submitted: &HashMap<QuestionId, Value>,
) -> Result<(AssessmentOutcome, AnswerSheet), AssessmentError> {
    let mut sheet = AnswerSheet::new();
    let mut correct = 0_u32;
    for question in questions {
        let Some(answer) = submitted
            .get(&question.id)
            .and_then(|raw| AnswerKey::from_submission(raw, &question.options))
        else {
            continue;
        };
        if answer == question.answer_key {
            correct += 1;
        }
        sheet.insert(question.id, answer);
    }
    let total = u32::try_from(questions.len()).map_err(|_| AssessmentError::NoQuestions)?;
    Ok((AssessmentOutcome::from_counts(correct, total)?, sheet))
}

/// An open assessment sitting, stamped by the server when it starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssessmentAttempt {
    pub user_id: UserId,
    pub section_id: SectionId,
    pub started_at: DateTime<Utc>,
}

/// Time budget enforced on submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptWindow {
    pub limit: Duration,
    pub grace: Duration,
}

impl Default for AttemptWindow {
    fn default() -> Self {
        Self {
            limit: Duration::minutes(DEFAULT_TIME_LIMIT_MINUTES),
            grace: Duration::seconds(DEFAULT_GRACE_SECONDS),
        }
    }
}

impl AttemptWindow {
    #[must_use]
    pub fn deadline(&self, started_at: DateTime<Utc>) -> DateTime<Utc> {
        started_at + self.limit
    }

    /// # Errors
    ///
    /// Returns `AssessmentError::TimeLimitExceeded` once the limit plus grace
    /// has elapsed.
    pub fn check(&self, attempt: &AssessmentAttempt, now: DateTime<Utc>) -> Result<(), AssessmentError> {
        if now - attempt.started_at > self.limit + self.grace {
            return Err(AssessmentError::TimeLimitExceeded);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use serde_json::json;

    fn options() -> Vec<String> {
        ["6 characters", "8 characters", "12 characters", "16 characters"]
            .into_iter()
            .map(str::to_owned)
            .collect()
    }

    fn question(id: u64, key: usize) -> AssessmentQuestion {
        AssessmentQuestion {
            id: QuestionId::new(id),
            section_id: SectionId::new(1),
            question: format!("Q{id}"),
            options: options(),
            answer_key: AnswerKey::new(key),
            order: i32::try_from(id).unwrap(),
            created_at: fixed_now(),
        }
    }

    #[test]
    fn markers_normalize_to_the_same_key() {
        let opts = options();
        assert_eq!(AnswerKey::resolve("2", &opts).unwrap(), AnswerKey::new(2));
        assert_eq!(AnswerKey::resolve("c", &opts).unwrap(), AnswerKey::new(2));
        assert_eq!(AnswerKey::resolve("C", &opts).unwrap(), AnswerKey::new(2));
        assert_eq!(
            AnswerKey::resolve(" 12 characters ", &opts).unwrap(),
            AnswerKey::new(2)
        );
        assert!(AnswerKey::resolve("7", &opts).is_err());
        assert!(AnswerKey::resolve("e", &opts).is_err());
        assert!(AnswerKey::resolve("", &opts).is_err());
        assert_eq!(AnswerKey::new(2).letter(), 'c');
    }

    #[test]
    fn letter_that_is_also_option_text_prefers_letter() {
        let opts: Vec<String> = vec!["b".into(), "a".into()];
        assert_eq!(AnswerKey::resolve("a", &opts).unwrap(), AnswerKey::new(0));
    }

    #[test]
    fn numeric_option_text_resolves_when_not_an_index() {
        let opts: Vec<String> = vec!["8".into(), "12".into(), "16".into()];
        assert_eq!(AnswerKey::resolve("12", &opts).unwrap(), AnswerKey::new(1));
        assert_eq!(AnswerKey::resolve("16", &opts).unwrap(), AnswerKey::new(2));
        // in range digits stay an index
        assert_eq!(AnswerKey::resolve("2", &opts).unwrap(), AnswerKey::new(2));
        assert!(AnswerKey::resolve("99", &opts).is_err());

        assert_eq!(
            AnswerKey::from_submission(&json!("16"), &opts),
            Some(AnswerKey::new(2))
        );
        assert_eq!(AnswerKey::from_submission(&json!(16), &opts), None);
    }

    #[test]
    fn draft_validation_rejects_bad_options() {
        let draft = QuestionDraft {
            section_id: SectionId::new(1),
            question: "Pick".into(),
            options: vec!["only".into()],
            correct_answer: "a".into(),
            order: 0,
        };
        assert_eq!(draft.validate().unwrap_err(), AssessmentError::OptionCount(1));

        let draft = QuestionDraft {
            section_id: SectionId::new(1),
            question: "Pick".into(),
            options: vec!["one".into(), " ".into()],
            correct_answer: "a".into(),
            order: 0,
        };
        assert_eq!(draft.validate().unwrap_err(), AssessmentError::EmptyOption(1));
    }

    #[test]
    fn patch_with_fewer_options_revalidates_key() {
        let q = question(1, 3);
        let err = q
            .apply(QuestionPatch {
                options: Some(vec!["x".into(), "y".into()]),
                ..QuestionPatch::default()
            })
            .unwrap_err();
        assert!(matches!(err, AssessmentError::UnknownAnswer { .. }));

        let ok = q
            .apply(QuestionPatch {
                options: Some(vec!["x".into(), "y".into()]),
                correct_answer: Some("b".into()),
                ..QuestionPatch::default()
            })
            .unwrap();
        assert_eq!(ok.answer_key, AnswerKey::new(1));
    }

    #[test]
    fn four_of_five_fails_five_of_five_passes() {
        let questions: Vec<_> = (1..=5).map(|id| question(id, 2)).collect();

        let mut answers: HashMap<QuestionId, Value> =
            (1..=5).map(|id| (QuestionId::new(id), json!(2))).collect();
        answers.insert(QuestionId::new(5), json!("a"));
        let (outcome, sheet) = grade_submission(&questions, &answers).unwrap();
        assert_eq!(outcome.score, 80);
        assert_eq!(outcome.correct_answers, 4);
        assert!(!outcome.passed);
        assert_eq!(sheet.get(&QuestionId::new(5)), Some(&AnswerKey::new(0)));

        answers.insert(QuestionId::new(5), json!("12 characters"));
        let (outcome, _) = grade_submission(&questions, &answers).unwrap();
        assert_eq!(outcome.score, 100);
        assert!(outcome.passed);
    }

    #[test]
    fn grading_is_deterministic_and_ignores_foreign_answers() {
        let questions: Vec<_> = (1..=3).map(|id| question(id, 0)).collect();
        let answers: HashMap<QuestionId, Value> = [
            (QuestionId::new(1), json!("0")),
            (QuestionId::new(2), json!(null)),
            (QuestionId::new(42), json!(0)),
        ]
        .into_iter()
        .collect();

        let first = grade_submission(&questions, &answers).unwrap();
        let second = grade_submission(&questions, &answers).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.0.correct_answers, 1);
        assert_eq!(first.0.score, 33);
        assert!(!first.1.contains_key(&QuestionId::new(42)));
    }

    #[test]
    fn outcome_pass_flag_tracks_score() {
        for total in 1..=12_u32 {
            for correct in 0..=total {
                let outcome = AssessmentOutcome::from_counts(correct, total).unwrap();
                assert_eq!(outcome.passed, outcome.score == 100);
            }
        }
        assert_eq!(
            AssessmentOutcome::from_counts(0, 0).unwrap_err(),
            AssessmentError::NoQuestions
        );
    }

    #[test]
    fn attempt_window_allows_grace() {
        let window = AttemptWindow::default();
        let attempt = AssessmentAttempt {
            user_id: UserId::new("u"),
            section_id: SectionId::new(1),
            started_at: fixed_now(),
        };
        assert!(window.check(&attempt, fixed_now() + Duration::minutes(30)).is_ok());
        assert!(
            window
                .check(&attempt, fixed_now() + Duration::seconds(30 * 60 + 60))
                .is_ok()
        );
        assert_eq!(
            window
                .check(&attempt, fixed_now() + Duration::seconds(30 * 60 + 61))
                .unwrap_err(),
            AssessmentError::TimeLimitExceeded
        );
        assert_eq!(window.deadline(fixed_now()), fixed_now() + Duration::minutes(30));
    }
}
