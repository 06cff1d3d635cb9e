//! Wire shapes. Field names are camelCase as the web client expects.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use services::{AttemptTicket, SectionSummary};
use storage::repository::{ProgressReportRow, ResultReportRow};
use training_core::model::{
    AssessmentQuestion, AssessmentResult, EmployeeProgress, ModuleId, ModulePage, PageId,
    QuestionId, ResultId, SectionId, TrainingModule, TrainingSection, User, UserId,
};

/// Distinguish an absent field (`None`) from an explicit `null` (`Some(None)`).
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Serialize)]
pub struct Message {
    pub message: &'static str,
}

impl Message {
    #[must_use]
    pub fn new(message: &'static str) -> Self {
        Self { message }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: UserId,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub profile_image_url: Option<String>,
    pub role: &'static str,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserDto {
    fn from(u: User) -> Self {
        Self {
            role: u.role.as_str(),
            id: u.id,
            email: u.email,
            first_name: u.first_name,
            last_name: u.last_name,
            profile_image_url: u.profile_image_url,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionDto {
    pub id: SectionId,
    pub title: String,
    pub description: Option<String>,
    pub order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<TrainingSection> for SectionDto {
    fn from(s: TrainingSection) -> Self {
        Self {
            id: s.id,
            title: s.title,
            description: s.description,
            order: s.order,
            created_at: s.created_at,
            updated_at: s.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleDto {
    pub id: ModuleId,
    pub section_id: Option<SectionId>,
    pub title: String,
    pub description: Option<String>,
    pub order: i32,
    pub estimated_duration: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<TrainingModule> for ModuleDto {
    fn from(m: TrainingModule) -> Self {
        Self {
            id: m.id,
            section_id: m.section_id,
            title: m.title,
            description: m.description,
            order: m.order,
            estimated_duration: m.estimated_minutes,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageDto {
    pub id: PageId,
    pub module_id: ModuleId,
    pub page_order: i32,
    pub page_type: &'static str,
    pub title: Option<String>,
    pub content: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ModulePage> for PageDto {
    fn from(p: ModulePage) -> Self {
        Self {
            id: p.id,
            module_id: p.module_id,
            page_order: p.page_order,
            page_type: p.kind.as_str(),
            title: p.title,
            content: p.content,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressDto {
    pub user_id: UserId,
    pub module_id: ModuleId,
    pub status: &'static str,
    pub last_viewed_page_id: Option<PageId>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<EmployeeProgress> for ProgressDto {
    fn from(p: EmployeeProgress) -> Self {
        Self {
            user_id: p.user_id,
            module_id: p.module_id,
            status: p.status.as_str(),
            last_viewed_page_id: p.last_viewed_page_id,
            completed_at: p.completed_at,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProgressReportDto {
    #[serde(flatten)]
    pub progress: ProgressDto,
    pub user: UserDto,
    pub module: ModuleDto,
}

impl From<ProgressReportRow> for ProgressReportDto {
    fn from(row: ProgressReportRow) -> Self {
        Self {
            progress: row.progress.into(),
            user: row.user.into(),
            module: row.module.into(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionSummaryDto {
    pub section_id: SectionId,
    pub title: String,
    pub total_modules: u32,
    pub completed_modules: u32,
    pub in_progress_modules: u32,
    pub percentage: u8,
    pub assessment_passed: bool,
}

impl From<SectionSummary> for SectionSummaryDto {
    fn from(s: SectionSummary) -> Self {
        Self {
            section_id: s.section_id,
            title: s.title,
            total_modules: s.progress.total_modules,
            completed_modules: s.progress.completed_modules,
            in_progress_modules: s.progress.in_progress_modules,
            percentage: s.progress.percentage,
            assessment_passed: s.assessment_passed,
        }
    }
}

/// A question as shown to a client. `correct_answer` is only filled for admins.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDto {
    pub id: QuestionId,
    pub section_id: SectionId,
    pub question: String,
    pub options: Vec<String>,
    pub order: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,
}

impl QuestionDto {
    #[must_use]
    pub fn redacted(q: AssessmentQuestion) -> Self {
        Self::build(q, false)
    }

    #[must_use]
    pub fn with_key(q: AssessmentQuestion) -> Self {
        Self::build(q, true)
    }

    fn build(q: AssessmentQuestion, include_key: bool) -> Self {
        Self {
            correct_answer: include_key.then(|| q.answer_key.index().to_string()),
            id: q.id,
            section_id: q.section_id,
            question: q.question,
            options: q.options,
            order: q.order,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultDto {
    pub id: ResultId,
    pub user_id: UserId,
    pub section_id: SectionId,
    pub score: u8,
    pub total_questions: u32,
    pub correct_answers: u32,
    pub answers: BTreeMap<QuestionId, usize>,
    pub passed: bool,
    pub date_taken: DateTime<Utc>,
    pub certificate_generated: bool,
}

impl From<AssessmentResult> for ResultDto {
    fn from(r: AssessmentResult) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            section_id: r.section_id,
            score: r.score,
            total_questions: r.total_questions,
            correct_answers: r.correct_answers,
            answers: r.answers.into_iter().map(|(q, k)| (q, k.index())).collect(),
            passed: r.passed,
            date_taken: r.date_taken,
            certificate_generated: r.certificate_generated,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ResultReportDto {
    #[serde(flatten)]
    pub result: ResultDto,
    pub user: UserDto,
}

impl From<ResultReportRow> for ResultReportDto {
    fn from(row: ResultReportRow) -> Self {
        Self {
            result: row.result.into(),
            user: row.user.into(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptDto {
    pub section_id: SectionId,
    pub started_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    pub time_limit_minutes: i64,
    pub question_count: usize,
}

impl From<AttemptTicket> for AttemptDto {
    fn from(t: AttemptTicket) -> Self {
        Self {
            section_id: t.section_id,
            started_at: t.started_at,
            deadline: t.deadline,
            time_limit_minutes: t.time_limit_minutes,
            question_count: t.question_count,
        }
    }
}

// ─── Request bodies ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateSectionBody {
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub order: i32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSectionBody {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub order: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateModuleBody {
    pub section_id: Option<SectionId>,
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub order: i32,
    pub estimated_duration: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateModuleBody {
    #[serde(default, deserialize_with = "double_option")]
    pub section_id: Option<Option<SectionId>>,
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub order: Option<i32>,
    #[serde(default, deserialize_with = "double_option")]
    pub estimated_duration: Option<Option<i32>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignSectionBody {
    pub section_id: Option<SectionId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePageBody {
    #[serde(default)]
    pub page_order: i32,
    pub page_type: String,
    pub title: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePageBody {
    pub page_order: Option<i32>,
    pub page_type: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub title: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub content: Option<Option<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressBody {
    pub module_id: ModuleId,
    pub status: String,
    pub last_viewed_page_id: Option<PageId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuestionBody {
    pub section_id: SectionId,
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: Value,
    #[serde(default)]
    pub order: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateQuestionBody {
    pub section_id: Option<SectionId>,
    pub question: Option<String>,
    pub options: Option<Vec<String>>,
    pub correct_answer: Option<Value>,
    pub order: Option<i32>,
}

/// Answer markers arrive as numbers or strings; both become the raw marker.
#[must_use]
pub fn marker_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitBody {
    pub section_id: SectionId,
    #[serde(default)]
    pub answers: HashMap<QuestionId, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetQuery {
    pub section_id: Option<SectionId>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}
