use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use training_core::model::{
    AnswerKey, AnswerSheet, AssessmentQuestion, AssessmentResult, EmployeeProgress, ModuleId,
    ModulePage, PageId, PageKind, ProgressStatus, QuestionId, ResultId, Role, SectionId,
    TrainingModule, TrainingSection, User, UserId,
};

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn id_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn section_id_from_i64(v: i64) -> Result<SectionId, StorageError> {
    Ok(SectionId::new(i64_to_u64("section_id", v)?))
}

pub(crate) fn module_id_from_i64(v: i64) -> Result<ModuleId, StorageError> {
    Ok(ModuleId::new(i64_to_u64("module_id", v)?))
}

pub(crate) fn page_id_from_i64(v: i64) -> Result<PageId, StorageError> {
    Ok(PageId::new(i64_to_u64("page_id", v)?))
}

pub(crate) fn question_id_from_i64(v: i64) -> Result<QuestionId, StorageError> {
    Ok(QuestionId::new(i64_to_u64("question_id", v)?))
}

pub(crate) fn result_id_from_i64(v: i64) -> Result<ResultId, StorageError> {
    Ok(ResultId::new(i64_to_u64("result_id", v)?))
}

fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn map_user_row(row: &SqliteRow) -> Result<User, StorageError> {
    map_user_columns(row, "")
}

/// Read user columns, optionally under an alias prefix used by report joins.
pub(crate) fn map_user_columns(row: &SqliteRow, prefix: &str) -> Result<User, StorageError> {
    let col = |name: &str| format!("{prefix}{name}");
    let role: String = row.try_get(col("role").as_str()).map_err(ser)?;
    Ok(User {
        id: UserId::new(row.try_get::<String, _>(col("id").as_str()).map_err(ser)?),
        email: row.try_get(col("email").as_str()).map_err(ser)?,
        first_name: row.try_get(col("first_name").as_str()).map_err(ser)?,
        last_name: row.try_get(col("last_name").as_str()).map_err(ser)?,
        profile_image_url: row.try_get(col("profile_image_url").as_str()).map_err(ser)?,
        role: Role::parse(&role).map_err(ser)?,
        created_at: row.try_get(col("created_at").as_str()).map_err(ser)?,
        updated_at: row.try_get(col("updated_at").as_str()).map_err(ser)?,
    })
}

pub(crate) fn map_section_row(row: &SqliteRow) -> Result<TrainingSection, StorageError> {
    Ok(TrainingSection {
        id: section_id_from_i64(row.try_get("id").map_err(ser)?)?,
        title: row.try_get("title").map_err(ser)?,
        description: row.try_get("description").map_err(ser)?,
        order: row.try_get("sort_order").map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
        updated_at: row.try_get("updated_at").map_err(ser)?,
    })
}

pub(crate) fn map_module_row(row: &SqliteRow) -> Result<TrainingModule, StorageError> {
    map_module_columns(row, "")
}

pub(crate) fn map_module_columns(
    row: &SqliteRow,
    prefix: &str,
) -> Result<TrainingModule, StorageError> {
    let col = |name: &str| format!("{prefix}{name}");
    Ok(TrainingModule {
        id: module_id_from_i64(row.try_get(col("id").as_str()).map_err(ser)?)?,
        section_id: row
            .try_get::<Option<i64>, _>(col("section_id").as_str())
            .map_err(ser)?
            .map(section_id_from_i64)
            .transpose()?,
        title: row.try_get(col("title").as_str()).map_err(ser)?,
        description: row.try_get(col("description").as_str()).map_err(ser)?,
        order: row.try_get(col("sort_order").as_str()).map_err(ser)?,
        estimated_minutes: row.try_get(col("estimated_minutes").as_str()).map_err(ser)?,
        created_at: row.try_get(col("created_at").as_str()).map_err(ser)?,
        updated_at: row.try_get(col("updated_at").as_str()).map_err(ser)?,
    })
}

pub(crate) fn map_page_row(row: &SqliteRow) -> Result<ModulePage, StorageError> {
    let kind: String = row.try_get("page_type").map_err(ser)?;
    Ok(ModulePage {
        id: page_id_from_i64(row.try_get("id").map_err(ser)?)?,
        module_id: module_id_from_i64(row.try_get("module_id").map_err(ser)?)?,
        page_order: row.try_get("page_order").map_err(ser)?,
        kind: PageKind::parse(&kind).map_err(ser)?,
        title: row.try_get("title").map_err(ser)?,
        content: row.try_get("content").map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
        updated_at: row.try_get("updated_at").map_err(ser)?,
    })
}

pub(crate) fn map_progress_row(row: &SqliteRow) -> Result<EmployeeProgress, StorageError> {
    let status: String = row.try_get("status").map_err(ser)?;
    Ok(EmployeeProgress {
        user_id: UserId::new(row.try_get::<String, _>("user_id").map_err(ser)?),
        module_id: module_id_from_i64(row.try_get("module_id").map_err(ser)?)?,
        status: ProgressStatus::parse(&status).map_err(ser)?,
        last_viewed_page_id: row
            .try_get::<Option<i64>, _>("last_viewed_page_id")
            .map_err(ser)?
            .map(page_id_from_i64)
            .transpose()?,
        completed_at: row.try_get("completed_at").map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
        updated_at: row.try_get("updated_at").map_err(ser)?,
    })
}

pub(crate) fn map_question_row(row: &SqliteRow) -> Result<AssessmentQuestion, StorageError> {
    let options_json: String = row.try_get("options").map_err(ser)?;
    let options: Vec<String> = serde_json::from_str(&options_json).map_err(ser)?;
    let index = row.try_get::<i64, _>("correct_option").map_err(ser)?;
    let index = usize::try_from(index)
        .ok()
        .filter(|i| *i < options.len())
        .ok_or_else(|| StorageError::Serialization(format!("answer key out of range: {index}")))?;
    Ok(AssessmentQuestion {
        id: question_id_from_i64(row.try_get("id").map_err(ser)?)?,
        section_id: section_id_from_i64(row.try_get("section_id").map_err(ser)?)?,
        question: row.try_get("question").map_err(ser)?,
        options,
        answer_key: AnswerKey::new(index),
        order: row.try_get("sort_order").map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
    })
}

pub(crate) fn options_to_json(options: &[String]) -> Result<String, StorageError> {
    serde_json::to_string(options).map_err(ser)
}

/// Answer sheets are stored as `{"<questionId>": <optionIndex>}`.
pub(crate) fn answers_to_json(sheet: &AnswerSheet) -> Result<String, StorageError> {
    let map: BTreeMap<String, usize> = sheet
        .iter()
        .map(|(question, key)| (question.to_string(), key.index()))
        .collect();
    serde_json::to_string(&map).map_err(ser)
}

/// Entries that are not an index (legacy free-text answers) are skipped.
pub(crate) fn answers_from_json(raw: &str) -> Result<AnswerSheet, StorageError> {
    let map: BTreeMap<String, Value> = serde_json::from_str(raw).map_err(ser)?;
    let mut sheet = AnswerSheet::new();
    for (question, value) in map {
        let Ok(question) = question.parse::<QuestionId>() else {
            continue;
        };
        let index = match &value {
            Value::Number(n) => n.as_u64().and_then(|i| usize::try_from(i).ok()),
            Value::String(s) => s.trim().parse::<usize>().ok(),
            _ => None,
        };
        if let Some(index) = index {
            sheet.insert(question, AnswerKey::new(index));
        }
    }
    Ok(sheet)
}

pub(crate) fn map_result_row(row: &SqliteRow) -> Result<AssessmentResult, StorageError> {
    map_result_columns(row, "")
}

pub(crate) fn map_result_columns(
    row: &SqliteRow,
    prefix: &str,
) -> Result<AssessmentResult, StorageError> {
    let col = |name: &str| format!("{prefix}{name}");
    let score: i64 = row.try_get(col("score").as_str()).map_err(ser)?;
    let answers: String = row.try_get(col("answers").as_str()).map_err(ser)?;
    let date_taken: DateTime<Utc> = row.try_get(col("date_taken").as_str()).map_err(ser)?;
    Ok(AssessmentResult {
        id: result_id_from_i64(row.try_get(col("id").as_str()).map_err(ser)?)?,
        user_id: UserId::new(row.try_get::<String, _>(col("user_id").as_str()).map_err(ser)?),
        section_id: section_id_from_i64(row.try_get(col("section_id").as_str()).map_err(ser)?)?,
        score: u8::try_from(score)
            .map_err(|_| StorageError::Serialization(format!("invalid score: {score}")))?,
        total_questions: u32_from_i64(
            "total_questions",
            row.try_get(col("total_questions").as_str()).map_err(ser)?,
        )?,
        correct_answers: u32_from_i64(
            "correct_answers",
            row.try_get(col("correct_answers").as_str()).map_err(ser)?,
        )?,
        answers: answers_from_json(&answers)?,
        passed: row.try_get(col("passed").as_str()).map_err(ser)?,
        date_taken,
        certificate_generated: row
            .try_get(col("certificate_generated").as_str())
            .map_err(ser)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answer_sheet_json_uses_string_keys() {
        let mut sheet = AnswerSheet::new();
        sheet.insert(QuestionId::new(3), AnswerKey::new(1));
        sheet.insert(QuestionId::new(10), AnswerKey::new(0));
        let json = answers_to_json(&sheet).unwrap();
        assert_eq!(json, r#"{"10":0,"3":1}"#);
        assert_eq!(answers_from_json(&json).unwrap(), sheet);
    }

    #[test]
    fn legacy_answer_entries_are_tolerated() {
        let sheet = answers_from_json(r#"{"1":"2","2":"Phishing","x":1}"#).unwrap();
        assert_eq!(sheet.len(), 1);
        assert_eq!(sheet.get(&QuestionId::new(1)), Some(&AnswerKey::new(2)));
    }
}
