use chrono::{DateTime, Utc};
use sqlx::Row;
use training_core::model::{
    AssessmentAttempt, AssessmentQuestion, QuestionContent, QuestionId, SectionId, UserId,
};

use super::mapping::{
    id_to_i64, map_question_row, options_to_json, question_id_from_i64, section_id_from_i64, ser,
};
use super::{SqliteRepository, db_err};
use crate::repository::{AttemptRepository, QuestionRepository, StorageError};

const QUESTION_COLUMNS: &str =
    "id, section_id, question, options, correct_option, sort_order, created_at";

fn answer_index(question: &AssessmentQuestion) -> Result<i64, StorageError> {
    i64::try_from(question.answer_key.index())
        .map_err(|_| StorageError::Serialization("correct_option overflow".into()))
}

#[async_trait::async_trait]
impl QuestionRepository for SqliteRepository {
    async fn list_questions_by_section(
        &self,
        section_id: SectionId,
    ) -> Result<Vec<AssessmentQuestion>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {QUESTION_COLUMNS} FROM assessment_questions WHERE section_id = ?1 ORDER BY sort_order ASC, id ASC"
        ))
        .bind(id_to_i64("section_id", section_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(map_question_row).collect()
    }

    async fn list_all_questions(&self) -> Result<Vec<AssessmentQuestion>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {QUESTION_COLUMNS} FROM assessment_questions ORDER BY section_id ASC, sort_order ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(map_question_row).collect()
    }

    async fn get_question(
        &self,
        id: QuestionId,
    ) -> Result<Option<AssessmentQuestion>, StorageError> {
        let row = sqlx::query(&format!(
            "SELECT {QUESTION_COLUMNS} FROM assessment_questions WHERE id = ?1"
        ))
        .bind(id_to_i64("question_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.as_ref().map(map_question_row).transpose()
    }

    async fn insert_question(
        &self,
        content: &QuestionContent,
        now: DateTime<Utc>,
    ) -> Result<AssessmentQuestion, StorageError> {
        let question = AssessmentQuestion {
            id: QuestionId::new(0),
            section_id: content.section_id,
            question: content.question.clone(),
            options: content.options.clone(),
            answer_key: content.answer_key,
            order: content.order,
            created_at: now,
        };

        // correct_answer keeps the letter code readable for older tooling
        let res = sqlx::query(
            r"
            INSERT INTO assessment_questions (section_id, question, options, correct_answer, correct_option, sort_order, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
        )
        .bind(id_to_i64("section_id", question.section_id.value())?)
        .bind(question.question.as_str())
        .bind(options_to_json(&question.options)?)
        .bind(question.answer_key.letter().to_string())
        .bind(answer_index(&question)?)
        .bind(question.order)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(AssessmentQuestion {
            id: question_id_from_i64(res.last_insert_rowid())?,
            ..question
        })
    }

    async fn update_question(&self, question: &AssessmentQuestion) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
            UPDATE assessment_questions
            SET section_id = ?1, question = ?2, options = ?3, correct_answer = ?4,
                correct_option = ?5, sort_order = ?6
            WHERE id = ?7
            ",
        )
        .bind(id_to_i64("section_id", question.section_id.value())?)
        .bind(question.question.as_str())
        .bind(options_to_json(&question.options)?)
        .bind(question.answer_key.letter().to_string())
        .bind(answer_index(question)?)
        .bind(question.order)
        .bind(id_to_i64("question_id", question.id.value())?)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn delete_question(&self, id: QuestionId) -> Result<(), StorageError> {
        let res = sqlx::query("DELETE FROM assessment_questions WHERE id = ?1")
            .bind(id_to_i64("question_id", id.value())?)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl AttemptRepository for SqliteRepository {
    async fn start_attempt(
        &self,
        user_id: &UserId,
        section_id: SectionId,
        now: DateTime<Utc>,
    ) -> Result<AssessmentAttempt, StorageError> {
        // an open attempt keeps its original start time
        let row = sqlx::query(
            r"
            INSERT INTO assessment_attempts (user_id, section_id, started_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(user_id, section_id) DO UPDATE SET started_at = started_at
            RETURNING user_id, section_id, started_at
            ",
        )
        .bind(user_id.as_str())
        .bind(id_to_i64("section_id", section_id.value())?)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        map_attempt_row(&row)
    }

    async fn get_attempt(
        &self,
        user_id: &UserId,
        section_id: SectionId,
    ) -> Result<Option<AssessmentAttempt>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT user_id, section_id, started_at
            FROM assessment_attempts
            WHERE user_id = ?1 AND section_id = ?2
            ",
        )
        .bind(user_id.as_str())
        .bind(id_to_i64("section_id", section_id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.as_ref().map(map_attempt_row).transpose()
    }

    async fn close_attempt(
        &self,
        user_id: &UserId,
        section_id: SectionId,
    ) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM assessment_attempts WHERE user_id = ?1 AND section_id = ?2")
            .bind(user_id.as_str())
            .bind(id_to_i64("section_id", section_id.value())?)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }
}

fn map_attempt_row(row: &sqlx::sqlite::SqliteRow) -> Result<AssessmentAttempt, StorageError> {
    Ok(AssessmentAttempt {
        user_id: UserId::new(row.try_get::<String, _>("user_id").map_err(ser)?),
        section_id: section_id_from_i64(row.try_get("section_id").map_err(ser)?)?,
        started_at: row.try_get("started_at").map_err(ser)?,
    })
}
