use training_core::model::{AssessmentResult, NewAssessmentResult, ResultId, SectionId, UserId};

use super::mapping::{
    answers_to_json, id_to_i64, map_result_columns, map_result_row, map_user_columns,
    result_id_from_i64,
};
use super::{SqliteRepository, db_err};
use crate::repository::{ResultReportRow, ResultRepository, StorageError};

const RESULT_COLUMNS: &str = "id, user_id, section_id, score, total_questions, correct_answers, answers, passed, date_taken, certificate_generated";

#[async_trait::async_trait]
impl ResultRepository for SqliteRepository {
    async fn insert_result(
        &self,
        result: &NewAssessmentResult,
    ) -> Result<AssessmentResult, StorageError> {
        let outcome = result.outcome;
        let res = sqlx::query(
            r"
            INSERT INTO assessment_results
                (user_id, section_id, score, total_questions, correct_answers, answers, passed, date_taken, certificate_generated)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0)
            ",
        )
        .bind(result.user_id.as_str())
        .bind(id_to_i64("section_id", result.section_id.value())?)
        .bind(i64::from(outcome.score))
        .bind(i64::from(outcome.total_questions))
        .bind(i64::from(outcome.correct_answers))
        .bind(answers_to_json(&result.answers)?)
        .bind(outcome.passed)
        .bind(result.date_taken)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(result
            .clone()
            .assign_id(result_id_from_i64(res.last_insert_rowid())?))
    }

    async fn get_result(&self, id: ResultId) -> Result<Option<AssessmentResult>, StorageError> {
        let row = sqlx::query(&format!(
            "SELECT {RESULT_COLUMNS} FROM assessment_results WHERE id = ?1"
        ))
        .bind(id_to_i64("result_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.as_ref().map(map_result_row).transpose()
    }

    async fn list_results_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<AssessmentResult>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {RESULT_COLUMNS} FROM assessment_results WHERE user_id = ?1 ORDER BY date_taken DESC, id DESC"
        ))
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(map_result_row).collect()
    }

    async fn list_all_results(&self) -> Result<Vec<ResultReportRow>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT
                r.id AS r_id, r.user_id AS r_user_id, r.section_id AS r_section_id,
                r.score AS r_score, r.total_questions AS r_total_questions,
                r.correct_answers AS r_correct_answers, r.answers AS r_answers,
                r.passed AS r_passed, r.date_taken AS r_date_taken,
                r.certificate_generated AS r_certificate_generated,
                u.id AS u_id, u.email AS u_email, u.first_name AS u_first_name,
                u.last_name AS u_last_name, u.profile_image_url AS u_profile_image_url,
                u.role AS u_role, u.created_at AS u_created_at, u.updated_at AS u_updated_at
            FROM assessment_results r
            JOIN users u ON u.id = r.user_id
            ORDER BY r.date_taken DESC, r.id DESC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter()
            .map(|row| -> Result<ResultReportRow, StorageError> {
                Ok(ResultReportRow {
                    result: map_result_columns(row, "r_")?,
                    user: map_user_columns(row, "u_")?,
                })
            })
            .collect()
    }

    async fn mark_certificate_issued(&self, id: ResultId) -> Result<(), StorageError> {
        let res = sqlx::query("UPDATE assessment_results SET certificate_generated = 1 WHERE id = ?1")
            .bind(id_to_i64("result_id", id.value())?)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn delete_results_for_user(
        &self,
        user_id: &UserId,
        section_id: Option<SectionId>,
    ) -> Result<u64, StorageError> {
        let res = match section_id {
            Some(section_id) => {
                sqlx::query(
                    "DELETE FROM assessment_results WHERE user_id = ?1 AND section_id = ?2",
                )
                .bind(user_id.as_str())
                .bind(id_to_i64("section_id", section_id.value())?)
                .execute(&self.pool)
                .await
            }
            None => {
                sqlx::query("DELETE FROM assessment_results WHERE user_id = ?1")
                    .bind(user_id.as_str())
                    .execute(&self.pool)
                    .await
            }
        }
        .map_err(db_err)?;
        Ok(res.rows_affected())
    }
}
