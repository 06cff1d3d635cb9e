use chrono::{DateTime, Utc};
use training_core::model::{SectionDraft, SectionId, TrainingSection};

use super::mapping::{id_to_i64, map_section_row, section_id_from_i64};
use super::{SqliteRepository, db_err};
use crate::repository::{SectionRepository, StorageError};

#[async_trait::async_trait]
impl SectionRepository for SqliteRepository {
    async fn list_sections(&self) -> Result<Vec<TrainingSection>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, title, description, sort_order, created_at, updated_at
            FROM training_sections
            ORDER BY sort_order ASC, id ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(map_section_row).collect()
    }

    async fn get_section(&self, id: SectionId) -> Result<Option<TrainingSection>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, title, description, sort_order, created_at, updated_at
            FROM training_sections WHERE id = ?1
            ",
        )
        .bind(id_to_i64("section_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.as_ref().map(map_section_row).transpose()
    }

    async fn insert_section(
        &self,
        draft: &SectionDraft,
        now: DateTime<Utc>,
    ) -> Result<TrainingSection, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO training_sections (title, description, sort_order, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?4)
            ",
        )
        .bind(draft.title.as_str())
        .bind(draft.description.as_deref())
        .bind(draft.order)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(TrainingSection {
            id: section_id_from_i64(res.last_insert_rowid())?,
            title: draft.title.clone(),
            description: draft.description.clone(),
            order: draft.order,
            created_at: now,
            updated_at: now,
        })
    }

    async fn update_section(&self, section: &TrainingSection) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
            UPDATE training_sections
            SET title = ?1, description = ?2, sort_order = ?3, updated_at = ?4
            WHERE id = ?5
            ",
        )
        .bind(section.title.as_str())
        .bind(section.description.as_deref())
        .bind(section.order)
        .bind(section.updated_at)
        .bind(id_to_i64("section_id", section.id.value())?)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn delete_section(&self, id: SectionId) -> Result<(), StorageError> {
        let section_id = id_to_i64("section_id", id.value())?;
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let exists = sqlx::query("SELECT 1 FROM training_sections WHERE id = ?1")
            .bind(section_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?;
        if exists.is_none() {
            return Err(StorageError::NotFound);
        }

        // dependents first, so foreign keys hold at every step
        let statements = [
            r"DELETE FROM employee_progress
              WHERE module_id IN (SELECT id FROM training_modules WHERE section_id = ?1)",
            r"DELETE FROM module_pages
              WHERE module_id IN (SELECT id FROM training_modules WHERE section_id = ?1)",
            "DELETE FROM training_modules WHERE section_id = ?1",
            "DELETE FROM assessment_questions WHERE section_id = ?1",
            "DELETE FROM assessment_attempts WHERE section_id = ?1",
            "DELETE FROM assessment_results WHERE section_id = ?1",
            "DELETE FROM training_sections WHERE id = ?1",
        ];
        for statement in statements {
            sqlx::query(statement)
                .bind(section_id)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;
        tracing::debug!(section_id = %id, "section deleted with dependents");
        Ok(())
    }
}
