use chrono::{DateTime, Utc};
use training_core::model::{ModuleDraft, ModuleId, SectionId, TrainingModule};

use super::mapping::{id_to_i64, map_module_row, module_id_from_i64};
use super::{SqliteRepository, db_err};
use crate::repository::{ModuleRepository, StorageError};

const MODULE_COLUMNS: &str = "id, section_id, title, description, sort_order, estimated_minutes, created_at, updated_at";

fn section_param(section_id: Option<SectionId>) -> Result<Option<i64>, StorageError> {
    section_id
        .map(|s| id_to_i64("section_id", s.value()))
        .transpose()
}

#[async_trait::async_trait]
impl ModuleRepository for SqliteRepository {
    async fn list_modules(&self) -> Result<Vec<TrainingModule>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {MODULE_COLUMNS} FROM training_modules ORDER BY sort_order ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(map_module_row).collect()
    }

    async fn list_modules_by_section(
        &self,
        section_id: SectionId,
    ) -> Result<Vec<TrainingModule>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {MODULE_COLUMNS} FROM training_modules WHERE section_id = ?1 ORDER BY sort_order ASC, id ASC"
        ))
        .bind(id_to_i64("section_id", section_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(map_module_row).collect()
    }

    async fn get_module(&self, id: ModuleId) -> Result<Option<TrainingModule>, StorageError> {
        let row = sqlx::query(&format!(
            "SELECT {MODULE_COLUMNS} FROM training_modules WHERE id = ?1"
        ))
        .bind(id_to_i64("module_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.as_ref().map(map_module_row).transpose()
    }

    async fn insert_module(
        &self,
        draft: &ModuleDraft,
        now: DateTime<Utc>,
    ) -> Result<TrainingModule, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO training_modules (section_id, title, description, sort_order, estimated_minutes, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            ",
        )
        .bind(section_param(draft.section_id)?)
        .bind(draft.title.as_str())
        .bind(draft.description.as_deref())
        .bind(draft.order)
        .bind(draft.estimated_minutes)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(TrainingModule {
            id: module_id_from_i64(res.last_insert_rowid())?,
            section_id: draft.section_id,
            title: draft.title.clone(),
            description: draft.description.clone(),
            order: draft.order,
            estimated_minutes: draft.estimated_minutes,
            created_at: now,
            updated_at: now,
        })
    }

    async fn update_module(&self, module: &TrainingModule) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
            UPDATE training_modules
            SET section_id = ?1, title = ?2, description = ?3, sort_order = ?4,
                estimated_minutes = ?5, updated_at = ?6
            WHERE id = ?7
            ",
        )
        .bind(section_param(module.section_id)?)
        .bind(module.title.as_str())
        .bind(module.description.as_deref())
        .bind(module.order)
        .bind(module.estimated_minutes)
        .bind(module.updated_at)
        .bind(id_to_i64("module_id", module.id.value())?)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn assign_section(
        &self,
        id: ModuleId,
        section_id: Option<SectionId>,
        now: DateTime<Utc>,
    ) -> Result<TrainingModule, StorageError> {
        let res = sqlx::query(
            "UPDATE training_modules SET section_id = ?1, updated_at = ?2 WHERE id = ?3",
        )
        .bind(section_param(section_id)?)
        .bind(now)
        .bind(id_to_i64("module_id", id.value())?)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        self.get_module(id).await?.ok_or(StorageError::NotFound)
    }

    async fn delete_module(&self, id: ModuleId) -> Result<(), StorageError> {
        let module_id = id_to_i64("module_id", id.value())?;
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        sqlx::query("DELETE FROM employee_progress WHERE module_id = ?1")
            .bind(module_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        sqlx::query("DELETE FROM module_pages WHERE module_id = ?1")
            .bind(module_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        let res = sqlx::query("DELETE FROM training_modules WHERE id = ?1")
            .bind(module_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        // dropping the transaction rolls back the dependent deletes
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        tx.commit().await.map_err(db_err)?;
        Ok(())
    }
}
