use chrono::{DateTime, Utc};
use training_core::model::{ModuleId, ModulePage, PageDraft, PageId};

use super::mapping::{id_to_i64, map_page_row, page_id_from_i64};
use super::{SqliteRepository, db_err};
use crate::repository::{PageRepository, StorageError};

#[async_trait::async_trait]
impl PageRepository for SqliteRepository {
    async fn list_pages(&self, module_id: ModuleId) -> Result<Vec<ModulePage>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, module_id, page_order, page_type, title, content, created_at, updated_at
            FROM module_pages
            WHERE module_id = ?1
            ORDER BY page_order ASC, id ASC
            ",
        )
        .bind(id_to_i64("module_id", module_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(map_page_row).collect()
    }

    async fn get_page(&self, id: PageId) -> Result<Option<ModulePage>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, module_id, page_order, page_type, title, content, created_at, updated_at
            FROM module_pages WHERE id = ?1
            ",
        )
        .bind(id_to_i64("page_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.as_ref().map(map_page_row).transpose()
    }

    async fn insert_page(
        &self,
        draft: &PageDraft,
        now: DateTime<Utc>,
    ) -> Result<ModulePage, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO module_pages (module_id, page_order, page_type, title, content, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            ",
        )
        .bind(id_to_i64("module_id", draft.module_id.value())?)
        .bind(draft.page_order)
        .bind(draft.kind.as_str())
        .bind(draft.title.as_deref())
        .bind(draft.content.as_deref())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(ModulePage {
            id: page_id_from_i64(res.last_insert_rowid())?,
            module_id: draft.module_id,
            page_order: draft.page_order,
            kind: draft.kind,
            title: draft.title.clone(),
            content: draft.content.clone(),
            created_at: now,
            updated_at: now,
        })
    }

    async fn update_page(&self, page: &ModulePage) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
            UPDATE module_pages
            SET page_order = ?1, page_type = ?2, title = ?3, content = ?4, updated_at = ?5
            WHERE id = ?6
            ",
        )
        .bind(page.page_order)
        .bind(page.kind.as_str())
        .bind(page.title.as_deref())
        .bind(page.content.as_deref())
        .bind(page.updated_at)
        .bind(id_to_i64("page_id", page.id.value())?)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn delete_page(&self, id: PageId) -> Result<(), StorageError> {
        let res = sqlx::query("DELETE FROM module_pages WHERE id = ?1")
            .bind(id_to_i64("page_id", id.value())?)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}
