use training_core::model::{EmployeeProgress, ModuleId, ProgressUpdate, UserId};

use super::mapping::{id_to_i64, map_module_columns, map_progress_row, map_user_columns};
use super::{SqliteRepository, db_err};
use crate::repository::{ProgressReportRow, ProgressRepository, StorageError};

const PROGRESS_COLUMNS: &str =
    "user_id, module_id, status, last_viewed_page_id, completed_at, created_at, updated_at";

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn upsert_progress(
        &self,
        update: &ProgressUpdate,
    ) -> Result<EmployeeProgress, StorageError> {
        let row = sqlx::query(&format!(
            r"
            INSERT INTO employee_progress (user_id, module_id, status, last_viewed_page_id, completed_at, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            ON CONFLICT(user_id, module_id) DO UPDATE SET
                status = excluded.status,
                last_viewed_page_id = excluded.last_viewed_page_id,
                completed_at = excluded.completed_at,
                updated_at = excluded.updated_at
            RETURNING {PROGRESS_COLUMNS}
            "
        ))
        .bind(update.user_id.as_str())
        .bind(id_to_i64("module_id", update.module_id.value())?)
        .bind(update.status.as_str())
        .bind(
            update
                .last_viewed_page_id
                .map(|p| id_to_i64("page_id", p.value()))
                .transpose()?,
        )
        .bind(update.completed_at)
        .bind(update.at)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        map_progress_row(&row)
    }

    async fn get_progress(
        &self,
        user_id: &UserId,
        module_id: ModuleId,
    ) -> Result<Option<EmployeeProgress>, StorageError> {
        let row = sqlx::query(&format!(
            "SELECT {PROGRESS_COLUMNS} FROM employee_progress WHERE user_id = ?1 AND module_id = ?2"
        ))
        .bind(user_id.as_str())
        .bind(id_to_i64("module_id", module_id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.as_ref().map(map_progress_row).transpose()
    }

    async fn list_progress_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<EmployeeProgress>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {PROGRESS_COLUMNS} FROM employee_progress WHERE user_id = ?1 ORDER BY module_id ASC"
        ))
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(map_progress_row).collect()
    }

    async fn list_all_progress(&self) -> Result<Vec<ProgressReportRow>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT
                p.user_id, p.module_id, p.status, p.last_viewed_page_id, p.completed_at,
                p.created_at, p.updated_at,
                u.id AS u_id, u.email AS u_email, u.first_name AS u_first_name,
                u.last_name AS u_last_name, u.profile_image_url AS u_profile_image_url,
                u.role AS u_role, u.created_at AS u_created_at, u.updated_at AS u_updated_at,
                m.id AS m_id, m.section_id AS m_section_id, m.title AS m_title,
                m.description AS m_description, m.sort_order AS m_sort_order,
                m.estimated_minutes AS m_estimated_minutes, m.created_at AS m_created_at,
                m.updated_at AS m_updated_at
            FROM employee_progress p
            JOIN users u ON u.id = p.user_id
            JOIN training_modules m ON m.id = p.module_id
            ORDER BY p.updated_at DESC, p.id DESC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter()
            .map(|row| -> Result<ProgressReportRow, StorageError> {
                Ok(ProgressReportRow {
                    progress: map_progress_row(row)?,
                    user: map_user_columns(row, "u_")?,
                    module: map_module_columns(row, "m_")?,
                })
            })
            .collect()
    }
}
