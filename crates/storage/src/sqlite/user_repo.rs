use chrono::{DateTime, Utc};
use sqlx::Row;
use training_core::model::{Role, User, UserId, UserProfile};

use super::mapping::{map_user_row, ser};
use super::{SqliteRepository, db_err};
use crate::repository::{SessionRecord, SessionRepository, StorageError, UserRepository};

const USER_COLUMNS: &str =
    "id, email, first_name, last_name, profile_image_url, role, created_at, updated_at";

impl SqliteRepository {
    async fn fetch_user(&self, id: &UserId) -> Result<Option<User>, StorageError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(map_user_row).transpose()
    }
}

#[async_trait::async_trait]
impl UserRepository for SqliteRepository {
    async fn upsert_user(
        &self,
        profile: &UserProfile,
        now: DateTime<Utc>,
    ) -> Result<User, StorageError> {
        // login never changes the role
        sqlx::query(
            r"
            INSERT INTO users (id, email, first_name, last_name, profile_image_url, role, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
            ON CONFLICT(id) DO UPDATE SET
                email = excluded.email,
                first_name = excluded.first_name,
                last_name = excluded.last_name,
                profile_image_url = excluded.profile_image_url,
                updated_at = excluded.updated_at
            ",
        )
        .bind(profile.id.as_str())
        .bind(profile.email.as_str())
        .bind(profile.first_name.as_deref())
        .bind(profile.last_name.as_deref())
        .bind(profile.profile_image_url.as_deref())
        .bind(Role::Employee.as_str())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        self.fetch_user(&profile.id).await?.ok_or(StorageError::NotFound)
    }

    async fn get_user(&self, id: &UserId) -> Result<Option<User>, StorageError> {
        self.fetch_user(id).await
    }

    async fn list_users(&self) -> Result<Vec<User>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(map_user_row).collect()
    }

    async fn set_role_by_email(
        &self,
        email: &str,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<User, StorageError> {
        let row = sqlx::query(
            r"
            UPDATE users SET role = ?1, updated_at = ?2
            WHERE lower(email) = lower(?3)
            RETURNING id
            ",
        )
        .bind(role.as_str())
        .bind(now)
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .ok_or(StorageError::NotFound)?;

        let id = UserId::new(row.try_get::<String, _>("id").map_err(ser)?);
        self.fetch_user(&id).await?.ok_or(StorageError::NotFound)
    }
}

#[async_trait::async_trait]
impl SessionRepository for SqliteRepository {
    async fn create_session(&self, session: &SessionRecord) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO sessions (token, user_id, created_at, expires_at)
            VALUES (?1, ?2, ?3, ?4)
            ",
        )
        .bind(session.token.as_str())
        .bind(session.user_id.as_str())
        .bind(session.created_at)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get_session(&self, token: &str) -> Result<Option<SessionRecord>, StorageError> {
        let row = sqlx::query(
            "SELECT token, user_id, created_at, expires_at FROM sessions WHERE token = ?1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(|row| -> Result<SessionRecord, StorageError> {
            Ok(SessionRecord {
                token: row.try_get("token").map_err(ser)?,
                user_id: UserId::new(row.try_get::<String, _>("user_id").map_err(ser)?),
                created_at: row.try_get("created_at").map_err(ser)?,
                expires_at: row.try_get("expires_at").map_err(ser)?,
            })
        })
        .transpose()
    }

    async fn delete_session(&self, token: &str) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM sessions WHERE token = ?1")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StorageError> {
        let res = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(res.rows_affected())
    }
}
