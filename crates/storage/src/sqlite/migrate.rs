use chrono::Utc;
use sqlx::{Row, SqlitePool, Sqlite, Transaction};
use training_core::model::AnswerKey;

use super::SqliteInitError;

/// Applies versioned schema migrations.
///
/// Version 1 creates the content, progress and result tables. Version 2
/// normalizes answer keys to option indexes, adds server-side attempts and
/// enforces a single passing result per user and section.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;
        create_base_schema(&mut tx).await?;
        mark_applied(&mut tx, 1).await?;
        tx.commit().await?;
    }

    if !is_applied(pool, 2).await? {
        let mut tx = pool.begin().await?;
        normalize_answer_keys(&mut tx).await?;
        create_attempts_and_pass_index(&mut tx).await?;
        mark_applied(&mut tx, 2).await?;
        tx.commit().await?;
    }

    Ok(())
}

async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
    let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
        .bind(version)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

async fn mark_applied(tx: &mut Transaction<'_, Sqlite>, version: i64) -> Result<(), sqlx::Error> {
    sqlx::query(
        r"
            INSERT INTO schema_migrations (version, applied_at)
            VALUES (?1, ?2)
            ON CONFLICT(version) DO NOTHING
        ",
    )
    .bind(version)
    .bind(Utc::now())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[allow(clippy::too_many_lines)]
async fn create_base_schema(tx: &mut Transaction<'_, Sqlite>) -> Result<(), sqlx::Error> {
    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                first_name TEXT,
                last_name TEXT,
                profile_image_url TEXT,
                role TEXT NOT NULL DEFAULT 'employee' CHECK (role IN ('employee', 'admin')),
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
        ",
    )
    .execute(&mut **tx)
    .await?;

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS sessions (
                token TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
        ",
    )
    .execute(&mut **tx)
    .await?;

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS training_sections (
                id INTEGER PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT,
                sort_order INTEGER NOT NULL DEFAULT 0 CHECK (sort_order >= 0),
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
        ",
    )
    .execute(&mut **tx)
    .await?;

    // No ON DELETE CASCADE below: dependents are removed explicitly, in one
    // transaction, by the repository cascades.
    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS training_modules (
                id INTEGER PRIMARY KEY,
                section_id INTEGER,
                title TEXT NOT NULL,
                description TEXT,
                sort_order INTEGER NOT NULL DEFAULT 0 CHECK (sort_order >= 0),
                estimated_minutes INTEGER CHECK (estimated_minutes >= 0),
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (section_id) REFERENCES training_sections(id)
            );
        ",
    )
    .execute(&mut **tx)
    .await?;

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS module_pages (
                id INTEGER PRIMARY KEY,
                module_id INTEGER NOT NULL,
                page_order INTEGER NOT NULL CHECK (page_order >= 0),
                page_type TEXT NOT NULL,
                title TEXT,
                content TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (module_id) REFERENCES training_modules(id)
            );
        ",
    )
    .execute(&mut **tx)
    .await?;

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS employee_progress (
                id INTEGER PRIMARY KEY,
                user_id TEXT NOT NULL,
                module_id INTEGER NOT NULL,
                status TEXT NOT NULL,
                last_viewed_page_id INTEGER,
                completed_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (user_id, module_id),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (module_id) REFERENCES training_modules(id),
                FOREIGN KEY (last_viewed_page_id) REFERENCES module_pages(id) ON DELETE SET NULL
            );
        ",
    )
    .execute(&mut **tx)
    .await?;

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS assessment_questions (
                id INTEGER PRIMARY KEY,
                section_id INTEGER NOT NULL,
                question TEXT NOT NULL,
                options TEXT NOT NULL,
                correct_answer TEXT NOT NULL,
                sort_order INTEGER NOT NULL DEFAULT 0 CHECK (sort_order >= 0),
                created_at TEXT NOT NULL,
                FOREIGN KEY (section_id) REFERENCES training_sections(id)
            );
        ",
    )
    .execute(&mut **tx)
    .await?;

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS assessment_results (
                id INTEGER PRIMARY KEY,
                user_id TEXT NOT NULL,
                section_id INTEGER NOT NULL,
                score INTEGER NOT NULL CHECK (score BETWEEN 0 AND 100),
                total_questions INTEGER NOT NULL CHECK (total_questions >= 0),
                correct_answers INTEGER NOT NULL CHECK (correct_answers >= 0),
                answers TEXT NOT NULL,
                passed INTEGER NOT NULL CHECK (passed IN (0, 1)),
                date_taken TEXT NOT NULL,
                certificate_generated INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY (user_id) REFERENCES users(id),
                FOREIGN KEY (section_id) REFERENCES training_sections(id)
            );
        ",
    )
    .execute(&mut **tx)
    .await?;

    sqlx::query(
        r"
            CREATE INDEX IF NOT EXISTS idx_modules_section_order
                ON training_modules (section_id, sort_order, id);
        ",
    )
    .execute(&mut **tx)
    .await?;

    sqlx::query(
        r"
            CREATE INDEX IF NOT EXISTS idx_pages_module_order
                ON module_pages (module_id, page_order, id);
        ",
    )
    .execute(&mut **tx)
    .await?;

    sqlx::query(
        r"
            CREATE INDEX IF NOT EXISTS idx_questions_section_order
                ON assessment_questions (section_id, sort_order, id);
        ",
    )
    .execute(&mut **tx)
    .await?;

    sqlx::query(
        r"
            CREATE INDEX IF NOT EXISTS idx_results_user_date
                ON assessment_results (user_id, date_taken);
        ",
    )
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Resolve a stored answer marker (letter, index or option text) against the
/// question's JSON-encoded options.
pub(crate) fn normalize_legacy_answer(marker: &str, options_json: &str) -> Option<AnswerKey> {
    let options: Vec<String> = serde_json::from_str(options_json).ok()?;
    AnswerKey::resolve(marker, &options).ok()
}

async fn normalize_answer_keys(tx: &mut Transaction<'_, Sqlite>) -> Result<(), SqliteInitError> {
    sqlx::query("ALTER TABLE assessment_questions ADD COLUMN correct_option INTEGER")
        .execute(&mut **tx)
        .await?;

    let rows = sqlx::query("SELECT id, options, correct_answer FROM assessment_questions")
        .fetch_all(&mut **tx)
        .await?;

    for row in rows {
        let id: i64 = row.try_get("id")?;
        let options: String = row.try_get("options")?;
        let marker: String = row.try_get("correct_answer")?;
        let Some(key) = normalize_legacy_answer(&marker, &options) else {
            return Err(SqliteInitError::LegacyAnswerKey {
                question_id: id,
                marker,
            });
        };
        let index = i64::try_from(key.index()).map_err(|_| SqliteInitError::LegacyAnswerKey {
            question_id: id,
            marker: marker.clone(),
        })?;
        sqlx::query(
            "UPDATE assessment_questions SET correct_option = ?1, correct_answer = ?2 WHERE id = ?3",
        )
        .bind(index)
        .bind(key.letter().to_string())
        .bind(id)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

async fn create_attempts_and_pass_index(
    tx: &mut Transaction<'_, Sqlite>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS assessment_attempts (
                user_id TEXT NOT NULL,
                section_id INTEGER NOT NULL,
                started_at TEXT NOT NULL,
                PRIMARY KEY (user_id, section_id),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (section_id) REFERENCES training_sections(id)
            );
        ",
    )
    .execute(&mut **tx)
    .await?;

    // Older databases may hold racing duplicate passes; keep the earliest.
    let removed = sqlx::query(
        r"
            DELETE FROM assessment_results
            WHERE passed = 1
              AND id NOT IN (
                  SELECT MIN(id) FROM assessment_results
                  WHERE passed = 1
                  GROUP BY user_id, section_id
              )
        ",
    )
    .execute(&mut **tx)
    .await?
    .rows_affected();
    if removed > 0 {
        tracing::warn!(removed, "dropped duplicate passing assessment results");
    }

    sqlx::query(
        r"
            CREATE UNIQUE INDEX IF NOT EXISTS uq_results_single_pass
                ON assessment_results (user_id, section_id)
                WHERE passed = 1;
        ",
    )
    .execute(&mut **tx)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPTIONS: &str = r#"["Phishing","Tailgating","Vishing","Smishing"]"#;

    #[test]
    fn legacy_markers_resolve_to_indexes() {
        assert_eq!(normalize_legacy_answer("c", OPTIONS), Some(AnswerKey::new(2)));
        assert_eq!(normalize_legacy_answer("1", OPTIONS), Some(AnswerKey::new(1)));
        assert_eq!(normalize_legacy_answer("Smishing", OPTIONS), Some(AnswerKey::new(3)));
        assert_eq!(normalize_legacy_answer("z", OPTIONS), None);
        assert_eq!(normalize_legacy_answer("16", r#"["8","12","16"]"#), Some(AnswerKey::new(2)));
        assert_eq!(normalize_legacy_answer("a", "not json"), None);
    }

    #[tokio::test]
    async fn legacy_rows_are_rewritten_once() {
        let pool = SqlitePool::connect("sqlite:file:memdb_migrate_legacy?mode=memory&cache=shared")
            .await
            .unwrap();
        sqlx::query(
            "CREATE TABLE schema_migrations (version INTEGER PRIMARY KEY, applied_at TEXT NOT NULL)",
        )
        .execute(&pool)
        .await
        .unwrap();
        let mut tx = pool.begin().await.unwrap();
        create_base_schema(&mut tx).await.unwrap();
        mark_applied(&mut tx, 1).await.unwrap();
        tx.commit().await.unwrap();

        sqlx::query(
            "INSERT INTO training_sections (id, title, sort_order, created_at, updated_at)
             VALUES (1, 'Phishing', 0, '2023-11-14T00:00:00Z', '2023-11-14T00:00:00Z')",
        )
        .execute(&pool)
        .await
        .unwrap();
        let numeric = r#"["8","12","16"]"#;
        for (id, options, marker) in [(1, OPTIONS, "C"), (2, OPTIONS, "Tailgating"), (3, numeric, "12")] {
            sqlx::query(
                "INSERT INTO assessment_questions (id, section_id, question, options, correct_answer, sort_order, created_at)
                 VALUES (?1, 1, 'Which?', ?2, ?3, 0, '2023-11-14T00:00:00Z')",
            )
            .bind(id)
            .bind(options)
            .bind(marker)
            .execute(&pool)
            .await
            .unwrap();
        }

        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let rows = sqlx::query(
            "SELECT correct_option, correct_answer FROM assessment_questions ORDER BY id",
        )
        .fetch_all(&pool)
        .await
        .unwrap();
        let keys: Vec<(i64, String)> = rows
            .iter()
            .map(|r| (r.get("correct_option"), r.get("correct_answer")))
            .collect();
        assert_eq!(
            keys,
            vec![(2, "c".to_owned()), (1, "b".to_owned()), (1, "b".to_owned())]
        );
    }
}
