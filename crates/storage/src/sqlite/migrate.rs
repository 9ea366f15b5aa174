use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs the schema migrations for the session store, catalog and history.
#[allow(clippy::too_many_lines)]
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

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

    // Version 1: full schema.
    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS session_store (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS day_plans (
                    template_id INTEGER NOT NULL,
                    day_number INTEGER NOT NULL CHECK (day_number BETWEEN 1 AND 7),
                    day_reference INTEGER,
                    PRIMARY KEY (template_id, day_number)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS exercise_assignments (
                    template_id INTEGER NOT NULL,
                    day_number INTEGER NOT NULL,
                    position INTEGER NOT NULL CHECK (position >= 0),
                    exercise_id INTEGER NOT NULL,
                    planned_sets INTEGER NOT NULL CHECK (planned_sets >= 0),
                    planned_value TEXT NOT NULL,
                    category_id INTEGER,
                    PRIMARY KEY (template_id, day_number, exercise_id),
                    FOREIGN KEY (template_id, day_number)
                        REFERENCES day_plans(template_id, day_number) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS session_records (
                    id INTEGER PRIMARY KEY,
                    user_id INTEGER NOT NULL,
                    day_reference INTEGER NOT NULL,
                    started_at TEXT NOT NULL,
                    ended_at TEXT NOT NULL,
                    completion_percentage INTEGER NOT NULL
                        CHECK (completion_percentage BETWEEN 0 AND 100)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS session_set_records (
                    id INTEGER PRIMARY KEY,
                    session_record_id INTEGER NOT NULL,
                    exercise_id INTEGER NOT NULL,
                    set_index INTEGER NOT NULL CHECK (set_index >= 1),
                    performed_reps TEXT NOT NULL,
                    FOREIGN KEY (session_record_id) REFERENCES session_records(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_exercise_assignments_day
                    ON exercise_assignments (template_id, day_number, position);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_session_set_records_record
                    ON session_set_records (session_record_id, exercise_id, set_index);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
