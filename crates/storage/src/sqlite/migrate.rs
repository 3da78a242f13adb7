use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Creates the session schema: one row per slot plus per-tutor progress,
/// outcome history and the lesson registry.
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

    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS sessions (
                    slot TEXT PRIMARY KEY,
                    score REAL NOT NULL,
                    last_outcome TEXT,
                    recent_subjects TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS tutor_progress (
                    slot TEXT NOT NULL,
                    tutor TEXT NOT NULL,
                    points INTEGER NOT NULL CHECK (points >= 0),
                    stage INTEGER NOT NULL CHECK (stage BETWEEN 1 AND 5),
                    PRIMARY KEY (slot, tutor),
                    FOREIGN KEY (slot) REFERENCES sessions(slot) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS outcome_history (
                    slot TEXT NOT NULL,
                    position INTEGER NOT NULL CHECK (position >= 0),
                    tutor TEXT NOT NULL,
                    outcome TEXT NOT NULL,
                    PRIMARY KEY (slot, position),
                    FOREIGN KEY (slot) REFERENCES sessions(slot) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS completed_lessons (
                    slot TEXT NOT NULL,
                    position INTEGER NOT NULL CHECK (position >= 0),
                    subject TEXT NOT NULL,
                    tutor TEXT NOT NULL,
                    score INTEGER NOT NULL CHECK (score >= 0),
                    out_of INTEGER NOT NULL CHECK (out_of > 0),
                    PRIMARY KEY (slot, position),
                    FOREIGN KEY (slot) REFERENCES sessions(slot) ON DELETE CASCADE
                );
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
