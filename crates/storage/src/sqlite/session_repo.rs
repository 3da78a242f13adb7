use chrono::Utc;
use quiz_core::model::{HistoryRecord, LessonRecord, Outcome, SessionSnapshot};
use quiz_core::progression::{MIN_STAGE, clamp_stage};
use sqlx::Row;
use std::collections::BTreeSet;

use super::SqliteRepository;
use crate::repository::{SessionRepository, StorageError, validate_slot};

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn conn(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

fn u8_from_i64(field: &'static str, v: i64) -> Result<u8, StorageError> {
    u8::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

fn position_i64(v: usize) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization("position overflow".into()))
}

#[async_trait::async_trait]
impl SessionRepository for SqliteRepository {
    async fn save_snapshot(
        &self,
        slot: &str,
        snapshot: &SessionSnapshot,
    ) -> Result<(), StorageError> {
        let slot = validate_slot(slot)?;
        let recent = serde_json::to_string(&snapshot.recent_subjects).map_err(ser)?;

        let mut tx = self.pool.begin().await.map_err(conn)?;

        sqlx::query(
            r"
                INSERT INTO sessions (slot, score, last_outcome, recent_subjects, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(slot) DO UPDATE SET
                    score = excluded.score,
                    last_outcome = excluded.last_outcome,
                    recent_subjects = excluded.recent_subjects,
                    updated_at = excluded.updated_at
            ",
        )
        .bind(slot)
        .bind(snapshot.score)
        .bind(snapshot.last_outcome.map(Outcome::as_str))
        .bind(recent)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        for table in ["tutor_progress", "outcome_history", "completed_lessons"] {
            sqlx::query(&format!("DELETE FROM {table} WHERE slot = ?1"))
                .bind(slot)
                .execute(&mut *tx)
                .await
                .map_err(conn)?;
        }

        let tutors: BTreeSet<&String> = snapshot
            .points
            .keys()
            .chain(snapshot.stage.keys())
            .collect();
        for tutor in tutors {
            let points = snapshot.points.get(tutor).copied().unwrap_or(0);
            let stage = snapshot
                .stage
                .get(tutor)
                .copied()
                .map_or(MIN_STAGE, clamp_stage);
            sqlx::query(
                r"
                    INSERT INTO tutor_progress (slot, tutor, points, stage)
                    VALUES (?1, ?2, ?3, ?4)
                ",
            )
            .bind(slot)
            .bind(tutor.as_str())
            .bind(i64::from(points))
            .bind(i64::from(stage))
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        for (position, entry) in snapshot.history.iter().enumerate() {
            sqlx::query(
                r"
                    INSERT INTO outcome_history (slot, position, tutor, outcome)
                    VALUES (?1, ?2, ?3, ?4)
                ",
            )
            .bind(slot)
            .bind(position_i64(position)?)
            .bind(&entry.tutor)
            .bind(entry.outcome.as_str())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        for (position, lesson) in snapshot.completed_lessons.iter().enumerate() {
            sqlx::query(
                r"
                    INSERT INTO completed_lessons (slot, position, subject, tutor, score, out_of)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ",
            )
            .bind(slot)
            .bind(position_i64(position)?)
            .bind(&lesson.subject)
            .bind(&lesson.tutor)
            .bind(i64::from(lesson.score))
            .bind(i64::from(lesson.out_of.max(1)))
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn load_snapshot(&self, slot: &str) -> Result<SessionSnapshot, StorageError> {
        let slot = validate_slot(slot)?;
        let row = sqlx::query(
            r"
                SELECT score, last_outcome, recent_subjects
                FROM sessions
                WHERE slot = ?1
            ",
        )
        .bind(slot)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?
        .ok_or(StorageError::NotFound)?;

        let mut snapshot = SessionSnapshot {
            score: row.try_get("score").map_err(ser)?,
            ..SessionSnapshot::default()
        };
        let last: Option<String> = row.try_get("last_outcome").map_err(ser)?;
        snapshot.last_outcome = last.map(|o| o.parse::<Outcome>()).transpose().map_err(ser)?;
        let recent: String = row.try_get("recent_subjects").map_err(ser)?;
        snapshot.recent_subjects = serde_json::from_str(&recent).map_err(ser)?;

        let rows = sqlx::query(
            r"
                SELECT tutor, points, stage
                FROM tutor_progress
                WHERE slot = ?1
                ORDER BY tutor ASC
            ",
        )
        .bind(slot)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;
        for row in rows {
            let tutor: String = row.try_get("tutor").map_err(ser)?;
            let points = u32_from_i64("points", row.try_get("points").map_err(ser)?)?;
            let stage = u8_from_i64("stage", row.try_get("stage").map_err(ser)?)?;
            snapshot.points.insert(tutor.clone(), points);
            snapshot.stage.insert(tutor, stage);
        }

        let rows = sqlx::query(
            r"
                SELECT tutor, outcome
                FROM outcome_history
                WHERE slot = ?1
                ORDER BY position ASC
            ",
        )
        .bind(slot)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;
        for row in rows {
            let tutor: String = row.try_get("tutor").map_err(ser)?;
            let outcome: String = row.try_get("outcome").map_err(ser)?;
            snapshot.history.push(HistoryRecord {
                tutor,
                outcome: outcome.parse::<Outcome>().unwrap_or(Outcome::Omitted),
            });
        }

        let rows = sqlx::query(
            r"
                SELECT subject, tutor, score, out_of
                FROM completed_lessons
                WHERE slot = ?1
                ORDER BY position ASC
            ",
        )
        .bind(slot)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;
        for row in rows {
            snapshot.completed_lessons.push(LessonRecord {
                subject: row.try_get("subject").map_err(ser)?,
                tutor: row.try_get("tutor").map_err(ser)?,
                score: u32_from_i64("score", row.try_get("score").map_err(ser)?)?,
                out_of: u32_from_i64("out_of", row.try_get("out_of").map_err(ser)?)?,
            });
        }

        Ok(snapshot)
    }

    async fn list_slots(&self) -> Result<Vec<String>, StorageError> {
        let rows = sqlx::query("SELECT slot FROM sessions ORDER BY slot ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;
        rows.iter()
            .map(|row| row.try_get::<String, _>("slot").map_err(ser))
            .collect()
    }

    async fn delete_slot(&self, slot: &str) -> Result<(), StorageError> {
        let slot = validate_slot(slot)?;
        sqlx::query("DELETE FROM sessions WHERE slot = ?1")
            .bind(slot)
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(())
    }
}
