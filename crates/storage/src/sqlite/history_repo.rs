use async_trait::async_trait;
use workout_core::model::{SessionRecord, SessionRecordId, SessionSetRecord};

use super::SqliteRepository;
use super::mapping::{conn, id_i64, map_record_row, map_set_row};
use crate::repository::{SessionHistoryRepository, StorageError};

#[async_trait]
impl SessionHistoryRepository for SqliteRepository {
    async fn append_record(&self, record: &SessionRecord) -> Result<SessionRecordId, StorageError> {
        let res = sqlx::query(
            r"
                INSERT INTO session_records (
                    user_id, day_reference, started_at, ended_at, completion_percentage
                )
                VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(id_i64("user_id", record.user_id().value())?)
        .bind(id_i64("day_reference", record.day_reference().value())?)
        .bind(record.started_at())
        .bind(record.ended_at())
        .bind(i64::from(record.completion_percentage()))
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(SessionRecordId::new(res.last_insert_rowid()))
    }

    async fn append_set_records(&self, records: &[SessionSetRecord]) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;

        for set in records {
            sqlx::query(
                r"
                    INSERT INTO session_set_records (
                        session_record_id, exercise_id, set_index, performed_reps
                    )
                    VALUES (?1, ?2, ?3, ?4)
                ",
            )
            .bind(set.session_record_id.value())
            .bind(id_i64("exercise_id", set.exercise_id.value())?)
            .bind(i64::from(set.set_index))
            .bind(set.performed_reps.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|err| match err {
                sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                    StorageError::NotFound
                }
                other => conn(other),
            })?;
        }

        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn get_record(&self, id: SessionRecordId) -> Result<SessionRecord, StorageError> {
        let row = sqlx::query(
            r"
                SELECT user_id, day_reference, started_at, ended_at, completion_percentage
                FROM session_records
                WHERE id = ?1
            ",
        )
        .bind(id.value())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?
        .ok_or(StorageError::NotFound)?;

        map_record_row(&row)
    }

    async fn list_set_records(
        &self,
        id: SessionRecordId,
    ) -> Result<Vec<SessionSetRecord>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT session_record_id, exercise_id, set_index, performed_reps
                FROM session_set_records
                WHERE session_record_id = ?1
                ORDER BY exercise_id ASC, set_index ASC
            ",
        )
        .bind(id.value())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_set_row).collect()
    }
}
