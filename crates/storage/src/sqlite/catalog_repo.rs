use async_trait::async_trait;
use sqlx::Row;
use workout_core::model::{DayNumber, DayPlan, TemplateId};

use super::SqliteRepository;
use super::mapping::{conn, id_i64, map_assignment_row, map_day_reference, ser, template_id_to_i64};
use crate::repository::{ExerciseCatalog, StorageError};

#[async_trait]
impl ExerciseCatalog for SqliteRepository {
    async fn day_plan(
        &self,
        template_id: TemplateId,
        day_number: DayNumber,
    ) -> Result<DayPlan, StorageError> {
        let tid = template_id_to_i64(template_id)?;
        let day = i64::from(day_number.value());

        let day_row = sqlx::query(
            r"
            SELECT day_reference
            FROM day_plans
            WHERE template_id = ?1 AND day_number = ?2
            ",
        )
        .bind(tid)
        .bind(day)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?
        .ok_or(StorageError::NotFound)?;
        let day_reference =
            map_day_reference(day_row.try_get::<Option<i64>, _>("day_reference").map_err(ser)?)?;

        let rows = sqlx::query(
            r"
            SELECT exercise_id, day_number, planned_sets, planned_value, category_id
            FROM exercise_assignments
            WHERE template_id = ?1 AND day_number = ?2
            ORDER BY position ASC, exercise_id ASC
            ",
        )
        .bind(tid)
        .bind(day)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let exercises = rows
            .iter()
            .map(map_assignment_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(DayPlan {
            template_id,
            day_number,
            day_reference,
            exercises,
        })
    }

    async fn upsert_day_plan(&self, plan: &DayPlan) -> Result<(), StorageError> {
        let tid = template_id_to_i64(plan.template_id)?;
        let day = i64::from(plan.day_number.value());
        let day_reference = plan
            .day_reference
            .map(|r| id_i64("day_reference", r.value()))
            .transpose()?;

        let mut tx = self.pool.begin().await.map_err(conn)?;

        sqlx::query(
            r"
            INSERT INTO day_plans (template_id, day_number, day_reference)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(template_id, day_number) DO UPDATE SET
                day_reference = excluded.day_reference
            ",
        )
        .bind(tid)
        .bind(day)
        .bind(day_reference)
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        sqlx::query("DELETE FROM exercise_assignments WHERE template_id = ?1 AND day_number = ?2")
            .bind(tid)
            .bind(day)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        for (position, exercise) in plan.exercises.iter().enumerate() {
            let position = i64::try_from(position)
                .map_err(|_| StorageError::Serialization("position overflow".into()))?;
            let category_id = exercise
                .category_id
                .map(|c| id_i64("category_id", c.value()))
                .transpose()?;
            sqlx::query(
                r"
                INSERT INTO exercise_assignments (
                    template_id, day_number, position, exercise_id,
                    planned_sets, planned_value, category_id
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ",
            )
            .bind(tid)
            .bind(day)
            .bind(position)
            .bind(id_i64("exercise_id", exercise.id.value())?)
            .bind(i64::from(exercise.planned_sets))
            .bind(exercise.planned_value.raw())
            .bind(category_id)
            .execute(&mut *tx)
            .await
            .map_err(|err| match err {
                sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Conflict,
                other => conn(other),
            })?;
        }

        tx.commit().await.map_err(conn)?;
        Ok(())
    }
}
