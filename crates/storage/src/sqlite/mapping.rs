use workout_core::model::{
    CategoryId, DayNumber, DayReference, ExerciseAssignment, ExerciseId, SessionRecord,
    SessionRecordId, SessionSetRecord, TemplateId, UserId,
};
use sqlx::Row;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn day_from_i64(v: i64) -> Result<DayNumber, StorageError> {
    let raw = u8::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid day_number: {v}")))?;
    DayNumber::new(raw).map_err(ser)
}

pub(crate) fn template_id_to_i64(id: TemplateId) -> Result<i64, StorageError> {
    id_i64("template_id", id.value())
}

pub(crate) fn map_assignment_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<ExerciseAssignment, StorageError> {
    let id = ExerciseId::new(i64_to_u64(
        "exercise_id",
        row.try_get::<i64, _>("exercise_id").map_err(ser)?,
    )?);
    let day_number = day_from_i64(row.try_get::<i64, _>("day_number").map_err(ser)?)?;
    let planned_sets = u32_from_i64(
        "planned_sets",
        row.try_get::<i64, _>("planned_sets").map_err(ser)?,
    )?;
    let planned_value: String = row.try_get("planned_value").map_err(ser)?;
    let category_id = row
        .try_get::<Option<i64>, _>("category_id")
        .map_err(ser)?
        .map(|v| i64_to_u64("category_id", v).map(CategoryId::new))
        .transpose()?;

    let mut assignment = ExerciseAssignment::new(id, day_number, planned_sets, planned_value);
    assignment.category_id = category_id;
    Ok(assignment)
}

pub(crate) fn map_day_reference(v: Option<i64>) -> Result<Option<DayReference>, StorageError> {
    v.map(|raw| i64_to_u64("day_reference", raw).map(DayReference::new))
        .transpose()
}

pub(crate) fn map_record_row(row: &sqlx::sqlite::SqliteRow) -> Result<SessionRecord, StorageError> {
    let user_id = UserId::new(i64_to_u64(
        "user_id",
        row.try_get::<i64, _>("user_id").map_err(ser)?,
    )?);
    let day_reference = DayReference::new(i64_to_u64(
        "day_reference",
        row.try_get::<i64, _>("day_reference").map_err(ser)?,
    )?);
    let started_at = row.try_get("started_at").map_err(ser)?;
    let ended_at = row.try_get("ended_at").map_err(ser)?;
    let pct: i64 = row.try_get("completion_percentage").map_err(ser)?;
    let pct = u8::try_from(pct)
        .map_err(|_| StorageError::Serialization(format!("invalid completion_percentage: {pct}")))?;

    SessionRecord::new(started_at, ended_at, pct, user_id, day_reference).map_err(ser)
}

pub(crate) fn map_set_row(row: &sqlx::sqlite::SqliteRow) -> Result<SessionSetRecord, StorageError> {
    Ok(SessionSetRecord {
        set_index: u32_from_i64("set_index", row.try_get::<i64, _>("set_index").map_err(ser)?)?,
        performed_reps: row.try_get("performed_reps").map_err(ser)?,
        session_record_id: SessionRecordId::new(
            row.try_get::<i64, _>("session_record_id").map_err(ser)?,
        ),
        exercise_id: ExerciseId::new(i64_to_u64(
            "exercise_id",
            row.try_get::<i64, _>("exercise_id").map_err(ser)?,
        )?),
    })
}
