//! Shared error types for the services crate.

use thiserror::Error;

use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;
use workout_core::model::{DayNumber, ExerciseId, RecordError, TemplateId};

/// Errors emitted by a `SubmissionBackend`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SubmissionError {
    #[error("submission backend is not configured")]
    Disabled,
    #[error("submission backend returned status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by the session engine and the day loader.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    #[error("cannot finish with {progress}% progress, at least {floor}% is required")]
    Validation { progress: u8, floor: u8 },
    #[error("day {active} of template {template_id} is already in progress (requested day {requested})")]
    LockConflict {
        template_id: TemplateId,
        requested: DayNumber,
        active: DayNumber,
    },
    #[error("exercise {0} is not part of this day")]
    UnknownExercise(ExerciseId),
    #[error("set {set_index} is outside the {planned} planned sets")]
    SetIndexOutOfRange { set_index: u32, planned: u32 },
    #[error("session has not started")]
    NotStarted,
    #[error("no finish choice is pending")]
    NotAwaitingChoice,
    #[error("session is already finished, reset it to start over")]
    SessionFinished,
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error("could not load day plan: {0}")]
    Catalog(#[source] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
