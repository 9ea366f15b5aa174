use std::fmt;

use workout_core::model::{DayNumber, ExerciseId, TemplateId};

/// Deterministic key for a value held in a `SessionStore`.
///
/// Callers never format raw key strings; they ask for the key of the thing
/// they want to persist.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoreKey(String);

const PREFIX: &str = "workout";

impl StoreKey {
    /// Completed-set count for one exercise.
    #[must_use]
    pub fn progress(exercise_id: ExerciseId) -> Self {
        Self(format!("{PREFIX}.progress.{exercise_id}"))
    }

    /// Per-set rep log for one exercise.
    #[must_use]
    pub fn rep_log(exercise_id: ExerciseId) -> Self {
        Self(format!("{PREFIX}.reps.{exercise_id}"))
    }

    /// Session lock for one day of a routine template.
    #[must_use]
    pub fn session_lock(template_id: TemplateId, day_number: DayNumber) -> Self {
        Self(format!("{PREFIX}.lock.{template_id}.{day_number}"))
    }

    /// Id of the session record filed for one day of a routine template.
    #[must_use]
    pub fn filed_record(template_id: TemplateId, day_number: DayNumber) -> Self {
        Self(format!("{PREFIX}.filed.{template_id}.{day_number}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StoreKey({})", self.0)
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
