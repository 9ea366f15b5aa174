use chrono::{DateTime, Utc};
use std::collections::HashMap;

use storage::StoreKey;
use workout_core::model::{
    ExerciseAssignment, ExerciseId, ExerciseProgress, PerSetRepLog, RecordError,
    exercise_percentage, overall_progress,
};

use crate::error::EngineError;
use crate::persistence::WriteQueue;

/// Owns the completed-set count of every exercise in the loaded day.
///
/// Counts are kept in `[0, planned_sets]`. Every change is mirrored to the
/// session store through the write queue; an exercise that drops back to
/// zero has its stored entry removed instead of storing an empty record.
pub struct ProgressTracker {
    exercises: Vec<ExerciseAssignment>,
    entries: HashMap<ExerciseId, ExerciseProgress>,
    rep_logs: HashMap<ExerciseId, PerSetRepLog>,
    writes: WriteQueue,
}

impl ProgressTracker {
    #[must_use]
    pub fn new(exercises: Vec<ExerciseAssignment>, writes: WriteQueue) -> Self {
        Self {
            exercises,
            entries: HashMap::new(),
            rep_logs: HashMap::new(),
            writes,
        }
    }

    /// Load persisted state without writing it back.
    ///
    /// Entries for exercises outside the day are ignored and counts are
    /// clamped to the current plan.
    pub(crate) fn restore(
        &mut self,
        entries: impl IntoIterator<Item = ExerciseProgress>,
        rep_logs: impl IntoIterator<Item = PerSetRepLog>,
    ) {
        for entry in entries {
            let Some(planned) = self.planned_sets(entry.exercise_id) else {
                continue;
            };
            let entry = ExerciseProgress::new(
                entry.exercise_id,
                entry.completed_sets,
                planned,
                entry.last_updated,
            );
            if entry.completed_sets > 0 {
                self.entries.insert(entry.exercise_id, entry);
            }
        }
        for log in rep_logs {
            if self.planned_sets(log.exercise_id).is_some() && !log.is_empty() {
                self.rep_logs.insert(log.exercise_id, log);
            }
        }
    }

    #[must_use]
    pub fn exercises(&self) -> &[ExerciseAssignment] {
        &self.exercises
    }

    #[must_use]
    pub fn planned_sets(&self, id: ExerciseId) -> Option<u32> {
        self.exercises
            .iter()
            .find(|exercise| exercise.id == id)
            .map(|exercise| exercise.planned_sets)
    }

    #[must_use]
    pub fn completed_sets(&self, id: ExerciseId) -> u32 {
        self.entries.get(&id).map_or(0, |entry| entry.completed_sets)
    }

    #[must_use]
    pub fn entries(&self) -> &HashMap<ExerciseId, ExerciseProgress> {
        &self.entries
    }

    #[must_use]
    pub fn rep_logs(&self) -> &HashMap<ExerciseId, PerSetRepLog> {
        &self.rep_logs
    }

    #[must_use]
    pub fn has_progress(&self) -> bool {
        !self.entries.is_empty()
    }

    #[must_use]
    pub fn overall_progress(&self) -> u8 {
        overall_progress(&self.exercises, &self.entries)
    }

    #[must_use]
    pub fn exercise_percentage(&self, id: ExerciseId) -> Option<u8> {
        let exercise = self.exercises.iter().find(|exercise| exercise.id == id)?;
        Some(exercise_percentage(exercise, self.entries.get(&id)))
    }

    /// Count one more completed set, capped at the plan.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::UnknownExercise` if `id` is not part of the day.
    pub fn mark_set(&mut self, id: ExerciseId, now: DateTime<Utc>) -> Result<u32, EngineError> {
        let current = self.completed_sets(id);
        self.apply(id, current.saturating_add(1), now)
    }

    /// Take back one completed set, floored at zero.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::UnknownExercise` if `id` is not part of the day.
    pub fn undo_set(&mut self, id: ExerciseId, now: DateTime<Utc>) -> Result<u32, EngineError> {
        let current = self.completed_sets(id);
        self.apply(id, current.saturating_sub(1), now)
    }

    /// Mark every planned set of `id` as done.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::UnknownExercise` if `id` is not part of the day.
    pub fn mark_all_sets(&mut self, id: ExerciseId, now: DateTime<Utc>) -> Result<u32, EngineError> {
        let planned = self
            .planned_sets(id)
            .ok_or(EngineError::UnknownExercise(id))?;
        self.apply(id, planned, now)
    }

    /// Store the reps performed for a 1-based set of `id`.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::UnknownExercise` if `id` is not part of the day,
    /// `EngineError::Record` for a zero set index and
    /// `EngineError::SetIndexOutOfRange` past the last planned set.
    pub fn log_reps(
        &mut self,
        id: ExerciseId,
        set_index: u32,
        reps: Option<u32>,
    ) -> Result<(), EngineError> {
        let planned = self
            .planned_sets(id)
            .ok_or(EngineError::UnknownExercise(id))?;
        if set_index == 0 {
            return Err(RecordError::ZeroSetIndex.into());
        }
        if set_index > planned {
            return Err(EngineError::SetIndexOutOfRange { set_index, planned });
        }
        let log = self
            .rep_logs
            .entry(id)
            .or_insert_with(|| PerSetRepLog::new(id));
        log.record(set_index, reps)?;

        let key = StoreKey::rep_log(id);
        if log.is_empty() {
            self.rep_logs.remove(&id);
            self.writes.remove(key);
        } else {
            self.writes.set_json(key, log);
        }
        Ok(())
    }

    /// Zero every exercise of the day and queue deletion of their stored
    /// progress and rep logs.
    ///
    /// In-memory state is cleared before any delete is issued. A delete that
    /// fails leaves a stale key behind until the next reset of the day.
    pub fn reset_all(&mut self, day_exercises: &[ExerciseAssignment]) {
        self.entries.clear();
        self.rep_logs.clear();
        for exercise in day_exercises {
            self.writes.remove(StoreKey::progress(exercise.id));
            self.writes.remove(StoreKey::rep_log(exercise.id));
        }
    }

    /// Drop every rep log of the day, in memory and in the store.
    pub fn clear_rep_logs(&mut self) {
        for id in self.rep_logs.keys() {
            self.writes.remove(StoreKey::rep_log(*id));
        }
        self.rep_logs.clear();
    }

    fn apply(&mut self, id: ExerciseId, target: u32, now: DateTime<Utc>) -> Result<u32, EngineError> {
        let planned = self
            .planned_sets(id)
            .ok_or(EngineError::UnknownExercise(id))?;
        let target = target.min(planned);
        if target == self.completed_sets(id) {
            return Ok(target);
        }

        let key = StoreKey::progress(id);
        if target == 0 {
            self.entries.remove(&id);
            self.writes.remove(key);
        } else {
            let entry = ExerciseProgress::new(id, target, planned, now);
            self.writes.set_json(key, &entry);
            self.entries.insert(id, entry);
        }
        Ok(target)
    }
}
