use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{DayReference, ExerciseId, SessionRecordId, UserId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RecordError {
    #[error("ended_at is before started_at")]
    InvalidTimeRange,

    #[error("completion percentage must be at most 100, got {0}")]
    PercentageOutOfRange(u8),

    #[error("set index must start at 1")]
    ZeroSetIndex,
}

//
// ─── PER-SET REP LOG ──────────────────────────────────────────────────────────
//

/// Reps the user actually performed, per set, for one exercise.
///
/// The log is sparse: it may be shorter than the planned set count and may
/// contain gaps for sets that were never logged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerSetRepLog {
    pub exercise_id: ExerciseId,
    pub performed_reps: Vec<Option<u32>>,
}

impl PerSetRepLog {
    #[must_use]
    pub fn new(exercise_id: ExerciseId) -> Self {
        Self {
            exercise_id,
            performed_reps: Vec::new(),
        }
    }

    /// Record reps for a 1-based set index, growing the log as needed.
    ///
    /// Passing `None` clears the entry; trailing gaps are trimmed.
    ///
    /// # Errors
    ///
    /// Returns `RecordError::ZeroSetIndex` when `set_index` is 0.
    pub fn record(&mut self, set_index: u32, reps: Option<u32>) -> Result<(), RecordError> {
        let slot = usize::try_from(set_index)
            .ok()
            .and_then(|i| i.checked_sub(1))
            .ok_or(RecordError::ZeroSetIndex)?;
        if slot >= self.performed_reps.len() {
            if reps.is_none() {
                return Ok(());
            }
            self.performed_reps.resize(slot + 1, None);
        }
        self.performed_reps[slot] = reps;
        while matches!(self.performed_reps.last(), Some(None)) {
            self.performed_reps.pop();
        }
        Ok(())
    }

    /// Logged reps for a 1-based set index, if any.
    #[must_use]
    pub fn reps_for(&self, set_index: u32) -> Option<u32> {
        let slot = usize::try_from(set_index).ok()?.checked_sub(1)?;
        self.performed_reps.get(slot).copied().flatten()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.performed_reps.iter().all(Option::is_none)
    }
}

//
// ─── SESSION RECORD ───────────────────────────────────────────────────────────
//

/// Durable summary of one finished session ("daily" history entry).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    started_at: DateTime<Utc>,
    ended_at: DateTime<Utc>,
    completion_percentage: u8,
    user_id: UserId,
    day_reference: DayReference,
}

impl SessionRecord {
    /// # Errors
    ///
    /// Returns `RecordError::InvalidTimeRange` if `ended_at < started_at` and
    /// `RecordError::PercentageOutOfRange` above 100.
    pub fn new(
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
        completion_percentage: u8,
        user_id: UserId,
        day_reference: DayReference,
    ) -> Result<Self, RecordError> {
        if ended_at < started_at {
            return Err(RecordError::InvalidTimeRange);
        }
        if completion_percentage > 100 {
            return Err(RecordError::PercentageOutOfRange(completion_percentage));
        }
        Ok(Self {
            started_at,
            ended_at,
            completion_percentage,
            user_id,
            day_reference,
        })
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn ended_at(&self) -> DateTime<Utc> {
        self.ended_at
    }

    #[must_use]
    pub fn completion_percentage(&self) -> u8 {
        self.completion_percentage
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn day_reference(&self) -> DayReference {
        self.day_reference
    }

    #[must_use]
    pub fn duration(&self) -> chrono::Duration {
        self.ended_at - self.started_at
    }
}

//
// ─── SESSION SET RECORD ───────────────────────────────────────────────────────
//

/// One planned set of one exercise, filed under a session record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSetRecord {
    pub set_index: u32,
    pub performed_reps: String,
    pub session_record_id: SessionRecordId,
    pub exercise_id: ExerciseId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn rep_log_grows_sparsely() {
        let mut log = PerSetRepLog::new(ExerciseId::new(1));
        log.record(3, Some(8)).unwrap();
        assert_eq!(log.performed_reps, vec![None, None, Some(8)]);
        assert_eq!(log.reps_for(3), Some(8));
        assert_eq!(log.reps_for(1), None);
        assert_eq!(log.reps_for(10), None);
    }

    #[test]
    fn clearing_last_entry_trims_tail() {
        let mut log = PerSetRepLog::new(ExerciseId::new(1));
        log.record(1, Some(10)).unwrap();
        log.record(3, Some(8)).unwrap();
        log.record(3, None).unwrap();
        assert_eq!(log.performed_reps, vec![Some(10)]);
        log.record(1, None).unwrap();
        assert!(log.is_empty());
    }

    #[test]
    fn zero_set_index_is_rejected() {
        let mut log = PerSetRepLog::new(ExerciseId::new(1));
        assert_eq!(log.record(0, Some(1)), Err(RecordError::ZeroSetIndex));
        assert_eq!(log.reps_for(0), None);
    }

    #[test]
    fn rep_log_reads_json_with_nulls() {
        let log: PerSetRepLog =
            serde_json::from_str(r#"{"exercise_id":4,"performed_reps":[10,null,8]}"#).unwrap();
        assert_eq!(log.reps_for(2), None);
        assert_eq!(log.reps_for(3), Some(8));
    }

    #[test]
    fn record_rejects_inverted_range() {
        let now = fixed_now();
        let err = SessionRecord::new(
            now,
            now - chrono::Duration::minutes(1),
            50,
            UserId::new(1),
            DayReference::new(1),
        )
        .unwrap_err();
        assert_eq!(err, RecordError::InvalidTimeRange);
    }

    #[test]
    fn record_rejects_percentage_over_100() {
        let now = fixed_now();
        let err = SessionRecord::new(now, now, 101, UserId::new(1), DayReference::new(1))
            .unwrap_err();
        assert_eq!(err, RecordError::PercentageOutOfRange(101));
    }
}
