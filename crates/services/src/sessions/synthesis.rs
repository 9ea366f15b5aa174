use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

use workout_core::Clock;
use workout_core::model::{
    DayReference, ExerciseAssignment, ExerciseId, PerSetRepLog, SessionRecord, SessionRecordId,
    SessionSetRecord, UserId,
};

use crate::submission::SubmissionBackend;

/// Everything the synthesizer reads from a live session.
#[derive(Debug, Clone, Copy)]
pub struct SynthesisRequest<'a> {
    pub exercises: &'a [ExerciseAssignment],
    pub rep_logs: &'a HashMap<ExerciseId, PerSetRepLog>,
    /// Lock start time; the current time is used when absent.
    pub started_at: Option<DateTime<Utc>>,
    pub completion_percentage: u8,
    pub user_id: Option<UserId>,
    pub day_reference: Option<DayReference>,
}

/// Result of one synthesis attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisOutcome {
    /// No user or no day reference; nothing was sent.
    Skipped,
    /// The session record exists. `sets_acknowledged` is false when the
    /// bulk set submission failed; that detail is not retried.
    Submitted {
        record_id: SessionRecordId,
        set_records: usize,
        sets_acknowledged: bool,
    },
    /// The session record was not created.
    Failed { reason: String },
}

impl SynthesisOutcome {
    #[must_use]
    pub fn record_id(&self) -> Option<SessionRecordId> {
        match self {
            Self::Submitted { record_id, .. } => Some(*record_id),
            _ => None,
        }
    }
}

/// Turns a finished session into a `SessionRecord` plus one
/// `SessionSetRecord` per planned set.
#[derive(Clone)]
pub struct RecordSynthesizer {
    backend: Arc<dyn SubmissionBackend>,
    clock: Clock,
}

impl RecordSynthesizer {
    #[must_use]
    pub fn new(backend: Arc<dyn SubmissionBackend>, clock: Clock) -> Self {
        Self { backend, clock }
    }

    pub async fn synthesize(&self, request: SynthesisRequest<'_>) -> SynthesisOutcome {
        let (Some(user_id), Some(day_reference)) = (request.user_id, request.day_reference) else {
            tracing::info!(
                has_user = request.user_id.is_some(),
                has_day_reference = request.day_reference.is_some(),
                "session record skipped"
            );
            return SynthesisOutcome::Skipped;
        };

        let end = self.clock.now();
        let start = match request.started_at {
            Some(start) if start > end => {
                tracing::warn!(%start, %end, "session start is in the future, clamping");
                end
            }
            Some(start) => start,
            None => end,
        };

        let record = match SessionRecord::new(
            start,
            end,
            request.completion_percentage,
            user_id,
            day_reference,
        ) {
            Ok(record) => record,
            Err(err) => return failed(&err),
        };

        let record_id = match self.backend.create_session_record(&record).await {
            Ok(id) => id,
            Err(err) => return failed(&err),
        };
        tracing::info!(
            %record_id,
            completion = request.completion_percentage,
            "session record created"
        );

        let sets = build_set_records(request.exercises, request.rep_logs, record_id);
        let sets_acknowledged = if sets.is_empty() {
            true
        } else {
            match self.backend.create_session_set_records(record_id, &sets).await {
                Ok(()) => true,
                Err(err) => {
                    tracing::warn!(%record_id, error = %err, "set records were not filed");
                    false
                }
            }
        };

        SynthesisOutcome::Submitted {
            record_id,
            set_records: sets.len(),
            sets_acknowledged,
        }
    }
}

fn failed(err: &dyn std::error::Error) -> SynthesisOutcome {
    tracing::warn!(error = %err, "session record submission failed");
    SynthesisOutcome::Failed {
        reason: err.to_string(),
    }
}

/// Build one set record per planned set of every exercise.
///
/// A set's reps come from the rep log when logged, otherwise from the
/// exercise's planned value.
#[must_use]
pub fn build_set_records(
    exercises: &[ExerciseAssignment],
    rep_logs: &HashMap<ExerciseId, PerSetRepLog>,
    record_id: SessionRecordId,
) -> Vec<SessionSetRecord> {
    let mut out = Vec::new();
    for exercise in exercises {
        let log = rep_logs.get(&exercise.id);
        for set_index in 1..=exercise.planned_sets {
            let performed_reps = log
                .and_then(|log| log.reps_for(set_index))
                .map_or_else(|| exercise.planned_value.fallback_reps(), |reps| reps.to_string());
            out.push(SessionSetRecord {
                set_index,
                performed_reps,
                session_record_id: record_id,
                exercise_id: exercise.id,
            });
        }
    }
    out
}
