use chrono::{DateTime, Utc};
use std::sync::Arc;

use storage::StoreKey;
use storage::repository::{SessionStore, SessionStoreExt};
use workout_core::Clock;
use workout_core::model::{
    DayNumber, DayPlan, ExerciseId, ExerciseProgress, PerSetRepLog, SessionRecordId, TemplateId,
    UserId,
};

use super::celebration::Celebration;
use super::coordinator::{
    CompletionCoordinator, CompletionState, FinishMode, PARTIAL_FINISH_FLOOR, Transition,
};
use super::lock::SessionLockManager;
use super::progress::ProgressTracker;
use super::synthesis::{RecordSynthesizer, SynthesisOutcome, SynthesisRequest};
use crate::error::EngineError;
use crate::persistence::WriteQueue;
use crate::submission::SubmissionBackend;

//
// ─── UPDATE ────────────────────────────────────────────────────────────────────
//

/// What the UI needs to re-render after an engine call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUpdate {
    pub state: CompletionState,
    pub overall_progress: u8,
    /// New completed-set count of the exercise the call targeted.
    pub completed_sets: Option<u32>,
    pub celebration: Option<Celebration>,
    /// Present when the call tried to file the session record.
    pub synthesis: Option<SynthesisOutcome>,
}

//
// ─── ENGINE ────────────────────────────────────────────────────────────────────
//

/// Live session for one `(template, day)` pair.
///
/// Built by `WorkoutSessionService::load_day` and dropped on day change.
/// In-memory state is authoritative; every change is mirrored to the session
/// store in the background. Call `close` before dropping to wait for those
/// writes.
pub struct SessionEngine {
    plan: DayPlan,
    user_id: Option<UserId>,
    clock: Clock,
    tracker: ProgressTracker,
    locks: SessionLockManager,
    coordinator: CompletionCoordinator,
    synthesizer: RecordSynthesizer,
    writes: WriteQueue,
}

impl SessionEngine {
    /// Start a fresh, not-started engine for `plan`.
    #[must_use]
    pub fn new(
        plan: DayPlan,
        user_id: Option<UserId>,
        clock: Clock,
        store: Arc<dyn SessionStore>,
        backend: Arc<dyn SubmissionBackend>,
        writes: WriteQueue,
    ) -> Self {
        let tracker = ProgressTracker::new(plan.exercises.clone(), writes.clone());
        let locks = SessionLockManager::new(store, writes.clone());
        Self {
            plan,
            user_id,
            clock,
            tracker,
            locks,
            coordinator: CompletionCoordinator::new(),
            synthesizer: RecordSynthesizer::new(backend, clock),
            writes,
        }
    }

    /// Rehydrate progress, rep logs, the lock and the filed marker from
    /// `store`.
    ///
    /// Pending writes are flushed first. Keys that cannot be read load as
    /// absent. An unfiled day with progress but no lock gets its lock back,
    /// starting now. A filed day drops any lock that outlived the filing.
    pub(crate) async fn restore(&mut self, store: &dyn SessionStore) {
        self.writes.flush().await;

        let mut entries = Vec::new();
        let mut rep_logs = Vec::new();
        for exercise in &self.plan.exercises {
            if let Some(entry) =
                read_json::<ExerciseProgress>(store, &StoreKey::progress(exercise.id)).await
            {
                entries.push(entry);
            }
            if let Some(log) = read_json::<PerSetRepLog>(store, &StoreKey::rep_log(exercise.id)).await
            {
                rep_logs.push(log);
            }
        }
        self.tracker.restore(entries, rep_logs);

        let (template_id, day_number) = (self.plan.template_id, self.plan.day_number);
        let lock = self.locks.load(template_id, day_number).await;
        let filed = self.locks.load_filed(template_id, day_number).await;
        match (filed, lock) {
            (Some(_), Some(_)) => self.locks.release(template_id, day_number),
            (None, None) if self.tracker.has_progress() => {
                tracing::warn!(%template_id, %day_number, "unfiled progress without a lock, relocking");
                self.acquire_lock(self.clock.now());
            }
            _ => {}
        }
        self.coordinator = CompletionCoordinator::restored(
            self.tracker.overall_progress(),
            lock.is_some() || self.tracker.has_progress(),
            filed,
        );
        tracing::info!(
            template_id = %self.plan.template_id,
            day_number = %self.plan.day_number,
            state = ?self.coordinator.state(),
            progress = self.tracker.overall_progress(),
            "day loaded"
        );
    }

    #[must_use]
    pub fn plan(&self) -> &DayPlan {
        &self.plan
    }

    #[must_use]
    pub fn template_id(&self) -> TemplateId {
        self.plan.template_id
    }

    #[must_use]
    pub fn day_number(&self) -> DayNumber {
        self.plan.day_number
    }

    #[must_use]
    pub fn state(&self) -> CompletionState {
        self.coordinator.state()
    }

    #[must_use]
    pub fn overall_progress(&self) -> u8 {
        self.tracker.overall_progress()
    }

    #[must_use]
    pub fn exercise_percentage(&self, id: ExerciseId) -> Option<u8> {
        self.tracker.exercise_percentage(id)
    }

    #[must_use]
    pub fn completed_sets(&self, id: ExerciseId) -> u32 {
        self.tracker.completed_sets(id)
    }

    #[must_use]
    pub fn reps_for(&self, id: ExerciseId, set_index: u32) -> Option<u32> {
        self.tracker
            .rep_logs()
            .get(&id)
            .and_then(|log| log.reps_for(set_index))
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.locks
            .started_at(self.plan.template_id, self.plan.day_number)
    }

    /// Id of the filed session record, once synthesis succeeded.
    #[must_use]
    pub fn record_id(&self) -> Option<SessionRecordId> {
        self.coordinator.record_id()
    }

    /// Count one more set of `id`. Reaching 100% finishes the day.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::SessionFinished` after the day is finished and
    /// `EngineError::UnknownExercise` for an exercise outside the day.
    pub async fn mark_set(&mut self, id: ExerciseId) -> Result<SessionUpdate, EngineError> {
        self.coordinator.ensure_mutable()?;
        let now = self.clock.now();
        let completed = self.tracker.mark_set(id, now)?;
        self.acquire_lock(now);
        let transition = self.coordinator.after_mutation(self.tracker.overall_progress());
        Ok(self.settle(transition, Some(completed)).await)
    }

    /// Take back one set of `id`. Like `mark_set`, this starts the session.
    ///
    /// # Errors
    ///
    /// Same as `mark_set`.
    pub async fn undo_set(&mut self, id: ExerciseId) -> Result<SessionUpdate, EngineError> {
        self.coordinator.ensure_mutable()?;
        let now = self.clock.now();
        let completed = self.tracker.undo_set(id, now)?;
        self.acquire_lock(now);
        let transition = self.coordinator.after_mutation(self.tracker.overall_progress());
        Ok(self.settle(transition, Some(completed)).await)
    }

    /// Mark every planned set of `id`.
    ///
    /// # Errors
    ///
    /// Same as `mark_set`.
    pub async fn mark_all_sets(&mut self, id: ExerciseId) -> Result<SessionUpdate, EngineError> {
        self.coordinator.ensure_mutable()?;
        let now = self.clock.now();
        let completed = self.tracker.mark_all_sets(id, now)?;
        self.acquire_lock(now);
        let transition = self.coordinator.after_mutation(self.tracker.overall_progress());
        Ok(self.settle(transition, Some(completed)).await)
    }

    /// Record the reps actually performed for a 1-based set. `None` clears
    /// the entry.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::SessionFinished` after the day is finished,
    /// `EngineError::UnknownExercise` for an exercise outside the day and
    /// `EngineError::Record` for a zero set index.
    pub fn log_reps(
        &mut self,
        id: ExerciseId,
        set_index: u32,
        reps: Option<u32>,
    ) -> Result<(), EngineError> {
        self.coordinator.ensure_mutable()?;
        self.tracker.log_reps(id, set_index, reps)
    }

    /// Ask to finish the day.
    ///
    /// At 100% the day finishes immediately; below it the engine waits for
    /// `choose_finish_mode`. On a finished day whose record was not filed,
    /// this retries the submission.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::NotStarted` before any set was marked.
    pub async fn request_finish(&mut self) -> Result<SessionUpdate, EngineError> {
        let transition = self
            .coordinator
            .request_finish(self.tracker.overall_progress())?;
        Ok(self.settle(transition, None).await)
    }

    /// Resolve a pending finish choice. `FinishMode::Full` marks every
    /// remaining set first.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Validation` for a partial finish below the floor
    /// and `EngineError::NotAwaitingChoice` when no choice is pending.
    pub async fn choose_finish_mode(
        &mut self,
        mode: FinishMode,
    ) -> Result<SessionUpdate, EngineError> {
        if mode == FinishMode::Full
            && self.coordinator.state() == CompletionState::AwaitingFinishChoice
        {
            let now = self.clock.now();
            let ids: Vec<ExerciseId> = self.plan.exercises.iter().map(|e| e.id).collect();
            for id in ids {
                self.tracker.mark_all_sets(id, now)?;
            }
            self.acquire_lock(now);
        }
        let transition = self
            .coordinator
            .choose_finish_mode(mode, self.tracker.overall_progress())?;
        Ok(self.settle(transition, None).await)
    }

    /// Finish with every set marked, from any started state.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::NotStarted` before any set was marked.
    pub async fn finish_full(&mut self) -> Result<SessionUpdate, EngineError> {
        let update = self.request_finish().await?;
        if update.state == CompletionState::AwaitingFinishChoice {
            return self.choose_finish_mode(FinishMode::Full).await;
        }
        Ok(update)
    }

    /// Finish with current progress, from any started state.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Validation` below `PARTIAL_FINISH_FLOOR` without
    /// changing state, and `EngineError::NotStarted` before any set was
    /// marked.
    pub async fn finish_partial(&mut self) -> Result<SessionUpdate, EngineError> {
        let progress = self.tracker.overall_progress();
        let open = matches!(
            self.coordinator.state(),
            CompletionState::InProgress | CompletionState::AwaitingFinishChoice
        );
        if open && progress < PARTIAL_FINISH_FLOOR {
            return Err(EngineError::Validation {
                progress,
                floor: PARTIAL_FINISH_FLOOR,
            });
        }
        let update = self.request_finish().await?;
        if update.state == CompletionState::AwaitingFinishChoice {
            return self.choose_finish_mode(FinishMode::Partial).await;
        }
        Ok(update)
    }

    /// Back out of a pending finish choice.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::NotAwaitingChoice` when no choice is pending.
    pub fn cancel_finish(&mut self) -> Result<CompletionState, EngineError> {
        self.coordinator.cancel_finish()?;
        Ok(self.coordinator.state())
    }

    /// Zero the day and release its lock. Allowed in every state.
    ///
    /// In-memory state is cleared before the store deletes are queued.
    pub fn reset_all(&mut self) -> SessionUpdate {
        self.tracker.reset_all(&self.plan.exercises);
        self.coordinator.reset();
        self.locks
            .release(self.plan.template_id, self.plan.day_number);
        self.locks
            .clear_filed(self.plan.template_id, self.plan.day_number);
        tracing::info!(
            template_id = %self.plan.template_id,
            day_number = %self.plan.day_number,
            "day reset"
        );
        self.snapshot(None, None, None)
    }

    /// Wait for every queued store write, then drop the engine.
    pub async fn close(self) {
        self.writes.flush().await;
    }

    fn acquire_lock(&mut self, now: DateTime<Utc>) {
        self.locks
            .acquire_on_first_mutation(self.plan.template_id, self.plan.day_number, now);
    }

    async fn settle(&mut self, transition: Transition, completed_sets: Option<u32>) -> SessionUpdate {
        let celebration = transition.celebrate.then(Celebration::random);
        let synthesis = if transition.synthesize {
            self.synthesize().await
        } else {
            None
        };
        self.snapshot(completed_sets, celebration, synthesis)
    }

    async fn synthesize(&mut self) -> Option<SynthesisOutcome> {
        if !self.coordinator.begin_synthesis() {
            return None;
        }
        let completion_percentage = if self.coordinator.state() == CompletionState::FinishedFull {
            100
        } else {
            self.tracker.overall_progress()
        };
        let request = SynthesisRequest {
            exercises: self.tracker.exercises(),
            rep_logs: self.tracker.rep_logs(),
            started_at: self.started_at(),
            completion_percentage,
            user_id: self.user_id,
            day_reference: self.plan.day_reference,
        };
        let outcome = self.synthesizer.synthesize(request).await;

        if let Some(record_id) = outcome.record_id() {
            self.coordinator.synthesis_succeeded(record_id);
            self.locks
                .record_filed(self.plan.template_id, self.plan.day_number, record_id);
            self.tracker.clear_rep_logs();
            self.locks
                .release(self.plan.template_id, self.plan.day_number);
        } else {
            self.coordinator.synthesis_rearmed();
        }
        Some(outcome)
    }

    fn snapshot(
        &self,
        completed_sets: Option<u32>,
        celebration: Option<Celebration>,
        synthesis: Option<SynthesisOutcome>,
    ) -> SessionUpdate {
        SessionUpdate {
            state: self.coordinator.state(),
            overall_progress: self.tracker.overall_progress(),
            completed_sets,
            celebration,
            synthesis,
        }
    }
}

async fn read_json<T>(store: &dyn SessionStore, key: &StoreKey) -> Option<T>
where
    T: serde::de::DeserializeOwned + Send,
{
    match store.get_json::<T>(key).await {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(%key, error = %err, "unreadable session key treated as absent");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use storage::repository::InMemoryRepository;
    use workout_core::model::{DayReference, ExerciseAssignment, SessionRecord, SessionSetRecord};
    use workout_core::time::fixed_now;

    use crate::error::SubmissionError;

    #[derive(Default)]
    struct CountingBackend {
        records: Mutex<Vec<SessionRecord>>,
        sets: Mutex<Vec<SessionSetRecord>>,
    }

    #[async_trait]
    impl SubmissionBackend for CountingBackend {
        async fn create_session_record(
            &self,
            record: &SessionRecord,
        ) -> Result<SessionRecordId, SubmissionError> {
            let mut records = self.records.lock().unwrap();
            records.push(record.clone());
            Ok(SessionRecordId::new(i64::try_from(records.len()).unwrap()))
        }

        async fn create_session_set_records(
            &self,
            _record_id: SessionRecordId,
            sets: &[SessionSetRecord],
        ) -> Result<(), SubmissionError> {
            self.sets.lock().unwrap().extend_from_slice(sets);
            Ok(())
        }
    }

    fn plan() -> DayPlan {
        let day = DayNumber::new(2).unwrap();
        DayPlan {
            template_id: TemplateId::new(1),
            day_number: day,
            day_reference: Some(DayReference::new(12)),
            exercises: vec![
                ExerciseAssignment::new(ExerciseId::new(1), day, 4, "12-10-8"),
                ExerciseAssignment::new(ExerciseId::new(2), day, 6, "10"),
            ],
        }
    }

    fn engine() -> (SessionEngine, Arc<CountingBackend>, InMemoryRepository) {
        let repo = InMemoryRepository::new();
        let store: Arc<dyn SessionStore> = Arc::new(repo.clone());
        let writes = WriteQueue::spawn(Arc::clone(&store));
        let backend = Arc::new(CountingBackend::default());
        let engine = SessionEngine::new(
            plan(),
            Some(UserId::new(3)),
            Clock::fixed(fixed_now()),
            store,
            backend.clone(),
            writes,
        );
        (engine, backend, repo)
    }

    #[tokio::test]
    async fn first_mark_starts_session_and_takes_lock() {
        let (mut engine, _, _) = engine();
        assert_eq!(engine.state(), CompletionState::NotStarted);
        assert!(engine.started_at().is_none());

        let update = engine.mark_set(ExerciseId::new(1)).await.unwrap();
        assert_eq!(update.state, CompletionState::InProgress);
        assert_eq!(update.completed_sets, Some(1));
        assert_eq!(update.overall_progress, 10);
        assert_eq!(engine.started_at(), Some(fixed_now()));
    }

    #[tokio::test]
    async fn undo_counts_as_first_mutation() {
        let (mut engine, _, _) = engine();
        let update = engine.undo_set(ExerciseId::new(1)).await.unwrap();
        assert_eq!(update.state, CompletionState::InProgress);
        assert_eq!(update.completed_sets, Some(0));
        assert_eq!(engine.started_at(), Some(fixed_now()));
    }

    #[tokio::test]
    async fn reaching_100_files_one_record_and_celebrates() {
        let (mut engine, backend, _) = engine();
        engine.mark_all_sets(ExerciseId::new(1)).await.unwrap();
        let update = engine.mark_all_sets(ExerciseId::new(2)).await.unwrap();

        assert_eq!(update.state, CompletionState::FinishedFull);
        assert!(update.celebration.is_some());
        assert_eq!(update.synthesis.as_ref().and_then(SynthesisOutcome::record_id), Some(SessionRecordId::new(1)));
        assert_eq!(backend.records.lock().unwrap().len(), 1);
        assert_eq!(backend.sets.lock().unwrap().len(), 10);
        assert!(engine.started_at().is_none());

        let err = engine.mark_set(ExerciseId::new(1)).await.unwrap_err();
        assert!(matches!(err, EngineError::SessionFinished));
    }

    #[tokio::test]
    async fn finish_full_twice_submits_once() {
        let (mut engine, backend, _) = engine();
        for _ in 0..2 {
            engine.mark_set(ExerciseId::new(1)).await.unwrap();
        }
        for _ in 0..4 {
            engine.mark_set(ExerciseId::new(2)).await.unwrap();
        }
        assert_eq!(engine.overall_progress(), 60);

        let first = engine.finish_full().await.unwrap();
        let second = engine.finish_full().await.unwrap();
        assert_eq!(first.state, CompletionState::FinishedFull);
        assert_eq!(first.overall_progress, 100);
        assert!(first.celebration.is_some());
        assert!(second.synthesis.is_none());
        assert!(second.celebration.is_none());
        assert_eq!(engine.completed_sets(ExerciseId::new(1)), 4);
        assert_eq!(engine.completed_sets(ExerciseId::new(2)), 6);
        assert_eq!(backend.records.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn partial_finish_below_floor_changes_nothing() {
        let (mut engine, backend, _) = engine();
        for _ in 0..2 {
            engine.mark_set(ExerciseId::new(2)).await.unwrap();
        }
        assert_eq!(engine.overall_progress(), 20);

        let err = engine.finish_partial().await.unwrap_err();
        assert!(matches!(err, EngineError::Validation { progress: 20, floor: 30 }));
        assert_eq!(engine.state(), CompletionState::InProgress);

        engine.mark_set(ExerciseId::new(2)).await.unwrap();
        let update = engine.finish_partial().await.unwrap();
        assert_eq!(update.state, CompletionState::FinishedPartial);
        assert!(update.celebration.is_none());
        let records = backend.records.lock().unwrap();
        assert_eq!(records[0].completion_percentage(), 30);
    }

    #[tokio::test]
    async fn rep_logs_feed_set_records_and_are_cleared() {
        let (mut engine, backend, repo) = engine();
        engine.log_reps(ExerciseId::new(1), 1, Some(11)).unwrap();
        engine.mark_all_sets(ExerciseId::new(1)).await.unwrap();
        engine.mark_all_sets(ExerciseId::new(2)).await.unwrap();

        let sets = backend.sets.lock().unwrap().clone();
        let first: Vec<_> = sets
            .iter()
            .filter(|s| s.exercise_id == ExerciseId::new(1))
            .map(|s| s.performed_reps.as_str())
            .collect();
        assert_eq!(first, ["11", "12", "12", "12"]);
        assert_eq!(engine.reps_for(ExerciseId::new(1), 1), None);

        engine.close().await;
        assert!(!repo.keys().iter().any(|k| k.as_str().starts_with("workout.reps.")));
        assert!(!repo.keys().iter().any(|k| k.as_str().starts_with("workout.lock.")));
    }

    #[tokio::test]
    async fn reset_clears_progress_and_lock() {
        let (mut engine, _, repo) = engine();
        engine.mark_set(ExerciseId::new(1)).await.unwrap();
        let update = engine.reset_all();
        assert_eq!(update.state, CompletionState::NotStarted);
        assert_eq!(update.overall_progress, 0);
        assert!(engine.started_at().is_none());

        engine.close().await;
        assert!(repo.keys().is_empty());
    }

    #[tokio::test]
    async fn filing_leaves_a_marker_that_reset_clears() {
        let (mut engine, _, repo) = engine();
        engine.mark_all_sets(ExerciseId::new(1)).await.unwrap();
        engine.mark_all_sets(ExerciseId::new(2)).await.unwrap();
        engine.writes.flush().await;
        assert!(
            repo.keys()
                .iter()
                .any(|k| k.as_str() == "workout.filed.1.2")
        );

        engine.reset_all();
        engine.close().await;
        assert!(repo.keys().is_empty());
    }

    #[tokio::test]
    async fn cancel_finish_returns_to_in_progress() {
        let (mut engine, _, _) = engine();
        engine.mark_set(ExerciseId::new(1)).await.unwrap();
        let update = engine.request_finish().await.unwrap();
        assert_eq!(update.state, CompletionState::AwaitingFinishChoice);
        assert_eq!(engine.cancel_finish().unwrap(), CompletionState::InProgress);
    }
}
