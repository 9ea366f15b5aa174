use workout_core::model::SessionRecordId;

use crate::error::EngineError;

/// Lowest overall progress at which a day may be finished without marking
/// the remaining sets.
pub const PARTIAL_FINISH_FLOOR: u8 = 30;

/// Lifecycle of one day's session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompletionState {
    NotStarted,
    InProgress,
    AwaitingFinishChoice,
    FinishedPartial,
    FinishedFull,
}

impl CompletionState {
    #[must_use]
    pub fn is_finished(self) -> bool {
        matches!(self, Self::FinishedPartial | Self::FinishedFull)
    }

    fn finish_mode(self) -> Option<FinishMode> {
        match self {
            Self::FinishedPartial => Some(FinishMode::Partial),
            Self::FinishedFull => Some(FinishMode::Full),
            _ => None,
        }
    }
}

/// How the user chose to close a day that was not yet at 100%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FinishMode {
    /// Keep current progress; needs at least `PARTIAL_FINISH_FLOOR` percent.
    Partial,
    /// Mark every remaining set and finish at 100%.
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SynthesisGuard {
    Armed,
    InFlight,
    Submitted,
}

/// Side effects the engine owes after a coordinator step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Transition {
    /// A finished state was entered, or re-requested while its record is
    /// still unfiled.
    pub finished: Option<FinishMode>,
    /// First time this session reached `FinishedFull`.
    pub celebrate: bool,
    /// The synthesis guard is armed; the engine should file the record.
    pub synthesize: bool,
}

/// State machine for a session plus its two one-shot guards.
///
/// `completion_fired` keeps celebration effects to once per session. The
/// synthesis guard keeps the session record to one submission: it is taken
/// when synthesis starts and re-armed only by a failed or skipped
/// submission, or by `reset`.
#[derive(Debug, Clone)]
pub struct CompletionCoordinator {
    state: CompletionState,
    completion_fired: bool,
    guard: SynthesisGuard,
    record_id: Option<SessionRecordId>,
}

impl Default for CompletionCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionCoordinator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: CompletionState::NotStarted,
            completion_fired: false,
            guard: SynthesisGuard::Armed,
            record_id: None,
        }
    }

    /// Rebuild the coordinator for a day loaded from the store.
    ///
    /// Only a filed record id makes a day load as finished, with the guard
    /// spent. Otherwise a day with a lock or any progress is open.
    #[must_use]
    pub fn restored(progress: u8, open: bool, filed: Option<SessionRecordId>) -> Self {
        let mut coordinator = Self::new();
        if let Some(record_id) = filed {
            coordinator.state = if progress >= 100 {
                CompletionState::FinishedFull
            } else {
                CompletionState::FinishedPartial
            };
            coordinator.completion_fired = true;
            coordinator.guard = SynthesisGuard::Submitted;
            coordinator.record_id = Some(record_id);
        } else if open {
            coordinator.state = CompletionState::InProgress;
            coordinator.completion_fired = progress >= 100;
        }
        coordinator
    }

    #[must_use]
    pub fn state(&self) -> CompletionState {
        self.state
    }

    #[must_use]
    pub fn record_id(&self) -> Option<SessionRecordId> {
        self.record_id
    }

    /// # Errors
    ///
    /// Returns `EngineError::SessionFinished` once the day is finished.
    pub fn ensure_mutable(&self) -> Result<(), EngineError> {
        if self.state.is_finished() {
            return Err(EngineError::SessionFinished);
        }
        Ok(())
    }

    /// Apply the effect of a set mutation given the new overall progress.
    pub fn after_mutation(&mut self, progress: u8) -> Transition {
        if self.state.is_finished() {
            return Transition::default();
        }
        if self.state != CompletionState::InProgress {
            tracing::debug!(from = ?self.state, "session in progress");
        }
        self.state = CompletionState::InProgress;
        if progress >= 100 {
            return self.enter_finished(FinishMode::Full);
        }
        Transition::default()
    }

    /// The user asked to finish the day.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::NotStarted` before the first set is marked.
    pub fn request_finish(&mut self, progress: u8) -> Result<Transition, EngineError> {
        match self.state {
            CompletionState::NotStarted => Err(EngineError::NotStarted),
            CompletionState::InProgress if progress >= 100 => {
                Ok(self.enter_finished(FinishMode::Full))
            }
            CompletionState::InProgress => {
                self.state = CompletionState::AwaitingFinishChoice;
                tracing::debug!(progress, "awaiting finish choice");
                Ok(Transition::default())
            }
            CompletionState::AwaitingFinishChoice => Ok(Transition::default()),
            CompletionState::FinishedPartial | CompletionState::FinishedFull => Ok(self.retry()),
        }
    }

    /// Resolve a pending finish choice.
    ///
    /// For `FinishMode::Full` the caller marks every set before calling, so
    /// `progress` is already 100.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Validation` for a partial finish below
    /// `PARTIAL_FINISH_FLOOR` (state is left unchanged) and
    /// `EngineError::NotAwaitingChoice` when no choice is pending.
    pub fn choose_finish_mode(
        &mut self,
        mode: FinishMode,
        progress: u8,
    ) -> Result<Transition, EngineError> {
        match self.state {
            CompletionState::AwaitingFinishChoice => {
                if mode == FinishMode::Partial && progress < PARTIAL_FINISH_FLOOR {
                    return Err(EngineError::Validation {
                        progress,
                        floor: PARTIAL_FINISH_FLOOR,
                    });
                }
                Ok(self.enter_finished(mode))
            }
            CompletionState::FinishedPartial | CompletionState::FinishedFull => Ok(self.retry()),
            _ => Err(EngineError::NotAwaitingChoice),
        }
    }

    /// # Errors
    ///
    /// Returns `EngineError::NotAwaitingChoice` when no choice is pending.
    pub fn cancel_finish(&mut self) -> Result<(), EngineError> {
        if self.state != CompletionState::AwaitingFinishChoice {
            return Err(EngineError::NotAwaitingChoice);
        }
        self.state = CompletionState::InProgress;
        Ok(())
    }

    /// Take the synthesis guard. Returns false if a submission is running
    /// or already succeeded.
    pub fn begin_synthesis(&mut self) -> bool {
        if self.guard != SynthesisGuard::Armed {
            return false;
        }
        self.guard = SynthesisGuard::InFlight;
        true
    }

    pub fn synthesis_succeeded(&mut self, record_id: SessionRecordId) {
        self.guard = SynthesisGuard::Submitted;
        self.record_id = Some(record_id);
    }

    /// Re-arm the guard after a submission that did not produce a record.
    pub fn synthesis_rearmed(&mut self) {
        if self.guard == SynthesisGuard::InFlight {
            self.guard = SynthesisGuard::Armed;
        }
    }

    pub fn reset(&mut self) {
        tracing::debug!(from = ?self.state, "session reset");
        *self = Self::new();
    }

    fn enter_finished(&mut self, mode: FinishMode) -> Transition {
        self.state = match mode {
            FinishMode::Partial => CompletionState::FinishedPartial,
            FinishMode::Full => CompletionState::FinishedFull,
        };
        tracing::debug!(state = ?self.state, "session finished");
        let celebrate = mode == FinishMode::Full && !self.completion_fired;
        if celebrate {
            self.completion_fired = true;
        }
        Transition {
            finished: Some(mode),
            celebrate,
            synthesize: self.guard == SynthesisGuard::Armed,
        }
    }

    fn retry(&self) -> Transition {
        Transition {
            finished: self.state.finish_mode(),
            celebrate: false,
            synthesize: self.guard == SynthesisGuard::Armed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn in_progress() -> CompletionCoordinator {
        let mut c = CompletionCoordinator::new();
        c.after_mutation(10);
        c
    }

    #[test]
    fn first_mutation_starts_session() {
        let c = in_progress();
        assert_eq!(c.state(), CompletionState::InProgress);
    }

    #[test]
    fn reaching_100_finishes_and_celebrates_once() {
        let mut c = in_progress();
        let t = c.after_mutation(100);
        assert_eq!(c.state(), CompletionState::FinishedFull);
        assert!(t.celebrate);
        assert!(t.synthesize);

        assert!(c.begin_synthesis());
        c.synthesis_succeeded(SessionRecordId::new(1));
        let again = c.request_finish(100).unwrap();
        assert!(!again.celebrate);
        assert!(!again.synthesize);
    }

    #[test]
    fn partial_floor_boundary() {
        let mut c = in_progress();
        c.request_finish(29).unwrap();
        let err = c.choose_finish_mode(FinishMode::Partial, 29).unwrap_err();
        assert!(matches!(err, EngineError::Validation { progress: 29, floor: 30 }));
        assert_eq!(c.state(), CompletionState::AwaitingFinishChoice);

        let t = c.choose_finish_mode(FinishMode::Partial, 30).unwrap();
        assert_eq!(c.state(), CompletionState::FinishedPartial);
        assert_eq!(t.finished, Some(FinishMode::Partial));
        assert!(!t.celebrate);
        assert!(t.synthesize);
    }

    #[test]
    fn request_finish_requires_a_started_session() {
        let mut c = CompletionCoordinator::new();
        assert!(matches!(c.request_finish(0), Err(EngineError::NotStarted)));
        assert!(matches!(
            c.choose_finish_mode(FinishMode::Full, 0),
            Err(EngineError::NotAwaitingChoice)
        ));
    }

    #[test]
    fn failed_synthesis_rearms_guard_for_retry() {
        let mut c = in_progress();
        c.after_mutation(100);
        assert!(c.begin_synthesis());
        assert!(!c.begin_synthesis());
        c.synthesis_rearmed();

        let retry = c.request_finish(100).unwrap();
        assert_eq!(retry.finished, Some(FinishMode::Full));
        assert!(retry.synthesize);
        assert!(c.begin_synthesis());
    }

    #[test]
    fn mutation_while_awaiting_returns_to_in_progress() {
        let mut c = in_progress();
        c.request_finish(50).unwrap();
        c.after_mutation(60);
        assert_eq!(c.state(), CompletionState::InProgress);
    }

    #[test]
    fn cancel_only_from_awaiting() {
        let mut c = in_progress();
        assert!(c.cancel_finish().is_err());
        c.request_finish(50).unwrap();
        c.cancel_finish().unwrap();
        assert_eq!(c.state(), CompletionState::InProgress);
    }

    #[test]
    fn finished_sessions_reject_mutations_until_reset() {
        let mut c = in_progress();
        c.after_mutation(100);
        assert!(matches!(c.ensure_mutable(), Err(EngineError::SessionFinished)));
        c.reset();
        assert_eq!(c.state(), CompletionState::NotStarted);
        assert!(c.ensure_mutable().is_ok());
        let t = c.after_mutation(100);
        assert!(t.celebrate);
    }

    #[test]
    fn restored_states() {
        assert_eq!(
            CompletionCoordinator::restored(0, false, None).state(),
            CompletionState::NotStarted
        );
        let mut open = CompletionCoordinator::restored(40, true, None);
        assert_eq!(open.state(), CompletionState::InProgress);
        assert_eq!(open.record_id(), None);
        assert!(open.begin_synthesis());

        let mut filed = CompletionCoordinator::restored(40, true, Some(SessionRecordId::new(3)));
        assert_eq!(filed.state(), CompletionState::FinishedPartial);
        assert_eq!(filed.record_id(), Some(SessionRecordId::new(3)));
        assert!(!filed.begin_synthesis());
        assert!(!filed.request_finish(40).unwrap().synthesize);
    }
}
