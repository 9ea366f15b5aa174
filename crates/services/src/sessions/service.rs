use std::sync::Arc;

use storage::repository::{ExerciseCatalog, SessionStore};
use workout_core::Clock;
use workout_core::model::{DayNumber, TemplateId, UserId};

use super::engine::SessionEngine;
use super::lock::SessionLockManager;
use crate::error::EngineError;
use crate::persistence::WriteQueue;
use crate::submission::SubmissionBackend;

/// Entry point for the UI: loads days into `SessionEngine`s.
///
/// Owns the shared write queue so every engine it builds writes through one
/// ordered channel.
#[derive(Clone)]
pub struct WorkoutSessionService {
    clock: Clock,
    catalog: Arc<dyn ExerciseCatalog>,
    store: Arc<dyn SessionStore>,
    backend: Arc<dyn SubmissionBackend>,
    writes: WriteQueue,
    user_id: Option<UserId>,
}

impl WorkoutSessionService {
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn new(
        clock: Clock,
        catalog: Arc<dyn ExerciseCatalog>,
        store: Arc<dyn SessionStore>,
        backend: Arc<dyn SubmissionBackend>,
    ) -> Self {
        let writes = WriteQueue::spawn(Arc::clone(&store));
        Self {
            clock,
            catalog,
            store,
            backend,
            writes,
            user_id: None,
        }
    }

    /// Attribute filed session records to `user_id`. Without a user, finished
    /// sessions are not filed.
    #[must_use]
    pub fn with_user(mut self, user_id: Option<UserId>) -> Self {
        self.user_id = user_id;
        self
    }

    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    /// Day of `template_id`, other than `requested`, that holds the lock.
    pub async fn find_conflict(
        &self,
        template_id: TemplateId,
        requested: DayNumber,
    ) -> Option<DayNumber> {
        SessionLockManager::new(Arc::clone(&self.store), self.writes.clone())
            .find_conflict(template_id, requested)
            .await
    }

    /// Load a day and rebuild its live session from the store.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::LockConflict` when another day of the template is
    /// in progress, and `EngineError::Catalog` when the day plan cannot be
    /// read. Unreadable session keys load as absent.
    pub async fn load_day(
        &self,
        template_id: TemplateId,
        day_number: DayNumber,
    ) -> Result<SessionEngine, EngineError> {
        if let Some(active) = self.find_conflict(template_id, day_number).await {
            tracing::info!(%template_id, requested = %day_number, %active, "day switch blocked");
            return Err(EngineError::LockConflict {
                template_id,
                requested: day_number,
                active,
            });
        }

        let plan = self
            .catalog
            .day_plan(template_id, day_number)
            .await
            .map_err(EngineError::Catalog)?;

        let mut engine = SessionEngine::new(
            plan,
            self.user_id,
            self.clock,
            Arc::clone(&self.store),
            Arc::clone(&self.backend),
            self.writes.clone(),
        );
        engine.restore(self.store.as_ref()).await;
        Ok(engine)
    }

    /// Wait for every queued store write.
    pub async fn flush(&self) {
        self.writes.flush().await;
    }
}
