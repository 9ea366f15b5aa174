use std::sync::Arc;

use storage::repository::{ExerciseCatalog, SessionHistoryRepository, Storage};
use workout_core::model::UserId;

use crate::Clock;
use crate::error::AppServicesError;
use crate::sessions::WorkoutSessionService;
use crate::submission::{
    HttpSubmissionBackend, HttpSubmissionConfig, LocalSubmissionBackend, SubmissionBackend,
};

/// Assembles app-facing services over one `Storage`.
#[derive(Clone)]
pub struct AppServices {
    sessions: Arc<WorkoutSessionService>,
    catalog: Arc<dyn ExerciseCatalog>,
    history: Arc<dyn SessionHistoryRepository>,
    remote_submission: bool,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// Finished sessions go to the HTTP backend when `WORKOUT_API_URL` is
    /// set, otherwise to the local history tables.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        user_id: Option<UserId>,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(storage, clock, user_id))
    }

    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn from_storage(storage: Storage, clock: Clock, user_id: Option<UserId>) -> Self {
        let (backend, remote_submission): (Arc<dyn SubmissionBackend>, bool) =
            match HttpSubmissionConfig::from_env() {
                Some(config) => (Arc::new(HttpSubmissionBackend::new(Some(config))), true),
                None => (
                    Arc::new(LocalSubmissionBackend::new(Arc::clone(&storage.history))),
                    false,
                ),
            };
        tracing::debug!(remote_submission, "submission backend selected");

        let sessions = Arc::new(
            WorkoutSessionService::new(
                clock,
                Arc::clone(&storage.catalog),
                Arc::clone(&storage.store),
                backend,
            )
            .with_user(user_id),
        );

        Self {
            sessions,
            catalog: storage.catalog,
            history: storage.history,
            remote_submission,
        }
    }

    #[must_use]
    pub fn sessions(&self) -> Arc<WorkoutSessionService> {
        Arc::clone(&self.sessions)
    }

    #[must_use]
    pub fn catalog(&self) -> Arc<dyn ExerciseCatalog> {
        Arc::clone(&self.catalog)
    }

    #[must_use]
    pub fn history(&self) -> Arc<dyn SessionHistoryRepository> {
        Arc::clone(&self.history)
    }

    #[must_use]
    pub fn remote_submission(&self) -> bool {
        self.remote_submission
    }
}
