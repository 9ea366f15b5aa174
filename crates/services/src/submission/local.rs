use std::sync::Arc;

use async_trait::async_trait;
use storage::repository::SessionHistoryRepository;
use workout_core::model::{SessionRecord, SessionRecordId, SessionSetRecord};

use super::SubmissionBackend;
use crate::error::SubmissionError;

/// Files session history into the local history repository.
#[derive(Clone)]
pub struct LocalSubmissionBackend {
    history: Arc<dyn SessionHistoryRepository>,
}

impl LocalSubmissionBackend {
    #[must_use]
    pub fn new(history: Arc<dyn SessionHistoryRepository>) -> Self {
        Self { history }
    }
}

#[async_trait]
impl SubmissionBackend for LocalSubmissionBackend {
    async fn create_session_record(
        &self,
        record: &SessionRecord,
    ) -> Result<SessionRecordId, SubmissionError> {
        Ok(self.history.append_record(record).await?)
    }

    async fn create_session_set_records(
        &self,
        _record_id: SessionRecordId,
        sets: &[SessionSetRecord],
    ) -> Result<(), SubmissionError> {
        Ok(self.history.append_set_records(sets).await?)
    }
}
