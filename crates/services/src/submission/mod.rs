//! Remote side of session completion: where finished sessions are filed.

mod http;
mod local;

use async_trait::async_trait;
use workout_core::model::{SessionRecord, SessionRecordId, SessionSetRecord};

use crate::error::SubmissionError;

pub use http::{HttpSubmissionBackend, HttpSubmissionConfig};
pub use local::LocalSubmissionBackend;

/// Accepts finished-session history.
#[async_trait]
pub trait SubmissionBackend: Send + Sync {
    /// Create the session record and return the id the backend assigned.
    ///
    /// # Errors
    ///
    /// Returns `SubmissionError` if the record was not created.
    async fn create_session_record(
        &self,
        record: &SessionRecord,
    ) -> Result<SessionRecordId, SubmissionError>;

    /// File every set record of a session in one bulk call.
    ///
    /// # Errors
    ///
    /// Returns `SubmissionError` if the batch was not accepted.
    async fn create_session_set_records(
        &self,
        record_id: SessionRecordId,
        sets: &[SessionSetRecord],
    ) -> Result<(), SubmissionError>;
}
