use std::env;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use workout_core::model::{SessionRecord, SessionRecordId, SessionSetRecord};

use super::SubmissionBackend;
use crate::error::SubmissionError;

#[derive(Clone, Debug)]
pub struct HttpSubmissionConfig {
    pub base_url: String,
    pub api_key: Option<String>,
}

impl HttpSubmissionConfig {
    /// Reads `WORKOUT_API_URL` and the optional `WORKOUT_API_KEY`.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let base_url = env::var("WORKOUT_API_URL").ok()?;
        if base_url.trim().is_empty() {
            return None;
        }
        let api_key = env::var("WORKOUT_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());
        Some(Self { base_url, api_key })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url.trim_end_matches('/'))
    }
}

/// Submits session history to a JSON HTTP API.
///
/// `POST {base}/session-records` returns `{"id": <i64>}`;
/// `POST {base}/session-records/{id}/sets` takes the bulk set list.
#[derive(Clone)]
pub struct HttpSubmissionBackend {
    client: Client,
    config: Option<HttpSubmissionConfig>,
}

impl HttpSubmissionBackend {
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(HttpSubmissionConfig::from_env())
    }

    #[must_use]
    pub fn new(config: Option<HttpSubmissionConfig>) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }

    async fn post<T: Serialize + Sync>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response, SubmissionError> {
        let config = self.config.as_ref().ok_or(SubmissionError::Disabled)?;
        let mut request = self.client.post(config.url(path)).json(body);
        if let Some(key) = &config.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(SubmissionError::HttpStatus(response.status()));
        }
        Ok(response)
    }
}

#[derive(Debug, Deserialize)]
struct CreatedRecord {
    id: i64,
}

#[derive(Debug, Serialize)]
struct SetBatch<'a> {
    session_record_id: SessionRecordId,
    sets: &'a [SessionSetRecord],
}

#[async_trait]
impl SubmissionBackend for HttpSubmissionBackend {
    async fn create_session_record(
        &self,
        record: &SessionRecord,
    ) -> Result<SessionRecordId, SubmissionError> {
        let response = self.post("session-records", record).await?;
        let created: CreatedRecord = response.json().await?;
        Ok(SessionRecordId::new(created.id))
    }

    async fn create_session_set_records(
        &self,
        record_id: SessionRecordId,
        sets: &[SessionSetRecord],
    ) -> Result<(), SubmissionError> {
        let batch = SetBatch {
            session_record_id: record_id,
            sets,
        };
        self.post(&format!("session-records/{record_id}/sets"), &batch)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use workout_core::model::{DayReference, UserId};
    use workout_core::time::fixed_now;

    #[test]
    fn url_joins_without_double_slash() {
        let config = HttpSubmissionConfig {
            base_url: "https://api.example.test/v1/".into(),
            api_key: None,
        };
        assert_eq!(
            config.url("session-records"),
            "https://api.example.test/v1/session-records"
        );
    }

    #[tokio::test]
    async fn unconfigured_backend_reports_disabled() {
        let backend = HttpSubmissionBackend::new(None);
        assert!(!backend.enabled());
        let record =
            SessionRecord::new(fixed_now(), fixed_now(), 100, UserId::new(1), DayReference::new(1))
                .unwrap();
        let err = backend.create_session_record(&record).await.unwrap_err();
        assert!(matches!(err, SubmissionError::Disabled));
    }
}
