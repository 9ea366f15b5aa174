use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use workout_core::model::{
    DayNumber, DayPlan, DayReference, ExerciseAssignment, SessionRecord, SessionRecordId,
    SessionSetRecord, TemplateId,
};

use crate::keys::StoreKey;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── SESSION STORE ────────────────────────────────────────────────────────────
//

/// Durable key/value store backing the live session state.
///
/// Values are opaque strings; typed access goes through `SessionStoreExt`.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Read the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read. A missing key is
    /// `Ok(None)`, not an error.
    async fn get(&self, key: &StoreKey) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the value cannot be written.
    async fn set(&self, key: &StoreKey, value: &str) -> Result<(), StorageError>;

    /// Delete `key`. Removing a missing key succeeds.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend rejects the delete.
    async fn remove(&self, key: &StoreKey) -> Result<(), StorageError>;
}

/// JSON helpers available on every `SessionStore`.
#[async_trait]
pub trait SessionStoreExt: SessionStore {
    /// Read and decode a JSON value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the stored text is not valid
    /// JSON for `T`, or any read error from the backend.
    async fn get_json<T>(&self, key: &StoreKey) -> Result<Option<T>, StorageError>
    where
        T: DeserializeOwned + Send,
    {
        let Some(raw) = self.get(key).await? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|err| StorageError::Serialization(err.to_string()))
    }

    /// Encode `value` as JSON and store it.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if encoding fails, or any write
    /// error from the backend.
    async fn set_json<T>(&self, key: &StoreKey, value: &T) -> Result<(), StorageError>
    where
        T: Serialize + Sync,
    {
        let raw =
            serde_json::to_string(value).map_err(|err| StorageError::Serialization(err.to_string()))?;
        self.set(key, &raw).await
    }
}

impl<S: SessionStore + ?Sized> SessionStoreExt for S {}

//
// ─── EXERCISE CATALOG ─────────────────────────────────────────────────────────
//

/// Read side of the routine catalog: what a given day prescribes.
#[async_trait]
pub trait ExerciseCatalog: Send + Sync {
    /// Fetch the ordered exercise list for one day of a template.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the template has no such day.
    async fn day_plan(
        &self,
        template_id: TemplateId,
        day_number: DayNumber,
    ) -> Result<DayPlan, StorageError>;

    /// Replace the stored plan for `(plan.template_id, plan.day_number)`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the plan cannot be stored.
    async fn upsert_day_plan(&self, plan: &DayPlan) -> Result<(), StorageError>;
}

//
// ─── SESSION HISTORY ──────────────────────────────────────────────────────────
//

/// Local store for finished-session history.
#[async_trait]
pub trait SessionHistoryRepository: Send + Sync {
    /// Append a session record and return its new id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn append_record(&self, record: &SessionRecord) -> Result<SessionRecordId, StorageError>;

    /// Append all set records for a session in one batch.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if a referenced session record is
    /// missing, or other storage errors. Nothing is stored on error.
    async fn append_set_records(&self, records: &[SessionSetRecord]) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_record(&self, id: SessionRecordId) -> Result<SessionRecord, StorageError>;

    /// Set records filed under a session, ordered by exercise then set index.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the records cannot be read.
    async fn list_set_records(
        &self,
        id: SessionRecordId,
    ) -> Result<Vec<SessionSetRecord>, StorageError>;
}

//
// ─── IN-MEMORY ────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone)]
struct StoredDay {
    day_reference: Option<DayReference>,
    exercises: Vec<ExerciseAssignment>,
}

#[derive(Default)]
struct HistoryState {
    next_id: i64,
    records: BTreeMap<SessionRecordId, SessionRecord>,
    sets: Vec<SessionSetRecord>,
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    values: Arc<Mutex<HashMap<StoreKey, String>>>,
    days: Arc<Mutex<HashMap<(TemplateId, DayNumber), StoredDay>>>,
    history: Arc<Mutex<HistoryState>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored key, for assertions in tests.
    #[must_use]
    pub fn keys(&self) -> Vec<StoreKey> {
        let mut keys: Vec<_> = self
            .values
            .lock()
            .map(|guard| guard.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

fn poisoned<E: ToString>(err: E) -> StorageError {
    StorageError::Connection(err.to_string())
}

#[async_trait]
impl SessionStore for InMemoryRepository {
    async fn get(&self, key: &StoreKey) -> Result<Option<String>, StorageError> {
        let guard = self.values.lock().map_err(poisoned)?;
        Ok(guard.get(key).cloned())
    }

    async fn set(&self, key: &StoreKey, value: &str) -> Result<(), StorageError> {
        let mut guard = self.values.lock().map_err(poisoned)?;
        guard.insert(key.clone(), value.to_owned());
        Ok(())
    }

    async fn remove(&self, key: &StoreKey) -> Result<(), StorageError> {
        let mut guard = self.values.lock().map_err(poisoned)?;
        guard.remove(key);
        Ok(())
    }
}

#[async_trait]
impl ExerciseCatalog for InMemoryRepository {
    async fn day_plan(
        &self,
        template_id: TemplateId,
        day_number: DayNumber,
    ) -> Result<DayPlan, StorageError> {
        let guard = self.days.lock().map_err(poisoned)?;
        let stored = guard
            .get(&(template_id, day_number))
            .ok_or(StorageError::NotFound)?;
        Ok(DayPlan {
            template_id,
            day_number,
            day_reference: stored.day_reference,
            exercises: stored.exercises.clone(),
        })
    }

    async fn upsert_day_plan(&self, plan: &DayPlan) -> Result<(), StorageError> {
        let mut guard = self.days.lock().map_err(poisoned)?;
        guard.insert(
            (plan.template_id, plan.day_number),
            StoredDay {
                day_reference: plan.day_reference,
                exercises: plan.exercises.clone(),
            },
        );
        Ok(())
    }
}

#[async_trait]
impl SessionHistoryRepository for InMemoryRepository {
    async fn append_record(&self, record: &SessionRecord) -> Result<SessionRecordId, StorageError> {
        let mut guard = self.history.lock().map_err(poisoned)?;
        guard.next_id += 1;
        let id = SessionRecordId::new(guard.next_id);
        guard.records.insert(id, record.clone());
        Ok(id)
    }

    async fn append_set_records(&self, records: &[SessionSetRecord]) -> Result<(), StorageError> {
        let mut guard = self.history.lock().map_err(poisoned)?;
        if records
            .iter()
            .any(|set| !guard.records.contains_key(&set.session_record_id))
        {
            return Err(StorageError::NotFound);
        }
        guard.sets.extend_from_slice(records);
        Ok(())
    }

    async fn get_record(&self, id: SessionRecordId) -> Result<SessionRecord, StorageError> {
        let guard = self.history.lock().map_err(poisoned)?;
        guard.records.get(&id).cloned().ok_or(StorageError::NotFound)
    }

    async fn list_set_records(
        &self,
        id: SessionRecordId,
    ) -> Result<Vec<SessionSetRecord>, StorageError> {
        let guard = self.history.lock().map_err(poisoned)?;
        let mut sets: Vec<_> = guard
            .sets
            .iter()
            .filter(|set| set.session_record_id == id)
            .cloned()
            .collect();
        sets.sort_by_key(|set| (set.exercise_id, set.set_index));
        Ok(sets)
    }
}

/// Aggregates the storage ports behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub store: Arc<dyn SessionStore>,
    pub catalog: Arc<dyn ExerciseCatalog>,
    pub history: Arc<dyn SessionHistoryRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let store: Arc<dyn SessionStore> = Arc::new(repo.clone());
        let catalog: Arc<dyn ExerciseCatalog> = Arc::new(repo.clone());
        let history: Arc<dyn SessionHistoryRepository> = Arc::new(repo);
        Self {
            store,
            catalog,
            history,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use workout_core::model::{ExerciseId, ExerciseProgress, UserId};
    use workout_core::time::fixed_now;

    fn day(n: u8) -> DayNumber {
        DayNumber::new(n).unwrap()
    }

    #[tokio::test]
    async fn json_round_trip_through_store() {
        let repo = InMemoryRepository::new();
        let key = StoreKey::progress(ExerciseId::new(1));
        let progress = ExerciseProgress::new(ExerciseId::new(1), 2, 4, fixed_now());

        repo.set_json(&key, &progress).await.unwrap();
        let back: Option<ExerciseProgress> = repo.get_json(&key).await.unwrap();
        assert_eq!(back, Some(progress));

        repo.remove(&key).await.unwrap();
        let gone: Option<ExerciseProgress> = repo.get_json(&key).await.unwrap();
        assert!(gone.is_none());
    }

    #[tokio::test]
    async fn get_json_reports_garbage_as_serialization_error() {
        let repo = InMemoryRepository::new();
        let key = StoreKey::progress(ExerciseId::new(1));
        repo.set(&key, "not json").await.unwrap();
        let err = repo.get_json::<ExerciseProgress>(&key).await.unwrap_err();
        assert!(matches!(err, StorageError::Serialization(_)));
    }

    #[tokio::test]
    async fn removing_missing_key_is_ok() {
        let repo = InMemoryRepository::new();
        repo.remove(&StoreKey::rep_log(ExerciseId::new(9)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn catalog_returns_stored_plan() {
        let repo = InMemoryRepository::new();
        let plan = DayPlan {
            template_id: TemplateId::new(1),
            day_number: day(2),
            day_reference: Some(DayReference::new(20)),
            exercises: vec![ExerciseAssignment::new(ExerciseId::new(5), day(2), 3, "12")],
        };
        repo.upsert_day_plan(&plan).await.unwrap();

        assert_eq!(repo.day_plan(TemplateId::new(1), day(2)).await.unwrap(), plan);
        assert!(matches!(
            repo.day_plan(TemplateId::new(1), day(3)).await,
            Err(StorageError::NotFound)
        ));
    }

    #[tokio::test]
    async fn set_records_require_parent_record() {
        let repo = InMemoryRepository::new();
        let orphan = SessionSetRecord {
            set_index: 1,
            performed_reps: "10".into(),
            session_record_id: SessionRecordId::new(99),
            exercise_id: ExerciseId::new(1),
        };
        assert!(matches!(
            repo.append_set_records(&[orphan]).await,
            Err(StorageError::NotFound)
        ));

        let record =
            SessionRecord::new(fixed_now(), fixed_now(), 100, UserId::new(1), DayReference::new(1))
                .unwrap();
        let id = repo.append_record(&record).await.unwrap();
        let set = SessionSetRecord {
            set_index: 1,
            performed_reps: "10".into(),
            session_record_id: id,
            exercise_id: ExerciseId::new(1),
        };
        repo.append_set_records(std::slice::from_ref(&set)).await.unwrap();
        assert_eq!(repo.list_set_records(id).await.unwrap(), vec![set]);
        assert_eq!(repo.get_record(id).await.unwrap(), record);
    }
}
