use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use storage::StoreKey;
use storage::repository::{SessionStore, SessionStoreExt};
use workout_core::model::{DayNumber, SessionLock, SessionRecordId, TemplateId};

use crate::persistence::WriteQueue;

/// Keeps at most one day of each routine template in progress.
///
/// A lock is taken transparently on the first set mutation of a day and
/// released on reset or once the session record has been filed. Its
/// `started_at` is the session start time used for the record.
///
/// Filing also leaves a marker holding the record id, so a reloaded day
/// can tell a filed session from one whose lock write was lost.
pub struct SessionLockManager {
    store: Arc<dyn SessionStore>,
    writes: WriteQueue,
    held: HashMap<(TemplateId, DayNumber), SessionLock>,
}

impl SessionLockManager {
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>, writes: WriteQueue) -> Self {
        Self {
            store,
            writes,
            held: HashMap::new(),
        }
    }

    /// Cache the start time for `(template_id, day_number)` unless one is
    /// already held, and return the effective start time.
    pub fn acquire_on_first_mutation(
        &mut self,
        template_id: TemplateId,
        day_number: DayNumber,
        now: DateTime<Utc>,
    ) -> DateTime<Utc> {
        if let Some(lock) = self.held.get(&(template_id, day_number)) {
            return lock.started_at;
        }
        let lock = SessionLock::new(template_id, day_number, now);
        tracing::info!(%template_id, %day_number, "session lock acquired");
        self.writes
            .set_json(StoreKey::session_lock(template_id, day_number), &lock);
        self.held.insert((template_id, day_number), lock);
        now
    }

    #[must_use]
    pub fn started_at(&self, template_id: TemplateId, day_number: DayNumber) -> Option<DateTime<Utc>> {
        self.held
            .get(&(template_id, day_number))
            .map(|lock| lock.started_at)
    }

    /// Find a day of `template_id`, other than `requested`, that holds a lock.
    ///
    /// Pending lock writes are flushed first so the scan sees them. Locks
    /// that cannot be read are treated as absent.
    pub async fn find_conflict(
        &self,
        template_id: TemplateId,
        requested: DayNumber,
    ) -> Option<DayNumber> {
        if let Some(((_, day), _)) = self
            .held
            .iter()
            .find(|((template, day), _)| *template == template_id && *day != requested)
        {
            return Some(*day);
        }

        self.writes.flush().await;
        for day in DayNumber::all().filter(|day| *day != requested) {
            if self.read(template_id, day).await.is_some() {
                return Some(day);
            }
        }
        None
    }

    /// Read the persisted lock for a day into the cache.
    pub async fn load(
        &mut self,
        template_id: TemplateId,
        day_number: DayNumber,
    ) -> Option<SessionLock> {
        let lock = self.read(template_id, day_number).await?;
        self.held.insert((template_id, day_number), lock);
        Some(lock)
    }

    /// Drop the lock for a day, in memory and in the store.
    pub fn release(&mut self, template_id: TemplateId, day_number: DayNumber) {
        if self.held.remove(&(template_id, day_number)).is_some() {
            tracing::info!(%template_id, %day_number, "session lock released");
        }
        self.writes
            .remove(StoreKey::session_lock(template_id, day_number));
    }

    /// Remember that the day's session was filed as `record_id`.
    pub fn record_filed(
        &self,
        template_id: TemplateId,
        day_number: DayNumber,
        record_id: SessionRecordId,
    ) {
        self.writes
            .set_json(StoreKey::filed_record(template_id, day_number), &record_id);
    }

    pub fn clear_filed(&self, template_id: TemplateId, day_number: DayNumber) {
        self.writes
            .remove(StoreKey::filed_record(template_id, day_number));
    }

    /// Record id filed for a day. An unreadable marker counts as absent.
    pub async fn load_filed(
        &self,
        template_id: TemplateId,
        day_number: DayNumber,
    ) -> Option<SessionRecordId> {
        self.read_key(&StoreKey::filed_record(template_id, day_number))
            .await
    }

    async fn read(&self, template_id: TemplateId, day_number: DayNumber) -> Option<SessionLock> {
        self.read_key(&StoreKey::session_lock(template_id, day_number))
            .await
    }

    async fn read_key<T: DeserializeOwned + Send>(&self, key: &StoreKey) -> Option<T> {
        match self.store.get_json::<T>(key).await {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(%key, error = %err, "unreadable session key treated as absent");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::repository::InMemoryRepository;
    use workout_core::time::fixed_now;

    fn day(n: u8) -> DayNumber {
        DayNumber::new(n).unwrap()
    }

    fn manager() -> (SessionLockManager, InMemoryRepository) {
        let repo = InMemoryRepository::new();
        let store: Arc<dyn SessionStore> = Arc::new(repo.clone());
        let writes = WriteQueue::spawn(Arc::clone(&store));
        (SessionLockManager::new(store, writes), repo)
    }

    #[tokio::test]
    async fn first_acquire_wins() {
        let (mut locks, _) = manager();
        let template = TemplateId::new(1);
        let first = locks.acquire_on_first_mutation(template, day(2), fixed_now());
        let later = fixed_now() + chrono::Duration::minutes(10);
        let second = locks.acquire_on_first_mutation(template, day(2), later);
        assert_eq!(first, second);
        assert_eq!(locks.started_at(template, day(2)), Some(fixed_now()));
    }

    #[tokio::test]
    async fn lock_excludes_every_other_day_until_released() {
        let (mut locks, _) = manager();
        let template = TemplateId::new(1);
        locks.acquire_on_first_mutation(template, day(3), fixed_now());

        for other in DayNumber::all().filter(|d| *d != day(3)) {
            assert_eq!(locks.find_conflict(template, other).await, Some(day(3)));
        }
        assert_eq!(locks.find_conflict(template, day(3)).await, None);
        assert_eq!(locks.find_conflict(TemplateId::new(2), day(1)).await, None);

        locks.release(template, day(3));
        for other in DayNumber::all() {
            assert_eq!(locks.find_conflict(template, other).await, None);
        }
    }

    #[tokio::test]
    async fn conflict_is_seen_by_a_fresh_manager() {
        let repo = InMemoryRepository::new();
        let store: Arc<dyn SessionStore> = Arc::new(repo.clone());
        let writes = WriteQueue::spawn(Arc::clone(&store));
        let template = TemplateId::new(5);

        let mut first = SessionLockManager::new(Arc::clone(&store), writes.clone());
        first.acquire_on_first_mutation(template, day(1), fixed_now());

        let second = SessionLockManager::new(store, writes);
        assert_eq!(second.find_conflict(template, day(4)).await, Some(day(1)));
    }

    #[tokio::test]
    async fn garbage_lock_is_treated_as_absent() {
        let (mut locks, repo) = manager();
        let template = TemplateId::new(1);
        repo.set(&StoreKey::session_lock(template, day(6)), "{broken")
            .await
            .unwrap();
        assert_eq!(locks.find_conflict(template, day(1)).await, None);
        assert!(locks.load(template, day(6)).await.is_none());
    }

    #[tokio::test]
    async fn filed_marker_round_trips_until_cleared() {
        let (locks, repo) = manager();
        let template = TemplateId::new(1);
        locks.record_filed(template, day(2), SessionRecordId::new(44));
        locks.writes.flush().await;
        assert_eq!(
            locks.load_filed(template, day(2)).await,
            Some(SessionRecordId::new(44))
        );
        assert_eq!(locks.load_filed(template, day(3)).await, None);

        locks.clear_filed(template, day(2));
        locks.writes.flush().await;
        assert_eq!(locks.load_filed(template, day(2)).await, None);
        assert!(repo.keys().is_empty());
    }
}
