//! In-memory session store backed by `dashmap`.

use std::fmt;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::{SessionRecord, SessionStore, StoreError};

/// A [`SessionStore`] that keeps every record in a sharded concurrent map.
///
/// Nothing survives a restart. Good for tests, single-process services,
/// and as the reference for what other backends must do.
pub struct MemoryStore<P> {
    records: DashMap<String, SessionRecord<P>>,
}

impl<P> MemoryStore<P> {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    /// Number of records physically present, expired ones included.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<P> Default for MemoryStore<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> fmt::Debug for MemoryStore<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore")
            .field("records", &self.records.len())
            .finish()
    }
}

impl<P> SessionStore<P> for MemoryStore<P>
where
    P: Clone + Send + Sync + 'static,
{
    async fn get(&self, id: &str) -> Result<Option<SessionRecord<P>>, StoreError> {
        // Clone out so the shard lock is released before returning.
        Ok(self.records.get(id).map(|entry| entry.value().clone()))
    }

    async fn set(&self, record: SessionRecord<P>) -> Result<(), StoreError> {
        self.records.insert(record.id.clone(), record);
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.records.remove(id).is_some())
    }

    async fn remove_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut removed = 0;
        // `retain` locks one shard at a time, so requests touching other
        // shards keep going during a sweep.
        self.records.retain(|_, record| {
            if record.is_expired_at(now) {
                removed += 1;
                false
            } else {
                true
            }
        });
        tracing::trace!(removed, remaining = self.records.len(), "memory store swept");
        Ok(removed)
    }
}
