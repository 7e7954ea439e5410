//! Session store abstraction for Crumb.
//!
//! Provides the [`SessionStore`] trait that every storage backend
//! implements, the [`SessionRecord`] it persists, and a reference
//! in-memory backend.
//!
//! # Feature Flags
//!
//! - `memory` (default): [`MemoryStore`], backed by a concurrent hash map

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "memory")]
mod memory;

pub use error::StoreError;
#[cfg(feature = "memory")]
pub use memory::MemoryStore;

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One persisted session.
///
/// `payload` belongs to the application; the store only cares about `id`
/// (the unique key) and `expires_at`.
///
/// The serde layout is the backend-agnostic record format:
/// `{ "id": "...", "expires_at": "<RFC 3339 UTC>", "payload": ... }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord<P> {
    /// The session token. Unique within a store.
    pub id: String,
    /// Absolute UTC instant after which the session is no longer valid.
    pub expires_at: DateTime<Utc>,
    /// Application data.
    pub payload: P,
}

impl<P> SessionRecord<P> {
    /// Creates a record.
    pub fn new(id: impl Into<String>, expires_at: DateTime<Utc>, payload: P) -> Self {
        Self {
            id: id.into(),
            expires_at,
            payload,
        }
    }

    /// Returns `true` if the record is past its expiry at `now`.
    ///
    /// A record expiring exactly at `now` counts as expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Persists session records.
///
/// Each method must be atomic on its own and safe to call from many
/// tasks at once. Backends own their connections; callers never see them.
///
/// # Trait bounds
///
/// - `Send + Sync` → the store is shared between request handlers and the
///   reaper task.
/// - `'static` → it lives as long as the session manager.
///
/// # Example
///
/// ```rust
/// use chrono::{DateTime, Utc};
/// use crumb_store::{SessionRecord, SessionStore, StoreError};
///
/// /// A store that never holds anything. Every lookup misses.
/// struct NullStore;
///
/// impl SessionStore<String> for NullStore {
///     async fn get(&self, _id: &str) -> Result<Option<SessionRecord<String>>, StoreError> {
///         Ok(None)
///     }
///     async fn set(&self, _record: SessionRecord<String>) -> Result<(), StoreError> {
///         Ok(())
///     }
///     async fn remove(&self, _id: &str) -> Result<bool, StoreError> {
///         Ok(false)
///     }
///     async fn remove_expired(&self, _now: DateTime<Utc>) -> Result<usize, StoreError> {
///         Ok(0)
///     }
/// }
/// ```
pub trait SessionStore<P>: Send + Sync + 'static {
    /// Looks up the record for `id`, expired or not.
    fn get(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<SessionRecord<P>>, StoreError>> + Send;

    /// Inserts the record, replacing any record with the same `id`.
    fn set(
        &self,
        record: SessionRecord<P>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Removes the record for `id`.
    ///
    /// Returns `true` iff a record existed and was removed.
    fn remove(&self, id: &str) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Removes every record with `expires_at <= now` and returns how many
    /// went away.
    ///
    /// May be a best-effort batch; it doesn't have to be atomic with
    /// concurrent `get`/`set` calls on other keys.
    fn remove_expired(
        &self,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<usize, StoreError>> + Send;
}

/// A shared store is still a store, so one backend can be handed to the
/// session manager and kept for inspection at the same time.
impl<P, S> SessionStore<P> for Arc<S>
where
    S: SessionStore<P>,
{
    fn get(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<SessionRecord<P>>, StoreError>> + Send {
        (**self).get(id)
    }

    fn set(
        &self,
        record: SessionRecord<P>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        (**self).set(record)
    }

    fn remove(&self, id: &str) -> impl Future<Output = Result<bool, StoreError>> + Send {
        (**self).remove(id)
    }

    fn remove_expired(
        &self,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<usize, StoreError>> + Send {
        (**self).remove_expired(now)
    }
}
