//! Tracking of clients the mover placed in the holding channel.
//!
//! An entry `client -> origin` exists iff the mover believes the client sits
//! in the holding channel because of an automated move. Entries are added by
//! a successful move to holding and removed by a successful move back, a
//! fallback move, or a disconnect. The worker holds the lock for the whole
//! of each per-client step, so a disconnect can never interleave between a
//! move and the entry update that records it.

use std::collections::{BTreeMap, HashMap};

use idlemover_id::{ChannelId, ClientId};
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};

/// Tracking consistency errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TrackingError {
    /// Tried to release a client that has no entry.
    #[error("client {0} is not tracked")]
    NotTracked(ClientId),
}

/// Store of tracked clients, shared between the worker and the disconnect
/// handler.
#[derive(Debug, Default)]
pub struct TrackingStore {
    entries: Mutex<HashMap<ClientId, ChannelId>>,
}

impl TrackingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exclusive access for one reconciliation step.
    pub(crate) async fn lock(&self) -> TrackingGuard<'_> {
        TrackingGuard {
            entries: self.entries.lock().await,
        }
    }

    /// Drop the entry of a client that disconnected.
    pub async fn forget(&self, client: ClientId) -> Option<ChannelId> {
        self.entries.lock().await.remove(&client)
    }

    /// Origin recorded for a client.
    pub async fn origin(&self, client: ClientId) -> Option<ChannelId> {
        self.entries.lock().await.get(&client).copied()
    }

    /// Sorted copy of all entries, for diagnostics.
    pub async fn snapshot(&self) -> BTreeMap<ClientId, ChannelId> {
        self.entries
            .lock()
            .await
            .iter()
            .map(|(k, v)| (*k, *v))
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Drop every entry. Returns how many were dropped.
    pub(crate) async fn clear(&self) -> usize {
        let mut entries = self.entries.lock().await;
        let count = entries.len();
        entries.clear();
        count
    }
}

/// Locked view of the store.
pub(crate) struct TrackingGuard<'a> {
    entries: MutexGuard<'a, HashMap<ClientId, ChannelId>>,
}

impl TrackingGuard<'_> {
    pub(crate) fn origin(&self, client: ClientId) -> Option<ChannelId> {
        self.entries.get(&client).copied()
    }

    /// Record (or overwrite) the origin of a client moved to holding.
    pub(crate) fn record(&mut self, client: ClientId, origin: ChannelId) -> Option<ChannelId> {
        self.entries.insert(client, origin)
    }

    /// Remove the entry of a client that left holding.
    pub(crate) fn release(&mut self, client: ClientId) -> Result<ChannelId, TrackingError> {
        self.entries
            .remove(&client)
            .ok_or(TrackingError::NotTracked(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_record_and_release() {
        let store = TrackingStore::new();
        let alice = ClientId::new(1);

        {
            let mut guard = store.lock().await;
            assert_eq!(guard.record(alice, ChannelId::new(10)), None);
            assert_eq!(guard.record(alice, ChannelId::new(11)), Some(ChannelId::new(10)));
            assert_eq!(guard.origin(alice), Some(ChannelId::new(11)));
        }

        let mut guard = store.lock().await;
        assert_eq!(guard.release(alice), Ok(ChannelId::new(11)));
        assert_eq!(guard.release(alice), Err(TrackingError::NotTracked(alice)));
    }

    #[tokio::test]
    async fn test_forget_and_clear() {
        let store = TrackingStore::new();
        {
            let mut guard = store.lock().await;
            guard.record(ClientId::new(1), ChannelId::new(10));
            guard.record(ClientId::new(2), ChannelId::new(20));
        }

        assert_eq!(store.forget(ClientId::new(1)).await, Some(ChannelId::new(10)));
        assert_eq!(store.forget(ClientId::new(1)).await, None);
        assert_eq!(store.len().await, 1);

        assert_eq!(store.clear().await, 1);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_forget_waits_for_step() {
        let store = Arc::new(TrackingStore::new());
        let alice = ClientId::new(1);

        let mut guard = store.lock().await;
        let forget = tokio::spawn({
            let store = Arc::clone(&store);
            async move { store.forget(alice).await }
        });

        // Disconnect arrives while a move is in flight; it must observe the
        // entry the move records.
        tokio::time::sleep(Duration::from_millis(20)).await;
        guard.record(alice, ChannelId::new(10));
        drop(guard);

        assert_eq!(forget.await.unwrap(), Some(ChannelId::new(10)));
        assert!(store.is_empty().await);
    }
}
