//! Storage for parked events.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::entry::ParkedEvent;
use crate::error::Result;

/// Keyed storage for parked events.
///
/// Implementations must tolerate concurrent upserts and deletes, since
/// parking and dispatching run from different tasks.
#[async_trait]
pub trait ParkedEventStore: Send + Sync {
    /// Inserts or replaces the entry under its uuid, returning the replaced one.
    async fn upsert(&self, entry: ParkedEvent) -> Result<Option<ParkedEvent>>;

    /// Removes an entry. Returns false if nothing was parked under `uuid`.
    async fn delete(&self, uuid: &str) -> Result<bool>;

    /// Removes `entry` only if it is still the one parked under its uuid.
    ///
    /// Returns false if the uuid is free or holds a different entry.
    async fn delete_exact(&self, entry: &ParkedEvent) -> Result<bool>;

    async fn get(&self, uuid: &str) -> Result<Option<ParkedEvent>>;

    /// Entries whose expiry is at or before `now`, ordered by expiry then uuid.
    async fn list_expired(&self, now: DateTime<Utc>) -> Result<Vec<ParkedEvent>>;
}

/// In-memory parked event store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryParkedEventStore {
    entries: Arc<RwLock<HashMap<String, ParkedEvent>>>,
}

impl InMemoryParkedEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl ParkedEventStore for InMemoryParkedEventStore {
    async fn upsert(&self, entry: ParkedEvent) -> Result<Option<ParkedEvent>> {
        let mut entries = self.entries.write().await;
        Ok(entries.insert(entry.uuid.clone(), entry))
    }

    async fn delete(&self, uuid: &str) -> Result<bool> {
        let mut entries = self.entries.write().await;
        Ok(entries.remove(uuid).is_some())
    }

    async fn delete_exact(&self, entry: &ParkedEvent) -> Result<bool> {
        let mut entries = self.entries.write().await;
        if entries.get(&entry.uuid) != Some(entry) {
            return Ok(false);
        }
        entries.remove(&entry.uuid);
        Ok(true)
    }

    async fn get(&self, uuid: &str) -> Result<Option<ParkedEvent>> {
        let entries = self.entries.read().await;
        Ok(entries.get(uuid).cloned())
    }

    async fn list_expired(&self, now: DateTime<Utc>) -> Result<Vec<ParkedEvent>> {
        let entries = self.entries.read().await;
        let mut expired: Vec<ParkedEvent> = entries
            .values()
            .filter(|entry| entry.is_due(now))
            .cloned()
            .collect();
        expired.sort_by(|a, b| a.expiry.cmp(&b.expiry).then_with(|| a.uuid.cmp(&b.uuid)));
        Ok(expired)
    }
}
