//! Newest-first tick history, written through to a [`KeyValueStore`] on every
//! mutation.

use crate::model::tick::Tick;
use crate::storage::KeyValueStore;

pub const SNAPSHOT_KEY: &str = "stockfeed_messages";

pub struct TickBuffer<S: KeyValueStore> {
    ticks: Vec<Tick>,
    capacity: usize,
    store: S,
    persist_failures: u64,
}

impl<S: KeyValueStore> TickBuffer<S> {
    /// Rehydrate from `store`. Missing, unreadable or corrupt snapshots yield an
    /// empty buffer; startup never fails on bad persisted data.
    pub fn load(store: S, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut ticks = match store.get(SNAPSHOT_KEY) {
            Ok(Some(payload)) => match serde_json::from_str::<Vec<Tick>>(&payload) {
                Ok(ticks) => ticks,
                Err(e) => {
                    tracing::warn!(error = %e, "Discarding corrupt persisted tick snapshot");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read persisted tick snapshot");
                Vec::new()
            }
        };
        let stored = ticks.len();
        ticks.truncate(capacity);
        tracing::info!(restored = ticks.len(), capacity, "Tick buffer loaded");

        let mut buffer = Self {
            ticks,
            capacity,
            store,
            persist_failures: 0,
        };
        if stored > capacity {
            buffer.persist();
        }
        buffer
    }

    /// Prepend `tick`, evict from the tail past capacity, then persist.
    pub fn push(&mut self, mut tick: Tick) {
        if let Some(head) = self.ticks.first() {
            if tick.received_at < head.received_at {
                tick.received_at = head.received_at;
            }
        }
        self.ticks.insert(0, tick);
        self.ticks.truncate(self.capacity);
        self.persist();
    }

    pub fn clear(&mut self) {
        self.ticks.clear();
        if let Err(e) = self.store.remove(SNAPSHOT_KEY) {
            self.persist_failures += 1;
            tracing::warn!(error = %e, "Failed to erase persisted tick snapshot");
        }
    }

    pub fn snapshot(&self) -> &[Tick] {
        &self.ticks
    }

    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn persist_failures(&self) -> u64 {
        self.persist_failures
    }

    fn persist(&mut self) {
        let result = serde_json::to_string(&self.ticks)
            .map_err(|e| e.to_string())
            .and_then(|json| {
                self.store
                    .set(SNAPSHOT_KEY, &json)
                    .map_err(|e| e.to_string())
            });
        if let Err(e) = result {
            self.persist_failures += 1;
            tracing::warn!(error = %e, len = self.ticks.len(), "Failed to persist tick snapshot");
        }
    }
}
