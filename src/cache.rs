//! Last-known-good ticket cache

use crate::connectivity::ConnectivityState;
use crate::storage::KeyValueStore;
use crate::ticket::Ticket;
use std::sync::Arc;

/// Storage key for the serialized collection.
pub const TICKETS_KEY: &str = "deskline.tickets.last_good";

/// Durable mirror of the last ticket collection received from a healthy
/// backend. Strictly last-successful-snapshot: written whole on every
/// successful poll, never merged, never touched by optimistic edits.
pub struct TicketCache {
    store: Arc<dyn KeyValueStore>,
}

impl TicketCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Overwrite the cached collection. Called only from the poll success
    /// path, i.e. while the monitor reports `Connected`.
    pub fn write(&self, tickets: &[Ticket]) {
        match serde_json::to_string(tickets) {
            Ok(raw) => self.store.set(TICKETS_KEY, &raw),
            Err(e) => tracing::error!("Failed to serialize ticket cache: {}", e),
        }
    }

    /// The last written collection; empty when nothing was ever cached or
    /// the stored value does not parse. Never errs.
    pub fn read(&self) -> Vec<Ticket> {
        let Some(raw) = self.store.get(TICKETS_KEY) else {
            return Vec::new();
        };
        match serde_json::from_str(&raw) {
            Ok(tickets) => tickets,
            Err(e) => {
                tracing::warn!("Cached tickets unreadable, serving empty view: {}", e);
                Vec::new()
            }
        }
    }

    /// The only collection the UI may render from: the live collection
    /// while connected, the cached snapshot otherwise.
    pub fn effective_view(&self, state: ConnectivityState, live: &[Ticket]) -> Vec<Ticket> {
        if state == ConnectivityState::Connected {
            live.to_vec()
        } else {
            self.read()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn tickets(ids: &[u64]) -> Vec<Ticket> {
        ids.iter()
            .map(|id| {
                serde_json::from_str(&format!(
                    r#"{{"ticket_id": {id}, "status": "New", "created_at": "2024-01-01T00:00:00Z"}}"#
                ))
                .unwrap()
            })
            .collect()
    }

    #[test]
    fn test_cached_snapshot_survives_failure_window() {
        let cache = TicketCache::new(Arc::new(MemoryStore::new()));
        let good = tickets(&[1, 2, 3]);
        cache.write(&good);

        // Backend goes away; the view is the last good snapshot, unchanged
        let view = cache.effective_view(ConnectivityState::Offline, &[]);
        assert_eq!(view, good);
        let view = cache.effective_view(ConnectivityState::ServerError, &[]);
        assert_eq!(view, good);
    }

    #[test]
    fn test_connected_view_is_live() {
        let cache = TicketCache::new(Arc::new(MemoryStore::new()));
        cache.write(&tickets(&[1]));

        let live = tickets(&[7, 8]);
        let view = cache.effective_view(ConnectivityState::Connected, &live);
        assert_eq!(view, live);
    }

    #[test]
    fn test_write_overwrites_no_merge() {
        let cache = TicketCache::new(Arc::new(MemoryStore::new()));
        cache.write(&tickets(&[1, 2]));
        cache.write(&tickets(&[3]));
        assert_eq!(cache.read(), tickets(&[3]));
    }

    #[test]
    fn test_missing_or_corrupt_cache_reads_empty() {
        let kv = Arc::new(MemoryStore::new());
        let cache = TicketCache::new(kv.clone());
        assert!(cache.read().is_empty());

        kv.set(TICKETS_KEY, "][ nonsense");
        assert!(cache.read().is_empty());
    }
}
