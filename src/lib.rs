//! Deskline Helpdesk - Client Synchronization Core
//!
//! Keeps the ticket dashboard correct under unreliable network conditions:
//! a connectivity monitor polls the backend and classifies every outcome,
//! a durable cache keeps the table usable while the server is away, edits
//! apply optimistically and reconcile against server truth, and the
//! classification taxonomy reaches every consumer through a change bus
//! layered on persistent storage.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                      DESKLINE SYNC CORE                           │
//! │                                                                   │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────────────┐    │
//! │  │ Connectivity │  │   Mutation   │  │    Taxonomy Store    │    │
//! │  │   Monitor    │  │   Applier    │  │     + Change Bus     │    │
//! │  │  (tri-state) │  │ (optimistic) │  │ (persist/broadcast)  │    │
//! │  └──────┬───────┘  └──────┬───────┘  └──────────┬───────────┘    │
//! │         │                 │                     │                │
//! │  ┌──────▼─────────────────▼──────┐  ┌───────────▼───────────┐    │
//! │  │   In-memory collection +      │  │  Key-Value Store      │    │
//! │  │   last-known-good cache       │  │  (durable, injected)  │    │
//! │  └───────────────────────────────┘  └───────────────────────┘    │
//! └───────────────────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod bus;
pub mod cache;
pub mod config;
pub mod connectivity;
pub mod mutation;
pub mod stats;
pub mod storage;
pub mod taxonomy;
pub mod ticket;

use parking_lot::RwLock;
use std::sync::Arc;
use thiserror::Error;

pub use api::{ApiClient, ApiError};
pub use bus::Subscription;
pub use cache::TicketCache;
pub use config::ClientConfig;
pub use connectivity::{
    ConnectivityMonitor, ConnectivitySnapshot, ConnectivityState, FailureClass, SyncFailure,
};
pub use mutation::{MutationApplier, PendingEdit};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use taxonomy::{TaxonomyError, TaxonomyStore, TaxonomyTree};
pub use ticket::{Ticket, TicketPatch, TicketStatus};

/// Sync core error types
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("api error: {0}")]
    Api(#[from] ApiError),
    #[error("ticket {0} not found")]
    UnknownTicket(u64),
    #[error("rejected by server: {0}")]
    Rejected(String),
    #[error("taxonomy error: {0}")]
    Taxonomy(#[from] TaxonomyError),
}

/// Main sync-core handle, one per dashboard session.
///
/// Owns the shared collection and wires the monitor, cache, applier, and
/// taxonomy store together. UI fragments hold the `Arc`'d parts they read
/// and render from snapshots only.
pub struct DesklineClient {
    config: ClientConfig,
    monitor: Arc<ConnectivityMonitor>,
    cache: Arc<TicketCache>,
    applier: Arc<MutationApplier>,
    taxonomy: Arc<TaxonomyStore>,
    tickets: Arc<RwLock<Vec<Ticket>>>,
    // Keeps the backend taxonomy mirror subscribed for the client's lifetime
    _mirror: Subscription,
}

impl DesklineClient {
    /// Build the core against `store`, the durable key-value backend of
    /// the host profile.
    pub fn new(config: ClientConfig, store: Arc<dyn KeyValueStore>) -> Result<Self, SyncError> {
        let api = Arc::new(ApiClient::new(&config)?);
        let cache = Arc::new(TicketCache::new(store.clone()));
        let tickets = Arc::new(RwLock::new(Vec::new()));
        let monitor = Arc::new(ConnectivityMonitor::new(
            api.clone(),
            cache.clone(),
            tickets.clone(),
            &config,
        ));
        let applier = Arc::new(MutationApplier::new(api.clone(), tickets.clone()));
        let taxonomy = Arc::new(TaxonomyStore::open(store));

        // Fire-and-forget mirror: each new tree snapshot is pushed to the
        // backend off the bus thread. The local store stays authoritative,
        // so a failed push is logged and dropped.
        let mirror = taxonomy.subscribe(move |tree| {
            let api = api.clone();
            let tree = tree.clone();
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move {
                        if let Err(e) = api.mirror_taxonomy(&tree).await {
                            tracing::warn!("Taxonomy mirror failed: {}", e);
                        }
                    });
                }
                Err(_) => tracing::debug!("No runtime, skipping taxonomy mirror"),
            }
        });

        Ok(Self {
            config,
            monitor,
            cache,
            applier,
            taxonomy,
            tickets,
            _mirror: mirror,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Current connectivity snapshot.
    pub fn connectivity(&self) -> ConnectivitySnapshot {
        self.monitor.snapshot()
    }

    /// The collection the UI renders: live while connected, the cached
    /// last-known-good snapshot otherwise.
    pub fn tickets(&self) -> Vec<Ticket> {
        self.cache
            .effective_view(self.monitor.state(), &self.tickets.read())
    }

    pub fn taxonomy(&self) -> &Arc<TaxonomyStore> {
        &self.taxonomy
    }

    pub fn mutations(&self) -> &Arc<MutationApplier> {
        &self.applier
    }

    /// User-triggered retry with the interactive timeout.
    pub async fn retry_now(&self) -> ConnectivitySnapshot {
        self.monitor.manual_retry().await
    }

    /// Drive the automatic poll loop until the task is dropped. Each
    /// successful poll replaces the collection with server truth, so the
    /// settled entries in the edit ledger are dropped along with it.
    pub async fn run(&self) {
        tracing::info!(
            "Starting sync loop against {} every {:?}",
            self.config.base_url,
            self.config.ticket_poll_interval()
        );
        let mut interval = tokio::time::interval(self.config.ticket_poll_interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            self.monitor.poll().await;
            if self.monitor.state() == ConnectivityState::Connected {
                self.applier.prune_settled();
            }
        }
    }
}
