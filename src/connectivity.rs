//! Backend connectivity monitor
//!
//! Polls the ticket endpoint on a fixed cadence, classifies every outcome
//! into one of three states, and keeps the in-memory collection and the
//! durable cache in step with server truth. Polling never raises: every
//! outcome resolves to a state, and the loop is the only path back to
//! `Connected` after a failure.

use crate::api::{ApiClient, ApiError};
use crate::cache::TicketCache;
use crate::config::ClientConfig;
use crate::ticket::Ticket;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Tri-state backend health classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum ConnectivityState {
    /// Optimistic default at startup.
    #[default]
    Connected,
    /// The server answered, but not usefully.
    ServerError,
    /// No usable HTTP response at all.
    Offline,
}

/// User-visible failure taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureClass {
    Network,
    Server,
    Validation,
}

/// Structured diagnostic for the last failed sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncFailure {
    pub classification: FailureClass,
    /// Short human message shown in the status banner.
    pub message: String,
    /// Raw detail for the diagnostics drawer.
    pub detail: String,
}

/// One consistent view of connectivity, read whole by consumers.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConnectivitySnapshot {
    pub state: ConnectivityState,
    pub last_sync: Option<DateTime<Utc>>,
    pub last_error: Option<SyncFailure>,
    pub retry_count: u32,
    /// Sequence number of the most recently applied response.
    pub applied_seq: u64,
}

/// Map an API failure to the state it drives and its diagnostic, in the
/// documented priority order.
pub fn classify(err: &ApiError) -> (ConnectivityState, SyncFailure) {
    match err {
        ApiError::Transport(detail) => (
            ConnectivityState::Offline,
            SyncFailure {
                classification: FailureClass::Network,
                message: "backend unreachable".into(),
                detail: detail.clone(),
            },
        ),
        ApiError::Status { status: 500, body } => {
            let message = if body.trim().is_empty() {
                "database/server error".to_string()
            } else {
                body.trim().to_string()
            };
            (
                ConnectivityState::ServerError,
                SyncFailure {
                    classification: FailureClass::Server,
                    message,
                    detail: "HTTP 500".into(),
                },
            )
        }
        ApiError::Status { status: 404, .. } => (
            ConnectivityState::ServerError,
            SyncFailure {
                classification: FailureClass::Server,
                message: "endpoint not found".into(),
                detail: "HTTP 404".into(),
            },
        ),
        ApiError::Status { status, .. } => (
            ConnectivityState::ServerError,
            SyncFailure {
                classification: FailureClass::Server,
                message: status.to_string(),
                detail: format!("HTTP {}", status),
            },
        ),
        ApiError::Decode(detail) => (
            ConnectivityState::Offline,
            SyncFailure {
                classification: FailureClass::Network,
                message: "malformed response".into(),
                detail: detail.clone(),
            },
        ),
    }
}

/// Connectivity monitor
pub struct ConnectivityMonitor {
    api: Arc<ApiClient>,
    cache: Arc<TicketCache>,
    /// Live in-memory collection, shared with the mutation applier.
    tickets: Arc<RwLock<Vec<Ticket>>>,
    snapshot: Arc<RwLock<ConnectivitySnapshot>>,
    /// Issue-time sequence for state-mutating responses. Responses are
    /// applied only in increasing order; a stale arrival is discarded.
    seq: AtomicU64,
    interval: Duration,
    poll_timeout: Duration,
    retry_timeout: Duration,
}

impl ConnectivityMonitor {
    pub fn new(
        api: Arc<ApiClient>,
        cache: Arc<TicketCache>,
        tickets: Arc<RwLock<Vec<Ticket>>>,
        config: &ClientConfig,
    ) -> Self {
        Self {
            api,
            cache,
            tickets,
            snapshot: Arc::new(RwLock::new(ConnectivitySnapshot::default())),
            seq: AtomicU64::new(0),
            interval: config.ticket_poll_interval(),
            poll_timeout: config.poll_timeout(),
            retry_timeout: config.retry_timeout(),
        }
    }

    pub fn snapshot(&self) -> ConnectivitySnapshot {
        self.snapshot.read().clone()
    }

    pub fn state(&self) -> ConnectivityState {
        self.snapshot.read().state
    }

    /// One automatic poll with the passive timeout.
    pub async fn poll(&self) {
        let seq = self.next_seq();
        let outcome = self.api.fetch_tickets(self.poll_timeout).await;
        self.apply(seq, outcome, false);
    }

    /// User-triggered retry: same classification as `poll`, longer
    /// timeout, and a failure increments the retry counter. Safe to run
    /// while an automatic poll is in flight; stale responses lose by
    /// sequence, not arrival order.
    pub async fn manual_retry(&self) -> ConnectivitySnapshot {
        let seq = self.next_seq();
        let outcome = self.api.fetch_tickets(self.retry_timeout).await;
        self.apply(seq, outcome, true);
        self.snapshot()
    }

    /// Drive the fixed-cadence poll loop until the task is dropped.
    pub async fn run(&self) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            self.poll().await;
        }
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Apply one response. Visible to tests so every simulated outcome in
    /// the classification table can be driven without a live backend.
    pub(crate) fn apply(&self, seq: u64, outcome: Result<Vec<Ticket>, ApiError>, is_retry: bool) {
        let mut snapshot = self.snapshot.write();
        if seq <= snapshot.applied_seq {
            tracing::debug!("Discarding stale response (seq {} <= {})", seq, snapshot.applied_seq);
            return;
        }
        snapshot.applied_seq = seq;

        match outcome {
            Ok(fresh) => {
                // Server truth replaces the collection whole; unconfirmed
                // optimistic edits are discarded with it.
                self.cache.write(&fresh);
                *self.tickets.write() = fresh;

                if snapshot.state != ConnectivityState::Connected {
                    tracing::info!("Backend reachable again");
                }
                snapshot.state = ConnectivityState::Connected;
                snapshot.last_sync = Some(Utc::now());
                snapshot.last_error = None;
                snapshot.retry_count = 0;
            }
            Err(e) => {
                let (state, failure) = classify(&e);
                tracing::warn!(
                    "Sync failed ({:?}): {} - {}",
                    failure.classification,
                    failure.message,
                    failure.detail
                );
                snapshot.state = state;
                snapshot.last_error = Some(failure);
                if is_retry {
                    snapshot.retry_count += 1;
                }
            }
        }
    }
}
