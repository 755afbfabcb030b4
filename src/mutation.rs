//! Optimistic ticket mutations
//!
//! Edits land in the in-memory collection immediately so the UI never
//! waits on the network, then the matching server request confirms or
//! rolls them back. Every optimistic path snapshots the prior ticket and
//! restores it on rejection, so status edits, field edits, and deletes
//! behave symmetrically; deletes stay pessimistic and only remove after
//! the server confirms. The poll loop replacing the whole collection with
//! server truth remains the final reconciliation backstop.

use crate::api::{ApiClient, ApiError};
use crate::ticket::{Ticket, TicketPatch, TicketStatus};
use crate::SyncError;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use uuid::Uuid;

/// What an edit changed.
#[derive(Debug, Clone, PartialEq)]
pub enum EditKind {
    Status(TicketStatus),
    Fields(TicketPatch),
    Delete,
}

/// Resolution state of an in-flight edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditState {
    Pending,
    Confirmed,
    Failed,
}

/// One in-flight optimistic change. Never persisted across reloads.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEdit {
    pub id: Uuid,
    pub ticket_id: u64,
    pub change: EditKind,
    pub submitted_at: DateTime<Utc>,
    pub state: EditState,
}

/// Optimistic mutation applier
pub struct MutationApplier {
    api: Arc<ApiClient>,
    tickets: Arc<RwLock<Vec<Ticket>>>,
    edits: RwLock<Vec<PendingEdit>>,
}

impl MutationApplier {
    pub fn new(api: Arc<ApiClient>, tickets: Arc<RwLock<Vec<Ticket>>>) -> Self {
        Self {
            api,
            tickets,
            edits: RwLock::new(Vec::new()),
        }
    }

    /// Rewrite the ticket's status locally, then confirm with the server.
    /// On rejection the prior value is restored and the error surfaced.
    pub async fn apply_status_change(
        &self,
        ticket_id: u64,
        new_status: TicketStatus,
    ) -> Result<(), SyncError> {
        let prior = stage_status(&mut self.tickets.write(), ticket_id, new_status)
            .ok_or(SyncError::UnknownTicket(ticket_id))?;
        let edit_id = self.track(ticket_id, EditKind::Status(new_status));

        match self.api.update_status(ticket_id, new_status).await {
            Ok(_) => {
                self.resolve(edit_id, EditState::Confirmed);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Status change for ticket {} rejected: {}", ticket_id, e);
                restore(&mut self.tickets.write(), prior);
                self.resolve(edit_id, EditState::Failed);
                Err(e.into())
            }
        }
    }

    /// Apply a field-level diff locally, then confirm. A server response
    /// flagging the ticket as deleted (cancellation-as-delete) removes it
    /// from the collection instead.
    pub async fn apply_field_edit(
        &self,
        ticket_id: u64,
        patch: TicketPatch,
    ) -> Result<(), SyncError> {
        let prior = stage_patch(&mut self.tickets.write(), ticket_id, &patch)
            .ok_or(SyncError::UnknownTicket(ticket_id))?;
        let edit_id = self.track(ticket_id, EditKind::Fields(patch.clone()));

        match self.api.update_fields(ticket_id, &patch).await {
            Ok(ack) => {
                if ack.deleted {
                    tracing::info!("Ticket {} removed by server during edit", ticket_id);
                    remove(&mut self.tickets.write(), ticket_id);
                }
                self.resolve(edit_id, EditState::Confirmed);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Field edit for ticket {} rejected: {}", ticket_id, e);
                restore(&mut self.tickets.write(), prior);
                self.resolve(edit_id, EditState::Failed);
                Err(e.into())
            }
        }
    }

    /// Pessimistic delete: the ticket leaves the collection only after the
    /// server confirms. On failure it stays and the server's message is
    /// surfaced.
    pub async fn apply_delete(&self, ticket_id: u64) -> Result<(), SyncError> {
        if !self.tickets.read().iter().any(|t| t.ticket_id == ticket_id) {
            return Err(SyncError::UnknownTicket(ticket_id));
        }
        let edit_id = self.track(ticket_id, EditKind::Delete);

        match self.api.delete_ticket(ticket_id).await {
            Ok(_) => {
                remove(&mut self.tickets.write(), ticket_id);
                self.resolve(edit_id, EditState::Confirmed);
                Ok(())
            }
            Err(e) => {
                self.resolve(edit_id, EditState::Failed);
                let message = match &e {
                    ApiError::Status { body, .. } if !body.trim().is_empty() => body.trim().into(),
                    other => other.to_string(),
                };
                tracing::warn!("Delete of ticket {} rejected: {}", ticket_id, message);
                Err(SyncError::Rejected(message))
            }
        }
    }

    /// All tracked edits, newest last.
    pub fn edits(&self) -> Vec<PendingEdit> {
        self.edits.read().clone()
    }

    /// Drop confirmed and failed entries, keeping only in-flight ones.
    pub fn prune_settled(&self) {
        self.edits.write().retain(|e| e.state == EditState::Pending);
    }

    fn track(&self, ticket_id: u64, change: EditKind) -> Uuid {
        let edit = PendingEdit {
            id: Uuid::new_v4(),
            ticket_id,
            change,
            submitted_at: Utc::now(),
            state: EditState::Pending,
        };
        let id = edit.id;
        self.edits.write().push(edit);
        id
    }

    fn resolve(&self, edit_id: Uuid, state: EditState) {
        if let Some(edit) = self.edits.write().iter_mut().find(|e| e.id == edit_id) {
            edit.state = state;
        }
    }
}

/// Set the status in place, returning the prior ticket for rollback.
fn stage_status(tickets: &mut Vec<Ticket>, ticket_id: u64, status: TicketStatus) -> Option<Ticket> {
    let ticket = tickets.iter_mut().find(|t| t.ticket_id == ticket_id)?;
    let prior = ticket.clone();
    ticket.status = status;
    Some(prior)
}

/// Apply the patch in place, returning the prior ticket for rollback.
fn stage_patch(tickets: &mut Vec<Ticket>, ticket_id: u64, patch: &TicketPatch) -> Option<Ticket> {
    let ticket = tickets.iter_mut().find(|t| t.ticket_id == ticket_id)?;
    let prior = ticket.clone();
    patch.apply_to(ticket);
    Some(prior)
}

/// Put a rolled-back ticket back, unless a poll already replaced the
/// collection and the ticket is gone.
fn restore(tickets: &mut Vec<Ticket>, prior: Ticket) {
    if let Some(ticket) = tickets.iter_mut().find(|t| t.ticket_id == prior.ticket_id) {
        *ticket = prior;
    } else {
        tracing::debug!("Skipping rollback of ticket {}: no longer present", prior.ticket_id);
    }
}

fn remove(tickets: &mut Vec<Ticket>, ticket_id: u64) -> bool {
    let before = tickets.len();
    tickets.retain(|t| t.ticket_id != ticket_id);
    tickets.len() != before
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collection() -> Vec<Ticket> {
        serde_json::from_str(
            r#"[
                {"ticket_id": 1, "name": "Ada", "status": "New", "created_at": "2024-01-01T00:00:00Z"},
                {"ticket_id": 2, "name": "Grace", "status": "Pending", "created_at": "2024-01-02T00:00:00Z"}
            ]"#,
        )
        .unwrap()
    }

    #[test]
    fn test_stage_status_is_immediate_and_reversible() {
        let mut tickets = collection();

        let prior = stage_status(&mut tickets, 1, TicketStatus::InProgress).unwrap();
        assert_eq!(tickets[0].status, TicketStatus::InProgress);
        assert_eq!(prior.status, TicketStatus::New);

        // Server rejected: the prior value comes back
        restore(&mut tickets, prior);
        assert_eq!(tickets[0].status, TicketStatus::New);
        assert_eq!(tickets[0].name, "Ada");
    }

    #[test]
    fn test_stage_patch_applies_diff_and_rolls_back_whole_ticket() {
        let mut tickets = collection();

        let patch = TicketPatch {
            name: Some("Ada L.".into()),
            status: Some(TicketStatus::OnHold),
            ..Default::default()
        };
        let prior = stage_patch(&mut tickets, 1, &patch).unwrap();
        assert_eq!(tickets[0].name, "Ada L.");
        assert_eq!(tickets[0].status, TicketStatus::OnHold);

        restore(&mut tickets, prior);
        assert_eq!(tickets[0].name, "Ada");
        assert_eq!(tickets[0].status, TicketStatus::New);
    }

    #[test]
    fn test_stage_unknown_ticket_is_none() {
        let mut tickets = collection();
        assert!(stage_status(&mut tickets, 99, TicketStatus::Closed).is_none());
        assert_eq!(tickets, collection());
    }

    #[test]
    fn test_restore_skips_vanished_ticket() {
        let mut tickets = collection();
        let prior = stage_status(&mut tickets, 1, TicketStatus::Closed).unwrap();

        // A poll replaced the collection and ticket 1 is gone
        tickets.retain(|t| t.ticket_id != 1);
        restore(&mut tickets, prior);
        assert_eq!(tickets.len(), 1);
        assert_eq!(tickets[0].ticket_id, 2);
    }

    #[test]
    fn test_remove_reports_presence() {
        let mut tickets = collection();
        assert!(remove(&mut tickets, 2));
        assert!(!remove(&mut tickets, 2));
        assert_eq!(tickets.len(), 1);
    }

    #[test]
    fn test_edit_ledger_tracks_and_prunes() {
        let config = crate::config::ClientConfig::default();
        let api = Arc::new(ApiClient::new(&config).unwrap());
        let applier = MutationApplier::new(api, Arc::new(RwLock::new(collection())));

        let a = applier.track(1, EditKind::Status(TicketStatus::Closed));
        let b = applier.track(2, EditKind::Delete);
        assert_eq!(applier.edits().len(), 2);
        assert!(applier.edits().iter().all(|e| e.state == EditState::Pending));

        applier.resolve(a, EditState::Confirmed);
        applier.resolve(b, EditState::Failed);
        applier.prune_settled();
        assert!(applier.edits().is_empty());
    }
}
