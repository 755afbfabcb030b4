//! Ticket records and status normalization

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// One support request as served by the backend.
///
/// The wire format is tolerated loosely: legacy field names are accepted
/// via aliases, unknown fields are ignored, and optional fields default,
/// so one odd record never poisons the whole collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    /// Server-assigned, stable, never reused.
    #[serde(alias = "Ticket ID", alias = "ticketId")]
    pub ticket_id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    /// Free-text request body filed by the requester.
    #[serde(default)]
    pub request: String,
    /// Free-text problem report, filled in by agents.
    #[serde(default)]
    pub report: String,
    #[serde(default)]
    pub status: TicketStatus,
    /// Taxonomy root the ticket was filed under.
    #[serde(default, alias = "type")]
    pub ticket_type: String,
    #[serde(alias = "created")]
    pub created_at: DateTime<Utc>,
    #[serde(default, alias = "appointment")]
    pub appointment_at: Option<DateTime<Utc>>,
}

/// Ticket lifecycle status.
///
/// Always normalized before rendering or aggregation: the legacy labels
/// `Completed` and `Complete` read as `Closed`, and anything unrecognized
/// falls back to `New` instead of failing the record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TicketStatus {
    #[default]
    New,
    InProgress,
    Pending,
    Closed,
    Cancelled,
    OnHold,
    Rejected,
}

impl TicketStatus {
    /// Parse a wire or user-entered label, normalizing legacy aliases.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "new" => Self::New,
            "in progress" | "inprogress" => Self::InProgress,
            "pending" => Self::Pending,
            "closed" | "completed" | "complete" => Self::Closed,
            "cancelled" | "canceled" => Self::Cancelled,
            "on hold" | "onhold" => Self::OnHold,
            "rejected" => Self::Rejected,
            _ => Self::New,
        }
    }

    /// Canonical display label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::New => "New",
            Self::InProgress => "In Progress",
            Self::Pending => "Pending",
            Self::Closed => "Closed",
            Self::Cancelled => "Cancelled",
            Self::OnHold => "On Hold",
            Self::Rejected => "Rejected",
        }
    }

    /// Whether the ticket still needs work.
    pub fn is_open(&self) -> bool {
        !matches!(self, Self::Closed | Self::Cancelled | Self::Rejected)
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for TicketStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for TicketStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(Self::from_label(&label))
    }
}

/// Field-level diff for a ticket edit. Only set fields are sent and
/// applied; the shape mirrors the backend's PATCH-style update body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TicketPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TicketStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appointment_at: Option<DateTime<Utc>>,
}

impl TicketPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Apply the set fields onto `ticket`.
    pub fn apply_to(&self, ticket: &mut Ticket) {
        if let Some(v) = &self.name {
            ticket.name = v.clone();
        }
        if let Some(v) = &self.email {
            ticket.email = v.clone();
        }
        if let Some(v) = &self.phone {
            ticket.phone = v.clone();
        }
        if let Some(v) = &self.request {
            ticket.request = v.clone();
        }
        if let Some(v) = &self.report {
            ticket.report = v.clone();
        }
        if let Some(v) = self.status {
            ticket.status = v;
        }
        if let Some(v) = &self.ticket_type {
            ticket.ticket_type = v.clone();
        }
        if let Some(v) = self.appointment_at {
            ticket.appointment_at = Some(v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_normalizes_legacy_labels() {
        assert_eq!(TicketStatus::from_label("Completed"), TicketStatus::Closed);
        assert_eq!(TicketStatus::from_label("Complete"), TicketStatus::Closed);
        assert_eq!(TicketStatus::from_label("closed"), TicketStatus::Closed);
        assert_eq!(TicketStatus::from_label("On Hold"), TicketStatus::OnHold);
        assert_eq!(TicketStatus::from_label("  In Progress "), TicketStatus::InProgress);
        // Unrecognized labels fall back instead of failing the record
        assert_eq!(TicketStatus::from_label("???"), TicketStatus::New);
    }

    #[test]
    fn test_ticket_deserializes_legacy_wire_shape() {
        let json = r#"{
            "Ticket ID": 101,
            "status": "Completed",
            "type": "Hardware",
            "created": "2024-01-01T00:00:00Z",
            "unknown_field": true
        }"#;

        let ticket: Ticket = serde_json::from_str(json).unwrap();
        assert_eq!(ticket.ticket_id, 101);
        assert_eq!(ticket.status, TicketStatus::Closed);
        assert_eq!(ticket.ticket_type, "Hardware");
        assert!(ticket.appointment_at.is_none());
        assert!(ticket.name.is_empty());
    }

    #[test]
    fn test_status_serializes_canonical_label() {
        let json = serde_json::to_string(&TicketStatus::InProgress).unwrap();
        assert_eq!(json, r#""In Progress""#);
    }

    #[test]
    fn test_patch_applies_only_set_fields() {
        let mut ticket: Ticket = serde_json::from_str(
            r#"{"ticket_id": 7, "name": "Ada", "status": "New", "created_at": "2024-03-01T10:00:00Z"}"#,
        )
        .unwrap();

        let patch = TicketPatch {
            report: Some("Replaced toner".into()),
            status: Some(TicketStatus::Pending),
            ..Default::default()
        };
        patch.apply_to(&mut ticket);

        assert_eq!(ticket.name, "Ada");
        assert_eq!(ticket.report, "Replaced toner");
        assert_eq!(ticket.status, TicketStatus::Pending);
    }

    #[test]
    fn test_patch_serializes_sparse_body() {
        let patch = TicketPatch {
            status: Some(TicketStatus::Closed),
            ..Default::default()
        };
        assert_eq!(serde_json::to_string(&patch).unwrap(), r#"{"status":"Closed"}"#);
        assert!(TicketPatch::default().is_empty());
    }
}
