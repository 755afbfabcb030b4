//! Ticket aggregations rendered by the dashboard

use crate::ticket::{Ticket, TicketStatus};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// A ticket is overdue once it has been open this long.
pub const OVERDUE_AFTER_HOURS: i64 = 48;

/// Per-status ticket counts. Statuses are the normalized enumeration, so
/// legacy `Completed`/`Complete` records land in `closed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub new: u64,
    pub in_progress: u64,
    pub pending: u64,
    pub closed: u64,
    pub cancelled: u64,
    pub on_hold: u64,
    pub rejected: u64,
    pub total: u64,
}

/// Count tickets per normalized status.
pub fn status_counts(tickets: &[Ticket]) -> StatusCounts {
    let mut counts = StatusCounts::default();
    for ticket in tickets {
        match ticket.status {
            TicketStatus::New => counts.new += 1,
            TicketStatus::InProgress => counts.in_progress += 1,
            TicketStatus::Pending => counts.pending += 1,
            TicketStatus::Closed => counts.closed += 1,
            TicketStatus::Cancelled => counts.cancelled += 1,
            TicketStatus::OnHold => counts.on_hold += 1,
            TicketStatus::Rejected => counts.rejected += 1,
        }
        counts.total += 1;
    }
    counts
}

/// One calendar day of filing activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailySummary {
    pub day: NaiveDate,
    pub opened: u64,
    pub closed: u64,
    pub cancelled: u64,
}

/// Bucket tickets by creation day, oldest first.
pub fn daily_summary(tickets: &[Ticket]) -> Vec<DailySummary> {
    let mut days: BTreeMap<NaiveDate, DailySummary> = BTreeMap::new();
    for ticket in tickets {
        let day = ticket.created_at.date_naive();
        let entry = days.entry(day).or_insert_with(|| DailySummary {
            day,
            opened: 0,
            closed: 0,
            cancelled: 0,
        });
        entry.opened += 1;
        match ticket.status {
            TicketStatus::Closed => entry.closed += 1,
            TicketStatus::Cancelled => entry.cancelled += 1,
            _ => {}
        }
    }
    days.into_values().collect()
}

/// A still-open ticket past the overdue threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverdueTicket {
    pub ticket_id: u64,
    /// Whole hours past the threshold.
    pub hours_overdue: i64,
}

/// Tickets still open more than [`OVERDUE_AFTER_HOURS`] after creation.
/// `now` is explicit so callers (and tests) drive the clock.
pub fn overdue(tickets: &[Ticket], now: DateTime<Utc>) -> Vec<OverdueTicket> {
    tickets
        .iter()
        .filter(|t| t.status.is_open())
        .filter_map(|t| {
            let elapsed = now.signed_duration_since(t.created_at);
            if elapsed <= chrono::Duration::hours(OVERDUE_AFTER_HOURS) {
                return None;
            }
            Some(OverdueTicket {
                ticket_id: t.ticket_id,
                hours_overdue: elapsed.num_hours() - OVERDUE_AFTER_HOURS,
            })
        })
        .collect()
}
