//! Backend REST endpoints

use crate::config::ClientConfig;
use crate::taxonomy::TaxonomyTree;
use crate::ticket::{Ticket, TicketPatch, TicketStatus};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// API call failure.
///
/// The split matters for connectivity classification: `Transport` means no
/// HTTP response was obtained at all (DNS, refused, timeout), `Status`
/// carries a response the server did send, and `Decode` is a 2xx response
/// whose body was not parseable.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("backend unreachable: {0}")]
    Transport(String),
    #[error("server returned {status}")]
    Status { status: u16, body: String },
    #[error("malformed response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        // Responses with a status are handled before erroring, so anything
        // arriving here never produced a usable HTTP response.
        Self::Transport(e.to_string())
    }
}

/// Server acknowledgement for a mutation POST. An empty body reads as a
/// plain success.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MutationAck {
    /// Set when the server removed the ticket as a side effect of the
    /// update (cancellation-as-delete).
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// HTTP client for the helpdesk backend.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    tickets_path: String,
    health_path: String,
    taxonomy_path: String,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.retry_timeout_ms))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            tickets_path: config.tickets_path.clone(),
            health_path: config.health_path.clone(),
            taxonomy_path: config.taxonomy_path.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Fetch the full ticket collection.
    pub async fn fetch_tickets(&self, timeout: Duration) -> Result<Vec<Ticket>, ApiError> {
        let response = self
            .http
            .get(self.url(&self.tickets_path))
            .timeout(timeout)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// Health-check GET, 200 on success.
    pub async fn health_check(&self, timeout: Duration) -> Result<(), ApiError> {
        let response = self
            .http
            .get(self.url(&self.health_path))
            .timeout(timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    /// Submit a status change for one ticket.
    pub async fn update_status(
        &self,
        ticket_id: u64,
        status: TicketStatus,
    ) -> Result<MutationAck, ApiError> {
        #[derive(Serialize)]
        struct StatusBody {
            status: TicketStatus,
        }

        self.post_ack(
            &format!("{}/{}/status", self.tickets_path, ticket_id),
            &StatusBody { status },
        )
        .await
    }

    /// Submit a field-level edit for one ticket.
    pub async fn update_fields(
        &self,
        ticket_id: u64,
        patch: &TicketPatch,
    ) -> Result<MutationAck, ApiError> {
        self.post_ack(&format!("{}/{}", self.tickets_path, ticket_id), patch)
            .await
    }

    /// Request deletion of one ticket.
    pub async fn delete_ticket(&self, ticket_id: u64) -> Result<MutationAck, ApiError> {
        self.post_ack(
            &format!("{}/{}/delete", self.tickets_path, ticket_id),
            &serde_json::json!({}),
        )
        .await
    }

    /// Mirror the taxonomy tree to the backend. The local store stays
    /// authoritative; callers treat failures as log-only.
    pub async fn mirror_taxonomy(&self, tree: &TaxonomyTree) -> Result<(), ApiError> {
        let response = self
            .http
            .post(self.url(&self.taxonomy_path))
            .json(tree)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    async fn post_ack<B: Serialize>(&self, path: &str, body: &B) -> Result<MutationAck, ApiError> {
        let response = self.http.post(self.url(path)).json(body).send().await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        if text.trim().is_empty() {
            return Ok(MutationAck::default());
        }
        serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_without_double_slash() {
        let mut config = ClientConfig::default();
        config.base_url = "http://backend.local/".into();
        let api = ApiClient::new(&config).unwrap();
        assert_eq!(api.url("/api/tickets"), "http://backend.local/api/tickets");
    }

    #[test]
    fn test_ack_tolerates_sparse_bodies() {
        let ack: MutationAck = serde_json::from_str("{}").unwrap();
        assert!(!ack.deleted);
        assert!(ack.message.is_none());

        let ack: MutationAck =
            serde_json::from_str(r#"{"deleted": true, "message": "cancelled"}"#).unwrap();
        assert!(ack.deleted);
        assert_eq!(ack.message.as_deref(), Some("cancelled"));
    }
}
