//! Client configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Sync core configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Backend base URL
    pub base_url: String,
    /// Path of the ticket-collection endpoint
    pub tickets_path: String,
    /// Path of the health-check endpoint
    pub health_path: String,
    /// Path of the taxonomy mirror endpoint
    pub taxonomy_path: String,
    /// Ticket poll cadence (seconds)
    pub ticket_poll_interval_secs: u64,
    /// Notification poll cadence (seconds)
    pub notification_poll_interval_secs: u64,
    /// Chat poll cadence (seconds)
    pub chat_poll_interval_secs: u64,
    /// Request timeout for passive polling (milliseconds)
    pub poll_timeout_ms: u64,
    /// Request timeout for user-initiated retry (milliseconds)
    pub retry_timeout_ms: u64,
    /// Durable store file, used when no host store is injected
    pub storage_path: String,
    /// Logging level
    pub log_level: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".into(),
            tickets_path: "/api/tickets".into(),
            health_path: "/api/health".into(),
            taxonomy_path: "/api/taxonomy".into(),
            ticket_poll_interval_secs: 5,
            notification_poll_interval_secs: 15,
            chat_poll_interval_secs: 3,
            poll_timeout_ms: 4_000,
            retry_timeout_ms: 15_000,
            storage_path: "deskline-store.json".into(),
            log_level: "info".into(),
        }
    }
}

impl ClientConfig {
    /// Load from file
    pub fn load(path: &str) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Save to file
    pub fn save(&self, path: &str) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    pub fn ticket_poll_interval(&self) -> Duration {
        Duration::from_secs(self.ticket_poll_interval_secs)
    }

    /// Short timeout for the background poll loop.
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    /// Longer timeout for user-triggered retries.
    pub fn retry_timeout(&self) -> Duration {
        Duration::from_millis(self.retry_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.ticket_poll_interval(), Duration::from_secs(5));
        assert_eq!(config.notification_poll_interval_secs, 15);
        assert_eq!(config.chat_poll_interval_secs, 3);
        assert!(config.retry_timeout() > config.poll_timeout());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let path = std::env::temp_dir().join(format!("deskline-config-{}.json", uuid::Uuid::new_v4()));
        let path_str = path.to_str().unwrap();

        let mut config = ClientConfig::default();
        config.base_url = "https://helpdesk.example.com".into();
        config.save(path_str).unwrap();

        let loaded = ClientConfig::load(path_str).unwrap();
        assert_eq!(loaded.base_url, "https://helpdesk.example.com");
        assert_eq!(loaded.ticket_poll_interval_secs, 5);

        let _ = std::fs::remove_file(&path);
    }
}
