//! Client configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Default hub endpoint.
pub const DEFAULT_HUB_URL: &str = "ws://localhost:8080/documenthub";

/// Default REST API base.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080/api";

/// Client configuration shared by the channel, the REST client and sessions.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket URL of the collaboration hub
    pub hub_url: String,
    /// Base URL of the REST API
    pub api_base_url: String,
    /// Where the access credential is persisted (None = in-memory only)
    pub credential_path: Option<PathBuf>,
    /// Quiet period before a burst of local edits to one block is sent
    pub edit_quiet_period: Duration,
    /// Upper bound on the WebSocket + hub handshake
    pub handshake_timeout: Duration,
    /// Delay before each automatic reconnect attempt; its length is the
    /// number of attempts made after a transport drop
    pub reconnect_delays: Vec<Duration>,
    /// Capacity of the outgoing frame queue
    pub outgoing_capacity: usize,
    /// Capacity of the connection status broadcast
    pub status_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            hub_url: DEFAULT_HUB_URL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            credential_path: default_credential_path(),
            edit_quiet_period: Duration::from_millis(1000),
            handshake_timeout: Duration::from_secs(10),
            reconnect_delays: vec![
                Duration::ZERO,
                Duration::from_secs(2),
                Duration::from_secs(10),
                Duration::from_secs(30),
            ],
            outgoing_capacity: 256,
            status_capacity: 64,
        }
    }
}

impl ClientConfig {
    /// Defaults overlaid with `QUILL_*` environment variables.
    ///
    /// Recognised: `QUILL_HUB_URL`, `QUILL_API_URL`, `QUILL_CREDENTIALS`,
    /// `QUILL_EDIT_QUIET_MS`. Unparseable values are logged and ignored.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup("QUILL_HUB_URL") {
            self.hub_url = url;
        }
        if let Some(url) = lookup("QUILL_API_URL") {
            self.api_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(path) = lookup("QUILL_CREDENTIALS") {
            self.credential_path = Some(PathBuf::from(path));
        }
        if let Some(ms) = lookup("QUILL_EDIT_QUIET_MS") {
            match ms.parse::<u64>() {
                Ok(ms) => self.edit_quiet_period = Duration::from_millis(ms),
                Err(e) => log::warn!("Ignoring QUILL_EDIT_QUIET_MS={ms:?}: {e}"),
            }
        }
        self
    }
}

fn default_credential_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".quill").join("credentials.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.hub_url, DEFAULT_HUB_URL);
        assert_eq!(config.edit_quiet_period, Duration::from_secs(1));
        assert_eq!(config.reconnect_delays.len(), 4);
        assert_eq!(config.reconnect_delays[0], Duration::ZERO);
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("QUILL_HUB_URL", "ws://hub.test/documenthub"),
            ("QUILL_API_URL", "http://api.test/api/"),
            ("QUILL_CREDENTIALS", "/tmp/creds.json"),
            ("QUILL_EDIT_QUIET_MS", "250"),
        ]
        .into_iter()
        .collect();

        let config = ClientConfig::default().with_overrides(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.hub_url, "ws://hub.test/documenthub");
        assert_eq!(config.api_base_url, "http://api.test/api");
        assert_eq!(config.credential_path, Some(PathBuf::from("/tmp/creds.json")));
        assert_eq!(config.edit_quiet_period, Duration::from_millis(250));
    }

    #[test]
    fn test_bad_quiet_period_ignored() {
        let config = ClientConfig::default()
            .with_overrides(|k| (k == "QUILL_EDIT_QUIET_MS").then(|| "soon".to_string()));
        assert_eq!(config.edit_quiet_period, Duration::from_secs(1));
    }
}
