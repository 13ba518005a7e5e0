//! Service configuration.
//!
//! Loaded once from a JSON file (or an environment-supplied string) and
//! passed by reference to the sync components. Holds the sender allow-list,
//! the registered OAuth client, and the operational bounds.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },
}

/// OAuth client registration used for code exchange and token refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub client_secret: String,

    /// Token endpoint for exchange and refresh.
    #[serde(default = "default_token_url")]
    pub token_url: String,

    /// Redirect URI registered with the OAuth client; required by the
    /// code-exchange grant even though no browser flow runs in this crate.
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Senders whose mail qualifies for extraction. Matched by substring
    /// containment against the lowercased `From` header.
    pub allowed_senders: Vec<String>,

    pub oauth: OAuthClientConfig,

    /// Pub/Sub topic passed to the Gmail watch registration.
    #[serde(default)]
    pub pubsub_topic: Option<String>,

    /// Most-recent messages fetched per sender on a backfill pass.
    #[serde(default = "default_backfill_max_results")]
    pub backfill_max_results: u32,

    /// Timeout for fetching a form page. Short on purpose: a slow form host
    /// must not stall the whole message pipeline.
    #[serde(default = "default_form_fetch_timeout_secs")]
    pub form_fetch_timeout_secs: u64,

    /// Newest processed-message marks kept per account.
    #[serde(default = "default_ledger_retention")]
    pub ledger_retention: u64,
}

fn default_token_url() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

fn default_redirect_uri() -> String {
    "http://localhost:8000/auth/google/callback".to_string()
}

fn default_backfill_max_results() -> u32 {
    10
}

fn default_form_fetch_timeout_secs() -> u64 {
    5
}

fn default_ledger_retention() -> u64 {
    1000
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_json::from_str(content)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.allowed_senders.is_empty() {
        return Err(ConfigError::Validation {
            message: "allowedSenders must not be empty".to_string(),
        });
    }

    if config.allowed_senders.iter().any(|s| s.trim().is_empty()) {
        return Err(ConfigError::Validation {
            message: "allowedSenders must not contain blank entries".to_string(),
        });
    }

    if config.oauth.client_id.is_empty() || config.oauth.client_secret.is_empty() {
        return Err(ConfigError::Validation {
            message: "oauth.clientId and oauth.clientSecret are required".to_string(),
        });
    }

    if config.backfill_max_results == 0 {
        return Err(ConfigError::Validation {
            message: "backfillMaxResults must be at least 1".to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> &'static str {
        r#"{
            "allowedSenders": ["clubs@example.edu"],
            "oauth": {
                "clientId": "client-123",
                "clientSecret": "secret-456"
            },
            "pubsubTopic": "projects/demo/topics/mail-topic"
        }"#
    }

    #[test]
    fn test_load_minimal_config() {
        let config = load_config_from_str(sample_json()).unwrap();
        assert_eq!(config.allowed_senders, vec!["clubs@example.edu"]);
        assert_eq!(config.oauth.client_id, "client-123");
        assert_eq!(
            config.pubsub_topic.as_deref(),
            Some("projects/demo/topics/mail-topic")
        );
    }

    #[test]
    fn test_defaults_applied() {
        let config = load_config_from_str(sample_json()).unwrap();
        assert_eq!(config.backfill_max_results, 10);
        assert_eq!(config.form_fetch_timeout_secs, 5);
        assert_eq!(config.ledger_retention, 1000);
        assert_eq!(config.oauth.token_url, "https://oauth2.googleapis.com/token");
    }

    #[test]
    fn test_empty_allow_list_rejected() {
        let json = r#"{
            "allowedSenders": [],
            "oauth": {"clientId": "a", "clientSecret": "b"}
        }"#;
        let result = load_config_from_str(json);
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_missing_oauth_client_rejected() {
        let json = r#"{
            "allowedSenders": ["clubs@example.edu"],
            "oauth": {"clientId": "", "clientSecret": ""}
        }"#;
        let result = load_config_from_str(json);
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_invalid_json_rejected() {
        let result = load_config_from_str("not json");
        assert!(matches!(result, Err(ConfigError::ParseJson(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, sample_json()).unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.allowed_senders.len(), 1);
    }

    #[test]
    fn test_missing_file_errors() {
        let result = load_config("/nonexistent/config.json");
        assert!(matches!(result, Err(ConfigError::ReadFile { .. })));
    }
}
