//! Bulk loader configuration.
//!
//! The endpoint and credentials never come from the configuration file; they
//! are supplied at runtime (CLI flags or environment) as [`Credentials`].

use crate::error::LoaderError;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

/// Document store settings read from the `elasticsearch` configuration block.
#[derive(Debug, Clone, Deserialize)]
pub struct ElasticsearchConfig {
    /// Prefer API key authentication over basic auth
    #[serde(default = "default_true")]
    pub use_api_key: bool,

    /// Verify TLS certificates
    #[serde(default = "default_true")]
    pub verify_ssl: bool,

    /// Index name prefix; the tenant id (without dashes) is appended
    #[serde(default = "default_index_prefix")]
    pub index_prefix: String,

    /// Maximum retry attempts for a batch before it is reported failed
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff delay in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff delay in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Number of batches written concurrently
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Ask the store to refresh affected shards after each bulk request
    #[serde(default)]
    pub refresh: bool,
}

fn default_true() -> bool {
    true
}
fn default_index_prefix() -> String {
    "camtrap-media".to_string()
}
fn default_max_retries() -> u32 {
    5
}
fn default_initial_backoff_ms() -> u64 {
    500
}
fn default_max_backoff_ms() -> u64 {
    30_000
}
fn default_request_timeout_secs() -> u64 {
    60
}
fn default_concurrency() -> usize {
    2
}

impl Default for ElasticsearchConfig {
    fn default() -> Self {
        Self {
            use_api_key: default_true(),
            verify_ssl: default_true(),
            index_prefix: default_index_prefix(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            concurrency: default_concurrency(),
            refresh: false,
        }
    }
}

impl ElasticsearchConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), LoaderError> {
        if self.index_prefix.is_empty() {
            return Err(LoaderError::Configuration(
                "elasticsearch.index_prefix must not be empty".to_string(),
            ));
        }
        if self.index_prefix.chars().any(|c| c.is_ascii_uppercase()) {
            return Err(LoaderError::Configuration(
                "elasticsearch.index_prefix must be lowercase".to_string(),
            ));
        }
        if self.concurrency == 0 {
            return Err(LoaderError::Configuration(
                "elasticsearch.concurrency must be greater than 0".to_string(),
            ));
        }
        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err(LoaderError::Configuration(
                "elasticsearch.initial_backoff_ms exceeds max_backoff_ms".to_string(),
            ));
        }
        Ok(())
    }

    /// Get request timeout as Duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Get initial backoff as Duration.
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    /// Get maximum backoff as Duration.
    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

/// Authentication material for the document store.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    None,
    ApiKey(String),
    Basic { username: String, password: String },
}

impl Credentials {
    /// Pick the authentication method from whatever the operator supplied.
    ///
    /// `use_api_key` decides the preference when both an API key and a
    /// username/password pair are present.
    pub fn resolve(
        use_api_key: bool,
        api_key: Option<String>,
        username: Option<String>,
        password: Option<String>,
    ) -> Self {
        let basic = match (username, password) {
            (Some(username), Some(password)) => Some(Credentials::Basic { username, password }),
            _ => None,
        };
        let api_key = api_key.filter(|k| !k.is_empty()).map(Credentials::ApiKey);

        match (use_api_key, api_key, basic) {
            (true, Some(key), _) => key,
            (false, _, Some(basic)) => basic,
            (_, Some(key), None) => key,
            (_, None, Some(basic)) => basic,
            _ => Credentials::None,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::None => write!(f, "None"),
            Credentials::ApiKey(_) => write!(f, "ApiKey(***)"),
            Credentials::Basic { username, .. } => write!(f, "Basic({username}:***)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = ElasticsearchConfig::default();
        assert!(config.use_api_key);
        assert!(config.verify_ssl);
        assert_eq!(config.index_prefix, "camtrap-media");
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.request_timeout(), Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_uppercase_prefix() {
        let config = ElasticsearchConfig {
            index_prefix: "Media".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(LoaderError::Configuration(_))
        ));
    }

    #[test]
    fn test_validation_rejects_zero_concurrency() {
        let config = ElasticsearchConfig {
            concurrency: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_credentials_prefer_api_key_when_requested() {
        let creds = Credentials::resolve(
            true,
            Some("key".into()),
            Some("elastic".into()),
            Some("changeme".into()),
        );
        assert_eq!(creds, Credentials::ApiKey("key".into()));

        let creds = Credentials::resolve(
            false,
            Some("key".into()),
            Some("elastic".into()),
            Some("changeme".into()),
        );
        assert!(matches!(creds, Credentials::Basic { .. }));
    }

    #[test]
    fn test_credentials_fall_back_to_what_is_present() {
        let creds = Credentials::resolve(true, None, Some("elastic".into()), Some("pw".into()));
        assert!(matches!(creds, Credentials::Basic { .. }));
        assert_eq!(Credentials::resolve(true, None, Some("elastic".into()), None), Credentials::None);
        assert_eq!(Credentials::resolve(false, Some("k".into()), None, None), Credentials::ApiKey("k".into()));
    }

    #[test]
    fn test_credentials_debug_redacts_secrets() {
        let basic = Credentials::Basic {
            username: "elastic".into(),
            password: "hunter2".into(),
        };
        let rendered = format!("{:?}", basic);
        assert!(rendered.contains("elastic"));
        assert!(!rendered.contains("hunter2"));
        assert!(!format!("{:?}", Credentials::ApiKey("secret".into())).contains("secret"));
    }
}
