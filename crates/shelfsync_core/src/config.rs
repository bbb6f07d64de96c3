//! Run configuration, read once from the environment before any request is made.
use core::fmt;
use core::num::NonZeroUsize;
use core::time::Duration;
use std::env;

pub const NOTION_KEY: &str = "NOTION_KEY";
pub const NOTION_DATABASE_ID: &str = "NOTION_DATABASE_ID";
pub const GOODREADS_ID: &str = "GOODREADS_ID";
pub const SYNC_BATCH_SIZE: &str = "SYNC_BATCH_SIZE";
pub const REQUEST_TIMEOUT_SECS: &str = "REQUEST_TIMEOUT_SECS";
pub const NOTION_API_URL: &str = "NOTION_API_URL";
pub const GOODREADS_URL: &str = "GOODREADS_URL";

pub const DEFAULT_BATCH_SIZE: usize = 25;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 25;
pub const DEFAULT_NOTION_API_URL: &str = "https://api.notion.com";
pub const DEFAULT_GOODREADS_URL: &str = "https://www.goodreads.com";

#[non_exhaustive]
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}

#[non_exhaustive]
#[derive(Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Notion integration token
    pub notion_key: String,
    pub database_id: String,
    pub goodreads_id: String,
    pub batch_size: NonZeroUsize,
    /// Deadline applied to every outbound request
    pub request_timeout: Duration,
    pub notion_api_url: String,
    pub goodreads_url: String,
}

impl SyncConfig {
    /// Reads the configuration from the process environment.
    /// # Errors
    /// Fails if a required variable is missing or an optional one holds an invalid value
    #[allow(
        clippy::missing_inline_in_public_items,
        reason = "Called once at start of program"
    )]
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup. Blank values count as missing.
    /// # Errors
    /// Fails if a required key is missing or an optional one holds an invalid value
    #[allow(
        clippy::missing_inline_in_public_items,
        reason = "Called once at start of program"
    )]
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_owned())
                .filter(|raw| !raw.is_empty())
        };
        let required = |key: &'static str| value(key).ok_or(ConfigError::Missing(key));

        let notion_key = required(NOTION_KEY)?;
        let database_id = required(NOTION_DATABASE_ID)?;
        let goodreads_id = required(GOODREADS_ID)?;

        let batch_size = match value(SYNC_BATCH_SIZE) {
            None => NonZeroUsize::new(DEFAULT_BATCH_SIZE).ok_or(ConfigError::Invalid {
                key: SYNC_BATCH_SIZE,
                value: DEFAULT_BATCH_SIZE.to_string(),
            })?,
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                key: SYNC_BATCH_SIZE,
                value: raw,
            })?,
        };

        let request_timeout = match value(REQUEST_TIMEOUT_SECS) {
            None => Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::Invalid {
                        key: REQUEST_TIMEOUT_SECS,
                        value: raw,
                    });
                }
            },
        };

        let notion_api_url = value(NOTION_API_URL)
            .unwrap_or_else(|| DEFAULT_NOTION_API_URL.to_owned())
            .trim_end_matches('/')
            .to_owned();
        let goodreads_url = value(GOODREADS_URL)
            .unwrap_or_else(|| DEFAULT_GOODREADS_URL.to_owned())
            .trim_end_matches('/')
            .to_owned();

        Ok(Self {
            notion_key,
            database_id,
            goodreads_id,
            batch_size,
            request_timeout,
            notion_api_url,
            goodreads_url,
        })
    }
}

// Keeps the integration token out of logs.
impl fmt::Debug for SyncConfig {
    #[allow(
        clippy::missing_inline_in_public_items,
        reason = "Only used for logging"
    )]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncConfig")
            .field("notion_key", &"<redacted>")
            .field("database_id", &self.database_id)
            .field("goodreads_id", &self.goodreads_id)
            .field("batch_size", &self.batch_size)
            .field("request_timeout", &self.request_timeout)
            .field("notion_api_url", &self.notion_api_url)
            .field("goodreads_url", &self.goodreads_url)
            .finish()
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "Tests are predefined and guaranteed to be Some/Ok"
)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        (NOTION_KEY, "secret_abc"),
        (NOTION_DATABASE_ID, "db-123"),
        (GOODREADS_ID, "4242"),
    ];

    #[test]
    fn defaults_apply_when_only_required_keys_are_set() {
        let config = SyncConfig::from_lookup(lookup_from(&REQUIRED)).unwrap();

        assert_eq!(config.notion_key, "secret_abc");
        assert_eq!(config.database_id, "db-123");
        assert_eq!(config.goodreads_id, "4242");
        assert_eq!(config.batch_size.get(), 25);
        assert_eq!(config.request_timeout, Duration::from_secs(25));
        assert_eq!(config.notion_api_url, "https://api.notion.com");
        assert_eq!(config.goodreads_url, "https://www.goodreads.com");
    }

    #[test]
    fn each_required_key_is_reported_when_missing() {
        for missing in [NOTION_KEY, NOTION_DATABASE_ID, GOODREADS_ID] {
            let pairs: Vec<(&str, &str)> = REQUIRED
                .iter()
                .copied()
                .filter(|(key, _)| *key != missing)
                .collect();
            assert_eq!(
                SyncConfig::from_lookup(lookup_from(&pairs)),
                Err(ConfigError::Missing(missing))
            );
        }
    }

    #[test]
    fn blank_value_counts_as_missing() {
        let mut pairs = REQUIRED.to_vec();
        pairs[2] = (GOODREADS_ID, "   ");
        assert_eq!(
            SyncConfig::from_lookup(lookup_from(&pairs)),
            Err(ConfigError::Missing(GOODREADS_ID))
        );
    }

    #[test]
    fn overrides_are_read() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push((SYNC_BATCH_SIZE, "10"));
        pairs.push((REQUEST_TIMEOUT_SECS, "5"));
        pairs.push((NOTION_API_URL, "http://127.0.0.1:1234/"));
        pairs.push((GOODREADS_URL, "http://127.0.0.1:5678"));

        let config = SyncConfig::from_lookup(lookup_from(&pairs)).unwrap();

        assert_eq!(config.batch_size.get(), 10);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.notion_api_url, "http://127.0.0.1:1234");
        assert_eq!(config.goodreads_url, "http://127.0.0.1:5678");
    }

    #[test]
    fn zero_or_garbage_batch_size_is_rejected() {
        for raw in ["0", "-3", "lots"] {
            let mut pairs = REQUIRED.to_vec();
            pairs.push((SYNC_BATCH_SIZE, raw));
            assert_eq!(
                SyncConfig::from_lookup(lookup_from(&pairs)),
                Err(ConfigError::Invalid {
                    key: SYNC_BATCH_SIZE,
                    value: raw.to_owned(),
                })
            );
        }
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push((REQUEST_TIMEOUT_SECS, "0"));
        assert_eq!(
            SyncConfig::from_lookup(lookup_from(&pairs)),
            Err(ConfigError::Invalid {
                key: REQUEST_TIMEOUT_SECS,
                value: "0".to_owned(),
            })
        );
    }

    #[test]
    fn debug_output_hides_the_token() {
        let config = SyncConfig::from_lookup(lookup_from(&REQUIRED)).unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("secret_abc"));
        assert!(rendered.contains("<redacted>"));
    }
}
