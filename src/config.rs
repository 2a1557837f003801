//! Client configuration
//!
//! Settings for reaching the submission service. They are read from the
//! environment; when no base URL is configured the engine still works and
//! every session resolves its result locally.

use std::{env, time::Duration};

use crate::constants::submission::DEFAULT_TIMEOUT_SECS;

/// Connection settings for the submission service
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the quiz API, e.g. `https://api.example.com/v1`
    pub base_url: String,
    /// Bearer token sent with each submission
    pub api_token: Option<String>,
    /// Request timeout
    pub timeout: Duration,
}

impl ClientConfig {
    /// Creates a config for `base_url` with no token and the default timeout
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_token: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Sets the bearer token
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    /// Sets the request timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Reads `QUIZ_API_BASE_URL`, `QUIZ_API_TOKEN` and `QUIZ_SUBMIT_TIMEOUT_SECS`
    ///
    /// Returns `None` when the base URL is unset or blank.
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Option<Self> {
        let base_url = lookup("QUIZ_API_BASE_URL").filter(|url| !url.trim().is_empty())?;

        let mut config = Self::new(base_url.trim());
        if let Some(token) = lookup("QUIZ_API_TOKEN").filter(|t| !t.trim().is_empty()) {
            config = config.with_token(token);
        }
        match lookup("QUIZ_SUBMIT_TIMEOUT_SECS").map(|raw| raw.trim().parse::<u64>()) {
            Some(Ok(secs)) if secs > 0 => config = config.with_timeout(Duration::from_secs(secs)),
            Some(_) => {
                tracing::warn!("ignoring invalid QUIZ_SUBMIT_TIMEOUT_SECS, using default");
            }
            None => {}
        }

        Some(config)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_missing_base_url_disables_submission() {
        assert_eq!(ClientConfig::from_lookup(lookup(&[])), None);
        assert_eq!(
            ClientConfig::from_lookup(lookup(&[("QUIZ_API_BASE_URL", "  ")])),
            None
        );
    }

    #[test]
    fn test_defaults() {
        let config =
            ClientConfig::from_lookup(lookup(&[("QUIZ_API_BASE_URL", "https://x.test")])).unwrap();
        assert_eq!(config, ClientConfig::new("https://x.test"));
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    }

    #[test]
    fn test_token_and_timeout() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("QUIZ_API_BASE_URL", "https://x.test"),
            ("QUIZ_API_TOKEN", "secret"),
            ("QUIZ_SUBMIT_TIMEOUT_SECS", "4"),
        ]))
        .unwrap();
        assert_eq!(config.api_token.as_deref(), Some("secret"));
        assert_eq!(config.timeout, Duration::from_secs(4));
    }

    #[test]
    fn test_invalid_timeout_falls_back_to_default() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("QUIZ_API_BASE_URL", "https://x.test"),
            ("QUIZ_SUBMIT_TIMEOUT_SECS", "soon"),
        ]))
        .unwrap();
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    }
}
