//! Effective usage statistics settings

use std::time::Duration;

use error_handling::RetryPolicy;

use crate::event::ContextIdentity;

/// Overrides the collector URL, for staging and tests
pub const USAGE_STATISTICS_URL_ENV: &str = "GE_USAGE_STATISTICS_URL";

/// `false`, `0`, `no` or `off` disables usage statistics
pub const USAGE_STATISTICS_ENABLED_ENV: &str = "GE_USAGE_STATS";

pub const DEFAULT_USAGE_STATISTICS_URL: &str =
    "https://stats.greatexpectations.io/great_expectations/v1/usage_statistics";

#[derive(Debug, Clone)]
pub struct UsageStatisticsSettings {
    pub enabled: bool,
    pub url: String,
    pub identity: ContextIdentity,
    pub library_version: String,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub retry: RetryPolicy,
}

impl UsageStatisticsSettings {
    pub fn new(identity: ContextIdentity, library_version: impl Into<String>) -> Self {
        Self {
            enabled: true,
            url: DEFAULT_USAGE_STATISTICS_URL.to_string(),
            identity,
            library_version: library_version.into(),
            request_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
            retry: RetryPolicy::single_attempt(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Applies `GE_USAGE_STATISTICS_URL` and `GE_USAGE_STATS`
    pub fn with_env(mut self) -> Self {
        if let Some(url) = std::env::var(USAGE_STATISTICS_URL_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
        {
            self.url = url;
        }

        if let Ok(value) = std::env::var(USAGE_STATISTICS_ENABLED_ENV) {
            if is_disabled_flag(&value) {
                self.enabled = false;
            }
        }

        self
    }
}

fn is_disabled_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}
