//! Client configuration.
//!
//! Everything has a local-development default; environment variables
//! override it.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{ApiError, ApiResult};
use crate::session::{FileTokenStore, MemoryTokenStore, Session, TokenStore};

/// Backend base URL used when `RENTAL_API_URL` is unset.
pub const DEFAULT_BASE_URL: &str = "http://localhost:5000/api";

/// Delay before the simulated gateway answers.
pub const DEFAULT_PAYMENT_DELAY: Duration = Duration::from_secs(2);

/// Delay before demo reports are returned.
pub const DEFAULT_REPORT_DELAY: Duration = Duration::from_millis(800);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    /// Where the bearer token is persisted. `None` keeps it in memory.
    pub token_file: Option<PathBuf>,
    pub payment_delay: Duration,
    pub report_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token_file: None,
            payment_delay: DEFAULT_PAYMENT_DELAY,
            report_delay: DEFAULT_REPORT_DELAY,
        }
    }
}

impl ClientConfig {
    /// Reads:
    /// - `RENTAL_API_URL`: backend base URL
    /// - `RENTAL_TOKEN_FILE`: path of the persisted token file
    /// - `RENTAL_PAYMENT_DELAY_MS`, `RENTAL_REPORT_DELAY_MS`: simulated delays
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: env::var("RENTAL_API_URL")
                .ok()
                .filter(|url| !url.trim().is_empty())
                .unwrap_or(defaults.base_url),
            token_file: env::var("RENTAL_TOKEN_FILE")
                .ok()
                .filter(|path| !path.trim().is_empty())
                .map(PathBuf::from),
            payment_delay: millis_from_env("RENTAL_PAYMENT_DELAY_MS").unwrap_or(defaults.payment_delay),
            report_delay: millis_from_env("RENTAL_REPORT_DELAY_MS").unwrap_or(defaults.report_delay),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    #[must_use]
    pub fn with_token_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_file = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_payment_delay(mut self, delay: Duration) -> Self {
        self.payment_delay = delay;
        self
    }

    #[must_use]
    pub fn with_report_delay(mut self, delay: Duration) -> Self {
        self.report_delay = delay;
        self
    }

    pub fn validate(&self) -> ApiResult<()> {
        if self.base_url.is_empty() {
            return Err(ApiError::config("base_url cannot be empty"));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ApiError::config("base_url must start with http:// or https://"));
        }
        Ok(())
    }

    /// Session backed by the configured token store.
    pub fn session(&self) -> Session {
        let store: Arc<dyn TokenStore> = match &self.token_file {
            Some(path) => Arc::new(FileTokenStore::new(path.clone())),
            None => Arc::new(MemoryTokenStore::new()),
        };
        Session::new(store)
    }
}

fn millis_from_env(key: &str) -> Option<Duration> {
    env::var(key).ok()?.trim().parse().ok().map(Duration::from_millis)
}
