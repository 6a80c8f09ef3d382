use std::time::Duration;

use crate::validation::{validate_backend_address, validate_poll_interval};
use crate::ValidationError;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;

/// Session-wide client configuration. Fields only change through the validating setters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    backend_url: String,
    poll_interval_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl Settings {
    /// Builds settings from untrusted values, e.g. a persisted record.
    pub fn new(backend_url: &str, poll_interval_ms: u64) -> Result<Self, ValidationError> {
        let mut settings = Self::default();
        settings.set_backend_url(backend_url)?;
        settings.set_poll_interval_ms(poll_interval_ms)?;
        Ok(settings)
    }

    pub fn backend_url(&self) -> &str {
        &self.backend_url
    }

    pub fn poll_interval_ms(&self) -> u64 {
        self.poll_interval_ms
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn set_backend_url(&mut self, url: &str) -> Result<(), ValidationError> {
        validate_backend_address(url)?;
        self.backend_url = url.trim().to_string();
        Ok(())
    }

    pub fn set_poll_interval_ms(&mut self, interval_ms: u64) -> Result<(), ValidationError> {
        validate_poll_interval(interval_ms)?;
        self.poll_interval_ms = interval_ms;
        Ok(())
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
