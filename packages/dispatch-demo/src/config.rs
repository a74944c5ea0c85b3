use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use event_dispatcher::FanoutMode;

/// Demo configuration loaded from environment variables
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Number of events to generate.
    pub events: u64,
    /// Pause between two generated events.
    pub interval: Duration,
    pub fanout: FanoutMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            events: 10,
            interval: Duration::from_millis(100),
            fanout: FanoutMode::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from any key lookup; unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let events = match lookup("DISPATCH_EVENTS") {
            Some(raw) => raw
                .parse::<u64>()
                .context("DISPATCH_EVENTS must be a non-negative number")?,
            None => defaults.events,
        };
        let interval = match lookup("DISPATCH_INTERVAL_MS") {
            Some(raw) => Duration::from_millis(
                raw.parse::<u64>()
                    .context("DISPATCH_INTERVAL_MS must be a number of milliseconds")?,
            ),
            None => defaults.interval,
        };
        let fanout = match lookup("DISPATCH_FANOUT") {
            Some(raw) => raw
                .parse::<FanoutMode>()
                .context("DISPATCH_FANOUT must be 'concurrent' or 'serialized'")?,
            None => defaults.fanout,
        };

        Ok(Self {
            events,
            interval,
            fanout,
        })
    }
}
