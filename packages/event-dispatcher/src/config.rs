//! Dispatcher configuration.

use std::fmt;
use std::str::FromStr;

/// Default prefix for worker thread names (`dispatch-<type>`).
pub const DEFAULT_THREAD_NAME_PREFIX: &str = "dispatch";

/// How fan-out for different event types relates to each other.
///
/// Handler registration is never blocked by fan-out in either mode: each
/// type's handler list has its own read/write lock, and dispatch only holds
/// the read side long enough to take a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FanoutMode {
    /// Each worker fans out independently; types run in parallel.
    #[default]
    Concurrent,
    /// A single global lock is held for every fan-out, so at most one event
    /// (of any type) is being handled at a time.
    Serialized,
}

impl FanoutMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FanoutMode::Concurrent => "concurrent",
            FanoutMode::Serialized => "serialized",
        }
    }
}

impl fmt::Display for FanoutMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown [`FanoutMode`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown fan-out mode '{0}' (expected 'concurrent' or 'serialized')")]
pub struct ParseFanoutModeError(String);

impl FromStr for FanoutMode {
    type Err = ParseFanoutModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "concurrent" => Ok(FanoutMode::Concurrent),
            "serialized" | "serialised" => Ok(FanoutMode::Serialized),
            other => Err(ParseFanoutModeError(other.to_string())),
        }
    }
}

/// Settings applied when the dispatcher spawns its workers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Fan-out serialization across types.
    pub fanout: FanoutMode,
    /// Worker threads are named `<prefix>-<event type name>`.
    pub thread_name_prefix: String,
    /// Stack size for worker threads. `None` uses the platform default.
    pub stack_size: Option<usize>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            fanout: FanoutMode::default(),
            thread_name_prefix: DEFAULT_THREAD_NAME_PREFIX.to_string(),
            stack_size: None,
        }
    }
}

impl DispatcherConfig {
    pub(crate) fn thread_name(&self, type_name: &str) -> String {
        format!("{}-{}", self.thread_name_prefix, type_name)
    }
}
