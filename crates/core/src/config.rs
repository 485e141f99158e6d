//! Coordinator configuration.

use std::time::Duration;

use capture_runtime::{DEFAULT_SYNC_CALL_TIMEOUT_MS, Error, Result};
use serde::{Deserialize, Serialize};

/// Default number of events a session buffers before flushing on its own.
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 100;

/// Tunables for a [`SessionCoordinator`](crate::SessionCoordinator).
///
/// Missing fields fall back to their defaults when deserialized:
///
/// ```json
/// { "sync_call_timeout_ms": 2000 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
	/// Upper bound for synchronous calls to the capture service.
	pub sync_call_timeout_ms: u64,
	/// Buffered events per session before an automatic flush.
	pub max_buffer_size: usize,
}

impl Default for CoordinatorConfig {
	fn default() -> Self {
		Self {
			sync_call_timeout_ms: DEFAULT_SYNC_CALL_TIMEOUT_MS,
			max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
		}
	}
}

impl CoordinatorConfig {
	/// Parses and validates a JSON configuration document.
	pub fn from_json(json: &str) -> Result<Self> {
		let config: Self = serde_json::from_str(json)?;
		config.validate()?;
		Ok(config)
	}

	pub fn validate(&self) -> Result<()> {
		if self.sync_call_timeout_ms == 0 {
			return Err(Error::InvalidRequest("sync_call_timeout_ms must be greater than zero".to_string()));
		}
		if self.max_buffer_size == 0 {
			return Err(Error::InvalidRequest("max_buffer_size must be greater than zero".to_string()));
		}
		Ok(())
	}

	pub fn sync_call_timeout(&self) -> Duration {
		Duration::from_millis(self.sync_call_timeout_ms)
	}

	pub fn with_sync_call_timeout(mut self, timeout: Duration) -> Self {
		self.sync_call_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
		self
	}

	pub fn with_max_buffer_size(mut self, size: usize) -> Self {
		self.max_buffer_size = size;
		self
	}
}
