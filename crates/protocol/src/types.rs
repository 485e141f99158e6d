//! Identifiers and payload types shared by lifecycle notifications and events.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier of a capture session, unique within one coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "session#{}", self.0)
	}
}

/// Correlation handle for a query; the service echoes it back exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(pub u64);

impl fmt::Display for CorrelationId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Opaque identity of the scope instance that owns a session (e.g. one screen).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LifecycleToken(String);

impl LifecycleToken {
	pub fn new(token: impl Into<String>) -> Self {
		Self(token.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for LifecycleToken {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for LifecycleToken {
	fn from(value: &str) -> Self {
		Self::new(value)
	}
}

/// Package/component identity of a scope or of the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentName {
	pub package: String,
	pub class: String,
}

impl ComponentName {
	pub fn new(package: impl Into<String>, class: impl Into<String>) -> Self {
		Self {
			package: package.into(),
			class: class.into(),
		}
	}

	/// Short form used in logs and dumps (`pkg/.Class` when the class lives in the package).
	pub fn flatten_short(&self) -> String {
		match self.class.strip_prefix(self.package.as_str()) {
			Some(rest) if rest.starts_with('.') => format!("{}/{}", self.package, rest),
			_ => self.to_string(),
		}
	}
}

impl fmt::Display for ComponentName {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}/{}", self.package, self.class)
	}
}

/// A captured event buffered by a session. The payload is opaque to the coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureEvent {
	pub kind: String,
	#[serde(default, skip_serializing_if = "Value::is_null")]
	pub payload: Value,
}

impl CaptureEvent {
	pub fn new(kind: impl Into<String>) -> Self {
		Self {
			kind: kind.into(),
			payload: Value::Null,
		}
	}

	pub fn with_payload(mut self, payload: Value) -> Self {
		self.payload = payload;
		self
	}
}

/// Why buffered events are being flushed to the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushReason {
	/// Buffer reached its configured capacity.
	Full,
	SessionStarted,
	SessionFinished,
	ScreenOff,
	ActivityPaused,
	ActivityResumed,
	Explicit,
	ForceFlush,
}

impl FlushReason {
	pub fn as_str(self) -> &'static str {
		match self {
			FlushReason::Full => "full",
			FlushReason::SessionStarted => "session_started",
			FlushReason::SessionFinished => "session_finished",
			FlushReason::ScreenOff => "screen_off",
			FlushReason::ActivityPaused => "activity_paused",
			FlushReason::ActivityResumed => "activity_resumed",
			FlushReason::Explicit => "explicit",
			FlushReason::ForceFlush => "force_flush",
		}
	}
}

impl fmt::Display for FlushReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn component_short_form_collapses_package_prefix() {
		let name = ComponentName::new("com.example.app", "com.example.app.MainScreen");
		assert_eq!(name.flatten_short(), "com.example.app/.MainScreen");

		let foreign = ComponentName::new("com.example.app", "org.other.Screen");
		assert_eq!(foreign.flatten_short(), "com.example.app/org.other.Screen");
	}

	#[test]
	fn flush_reason_wire_name_matches_display() {
		let json = serde_json::to_string(&FlushReason::ActivityPaused).unwrap();
		assert_eq!(json, "\"activity_paused\"");
		assert_eq!(FlushReason::ActivityPaused.to_string(), "activity_paused");
	}

	#[test]
	fn event_without_payload_omits_field() {
		let json = serde_json::to_value(CaptureEvent::new("e1")).unwrap();
		assert_eq!(json, serde_json::json!({ "kind": "e1" }));
	}
}
