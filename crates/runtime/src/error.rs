//! Error types for the capture coordinator.
//!
//! Fire-and-forget operations never surface these to callers; they are logged
//! where they happen. Operations with a response contract (queries, user data
//! removal) always return them.

use std::time::Duration;

use capture_protocol::CorrelationId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
	/// The channel to the remote endpoint is unusable (endpoint gone, send rejected).
	#[error("Transport failure: {0}")]
	TransportFailure(String),

	/// A bounded call exceeded its deadline.
	#[error("Timed out after {0:?} waiting for remote response")]
	Timeout(Duration),

	/// No remote endpoint is bound; nothing was attempted.
	#[error("No remote endpoint configured")]
	NotConfigured,

	/// Operation targeted a session that can no longer accept it.
	#[error("Invalid session state: {0}")]
	InvalidState(String),

	#[error("Invalid request: {0}")]
	InvalidRequest(String),

	/// The remote endpoint answered with an error payload.
	#[error("Remote endpoint error: {0}")]
	Remote(String),

	#[error("Unexpected reply: expected {expected}, got {actual}")]
	UnexpectedReply { expected: &'static str, actual: &'static str },

	/// A response arrived for a call that is no longer waiting (late or unknown).
	#[error("No pending call for correlation id {0}")]
	UnknownCorrelation(CorrelationId),

	/// The coordinator worker has stopped and can no longer accept work.
	#[error("Coordinator worker channel closed")]
	ChannelClosed,

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

impl Error {
	pub fn is_timeout(&self) -> bool {
		matches!(self, Error::Timeout(_))
	}

	pub fn is_transport_failure(&self) -> bool {
		matches!(self, Error::TransportFailure(_) | Error::ChannelClosed)
	}
}
