//! Messages sent to and received from the capture service.
//!
//! Outbound traffic is one-way: [`RemoteMessage`] values are fire-and-forget
//! except for [`RemoteMessage::Query`], whose [`CorrelationId`] the service
//! echoes back in exactly one [`QueryResponse`].
//!
//! ```json
//! { "method": "query", "correlation_id": 7, "query": "feature_enabled" }
//! { "kind": "response", "correlation_id": 7, "reply": { "type": "feature_enabled", "value": true } }
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::flags::CaptureFlags;
use crate::removal::UserDataRemovalRequest;
use crate::types::{CaptureEvent, ComponentName, CorrelationId, FlushReason, LifecycleToken, SessionId};

/// Outbound message from the coordinator to the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum RemoteMessage {
	/// A session was bound to a scope and started.
	SessionStarted {
		session_id: SessionId,
		token: LifecycleToken,
		scope: ComponentName,
		flags: CaptureFlags,
	},
	/// Buffered events for a session, in capture order.
	SendEvents {
		session_id: SessionId,
		reason: FlushReason,
		events: Vec<CaptureEvent>,
	},
	/// A session was destroyed; no further messages follow for it.
	SessionFinished { session_id: SessionId },
	RemoveUserData { request: UserDataRemovalRequest },
	/// Request that expects exactly one correlated [`QueryResponse`].
	Query { correlation_id: CorrelationId, query: Query },
}

impl RemoteMessage {
	/// Session this message belongs to, if any.
	pub fn session_id(&self) -> Option<SessionId> {
		match self {
			RemoteMessage::SessionStarted { session_id, .. }
			| RemoteMessage::SendEvents { session_id, .. }
			| RemoteMessage::SessionFinished { session_id } => Some(*session_id),
			RemoteMessage::RemoveUserData { .. } | RemoteMessage::Query { .. } => None,
		}
	}

	/// Short method name used in logs.
	pub fn method(&self) -> &'static str {
		match self {
			RemoteMessage::SessionStarted { .. } => "session_started",
			RemoteMessage::SendEvents { .. } => "send_events",
			RemoteMessage::SessionFinished { .. } => "session_finished",
			RemoteMessage::RemoveUserData { .. } => "remove_user_data",
			RemoteMessage::Query { .. } => "query",
		}
	}
}

/// Queries the coordinator can issue as bounded calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Query {
	/// Whether the capture feature is enabled for the current user.
	FeatureEnabled,
	/// Component name of the service consuming captured events.
	ServiceComponentName,
}

impl fmt::Display for Query {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Query::FeatureEnabled => f.write_str("feature_enabled"),
			Query::ServiceComponentName => f.write_str("service_component_name"),
		}
	}
}

/// Typed payload of a successful query response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum QueryReply {
	FeatureEnabled(bool),
	ServiceComponentName(Option<ComponentName>),
}

impl QueryReply {
	pub fn kind(&self) -> &'static str {
		match self {
			QueryReply::FeatureEnabled(_) => "feature_enabled",
			QueryReply::ServiceComponentName(_) => "service_component_name",
		}
	}
}

/// Response to a [`RemoteMessage::Query`].
///
/// `reply` and `error` are mutually exclusive; a response with neither is
/// treated as a remote failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
	pub correlation_id: CorrelationId,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub reply: Option<QueryReply>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

impl QueryResponse {
	pub fn ok(correlation_id: CorrelationId, reply: QueryReply) -> Self {
		Self {
			correlation_id,
			reply: Some(reply),
			error: None,
		}
	}

	pub fn err(correlation_id: CorrelationId, message: impl Into<String>) -> Self {
		Self {
			correlation_id,
			reply: None,
			error: Some(message.into()),
		}
	}
}

/// Enablement state pushed by the service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteState {
	/// Service reports capture as disabled for this process.
	pub disabled: bool,
	/// Service-originated bits; non-service bits are ignored by the receiver.
	#[serde(default)]
	pub service_flags: CaptureFlags,
}

/// Inbound message from the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Inbound {
	Response(QueryResponse),
	StateUpdate(RemoteState),
}
