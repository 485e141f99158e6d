//! Capture session bound to one scope instance.
//!
//! A session never talks to the transport itself. Every operation returns the
//! [`RemoteMessage`]s it wants delivered, in order, and the coordinator worker
//! sends them after releasing the coordinator lock. Operations that cannot
//! apply (anything after destroy) are dropped with a diagnostic instead of
//! failing the caller.

use std::fmt::{self, Write as _};

use capture_protocol::{CaptureEvent, CaptureFlags, ComponentName, FlushReason, LifecycleToken, RemoteMessage, SessionId};
use capture_runtime::Error;
use serde::Serialize;
use tracing::{debug, trace, warn};

/// Lifecycle of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
	Created,
	Started,
	/// Only observable while a flush drains the buffer.
	Flushing,
	Destroyed,
}

impl fmt::Display for SessionState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			SessionState::Created => "created",
			SessionState::Started => "started",
			SessionState::Flushing => "flushing",
			SessionState::Destroyed => "destroyed",
		};
		f.write_str(name)
	}
}

/// Point-in-time view of a session handed out to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
	pub id: SessionId,
	pub state: SessionState,
	pub lifecycle_token: Option<LifecycleToken>,
	pub scope: Option<ComponentName>,
	pub flags: CaptureFlags,
	pub pending_events: usize,
}

#[derive(Debug)]
pub struct Session {
	id: SessionId,
	lifecycle_token: Option<LifecycleToken>,
	scope: Option<ComponentName>,
	flags: CaptureFlags,
	state: SessionState,
	buffer: Vec<CaptureEvent>,
	max_buffer_size: usize,
	events_flushed: u64,
}

impl Session {
	/// Creates a session seeded with the coordinator's flags at creation time.
	pub fn new(id: SessionId, flags: CaptureFlags, max_buffer_size: usize) -> Self {
		Self {
			id,
			lifecycle_token: None,
			scope: None,
			flags,
			state: SessionState::Created,
			buffer: Vec::new(),
			max_buffer_size: max_buffer_size.max(1),
			events_flushed: 0,
		}
	}

	pub fn id(&self) -> SessionId {
		self.id
	}

	pub fn state(&self) -> SessionState {
		self.state
	}

	pub fn flags(&self) -> CaptureFlags {
		self.flags
	}

	pub fn pending_events(&self) -> usize {
		self.buffer.len()
	}

	pub fn is_destroyed(&self) -> bool {
		self.state == SessionState::Destroyed
	}

	/// Binds the session to `token` and announces it to the service.
	///
	/// Starting again with the same token is a no-op. A different token while
	/// started is ignored with a warning; the scope must stop first.
	pub fn start(&mut self, token: LifecycleToken, scope: ComponentName, flags: CaptureFlags) -> Vec<RemoteMessage> {
		match self.state {
			SessionState::Created => {}
			SessionState::Destroyed => {
				self.reject("start");
				return Vec::new();
			}
			SessionState::Started | SessionState::Flushing => {
				if self.lifecycle_token.as_ref() == Some(&token) {
					debug!(target = "capture.session", session_id = %self.id, %token, "session already started");
				} else {
					warn!(
						target = "capture.session",
						session_id = %self.id,
						%token,
						current = ?self.lifecycle_token,
						"ignoring start for a different scope while started"
					);
				}
				return Vec::new();
			}
		}

		self.lifecycle_token = Some(token.clone());
		self.scope = Some(scope.clone());
		self.flags = flags;
		self.state = SessionState::Started;
		debug!(
			target = "capture.session",
			session_id = %self.id,
			%token,
			scope = %scope.flatten_short(),
			%flags,
			"session started"
		);

		vec![RemoteMessage::SessionStarted {
			session_id: self.id,
			token,
			scope,
			flags,
		}]
	}

	/// Buffers `event`; flushes with [`FlushReason::Full`] once the buffer is full.
	pub fn record(&mut self, event: CaptureEvent) -> Vec<RemoteMessage> {
		if self.state != SessionState::Started {
			trace!(target = "capture.session", session_id = %self.id, state = %self.state, kind = %event.kind, "dropping event");
			return Vec::new();
		}
		if self.flags.is_disabled() {
			trace!(target = "capture.session", session_id = %self.id, flags = %self.flags, "capture disabled; dropping event");
			return Vec::new();
		}

		self.buffer.push(event);
		if self.buffer.len() >= self.max_buffer_size {
			return self.flush(FlushReason::Full);
		}
		Vec::new()
	}

	/// Drains the buffer into one [`RemoteMessage::SendEvents`].
	pub fn flush(&mut self, reason: FlushReason) -> Vec<RemoteMessage> {
		if self.is_destroyed() {
			self.reject("flush");
			return Vec::new();
		}
		if self.buffer.is_empty() {
			trace!(target = "capture.session", session_id = %self.id, %reason, "nothing to flush");
			return Vec::new();
		}

		let previous = std::mem::replace(&mut self.state, SessionState::Flushing);
		let events = std::mem::take(&mut self.buffer);
		self.events_flushed += events.len() as u64;
		debug!(target = "capture.session", session_id = %self.id, %reason, count = events.len(), "flushing events");
		self.state = previous;

		vec![RemoteMessage::SendEvents {
			session_id: self.id,
			reason,
			events,
		}]
	}

	/// Flushes whatever is buffered, then signals the end of the session.
	///
	/// The finish signal is only sent when the service saw the start.
	pub fn destroy(&mut self) -> Vec<RemoteMessage> {
		if self.is_destroyed() {
			debug!(target = "capture.session", session_id = %self.id, "session already destroyed");
			return Vec::new();
		}

		let announced = self.state != SessionState::Created;
		let mut outbound = self.flush(FlushReason::SessionFinished);
		if announced {
			outbound.push(RemoteMessage::SessionFinished { session_id: self.id });
		}

		self.state = SessionState::Destroyed;
		self.buffer = Vec::new();
		debug!(target = "capture.session", session_id = %self.id, "session destroyed");
		outbound
	}

	pub fn snapshot(&self) -> SessionSnapshot {
		SessionSnapshot {
			id: self.id,
			state: self.state,
			lifecycle_token: self.lifecycle_token.clone(),
			scope: self.scope.clone(),
			flags: self.flags,
			pending_events: self.buffer.len(),
		}
	}

	pub fn dump(&self, prefix: &str) -> String {
		let mut out = String::new();
		let _ = writeln!(out, "{prefix}id: {}", self.id);
		let _ = writeln!(out, "{prefix}state: {}", self.state);
		match &self.lifecycle_token {
			Some(token) => {
				let _ = writeln!(out, "{prefix}token: {token}");
			}
			None => {
				let _ = writeln!(out, "{prefix}token: none");
			}
		}
		if let Some(scope) = &self.scope {
			let _ = writeln!(out, "{prefix}scope: {}", scope.flatten_short());
		}
		let _ = writeln!(out, "{prefix}flags: {}", self.flags);
		let _ = writeln!(out, "{prefix}buffered events: {}/{}", self.buffer.len(), self.max_buffer_size);
		let _ = writeln!(out, "{prefix}flushed events: {}", self.events_flushed);
		out
	}

	fn reject(&self, operation: &str) {
		let err = Error::InvalidState(format!("{operation} on destroyed {}", self.id));
		debug!(target = "capture.session", session_id = %self.id, error = %err, "dropping session operation");
	}
}
