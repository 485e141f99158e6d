//! Session coordinator façade.
//!
//! The coordinator owns at most one main [`Session`] and the process-wide
//! [`EnablementState`], both behind a single lock. Lifecycle notifications,
//! flushes and recorded events are never applied on the caller's thread: they
//! are queued for the single worker run by [`CoordinatorDriver`], which takes
//! the lock, mutates the session, releases the lock and only then hands the
//! resulting messages to the transport. Enablement reads and writes are
//! applied directly under the lock and are safe from any thread.
//!
//! # Example
//!
//! ```ignore
//! let (parts, _controller) = FakeTransportBuilder::new().build();
//! let coordinator = SessionCoordinator::spawn(CoordinatorConfig::default(), Some(parts));
//!
//! coordinator.on_scope_started(LifecycleToken::new("A"), scope, CaptureFlags::empty());
//! coordinator.record_event(CaptureEvent::new("view_appeared"));
//! coordinator.flush(FlushReason::ActivityPaused);
//! coordinator.on_scope_stopped();
//! coordinator.drain().await?;
//! ```

use std::fmt::Write as _;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use capture_protocol::{
	CaptureEvent, CaptureFlags, ComponentName, FlushReason, Inbound, LifecycleToken, Query, QueryReply, RemoteMessage,
	RemoteState, SessionId, UserDataRemovalRequest,
};
use capture_runtime::{BoundedRemoteCall, CallRegistry, Error, Result, TransportParts};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, trace, warn};

use crate::config::CoordinatorConfig;
use crate::driver::CoordinatorDriver;
use crate::enablement::EnablementState;
use crate::session::{Session, SessionSnapshot};

/// Work that only the coordinator worker may perform.
pub(crate) enum Command {
	Session(SessionCommand),
	/// Hand one message to the transport and report the outcome.
	Send {
		message: RemoteMessage,
		ack: oneshot::Sender<Result<()>>,
	},
	/// Resolves once every earlier command has been processed.
	Barrier(oneshot::Sender<()>),
}

/// Session mutations applied under the coordinator lock.
pub(crate) enum SessionCommand {
	ScopeStarted {
		token: LifecycleToken,
		scope: ComponentName,
		flags: CaptureFlags,
	},
	ScopeStopped,
	Flush(FlushReason),
	Record(CaptureEvent),
	EnsureMainSession(oneshot::Sender<SessionSnapshot>),
}

#[derive(Debug, Default)]
pub(crate) struct CoordinatorState {
	pub(crate) enablement: EnablementState,
	pub(crate) main_session: Option<Session>,
}

/// State shared between the façade, the worker and the inbound pump.
pub(crate) struct Shared {
	pub(crate) state: Mutex<CoordinatorState>,
	pub(crate) calls: Arc<CallRegistry>,
	/// Identity of the remote endpoint; `None` when no transport is bound.
	pub(crate) endpoint: Option<String>,
	pub(crate) config: CoordinatorConfig,
	last_session_id: AtomicU64,
}

impl Shared {
	fn new(config: CoordinatorConfig, endpoint: Option<String>) -> Self {
		Self {
			state: Mutex::new(CoordinatorState::default()),
			calls: Arc::new(CallRegistry::new()),
			endpoint,
			config,
			last_session_id: AtomicU64::new(0),
		}
	}

	pub(crate) fn is_configured(&self) -> bool {
		self.endpoint.is_some()
	}

	/// Applies a session command and returns the messages to deliver, in order.
	///
	/// The lock is released before this returns; callers send afterwards.
	pub(crate) fn apply(&self, command: SessionCommand) -> Vec<RemoteMessage> {
		let mut state = self.state.lock();
		match command {
			SessionCommand::ScopeStarted { token, scope, flags } => {
				state.enablement.merge_flags(flags);
				let session_flags = state.enablement.session_flags();
				self.main_session_mut(&mut state).start(token, scope, session_flags)
			}
			SessionCommand::ScopeStopped => match state.main_session.take() {
				Some(mut session) => {
					let outbound = session.destroy();
					debug!(target = "capture.coordinator", session_id = %session.id(), "main session discarded");
					outbound
				}
				None => {
					debug!(target = "capture.coordinator", "scope stopped without a main session");
					Vec::new()
				}
			},
			SessionCommand::Flush(reason) => match state.main_session.as_mut() {
				Some(session) => session.flush(reason),
				None => {
					trace!(target = "capture.coordinator", %reason, "flush without a main session");
					Vec::new()
				}
			},
			SessionCommand::Record(event) => match state.main_session.as_mut() {
				Some(session) => session.record(event),
				None => {
					trace!(target = "capture.coordinator", kind = %event.kind, "event without a main session");
					Vec::new()
				}
			},
			SessionCommand::EnsureMainSession(reply) => {
				let snapshot = self.main_session_mut(&mut state).snapshot();
				let _ = reply.send(snapshot);
				Vec::new()
			}
		}
	}

	fn main_session_mut<'a>(&self, state: &'a mut CoordinatorState) -> &'a mut Session {
		let seed = state.enablement.session_flags();
		state.main_session.get_or_insert_with(|| {
			let id = SessionId(self.last_session_id.fetch_add(1, Ordering::SeqCst) + 1);
			debug!(target = "capture.coordinator", session_id = %id, flags = %seed, "main session created");
			Session::new(id, seed, self.config.max_buffer_size)
		})
	}

	pub(crate) fn apply_remote_state(&self, remote: RemoteState) {
		self.state.lock().enablement.apply_remote_state(remote);
		debug!(
			target = "capture.coordinator",
			disabled = remote.disabled,
			service_flags = %remote.service_flags,
			"remote state applied"
		);
	}

	pub(crate) fn handle_inbound(&self, message: Inbound) {
		match message {
			Inbound::Response(response) => {
				let correlation_id = response.correlation_id;
				if let Err(err) = self.calls.complete(response) {
					debug!(target = "capture.coordinator", %correlation_id, error = %err, "discarding response");
				}
			}
			Inbound::StateUpdate(remote) => self.apply_remote_state(remote),
		}
	}
}

/// Coordinates the main capture session and calls to the capture service.
///
/// Lifecycle methods return immediately; their effects are applied in call
/// order by the worker. Dropping the coordinator stops the worker once it has
/// processed everything already queued.
pub struct SessionCoordinator {
	shared: Arc<Shared>,
	commands: mpsc::UnboundedSender<Command>,
	bounded: BoundedRemoteCall,
}

impl SessionCoordinator {
	/// Creates a coordinator and the driver that runs its worker.
	///
	/// Pass `None` when no capture service is available: capture then reports
	/// disabled and lifecycle calls do nothing.
	pub fn new(config: CoordinatorConfig, transport: Option<TransportParts>) -> (Self, CoordinatorDriver) {
		let endpoint = transport.as_ref().map(|parts| parts.sender.describe());
		let shared = Arc::new(Shared::new(config, endpoint));
		let (commands, command_rx) = mpsc::unbounded_channel();
		let bounded = BoundedRemoteCall::new(Arc::clone(&shared.calls), shared.config.sync_call_timeout());

		info!(
			target = "capture.coordinator",
			endpoint = shared.endpoint.as_deref().unwrap_or("none"),
			timeout_ms = shared.config.sync_call_timeout_ms,
			"coordinator created"
		);

		let driver = CoordinatorDriver::new(Arc::clone(&shared), command_rx, transport);
		(Self { shared, commands, bounded }, driver)
	}

	/// Creates a coordinator and spawns its driver on the current tokio runtime.
	pub fn spawn(config: CoordinatorConfig, transport: Option<TransportParts>) -> Self {
		let (coordinator, driver) = Self::new(config, transport);
		tokio::spawn(driver.run());
		coordinator
	}

	pub fn config(&self) -> &CoordinatorConfig {
		&self.shared.config
	}

	/// A scope became active. Flags are OR-merged into the process-wide flags.
	pub fn on_scope_started(&self, token: LifecycleToken, scope: ComponentName, flags: CaptureFlags) {
		self.enqueue_session(SessionCommand::ScopeStarted { token, scope, flags });
	}

	/// The active scope went away; the main session is destroyed and discarded.
	pub fn on_scope_stopped(&self) {
		self.enqueue_session(SessionCommand::ScopeStopped);
	}

	pub fn flush(&self, reason: FlushReason) {
		self.enqueue_session(SessionCommand::Flush(reason));
	}

	/// Buffers an event in the main session, if one is started.
	pub fn record_event(&self, event: CaptureEvent) {
		self.enqueue_session(SessionCommand::Record(event));
	}

	/// Returns the main session, creating it on the worker if needed.
	pub async fn get_or_create_main_session(&self) -> Result<SessionSnapshot> {
		let (reply, snapshot) = oneshot::channel();
		self.commands
			.send(Command::Session(SessionCommand::EnsureMainSession(reply)))
			.map_err(|_| Error::ChannelClosed)?;
		snapshot.await.map_err(|_| Error::ChannelClosed)
	}

	/// Current main session, if any. Never blocks on the worker.
	pub fn main_session(&self) -> Option<SessionSnapshot> {
		self.shared.state.lock().main_session.as_ref().map(Session::snapshot)
	}

	/// Waits until the worker has processed every command queued before this call.
	pub async fn drain(&self) -> Result<()> {
		let (done, wait) = oneshot::channel();
		self.commands.send(Command::Barrier(done)).map_err(|_| Error::ChannelClosed)?;
		wait.await.map_err(|_| Error::ChannelClosed)
	}

	/// Whether capture is effectively enabled. Safe from any thread; no I/O.
	pub fn is_enabled(&self) -> bool {
		self.shared.state.lock().enablement.is_enabled(self.shared.is_configured())
	}

	/// Sets or clears the app opt-out.
	///
	/// Sessions are not created or torn down here; an active session picks up
	/// the change the next time a scope starts.
	pub fn set_enabled(&self, enabled: bool) {
		self.shared.state.lock().enablement.set_app_disabled(!enabled);
		debug!(target = "capture.coordinator", enabled, "app enablement changed");
	}

	/// Applies enablement state reported by the service.
	pub fn apply_remote_state(&self, remote: RemoteState) {
		self.shared.apply_remote_state(remote);
	}

	/// Routes an inbound message. The driver does this for its own transport;
	/// custom inbound paths can call it directly.
	pub fn handle_inbound(&self, message: Inbound) {
		self.shared.handle_inbound(message);
	}

	pub fn flags(&self) -> CaptureFlags {
		self.shared.state.lock().enablement.flags()
	}

	/// Number of bounded calls still waiting for a response.
	pub fn pending_calls(&self) -> usize {
		self.shared.calls.pending_len()
	}

	/// Asks the service whether the capture feature is enabled.
	///
	/// Fails with [`Error::NotConfigured`] before any I/O when no endpoint is bound.
	pub async fn query_remote_flag_state(&self) -> Result<bool> {
		if !self.shared.is_configured() {
			return Err(Error::NotConfigured);
		}

		match self.call(Query::FeatureEnabled).await? {
			QueryReply::FeatureEnabled(enabled) => Ok(enabled),
			other => Err(Error::UnexpectedReply {
				expected: "feature_enabled",
				actual: other.kind(),
			}),
		}
	}

	/// Like [`query_remote_flag_state`](Self::query_remote_flag_state), but an
	/// unbound endpoint simply means the feature is off.
	pub async fn is_capture_feature_enabled(&self) -> Result<bool> {
		match self.query_remote_flag_state().await {
			Err(Error::NotConfigured) => Ok(false),
			other => other,
		}
	}

	/// Component consuming captured events, or `None` while capture is disabled.
	pub async fn service_component_name(&self) -> Result<Option<ComponentName>> {
		if !self.is_enabled() {
			return Ok(None);
		}

		match self.call(Query::ServiceComponentName).await? {
			QueryReply::ServiceComponentName(name) => Ok(name),
			other => Err(Error::UnexpectedReply {
				expected: "service_component_name",
				actual: other.kind(),
			}),
		}
	}

	/// Asks the service to remove user data. Delivery failure is returned to the caller.
	pub async fn remove_user_data(&self, request: UserDataRemovalRequest) -> Result<()> {
		if !request.is_actionable() {
			return Err(Error::InvalidRequest(format!(
				"removal request for '{}' names nothing to remove",
				request.package_name
			)));
		}
		if !self.shared.is_configured() {
			return Err(Error::NotConfigured);
		}

		let package = request.package_name.clone();
		self.send_via_worker(RemoteMessage::RemoveUserData { request })
			.await
			.inspect_err(|err| {
				error!(target = "capture.coordinator", %package, error = %err, "remove user data failed");
			})
	}

	/// Human-readable state for diagnostics.
	pub fn dump(&self, prefix: &str) -> String {
		let state = self.shared.state.lock();
		let mut out = String::new();
		let _ = writeln!(out, "{prefix}SessionCoordinator");
		let _ = writeln!(out, "{prefix}Disabled: {}", state.enablement.is_disabled());
		let _ = writeln!(out, "{prefix}Flags: {}", state.enablement.flags());
		if let Some(endpoint) = &self.shared.endpoint {
			let _ = writeln!(out, "{prefix}Service: {endpoint}");
		}
		let _ = writeln!(out, "{prefix}Pending calls: {}", self.shared.calls.pending_len());
		match &state.main_session {
			Some(session) => {
				let _ = writeln!(out, "{prefix}Main session:");
				out.push_str(&session.dump(&format!("{prefix}  ")));
			}
			None => {
				let _ = writeln!(out, "{prefix}No sessions");
			}
		}
		out
	}

	async fn call(&self, query: Query) -> Result<QueryReply> {
		self.bounded.call(query, |message| self.send_via_worker(message)).await
	}

	fn send_via_worker(&self, message: RemoteMessage) -> impl Future<Output = Result<()>> + use<> {
		let (ack, outcome) = oneshot::channel();
		let queued = self.commands.send(Command::Send { message, ack }).map_err(|_| Error::ChannelClosed);
		async move {
			queued?;
			outcome.await.map_err(|_| Error::ChannelClosed)?
		}
	}

	fn enqueue_session(&self, command: SessionCommand) {
		if !self.shared.is_configured() {
			trace!(target = "capture.coordinator", "no capture service; ignoring lifecycle call");
			return;
		}
		if self.commands.send(Command::Session(command)).is_err() {
			warn!(target = "capture.coordinator", "worker stopped; dropping lifecycle call");
		}
	}
}
