//! The coordinator's single worker.
//!
//! [`CoordinatorDriver::run`] is the only place that mutates sessions and the
//! only place that sends on the transport. Commands are processed strictly in
//! the order they were queued and each command's messages are sent before the
//! next command is looked at, which gives the service start → events → finish
//! for every session and keeps one session's finish ahead of the next one's start.
//!
//! Inbound traffic is pumped on a separate task so responses to bounded calls
//! are never stuck behind a slow outbound send.

use std::sync::Arc;

use capture_protocol::{Inbound, RemoteMessage};
use capture_runtime::{Error, Result, Transport, TransportParts};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace, warn};

use crate::coordinator::{Command, Shared};

/// Runs the worker for one [`SessionCoordinator`](crate::SessionCoordinator).
///
/// Spawn [`run`](Self::run) on a tokio runtime; it returns once the coordinator
/// has been dropped and every queued command has been processed.
pub struct CoordinatorDriver {
	shared: Arc<Shared>,
	commands: mpsc::UnboundedReceiver<Command>,
	transport: Option<TransportParts>,
}

impl CoordinatorDriver {
	pub(crate) fn new(shared: Arc<Shared>, commands: mpsc::UnboundedReceiver<Command>, transport: Option<TransportParts>) -> Self {
		Self {
			shared,
			commands,
			transport,
		}
	}

	pub async fn run(self) {
		let Self {
			shared,
			mut commands,
			transport,
		} = self;

		let (mut sender, pumps) = match transport {
			Some(TransportParts {
				sender,
				receiver,
				message_rx,
			}) => {
				let receiver_handle = tokio::spawn(async move {
					if let Err(err) = receiver.run().await {
						error!(target = "capture.worker", error = %err, "transport receiver failed");
					}
				});
				let inbound_handle = tokio::spawn(pump_inbound(Arc::clone(&shared), message_rx));
				(Some(sender), vec![receiver_handle, inbound_handle])
			}
			None => (None, Vec::<JoinHandle<()>>::new()),
		};

		while let Some(command) = commands.recv().await {
			match command {
				Command::Session(command) => {
					let outbound = shared.apply(command);
					for message in outbound {
						deliver(sender.as_deref_mut(), message).await;
					}
				}
				Command::Send { message, ack } => {
					let outcome = send(sender.as_deref_mut(), message).await;
					let _ = ack.send(outcome);
				}
				Command::Barrier(done) => {
					let _ = done.send(());
				}
			}
		}

		debug!(target = "capture.worker", "coordinator dropped; worker stopping");
		for handle in pumps {
			handle.abort();
		}
	}
}

async fn send(sender: Option<&mut (dyn Transport + 'static)>, message: RemoteMessage) -> Result<()> {
	let Some(sender) = sender else {
		return Err(Error::NotConfigured);
	};
	sender.send(message).await
}

/// Fire-and-forget delivery: failures are logged, never returned.
async fn deliver(sender: Option<&mut (dyn Transport + 'static)>, message: RemoteMessage) {
	let method = message.method();
	let session_id = message.session_id();
	match send(sender, message).await {
		Ok(()) => trace!(target = "capture.worker", method, ?session_id, "delivered"),
		Err(err) => warn!(target = "capture.worker", method, ?session_id, error = %err, "one-way send failed"),
	}
}

async fn pump_inbound(shared: Arc<Shared>, mut message_rx: mpsc::UnboundedReceiver<Inbound>) {
	while let Some(message) = message_rx.recv().await {
		shared.handle_inbound(message);
	}
	debug!(target = "capture.worker", "inbound channel closed");
}
