//! Transport seam between the coordinator and the remote capture service.
//!
//! The outbound half is strictly one-way: [`Transport::send`] resolves once the
//! message has been handed to the channel, never when the service has acted on
//! it. The inbound half pumps [`Inbound`] messages (query responses and state
//! updates) into the receiver stored in [`TransportParts`].

use std::future::Future;
use std::pin::Pin;

use capture_protocol::{Inbound, RemoteMessage};
use tokio::sync::mpsc;

use crate::Result;

/// Outbound half of a transport. Owned exclusively by the coordinator worker.
pub trait Transport: Send {
	/// Hands `message` to the channel. An error means the channel is unusable.
	fn send(&mut self, message: RemoteMessage) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

	/// Human-readable identity of the remote endpoint, used in diagnostics.
	fn describe(&self) -> String;
}

/// Inbound half of a transport.
pub trait TransportReceiver: Send {
	/// Reads messages from the remote side until the channel closes.
	fn run(self: Box<Self>) -> Pin<Box<dyn Future<Output = Result<()>> + Send>>;
}

/// Both halves of a transport plus the channel the receiver pumps into.
pub struct TransportParts {
	pub sender: Box<dyn Transport>,
	pub receiver: Box<dyn TransportReceiver>,
	pub message_rx: mpsc::UnboundedReceiver<Inbound>,
}
