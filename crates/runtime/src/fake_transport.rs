//! Fake transport for testing coordinator ordering and bounded calls without a service.
//!
//! Provides an in-memory transport that records every outbound message and lets
//! tests inject responses, state updates and send failures.
//!
//! # Example
//!
//! ```ignore
//! let (parts, controller) = FakeTransportBuilder::new().build();
//! let (coordinator, driver) = SessionCoordinator::new(CoordinatorConfig::default(), Some(parts));
//! tokio::spawn(driver.run());
//!
//! controller.reply_to(Query::FeatureEnabled, QueryReply::FeatureEnabled(true));
//! assert!(coordinator.query_remote_flag_state().await?);
//! let sent = controller.take_sent().await;
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use capture_protocol::{Inbound, Query, QueryReply, QueryResponse, RemoteMessage, RemoteState};
use tokio::sync::{Mutex, mpsc};

use crate::error::{Error, Result};
use crate::transport::{Transport, TransportParts, TransportReceiver};

/// Builder for creating fake transport instances.
pub struct FakeTransportBuilder {
	description: String,
}

impl FakeTransportBuilder {
	pub fn new() -> Self {
		Self {
			description: "fake://capture-service".to_string(),
		}
	}

	/// Sets the endpoint identity reported in diagnostics.
	pub fn describe_as(mut self, description: impl Into<String>) -> Self {
		self.description = description.into();
		self
	}

	/// Build the fake transport and return both parts and a controller.
	///
	/// Returns [`TransportParts`] for creating a coordinator and a
	/// [`FakeTransportController`] for injecting inbound traffic and inspecting sent messages.
	pub fn build(self) -> (TransportParts, FakeTransportController) {
		let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
		let (message_tx, message_rx) = mpsc::unbounded_channel();
		let sent = Arc::new(Mutex::new(Vec::new()));
		let fail_sends = Arc::new(AtomicBool::new(false));
		let replies = Arc::new(parking_lot::Mutex::new(HashMap::new()));

		let sender = FakeTransportSender {
			description: self.description,
			sent: Arc::clone(&sent),
			fail_sends: Arc::clone(&fail_sends),
			replies: Arc::clone(&replies),
			inbound_tx: inbound_tx.clone(),
		};

		let receiver = FakeTransportReceiver { inbound_rx, message_tx };

		let controller = FakeTransportController {
			inbound_tx,
			sent,
			fail_sends,
			replies,
		};

		let parts = TransportParts {
			sender: Box::new(sender),
			receiver: Box::new(receiver),
			message_rx,
		};

		(parts, controller)
	}
}

impl Default for FakeTransportBuilder {
	fn default() -> Self {
		Self::new()
	}
}

type ReplyTable = Arc<parking_lot::Mutex<HashMap<Query, QueryReply>>>;

/// Controller for injecting inbound traffic and inspecting sent messages.
pub struct FakeTransportController {
	inbound_tx: mpsc::UnboundedSender<Inbound>,
	sent: Arc<Mutex<Vec<RemoteMessage>>>,
	fail_sends: Arc<AtomicBool>,
	replies: ReplyTable,
}

impl FakeTransportController {
	/// Inject a raw inbound message, as if the service had sent it.
	pub fn inject(&self, message: Inbound) {
		let _ = self.inbound_tx.send(message);
	}

	pub fn inject_response(&self, response: QueryResponse) {
		self.inject(Inbound::Response(response));
	}

	pub fn inject_state(&self, state: RemoteState) {
		self.inject(Inbound::StateUpdate(state));
	}

	/// Answer every future `query` with `reply` as soon as it is sent.
	pub fn reply_to(&self, query: Query, reply: QueryReply) {
		self.replies.lock().insert(query, reply);
	}

	/// Stop answering `query`; such calls will time out.
	pub fn stop_replying_to(&self, query: Query) {
		self.replies.lock().remove(&query);
	}

	/// Make every subsequent send fail with a transport failure.
	pub fn fail_sends(&self, fail: bool) {
		self.fail_sends.store(fail, Ordering::SeqCst);
	}

	/// Take all sent messages, clearing the buffer.
	pub async fn take_sent(&self) -> Vec<RemoteMessage> {
		std::mem::take(&mut *self.sent.lock().await)
	}

	/// Clone of all sent messages, leaving the buffer intact.
	pub async fn sent(&self) -> Vec<RemoteMessage> {
		self.sent.lock().await.clone()
	}
}

struct FakeTransportSender {
	description: String,
	sent: Arc<Mutex<Vec<RemoteMessage>>>,
	fail_sends: Arc<AtomicBool>,
	replies: ReplyTable,
	inbound_tx: mpsc::UnboundedSender<Inbound>,
}

impl Transport for FakeTransportSender {
	fn send(&mut self, message: RemoteMessage) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
		Box::pin(async move {
			if self.fail_sends.load(Ordering::SeqCst) {
				return Err(Error::TransportFailure(format!("{} is unreachable", self.description)));
			}

			let auto_reply = match &message {
				RemoteMessage::Query { correlation_id, query } => {
					self.replies.lock().get(query).cloned().map(|reply| QueryResponse::ok(*correlation_id, reply))
				}
				_ => None,
			};

			self.sent.lock().await.push(message);

			if let Some(response) = auto_reply {
				let _ = self.inbound_tx.send(Inbound::Response(response));
			}
			Ok(())
		})
	}

	fn describe(&self) -> String {
		self.description.clone()
	}
}

struct FakeTransportReceiver {
	inbound_rx: mpsc::UnboundedReceiver<Inbound>,
	message_tx: mpsc::UnboundedSender<Inbound>,
}

impl TransportReceiver for FakeTransportReceiver {
	fn run(mut self: Box<Self>) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> {
		Box::pin(async move {
			while let Some(message) = self.inbound_rx.recv().await {
				if self.message_tx.send(message).is_err() {
					break;
				}
			}
			Ok(())
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use capture_protocol::{CorrelationId, SessionId};

	#[tokio::test]
	async fn test_fake_transport_send_capture() {
		let (mut parts, controller) = FakeTransportBuilder::new().build();

		parts.sender.send(RemoteMessage::SessionFinished { session_id: SessionId(1) }).await.unwrap();

		let sent = controller.take_sent().await;
		assert_eq!(sent, vec![RemoteMessage::SessionFinished { session_id: SessionId(1) }]);
		assert!(controller.take_sent().await.is_empty());
		assert_eq!(parts.sender.describe(), "fake://capture-service");
	}

	#[tokio::test]
	async fn test_fake_transport_failure_injection() {
		let (mut parts, controller) = FakeTransportBuilder::new().describe_as("fake://down").build();
		controller.fail_sends(true);

		let err = parts.sender.send(RemoteMessage::SessionFinished { session_id: SessionId(1) }).await.unwrap_err();
		assert!(err.is_transport_failure());
		assert!(controller.sent().await.is_empty());
	}

	#[tokio::test]
	async fn test_fake_transport_auto_reply_reaches_receiver() {
		let (parts, controller) = FakeTransportBuilder::new().build();
		let TransportParts {
			mut sender,
			receiver,
			mut message_rx,
		} = parts;
		tokio::spawn(receiver.run());

		controller.reply_to(Query::FeatureEnabled, QueryReply::FeatureEnabled(true));
		sender
			.send(RemoteMessage::Query {
				correlation_id: CorrelationId(4),
				query: Query::FeatureEnabled,
			})
			.await
			.unwrap();

		let inbound = message_rx.recv().await.unwrap();
		assert_eq!(
			inbound,
			Inbound::Response(QueryResponse::ok(CorrelationId(4), QueryReply::FeatureEnabled(true)))
		);
	}

	#[tokio::test]
	async fn test_fake_transport_state_injection() {
		let (parts, controller) = FakeTransportBuilder::new().build();
		let TransportParts { receiver, mut message_rx, .. } = parts;
		tokio::spawn(receiver.run());

		controller.inject_state(RemoteState {
			disabled: true,
			..Default::default()
		});

		let inbound = message_rx.recv().await.unwrap();
		assert!(matches!(inbound, Inbound::StateUpdate(RemoteState { disabled: true, .. })));
	}
}
