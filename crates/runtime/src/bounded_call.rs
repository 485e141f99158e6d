//! Bounded request/response on top of a one-way channel.
//!
//! The transport only offers fire-and-forget sends, so a synchronous answer is
//! modelled with correlation slots:
//!
//! 1. [`CallRegistry::register`] allocates a [`CorrelationId`] and a oneshot slot
//! 2. The query is sent carrying that id
//! 3. The caller waits on the slot until the deadline
//! 4. The inbound pump routes the echoed [`QueryResponse`] through [`CallRegistry::complete`]
//!
//! A [`PendingRemoteCall`] removes its slot when dropped, whether it completed,
//! timed out or was cancelled. A response arriving after that finds no slot and
//! is discarded, so a late answer can never reach an unrelated call.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use capture_protocol::{CorrelationId, Query, QueryReply, QueryResponse, RemoteMessage};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Pending correlation slots keyed by id.
#[derive(Debug, Default)]
pub struct CallRegistry {
	last_id: AtomicU64,
	pending: Mutex<HashMap<CorrelationId, oneshot::Sender<QueryResponse>>>,
}

impl CallRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Allocates a fresh correlation slot that expires after `timeout`.
	pub fn register(self: &Arc<Self>, timeout: Duration) -> PendingRemoteCall {
		let correlation_id = CorrelationId(self.last_id.fetch_add(1, Ordering::SeqCst));
		let (tx, rx) = oneshot::channel();
		self.pending.lock().insert(correlation_id, tx);

		PendingRemoteCall {
			correlation_id,
			deadline: Instant::now() + timeout,
			timeout,
			slot: rx,
			registry: Arc::clone(self),
		}
	}

	/// Routes a response to the call waiting on its correlation id.
	///
	/// Returns [`Error::UnknownCorrelation`] when no call is waiting anymore.
	pub fn complete(&self, response: QueryResponse) -> Result<()> {
		let correlation_id = response.correlation_id;
		let slot = self
			.pending
			.lock()
			.remove(&correlation_id)
			.ok_or(Error::UnknownCorrelation(correlation_id))?;

		// The waiter may have gone away after removal; the response is dropped then.
		let _ = slot.send(response);
		Ok(())
	}

	/// Number of calls currently waiting for a response.
	pub fn pending_len(&self) -> usize {
		self.pending.lock().len()
	}

	fn abandon(&self, correlation_id: CorrelationId) -> bool {
		self.pending.lock().remove(&correlation_id).is_some()
	}
}

/// One in-flight round trip. Owned by the waiting caller.
#[derive(Debug)]
pub struct PendingRemoteCall {
	correlation_id: CorrelationId,
	deadline: Instant,
	timeout: Duration,
	slot: oneshot::Receiver<QueryResponse>,
	registry: Arc<CallRegistry>,
}

impl PendingRemoteCall {
	pub fn correlation_id(&self) -> CorrelationId {
		self.correlation_id
	}

	pub fn deadline(&self) -> Instant {
		self.deadline
	}

	/// Waits for the correlated response until the deadline.
	pub async fn wait(mut self) -> Result<QueryReply> {
		match tokio::time::timeout_at(self.deadline, &mut self.slot).await {
			Ok(Ok(response)) => into_reply(response),
			Ok(Err(_)) => Err(Error::ChannelClosed),
			Err(_) => {
				debug!(
					target = "capture.call",
					correlation_id = %self.correlation_id,
					timeout_ms = self.timeout.as_millis() as u64,
					"bounded call timed out; abandoning slot"
				);
				Err(Error::Timeout(self.timeout))
			}
		}
	}
}

impl Drop for PendingRemoteCall {
	fn drop(&mut self) {
		self.registry.abandon(self.correlation_id);
	}
}

fn into_reply(response: QueryResponse) -> Result<QueryReply> {
	if let Some(message) = response.error {
		return Err(Error::Remote(message));
	}
	response.reply.ok_or_else(|| Error::Remote("response carried neither reply nor error".to_string()))
}

/// Issues a query over a one-way channel and waits up to a fixed bound for its answer.
#[derive(Debug, Clone)]
pub struct BoundedRemoteCall {
	registry: Arc<CallRegistry>,
	timeout: Duration,
}

impl BoundedRemoteCall {
	pub fn new(registry: Arc<CallRegistry>, timeout: Duration) -> Self {
		Self { registry, timeout }
	}

	pub fn timeout(&self) -> Duration {
		self.timeout
	}

	pub fn registry(&self) -> &Arc<CallRegistry> {
		&self.registry
	}

	/// Sends `query` through `send` and waits for the correlated reply.
	///
	/// `send` only hands the message to the channel. A send error fails the
	/// call immediately with [`Error::TransportFailure`]; otherwise the call
	/// returns the reply, a remote error, or [`Error::Timeout`] once the
	/// deadline passes. The whole round trip, send included, is bounded.
	pub async fn call<F, Fut>(&self, query: Query, send: F) -> Result<QueryReply>
	where
		F: FnOnce(RemoteMessage) -> Fut,
		Fut: Future<Output = Result<()>>,
	{
		let pending = self.registry.register(self.timeout);
		let message = RemoteMessage::Query {
			correlation_id: pending.correlation_id(),
			query,
		};

		match tokio::time::timeout_at(pending.deadline(), send(message)).await {
			Ok(Ok(())) => {}
			Ok(Err(err)) => {
				warn!(
					target = "capture.call",
					correlation_id = %pending.correlation_id(),
					%query,
					error = %err,
					"bounded call send failed"
				);
				return Err(match err {
					Error::TransportFailure(_) => err,
					other => Error::TransportFailure(other.to_string()),
				});
			}
			Err(_) => return Err(Error::Timeout(self.timeout)),
		}

		pending.wait().await
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn bounded(timeout: Duration) -> (Arc<CallRegistry>, BoundedRemoteCall) {
		let registry = Arc::new(CallRegistry::new());
		let call = BoundedRemoteCall::new(Arc::clone(&registry), timeout);
		(registry, call)
	}

	fn query_id(message: &RemoteMessage) -> CorrelationId {
		match message {
			RemoteMessage::Query { correlation_id, .. } => *correlation_id,
			other => panic!("Expected Query, got {other:?}"),
		}
	}

	#[tokio::test]
	async fn test_reply_is_routed_by_correlation_id() {
		let (registry, call) = bounded(Duration::from_secs(5));

		let reply = call
			.call(Query::FeatureEnabled, |message| {
				let registry = Arc::clone(&registry);
				async move { registry.complete(QueryResponse::ok(query_id(&message), QueryReply::FeatureEnabled(true))) }
			})
			.await
			.unwrap();

		assert_eq!(reply, QueryReply::FeatureEnabled(true));
		assert_eq!(registry.pending_len(), 0);
	}

	#[tokio::test(start_paused = true)]
	async fn test_timeout_abandons_slot_and_discards_late_response() {
		let (registry, call) = bounded(Duration::from_millis(500));
		let sent = Arc::new(Mutex::new(Vec::new()));

		let started = Instant::now();
		let result = call
			.call(Query::FeatureEnabled, |message| {
				let sent = Arc::clone(&sent);
				async move {
					sent.lock().push(query_id(&message));
					Ok(())
				}
			})
			.await;
		let elapsed = started.elapsed();

		assert!(matches!(result, Err(Error::Timeout(t)) if t == Duration::from_millis(500)));
		assert!(elapsed >= Duration::from_millis(500));
		assert!(elapsed < Duration::from_millis(550));
		assert_eq!(registry.pending_len(), 0);

		let late_id = sent.lock()[0];
		let late = registry.complete(QueryResponse::ok(late_id, QueryReply::FeatureEnabled(true)));
		assert!(matches!(late, Err(Error::UnknownCorrelation(id)) if id == late_id));

		let reply = call
			.call(Query::FeatureEnabled, |message| {
				let registry = Arc::clone(&registry);
				async move {
					assert_ne!(query_id(&message), late_id);
					registry.complete(QueryResponse::ok(query_id(&message), QueryReply::FeatureEnabled(false)))
				}
			})
			.await
			.unwrap();
		assert_eq!(reply, QueryReply::FeatureEnabled(false));
	}

	#[tokio::test]
	async fn test_send_failure_is_reported_immediately() {
		let (registry, call) = bounded(Duration::from_secs(5));

		let result = call
			.call(Query::ServiceComponentName, |_| async { Err(Error::TransportFailure("endpoint gone".to_string())) })
			.await;

		match result {
			Err(Error::TransportFailure(msg)) => assert_eq!(msg, "endpoint gone"),
			other => panic!("Expected TransportFailure, got {other:?}"),
		}
		assert_eq!(registry.pending_len(), 0);
	}

	#[tokio::test]
	async fn test_closed_worker_counts_as_transport_failure() {
		let (_registry, call) = bounded(Duration::from_secs(5));

		let err = call.call(Query::FeatureEnabled, |_| async { Err(Error::ChannelClosed) }).await.unwrap_err();
		assert!(err.is_transport_failure());
		assert!(matches!(err, Error::TransportFailure(_)));
	}

	#[tokio::test]
	async fn test_remote_error_payload() {
		let (registry, call) = bounded(Duration::from_secs(5));

		let result = call
			.call(Query::FeatureEnabled, |message| {
				let registry = Arc::clone(&registry);
				async move { registry.complete(QueryResponse::err(query_id(&message), "permission denied")) }
			})
			.await;

		assert!(matches!(result, Err(Error::Remote(msg)) if msg == "permission denied"));
	}

	#[test]
	fn test_dropping_pending_call_releases_slot() {
		let registry = Arc::new(CallRegistry::new());
		let first = registry.register(Duration::from_secs(1));
		let second = registry.register(Duration::from_secs(1));

		assert_eq!(first.correlation_id(), CorrelationId(0));
		assert_eq!(second.correlation_id(), CorrelationId(1));
		assert_eq!(registry.pending_len(), 2);

		drop(first);
		assert_eq!(registry.pending_len(), 1);
		drop(second);
		assert_eq!(registry.pending_len(), 0);
	}
}
