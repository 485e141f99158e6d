//! Runtime plumbing for the capture coordinator.
//!
//! This crate owns the pieces that touch the channel to the remote capture
//! service: the [`Transport`] seam, the correlation registry behind
//! [`BoundedRemoteCall`], the shared [`Error`] taxonomy, and an in-memory
//! fake transport for tests.

pub mod bounded_call;
pub mod error;
pub mod fake_transport;
pub mod transport;

/// Default bound for synchronous calls to the capture service, in milliseconds.
pub const DEFAULT_SYNC_CALL_TIMEOUT_MS: u64 = 5000;

pub use bounded_call::{BoundedRemoteCall, CallRegistry, PendingRemoteCall};
pub use error::{Error, Result};
pub use fake_transport::{FakeTransportBuilder, FakeTransportController};
pub use transport::{Transport, TransportParts, TransportReceiver};
