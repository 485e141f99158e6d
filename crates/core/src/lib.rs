//! Session lifecycle and bounded-call coordinator for content capture.
//!
//! A [`SessionCoordinator`] lazily creates one main capture [`Session`] when a
//! scope (e.g. a screen) becomes active, routes flushes to it, and tears it
//! down when the scope stops. All session work runs on a single worker driven
//! by [`CoordinatorDriver`]; the remote channel is one-way, and the few calls
//! that need an answer go through a deadline-bounded request/response.

pub mod config;
pub mod coordinator;
pub mod driver;
pub mod enablement;
pub mod session;

pub use capture_protocol::{
	CaptureEvent, CaptureFlags, ComponentName, FlushReason, Inbound, LifecycleToken, RemoteMessage, RemoteState, SessionId,
	UserDataRemovalRequest,
};
pub use capture_runtime::{DEFAULT_SYNC_CALL_TIMEOUT_MS, Error, Result};
pub use config::CoordinatorConfig;
pub use coordinator::SessionCoordinator;
pub use driver::CoordinatorDriver;
pub use enablement::EnablementState;
pub use session::{Session, SessionSnapshot, SessionState};
