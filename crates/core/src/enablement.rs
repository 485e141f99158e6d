//! Process-wide capture enablement state.
//!
//! Pure state: no I/O, no locking of its own. The coordinator keeps it behind
//! the same lock as the main session slot.

use capture_protocol::{CaptureFlags, RemoteState};

/// App opt-out plus whatever the remote service last reported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnablementState {
	disabled: bool,
	flags: CaptureFlags,
}

impl EnablementState {
	pub fn new() -> Self {
		Self::default()
	}

	/// Effective enabled: the endpoint is reachable and nothing disables capture.
	pub fn is_enabled(&self, reachable: bool) -> bool {
		reachable && !self.is_disabled()
	}

	/// Remote-reported disablement, the app opt-out bit, or any service bit.
	pub fn is_disabled(&self) -> bool {
		self.disabled || self.flags.contains(CaptureFlags::DISABLED_BY_APP) || self.flags.intersects(CaptureFlags::SERVICE_MASK)
	}

	pub fn set_app_disabled(&mut self, disabled: bool) {
		self.flags.set(CaptureFlags::DISABLED_BY_APP, disabled);
	}

	/// Replaces the remote `disabled` flag and the service-originated bits.
	pub fn apply_remote_state(&mut self, state: RemoteState) {
		self.disabled = state.disabled;
		self.flags.remove(CaptureFlags::SERVICE_MASK);
		let mut service = state.service_flags;
		service.remove(CaptureFlags::from_bits(!CaptureFlags::SERVICE_MASK.bits()));
		self.flags.insert(service);
	}

	/// ORs lifecycle flags in. Service bits are never accepted from this path.
	pub fn merge_flags(&mut self, flags: CaptureFlags) {
		let mut local = flags;
		local.remove(CaptureFlags::SERVICE_MASK);
		self.flags.insert(local);
	}

	pub fn flags(&self) -> CaptureFlags {
		self.flags
	}

	pub fn remote_disabled(&self) -> bool {
		self.disabled
	}

	/// Flags handed to a session; remote disablement is folded into the global service bit.
	pub fn session_flags(&self) -> CaptureFlags {
		if self.disabled {
			self.flags | CaptureFlags::SERVICE_DISABLED_GLOBALLY
		} else {
			self.flags
		}
	}
}
