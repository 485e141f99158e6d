//! Capture flag bitset shared by the lifecycle source, the coordinator and the service.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

/// Bitset describing why capture is (or is not) allowed for a scope.
///
/// Low bits are set locally (by the app or the lifecycle source), the
/// `SERVICE_*` bits are only ever written from state reported by the remote
/// service. Unknown bits are reserved and carried through untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaptureFlags(u32);

impl CaptureFlags {
	/// App explicitly opted out of capture.
	pub const DISABLED_BY_APP: Self = Self(1 << 0);
	/// Scope content is marked secure by the lifecycle source.
	pub const DISABLED_BY_FLAG_SECURE: Self = Self(1 << 1);
	/// Service disabled capture for this particular scope.
	pub const SERVICE_DISABLED_FOR_SCOPE: Self = Self(1 << 8);
	/// Service disabled capture for every scope of the package.
	pub const SERVICE_DISABLED_FOR_PACKAGE: Self = Self(1 << 9);
	/// Service disabled capture for everything.
	pub const SERVICE_DISABLED_GLOBALLY: Self = Self(1 << 10);

	/// All bits that only the remote service may set.
	pub const SERVICE_MASK: Self =
		Self(Self::SERVICE_DISABLED_FOR_SCOPE.0 | Self::SERVICE_DISABLED_FOR_PACKAGE.0 | Self::SERVICE_DISABLED_GLOBALLY.0);

	/// Any bit that disables capture for a session carrying these flags.
	pub const DISABLED_MASK: Self = Self(Self::DISABLED_BY_APP.0 | Self::DISABLED_BY_FLAG_SECURE.0 | Self::SERVICE_MASK.0);

	pub const fn empty() -> Self {
		Self(0)
	}

	pub const fn from_bits(bits: u32) -> Self {
		Self(bits)
	}

	pub const fn bits(self) -> u32 {
		self.0
	}

	pub const fn is_empty(self) -> bool {
		self.0 == 0
	}

	/// Returns `true` when every bit of `other` is set.
	pub const fn contains(self, other: Self) -> bool {
		self.0 & other.0 == other.0
	}

	/// Returns `true` when at least one bit of `other` is set.
	pub const fn intersects(self, other: Self) -> bool {
		self.0 & other.0 != 0
	}

	pub fn insert(&mut self, other: Self) {
		self.0 |= other.0;
	}

	pub fn remove(&mut self, other: Self) {
		self.0 &= !other.0;
	}

	/// Sets or clears `other` depending on `value`.
	pub fn set(&mut self, other: Self, value: bool) {
		if value {
			self.insert(other);
		} else {
			self.remove(other);
		}
	}

	/// Returns `true` when any disabling bit is set.
	pub const fn is_disabled(self) -> bool {
		self.intersects(Self::DISABLED_MASK)
	}
}

impl BitOr for CaptureFlags {
	type Output = Self;

	fn bitor(self, rhs: Self) -> Self {
		Self(self.0 | rhs.0)
	}
}

impl BitOrAssign for CaptureFlags {
	fn bitor_assign(&mut self, rhs: Self) {
		self.0 |= rhs.0;
	}
}

impl fmt::Display for CaptureFlags {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{:#06x}", self.0)
	}
}
