//! User data removal requests forwarded to the capture service.

use serde::{Deserialize, Serialize};

/// A single locus whose captured data should be forgotten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocusIdRemoval {
	pub locus_id: String,
	/// Also remove data for every locus nested under this one.
	#[serde(default)]
	pub recursive: bool,
}

/// Request asking the service to remove user data associated with a package.
///
/// Either `forget_everything` is set or at least one locus is listed.
///
/// # Example
///
/// ```ignore
/// let request = UserDataRemovalRequest::builder("com.example.app")
///     .add_locus("chat/42", true)
///     .build();
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDataRemovalRequest {
	pub package_name: String,
	#[serde(default)]
	pub forget_everything: bool,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub locus_ids: Vec<LocusIdRemoval>,
}

impl UserDataRemovalRequest {
	pub fn builder(package_name: impl Into<String>) -> UserDataRemovalRequestBuilder {
		UserDataRemovalRequestBuilder {
			package_name: package_name.into(),
			forget_everything: false,
			locus_ids: Vec::new(),
		}
	}

	/// Returns `true` when the request names something to remove.
	pub fn is_actionable(&self) -> bool {
		!self.package_name.is_empty() && (self.forget_everything || !self.locus_ids.is_empty())
	}
}

/// Builder for [`UserDataRemovalRequest`].
#[derive(Debug, Clone)]
pub struct UserDataRemovalRequestBuilder {
	package_name: String,
	forget_everything: bool,
	locus_ids: Vec<LocusIdRemoval>,
}

impl UserDataRemovalRequestBuilder {
	/// Removes all data for the package; listed loci are ignored by the service.
	pub fn forget_everything(mut self) -> Self {
		self.forget_everything = true;
		self
	}

	pub fn add_locus(mut self, locus_id: impl Into<String>, recursive: bool) -> Self {
		self.locus_ids.push(LocusIdRemoval {
			locus_id: locus_id.into(),
			recursive,
		});
		self
	}

	pub fn build(self) -> UserDataRemovalRequest {
		UserDataRemovalRequest {
			package_name: self.package_name,
			forget_everything: self.forget_everything,
			locus_ids: self.locus_ids,
		}
	}
}
