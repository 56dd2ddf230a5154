//! Component Directory and bundle-change notifier seams.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shellbay_proto::{AbilityInfo, UserId};
use shellbay_worker::EventSink;
use thiserror::Error;

/// Package lifecycle event kinds reported by the bundle monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BundleEventKind {
	/// Package installed.
	Add,
	/// Package updated in place.
	Change,
	/// Package removed.
	Remove,
}

/// One package lifecycle notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleEvent {
	/// Affected package.
	pub bundle_name: String,
	/// What happened to it.
	pub kind: BundleEventKind,
}

impl BundleEvent {
	pub fn new(bundle_name: impl Into<String>, kind: BundleEventKind) -> Self {
		Self {
			bundle_name: bundle_name.into(),
			kind,
		}
	}
}

/// Parameters of one directory query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AbilityQuery {
	/// Action the components must advertise.
	pub action: String,
	/// Restricts the query to one package.
	pub bundle_name: Option<String>,
	/// Restricts the query to one user's installation.
	pub user: Option<UserId>,
}

impl AbilityQuery {
	/// Whether the query is limited to one package.
	pub fn is_scoped(&self) -> bool {
		self.bundle_name.is_some()
	}
}

/// Which directory call a query was issued through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QueryKind {
	/// Regular abilities.
	Ability,
	/// Extension abilities.
	Extension,
}

impl fmt::Display for QueryKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Ability => f.write_str("ability"),
			Self::Extension => f.write_str("extension"),
		}
	}
}

/// Handle returned by [`BundleMonitor::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Errors raised by directory collaborators.
#[derive(Debug, Error)]
pub enum DirectoryError {
	/// A query call failed.
	#[error("{kind} query for {action:?} failed: {message}")]
	Query {
		/// Call that failed.
		kind: QueryKind,
		/// Queried action.
		action: String,
		/// Collaborator-supplied reason.
		message: String,
	},
	/// The notifier refused the subscription.
	#[error("bundle monitor unavailable: {0}")]
	Monitor(String),
}

/// Installed-component query service.
///
/// The two calls are independent: a failure of one never implies a failure of
/// the other.
#[async_trait]
pub trait ComponentDirectory: Send + Sync {
	/// Abilities advertising `query.action`.
	async fn query_abilities(&self, query: &AbilityQuery) -> Result<Vec<AbilityInfo>, DirectoryError>;

	/// Extension abilities advertising `query.action`.
	async fn query_extension_abilities(&self, query: &AbilityQuery) -> Result<Vec<AbilityInfo>, DirectoryError>;
}

/// Package install/change/remove notifier.
pub trait BundleMonitor: Send + Sync {
	/// Starts delivering events to `sink` until unsubscribed.
	fn subscribe(&self, sink: EventSink<BundleEvent>) -> Result<SubscriptionId, DirectoryError>;

	/// Stops delivering events for `id`. Unknown ids are ignored.
	fn unsubscribe(&self, id: SubscriptionId);
}
