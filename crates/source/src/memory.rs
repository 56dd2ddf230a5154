//! In-memory component directory.
//!
//! [`StaticDirectory`] serves a catalog of [`CatalogEntry`] values and doubles
//! as the bundle monitor: `install`, `update` and `uninstall` mutate the
//! catalog and notify subscribers the way the OS would.

use std::collections::HashSet;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use shellbay_proto::{AbilityInfo, UserId};
use shellbay_worker::EventSink;

use crate::directory::{AbilityQuery, BundleEvent, BundleEventKind, BundleMonitor, ComponentDirectory, DirectoryError, QueryKind, SubscriptionId};

fn default_kind() -> QueryKind {
	QueryKind::Ability
}

/// One installed ability and the actions it advertises.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
	/// Which query returns this entry.
	#[serde(default = "default_kind")]
	pub kind: QueryKind,
	/// Actions the ability advertises.
	pub actions: Vec<String>,
	/// Users the package is installed for. Empty means every user.
	#[serde(default)]
	pub users: Vec<UserId>,
	/// Descriptor returned by queries.
	pub ability: AbilityInfo,
}

impl CatalogEntry {
	fn matches(&self, kind: QueryKind, query: &AbilityQuery) -> bool {
		self.kind == kind
			&& self.actions.iter().any(|action| *action == query.action)
			&& query.bundle_name.as_deref().is_none_or(|bundle| bundle == self.ability.bundle_name)
			&& query.user.is_none_or(|user| self.users.is_empty() || self.users.contains(&user))
	}
}

/// A query observed by the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRecord {
	/// Call used.
	pub kind: QueryKind,
	/// Parameters passed.
	pub query: AbilityQuery,
}

#[derive(Default)]
struct DirectoryState {
	entries: Vec<CatalogEntry>,
	subscribers: Vec<(SubscriptionId, EventSink<BundleEvent>)>,
	next_subscription: u64,
	queries: Vec<QueryRecord>,
	failing: HashSet<QueryKind>,
}

/// In-memory [`ComponentDirectory`] and [`BundleMonitor`].
#[derive(Default)]
pub struct StaticDirectory {
	state: Mutex<DirectoryState>,
}

impl StaticDirectory {
	pub fn new() -> Self {
		Self::default()
	}

	/// Directory pre-populated without notifying anyone.
	pub fn with_entries(entries: impl IntoIterator<Item = CatalogEntry>) -> Self {
		let directory = Self::default();
		directory.state.lock().entries.extend(entries);
		directory
	}

	/// Installs `bundle`, replacing any entries it had, and reports `Add`.
	pub fn install(&self, bundle: &str, entries: Vec<CatalogEntry>) {
		self.replace_bundle(bundle, entries);
		self.notify(BundleEvent::new(bundle, BundleEventKind::Add));
	}

	/// Replaces the entries of `bundle` and reports `Change`.
	pub fn update(&self, bundle: &str, entries: Vec<CatalogEntry>) {
		self.replace_bundle(bundle, entries);
		self.notify(BundleEvent::new(bundle, BundleEventKind::Change));
	}

	/// Removes `bundle` and reports `Remove`. Returns `false` if it was not installed.
	pub fn uninstall(&self, bundle: &str) -> bool {
		let removed = {
			let mut state = self.state.lock();
			let before = state.entries.len();
			state.entries.retain(|entry| entry.ability.bundle_name != bundle);
			state.entries.len() != before
		};
		if removed {
			self.notify(BundleEvent::new(bundle, BundleEventKind::Remove));
		}
		removed
	}

	/// Makes every subsequent call of `kind` fail until reset.
	pub fn set_failing(&self, kind: QueryKind, failing: bool) {
		let mut state = self.state.lock();
		if failing {
			state.failing.insert(kind);
		} else {
			state.failing.remove(&kind);
		}
	}

	/// Every query served so far, in call order.
	pub fn queries(&self) -> Vec<QueryRecord> {
		self.state.lock().queries.clone()
	}

	/// Number of live subscriptions.
	pub fn subscriber_count(&self) -> usize {
		self.state.lock().subscribers.len()
	}

	fn replace_bundle(&self, bundle: &str, entries: Vec<CatalogEntry>) {
		let mut state = self.state.lock();
		state.entries.retain(|entry| entry.ability.bundle_name != bundle);
		state.entries.extend(entries.into_iter().map(|mut entry| {
			entry.ability.bundle_name = bundle.to_string();
			entry
		}));
	}

	fn notify(&self, event: BundleEvent) {
		let sinks: Vec<_> = self.state.lock().subscribers.clone();
		let mut closed = Vec::new();
		for (id, sink) in sinks {
			if !sink.emit(event.clone()) {
				closed.push(id);
			}
		}
		if !closed.is_empty() {
			self.state.lock().subscribers.retain(|(id, _)| !closed.contains(id));
		}
		tracing::debug!(bundle = %event.bundle_name, kind = ?event.kind, "source.directory.notify");
	}

	fn run_query(&self, kind: QueryKind, query: &AbilityQuery) -> Result<Vec<AbilityInfo>, DirectoryError> {
		let mut state = self.state.lock();
		state.queries.push(QueryRecord { kind, query: query.clone() });
		if state.failing.contains(&kind) {
			return Err(DirectoryError::Query {
				kind,
				action: query.action.clone(),
				message: "directory unavailable".to_string(),
			});
		}
		Ok(state
			.entries
			.iter()
			.filter(|entry| entry.matches(kind, query))
			.map(|entry| entry.ability.clone())
			.collect())
	}
}

#[async_trait]
impl ComponentDirectory for StaticDirectory {
	async fn query_abilities(&self, query: &AbilityQuery) -> Result<Vec<AbilityInfo>, DirectoryError> {
		self.run_query(QueryKind::Ability, query)
	}

	async fn query_extension_abilities(&self, query: &AbilityQuery) -> Result<Vec<AbilityInfo>, DirectoryError> {
		self.run_query(QueryKind::Extension, query)
	}
}

impl BundleMonitor for StaticDirectory {
	fn subscribe(&self, sink: EventSink<BundleEvent>) -> Result<SubscriptionId, DirectoryError> {
		let mut state = self.state.lock();
		state.next_subscription += 1;
		let id = SubscriptionId(state.next_subscription);
		state.subscribers.push((id, sink));
		Ok(id)
	}

	fn unsubscribe(&self, id: SubscriptionId) {
		self.state.lock().subscribers.retain(|(sub, _)| *sub != id);
	}
}
