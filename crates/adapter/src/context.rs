use std::sync::Arc;

use shellbay_source::{BundleMonitor, ComponentDirectory, StaticDirectory};

use crate::remote::{OwnedContextApi, OwnerId, StaticRemote};
use crate::resolver::{ResourceResolver, StaticResolver};

/// Collaborators an [`Adapter`](crate::Adapter) is built from.
///
/// Constructed once by the embedding process and handed to
/// [`Adapter::start`](crate::Adapter::start); the adapter's lifetime bounds
/// every subscription made through it.
#[derive(Clone)]
pub struct SourceContext {
	pub directory: Arc<dyn ComponentDirectory>,
	pub monitor: Arc<dyn BundleMonitor>,
	pub resolver: Arc<dyn ResourceResolver>,
	pub remote: Arc<dyn OwnedContextApi>,
	/// Identity remote template requests are attributed to.
	pub owner: OwnerId,
}

impl SourceContext {
	pub fn new(
		directory: Arc<dyn ComponentDirectory>,
		monitor: Arc<dyn BundleMonitor>,
		resolver: Arc<dyn ResourceResolver>,
		remote: Arc<dyn OwnedContextApi>,
		owner: OwnerId,
	) -> Self {
		Self {
			directory,
			monitor,
			resolver,
			remote,
			owner,
		}
	}

	/// Context backed entirely by in-memory collaborators.
	pub fn in_memory(directory: Arc<StaticDirectory>, resolver: Arc<StaticResolver>, remote: Arc<StaticRemote>, owner: OwnerId) -> Self {
		Self::new(directory.clone(), directory, resolver, remote, owner)
	}
}
