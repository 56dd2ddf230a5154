use shellbay_proto::{AbilityInfoWithId, ItemComponentData, UserId};

use super::{LoaderBase, LoaderChannel, LoaderSettings};

/// Items backed by a data-provider component.
///
/// Registration mirrors the declarative kind without click targets. The loader
/// remembers the user of the last reload so per-user filtering can hang off
/// [`DataProviderLoader::last_user`].
pub struct DataProviderLoader {
	pub(crate) base: LoaderBase,
	last_user: Option<UserId>,
	reloads: usize,
}

impl DataProviderLoader {
	pub fn new(settings: LoaderSettings, channel: LoaderChannel) -> Self {
		Self {
			base: LoaderBase::new(settings, channel),
			last_user: None,
			reloads: 0,
		}
	}

	pub(crate) fn build_item(&self, info: &AbilityInfoWithId) -> Option<ItemComponentData> {
		let meta = self.base.parse(info)?;
		Some(self.base.base_item(info, &meta))
	}

	pub(crate) fn reload_data(&mut self, user: UserId) {
		self.last_user = Some(user);
		self.reloads += 1;
	}

	pub fn last_user(&self) -> Option<UserId> {
		self.last_user
	}

	/// Number of reload hooks received.
	pub fn reload_count(&self) -> usize {
		self.reloads
	}
}
