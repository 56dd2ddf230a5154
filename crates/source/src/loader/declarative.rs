use shellbay_proto::{AbilityInfoWithId, ActionData, ItemComponentData};

use super::{LoaderBase, LoaderChannel, LoaderSettings};

/// Items fully described by static metadata: label, icon and click targets.
pub struct DeclarativeLoader {
	pub(crate) base: LoaderBase,
}

impl DeclarativeLoader {
	pub fn new(settings: LoaderSettings, channel: LoaderChannel) -> Self {
		Self {
			base: LoaderBase::new(settings, channel),
		}
	}

	pub(crate) fn build_item(&self, info: &AbilityInfoWithId) -> Option<ItemComponentData> {
		let meta = self.base.parse(info)?;
		let mut item = self.base.base_item(info, &meta);
		item.action_data = Some(ActionData::Declarative {
			click_action: meta.click_action,
			long_click_action: meta.long_click_action,
		});
		Some(item)
	}
}
