//! Source loaders.
//!
//! A loader inspects one discovered ability, decides whether it qualifies for
//! its kind, and tracks the resulting item. Every kind publishes through the
//! same [`LoaderChannel`]. Kinds are a closed set and dispatched through
//! [`SourceLoader`].

mod channel;
mod data_provider;
mod declarative;
mod remote_template;
mod store;

pub use channel::LoaderChannel;
pub use data_provider::DataProviderLoader;
pub use declarative::DeclarativeLoader;
pub use remote_template::RemoteTemplateLoader;
use serde::Deserialize;
use shellbay_proto::{
	AbilityInfoWithId, ActionEvent, ItemComponentData, LaunchType, LoaderConfigInfo, PluginKind, PluginPatch, UserId, encode_label,
};
pub use store::ItemStore;

/// Resolved settings of one configured loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderSettings {
	/// Kind this loader accepts.
	pub kind: PluginKind,
	/// Metadata entry name the loader reads.
	pub filter_key: String,
	/// Permission an ability must declare.
	pub permission: Option<String>,
}

impl LoaderSettings {
	/// An empty configured action falls back to `root_action`.
	pub fn new(kind: PluginKind, config: &LoaderConfigInfo, root_action: &str) -> Self {
		let filter_key = if config.action.is_empty() { root_action } else { &config.action };
		Self {
			kind,
			filter_key: filter_key.to_string(),
			permission: config.permission.clone().filter(|permission| !permission.is_empty()),
		}
	}
}

/// Metadata payload a component declares for a loader.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PluginMetadata {
	pub plugin_type: u8,
	#[serde(default)]
	pub label: Option<String>,
	#[serde(default)]
	pub icon: Option<String>,
	#[serde(default)]
	pub template: Option<String>,
	#[serde(default)]
	pub click_action: Option<ActionEvent>,
	#[serde(default)]
	pub long_click_action: Option<ActionEvent>,
	#[serde(default)]
	pub launch_type: Option<LaunchType>,
}

/// State and behavior shared by every loader kind.
pub(crate) struct LoaderBase {
	pub settings: LoaderSettings,
	pub store: ItemStore,
	pub channel: LoaderChannel,
}

impl LoaderBase {
	pub fn new(settings: LoaderSettings, channel: LoaderChannel) -> Self {
		Self {
			settings,
			store: ItemStore::default(),
			channel,
		}
	}

	/// Reads this loader's metadata entry. Anything that does not parse, names
	/// another kind, or lacks the configured permission is ignored.
	pub fn parse(&self, info: &AbilityInfoWithId) -> Option<PluginMetadata> {
		let ability = &info.ability;
		let raw = ability.metadata_value(&self.settings.filter_key)?;
		let meta: PluginMetadata = match serde_json::from_str(raw) {
			Ok(meta) => meta,
			Err(error) => {
				tracing::debug!(
					id = %info.item_id,
					bundle = %ability.bundle_name,
					key = %self.settings.filter_key,
					%error,
					"source.loader.metadata_invalid"
				);
				return None;
			}
		};
		if meta.plugin_type != self.settings.kind.plugin_type() {
			tracing::trace!(id = %info.item_id, declared = meta.plugin_type, kind = %self.settings.kind, "source.loader.kind_mismatch");
			return None;
		}
		if let Some(permission) = &self.settings.permission
			&& !ability.permissions.iter().any(|declared| declared == permission)
		{
			tracing::debug!(id = %info.item_id, bundle = %ability.bundle_name, %permission, "source.loader.permission_denied");
			return None;
		}
		Some(meta)
	}

	pub fn base_item(&self, info: &AbilityInfoWithId, meta: &PluginMetadata) -> ItemComponentData {
		let ability = &info.ability;
		ItemComponentData {
			id: info.item_id.clone(),
			plugin_type: self.settings.kind,
			bundle_name: ability.bundle_name.clone(),
			module_name: ability.module_name.clone(),
			ability_name: ability.name.clone(),
			ability_label_id: ability.label_id,
			ability_icon_id: ability.icon_id,
			label: meta.label.as_deref().map(encode_label),
			icon_url: meta.icon.clone(),
			template: None,
			action_data: None,
		}
	}

	pub fn publish(&mut self, item: ItemComponentData) -> Option<ItemComponentData> {
		self.channel.add(&item);
		self.store.insert(item)
	}

	pub fn on_bundle_remove(&mut self, bundle: &str) -> Vec<ItemComponentData> {
		let removed = self.store.drain_bundle(bundle);
		for item in &removed {
			self.channel.remove(item);
		}
		removed
	}

	pub fn remove_item(&mut self, id: &str) -> Option<ItemComponentData> {
		let item = self.store.remove(id)?;
		self.channel.remove(&item);
		Some(item)
	}

	pub fn clear_data(&mut self) -> Vec<ItemComponentData> {
		let removed = self.store.drain_all();
		for item in &removed {
			self.channel.remove(item);
		}
		removed
	}
}

/// One configured loader.
pub enum SourceLoader {
	Declarative(DeclarativeLoader),
	RemoteTemplate(RemoteTemplateLoader),
	DataProvider(DataProviderLoader),
}

impl SourceLoader {
	fn base(&self) -> &LoaderBase {
		match self {
			Self::Declarative(loader) => &loader.base,
			Self::RemoteTemplate(loader) => &loader.base,
			Self::DataProvider(loader) => &loader.base,
		}
	}

	fn base_mut(&mut self) -> &mut LoaderBase {
		match self {
			Self::Declarative(loader) => &mut loader.base,
			Self::RemoteTemplate(loader) => &mut loader.base,
			Self::DataProvider(loader) => &mut loader.base,
		}
	}

	pub fn kind(&self) -> PluginKind {
		self.base().settings.kind
	}

	pub fn settings(&self) -> &LoaderSettings {
		&self.base().settings
	}

	pub fn store(&self) -> &ItemStore {
		&self.base().store
	}

	pub fn tracks(&self, id: &str) -> bool {
		self.base().store.contains(id)
	}

	/// Builds the item this loader would register for `info`, without
	/// registering it.
	pub fn build_item(&self, info: &AbilityInfoWithId) -> Option<ItemComponentData> {
		match self {
			Self::Declarative(loader) => loader.build_item(info),
			Self::RemoteTemplate(loader) => loader.build_item(info),
			Self::DataProvider(loader) => loader.build_item(info),
		}
	}

	/// Registers an item previously built by [`SourceLoader::build_item`].
	pub fn insert(&mut self, item: ItemComponentData) {
		match self {
			Self::RemoteTemplate(loader) => loader.insert(item),
			Self::Declarative(_) | Self::DataProvider(_) => {
				self.base_mut().publish(item);
			}
		}
	}

	/// Registers `info` if it qualifies. Returns whether it was accepted.
	pub fn on_ability_add(&mut self, info: &AbilityInfoWithId) -> bool {
		match self.build_item(info) {
			Some(item) => {
				self.insert(item);
				true
			}
			None => false,
		}
	}

	/// Drops every item of `bundle`, one remove event per item.
	pub fn on_bundle_remove(&mut self, bundle: &str) {
		let removed = self.base_mut().on_bundle_remove(bundle);
		self.forget(&removed);
	}

	/// Detaches every item of `bundle` without publishing anything.
	pub fn take_bundle(&mut self, bundle: &str) -> Vec<ItemComponentData> {
		let removed = self.base_mut().store.drain_bundle(bundle);
		self.forget(&removed);
		removed
	}

	/// Removes one item. Unknown ids are a no-op.
	pub fn remove_item(&mut self, id: &str) -> bool {
		let Some(item) = self.base_mut().remove_item(id) else {
			return false;
		};
		self.forget(std::slice::from_ref(&item));
		true
	}

	/// Removes every tracked item, one remove event per item.
	pub fn clear_data(&mut self) {
		let removed = self.base_mut().clear_data();
		self.forget(&removed);
	}

	pub fn reload_data(&mut self, user: UserId) {
		tracing::trace!(kind = %self.kind(), %user, "source.loader.reload");
		if let Self::DataProvider(loader) = self {
			loader.reload_data(user);
		}
	}

	/// Merges a remote payload. Only remote-template loaders track templates.
	pub fn on_update_plugin_component_data(&mut self, patch: &PluginPatch) {
		if let Self::RemoteTemplate(loader) = self {
			loader.on_update_plugin_component_data(patch);
		}
	}

	fn forget(&mut self, removed: &[ItemComponentData]) {
		if let Self::RemoteTemplate(loader) = self {
			loader.forget(removed);
		}
	}
}


#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::test_support::*;
	use super::*;

	fn declarative(permission: Option<&str>) -> (SourceLoader, shellbay_worker::EventStream<shellbay_proto::Envelope>) {
		let (channel, stream) = channel();
		let config = LoaderConfigInfo {
			action: KEY.into(),
			permission: permission.map(str::to_string),
		};
		let settings = LoaderSettings::new(PluginKind::Declarative, &config, "root");
		(SourceLoader::Declarative(DeclarativeLoader::new(settings, channel)), stream)
	}

	#[test]
	fn empty_action_falls_back_to_root() {
		let settings = LoaderSettings::new(PluginKind::RemoteTemplate, &LoaderConfigInfo::default(), "root");
		assert_eq!(settings.filter_key, "root");
		assert_eq!(settings.permission, None);
	}

	#[test]
	fn ignores_foreign_or_malformed_metadata() {
		let (mut loader, mut stream) = declarative(None);
		assert!(!loader.on_ability_add(&ability("a", "x", json!({"pluginType": 3, "template": "t"}))));
		let mut broken = ability("b", "x", json!({}));
		broken.ability.metadata[0].value = "{not json".into();
		assert!(!loader.on_ability_add(&broken));
		let mut unrelated = ability("c", "x", declarative_meta());
		unrelated.ability.metadata[0].name = "other".into();
		assert!(!loader.on_ability_add(&unrelated));
		assert!(stream.drain().is_empty());
		assert!(loader.store().is_empty());
	}

	#[test]
	fn permission_is_required_when_configured() {
		let (mut loader, _stream) = declarative(Some("perm.X"));
		let mut info = ability("a", "x", declarative_meta());
		assert!(!loader.on_ability_add(&info));
		info.ability.permissions.push("perm.X".into());
		assert!(loader.on_ability_add(&info));
	}

	#[test]
	fn bundle_removal_emits_one_remove_per_item() {
		let (mut loader, mut stream) = declarative(None);
		for (id, bundle) in [("a", "x"), ("b", "y"), ("c", "x")] {
			assert!(loader.on_ability_add(&ability(id, bundle, declarative_meta())));
		}
		stream.drain();
		loader.on_bundle_remove("x");
		assert_eq!(
			actions(&mut stream),
			[("removeItem".to_string(), "c".to_string()), ("removeItem".to_string(), "a".to_string())]
		);
		assert!(loader.store().iter().all(|item| item.bundle_name != "x"));
	}

	#[test]
	fn removing_unknown_id_is_silent() {
		let (mut loader, mut stream) = declarative(None);
		assert!(!loader.remove_item("ghost"));
		loader.on_bundle_remove("ghost.bundle");
		assert!(stream.drain().is_empty());
	}

	#[test]
	fn take_bundle_detaches_silently() {
		let (mut loader, mut stream) = declarative(None);
		loader.on_ability_add(&ability("a", "x", declarative_meta()));
		stream.drain();
		let taken = loader.take_bundle("x");
		assert_eq!(taken.len(), 1);
		assert!(!loader.tracks("a"));
		assert!(stream.drain().is_empty());
	}

	#[test]
	fn clear_data_removes_everything() {
		let (mut loader, mut stream) = declarative(None);
		loader.on_ability_add(&ability("a", "x", declarative_meta()));
		loader.on_ability_add(&ability("b", "y", declarative_meta()));
		stream.drain();
		loader.clear_data();
		assert_eq!(actions(&mut stream).len(), 2);
		assert!(loader.store().is_empty());
	}
}
