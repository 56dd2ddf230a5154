//! Data model shared by the Registry Core, its loaders and the adapter.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// OS user whose session is currently loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u32);

impl fmt::Display for UserId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Loader kind a component declares in its metadata.
///
/// Serialized as the numeric `pluginType` components write into their
/// metadata; configured by string key in [`RootConfigInfo::loader_config`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum PluginKind {
	/// Item fully described by static metadata.
	Declarative,
	/// Item backed by a data provider component.
	DataProvider,
	/// Item rendered from a template whose data is fetched from, or pushed by,
	/// the owning component.
	RemoteTemplate,
}

impl PluginKind {
	/// Every known kind, in `pluginType` order.
	pub const ALL: [PluginKind; 3] = [PluginKind::Declarative, PluginKind::DataProvider, PluginKind::RemoteTemplate];

	/// Parses a `loaderConfig` key.
	pub fn from_key(key: &str) -> Option<Self> {
		match key {
			"declarative" => Some(Self::Declarative),
			"dataProvider" => Some(Self::DataProvider),
			"remoteTemplate" => Some(Self::RemoteTemplate),
			_ => None,
		}
	}

	/// The `loaderConfig` key for this kind.
	pub const fn key(self) -> &'static str {
		match self {
			Self::Declarative => "declarative",
			Self::DataProvider => "dataProvider",
			Self::RemoteTemplate => "remoteTemplate",
		}
	}

	/// Numeric `pluginType` written by components.
	pub const fn plugin_type(self) -> u8 {
		match self {
			Self::Declarative => 1,
			Self::DataProvider => 2,
			Self::RemoteTemplate => 3,
		}
	}

	/// Inverse of [`PluginKind::plugin_type`].
	pub fn from_plugin_type(value: u8) -> Option<Self> {
		Self::ALL.into_iter().find(|kind| kind.plugin_type() == value)
	}
}

impl fmt::Display for PluginKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.key())
	}
}

impl From<PluginKind> for u8 {
	fn from(kind: PluginKind) -> Self {
		kind.plugin_type()
	}
}

impl TryFrom<u8> for PluginKind {
	type Error = String;

	fn try_from(value: u8) -> Result<Self, Self::Error> {
		Self::from_plugin_type(value).ok_or_else(|| format!("unknown pluginType {value}"))
	}
}

/// Static declaration that `bundle_name/ability_name` fills slot `id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterData {
	/// Logical slot identifier.
	pub id: String,
	/// Owning package.
	pub bundle_name: String,
	/// Ability within the package.
	pub ability_name: String,
}

/// Per-kind loader settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoaderConfigInfo {
	/// Metadata key this loader reads. Empty means the root action.
	#[serde(default)]
	pub action: String,
	/// Permission an ability must declare to be accepted.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub permission: Option<String>,
}

/// Configuration handed to the Registry Core at start-up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootConfigInfo {
	/// Action string queried from the component directory.
	pub action: String,
	/// Slot to component map.
	#[serde(default)]
	pub filter_datas: Vec<FilterData>,
	/// Loader settings keyed by kind key, in declaration order.
	#[serde(default)]
	pub loader_config: IndexMap<String, LoaderConfigInfo>,
}

impl RootConfigInfo {
	/// Whether a remote-template loader is configured.
	pub fn declares_kind(&self, kind: PluginKind) -> bool {
		self.loader_config.keys().any(|key| PluginKind::from_key(key) == Some(kind))
	}
}

/// One metadata entry attached to an ability.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
	/// Metadata key.
	pub name: String,
	/// Raw value, usually a JSON document.
	#[serde(default)]
	pub value: String,
	/// Optional resource reference.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub resource: Option<String>,
}

/// Ability or extension-ability descriptor returned by the component directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbilityInfo {
	/// Owning package.
	pub bundle_name: String,
	/// Module inside the package.
	#[serde(default)]
	pub module_name: String,
	/// Ability name.
	pub name: String,
	/// Label resource handle.
	#[serde(default)]
	pub label_id: u32,
	/// Icon resource handle.
	#[serde(default)]
	pub icon_id: u32,
	/// Permissions declared by the ability.
	#[serde(default)]
	pub permissions: Vec<String>,
	/// Raw metadata blobs.
	#[serde(default)]
	pub metadata: Vec<Metadata>,
}

impl AbilityInfo {
	/// Value of the first metadata entry named `key`.
	pub fn metadata_value(&self, key: &str) -> Option<&str> {
		self.metadata.iter().find(|entry| entry.name == key).map(|entry| entry.value.as_str())
	}
}

/// A directory result annotated with the slot it fills.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbilityInfoWithId {
	/// Slot resolved through [`FilterData`].
	pub item_id: String,
	/// The discovered ability.
	pub ability: AbilityInfo,
}

/// Click or long-click target of a declarative item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionEvent {
	/// Package to launch.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub bundle_name: Option<String>,
	/// Ability to launch.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub ability_name: Option<String>,
	/// URI to open.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub uri: Option<String>,
}

/// How a remote-template item is presented when activated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LaunchType {
	/// Rendered in place.
	#[default]
	Inline,
	/// Rendered in a dialog.
	Dialog,
}

/// Template plus data fetched from or pushed by a remote component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginData {
	/// Template to render.
	pub template: String,
	/// Data bound into the template.
	pub data: Value,
}

/// Kind-specific action payload of an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ActionData {
	/// Click targets of a declarative item.
	Declarative {
		/// Target on click.
		#[serde(default, skip_serializing_if = "Option::is_none")]
		click_action: Option<ActionEvent>,
		/// Target on long click.
		#[serde(default, skip_serializing_if = "Option::is_none")]
		long_click_action: Option<ActionEvent>,
	},
	/// Remote-template payload. `plugin_data == None` means pending.
	RemoteTemplate {
		/// Fetched or pushed payload.
		plugin_data: Option<PluginData>,
		/// Presentation mode.
		#[serde(default)]
		launch_type: LaunchType,
	},
}

/// Identity of a remote template as seen by the component that serves it.
///
/// Remote replies carry no slot id, so remote-template items are matched on
/// this triple instead.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateKey {
	/// Owning package.
	pub bundle_name: String,
	/// Serving ability.
	pub ability_name: String,
	/// Requested template name.
	pub template: String,
}

/// The unit of registration published to consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemComponentData {
	/// Slot id; unique across all loaders.
	pub id: String,
	/// Loader kind that owns the item.
	pub plugin_type: PluginKind,
	/// Owning package.
	pub bundle_name: String,
	/// Module inside the package.
	pub module_name: String,
	/// Ability name.
	pub ability_name: String,
	/// Label resource handle.
	pub ability_label_id: u32,
	/// Icon resource handle.
	pub ability_icon_id: u32,
	/// Label, URL-encoded while crossing the boundary.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub label: Option<String>,
	/// Renderable icon (URL or data URL).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub icon_url: Option<String>,
	/// Remote template name.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub template: Option<String>,
	/// Kind-specific payload.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub action_data: Option<ActionData>,
}

impl ItemComponentData {
	/// Whether label and icon are both present, so no resource lookup is needed.
	pub fn has_presentation(&self) -> bool {
		self.label.is_some() && self.icon_url.is_some()
	}

	/// Remote payload, if this is a remote-template item that has one.
	pub fn plugin_data(&self) -> Option<&PluginData> {
		match &self.action_data {
			Some(ActionData::RemoteTemplate { plugin_data, .. }) => plugin_data.as_ref(),
			_ => None,
		}
	}

	/// Whether this is a remote-template item still waiting for data.
	pub fn is_pending(&self) -> bool {
		matches!(&self.action_data, Some(ActionData::RemoteTemplate { plugin_data: None, .. }))
	}

	/// Remote identity of this item, when it has a template.
	pub fn template_key(&self) -> Option<TemplateKey> {
		self.template.as_ref().map(|template| TemplateKey {
			bundle_name: self.bundle_name.clone(),
			ability_name: self.ability_name.clone(),
			template: template.clone(),
		})
	}
}

/// Payload fetched from or pushed by a remote component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginComponentData {
	/// Owning package.
	pub bundle_name: String,
	/// Module inside the package.
	#[serde(default)]
	pub module_name: String,
	/// Serving ability.
	pub ability_name: String,
	/// Requested template name.
	pub template: String,
	/// Render template supplied by the component.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub component_template: Option<String>,
	/// Data to bind. `None` means the component revoked its offer.
	#[serde(default)]
	pub data: Option<Value>,
	/// Component-defined extras.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub extra_data: Option<Value>,
}

impl PluginComponentData {
	/// Remote identity this payload belongs to.
	pub fn key(&self) -> TemplateKey {
		TemplateKey {
			bundle_name: self.bundle_name.clone(),
			ability_name: self.ability_name.clone(),
			template: self.template.clone(),
		}
	}
}

/// Payload of `updatePluginComponentData`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ComponentUpdate {
	/// A full item whose `pluginData` carries the update.
	Item(ItemComponentData),
	/// A raw remote payload.
	Component(PluginComponentData),
}

/// Normalized update: which template, and what changed.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginPatch {
	/// Remote identity of the target item.
	pub key: TemplateKey,
	/// New render template, if the update carries one.
	pub component_template: Option<String>,
	/// New data; `None` revokes the item's payload.
	pub data: Option<Value>,
}

impl ComponentUpdate {
	/// Normalizes either shape into a [`PluginPatch`]. Items without a template
	/// or without remote-template action data cannot be matched and yield `None`.
	pub fn into_patch(self) -> Option<PluginPatch> {
		match self {
			Self::Component(component) => {
				let key = component.key();
				Some(PluginPatch {
					key,
					component_template: component.component_template,
					data: component.data.filter(|data| !data.is_null()),
				})
			}
			Self::Item(item) => {
				let key = item.template_key()?;
				let Some(ActionData::RemoteTemplate { plugin_data, .. }) = item.action_data else {
					return None;
				};
				Some(match plugin_data {
					Some(PluginData { template, data }) => PluginPatch {
						key,
						component_template: Some(template),
						data: Some(data),
					},
					None => PluginPatch {
						key,
						component_template: None,
						data: None,
					},
				})
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;
	use serde_json::json;

	use super::*;

	#[test]
	fn plugin_kind_keys_and_numbers() {
		for kind in PluginKind::ALL {
			assert_eq!(PluginKind::from_key(kind.key()), Some(kind));
			assert_eq!(PluginKind::from_plugin_type(kind.plugin_type()), Some(kind));
		}
		assert_eq!(PluginKind::from_key("MetaSource"), None);
		assert_eq!(PluginKind::from_plugin_type(9), None);
		assert_eq!(serde_json::to_value(PluginKind::RemoteTemplate).unwrap(), json!(3));
		assert!(serde_json::from_value::<PluginKind>(json!(7)).is_err());
	}

	#[test]
	fn root_config_keeps_loader_order() {
		let config: RootConfigInfo = serde_json::from_value(json!({
			"action": "shellbay.action.PLUGIN",
			"filterDatas": [{"id": "wifi", "bundleName": "com.x.wifi", "abilityName": "WifiAbility"}],
			"loaderConfig": {
				"remoteTemplate": {"action": "shellbay.remote"},
				"declarative": {},
			}
		}))
		.unwrap();
		let keys: Vec<_> = config.loader_config.keys().map(String::as_str).collect();
		assert_eq!(keys, ["remoteTemplate", "declarative"]);
		assert!(config.declares_kind(PluginKind::RemoteTemplate));
		assert!(!config.declares_kind(PluginKind::DataProvider));
		assert_eq!(config.loader_config["declarative"], LoaderConfigInfo::default());
	}

	#[test]
	fn action_data_is_tagged_by_kind() {
		let data = ActionData::RemoteTemplate {
			plugin_data: None,
			launch_type: LaunchType::Dialog,
		};
		assert_eq!(
			serde_json::to_value(&data).unwrap(),
			json!({"kind": "remoteTemplate", "pluginData": null, "launchType": "dialog"})
		);
	}

	fn remote_item(plugin_data: Option<PluginData>) -> ItemComponentData {
		ItemComponentData {
			id: "weather".into(),
			plugin_type: PluginKind::RemoteTemplate,
			bundle_name: "com.x.weather".into(),
			module_name: "entry".into(),
			ability_name: "WeatherAbility".into(),
			ability_label_id: 1,
			ability_icon_id: 2,
			label: None,
			icon_url: None,
			template: Some("card".into()),
			action_data: Some(ActionData::RemoteTemplate {
				plugin_data,
				launch_type: LaunchType::Inline,
			}),
		}
	}

	#[test]
	fn update_payload_accepts_both_shapes() {
		let item = remote_item(Some(PluginData {
			template: "T".into(),
			data: json!({"x": 1}),
		}));
		let wire = serde_json::to_value(&item).unwrap();
		let update: ComponentUpdate = serde_json::from_value(wire).unwrap();
		assert!(matches!(update, ComponentUpdate::Item(_)));
		let patch = update.into_patch().unwrap();
		assert_eq!(patch.key, item.template_key().unwrap());
		assert_eq!(patch.component_template.as_deref(), Some("T"));
		assert_eq!(patch.data, Some(json!({"x": 1})));

		let update: ComponentUpdate = serde_json::from_value(json!({
			"bundleName": "com.x.weather",
			"abilityName": "WeatherAbility",
			"template": "card",
			"data": null
		}))
		.unwrap();
		assert!(matches!(update, ComponentUpdate::Component(_)));
		let patch = update.into_patch().unwrap();
		assert_eq!(patch.data, None);
		assert_eq!(patch.component_template, None);
	}

	#[test]
	fn pending_state_follows_plugin_data() {
		let pending = remote_item(None);
		assert!(pending.is_pending());
		assert!(pending.plugin_data().is_none());
		assert!(!pending.has_presentation());

		let mut declarative = remote_item(None);
		declarative.action_data = None;
		declarative.template = None;
		assert!(!declarative.is_pending());
		assert_eq!(ComponentUpdate::Item(declarative).into_patch(), None);
	}
}
