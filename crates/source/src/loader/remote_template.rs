use std::collections::HashMap;

use shellbay_proto::{AbilityInfoWithId, ActionData, ItemComponentData, PluginData, PluginPatch, TemplateKey};

use super::{LoaderBase, LoaderChannel, LoaderSettings};

/// Items rendered from a template whose data lives in the owning component.
///
/// Items are published immediately with `pluginData: null` and a fetch request.
/// Replies and pushes carry no slot id, so they are matched through a
/// `(bundle, ability, template)` index kept next to the primary store.
pub struct RemoteTemplateLoader {
	pub(crate) base: LoaderBase,
	index: HashMap<TemplateKey, String>,
	render_templates: HashMap<String, String>,
}

impl RemoteTemplateLoader {
	pub fn new(settings: LoaderSettings, channel: LoaderChannel) -> Self {
		Self {
			base: LoaderBase::new(settings, channel),
			index: HashMap::new(),
			render_templates: HashMap::new(),
		}
	}

	pub(crate) fn build_item(&self, info: &AbilityInfoWithId) -> Option<ItemComponentData> {
		let meta = self.base.parse(info)?;
		let Some(template) = meta.template.clone().filter(|template| !template.is_empty()) else {
			tracing::debug!(id = %info.item_id, bundle = %info.ability.bundle_name, "source.remote.template_missing");
			return None;
		};
		let mut item = self.base.base_item(info, &meta);
		item.template = Some(template);
		item.action_data = Some(ActionData::RemoteTemplate {
			plugin_data: None,
			launch_type: meta.launch_type.unwrap_or_default(),
		});
		Some(item)
	}

	pub(crate) fn insert(&mut self, item: ItemComponentData) {
		let key = item.template_key();
		let id = item.id.clone();
		let request = item.clone();
		if let Some(old) = self.base.publish(item) {
			self.forget(std::slice::from_ref(&old));
		}
		if let Some(key) = key {
			self.index.insert(key, id);
		}
		self.base.channel.on_load_plugin_component_data(&request);
	}

	/// Item id registered for a remote identity.
	pub fn lookup(&self, key: &TemplateKey) -> Option<&str> {
		self.index.get(key).map(String::as_str)
	}

	/// Number of remote identities currently indexed.
	pub fn indexed(&self) -> usize {
		self.index.len()
	}

	/// Applies a fetch reply or push, last write wins per field.
	///
	/// A render template replaces the previous one only when the update carries
	/// one; data always replaces data. Revoked data turns the item back into a
	/// pending one, which stays tracked.
	pub(crate) fn on_update_plugin_component_data(&mut self, patch: &PluginPatch) {
		let Some(id) = self.index.get(&patch.key).cloned() else {
			tracing::debug!(bundle = %patch.key.bundle_name, template = %patch.key.template, "source.remote.update_unmatched");
			return;
		};
		if let Some(template) = &patch.component_template {
			self.render_templates.insert(id.clone(), template.clone());
		}
		let render_template = self.render_templates.get(&id).cloned();
		let Some(item) = self.base.store.get_mut(&id) else {
			return;
		};
		let fallback = item.template.clone().unwrap_or_default();
		let Some(ActionData::RemoteTemplate { plugin_data, .. }) = &mut item.action_data else {
			return;
		};
		let had_data = plugin_data.is_some();
		match &patch.data {
			Some(data) => {
				*plugin_data = Some(PluginData {
					template: render_template.unwrap_or(fallback),
					data: data.clone(),
				});
				tracing::debug!(%id, "source.remote.data_applied");
				self.base.channel.add(item);
			}
			None => {
				*plugin_data = None;
				tracing::debug!(%id, was_visible = had_data, "source.remote.data_revoked");
				if had_data {
					self.base.channel.remove(item);
				}
			}
		}
	}

	pub(crate) fn forget(&mut self, removed: &[ItemComponentData]) {
		for item in removed {
			if let Some(key) = item.template_key()
				&& self.index.get(&key) == Some(&item.id)
			{
				self.index.remove(&key);
			}
			self.render_templates.remove(&item.id);
		}
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;
	use serde_json::{Value, json};
	use shellbay_proto::{CoreEvent, Envelope, LoaderConfigInfo, PluginKind};
	use shellbay_worker::EventStream;

	use super::*;
	use crate::loader::SourceLoader;
	use crate::loader::test_support::*;

	fn remote() -> (SourceLoader, EventStream<Envelope>) {
		let (channel, stream) = channel();
		let settings = LoaderSettings::new(
			PluginKind::RemoteTemplate,
			&LoaderConfigInfo {
				action: KEY.into(),
				permission: None,
			},
			"root",
		);
		(SourceLoader::RemoteTemplate(RemoteTemplateLoader::new(settings, channel)), stream)
	}

	fn weather() -> AbilityInfoWithId {
		ability("weather", "com.x.weather", json!({"pluginType": 3, "template": "card", "launchType": "dialog"}))
	}

	fn key() -> TemplateKey {
		TemplateKey {
			bundle_name: "com.x.weather".into(),
			ability_name: "weatherAbility".into(),
			template: "card".into(),
		}
	}

	fn patch(template: Option<&str>, data: Option<Value>) -> PluginPatch {
		PluginPatch {
			key: key(),
			component_template: template.map(str::to_string),
			data,
		}
	}

	fn last_item(stream: &mut EventStream<Envelope>) -> ItemComponentData {
		let envelope = stream.drain().pop().expect("an event");
		CoreEvent::try_from(envelope).unwrap().item().cloned().expect("an item")
	}

	fn plugin_data(loader: &SourceLoader) -> Option<PluginData> {
		loader.store().get("weather").and_then(|item| item.plugin_data().cloned())
	}

	#[test]
	fn registers_pending_and_requests_fetch() {
		let (mut loader, mut stream) = remote();
		assert!(loader.on_ability_add(&weather()));
		assert_eq!(
			actions(&mut stream),
			[
				("addItem".to_string(), "weather".to_string()),
				("loadPluginComponentData".to_string(), "weather".to_string())
			]
		);
		let item = loader.store().get("weather").unwrap();
		assert!(item.is_pending());
		assert!(matches!(
			item.action_data,
			Some(ActionData::RemoteTemplate {
				launch_type: shellbay_proto::LaunchType::Dialog,
				..
			})
		));
		let SourceLoader::RemoteTemplate(inner) = &loader else { unreachable!() };
		assert_eq!(inner.lookup(&key()), Some("weather"));
	}

	#[test]
	fn template_is_required() {
		let (mut loader, mut stream) = remote();
		assert!(!loader.on_ability_add(&ability("weather", "com.x.weather", json!({"pluginType": 3}))));
		assert!(stream.drain().is_empty());
	}

	#[test]
	fn fetch_result_re_emits_add() {
		let (mut loader, mut stream) = remote();
		loader.on_ability_add(&weather());
		stream.drain();
		loader.on_update_plugin_component_data(&patch(Some("T"), Some(json!({"x": 1}))));
		let item = last_item(&mut stream);
		assert_eq!(item.id, "weather");
		assert_eq!(
			item.plugin_data(),
			Some(&PluginData {
				template: "T".into(),
				data: json!({"x": 1}),
			})
		);
	}

	#[test]
	fn revocation_removes_but_keeps_tracking() {
		let (mut loader, mut stream) = remote();
		loader.on_ability_add(&weather());
		loader.on_update_plugin_component_data(&patch(Some("T"), Some(json!(1))));
		stream.drain();

		loader.on_update_plugin_component_data(&patch(None, None));
		assert_eq!(actions(&mut stream), [("removeItem".to_string(), "weather".to_string())]);
		assert!(loader.tracks("weather"));
		assert!(plugin_data(&loader).is_none());

		loader.on_update_plugin_component_data(&patch(None, None));
		assert!(stream.drain().is_empty());

		loader.on_update_plugin_component_data(&patch(None, Some(json!(2))));
		assert_eq!(
			plugin_data(&loader),
			Some(PluginData {
				template: "T".into(),
				data: json!(2),
			})
		);
	}

	#[test]
	fn merge_is_last_applied_wins() {
		let push = patch(Some("pushed"), Some(json!({"v": "push"})));
		let pull = patch(None, Some(json!({"v": "pull"})));

		let (mut a, _sa) = remote();
		a.on_ability_add(&weather());
		a.on_update_plugin_component_data(&push);
		a.on_update_plugin_component_data(&pull);
		assert_eq!(
			plugin_data(&a),
			Some(PluginData {
				template: "pushed".into(),
				data: json!({"v": "pull"}),
			})
		);

		let (mut b, _sb) = remote();
		b.on_ability_add(&weather());
		b.on_update_plugin_component_data(&pull);
		b.on_update_plugin_component_data(&push);
		assert_eq!(
			plugin_data(&b),
			Some(PluginData {
				template: "pushed".into(),
				data: json!({"v": "push"}),
			})
		);
	}

	#[test]
	fn unmatched_and_removed_items_ignore_updates() {
		let (mut loader, mut stream) = remote();
		loader.on_update_plugin_component_data(&patch(None, Some(json!(1))));
		assert!(stream.drain().is_empty());

		loader.on_ability_add(&weather());
		loader.on_bundle_remove("com.x.weather");
		stream.drain();
		loader.on_update_plugin_component_data(&patch(None, Some(json!(1))));
		assert!(stream.drain().is_empty());
		let SourceLoader::RemoteTemplate(inner) = &loader else { unreachable!() };
		assert_eq!(inner.lookup(&key()), None);
	}
}
