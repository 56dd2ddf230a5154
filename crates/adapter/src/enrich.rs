//! Label and icon enrichment of added items.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use shellbay_proto::{ItemComponentData, decode_label};

use crate::error::ResolveError;
use crate::resolver::ResourceResolver;

#[derive(Debug, Clone)]
struct Presentation {
	label: String,
	icon_url: String,
}

/// Resolves missing labels and icons, caching per `(bundle, ability)`.
///
/// Every add or remove of an id starts a new generation for it; an
/// enrichment result is only delivered if its generation is still current,
/// so a late result for a withdrawn or superseded item is dropped.
pub(crate) struct Enricher {
	resolver: Arc<dyn ResourceResolver>,
	cache: Mutex<HashMap<(String, String), Presentation>>,
	generations: Mutex<HashMap<String, u64>>,
}

impl Enricher {
	pub fn new(resolver: Arc<dyn ResourceResolver>) -> Self {
		Self {
			resolver,
			cache: Mutex::new(HashMap::new()),
			generations: Mutex::new(HashMap::new()),
		}
	}

	/// Starts a new generation for `id` and returns it.
	pub fn begin(&self, id: &str) -> u64 {
		let mut generations = self.generations.lock();
		let generation = generations.entry(id.to_string()).or_default();
		*generation += 1;
		*generation
	}

	pub fn is_current(&self, id: &str, generation: u64) -> bool {
		self.generations.lock().get(id) == Some(&generation)
	}

	/// Forgets cached presentation for the item's ability.
	pub fn invalidate(&self, item: &ItemComponentData) {
		self.cache.lock().remove(&(item.bundle_name.clone(), item.ability_name.clone()));
	}

	/// Decodes the transported label. Returns the item unchanged in `Ok` if it
	/// needs no resource lookup, or in `Err` if it does.
	pub fn ready(&self, mut item: ItemComponentData) -> Result<ItemComponentData, ItemComponentData> {
		item.label = item.label.as_deref().map(decode_label);
		if item.has_presentation() {
			return Ok(item);
		}
		let cached = self.cache.lock().get(&(item.bundle_name.clone(), item.ability_name.clone())).cloned();
		match cached {
			Some(presentation) => Ok(merge(item, presentation)),
			None => Err(item),
		}
	}

	/// Resolves label and icon concurrently. Either failure fails the item.
	pub async fn resolve(&self, item: ItemComponentData) -> Result<ItemComponentData, ResolveError> {
		let (label, icon) = tokio::join!(
			self.resolver.resolve_label(&item.bundle_name, &item.module_name, item.ability_label_id),
			self.resolver.resolve_icon(&item.bundle_name, &item.module_name, item.ability_icon_id),
		);
		let presentation = Presentation {
			label: label?,
			icon_url: icon?,
		};
		self.cache
			.lock()
			.insert((item.bundle_name.clone(), item.ability_name.clone()), presentation.clone());
		Ok(merge(item, presentation))
	}
}

/// Values the item already carries take precedence.
fn merge(mut item: ItemComponentData, presentation: Presentation) -> ItemComponentData {
	item.label.get_or_insert(presentation.label);
	item.icon_url.get_or_insert(presentation.icon_url);
	item
}

#[cfg(test)]
mod tests {
	use shellbay_proto::PluginKind;

	use super::*;
	use crate::resolver::StaticResolver;

	fn item(label: Option<&str>, icon: Option<&str>) -> ItemComponentData {
		ItemComponentData {
			id: "wifi".into(),
			plugin_type: PluginKind::Declarative,
			bundle_name: "com.x.wifi".into(),
			module_name: "entry".into(),
			ability_name: "WifiAbility".into(),
			ability_label_id: 1,
			ability_icon_id: 2,
			label: label.map(str::to_string),
			icon_url: icon.map(str::to_string),
			template: None,
			action_data: None,
		}
	}

	fn resolver() -> Arc<StaticResolver> {
		let resolver = Arc::new(StaticResolver::new());
		resolver.insert_label("com.x.wifi", 1, "Resolved");
		resolver.insert_icon("com.x.wifi", 2, "image/png", b"png");
		resolver
	}

	#[test]
	fn complete_items_skip_resolution() {
		let resolver = resolver();
		let enricher = Enricher::new(resolver.clone());
		let ready = enricher.ready(item(Some("Wi-Fi%20%2B"), Some("data:x"))).unwrap();
		assert_eq!(ready.label.as_deref(), Some("Wi-Fi +"));
		assert_eq!(resolver.calls(), 0);
	}

	#[tokio::test]
	async fn resolution_fills_missing_fields_and_caches() {
		let resolver = resolver();
		let enricher = Enricher::new(resolver.clone());
		let pending = enricher.ready(item(Some("Own"), None)).unwrap_err();
		let resolved = enricher.resolve(pending).await.unwrap();
		assert_eq!(resolved.label.as_deref(), Some("Own"));
		assert!(resolved.icon_url.as_deref().is_some_and(|icon| icon.starts_with("data:image/png;base64,")));
		assert_eq!(resolver.calls(), 2);

		assert!(enricher.ready(item(None, None)).is_ok());
		enricher.invalidate(&resolved);
		assert!(enricher.ready(item(None, None)).is_err());
	}

	#[tokio::test]
	async fn any_lookup_failure_fails_the_item() {
		let resolver = Arc::new(StaticResolver::new());
		resolver.insert_label("com.x.wifi", 1, "Resolved");
		let enricher = Enricher::new(resolver);
		assert!(enricher.resolve(item(None, None)).await.is_err());
		assert!(enricher.ready(item(None, None)).is_err());
	}

	#[test]
	fn generations_supersede() {
		let enricher = Enricher::new(resolver());
		let first = enricher.begin("wifi");
		let second = enricher.begin("wifi");
		assert!(!enricher.is_current("wifi", first));
		assert!(enricher.is_current("wifi", second));
		assert!(!enricher.is_current("other", second));
	}
}
