//! Registry Core.
//!
//! [`SourceManager`] owns the configured loaders, scans the component directory
//! and fans results out to them. It is driven by one caller at a time (the core
//! actor), so none of its state is locked.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use shellbay_proto::{AbilityInfo, AbilityInfoWithId, ComponentUpdate, CoreCommand, FilterData, RootConfigInfo, UserId};
use shellbay_worker::EventSink;

use crate::directory::{AbilityQuery, BundleEvent, BundleEventKind, BundleMonitor, ComponentDirectory, SubscriptionId};
use crate::factory::LoaderFactory;
use crate::loader::{LoaderChannel, SourceLoader};

/// The Registry Core.
pub struct SourceManager {
	directory: Arc<dyn ComponentDirectory>,
	monitor: Arc<dyn BundleMonitor>,
	channel: LoaderChannel,
	bundle_sink: EventSink<BundleEvent>,
	action: String,
	/// `(bundleName, abilityName)` to slot id.
	slots: HashMap<(String, String), String>,
	loaders: Vec<SourceLoader>,
	subscription: Option<SubscriptionId>,
	last_user: Option<UserId>,
}

impl SourceManager {
	/// Bundle notifications are delivered to `bundle_sink`; whoever drains it
	/// feeds them back through [`SourceManager::on_bundle_notify`].
	pub fn new(
		directory: Arc<dyn ComponentDirectory>,
		monitor: Arc<dyn BundleMonitor>,
		channel: LoaderChannel,
		bundle_sink: EventSink<BundleEvent>,
	) -> Self {
		Self {
			directory,
			monitor,
			channel,
			bundle_sink,
			action: String::new(),
			slots: HashMap::new(),
			loaders: Vec::new(),
			subscription: None,
			last_user: None,
		}
	}

	/// Applies one boundary command.
	pub async fn apply(&mut self, command: CoreCommand) {
		match command {
			CoreCommand::InitConfig(config) => self.init_data_source(config),
			CoreCommand::LoadData(user) => self.load_data(user).await,
			CoreCommand::ClearAll => self.clear_all(),
			CoreCommand::UpdatePluginComponentData(update) => self.update_plugin_component_data(update),
		}
	}

	pub fn loaders(&self) -> &[SourceLoader] {
		&self.loaders
	}

	pub fn last_user(&self) -> Option<UserId> {
		self.last_user
	}

	pub fn is_subscribed(&self) -> bool {
		self.subscription.is_some()
	}

	/// Whether any loader tracks `id`.
	pub fn tracks(&self, id: &str) -> bool {
		self.loaders.iter().any(|loader| loader.tracks(id))
	}

	/// Stores the action and slot map, builds loaders in configuration order
	/// and subscribes to bundle changes.
	///
	/// A repeated call first clears the previous loaders and subscription, and
	/// forgets the last user so the next [`SourceManager::load_data`] rescans.
	pub fn init_data_source(&mut self, config: RootConfigInfo) {
		if !self.loaders.is_empty() || self.subscription.is_some() {
			tracing::debug!(loaders = self.loaders.len(), "source.manager.reinit");
			self.clear_all();
		}
		self.last_user = None;
		self.slots = slot_map(&config.filter_datas);
		self.action = config.action;

		let factory = LoaderFactory::new(self.action.clone(), self.channel.clone());
		self.loaders = config
			.loader_config
			.iter()
			.filter_map(|(key, loader_config)| factory.get_source_loader(key, loader_config))
			.collect();

		self.subscribe();
		tracing::info!(
			action = %self.action,
			loaders = self.loaders.len(),
			slots = self.slots.len(),
			"source.manager.init"
		);
		self.channel.init_finish();
	}

	/// Rescans for a new user, then runs every loader's reload hook.
	pub async fn load_data(&mut self, user: UserId) {
		if self.last_user != Some(user) {
			tracing::info!(%user, previous = ?self.last_user, "source.manager.user_changed");
			self.last_user = Some(user);
			for loader in &mut self.loaders {
				loader.clear_data();
			}
			let abilities = self.query(None, Some(user)).await;
			self.dispatch(abilities);
		}
		for loader in &mut self.loaders {
			loader.reload_data(user);
		}
	}

	/// Reacts to a package lifecycle event.
	///
	/// `Change` is a staged refresh: the bundle's items are detached silently,
	/// the scoped rescan re-adds what is still there, and only ids that did not
	/// come back are reported removed. Consumers never observe the bundle
	/// missing in between.
	pub async fn on_bundle_notify(&mut self, event: BundleEvent) {
		let bundle = event.bundle_name.as_str();
		tracing::debug!(%bundle, kind = ?event.kind, "source.manager.bundle_event");
		match event.kind {
			BundleEventKind::Remove => {
				for loader in &mut self.loaders {
					loader.on_bundle_remove(bundle);
				}
			}
			BundleEventKind::Add => {
				let abilities = self.query(Some(bundle), self.last_user).await;
				self.dispatch(abilities);
			}
			BundleEventKind::Change => {
				let detached: Vec<_> = self.loaders.iter_mut().flat_map(|loader| loader.take_bundle(bundle)).collect();
				let abilities = self.query(Some(bundle), self.last_user).await;
				self.dispatch(abilities);
				for item in detached.iter().filter(|item| !self.tracks(&item.id)) {
					self.channel.remove(item);
				}
			}
		}
	}

	/// Forwards a fetch reply or push to every loader.
	pub fn update_plugin_component_data(&mut self, update: ComponentUpdate) {
		let Some(patch) = update.into_patch() else {
			tracing::debug!("source.manager.update_unmatchable");
			return;
		};
		for loader in &mut self.loaders {
			loader.on_update_plugin_component_data(&patch);
		}
	}

	/// Unsubscribes, clears every loader and forgets the last user.
	pub fn clear_all(&mut self) {
		self.detach();
		for loader in &mut self.loaders {
			loader.clear_data();
		}
		self.last_user = None;
	}

	/// Drops the bundle subscription without touching loader state.
	pub fn detach(&mut self) {
		if let Some(id) = self.subscription.take() {
			self.monitor.unsubscribe(id);
			tracing::debug!(subscription = id.0, "source.manager.unsubscribed");
		}
	}

	fn subscribe(&mut self) {
		match self.monitor.subscribe(self.bundle_sink.clone()) {
			Ok(id) => self.subscription = Some(id),
			Err(error) => tracing::warn!(%error, "source.manager.subscribe_failed"),
		}
	}

	/// Both query kinds run; a failure of either is logged and counts as empty.
	async fn query(&self, bundle: Option<&str>, user: Option<UserId>) -> Vec<AbilityInfo> {
		let query = AbilityQuery {
			action: self.action.clone(),
			bundle_name: bundle.map(str::to_string),
			user,
		};
		let mut found = match self.directory.query_abilities(&query).await {
			Ok(abilities) => abilities,
			Err(error) => {
				tracing::warn!(%error, bundle = ?query.bundle_name, "source.manager.query_failed");
				Vec::new()
			}
		};
		match self.directory.query_extension_abilities(&query).await {
			Ok(extensions) => found.extend(extensions),
			Err(error) => tracing::warn!(%error, bundle = ?query.bundle_name, "source.manager.query_failed"),
		}
		tracing::debug!(count = found.len(), scoped = query.is_scoped(), user = ?user, "source.manager.scan");
		found
	}

	fn dispatch(&mut self, abilities: Vec<AbilityInfo>) {
		for ability in abilities {
			let Some(item_id) = self.slots.get(&(ability.bundle_name.clone(), ability.name.clone())).cloned() else {
				tracing::trace!(bundle = %ability.bundle_name, ability = %ability.name, "source.manager.no_slot");
				continue;
			};
			self.dispatch_one(AbilityInfoWithId { item_id, ability });
		}
	}

	/// The first loader in configuration order that accepts owns the slot;
	/// every other loader gives it up before the owner publishes.
	fn dispatch_one(&mut self, info: AbilityInfoWithId) {
		let accepted = self
			.loaders
			.iter()
			.enumerate()
			.find_map(|(idx, loader)| loader.build_item(&info).map(|item| (idx, item)));
		let Some((owner, item)) = accepted else {
			tracing::debug!(id = %info.item_id, bundle = %info.ability.bundle_name, "source.manager.unclaimed");
			return;
		};
		for (idx, loader) in self.loaders.iter_mut().enumerate() {
			if idx != owner && loader.remove_item(&info.item_id) {
				tracing::debug!(id = %info.item_id, from = %loader.kind(), "source.manager.slot_moved");
			}
		}
		self.loaders[owner].insert(item);
	}
}

/// First declaration of a slot id wins.
fn slot_map(filters: &[FilterData]) -> HashMap<(String, String), String> {
	let mut seen = HashSet::new();
	let mut slots = HashMap::new();
	for filter in filters {
		if !seen.insert(filter.id.as_str()) {
			tracing::warn!(id = %filter.id, bundle = %filter.bundle_name, "source.manager.duplicate_slot");
			continue;
		}
		slots
			.entry((filter.bundle_name.clone(), filter.ability_name.clone()))
			.or_insert_with(|| filter.id.clone());
	}
	slots
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;
	use serde_json::{Value, json};
	use shellbay_proto::{AbilityInfo, Action, Envelope, LoaderConfigInfo, Metadata, PluginComponentData, PluginKind, TemplateKey};
	use shellbay_worker::EventStream;

	use super::*;
	use crate::directory::QueryKind;
	use crate::memory::{CatalogEntry, StaticDirectory};

	const ACTION: &str = "shellbay.action.PLUGIN";

	struct Harness {
		directory: Arc<StaticDirectory>,
		manager: SourceManager,
		events: EventStream<Envelope>,
		bundles: EventStream<BundleEvent>,
	}

	impl Harness {
		fn new(entries: Vec<CatalogEntry>) -> Self {
			let directory = Arc::new(StaticDirectory::with_entries(entries));
			let (sink, events) = EventSink::channel();
			let (bundle_sink, bundles) = EventSink::channel();
			let manager = SourceManager::new(directory.clone(), directory.clone(), LoaderChannel::new(sink), bundle_sink);
			Self {
				directory,
				manager,
				events,
				bundles,
			}
		}

		fn init(&mut self, kinds: &[&str], filters: &[(&str, &str, &str)]) {
			let config = RootConfigInfo {
				action: ACTION.into(),
				filter_datas: filters
					.iter()
					.map(|(id, bundle, ability)| FilterData {
						id: (*id).into(),
						bundle_name: (*bundle).into(),
						ability_name: (*ability).into(),
					})
					.collect(),
				loader_config: kinds.iter().map(|kind| ((*kind).to_string(), LoaderConfigInfo::default())).collect(),
			};
			self.manager.init_data_source(config);
		}

		async fn pump_bundles(&mut self) {
			for event in self.bundles.drain() {
				self.manager.on_bundle_notify(event).await;
			}
		}

		fn actions(&mut self) -> Vec<(Action, String)> {
			self.events
				.drain()
				.into_iter()
				.map(|envelope| {
					let id = envelope.data.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
					(envelope.action, id)
				})
				.collect()
		}

		fn unscoped_scans(&self) -> usize {
			self.directory
				.queries()
				.iter()
				.filter(|record| record.kind == QueryKind::Ability && !record.query.is_scoped())
				.count()
		}
	}

	fn entry(bundle: &str, ability: &str, meta: Value) -> CatalogEntry {
		CatalogEntry {
			kind: QueryKind::Ability,
			actions: vec![ACTION.into()],
			users: vec![],
			ability: AbilityInfo {
				bundle_name: bundle.into(),
				module_name: "entry".into(),
				name: ability.into(),
				label_id: 1,
				icon_id: 2,
				permissions: vec![],
				metadata: vec![Metadata {
					name: ACTION.into(),
					value: meta.to_string(),
					resource: None,
				}],
			},
		}
	}

	fn wifi_meta() -> Value {
		json!({"pluginType": 1, "label": "Wi-Fi", "icon": "data:image/png;base64,AA=="})
	}

	fn wifi() -> CatalogEntry {
		entry("com.x.wifi", "WifiAbility", wifi_meta())
	}

	const WIFI: (&str, &str, &str) = ("wifi", "com.x.wifi", "WifiAbility");

	#[tokio::test]
	async fn declarative_slot_is_added_once() {
		let mut h = Harness::new(vec![wifi(), entry("com.x.unmapped", "Other", wifi_meta())]);
		h.init(&["declarative"], &[WIFI]);
		h.manager.load_data(UserId(100)).await;
		assert_eq!(
			h.actions(),
			[(Action::InitFinish, String::new()), (Action::AddItem, "wifi".to_string())]
		);
		assert!(h.manager.is_subscribed());
	}

	#[tokio::test]
	async fn uninstall_removes_the_slot() {
		let mut h = Harness::new(vec![wifi()]);
		h.init(&["declarative"], &[WIFI]);
		h.manager.load_data(UserId(100)).await;
		h.actions();

		assert!(h.directory.uninstall("com.x.wifi"));
		h.pump_bundles().await;
		assert_eq!(h.actions(), [(Action::RemoveItem, "wifi".to_string())]);
		assert!(!h.manager.tracks("wifi"));
		assert!(h.manager.loaders().iter().all(|loader| loader.store().iter().all(|item| item.bundle_name != "com.x.wifi")));
	}

	#[tokio::test]
	async fn uninstall_clears_every_loader_holding_the_bundle() {
		let mut h = Harness::new(vec![
			entry("com.x.combo", "PanelAbility", wifi_meta()),
			entry("com.x.combo", "CardAbility", json!({"pluginType": 3, "template": "card"})),
		]);
		h.init(
			&["declarative", "remoteTemplate"],
			&[("panel", "com.x.combo", "PanelAbility"), ("card", "com.x.combo", "CardAbility")],
		);
		h.manager.load_data(UserId(100)).await;
		h.actions();
		assert!(h.manager.tracks("panel"));
		assert!(h.manager.tracks("card"));

		assert!(h.directory.uninstall("com.x.combo"));
		h.pump_bundles().await;
		let mut removed: Vec<_> = h
			.actions()
			.into_iter()
			.filter(|(action, _)| *action == Action::RemoveItem)
			.map(|(_, id)| id)
			.collect();
		removed.sort();
		assert_eq!(removed, ["card", "panel"]);
		assert!(h.manager.loaders().iter().all(|loader| !loader.tracks("panel") && !loader.tracks("card")));

		let key = TemplateKey {
			bundle_name: "com.x.combo".into(),
			ability_name: "CardAbility".into(),
			template: "card".into(),
		};
		let remote = h.manager.loaders().iter().find_map(|loader| match loader {
			SourceLoader::RemoteTemplate(loader) => Some(loader),
			_ => None,
		});
		assert_eq!(remote.map(|loader| loader.indexed()), Some(0));
		assert_eq!(remote.and_then(|loader| loader.lookup(&key)), None);
	}

	#[tokio::test]
	async fn repeated_load_rescans_once() {
		let mut h = Harness::new(vec![wifi()]);
		h.init(&["declarative", "dataProvider"], &[WIFI]);
		h.manager.load_data(UserId(5)).await;
		h.manager.load_data(UserId(5)).await;
		assert_eq!(h.unscoped_scans(), 1);
		let SourceLoader::DataProvider(provider) = &h.manager.loaders()[1] else {
			panic!("expected data provider");
		};
		assert_eq!(provider.reload_count(), 2);
		assert_eq!(provider.last_user(), Some(UserId(5)));

		h.manager.load_data(UserId(6)).await;
		assert_eq!(h.unscoped_scans(), 2);
		let adds = h.actions().into_iter().filter(|(action, _)| *action == Action::AddItem).count();
		assert_eq!(adds, 2);
	}

	#[tokio::test]
	async fn change_refreshes_without_a_gap() {
		let mut h = Harness::new(vec![
			wifi(),
			entry("com.x.wifi", "HotspotAbility", json!({"pluginType": 1, "label": "Hotspot"})),
		]);
		h.init(&["declarative"], &[WIFI, ("hotspot", "com.x.wifi", "HotspotAbility")]);
		h.manager.load_data(UserId(100)).await;
		h.actions();

		h.directory.update("com.x.wifi", vec![wifi()]);
		h.pump_bundles().await;
		assert_eq!(
			h.actions(),
			[(Action::AddItem, "wifi".to_string()), (Action::RemoveItem, "hotspot".to_string())]
		);
		assert!(h.manager.tracks("wifi"));
		assert!(!h.manager.tracks("hotspot"));
	}

	#[tokio::test]
	async fn add_event_moves_slot_between_kinds() {
		let mut h = Harness::new(vec![wifi()]);
		h.init(&["declarative", "dataProvider"], &[WIFI]);
		h.manager.load_data(UserId(100)).await;
		h.actions();

		h.directory.install("com.x.wifi", vec![entry("com.x.wifi", "WifiAbility", json!({"pluginType": 2}))]);
		h.pump_bundles().await;
		assert_eq!(
			h.actions(),
			[(Action::RemoveItem, "wifi".to_string()), (Action::AddItem, "wifi".to_string())]
		);
		let owners: Vec<_> = h.manager.loaders().iter().filter(|loader| loader.tracks("wifi")).map(SourceLoader::kind).collect();
		assert_eq!(owners, [PluginKind::DataProvider]);
	}

	#[tokio::test]
	async fn one_failing_query_kind_does_not_hide_the_other() {
		let mut extension = entry("com.x.cast", "CastExtension", json!({"pluginType": 1, "label": "Cast"}));
		extension.kind = QueryKind::Extension;
		let mut h = Harness::new(vec![wifi(), extension]);
		h.directory.set_failing(QueryKind::Ability, true);
		h.init(&["declarative"], &[WIFI, ("cast", "com.x.cast", "CastExtension")]);
		h.manager.load_data(UserId(100)).await;
		assert!(h.manager.tracks("cast"));
		assert!(!h.manager.tracks("wifi"));
	}

	#[tokio::test]
	async fn duplicate_slot_ids_keep_the_first() {
		let mut h = Harness::new(vec![wifi(), entry("com.y.wifi", "WifiAbility", wifi_meta())]);
		h.init(&["declarative"], &[WIFI, ("wifi", "com.y.wifi", "WifiAbility")]);
		h.manager.load_data(UserId(100)).await;
		let items: Vec<_> = h.manager.loaders()[0].store().iter().map(|item| item.bundle_name.clone()).collect();
		assert_eq!(items, ["com.x.wifi"]);
	}

	#[tokio::test]
	async fn unknown_loader_kind_is_skipped() {
		let mut h = Harness::new(vec![wifi()]);
		h.init(&["metaSource", "declarative"], &[WIFI]);
		assert_eq!(h.manager.loaders().len(), 1);
		h.manager.load_data(UserId(100)).await;
		assert!(h.manager.tracks("wifi"));
	}

	#[tokio::test]
	async fn clear_all_unsubscribes_and_forgets_user() {
		let mut h = Harness::new(vec![wifi()]);
		h.init(&["declarative"], &[WIFI]);
		h.manager.load_data(UserId(100)).await;
		h.actions();

		h.manager.clear_all();
		assert_eq!(h.actions(), [(Action::RemoveItem, "wifi".to_string())]);
		assert!(!h.manager.is_subscribed());
		assert_eq!(h.directory.subscriber_count(), 0);
		assert_eq!(h.manager.last_user(), None);

		h.directory.uninstall("com.x.wifi");
		assert!(h.bundles.drain().is_empty());

		h.manager.load_data(UserId(100)).await;
		assert_eq!(h.unscoped_scans(), 2);
	}

	#[tokio::test]
	async fn reinit_clears_previous_loaders() {
		let mut h = Harness::new(vec![wifi()]);
		h.init(&["declarative"], &[WIFI]);
		h.manager.load_data(UserId(100)).await;
		h.actions();

		h.init(&["dataProvider"], &[WIFI]);
		assert_eq!(
			h.actions(),
			[(Action::RemoveItem, "wifi".to_string()), (Action::InitFinish, String::new())]
		);
		assert_eq!(h.directory.subscriber_count(), 1);
		h.manager.load_data(UserId(100)).await;
		assert!(!h.manager.tracks("wifi"));
	}

	#[tokio::test]
	async fn remote_round_trip_through_apply() {
		let remote = entry("com.x.weather", "WeatherAbility", json!({"pluginType": 3, "template": "card"}));
		let mut h = Harness::new(vec![remote]);
		h.init(&["remoteTemplate"], &[("weather", "com.x.weather", "WeatherAbility")]);
		h.manager.apply(CoreCommand::LoadData(UserId(100))).await;
		assert_eq!(
			h.actions(),
			[
				(Action::InitFinish, String::new()),
				(Action::AddItem, "weather".to_string()),
				(Action::LoadPluginComponentData, "weather".to_string())
			]
		);

		let update = ComponentUpdate::Component(PluginComponentData {
			bundle_name: "com.x.weather".into(),
			module_name: "entry".into(),
			ability_name: "WeatherAbility".into(),
			template: "card".into(),
			component_template: Some("T".into()),
			data: Some(json!({"x": 1})),
			extra_data: None,
		});
		h.manager.apply(CoreCommand::UpdatePluginComponentData(update)).await;
		let events = h.events.drain();
		assert_eq!(events.len(), 1);
		assert_eq!(events[0].action, Action::AddItem);
		assert_eq!(events[0].data["actionData"]["pluginData"], json!({"template": "T", "data": {"x": 1}}));
	}
}
