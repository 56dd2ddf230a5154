//! The UI-side proxy to the isolated Registry Core.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use shellbay_proto::{ComponentUpdate, CoreCommand, CoreEvent, Envelope, ItemComponentData, PluginComponentData, PluginKind, RootConfigInfo, UserId};
use shellbay_source::{CoreHandle, CoreInput, spawn_core};
use shellbay_worker::{ActorPort, EventSink, EventStream, ShutdownReport, TaskClass, spawn};
use tokio_util::sync::CancellationToken;

use crate::context::SourceContext;
use crate::enrich::Enricher;
use crate::error::AdapterError;
use crate::listener::SourceListener;
use crate::patch::PatchExtension;
use crate::remote::{OwnedContextApi, OwnerId};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// The only object the rest of the shell talks to.
///
/// Commands are sent into the isolated core; events coming back are enriched
/// and handed to the registered [`SourceListener`]. Remote template fetches
/// requested by the core are performed here, against the caller's own
/// [`OwnerId`], and their results sent back in.
pub struct Adapter {
	core: CoreHandle,
	shared: Arc<Shared>,
}

struct Shared {
	port: ActorPort<CoreInput>,
	listener: RwLock<Option<Arc<dyn SourceListener>>>,
	enricher: Enricher,
	remote: Arc<dyn OwnedContextApi>,
	owner: OwnerId,
	patch: Mutex<Option<Arc<PatchExtension>>>,
	session: Mutex<Session>,
	tasks: CancellationToken,
}

/// One configured session, from `init_data_source` until `clear_all` or the
/// next init.
///
/// Fetches and pushes run under `token`, cancelled when the session ends. A
/// fetch request is only served once the pump has seen the `initFinish` of
/// the latest init, so requests still queued from an ended session are dropped.
struct Session {
	token: CancellationToken,
	requested: u64,
	confirmed: u64,
	active: bool,
}

impl Adapter {
	/// Starts the isolated core and the event pump.
	pub fn start(context: SourceContext) -> Result<Self, AdapterError> {
		let core = spawn_core(context.directory, context.monitor)?;
		let events = core.take_events().ok_or(AdapterError::ShutDown)?;
		let shared = Arc::new(Shared {
			port: core.port(),
			listener: RwLock::new(None),
			enricher: Enricher::new(context.resolver),
			remote: context.remote,
			owner: context.owner,
			patch: Mutex::new(None),
			session: Mutex::new(Session {
				token: CancellationToken::new(),
				requested: 0,
				confirmed: 0,
				active: false,
			}),
			tasks: CancellationToken::new(),
		});
		spawn(TaskClass::Interactive, run_pump(Arc::clone(&shared), events));
		tracing::debug!(owner = %shared.owner, "adapter.start");
		Ok(Self { core, shared })
	}

	/// Replaces the listener receiving item events.
	pub fn register_listener(&self, listener: Arc<dyn SourceListener>) {
		*self.shared.listener.write() = Some(listener);
	}

	/// Configures the core and starts a new session, ending any previous one.
	/// A configuration with a remote-template loader also sets up the Patch
	/// Extension for this adapter's owner; one without drops its push
	/// subscription.
	pub async fn init_data_source(&self, config: RootConfigInfo) -> Result<(), AdapterError> {
		self.shared.begin_session();
		if config.declares_kind(PluginKind::RemoteTemplate) {
			self.shared.ensure_patch();
		}
		self.shared.send(CoreCommand::InitConfig(config)).await
	}

	pub async fn load_data(&self, user: UserId) -> Result<(), AdapterError> {
		self.shared.send(CoreCommand::LoadData(user)).await
	}

	/// Tears down the session and the push subscription. Fetches still in
	/// flight are cancelled and their replies dropped.
	pub async fn clear_all(&self) -> Result<(), AdapterError> {
		self.shared.end_session();
		self.shared.send(CoreCommand::ClearAll).await
	}

	/// Feeds an externally obtained remote update into the core.
	pub async fn update_plugin_component_data(&self, update: ComponentUpdate) -> Result<(), AdapterError> {
		self.shared.send(CoreCommand::UpdatePluginComponentData(update)).await
	}

	pub fn patch_extension(&self) -> Option<Arc<PatchExtension>> {
		self.shared.patch.lock().clone()
	}

	/// Stops the core and every task this adapter spawned.
	pub async fn shutdown(&self) -> ShutdownReport {
		if let Some(patch) = self.shared.patch.lock().take() {
			patch.clear_all();
		}
		self.shared.tasks.cancel();
		let report = self.core.shutdown_graceful_or_force(SHUTDOWN_TIMEOUT).await;
		tracing::debug!(completed = report.completed(), "adapter.shutdown");
		report
	}
}

impl Drop for Adapter {
	fn drop(&mut self) {
		self.shared.tasks.cancel();
	}
}

impl Shared {
	async fn send(&self, command: CoreCommand) -> Result<(), AdapterError> {
		let envelope = command.into_envelope()?;
		self.port.send(CoreInput::Message(envelope)).await?;
		Ok(())
	}

	fn listener(&self) -> Option<Arc<dyn SourceListener>> {
		self.listener.read().clone()
	}

	fn begin_session(&self) {
		let mut session = self.session.lock();
		session.token.cancel();
		session.token = self.tasks.child_token();
		session.requested += 1;
		session.active = true;
		drop(session);
		self.clear_push();
		tracing::debug!(owner = %self.owner, "adapter.session.begin");
	}

	fn end_session(&self) {
		let mut session = self.session.lock();
		session.token.cancel();
		session.active = false;
		drop(session);
		self.clear_push();
		tracing::debug!(owner = %self.owner, "adapter.session.end");
	}

	fn confirm_session(&self) {
		self.session.lock().confirmed += 1;
	}

	/// Token of the live session, once the pump is past its `initFinish`.
	fn live_session(&self) -> Option<CancellationToken> {
		let session = self.session.lock();
		(session.active && session.confirmed == session.requested).then(|| session.token.clone())
	}

	fn clear_push(&self) {
		if let Some(patch) = self.patch.lock().clone() {
			patch.clear_all();
		}
	}

	fn ensure_patch(self: &Arc<Self>) {
		let patch = Arc::clone(
			self.patch
				.lock()
				.get_or_insert_with(|| Arc::new(PatchExtension::new(self.owner.clone(), Arc::clone(&self.remote)))),
		);
		if patch.is_subscribed() {
			return;
		}
		let (sink, updates) = EventSink::channel();
		match patch.register_push_listener(sink) {
			Ok(()) => {
				let token = self.session.lock().token.clone();
				spawn_under(token, relay_pushes(Arc::clone(self), updates));
			}
			Err(error) => tracing::warn!(owner = %self.owner, %error, "adapter.patch.subscribe_failed"),
		}
	}

	fn spawn_scoped<F>(&self, fut: F)
	where
		F: Future<Output = ()> + Send + 'static,
	{
		spawn_under(self.tasks.child_token(), fut);
	}

	fn dispatch(self: &Arc<Self>, envelope: Envelope) {
		let action = envelope.action;
		let event = match CoreEvent::try_from(envelope) {
			Ok(event) => event,
			Err(error) => {
				tracing::warn!(%action, %error, "adapter.bad_message");
				return;
			}
		};
		match event {
			CoreEvent::InitFinish => {
				self.confirm_session();
				if let Some(listener) = self.listener() {
					listener.on_init_finish();
				}
			}
			CoreEvent::AddItem(item) => self.on_add(item),
			CoreEvent::RemoveItem(item) => self.on_remove(item),
			CoreEvent::LoadPluginComponentData(item) => self.on_fetch(item),
		}
	}

	fn on_add(self: &Arc<Self>, item: ItemComponentData) {
		let generation = self.enricher.begin(&item.id);
		match self.enricher.ready(item) {
			Ok(item) => self.deliver_add(item),
			Err(item) => {
				let shared = Arc::clone(self);
				self.spawn_scoped(async move {
					let id = item.id.clone();
					match shared.enricher.resolve(item).await {
						Ok(item) if shared.enricher.is_current(&id, generation) => shared.deliver_add(item),
						Ok(_) => tracing::debug!(%id, generation, "adapter.enrich.superseded"),
						Err(error) => tracing::warn!(%id, %error, "adapter.enrich.failed"),
					}
				});
			}
		}
	}

	fn deliver_add(&self, item: ItemComponentData) {
		tracing::debug!(id = %item.id, pending = item.is_pending(), "adapter.item.add");
		if let Some(listener) = self.listener() {
			listener.on_item_add(item);
		}
	}

	fn on_remove(&self, mut item: ItemComponentData) {
		self.enricher.begin(&item.id);
		self.enricher.invalidate(&item);
		item.label = item.label.as_deref().map(shellbay_proto::decode_label);
		tracing::debug!(id = %item.id, "adapter.item.remove");
		if let Some(listener) = self.listener() {
			listener.on_item_remove(item);
		}
	}

	/// Pulls remote data for a pending item. A failure leaves it pending.
	fn on_fetch(self: &Arc<Self>, item: ItemComponentData) {
		let Some(session) = self.live_session() else {
			tracing::debug!(id = %item.id, "adapter.fetch.stale");
			return;
		};
		let Some(patch) = self.patch.lock().clone() else {
			tracing::debug!(id = %item.id, "adapter.fetch.no_extension");
			return;
		};
		let shared = Arc::clone(self);
		spawn_under(session, async move {
			match patch.request_plugin_component_data(&item).await {
				Ok(data) => shared.forward_update(data).await,
				Err(error) => tracing::warn!(id = %item.id, %error, "adapter.fetch.failed"),
			}
		});
	}

	async fn forward_update(&self, data: PluginComponentData) {
		if let Err(error) = self.send(CoreCommand::UpdatePluginComponentData(ComponentUpdate::Component(data))).await {
			tracing::warn!(%error, "adapter.update.dropped");
		}
	}
}

fn spawn_under<F>(token: CancellationToken, fut: F)
where
	F: Future<Output = ()> + Send + 'static,
{
	spawn(TaskClass::Interactive, async move {
		tokio::select! {
			biased;
			_ = token.cancelled() => {}
			_ = fut => {}
		}
	});
}

async fn run_pump(shared: Arc<Shared>, mut events: EventStream<Envelope>) {
	loop {
		let envelope = tokio::select! {
			biased;
			_ = shared.tasks.cancelled() => break,
			envelope = events.recv() => envelope,
		};
		let Some(envelope) = envelope else {
			break;
		};
		shared.dispatch(envelope);
	}
	tracing::trace!("adapter.pump.exit");
}

async fn relay_pushes(shared: Arc<Shared>, mut updates: EventStream<PluginComponentData>) {
	while let Some(data) = updates.recv().await {
		shared.forward_update(data).await;
	}
}
