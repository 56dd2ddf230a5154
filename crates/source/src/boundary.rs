//! Isolated executor boundary around the Registry Core.
//!
//! [`CoreActor`] runs a [`SourceManager`] on a dedicated thread with its own
//! single-threaded runtime. Boundary envelopes and bundle notifications both
//! enter through its mailbox, so the manager only ever sees one input at a
//! time; everything it publishes leaves through the actor's outbox.

use std::sync::Arc;

use async_trait::async_trait;
use shellbay_proto::{CoreCommand, Envelope};
use shellbay_worker::{
	ActorContext, ActorFlow, ActorHandle, ActorPort, ActorSpec, EventSink, EventStream, MailboxSpec, TaskClass, WorkerActor, spawn,
	spawn_isolated_actor,
};
use tokio_util::sync::CancellationToken;

use crate::directory::{BundleEvent, BundleMonitor, ComponentDirectory};
use crate::loader::LoaderChannel;
use crate::manager::SourceManager;

/// Thread name of the isolated core.
pub const CORE_ACTOR_NAME: &str = "shellbay-core";

/// Mailbox input of the core actor.
#[derive(Debug, Clone)]
pub enum CoreInput {
	/// Boundary message from the adapter.
	Message(Envelope),
	/// Package lifecycle notification relayed from the bundle monitor.
	Bundle(BundleEvent),
}

/// Handle the adapter holds on the isolated core.
pub type CoreHandle = ActorHandle<CoreInput, Envelope>;

/// Actor hosting the Registry Core.
pub struct CoreActor {
	directory: Arc<dyn ComponentDirectory>,
	monitor: Arc<dyn BundleMonitor>,
	manager: Option<SourceManager>,
	relay: Option<CancellationToken>,
}

impl CoreActor {
	pub fn new(directory: Arc<dyn ComponentDirectory>, monitor: Arc<dyn BundleMonitor>) -> Self {
		Self {
			directory,
			monitor,
			manager: None,
			relay: None,
		}
	}
}

#[async_trait]
impl WorkerActor for CoreActor {
	type Cmd = CoreInput;
	type Evt = Envelope;

	async fn on_start(&mut self, ctx: &mut ActorContext<Self::Cmd, Self::Evt>) -> Result<(), String> {
		let (bundle_sink, bundles) = EventSink::channel();
		let token = ctx.child_token();
		spawn(TaskClass::Background, relay_bundle_events(bundles, ctx.port(), token.clone()));
		self.relay = Some(token);
		self.manager = Some(SourceManager::new(
			Arc::clone(&self.directory),
			Arc::clone(&self.monitor),
			LoaderChannel::new(ctx.sink()),
			bundle_sink,
		));
		tracing::debug!(actor = CORE_ACTOR_NAME, "source.core.start");
		Ok(())
	}

	async fn on_stop(&mut self, _ctx: &mut ActorContext<Self::Cmd, Self::Evt>) {
		if let Some(manager) = self.manager.as_mut() {
			manager.detach();
		}
		if let Some(token) = self.relay.take() {
			token.cancel();
		}
		tracing::debug!("source.core.stop");
	}

	async fn handle(&mut self, input: Self::Cmd, _ctx: &mut ActorContext<Self::Cmd, Self::Evt>) -> Result<ActorFlow, String> {
		let Some(manager) = self.manager.as_mut() else {
			return Err("core handled input before start".to_string());
		};
		match input {
			CoreInput::Message(envelope) => {
				let action = envelope.action;
				match CoreCommand::try_from(envelope) {
					Ok(command) => {
						tracing::trace!(%action, "source.core.command");
						manager.apply(command).await;
					}
					Err(error) => tracing::warn!(%action, %error, "source.core.bad_message"),
				}
			}
			CoreInput::Bundle(event) => manager.on_bundle_notify(event).await,
		}
		Ok(ActorFlow::Continue)
	}
}

/// Feeds bundle notifications into the core's mailbox so they are ordered with
/// boundary messages.
async fn relay_bundle_events(mut bundles: EventStream<BundleEvent>, port: ActorPort<CoreInput>, token: CancellationToken) {
	loop {
		let event = tokio::select! {
			biased;
			_ = token.cancelled() => break,
			event = bundles.recv() => event,
		};
		let Some(event) = event else {
			break;
		};
		if port.send(CoreInput::Bundle(event)).await.is_err() {
			break;
		}
	}
	tracing::trace!("source.core.relay_exit");
}

/// Spawns the Registry Core on its own thread.
///
/// The core is not restarted: a failure leaves the boundary closed and every
/// later send fails, which callers log.
pub fn spawn_core(directory: Arc<dyn ComponentDirectory>, monitor: Arc<dyn BundleMonitor>) -> std::io::Result<CoreHandle> {
	let spec = ActorSpec::new(CORE_ACTOR_NAME, CoreActor::new(directory, monitor)).mailbox(MailboxSpec::with_capacity(256));
	spawn_isolated_actor(spec)
}
