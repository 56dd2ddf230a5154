//! Patch Extension: remote template pull and push on behalf of one owner.

use std::sync::Arc;

use parking_lot::Mutex;
use shellbay_proto::{ItemComponentData, PluginComponentData};
use shellbay_worker::{EventSink, EventStream, TaskClass, spawn};
use tokio_util::sync::CancellationToken;

use crate::error::PatchError;
use crate::remote::{OwnedContextApi, OwnerId, RemotePush, RemoteRequest};

/// Performs remote template fetches and relays pushes for one owner.
///
/// Pulls and pushes travel on independent channels; nothing orders a push
/// relative to an outstanding pull for the same item.
pub struct PatchExtension {
	owner: OwnerId,
	api: Arc<dyn OwnedContextApi>,
	push: Mutex<Option<CancellationToken>>,
}

impl PatchExtension {
	pub fn new(owner: OwnerId, api: Arc<dyn OwnedContextApi>) -> Self {
		Self {
			owner,
			api,
			push: Mutex::new(None),
		}
	}

	pub fn owner(&self) -> &OwnerId {
		&self.owner
	}

	/// Pulls the template data `item` refers to.
	pub async fn request_plugin_component_data(&self, item: &ItemComponentData) -> Result<PluginComponentData, PatchError> {
		let template = item.template.clone().ok_or_else(|| PatchError::NoTemplate(item.id.clone()))?;
		let request = RemoteRequest {
			bundle_name: item.bundle_name.clone(),
			module_name: item.module_name.clone(),
			ability_name: item.ability_name.clone(),
			template,
		};
		tracing::debug!(owner = %self.owner, id = %item.id, template = %request.template, "adapter.patch.request");
		let reply = self.api.request(&self.owner, &request).await?.ok_or_else(|| PatchError::NoResult {
			bundle: request.bundle_name.clone(),
			ability: request.ability_name.clone(),
			template: request.template.clone(),
		})?;
		Ok(PluginComponentData {
			bundle_name: request.bundle_name,
			module_name: request.module_name,
			ability_name: request.ability_name,
			template: request.template,
			component_template: reply.component_template,
			data: reply.data,
			extra_data: reply.extra_data,
		})
	}

	/// Subscribes to pushes for this owner, mapping each into the pull result
	/// shape. A second call while subscribed is a no-op.
	pub fn register_push_listener(&self, sink: EventSink<PluginComponentData>) -> Result<(), PatchError> {
		let mut push = self.push.lock();
		if push.is_some() {
			tracing::trace!(owner = %self.owner, "adapter.patch.already_subscribed");
			return Ok(());
		}
		let (push_sink, pushes) = EventSink::channel();
		self.api.register_push(&self.owner, push_sink)?;
		let token = CancellationToken::new();
		spawn(TaskClass::Interactive, forward_pushes(pushes, sink, token.clone()));
		*push = Some(token);
		tracing::debug!(owner = %self.owner, "adapter.patch.subscribed");
		Ok(())
	}

	pub fn is_subscribed(&self) -> bool {
		self.push.lock().is_some()
	}

	/// Drops the push subscription.
	pub fn clear_all(&self) {
		if let Some(token) = self.push.lock().take() {
			self.api.unregister_push(&self.owner);
			token.cancel();
			tracing::debug!(owner = %self.owner, "adapter.patch.unsubscribed");
		}
	}
}

impl Drop for PatchExtension {
	fn drop(&mut self) {
		self.clear_all();
	}
}

fn push_to_component(push: RemotePush) -> PluginComponentData {
	PluginComponentData {
		bundle_name: push.source.bundle_name,
		module_name: push.source.module_name,
		ability_name: push.source.ability_name,
		template: push.template,
		component_template: None,
		data: push.data,
		extra_data: push.extra_data,
	}
}

async fn forward_pushes(mut pushes: EventStream<RemotePush>, sink: EventSink<PluginComponentData>, token: CancellationToken) {
	loop {
		let push = tokio::select! {
			biased;
			_ = token.cancelled() => break,
			push = pushes.recv() => push,
		};
		let Some(push) = push else {
			break;
		};
		tracing::debug!(bundle = %push.source.bundle_name, template = %push.template, "adapter.patch.push");
		if !sink.emit(push_to_component(push)) {
			break;
		}
	}
}
