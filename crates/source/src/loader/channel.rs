use shellbay_proto::{CoreEvent, Envelope, ItemComponentData};
use shellbay_worker::EventSink;

/// Shared funnel every loader publishes through.
///
/// Events are wrapped into boundary envelopes and pushed onto the core's
/// outbox in call order.
#[derive(Clone)]
pub struct LoaderChannel {
	sink: EventSink<Envelope>,
}

impl LoaderChannel {
	pub fn new(sink: EventSink<Envelope>) -> Self {
		Self { sink }
	}

	pub fn add(&self, item: &ItemComponentData) {
		tracing::debug!(id = %item.id, bundle = %item.bundle_name, kind = %item.plugin_type, "source.loader.add");
		self.publish(CoreEvent::AddItem(item.clone()));
	}

	pub fn remove(&self, item: &ItemComponentData) {
		tracing::debug!(id = %item.id, bundle = %item.bundle_name, kind = %item.plugin_type, "source.loader.remove");
		self.publish(CoreEvent::RemoveItem(item.clone()));
	}

	/// Asks the adapter to pull remote data for `item`.
	pub fn on_load_plugin_component_data(&self, item: &ItemComponentData) {
		tracing::debug!(id = %item.id, template = ?item.template, "source.loader.fetch_request");
		self.publish(CoreEvent::LoadPluginComponentData(item.clone()));
	}

	pub(crate) fn init_finish(&self) {
		self.publish(CoreEvent::InitFinish);
	}

	fn publish(&self, event: CoreEvent) {
		let action = event.action();
		match event.into_envelope() {
			Ok(envelope) => {
				if !self.sink.emit(envelope) {
					tracing::trace!(%action, "source.channel.no_consumer");
				}
			}
			Err(error) => tracing::warn!(%action, %error, "source.channel.encode_failed"),
		}
	}
}
