use shellbay_proto::ItemComponentData;
use shellbay_worker::EventSink;

/// Receives registry events from the [`Adapter`](crate::Adapter).
///
/// Callbacks run on the adapter's event pump; implementations should hand
/// work off rather than block.
pub trait SourceListener: Send + Sync {
	/// Configuration was applied by the core.
	fn on_init_finish(&self) {}

	/// An item became available or changed. Labels are already decoded.
	fn on_item_add(&self, item: ItemComponentData);

	/// An item was withdrawn.
	fn on_item_remove(&self, item: ItemComponentData);
}

/// Listener callbacks as values.
#[derive(Debug, Clone, PartialEq)]
pub enum ListenerEvent {
	InitFinish,
	Add(ItemComponentData),
	Remove(ItemComponentData),
}

impl ListenerEvent {
	pub fn item(&self) -> Option<&ItemComponentData> {
		match self {
			Self::InitFinish => None,
			Self::Add(item) | Self::Remove(item) => Some(item),
		}
	}
}

/// Queues every callback for a consumer that prefers a stream.
impl SourceListener for EventSink<ListenerEvent> {
	fn on_init_finish(&self) {
		self.emit(ListenerEvent::InitFinish);
	}

	fn on_item_add(&self, item: ItemComponentData) {
		self.emit(ListenerEvent::Add(item));
	}

	fn on_item_remove(&self, item: ItemComponentData) {
		self.emit(ListenerEvent::Remove(item));
	}
}
