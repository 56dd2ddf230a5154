//! Actor event outbox.
//!
//! Unlike a broadcast channel, the outbox has exactly one consumer and never
//! lags: every emitted event is observed in emission order.

use tokio::sync::mpsc;

/// Cloneable emitter for actor events.
#[derive(Debug)]
pub struct EventSink<Evt> {
	tx: mpsc::UnboundedSender<Evt>,
}

impl<Evt> Clone for EventSink<Evt> {
	fn clone(&self) -> Self {
		Self { tx: self.tx.clone() }
	}
}

/// Single consumer side of an outbox.
#[derive(Debug)]
pub struct EventStream<Evt> {
	rx: mpsc::UnboundedReceiver<Evt>,
}

impl<Evt> EventSink<Evt> {
	/// Creates a detached outbox pair.
	pub fn channel() -> (EventSink<Evt>, EventStream<Evt>) {
		let (tx, rx) = mpsc::unbounded_channel();
		(EventSink { tx }, EventStream { rx })
	}

	/// Emits one event. Returns `false` once the consumer is gone.
	pub fn emit(&self, evt: Evt) -> bool {
		self.tx.send(evt).is_ok()
	}

	pub fn is_closed(&self) -> bool {
		self.tx.is_closed()
	}
}

impl<Evt> EventStream<Evt> {
	/// Waits for the next event. `None` once every sink has been dropped.
	pub async fn recv(&mut self) -> Option<Evt> {
		self.rx.recv().await
	}

	/// Returns one queued event without waiting.
	pub fn try_recv(&mut self) -> Option<Evt> {
		self.rx.try_recv().ok()
	}

	/// Drains every queued event without waiting.
	pub fn drain(&mut self) -> Vec<Evt> {
		let mut out = Vec::new();
		while let Some(evt) = self.try_recv() {
			out.push(evt);
		}
		out
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn events_arrive_in_emit_order() {
		let (sink, mut stream) = EventSink::channel();
		let other = sink.clone();
		assert!(sink.emit("add"));
		assert!(other.emit("remove"));
		assert_eq!(stream.recv().await, Some("add"));
		assert_eq!(stream.drain(), vec!["remove"]);
		assert_eq!(stream.try_recv(), None);
	}

	#[test]
	fn emit_reports_dropped_consumer() {
		let (sink, stream) = EventSink::<u8>::channel();
		drop(stream);
		assert!(sink.is_closed());
		assert!(!sink.emit(1));
	}
}
