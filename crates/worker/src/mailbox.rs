//! Bounded FIFO mailbox.
//!
//! Messages are delivered in send order and never dropped: a full mailbox
//! parks async senders until the receiver frees a slot.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{Mutex, Notify};

/// The mailbox was closed before the message could be queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MailboxClosed;

struct MailboxState<T> {
	queue: VecDeque<T>,
	closed: bool,
}

struct MailboxInner<T> {
	capacity: usize,
	state: Mutex<MailboxState<T>>,
	notify_recv: Notify,
	notify_send: Notify,
}

/// Multi-producer mailbox sender.
pub struct MailboxSender<T> {
	inner: Arc<MailboxInner<T>>,
}

/// Mailbox receiver.
pub struct MailboxReceiver<T> {
	inner: Arc<MailboxInner<T>>,
}

/// Bounded mailbox primitive used by supervised actors.
pub struct Mailbox<T> {
	inner: Arc<MailboxInner<T>>,
}

impl<T> Clone for MailboxSender<T> {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl<T> Mailbox<T> {
	/// Creates a bounded mailbox.
	///
	/// # Panics
	///
	/// Panics if `capacity` is zero.
	pub fn new(capacity: usize) -> Self {
		assert!(capacity > 0, "mailbox capacity must be > 0");
		Self {
			inner: Arc::new(MailboxInner {
				capacity,
				state: Mutex::new(MailboxState {
					queue: VecDeque::with_capacity(capacity),
					closed: false,
				}),
				notify_recv: Notify::new(),
				notify_send: Notify::new(),
			}),
		}
	}

	pub fn sender(&self) -> MailboxSender<T> {
		MailboxSender {
			inner: Arc::clone(&self.inner),
		}
	}

	pub fn receiver(&self) -> MailboxReceiver<T> {
		MailboxReceiver {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl<T> MailboxSender<T> {
	/// Closes the mailbox. Receivers drain queued items then return `None`.
	pub async fn close(&self) {
		let mut state = self.inner.state.lock().await;
		state.closed = true;
		drop(state);
		self.inner.notify_recv.notify_waiters();
		self.inner.notify_send.notify_waiters();
	}

	/// Attempts to close the mailbox without waiting for the lock.
	pub fn close_now(&self) {
		if let Ok(mut state) = self.inner.state.try_lock() {
			state.closed = true;
			drop(state);
			self.inner.notify_recv.notify_waiters();
			self.inner.notify_send.notify_waiters();
		}
	}

	/// Enqueues, waiting for capacity when the mailbox is full.
	pub async fn send(&self, msg: T) -> Result<(), MailboxClosed> {
		loop {
			// Register before checking capacity so a pop between unlock and
			// await still wakes us.
			let notified = self.inner.notify_send.notified();

			let mut state = self.inner.state.lock().await;
			if state.closed {
				return Err(MailboxClosed);
			}
			if state.queue.len() < self.inner.capacity {
				state.queue.push_back(msg);
				self.inner.notify_recv.notify_one();
				return Ok(());
			}
			drop(state);
			notified.await;
		}
	}
}

impl<T> MailboxReceiver<T> {
	/// Receives one message. Returns `None` once the mailbox is closed and drained.
	pub async fn recv(&self) -> Option<T> {
		loop {
			let notified = self.inner.notify_recv.notified();
			let mut state = self.inner.state.lock().await;
			if let Some(msg) = state.queue.pop_front() {
				drop(state);
				self.inner.notify_send.notify_one();
				return Some(msg);
			}
			if state.closed {
				return None;
			}
			drop(state);
			notified.await;
		}
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use super::*;

	#[tokio::test]
	async fn close_drains_queued_messages_first() {
		let mailbox = Mailbox::new(2);
		let tx = mailbox.sender();
		let rx = mailbox.receiver();

		tx.send("init").await.unwrap();
		tx.send("load").await.unwrap();
		tx.close().await;
		assert_eq!(tx.send("clear").await, Err(MailboxClosed));

		assert_eq!(rx.recv().await, Some("init"));
		assert_eq!(rx.recv().await, Some("load"));
		assert_eq!(rx.recv().await, None);
	}

	#[tokio::test]
	async fn send_parks_until_capacity_frees() {
		let mailbox = Mailbox::new(1);
		let tx = mailbox.sender();
		let rx = mailbox.receiver();

		tx.send(1u32).await.unwrap();
		let tx2 = tx.clone();
		let pending = tokio::spawn(async move { tx2.send(2).await });

		tokio::time::sleep(Duration::from_millis(10)).await;
		assert!(!pending.is_finished());
		assert_eq!(rx.recv().await, Some(1));

		let result = tokio::time::timeout(Duration::from_millis(200), pending)
			.await
			.expect("send should unblock after recv")
			.unwrap();
		assert_eq!(result, Ok(()));
		assert_eq!(rx.recv().await, Some(2));
	}

	#[tokio::test]
	async fn delivery_is_fifo_across_senders() {
		let mailbox = Mailbox::new(64);
		let a = mailbox.sender();
		let b = mailbox.sender();
		let rx = mailbox.receiver();

		for i in 0..10u32 {
			if i % 2 == 0 {
				a.send(i).await.unwrap();
			} else {
				b.send(i).await.unwrap();
			}
		}
		a.close().await;

		let mut seen = Vec::new();
		while let Some(v) = rx.recv().await {
			seen.push(v);
		}
		assert_eq!(seen, (0..10).collect::<Vec<_>>());
	}

	#[tokio::test]
	async fn send_after_close_fails() {
		let mailbox = Mailbox::<u8>::new(4);
		let tx = mailbox.sender();
		tx.close_now();
		assert_eq!(tx.send(1).await, Err(MailboxClosed));
	}
}
