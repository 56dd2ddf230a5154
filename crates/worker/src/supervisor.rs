use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::mailbox::{Mailbox, MailboxClosed, MailboxReceiver, MailboxSender};
use crate::outbox::{EventSink, EventStream};
use crate::{TaskClass, join_error_panic_message, spawn, spawn_named_thread};

/// Continuation directive from one command handling step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorFlow {
	/// Continue processing commands.
	Continue,
	/// Stop the actor.
	Stop,
}

/// Why an actor stopped running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ActorExitKind {
	/// A handler returned [`ActorFlow::Stop`].
	Stopped,
	/// Every command was drained after the mailbox closed.
	MailboxClosed,
	Cancelled,
	StartupFailed,
	HandlerFailed,
	Panicked,
}

/// Exit summary of one actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorExit {
	kind: ActorExitKind,
	message: Option<String>,
}

impl ActorExit {
	fn new(kind: ActorExitKind) -> Self {
		Self { kind, message: None }
	}

	fn failed(kind: ActorExitKind, message: impl Into<String>) -> Self {
		Self {
			kind,
			message: Some(message.into()),
		}
	}

	pub fn kind(&self) -> ActorExitKind {
		self.kind
	}

	pub fn message(&self) -> Option<&str> {
		self.message.as_deref()
	}

	pub fn is_failure(&self) -> bool {
		matches!(
			self.kind,
			ActorExitKind::StartupFailed | ActorExitKind::HandlerFailed | ActorExitKind::Panicked
		)
	}
}

/// Mailbox sizing for an actor.
#[derive(Debug, Clone)]
pub struct MailboxSpec {
	pub(crate) capacity: usize,
}

impl MailboxSpec {
	/// # Panics
	///
	/// Panics if `capacity` is zero.
	#[must_use]
	pub fn with_capacity(capacity: usize) -> Self {
		assert!(capacity > 0, "mailbox capacity must be > 0");
		Self { capacity }
	}
}

impl Default for MailboxSpec {
	fn default() -> Self {
		Self { capacity: 128 }
	}
}

/// How [`ActorHandle::shutdown`] stops the actor.
#[derive(Debug, Clone, Copy)]
pub enum ShutdownMode {
	/// Cancel in-flight work and queued commands.
	Immediate,
	/// Let queued commands drain, up to `timeout`.
	Graceful { timeout: Duration },
}

/// Outcome of a shutdown request.
#[derive(Debug, Clone)]
pub struct ShutdownReport {
	completed: bool,
	timed_out: bool,
	last_exit: Option<ActorExit>,
}

impl ShutdownReport {
	pub fn completed(&self) -> bool {
		self.completed
	}

	pub fn timed_out(&self) -> bool {
		self.timed_out
	}

	pub fn last_exit(&self) -> Option<&ActorExit> {
		self.last_exit.as_ref()
	}
}

/// State machine driven by its mailbox on an isolated thread.
#[async_trait]
pub trait WorkerActor: Send + 'static {
	type Cmd: Send + 'static;
	type Evt: Send + 'static;

	async fn on_start(&mut self, _ctx: &mut ActorContext<Self::Cmd, Self::Evt>) -> Result<(), String> {
		Ok(())
	}

	/// Runs once after the command loop ends, unless startup failed.
	async fn on_stop(&mut self, _ctx: &mut ActorContext<Self::Cmd, Self::Evt>) {}

	async fn handle(&mut self, cmd: Self::Cmd, ctx: &mut ActorContext<Self::Cmd, Self::Evt>) -> Result<ActorFlow, String>;
}

/// Error returned when sending a command to a stopped actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorSendError {
	/// The actor's mailbox is closed.
	Closed,
}

impl From<MailboxClosed> for ActorSendError {
	fn from(_: MailboxClosed) -> Self {
		ActorSendError::Closed
	}
}

impl std::fmt::Display for ActorSendError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			ActorSendError::Closed => write!(f, "actor mailbox closed"),
		}
	}
}

impl std::error::Error for ActorSendError {}

/// Cloneable command port into one actor's mailbox.
///
/// Handed to tasks the actor spawns so their results re-enter the actor in
/// mailbox order instead of touching actor state directly.
pub struct ActorPort<Cmd> {
	tx: MailboxSender<Cmd>,
}

impl<Cmd> Clone for ActorPort<Cmd> {
	fn clone(&self) -> Self {
		Self { tx: self.tx.clone() }
	}
}

impl<Cmd> ActorPort<Cmd> {
	/// Enqueues one command, waiting for capacity.
	pub async fn send(&self, cmd: Cmd) -> Result<(), ActorSendError> {
		self.tx.send(cmd).await?;
		Ok(())
	}
}

/// What a running actor can reach: its outbox, its own mailbox and its
/// cancellation scope.
pub struct ActorContext<Cmd, Evt> {
	outbox: EventSink<Evt>,
	port: ActorPort<Cmd>,
	cancel: CancellationToken,
}

impl<Cmd, Evt> ActorContext<Cmd, Evt>
where
	Cmd: Send + 'static,
	Evt: Send + 'static,
{
	/// Emits one event to the handle's consumer.
	pub fn emit(&self, evt: Evt) {
		if !self.outbox.emit(evt) {
			tracing::trace!("worker.actor.emit_without_consumer");
		}
	}

	/// Cloneable outbox for collaborators that publish on the actor's behalf.
	pub fn sink(&self) -> EventSink<Evt> {
		self.outbox.clone()
	}

	/// Cloneable port back into this actor's mailbox.
	pub fn port(&self) -> ActorPort<Cmd> {
		self.port.clone()
	}

	/// Token cancelled when the actor exits, for tasks it spawns.
	pub fn child_token(&self) -> CancellationToken {
		self.cancel.child_token()
	}
}

/// Builder for one isolated actor.
pub struct ActorSpec<A> {
	name: String,
	mailbox: MailboxSpec,
	actor: A,
}

impl<A> ActorSpec<A>
where
	A: WorkerActor,
{
	/// `name` doubles as the thread name.
	pub fn new(name: impl Into<String>, actor: A) -> Self {
		Self {
			name: name.into(),
			mailbox: MailboxSpec::default(),
			actor,
		}
	}

	#[must_use]
	pub fn mailbox(mut self, mailbox: MailboxSpec) -> Self {
		self.mailbox = mailbox;
		self
	}
}

/// Publishes the actor's exit. Dropping it unreported (the isolated thread
/// unwound) still releases every shutdown waiter.
struct ExitGuard {
	tx: watch::Sender<Option<ActorExit>>,
}

impl ExitGuard {
	fn finish(self, exit: ActorExit) {
		self.tx.send_replace(Some(exit));
	}
}

impl Drop for ExitGuard {
	fn drop(&mut self) {
		self.tx.send_if_modified(|exit| {
			if exit.is_some() {
				return false;
			}
			*exit = Some(ActorExit::failed(ActorExitKind::Panicked, "isolated thread exited without a report"));
			true
		});
	}
}

/// Handle the caller holds on an isolated actor.
///
/// Dropping the handle cancels the actor.
pub struct ActorHandle<Cmd, Evt>
where
	Cmd: Send + 'static,
	Evt: Send + 'static,
{
	name: String,
	tx: MailboxSender<Cmd>,
	events: std::sync::Mutex<Option<EventStream<Evt>>>,
	cancel: CancellationToken,
	exit: watch::Receiver<Option<ActorExit>>,
}

impl<Cmd, Evt> Drop for ActorHandle<Cmd, Evt>
where
	Cmd: Send + 'static,
	Evt: Send + 'static,
{
	fn drop(&mut self) {
		self.cancel.cancel();
		self.tx.close_now();
	}
}

impl<Cmd, Evt> ActorHandle<Cmd, Evt>
where
	Cmd: Send + 'static,
	Evt: Send + 'static,
{
	/// Takes the event stream. Only the first caller receives it.
	pub fn take_events(&self) -> Option<EventStream<Evt>> {
		self.events.lock().ok().and_then(|mut guard| guard.take())
	}

	/// Sends one command, waiting for mailbox capacity.
	pub async fn send(&self, cmd: Cmd) -> Result<(), ActorSendError> {
		self.tx.send(cmd).await?;
		Ok(())
	}

	/// Cloneable port into this actor's mailbox.
	pub fn port(&self) -> ActorPort<Cmd> {
		ActorPort { tx: self.tx.clone() }
	}

	async fn wait_exit(&self) -> Option<ActorExit> {
		let mut exit = self.exit.clone();
		if exit.wait_for(Option::is_some).await.is_err() {
			tracing::trace!(actor = %self.name, "worker.actor.exit_unreported");
		}
		exit.borrow().clone()
	}

	pub async fn shutdown(&self, mode: ShutdownMode) -> ShutdownReport {
		match mode {
			ShutdownMode::Immediate => {
				self.cancel.cancel();
				self.tx.close().await;
				let last_exit = self.wait_exit().await;
				ShutdownReport {
					completed: true,
					timed_out: false,
					last_exit,
				}
			}
			ShutdownMode::Graceful { timeout } => {
				self.tx.close().await;
				match tokio::time::timeout(timeout, self.wait_exit()).await {
					Ok(last_exit) => ShutdownReport {
						completed: true,
						timed_out: false,
						last_exit,
					},
					Err(_) => ShutdownReport {
						completed: false,
						timed_out: true,
						last_exit: None,
					},
				}
			}
		}
	}

	/// Tries graceful shutdown first, forces immediate on timeout.
	pub async fn shutdown_graceful_or_force(&self, timeout: Duration) -> ShutdownReport {
		let report = self.shutdown(ShutdownMode::Graceful { timeout }).await;
		if report.timed_out() {
			tracing::warn!(actor = %self.name, "worker.actor.shutdown_forced");
			return self.shutdown(ShutdownMode::Immediate).await;
		}
		report
	}
}

/// Spawns `spec`'s actor on a dedicated OS thread named after it, driving its
/// own single-threaded runtime.
///
/// The actor shares no executor with the caller; commands and events cross
/// only through the mailbox and outbox. A failed actor is not restarted: its
/// mailbox closes and later sends fail.
pub fn spawn_isolated_actor<A>(spec: ActorSpec<A>) -> std::io::Result<ActorHandle<A::Cmd, A::Evt>>
where
	A: WorkerActor,
{
	let mailbox = Mailbox::new(spec.mailbox.capacity);
	let (outbox, events) = EventSink::channel();
	let cancel = CancellationToken::new();
	let (exit_tx, exit) = watch::channel(None);
	let guard = ExitGuard { tx: exit_tx };

	let name = spec.name.clone();
	let actor = spec.actor;
	let rx = mailbox.receiver();
	let tx = mailbox.sender();
	let scope = cancel.clone();
	spawn_named_thread(TaskClass::Isolated, spec.name.clone(), move || {
		let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
			Ok(runtime) => runtime,
			Err(err) => {
				tracing::error!(actor = %name, error = %err, "worker.isolated.runtime_failed");
				tx.close_now();
				guard.finish(ActorExit::failed(ActorExitKind::StartupFailed, err.to_string()));
				return;
			}
		};
		let exit = runtime.block_on(supervise(actor, rx, tx, outbox, scope));
		tracing::debug!(actor = %name, kind = ?exit.kind(), message = ?exit.message(), "worker.actor.exit");
		guard.finish(exit);
	})?;

	Ok(ActorHandle {
		name: spec.name,
		tx: mailbox.sender(),
		events: std::sync::Mutex::new(Some(events)),
		cancel,
		exit,
	})
}

/// Runs the actor as a task so a panic is caught and reported, then closes
/// the mailbox and cancels everything the actor spawned.
async fn supervise<A>(
	actor: A,
	rx: MailboxReceiver<A::Cmd>,
	tx: MailboxSender<A::Cmd>,
	outbox: EventSink<A::Evt>,
	cancel: CancellationToken,
) -> ActorExit
where
	A: WorkerActor,
{
	let ctx = ActorContext {
		outbox,
		port: ActorPort { tx: tx.clone() },
		cancel: cancel.child_token(),
	};
	let exit = match spawn(TaskClass::Isolated, run_actor(actor, rx, ctx)).await {
		Ok(exit) => exit,
		Err(err) if err.is_cancelled() => ActorExit::new(ActorExitKind::Cancelled),
		Err(err) => ActorExit::failed(ActorExitKind::Panicked, join_error_panic_message(err).unwrap_or_default()),
	};
	cancel.cancel();
	tx.close().await;
	exit
}

async fn run_actor<A>(mut actor: A, rx: MailboxReceiver<A::Cmd>, mut ctx: ActorContext<A::Cmd, A::Evt>) -> ActorExit
where
	A: WorkerActor,
{
	let cancel = ctx.cancel.clone();

	let started = tokio::select! {
		biased;
		_ = cancel.cancelled() => return ActorExit::new(ActorExitKind::Cancelled),
		res = actor.on_start(&mut ctx) => res,
	};
	if let Err(err) = started {
		return ActorExit::failed(ActorExitKind::StartupFailed, err);
	}

	let exit = loop {
		let cmd = tokio::select! {
			biased;
			_ = cancel.cancelled() => break ActorExit::new(ActorExitKind::Cancelled),
			msg = rx.recv() => match msg {
				Some(cmd) => cmd,
				None => break ActorExit::new(ActorExitKind::MailboxClosed),
			},
		};

		let flow = tokio::select! {
			biased;
			_ = cancel.cancelled() => break ActorExit::new(ActorExitKind::Cancelled),
			res = actor.handle(cmd, &mut ctx) => res,
		};

		match flow {
			Ok(ActorFlow::Continue) => {}
			Ok(ActorFlow::Stop) => break ActorExit::new(ActorExitKind::Stopped),
			Err(err) => break ActorExit::failed(ActorExitKind::HandlerFailed, err),
		}
	};

	actor.on_stop(&mut ctx).await;
	exit
}
