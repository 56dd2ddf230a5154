//! Isolated executor primitives for shellbay.
//!
//! Work that must not share memory with its caller runs as a [`WorkerActor`].
//! The actor owns its state, receives commands through a bounded FIFO mailbox,
//! and publishes events through an [`EventSink`]. Callers only ever hold an
//! [`ActorHandle`]; nothing else crosses the boundary.
//!
//! [`spawn_isolated_actor`] runs the actor on a dedicated OS thread driving its
//! own single-threaded runtime.

mod class;
mod mailbox;
mod outbox;
mod spawn;
mod supervisor;

pub use class::TaskClass;
pub use outbox::{EventSink, EventStream};
pub use spawn::{join_error_panic_message, spawn, spawn_named_thread};
pub use supervisor::{
	ActorContext, ActorExit, ActorExitKind, ActorFlow, ActorHandle, ActorPort, ActorSendError, ActorSpec, MailboxSpec, ShutdownMode,
	ShutdownReport, WorkerActor, spawn_isolated_actor,
};
