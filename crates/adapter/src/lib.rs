//! UI-side proxy for the shellbay registry.
//!
//! [`Adapter`] owns the isolated Registry Core and is the only object the rest
//! of the shell talks to. Items coming out of the core are enriched with
//! labels and icons through a [`ResourceResolver`] before they reach the
//! [`SourceListener`]; remote-template items are fetched and kept current by
//! the [`PatchExtension`] through an [`OwnedContextApi`].

mod adapter;
mod context;
mod enrich;
pub mod error;
mod listener;
mod patch;
pub mod remote;
pub mod resolver;

pub use adapter::Adapter;
pub use context::SourceContext;
pub use error::{AdapterError, PatchError, RemoteError, ResolveError};
pub use listener::{ListenerEvent, SourceListener};
pub use patch::PatchExtension;
pub use remote::{OwnedContextApi, OwnerId, RemotePush, RemoteReply, RemoteRequest, RemoteSource, StaticRemote};
pub use resolver::{ResourceResolver, StaticResolver, icon_data_url};
