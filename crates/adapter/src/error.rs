//! Error types for the UI-side adapter.

use shellbay_proto::ProtocolError;
use shellbay_worker::ActorSendError;
use thiserror::Error;

/// Errors resolving label or icon resources.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
	/// No resource with this handle exists in the package.
	#[error("resource {id} not found in {bundle}")]
	NotFound {
		/// Package searched.
		bundle: String,
		/// Resource handle.
		id: u32,
	},
	/// The resource service failed.
	#[error("resource service failed: {0}")]
	Service(String),
}

/// Errors from the owned-context request/push API.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
	/// The remote component rejected or failed the request.
	#[error("remote request failed: {0}")]
	Request(String),
	/// The owner is not allowed to subscribe.
	#[error("push subscription refused for {0}")]
	Subscribe(String),
}

/// Errors from [`PatchExtension`](crate::PatchExtension).
#[derive(Debug, Error)]
pub enum PatchError {
	/// The item carries no template to request.
	#[error("item {0} has no template")]
	NoTemplate(String),
	/// The remote answered with nothing.
	#[error("no result for {bundle}/{ability} template {template}")]
	NoResult {
		/// Owning package.
		bundle: String,
		/// Serving ability.
		ability: String,
		/// Requested template.
		template: String,
	},
	/// The request itself failed.
	#[error(transparent)]
	Remote(#[from] RemoteError),
}

/// Errors surfaced by [`Adapter`](crate::Adapter) operations.
#[derive(Debug, Error)]
pub enum AdapterError {
	/// The isolated core thread could not be started.
	#[error("failed to start registry core: {0}")]
	Spawn(#[from] std::io::Error),
	/// The core has stopped and no longer accepts messages.
	#[error("registry core unavailable: {0}")]
	Closed(#[from] ActorSendError),
	/// A message could not be encoded.
	#[error(transparent)]
	Protocol(#[from] ProtocolError),
	/// The adapter was already shut down.
	#[error("adapter is shut down")]
	ShutDown,
}
