//! Owned-context request and push API for remote templates.
//!
//! Remote template fetches are attributed to the UI context that asks for
//! them, identified by an opaque [`OwnerId`]. Pushes are delivered per owner.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shellbay_proto::TemplateKey;
use shellbay_worker::EventSink;

use crate::error::RemoteError;

/// Opaque identity of the requesting UI context.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(pub String);

impl OwnerId {
	pub fn new(owner: impl Into<String>) -> Self {
		Self(owner.into())
	}
}

impl fmt::Display for OwnerId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Pull request for one template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRequest {
	pub bundle_name: String,
	pub module_name: String,
	pub ability_name: String,
	pub template: String,
}

impl RemoteRequest {
	pub fn key(&self) -> TemplateKey {
		TemplateKey {
			bundle_name: self.bundle_name.clone(),
			ability_name: self.ability_name.clone(),
			template: self.template.clone(),
		}
	}
}

/// What a remote component answers to a pull.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteReply {
	#[serde(default)]
	pub component_template: Option<String>,
	#[serde(default)]
	pub data: Option<Value>,
	#[serde(default)]
	pub extra_data: Option<Value>,
}

/// Component that sent a push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSource {
	pub bundle_name: String,
	#[serde(default)]
	pub module_name: String,
	pub ability_name: String,
}

/// Unsolicited update from a remote component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemotePush {
	pub source: RemoteSource,
	pub template: String,
	#[serde(default)]
	pub data: Option<Value>,
	#[serde(default)]
	pub extra_data: Option<Value>,
}

/// Owner-scoped request/push service.
#[async_trait]
pub trait OwnedContextApi: Send + Sync {
	/// Pulls data for one template. `Ok(None)` means the remote had nothing.
	async fn request(&self, owner: &OwnerId, request: &RemoteRequest) -> Result<Option<RemoteReply>, RemoteError>;

	/// Delivers pushes addressed to `owner` into `sink`, replacing any earlier
	/// registration of the same owner.
	fn register_push(&self, owner: &OwnerId, sink: EventSink<RemotePush>) -> Result<(), RemoteError>;

	fn unregister_push(&self, owner: &OwnerId);
}

/// In-memory [`OwnedContextApi`] serving canned replies.
#[derive(Default)]
pub struct StaticRemote {
	replies: Mutex<HashMap<TemplateKey, RemoteReply>>,
	listeners: Mutex<HashMap<OwnerId, EventSink<RemotePush>>>,
	requests: Mutex<Vec<(OwnerId, RemoteRequest)>>,
	failing: AtomicBool,
}

impl StaticRemote {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert_reply(&self, key: TemplateKey, reply: RemoteReply) {
		self.replies.lock().insert(key, reply);
	}

	/// Makes every request fail until reset.
	pub fn set_failing(&self, failing: bool) {
		self.failing.store(failing, Ordering::Release);
	}

	/// Pushes to `owner`. Returns `false` if nobody is registered.
	pub fn push(&self, owner: &OwnerId, push: RemotePush) -> bool {
		let sink = self.listeners.lock().get(owner).cloned();
		sink.is_some_and(|sink| sink.emit(push))
	}

	pub fn is_registered(&self, owner: &OwnerId) -> bool {
		self.listeners.lock().contains_key(owner)
	}

	/// Every request served so far, in call order.
	pub fn requests(&self) -> Vec<(OwnerId, RemoteRequest)> {
		self.requests.lock().clone()
	}
}

#[async_trait]
impl OwnedContextApi for StaticRemote {
	async fn request(&self, owner: &OwnerId, request: &RemoteRequest) -> Result<Option<RemoteReply>, RemoteError> {
		self.requests.lock().push((owner.clone(), request.clone()));
		if self.failing.load(Ordering::Acquire) {
			return Err(RemoteError::Request(format!("{} unreachable", request.bundle_name)));
		}
		Ok(self.replies.lock().get(&request.key()).cloned())
	}

	fn register_push(&self, owner: &OwnerId, sink: EventSink<RemotePush>) -> Result<(), RemoteError> {
		self.listeners.lock().insert(owner.clone(), sink);
		Ok(())
	}

	fn unregister_push(&self, owner: &OwnerId) {
		self.listeners.lock().remove(owner);
	}
}
