//! Message envelope and action vocabulary of the executor boundary.
//!
//! Every message is an [`Envelope`] of `{ action, data }`, where `data` is plain
//! JSON. [`CoreCommand`] and [`CoreEvent`] are the typed views of the two
//! directions; conversion in either direction validates the action first.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;
use crate::types::{ComponentUpdate, ItemComponentData, RootConfigInfo, UserId};

/// Direction an action travels across the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
	/// Adapter to Registry Core.
	ToCore,
	/// Registry Core to adapter.
	FromCore,
}

impl Direction {
	/// Human-readable direction label.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::ToCore => "adapter->core",
			Self::FromCore => "core->adapter",
		}
	}
}

/// Fixed action vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
	/// Configure loaders and subscribe to bundle changes.
	InitConfig,
	/// Trigger a (re)load for a user.
	LoadData,
	/// Tear down the session.
	ClearAll,
	/// Configuration applied.
	InitFinish,
	/// Item available.
	AddItem,
	/// Item withdrawn.
	RemoveItem,
	/// Item needs a pull fetch.
	LoadPluginComponentData,
	/// Fetch or push result to merge.
	UpdatePluginComponentData,
}

impl Action {
	/// Wire name of the action.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::InitConfig => "initConfig",
			Self::LoadData => "loadData",
			Self::ClearAll => "clearAll",
			Self::InitFinish => "initFinish",
			Self::AddItem => "addItem",
			Self::RemoveItem => "removeItem",
			Self::LoadPluginComponentData => "loadPluginComponentData",
			Self::UpdatePluginComponentData => "updatePluginComponentData",
		}
	}

	/// Which way this action travels.
	pub const fn direction(self) -> Direction {
		match self {
			Self::InitConfig | Self::LoadData | Self::ClearAll | Self::UpdatePluginComponentData => Direction::ToCore,
			Self::InitFinish | Self::AddItem | Self::RemoveItem | Self::LoadPluginComponentData => Direction::FromCore,
		}
	}
}

impl fmt::Display for Action {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// The only shape that crosses the boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
	/// What the message means.
	pub action: Action,
	/// Action-specific payload.
	#[serde(default)]
	pub data: Value,
}

impl Envelope {
	/// Envelope without payload.
	pub fn bare(action: Action) -> Self {
		Self { action, data: Value::Null }
	}

	/// Envelope carrying `payload` serialized as JSON.
	pub fn with_payload<T: Serialize>(action: Action, payload: &T) -> Result<Self, ProtocolError> {
		let data = serde_json::to_value(payload).map_err(|error| ProtocolError::Payload { action, error })?;
		Ok(Self { action, data })
	}

	/// Decodes the payload as `T`.
	pub fn payload<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
		T::deserialize(&self.data).map_err(|error| ProtocolError::Payload { action: self.action, error })
	}

	/// Serializes the envelope as a JSON string.
	pub fn encode(&self) -> Result<String, ProtocolError> {
		Ok(serde_json::to_string(self)?)
	}

	/// Parses an envelope from a JSON string.
	pub fn decode(raw: &str) -> Result<Self, ProtocolError> {
		Ok(serde_json::from_str(raw)?)
	}
}

/// Adapter to core messages.
#[derive(Debug, Clone, PartialEq)]
pub enum CoreCommand {
	/// `initConfig`.
	InitConfig(RootConfigInfo),
	/// `loadData`.
	LoadData(UserId),
	/// `clearAll`.
	ClearAll,
	/// `updatePluginComponentData`.
	UpdatePluginComponentData(ComponentUpdate),
}

impl CoreCommand {
	/// Action of this command.
	pub const fn action(&self) -> Action {
		match self {
			Self::InitConfig(_) => Action::InitConfig,
			Self::LoadData(_) => Action::LoadData,
			Self::ClearAll => Action::ClearAll,
			Self::UpdatePluginComponentData(_) => Action::UpdatePluginComponentData,
		}
	}

	/// Wraps the command for transport.
	pub fn into_envelope(self) -> Result<Envelope, ProtocolError> {
		let action = self.action();
		match self {
			Self::InitConfig(config) => Envelope::with_payload(action, &config),
			Self::LoadData(user) => Envelope::with_payload(action, &user),
			Self::ClearAll => Ok(Envelope::bare(action)),
			Self::UpdatePluginComponentData(update) => Envelope::with_payload(action, &update),
		}
	}
}

impl TryFrom<Envelope> for CoreCommand {
	type Error = ProtocolError;

	fn try_from(envelope: Envelope) -> Result<Self, Self::Error> {
		Ok(match envelope.action {
			Action::InitConfig => Self::InitConfig(envelope.payload()?),
			Action::LoadData => Self::LoadData(envelope.payload()?),
			Action::ClearAll => Self::ClearAll,
			Action::UpdatePluginComponentData => Self::UpdatePluginComponentData(envelope.payload()?),
			action => return Err(ProtocolError::wrong_direction(action, Direction::ToCore)),
		})
	}
}

/// Core to adapter messages.
#[derive(Debug, Clone, PartialEq)]
pub enum CoreEvent {
	/// `initFinish`.
	InitFinish,
	/// `addItem`.
	AddItem(ItemComponentData),
	/// `removeItem`.
	RemoveItem(ItemComponentData),
	/// `loadPluginComponentData`.
	LoadPluginComponentData(ItemComponentData),
}

impl CoreEvent {
	/// Action of this event.
	pub const fn action(&self) -> Action {
		match self {
			Self::InitFinish => Action::InitFinish,
			Self::AddItem(_) => Action::AddItem,
			Self::RemoveItem(_) => Action::RemoveItem,
			Self::LoadPluginComponentData(_) => Action::LoadPluginComponentData,
		}
	}

	/// Item carried by this event, if any.
	pub fn item(&self) -> Option<&ItemComponentData> {
		match self {
			Self::InitFinish => None,
			Self::AddItem(item) | Self::RemoveItem(item) | Self::LoadPluginComponentData(item) => Some(item),
		}
	}

	/// Wraps the event for transport.
	pub fn into_envelope(self) -> Result<Envelope, ProtocolError> {
		let action = self.action();
		match self {
			Self::InitFinish => Ok(Envelope::bare(action)),
			Self::AddItem(item) | Self::RemoveItem(item) | Self::LoadPluginComponentData(item) => Envelope::with_payload(action, &item),
		}
	}
}

impl TryFrom<Envelope> for CoreEvent {
	type Error = ProtocolError;

	fn try_from(envelope: Envelope) -> Result<Self, Self::Error> {
		Ok(match envelope.action {
			Action::InitFinish => Self::InitFinish,
			Action::AddItem => Self::AddItem(envelope.payload()?),
			Action::RemoveItem => Self::RemoveItem(envelope.payload()?),
			Action::LoadPluginComponentData => Self::LoadPluginComponentData(envelope.payload()?),
			action => return Err(ProtocolError::wrong_direction(action, Direction::FromCore)),
		})
	}
}

/// Encodes a label for transport across the boundary.
pub fn encode_label(label: &str) -> String {
	urlencoding::encode(label).into_owned()
}

/// Decodes a transported label. Malformed input is returned unchanged.
pub fn decode_label(label: &str) -> String {
	match urlencoding::decode(label) {
		Ok(decoded) => decoded.into_owned(),
		Err(_) => label.to_string(),
	}
}
