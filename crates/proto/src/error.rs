//! Error types for the boundary protocol and configuration loading.

use std::path::PathBuf;

use thiserror::Error;

use crate::envelope::{Action, Direction};

/// Errors decoding an [`Envelope`](crate::Envelope) into a typed message.
#[derive(Debug, Error)]
pub enum ProtocolError {
	/// The action belongs to the other direction of the boundary.
	#[error("action {action} does not travel {expected}")]
	WrongDirection {
		/// Received action.
		action: Action,
		/// Direction the decoder expected.
		expected: &'static str,
	},

	/// The payload does not match the action's data shape.
	#[error("invalid {action} payload: {error}")]
	Payload {
		/// Action whose payload failed to decode.
		action: Action,
		/// Underlying serde error.
		error: serde_json::Error,
	},

	/// The envelope itself is not valid JSON.
	#[error("invalid envelope: {0}")]
	Json(#[from] serde_json::Error),
}

impl ProtocolError {
	pub(crate) fn wrong_direction(action: Action, expected: Direction) -> Self {
		Self::WrongDirection {
			action,
			expected: expected.as_str(),
		}
	}
}

/// Errors that can occur when loading the root configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error parsing TOML syntax or shape.
	#[error("TOML parse error: {0}")]
	Toml(#[from] toml::de::Error),

	/// Error reading a configuration file.
	#[error("I/O error reading {path}: {error}")]
	Io {
		/// Path to the file that failed to read.
		path: PathBuf,
		/// The underlying I/O error.
		error: std::io::Error,
	},

	/// A required field is missing or empty.
	#[error("missing required field: {0}")]
	MissingField(String),
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
