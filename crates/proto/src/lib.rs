//! Shared data model and boundary protocol for shellbay.
//!
//! The Registry Core and the UI-side adapter never share memory. Everything
//! they exchange is defined here as plain serde data and wrapped in an
//! [`Envelope`] whose `action` comes from a fixed vocabulary ([`Action`]).

#![warn(missing_docs)]

pub mod config;
pub mod envelope;
pub mod error;
pub mod types;

pub use config::load_root_config;
pub use envelope::{Action, CoreCommand, CoreEvent, Direction, Envelope, decode_label, encode_label};
pub use error::{ConfigError, ProtocolError};
pub use types::*;
