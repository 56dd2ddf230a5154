//! Root configuration loading.
//!
//! The root configuration is stored as TOML using the same camelCase field
//! names that travel in the `initConfig` payload:
//!
//! ```toml
//! action = "shellbay.action.PLUGIN"
//!
//! [[filterDatas]]
//! id = "wifi"
//! bundleName = "com.x.wifi"
//! abilityName = "WifiAbility"
//!
//! [loaderConfig.declarative]
//! action = "shellbay.plugin.declarative"
//! ```

use std::path::Path;

use crate::error::{ConfigError, Result};
use crate::types::RootConfigInfo;

impl RootConfigInfo {
	/// Parses and validates a root configuration from TOML text.
	pub fn from_toml_str(input: &str) -> Result<Self> {
		let config: RootConfigInfo = toml::from_str(input)?;
		config.validate()?;
		Ok(config)
	}

	/// Rejects configurations that could never match anything.
	pub fn validate(&self) -> Result<()> {
		if self.action.trim().is_empty() {
			return Err(ConfigError::MissingField("action".to_string()));
		}
		for (idx, filter) in self.filter_datas.iter().enumerate() {
			for (field, value) in [("id", &filter.id), ("bundleName", &filter.bundle_name), ("abilityName", &filter.ability_name)] {
				if value.is_empty() {
					return Err(ConfigError::MissingField(format!("filterDatas[{idx}].{field}")));
				}
			}
		}
		Ok(())
	}
}

/// Reads a root configuration file.
pub fn load_root_config(path: impl AsRef<Path>) -> Result<RootConfigInfo> {
	let path = path.as_ref();
	let raw = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
		path: path.to_path_buf(),
		error,
	})?;
	RootConfigInfo::from_toml_str(&raw)
}
