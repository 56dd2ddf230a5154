//! Catalog files describing an installed system for the in-memory collaborators.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use serde::Deserialize;
use shellbay_adapter::{RemoteReply, StaticRemote, StaticResolver};
use shellbay_proto::TemplateKey;
use shellbay_source::{CatalogEntry, StaticDirectory};

/// Raw icon content registered under a resource id.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IconResource {
	pub mime: String,
	pub content: String,
}

/// Label and icon resources of one bundle.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
	pub bundle_name: String,
	pub id: u32,
	#[serde(default)]
	pub label: Option<String>,
	#[serde(default)]
	pub icon: Option<IconResource>,
}

/// Canned answer to a remote template pull.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateReply {
	pub bundle_name: String,
	pub ability_name: String,
	pub template: String,
	#[serde(default)]
	pub reply: RemoteReply,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Catalog {
	#[serde(default)]
	pub entries: Vec<CatalogEntry>,
	#[serde(default)]
	pub resources: Vec<Resource>,
	#[serde(default)]
	pub templates: Vec<TemplateReply>,
}

impl Catalog {
	pub fn from_toml_str(input: &str) -> anyhow::Result<Self> {
		Ok(toml::from_str(input)?)
	}

	pub fn load(path: &Path) -> anyhow::Result<Self> {
		let input = std::fs::read_to_string(path).with_context(|| format!("reading catalog {}", path.display()))?;
		Self::from_toml_str(&input).with_context(|| format!("parsing catalog {}", path.display()))
	}

	pub fn directory(&self) -> Arc<StaticDirectory> {
		Arc::new(StaticDirectory::with_entries(self.entries.clone()))
	}

	pub fn resolver(&self) -> Arc<StaticResolver> {
		let resolver = StaticResolver::new();
		for resource in &self.resources {
			if let Some(label) = &resource.label {
				resolver.insert_label(&resource.bundle_name, resource.id, label.as_str());
			}
			if let Some(icon) = &resource.icon {
				resolver.insert_icon(&resource.bundle_name, resource.id, &icon.mime, icon.content.as_bytes());
			}
		}
		Arc::new(resolver)
	}

	pub fn remote(&self) -> Arc<StaticRemote> {
		let remote = StaticRemote::new();
		for template in &self.templates {
			let key = TemplateKey {
				bundle_name: template.bundle_name.clone(),
				ability_name: template.ability_name.clone(),
				template: template.template.clone(),
			};
			remote.insert_reply(key, template.reply.clone());
		}
		Arc::new(remote)
	}
}
