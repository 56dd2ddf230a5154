//! Label and icon resource resolution.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use parking_lot::Mutex;

use crate::error::ResolveError;

/// Maps package resource handles to renderable values.
#[async_trait]
pub trait ResourceResolver: Send + Sync {
	/// Human-readable label for `id`.
	async fn resolve_label(&self, bundle: &str, module: &str, id: u32) -> Result<String, ResolveError>;

	/// Renderable icon (URL or data URL) for `id`.
	async fn resolve_icon(&self, bundle: &str, module: &str, id: u32) -> Result<String, ResolveError>;
}

/// Encodes raw image bytes as a `data:` URL.
pub fn icon_data_url(mime: &str, bytes: &[u8]) -> String {
	format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

type ResourceKey = (String, u32);

/// In-memory [`ResourceResolver`].
#[derive(Default)]
pub struct StaticResolver {
	labels: Mutex<HashMap<ResourceKey, String>>,
	icons: Mutex<HashMap<ResourceKey, String>>,
	calls: AtomicUsize,
}

impl StaticResolver {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert_label(&self, bundle: &str, id: u32, label: impl Into<String>) {
		self.labels.lock().insert((bundle.to_string(), id), label.into());
	}

	/// Stores an icon as a base64 data URL.
	pub fn insert_icon(&self, bundle: &str, id: u32, mime: &str, bytes: &[u8]) {
		self.icons.lock().insert((bundle.to_string(), id), icon_data_url(mime, bytes));
	}

	/// Number of resolve calls served.
	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::Acquire)
	}

	fn lookup(&self, table: &Mutex<HashMap<ResourceKey, String>>, bundle: &str, id: u32) -> Result<String, ResolveError> {
		self.calls.fetch_add(1, Ordering::AcqRel);
		table.lock().get(&(bundle.to_string(), id)).cloned().ok_or_else(|| ResolveError::NotFound {
			bundle: bundle.to_string(),
			id,
		})
	}
}

#[async_trait]
impl ResourceResolver for StaticResolver {
	async fn resolve_label(&self, bundle: &str, _module: &str, id: u32) -> Result<String, ResolveError> {
		self.lookup(&self.labels, bundle, id)
	}

	async fn resolve_icon(&self, bundle: &str, _module: &str, id: u32) -> Result<String, ResolveError> {
		self.lookup(&self.icons, bundle, id)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn icons_become_data_urls() {
		assert_eq!(icon_data_url("image/png", b"\x89PNG"), "data:image/png;base64,iVBORw==");
	}

	#[tokio::test]
	async fn resolves_and_counts() {
		let resolver = StaticResolver::new();
		resolver.insert_label("com.x", 1, "Wi-Fi");
		resolver.insert_icon("com.x", 2, "image/svg+xml", b"<svg/>");
		assert_eq!(resolver.resolve_label("com.x", "entry", 1).await.unwrap(), "Wi-Fi");
		assert!(resolver.resolve_icon("com.x", "entry", 2).await.unwrap().starts_with("data:image/svg+xml;base64,"));
		assert_eq!(
			resolver.resolve_icon("com.x", "entry", 9).await,
			Err(ResolveError::NotFound {
				bundle: "com.x".into(),
				id: 9
			})
		);
		assert_eq!(resolver.calls(), 3);
	}
}
