use shellbay_proto::{LoaderConfigInfo, PluginKind};

use crate::loader::{DataProviderLoader, DeclarativeLoader, LoaderChannel, LoaderSettings, RemoteTemplateLoader, SourceLoader};

/// Builds loaders from configuration keys, all wired to one channel.
#[derive(Clone)]
pub struct LoaderFactory {
	root_action: String,
	channel: LoaderChannel,
}

impl LoaderFactory {
	pub fn new(root_action: impl Into<String>, channel: LoaderChannel) -> Self {
		Self {
			root_action: root_action.into(),
			channel,
		}
	}

	/// Constructs the loader for `key`. Unknown keys are logged and yield `None`.
	pub fn get_source_loader(&self, key: &str, config: &LoaderConfigInfo) -> Option<SourceLoader> {
		let Some(kind) = PluginKind::from_key(key) else {
			tracing::warn!(kind = key, "source.factory.unknown_kind");
			return None;
		};
		let settings = LoaderSettings::new(kind, config, &self.root_action);
		let channel = self.channel.clone();
		Some(match kind {
			PluginKind::Declarative => SourceLoader::Declarative(DeclarativeLoader::new(settings, channel)),
			PluginKind::RemoteTemplate => SourceLoader::RemoteTemplate(RemoteTemplateLoader::new(settings, channel)),
			PluginKind::DataProvider => SourceLoader::DataProvider(DataProviderLoader::new(settings, channel)),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::loader::test_support::channel;

	#[test]
	fn builds_every_known_kind() {
		let (channel, _stream) = channel();
		let factory = LoaderFactory::new("root", channel);
		for kind in PluginKind::ALL {
			let loader = factory.get_source_loader(kind.key(), &LoaderConfigInfo::default()).unwrap();
			assert_eq!(loader.kind(), kind);
			assert_eq!(loader.settings().filter_key, "root");
		}
	}

	#[test]
	fn unknown_kind_is_skipped() {
		let (channel, _stream) = channel();
		let factory = LoaderFactory::new("root", channel);
		assert!(factory.get_source_loader("metaSource", &LoaderConfigInfo::default()).is_none());
	}
}
