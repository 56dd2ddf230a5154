//! Shellbay registry runner.
//!
//! Loads a root configuration and a catalog of installed components, runs the
//! registry against in-memory collaborators and prints every listener event
//! as a JSON line on stdout.

mod catalog;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use serde_json::json;
use shellbay_adapter::{Adapter, ListenerEvent, OwnerId, SourceContext};
use shellbay_proto::UserId;
use shellbay_worker::{EventSink, EventStream};
use tracing::info;

use crate::catalog::Catalog;

/// Runner command line arguments.
#[derive(Parser, Debug)]
#[command(name = "shellbay")]
#[command(about = "Run the shellbay plugin registry against a component catalog")]
struct Args {
	/// Root configuration (TOML)
	#[arg(short, long, value_name = "PATH")]
	config: PathBuf,

	/// Installed components, resources and remote templates (TOML)
	#[arg(long, value_name = "PATH")]
	catalog: PathBuf,

	/// User to load data for
	#[arg(short, long, default_value_t = 100)]
	user: u32,

	/// Identity remote template requests are made under
	#[arg(long, default_value = "shellbay-cli")]
	owner: String,

	/// Bundles to uninstall once the initial load has settled
	#[arg(long, value_name = "BUNDLE")]
	uninstall: Vec<String>,

	/// Quiet period that ends each phase, in milliseconds
	#[arg(long, default_value_t = 200)]
	settle_ms: u64,

	/// Verbose logging
	#[arg(short, long)]
	verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	setup_tracing(args.verbose);

	let config = shellbay_proto::load_root_config(&args.config).with_context(|| format!("loading config {}", args.config.display()))?;
	let catalog = Catalog::load(&args.catalog)?;
	info!(
		loaders = config.loader_config.len(),
		slots = config.filter_datas.len(),
		entries = catalog.entries.len(),
		"starting shellbay"
	);

	let directory = catalog.directory();
	let context = SourceContext::in_memory(directory.clone(), catalog.resolver(), catalog.remote(), OwnerId::new(args.owner));
	let adapter = Adapter::start(context)?;
	let (sink, mut events) = EventSink::channel();
	adapter.register_listener(Arc::new(sink));

	let settle = Duration::from_millis(args.settle_ms);
	adapter.init_data_source(config).await?;
	adapter.load_data(UserId(args.user)).await?;
	print_until_quiet(&mut events, settle).await?;

	for bundle in &args.uninstall {
		if !directory.uninstall(bundle) {
			tracing::warn!(%bundle, "cli.uninstall.unknown");
		}
	}
	if !args.uninstall.is_empty() {
		print_until_quiet(&mut events, settle).await?;
	}

	adapter.clear_all().await?;
	let report = adapter.shutdown().await;
	info!(completed = report.completed(), "shellbay stopped");
	Ok(())
}

/// Prints events until none arrives for `settle`.
async fn print_until_quiet(events: &mut EventStream<ListenerEvent>, settle: Duration) -> anyhow::Result<()> {
	while let Ok(Some(event)) = tokio::time::timeout(settle, events.recv()).await {
		let line = match event {
			ListenerEvent::InitFinish => json!({ "event": "initFinish" }),
			ListenerEvent::Add(item) => json!({ "event": "add", "item": item }),
			ListenerEvent::Remove(item) => json!({ "event": "remove", "item": item }),
		};
		println!("{}", serde_json::to_string(&line)?);
	}
	Ok(())
}

fn setup_tracing(verbose: bool) {
	use std::fs::OpenOptions;

	use tracing_subscriber::EnvFilter;
	use tracing_subscriber::fmt::format::FmtSpan;
	use tracing_subscriber::prelude::*;

	let filter = || {
		EnvFilter::try_from_env("SHELLBAY_LOG")
			.or_else(|_| EnvFilter::try_from_default_env())
			.unwrap_or_else(|_| {
				if verbose {
					EnvFilter::new("shellbay=trace,debug")
				} else {
					EnvFilter::new("shellbay=debug,info")
				}
			})
	};

	// SHELLBAY_LOG_DIR keeps stdout and stderr clean for piping
	if let Some(log_dir) = std::env::var("SHELLBAY_LOG_DIR").ok().map(PathBuf::from)
		&& std::fs::create_dir_all(&log_dir).is_ok()
	{
		let log_path = log_dir.join(format!("shellbay.{}.log", std::process::id()));

		if let Ok(file) = OpenOptions::new().create(true).append(true).open(&log_path) {
			let file_layer = tracing_subscriber::fmt::layer()
				.with_writer(file)
				.with_ansi(false)
				.with_span_events(FmtSpan::CLOSE)
				.with_target(true);

			tracing_subscriber::registry().with(filter()).with(file_layer).init();

			tracing::info!(path = ?log_path, "tracing initialized");
			return;
		}
	}

	tracing_subscriber::fmt()
		.with_env_filter(filter())
		.with_writer(std::io::stderr)
		.init();
}
