use clap::{Arg, ArgAction, ArgMatches, Command};
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use hashsync::exclusion::PathFilter;
use hashsync::logging::*;
use hashsync::{
	Config, IndexBuilder, NotificationSource, RemoteClient, SyncClient, SyncError, SyncMode,
};

///////////////////////
// Utility functions //
///////////////////////

/// Defaults, then the config file, then HASHSYNC_* variables, then flags
fn load_config(matches: &ArgMatches, sub: &ArgMatches) -> Result<Config, SyncError> {
	let mut config = match matches.get_one::<String>("config") {
		Some(path) => Config::load(&PathBuf::from(path))?,
		None => match Config::default_path() {
			Some(path) => Config::load(&path)?,
			None => Config::default(),
		},
	};
	config.apply_env()?;

	if let Some(roots) = sub.get_many::<String>("roots") {
		config.roots = roots.map(PathBuf::from).collect();
	}
	config.roots = config
		.roots
		.iter()
		.map(|root| {
			std::fs::canonicalize(root).map_err(|e| SyncError::InvalidConfig {
				message: format!("root {}: {}", root.display(), e),
			})
		})
		.collect::<Result<_, _>>()?;

	if matches!(sub.try_get_one::<bool>("prune"), Ok(Some(true))) {
		config.sync_mode = SyncMode::PruneRemote;
	}
	if let Ok(Some(host)) = sub.try_get_one::<String>("host") {
		config.server.host = host.clone();
	}
	if let Ok(Some(port)) = sub.try_get_one::<u16>("port") {
		config.server.port = *port;
	}

	match matches.get_count("verbose") {
		0 => {}
		1 => config.log_level = "debug".to_string(),
		_ => config.log_level = "trace".to_string(),
	}

	Ok(config)
}

/// Resolves on SIGINT or SIGTERM
async fn shutdown_signal() {
	use tokio::signal;

	let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
		Ok(stream) => stream,
		Err(e) => {
			warn!("Failed to setup SIGTERM handler: {}. Falling back to Ctrl-C only.", e);
			let _ = signal::ctrl_c().await;
			return;
		}
	};

	tokio::select! {
		_ = sigterm.recv() => debug!("Received SIGTERM, shutting down..."),
		_ = signal::ctrl_c() => debug!("Received SIGINT, shutting down..."),
	}
}

async fn watch(config: Config, once: bool) -> Result<(), SyncError> {
	let remote = Arc::new(RemoteClient::new(&config.server)?);
	let mut client = SyncClient::new(config.clone(), remote)?;

	if once {
		let summary = client.initial_sync().await?;
		if summary.failed > 0 {
			return Err(SyncError::Other {
				message: format!("{} operations failed", summary.failed),
			});
		}
		return Ok(());
	}

	// Start watching before the initial pass so changes made meanwhile are queued
	let source =
		NotificationSource::start(&config.watched_roots(), client.filter().clone(), config.debounce())?;
	client.run(source, shutdown_signal()).await?;
	Ok(())
}

async fn dump(config: Config) -> Result<(), SyncError> {
	if config.roots.is_empty() {
		return Err(SyncError::InvalidConfig {
			message: "at least one root directory is required".to_string(),
		});
	}
	let filter = PathFilter::new(config.watched_roots(), &config.exclude_patterns)?;
	let index = IndexBuilder::from_config(&config, filter).build().await;
	let roots = config.watched_roots();

	for (path, digest) in index.iter() {
		let shown = roots.relative_to(path).unwrap_or_else(|| path.to_path_buf());
		println!("{}  {}", digest, shown.display());
	}
	Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
	let roots_arg = || {
		Arg::new("roots")
			.value_name("ROOT")
			.action(ArgAction::Append)
			.num_args(0..)
			.help("Directories to sync (overrides config roots)")
	};

	let matches = Command::new("hashsync")
		.version(env!("CARGO_PKG_VERSION"))
		.about("Mirror local directories to a content-digest file store")
		.subcommand_required(true)
		.arg(
			Arg::new("config")
				.short('c')
				.long("config")
				.value_name("CONFIG")
				.global(true)
				.help("Config file (TOML, JSON or JSON5)"),
		)
		.arg(
			Arg::new("verbose")
				.short('v')
				.long("verbose")
				.action(ArgAction::Count)
				.global(true)
				.help("More logging (-v debug, -vv trace)"),
		)
		.subcommand(
			Command::new("watch")
				.about("Sync once, then mirror live changes")
				.arg(roots_arg())
				.arg(
					Arg::new("prune")
						.long("prune")
						.action(ArgAction::SetTrue)
						.help("Delete remote files that no longer exist locally"),
				)
				.arg(
					Arg::new("once")
						.long("once")
						.action(ArgAction::SetTrue)
						.help("Exit after the initial sync"),
				)
				.arg(Arg::new("host").long("host").value_name("HOST").help("Server host"))
				.arg(
					Arg::new("port")
						.long("port")
						.value_name("PORT")
						.value_parser(clap::value_parser!(u16))
						.help("Server port"),
				),
		)
		.subcommand(
			Command::new("dump")
				.about("Print the local index as digest and path")
				.arg(roots_arg()),
		)
		.get_matches();

	let (name, sub) = matches.subcommand().ok_or("subcommand required")?;
	let config = match load_config(&matches, sub) {
		Ok(config) => config,
		Err(e) => {
			eprintln!("hashsync: {}", e);
			std::process::exit(2);
		}
	};
	init_tracing(&config.log_level);

	let result = match name {
		"watch" => watch(config, sub.get_flag("once")).await,
		"dump" => dump(config).await,
		other => Err(SyncError::Other { message: format!("unknown command: {}", other) }),
	};

	if let Err(e) = result {
		match e {
			SyncError::RemoteUnreachable { .. } => {
				error!("{}; check server host and port", e)
			}
			_ => error!("{}", e),
		}
		std::process::exit(1);
	}

	Ok(())
}

// vim: ts=4
