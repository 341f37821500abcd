//! Main entry point for the transaction tracker service.
//!
//! Loads the configuration, wires the configured storage, chain RPC and
//! block explorer implementations into a tracker, and runs it until Ctrl-C,
//! optionally alongside the HTTP API.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracker_config::Config;

mod factory_registry;
mod server;

/// Command-line arguments for the tracker service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	// RUST_LOG wins over the command line
	let env_filter = EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| EnvFilter::new(args.log_level.clone()));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started tracker");

	let config_path = args
		.config
		.to_str()
		.ok_or("Configuration path is not valid UTF-8")?;
	let config = Config::from_file(config_path).await?;
	tracing::info!("Loaded configuration [{}]", config.tracker.id);

	let tracker = Arc::new(factory_registry::build_tracker_from_config(config.clone())?);

	match config.api.filter(|api| api.enabled) {
		Some(api_config) => {
			let api_tracker = Arc::clone(&tracker);

			tokio::select! {
				result = tracker.run() => {
					tracing::info!("Tracker finished");
					result?;
				}
				result = server::start_server(api_config, api_tracker) => {
					tracing::info!("API server finished");
					result?;
				}
			}
		},
		None => {
			tracing::info!("Starting tracker only");
			tracker.run().await?;
		},
	}

	tracing::info!("Stopped tracker");
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::tempdir;

	#[test]
	fn test_args_defaults() {
		let args = Args::parse_from(["tracker"]);
		assert_eq!(args.config, PathBuf::from("config.toml"));
		assert_eq!(args.log_level, "info");
	}

	#[test]
	fn test_args_custom_values() {
		let args = Args::parse_from(["tracker", "--config", "custom.toml", "-l", "debug"]);
		assert_eq!(args.config, PathBuf::from("custom.toml"));
		assert_eq!(args.log_level, "debug");
	}

	#[tokio::test]
	async fn test_build_tracker_from_file_config() {
		let temp_dir = tempdir().unwrap();
		let config_path = temp_dir.path().join("tracker.toml");

		let config_content = r#"
[tracker]
id = "test-file-tracker"
check_delay_seconds = 10

[networks.31337]
rpc_url = "http://localhost:8545"

[networks.1]
rpc_url = "http://localhost:8546"
[networks.1.explorer]
api_url = "http://localhost:9000/api"
api_keys = ["key-one"]

[storage]
primary = "memory"
[storage.implementations.memory]

[api]
enabled = true
host = "127.0.0.1"
port = 3000
"#;
		std::fs::write(&config_path, config_content).unwrap();

		let config = Config::from_file(config_path.to_str().unwrap())
			.await
			.unwrap();
		assert_eq!(config.tracker.id, "test-file-tracker");
		assert_eq!(config.tracker.check_delay_seconds, 10);
		assert!(config.api.as_ref().is_some_and(|api| api.enabled));

		let tracker = factory_registry::build_tracker_from_config(config).unwrap();
		assert_eq!(tracker.config().networks.len(), 2);
	}
}
