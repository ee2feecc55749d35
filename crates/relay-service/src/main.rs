//! Main entry point for the transaction relay service.
//!
//! Loads configuration, assembles the relay engine from the registered
//! implementations, and serves the HTTP API until interrupted.

use clap::Parser;
use relay_config::Config;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

mod apis;
mod factory_registry;
mod server;

/// Command-line arguments for the relay service.
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

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started relay");

	let config_path = args
		.config
		.to_str()
		.ok_or_else(|| format!("Config path is not valid UTF-8: {}", args.config.display()))?;
	let config = Config::from_file(config_path).await?;
	tracing::info!("Loaded configuration [{}]", config.relay.id);

	let api_config = match config.api.as_ref().filter(|api| api.enabled) {
		Some(api) => api.clone(),
		None => return Err("API server is disabled; set [api] enabled = true".into()),
	};

	let shutdown = CancellationToken::new();
	let engine =
		Arc::new(factory_registry::build_engine_from_config(config, shutdown.clone()).await?);

	let signal = shutdown.clone();
	tokio::spawn(async move {
		if let Err(e) = tokio::signal::ctrl_c().await {
			tracing::error!(error = %e, "Failed to listen for shutdown signal");
			return;
		}
		tracing::info!("Shutdown requested");
		signal.cancel();
	});

	server::start_server(api_config, engine, shutdown).await?;

	tracing::info!("Stopped relay");
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::tempdir;

	#[test]
	fn test_args_default_values() {
		let args = Args::parse_from(["relay"]);
		assert_eq!(args.config, PathBuf::from("config.toml"));
		assert_eq!(args.log_level, "info");
	}

	#[test]
	fn test_args_custom_values() {
		let args = Args::parse_from(["relay", "--config", "custom.toml", "-l", "debug"]);
		assert_eq!(args.config, PathBuf::from("custom.toml"));
		assert_eq!(args.log_level, "debug");
	}

	#[tokio::test]
	async fn test_file_config_builds_engine() {
		let temp_dir = tempdir().unwrap();
		let config_path = temp_dir.path().join("relay.toml");

		let config_content = r#"
[relay]
id = "test-file-relay"

[network]
chain_id = 84532
name = "base-sepolia"
explorer_url = "https://sepolia.basescan.org"

[[endpoints]]
name = "primary"
url = "http://127.0.0.1:8545"

[[endpoints]]
name = "backup"
url = "http://127.0.0.1:8546"

[[contracts]]
address = "0x5FbDB2315678afecb367f032d93F642f64180aa3"
label = "nft"

[account]
primary = "local"

[account.implementations.local]
private_key = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"

[api]
enabled = true
port = 3000
"#;
		std::fs::write(&config_path, config_content).unwrap();

		let config = Config::from_file(config_path.to_str().unwrap()).await.unwrap();
		assert_eq!(config.relay.id, "test-file-relay");
		assert_eq!(config.endpoints.len(), 2);
		assert!(config.api.as_ref().is_some_and(|api| api.enabled));

		let engine = factory_registry::build_engine_from_config(config, CancellationToken::new())
			.await
			.unwrap();
		assert_eq!(engine.chain_id(), 84532);
	}
}
