//! Builder for assembling a relay engine from configuration.
//!
//! Account implementations are looked up by name in a factory map and the
//! primary one becomes the process-wide signer. RPC clients are built once per
//! configured endpoint through a single factory, so tests can substitute
//! scripted endpoints without touching the network.

use crate::engine::{ContractCandidate, EngineSettings, RelayEngine};
use crate::prepare::{HttpPreparation, PreparationInterface};
use relay_account::{AccountError, AccountInterface, AccountService};
use relay_config::Config;
use relay_delivery::{DeliveryError, GasEstimator, RpcInterface, TransactionExecutor};
use relay_discovery::{ContractResolver, EndpointClient, EndpointHealthMonitor};
use relay_types::RpcEndpoint;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Factory functions the builder draws on.
pub struct RelayFactories<AF, RF> {
	pub account_factories: HashMap<String, AF>,
	/// Builds the client for one endpoint URL.
	pub rpc_factory: RF,
}

pub struct RelayBuilder {
	config: Config,
	shutdown: CancellationToken,
	preparation: Option<Arc<dyn PreparationInterface>>,
}

impl RelayBuilder {
	pub fn new(config: Config) -> Self {
		Self {
			config,
			shutdown: CancellationToken::new(),
			preparation: None,
		}
	}

	/// Token cancelled on process shutdown; ends in-flight receipt waits.
	pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
		self.shutdown = shutdown;
		self
	}

	/// Uses `preparation` instead of the HTTP client built from config.
	pub fn with_preparation(mut self, preparation: Arc<dyn PreparationInterface>) -> Self {
		self.preparation = Some(preparation);
		self
	}

	pub async fn build<AF, RF>(
		self,
		factories: RelayFactories<AF, RF>,
	) -> Result<RelayEngine, BuilderError>
	where
		AF: Fn(&toml::Value) -> Result<Box<dyn AccountInterface>, AccountError>,
		RF: Fn(&str, Duration) -> Result<Arc<dyn RpcInterface>, DeliveryError>,
	{
		let config = &self.config;
		let execution = &config.execution;

		// Account
		let primary = config.account.primary.as_str();
		let account_config = config.account.implementations.get(primary).ok_or_else(|| {
			BuilderError::Config(format!(
				"Primary account '{}' has no [account.implementations.{}] table",
				primary, primary
			))
		})?;
		let factory = factories.account_factories.get(primary).ok_or_else(|| {
			BuilderError::MissingComponent(format!("account implementation '{}'", primary))
		})?;
		let implementation = match factory(account_config) {
			Ok(implementation) => implementation,
			Err(e) => {
				tracing::error!(
					component = "account",
					implementation = %primary,
					error = %e,
					"Failed to create account implementation"
				);
				return Err(BuilderError::Config(format!(
					"Failed to create account implementation '{}': {}",
					primary, e
				)));
			},
		};
		let account = Arc::new(AccountService::new(implementation));
		let caller = account
			.get_address()
			.await
			.map_err(|e| BuilderError::Config(format!("Failed to get relayer address: {}", e)))?;
		tracing::info!(component = "account", implementation = %primary, address = %caller, "Loaded");

		// Endpoints
		let mut clients = Vec::with_capacity(config.endpoints.len());
		for endpoint in &config.endpoints {
			let rpc = (factories.rpc_factory)(&endpoint.url, execution.request_timeout()).map_err(
				|e| {
					BuilderError::Config(format!(
						"Failed to create client for endpoint '{}': {}",
						endpoint.name, e
					))
				},
			)?;
			let descriptor = RpcEndpoint::new(&endpoint.name, &endpoint.url, config.network.chain_id);
			clients.push(EndpointClient::new(descriptor, rpc));
			tracing::info!(component = "endpoint", name = %endpoint.name, "Loaded");
		}
		if clients.is_empty() {
			return Err(BuilderError::MissingComponent("endpoints".into()));
		}

		let monitor = Arc::new(EndpointHealthMonitor::new(
			clients,
			config.network.chain_id,
			execution.probe_timeout(),
			execution.max_probe_concurrency,
		));

		let contracts: Vec<ContractCandidate> = config
			.contracts
			.iter()
			.map(|c| ContractCandidate {
				address: c.address,
				label: c.label.clone(),
			})
			.collect();

		let required_selectors = execution
			.selectors()
			.map_err(|e| BuilderError::Config(e.to_string()))?;

		let preparation = match (self.preparation, &config.preparation) {
			(Some(preparation), _) => Some(preparation),
			(None, Some(prep)) => {
				let client =
					HttpPreparation::new(&prep.url, Duration::from_secs(prep.timeout_seconds))
						.map_err(|e| BuilderError::Config(e.to_string()))?;
				tracing::info!(component = "preparation", url = %prep.url, "Loaded");
				Some(Arc::new(client) as Arc<dyn PreparationInterface>)
			},
			(None, None) => {
				tracing::warn!("No preparation service configured - /mint will not be available");
				None
			},
		};

		let executor = TransactionExecutor::new(
			account,
			execution.confirmations,
			execution.receipt_timeout(),
			execution.poll_interval(),
			self.shutdown,
		);

		let settings = EngineSettings {
			chain_id: config.network.chain_id,
			explorer_url: config.network.explorer_url.clone(),
			required_selectors,
			congestion_bump_percent: execution.congestion_bump_percent,
			demonstration_enabled: config.demonstration.enabled,
			receipt_timeout: execution.receipt_timeout(),
		};

		tracing::info!(
			relay_id = %config.relay.id,
			chain_id = config.network.chain_id,
			endpoints = config.endpoints.len(),
			contracts = contracts.len(),
			demonstration = config.demonstration.enabled,
			"Relay engine assembled"
		);

		Ok(RelayEngine::new(
			settings,
			monitor,
			ContractResolver::for_contracts(contracts.iter().map(|c| c.address)),
			GasEstimator::new(execution.gas_buffer_percent, execution.fallback_gas_limit),
			executor,
			caller,
			contracts,
			preparation,
		))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use relay_config::builders::ConfigBuilder;
	use relay_delivery::testing::{test_address, TEST_CONTRACT};

	fn account_factories() -> HashMap<String, relay_account::AccountFactory> {
		relay_account::get_all_implementations()
			.into_iter()
			.map(|(name, factory)| (name.to_string(), factory))
			.collect()
	}

	#[tokio::test]
	async fn test_builds_with_alloy_clients() {
		let config = ConfigBuilder::new()
			.endpoint("local", "http://127.0.0.1:8545")
			.contract(TEST_CONTRACT, "nft")
			.build();

		let engine = RelayBuilder::new(config)
			.build(RelayFactories {
				account_factories: account_factories(),
				rpc_factory: relay_delivery::implementations::evm::alloy::create_rpc,
			})
			.await
			.unwrap();
		assert_eq!(engine.caller(), test_address());
		assert_eq!(engine.chain_id(), 84532);
		assert!(!engine.has_preparation());
	}

	#[tokio::test]
	async fn test_unknown_account_implementation() {
		let mut config = ConfigBuilder::new()
			.endpoint("local", "http://127.0.0.1:8545")
			.contract(TEST_CONTRACT, "nft")
			.build();
		config.account.primary = "kms".into();
		config
			.account
			.implementations
			.insert("kms".into(), toml::Value::Table(Default::default()));

		let err = RelayBuilder::new(config)
			.build(RelayFactories {
				account_factories: account_factories(),
				rpc_factory: relay_delivery::implementations::evm::alloy::create_rpc,
			})
			.await
			.err()
			.unwrap();
		assert!(matches!(err, BuilderError::MissingComponent(_)));
	}

	#[tokio::test]
	async fn test_invalid_endpoint_url() {
		let config = ConfigBuilder::new()
			.endpoint("broken", "not a url")
			.contract(TEST_CONTRACT, "nft")
			.build();

		let err = RelayBuilder::new(config)
			.build(RelayFactories {
				account_factories: account_factories(),
				rpc_factory: relay_delivery::implementations::evm::alloy::create_rpc,
			})
			.await
			.err()
			.unwrap();
		assert!(err.to_string().contains("broken"));
	}
}
