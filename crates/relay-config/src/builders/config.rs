//! Fluent construction of `Config` values for tests.

use crate::{
	AccountConfig, Config, ContractConfig, DemonstrationConfig, EndpointConfig, ExecutionConfig,
	NetworkConfig, PreparationConfig, RelayConfig,
};
use relay_types::Address;
use std::collections::HashMap;

/// Anvil's first development key.
pub const TEST_PRIVATE_KEY: &str =
	"0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	relay_id: String,
	chain_id: u64,
	explorer_url: Option<String>,
	endpoints: Vec<EndpointConfig>,
	contracts: Vec<ContractConfig>,
	execution: ExecutionConfig,
	demonstration_enabled: bool,
	preparation_url: Option<String>,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigBuilder {
	/// Chain 84532, no endpoints or contracts, short timeouts.
	pub fn new() -> Self {
		Self {
			relay_id: "relay-test".to_string(),
			chain_id: 84532,
			explorer_url: Some("https://sepolia.basescan.org".to_string()),
			endpoints: Vec::new(),
			contracts: Vec::new(),
			execution: ExecutionConfig {
				receipt_timeout_seconds: 10,
				poll_interval_ms: 500,
				probe_timeout_seconds: 2,
				request_timeout_seconds: 2,
				..ExecutionConfig::default()
			},
			demonstration_enabled: true,
			preparation_url: None,
		}
	}

	pub fn relay_id(mut self, id: impl Into<String>) -> Self {
		self.relay_id = id.into();
		self
	}

	pub fn chain_id(mut self, chain_id: u64) -> Self {
		self.chain_id = chain_id;
		self
	}

	pub fn explorer_url(mut self, url: Option<String>) -> Self {
		self.explorer_url = url;
		self
	}

	/// Appends an endpoint; order of calls is priority order.
	pub fn endpoint(mut self, name: impl Into<String>, url: impl Into<String>) -> Self {
		self.endpoints.push(EndpointConfig {
			name: name.into(),
			url: url.into(),
		});
		self
	}

	pub fn contract(mut self, address: Address, label: impl Into<String>) -> Self {
		self.contracts.push(ContractConfig {
			address,
			label: label.into(),
		});
		self
	}

	pub fn execution(mut self, execution: ExecutionConfig) -> Self {
		self.execution = execution;
		self
	}

	pub fn demonstration(mut self, enabled: bool) -> Self {
		self.demonstration_enabled = enabled;
		self
	}

	pub fn preparation_url(mut self, url: impl Into<String>) -> Self {
		self.preparation_url = Some(url.into());
		self
	}

	pub fn build(self) -> Config {
		let mut local = toml::map::Map::new();
		local.insert(
			"private_key".to_string(),
			toml::Value::String(TEST_PRIVATE_KEY.to_string()),
		);
		let mut implementations = HashMap::new();
		implementations.insert("local".to_string(), toml::Value::Table(local));

		Config {
			relay: RelayConfig { id: self.relay_id },
			network: NetworkConfig {
				chain_id: self.chain_id,
				name: None,
				explorer_url: self.explorer_url,
			},
			endpoints: self.endpoints,
			contracts: self.contracts,
			account: AccountConfig {
				primary: "local".to_string(),
				implementations,
			},
			execution: self.execution,
			demonstration: DemonstrationConfig {
				enabled: self.demonstration_enabled,
			},
			preparation: self.preparation_url.map(|url| PreparationConfig {
				url,
				timeout_seconds: 5,
			}),
			api: None,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_built_config_validates() {
		let config = ConfigBuilder::new()
			.endpoint("a", "http://localhost:8545")
			.contract(Address::ZERO, "nft")
			.build();
		assert!(config.validate().is_ok());
	}

	#[test]
	fn test_empty_builder_fails_validation() {
		assert!(ConfigBuilder::new().build().validate().is_err());
	}
}
