//! Registry of compiled-in implementations.
//!
//! Account and RPC implementations register themselves by name; the service
//! checks configured names against the registry before assembling the engine.

use relay_account::AccountFactory;
use relay_config::Config;
use relay_core::{RelayBuilder, RelayEngine, RelayFactories};
use relay_delivery::RpcFactory;
use std::collections::HashMap;
use std::sync::OnceLock;
use tokio_util::sync::CancellationToken;

/// RPC implementation used for every configured endpoint.
pub const DEFAULT_RPC: &str = "evm_alloy";

pub struct FactoryRegistry {
	pub account: HashMap<String, AccountFactory>,
	pub rpc: HashMap<String, RpcFactory>,
}

impl FactoryRegistry {
	pub fn new() -> Self {
		Self {
			account: HashMap::new(),
			rpc: HashMap::new(),
		}
	}

	pub fn register_account(&mut self, name: impl Into<String>, factory: AccountFactory) {
		self.account.insert(name.into(), factory);
	}

	pub fn register_rpc(&mut self, name: impl Into<String>, factory: RpcFactory) {
		self.rpc.insert(name.into(), factory);
	}
}

impl Default for FactoryRegistry {
	fn default() -> Self {
		Self::new()
	}
}

static REGISTRY: OnceLock<FactoryRegistry> = OnceLock::new();

/// Returns the process-wide registry, populating it on first use.
pub fn get_registry() -> &'static FactoryRegistry {
	REGISTRY.get_or_init(|| {
		let mut registry = FactoryRegistry::new();

		for (name, factory) in relay_account::get_all_implementations() {
			tracing::debug!("Registering account implementation: {}", name);
			registry.register_account(name, factory);
		}

		for (name, factory) in relay_delivery::get_all_implementations() {
			tracing::debug!("Registering RPC implementation: {}", name);
			registry.register_rpc(name, factory);
		}

		registry
	})
}

/// Assembles the engine from `config` using registered implementations.
///
/// Every configured account implementation must be known, not only the
/// primary one, so that typos surface at startup.
pub async fn build_engine_from_config(
	config: Config,
	shutdown: CancellationToken,
) -> Result<RelayEngine, Box<dyn std::error::Error>> {
	let registry = get_registry();

	let mut account_factories = HashMap::new();
	for name in config.account.implementations.keys() {
		match registry.account.get(name) {
			Some(factory) => {
				account_factories.insert(name.clone(), *factory);
			},
			None => {
				let mut available: Vec<_> = registry.account.keys().cloned().collect();
				available.sort();
				return Err(format!(
					"Unknown account implementation '{}'. Available: [{}]",
					name,
					available.join(", ")
				)
				.into());
			},
		}
	}

	let rpc_factory = *registry
		.rpc
		.get(DEFAULT_RPC)
		.ok_or_else(|| format!("RPC implementation '{}' is not registered", DEFAULT_RPC))?;

	let engine = RelayBuilder::new(config)
		.with_shutdown(shutdown)
		.build(RelayFactories {
			account_factories,
			rpc_factory,
		})
		.await?;
	Ok(engine)
}
