//! Signing accounts for the relay.
//!
//! An [`AccountInterface`] turns an [`UnsignedTransaction`] into raw signed
//! bytes without touching the network. The [`AccountService`] wraps the
//! configured implementation and owns the signing lane: the executor holds the
//! lane from the nonce read until the attempt reaches a terminal state, so two
//! requests can never race for the same nonce.

use async_trait::async_trait;
use relay_types::{
	Address, ConfigSchema, ImplementationRegistry, SignedTransaction, UnsignedTransaction,
};
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};

pub mod implementations {
	pub mod local;
}

#[derive(Debug, Error)]
pub enum AccountError {
	#[error("Signing failed: {0}")]
	SigningFailed(String),
	#[error("Invalid key: {0}")]
	InvalidKey(String),
	#[error("Implementation error: {0}")]
	Implementation(String),
}

#[async_trait]
pub trait AccountInterface: Send + Sync {
	/// Schema of this implementation's `[account.implementations.<name>]` table.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	async fn address(&self) -> Result<Address, AccountError>;

	/// Signs and EIP-2718 encodes `tx`.
	async fn sign_transaction(
		&self,
		tx: &UnsignedTransaction,
	) -> Result<SignedTransaction, AccountError>;
}

pub type AccountFactory = fn(&toml::Value) -> Result<Box<dyn AccountInterface>, AccountError>;

pub trait AccountRegistry: ImplementationRegistry<Factory = AccountFactory> {}

/// Every compiled-in implementation as `(config name, factory)`.
pub fn get_all_implementations() -> Vec<(&'static str, AccountFactory)> {
	use implementations::local;

	vec![(local::Registry::NAME, local::Registry::factory())]
}

/// Looks up `name` among the compiled-in implementations and builds it.
pub fn create_account(
	name: &str,
	config: &toml::Value,
) -> Result<Box<dyn AccountInterface>, AccountError> {
	let factory = get_all_implementations()
		.into_iter()
		.find(|(n, _)| *n == name)
		.map(|(_, f)| f)
		.ok_or_else(|| {
			AccountError::Implementation(format!("Unknown account implementation '{}'", name))
		})?;
	factory(config)
}

/// The process-wide signer plus its signing lane.
pub struct AccountService {
	implementation: Box<dyn AccountInterface>,
	lane: Mutex<()>,
}

impl AccountService {
	pub fn new(implementation: Box<dyn AccountInterface>) -> Self {
		Self {
			implementation,
			lane: Mutex::new(()),
		}
	}

	pub async fn get_address(&self) -> Result<Address, AccountError> {
		self.implementation.address().await
	}

	pub async fn sign(&self, tx: &UnsignedTransaction) -> Result<SignedTransaction, AccountError> {
		self.implementation.sign_transaction(tx).await
	}

	/// Waits for exclusive use of the signer.
	///
	/// Hold the guard for the whole attempt: nonce read, sign, broadcast and
	/// receipt wait.
	pub async fn acquire_lane(&self) -> MutexGuard<'_, ()> {
		self.lane.lock().await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::Arc;
	use std::time::Duration;

	const KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

	fn local_config() -> toml::Value {
		let mut table = toml::map::Map::new();
		table.insert("private_key".into(), toml::Value::String(KEY.into()));
		toml::Value::Table(table)
	}

	#[test]
	fn test_create_account_by_name() {
		assert!(create_account("local", &local_config()).is_ok());
		assert!(matches!(
			create_account("kms", &local_config()),
			Err(AccountError::Implementation(_))
		));
	}

	#[tokio::test(start_paused = true)]
	async fn test_lane_is_exclusive() {
		let service = Arc::new(AccountService::new(
			create_account("local", &local_config()).unwrap(),
		));

		let guard = service.acquire_lane().await;
		let contender = {
			let service = service.clone();
			tokio::spawn(async move {
				let _guard = service.acquire_lane().await;
			})
		};

		tokio::time::sleep(Duration::from_millis(50)).await;
		assert!(!contender.is_finished());

		drop(guard);
		contender.await.unwrap();
	}
}
