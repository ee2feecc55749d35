//! Transaction delivery for the relay.
//!
//! This crate owns everything that talks to a single JSON-RPC endpoint once it
//! has been chosen: the [`RpcInterface`] abstraction and its alloy-backed
//! implementation, gas estimation, the signing and confirmation state machine,
//! and the classifier that reduces provider failures to an [`ErrorKind`].
//!
//! [`ErrorKind`]: relay_types::ErrorKind

use async_trait::async_trait;
use relay_types::{
	Address, Bytes, ExecutionState, ImplementationRegistry, TransactionReceipt, B256, U256,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub mod classifier;
pub mod executor;
pub mod gas;
pub mod receipt;

pub mod implementations {
	pub mod evm {
		pub mod alloy;
	}
}

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use classifier::{classify, classify_onchain_revert};
pub use executor::TransactionExecutor;
pub use gas::GasEstimator;
pub use receipt::{wait_for_receipt, ReceiptOutcome};

/// A failed JSON-RPC interaction, before classification.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
	/// The call did not complete within its deadline.
	#[error("Request timed out: {0}")]
	Timeout(String),
	/// Connection refused, DNS failure, or an HTTP-level error status.
	#[error("Connection error: {0}")]
	Connection(String),
	/// The endpoint answered with a JSON-RPC error object.
	#[error("RPC error {code}: {message}")]
	Rpc {
		code: i64,
		message: String,
		/// Decoded `data` member, usually ABI-encoded revert data.
		data: Option<Bytes>,
	},
	/// Anything else: malformed responses, serialization failures.
	#[error("Provider error: {0}")]
	Other(String),
}

#[derive(Debug, Error)]
pub enum DeliveryError {
	#[error("Invalid state transition from {from} to {to}")]
	InvalidTransition {
		from: ExecutionState,
		to: ExecutionState,
	},
	#[error("Invalid endpoint URL: {0}")]
	InvalidUrl(String),
	#[error("Account error: {0}")]
	Account(String),
}

/// Read-only call parameters for `eth_call` and `eth_estimateGas`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
	pub from: Option<Address>,
	pub to: Address,
	pub data: Bytes,
	pub value: U256,
}

/// The JSON-RPC surface the pipeline consumes.
///
/// Every method is bounded by the implementation's request timeout and
/// reports a [`ProviderError`] rather than blocking indefinitely.
#[async_trait]
pub trait RpcInterface: Send + Sync {
	fn url(&self) -> &str;

	/// `eth_chainId`
	async fn chain_id(&self) -> Result<u64, ProviderError>;

	/// `eth_getCode` at the latest block.
	async fn get_code(&self, address: Address) -> Result<Bytes, ProviderError>;

	/// `eth_call` at the latest block.
	async fn call(&self, request: &CallRequest) -> Result<Bytes, ProviderError>;

	/// `eth_estimateGas`
	async fn estimate_gas(&self, request: &CallRequest) -> Result<u64, ProviderError>;

	/// `eth_getTransactionCount` at the pending block.
	async fn get_transaction_count(&self, address: Address) -> Result<u64, ProviderError>;

	/// `eth_getBalance`
	async fn get_balance(&self, address: Address) -> Result<U256, ProviderError>;

	/// `eth_gasPrice`
	async fn gas_price(&self) -> Result<u128, ProviderError>;

	/// `eth_sendRawTransaction`, returning the hash the node reports.
	async fn send_raw_transaction(&self, raw: &Bytes) -> Result<B256, ProviderError>;

	/// `eth_getTransactionReceipt`; `None` while the transaction is unmined.
	async fn get_transaction_receipt(
		&self,
		hash: B256,
	) -> Result<Option<TransactionReceipt>, ProviderError>;

	/// `eth_blockNumber`
	async fn block_number(&self) -> Result<u64, ProviderError>;
}

/// Builds a client for one endpoint URL with the given per-request timeout.
pub type RpcFactory = fn(&str, Duration) -> Result<Arc<dyn RpcInterface>, DeliveryError>;

pub trait RpcRegistry: ImplementationRegistry<Factory = RpcFactory> {}

pub fn get_all_implementations() -> Vec<(&'static str, RpcFactory)> {
	use implementations::evm::alloy;

	vec![(alloy::Registry::NAME, alloy::Registry::factory())]
}
