//! JSON-RPC client backed by an alloy HTTP provider.
//!
//! The provider is a bare `RootProvider` with no fillers or wallet: nonce,
//! gas and signing are handled by the executor so that every step is
//! observable and classifiable.

use crate::{CallRequest, DeliveryError, ProviderError, RpcFactory, RpcInterface, RpcRegistry};
use alloy_provider::{Provider, RootProvider};
use alloy_rpc_types::TransactionRequest;
use alloy_transport::{RpcError, TransportError, TransportErrorKind};
use alloy_transport_http::Http;
use async_trait::async_trait;
use relay_types::{
	Address, Bytes, ImplementationRegistry, TransactionReceipt, B256, U256,
};
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

pub struct AlloyRpc {
	url: String,
	provider: RootProvider<Http<reqwest::Client>>,
	request_timeout: Duration,
}

impl AlloyRpc {
	pub fn new(url: &str, request_timeout: Duration) -> Result<Self, DeliveryError> {
		let parsed: reqwest::Url = url
			.parse()
			.map_err(|e| DeliveryError::InvalidUrl(format!("{}: {}", url, e)))?;
		let provider: RootProvider<Http<reqwest::Client>> = RootProvider::new_http(parsed);

		Ok(Self {
			url: url.to_string(),
			provider,
			request_timeout,
		})
	}

	/// Runs one provider call under the request deadline.
	async fn timed<T, F>(&self, method: &'static str, call: F) -> Result<T, ProviderError>
	where
		F: IntoFuture<Output = Result<T, TransportError>>,
	{
		match tokio::time::timeout(self.request_timeout, call).await {
			Ok(result) => result.map_err(map_transport_error),
			Err(_) => Err(ProviderError::Timeout(format!(
				"{} timed out after {}s",
				method,
				self.request_timeout.as_secs()
			))),
		}
	}
}

fn to_request(request: &CallRequest) -> TransactionRequest {
	let mut tx = TransactionRequest::default()
		.to(request.to)
		.input(request.data.clone().into())
		.value(request.value);
	if let Some(from) = request.from {
		tx = tx.from(from);
	}
	tx
}

/// Revert data arrives as a JSON string of hex.
fn decode_error_data(raw: &serde_json::value::RawValue) -> Option<Bytes> {
	let text: String = serde_json::from_str(raw.get()).ok()?;
	let bytes = hex::decode(relay_types::without_0x_prefix(&text)).ok()?;
	Some(bytes.into())
}

fn map_transport_error(err: TransportError) -> ProviderError {
	match err {
		RpcError::ErrorResp(payload) => ProviderError::Rpc {
			code: payload.code,
			message: payload.message.to_string(),
			data: payload.data.as_deref().and_then(decode_error_data),
		},
		RpcError::Transport(kind) => match kind {
			TransportErrorKind::HttpError(http) => ProviderError::Connection(format!(
				"HTTP error {} with body: {}",
				http.status, http.body
			)),
			other => ProviderError::Connection(other.to_string()),
		},
		RpcError::NullResp => ProviderError::Other("Null response from endpoint".to_string()),
		other => ProviderError::Other(other.to_string()),
	}
}

#[async_trait]
impl RpcInterface for AlloyRpc {
	fn url(&self) -> &str {
		&self.url
	}

	async fn chain_id(&self) -> Result<u64, ProviderError> {
		self.timed("eth_chainId", self.provider.get_chain_id()).await
	}

	async fn get_code(&self, address: Address) -> Result<Bytes, ProviderError> {
		self.timed("eth_getCode", self.provider.get_code_at(address))
			.await
	}

	async fn call(&self, request: &CallRequest) -> Result<Bytes, ProviderError> {
		let tx = to_request(request);
		self.timed("eth_call", self.provider.call(&tx)).await
	}

	async fn estimate_gas(&self, request: &CallRequest) -> Result<u64, ProviderError> {
		let tx = to_request(request);
		self.timed("eth_estimateGas", self.provider.estimate_gas(&tx))
			.await
	}

	async fn get_transaction_count(&self, address: Address) -> Result<u64, ProviderError> {
		self.timed(
			"eth_getTransactionCount",
			self.provider.get_transaction_count(address).pending(),
		)
		.await
	}

	async fn get_balance(&self, address: Address) -> Result<U256, ProviderError> {
		self.timed("eth_getBalance", self.provider.get_balance(address))
			.await
	}

	async fn gas_price(&self) -> Result<u128, ProviderError> {
		self.timed("eth_gasPrice", self.provider.get_gas_price())
			.await
	}

	async fn send_raw_transaction(&self, raw: &Bytes) -> Result<B256, ProviderError> {
		let pending = self
			.timed(
				"eth_sendRawTransaction",
				self.provider.send_raw_transaction(raw),
			)
			.await?;
		Ok(*pending.tx_hash())
	}

	async fn get_transaction_receipt(
		&self,
		hash: B256,
	) -> Result<Option<TransactionReceipt>, ProviderError> {
		let receipt = self
			.timed(
				"eth_getTransactionReceipt",
				self.provider.get_transaction_receipt(hash),
			)
			.await?;

		Ok(receipt.and_then(|r| {
			// A receipt without a block number belongs to a pending block.
			let block_number = r.block_number?;
			Some(TransactionReceipt {
				hash: r.transaction_hash,
				block_number,
				gas_used: r.gas_used as u64,
				success: r.status(),
			})
		}))
	}

	async fn block_number(&self) -> Result<u64, ProviderError> {
		self.timed("eth_blockNumber", self.provider.get_block_number())
			.await
	}
}

pub fn create_rpc(
	url: &str,
	request_timeout: Duration,
) -> Result<Arc<dyn RpcInterface>, DeliveryError> {
	Ok(Arc::new(AlloyRpc::new(url, request_timeout)?))
}

pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "evm_alloy";
	type Factory = RpcFactory;

	fn factory() -> Self::Factory {
		create_rpc
	}
}

impl RpcRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_rejects_invalid_url() {
		assert!(matches!(
			AlloyRpc::new("not a url", Duration::from_secs(1)),
			Err(DeliveryError::InvalidUrl(_))
		));
		assert!(AlloyRpc::new("http://localhost:8545", Duration::from_secs(1)).is_ok());
	}

	#[test]
	fn test_error_response_keeps_revert_data() {
		let payload = alloy_json_rpc::ErrorPayload {
			code: 3,
			message: "execution reverted: Sold out".into(),
			data: Some(
				serde_json::value::RawValue::from_string("\"0xdeadbeef\"".to_string()).unwrap(),
			),
		};
		let mapped = map_transport_error(RpcError::ErrorResp(payload));
		assert_eq!(
			mapped,
			ProviderError::Rpc {
				code: 3,
				message: "execution reverted: Sold out".into(),
				data: Some(Bytes::from_static(&[0xde, 0xad, 0xbe, 0xef])),
			}
		);
	}

	#[tokio::test]
	async fn test_unreachable_endpoint_is_connection_error() {
		// Port 9 (discard) is closed on any sane test host.
		let rpc = AlloyRpc::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
		let err = rpc.chain_id().await.unwrap_err();
		assert!(matches!(
			err,
			ProviderError::Connection(_) | ProviderError::Timeout(_)
		));
	}
}
