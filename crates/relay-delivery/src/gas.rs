//! Gas limit estimation with a deterministic fallback.

use crate::{classify, CallRequest, RpcInterface};
use relay_types::{truncate_id, ClassifiedError, ErrorKind, GasQuote, PreparedCall};
use tracing::instrument;

/// Kinds that end the attempt instead of falling back.
const SURFACED_KINDS: &[ErrorKind] = &[
	ErrorKind::Reverted,
	ErrorKind::InsufficientFunds,
	ErrorKind::EndpointUnavailable,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasEstimator {
	buffer_percent: u32,
	fallback_gas_limit: u64,
}

impl GasEstimator {
	pub fn new(buffer_percent: u32, fallback_gas_limit: u64) -> Self {
		Self {
			buffer_percent,
			fallback_gas_limit,
		}
	}

	/// A copy whose buffer is raised by `extra_percent`.
	pub fn bumped(&self, extra_percent: u32) -> Self {
		Self {
			buffer_percent: self.buffer_percent.saturating_add(extra_percent),
			..*self
		}
	}

	pub fn buffer_percent(&self) -> u32 {
		self.buffer_percent
	}

	/// Estimates `call` and applies the buffer.
	///
	/// A revert, an unfunded sender or an unreachable endpoint is returned as
	/// the error; any other estimation failure falls back to the configured
	/// fixed limit.
	#[instrument(skip_all, fields(endpoint = %call.endpoint.name, contract = %truncate_id(&format!("{:#x}", call.contract.address))))]
	pub async fn estimate(
		&self,
		rpc: &dyn RpcInterface,
		call: &PreparedCall,
	) -> Result<GasQuote, ClassifiedError> {
		let request = CallRequest {
			from: Some(call.caller_address),
			to: call.contract.address,
			data: call.calldata(),
			value: call.value,
		};

		match rpc.estimate_gas(&request).await {
			Ok(estimated) => {
				let quote = GasQuote::estimated(estimated, self.buffer_percent);
				tracing::debug!(estimated, buffered = quote.buffered, "Gas estimated");
				Ok(quote)
			},
			Err(e) => {
				let classified = classify(&e);
				if SURFACED_KINDS.contains(&classified.kind) {
					return Err(classified);
				}
				tracing::warn!(
					error = %e,
					fallback_gas_limit = self.fallback_gas_limit,
					"Gas estimation unavailable, using fallback limit"
				);
				Ok(GasQuote::fallback(self.fallback_gas_limit))
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::{prepared_call, MockRpc};
	use crate::ProviderError;
	use relay_types::GasSource;

	#[tokio::test]
	async fn test_applies_buffer() {
		let rpc = MockRpc::new("http://a", 84532);
		rpc.push_estimate(Ok(100_000));
		let quote = GasEstimator::new(20, 300_000)
			.estimate(&rpc, &prepared_call(&rpc))
			.await
			.unwrap();
		assert_eq!(quote.source, GasSource::Estimated);
		assert_eq!(quote.buffered, 120_000);
		assert!(quote.buffered as f64 >= 1.2 * quote.estimated as f64);
	}

	#[tokio::test]
	async fn test_unsupported_estimation_falls_back() {
		let rpc = MockRpc::new("http://a", 84532);
		rpc.push_estimate(Err(ProviderError::Rpc {
			code: -32601,
			message: "method not supported".into(),
			data: None,
		}));
		let quote = GasEstimator::new(20, 300_000)
			.estimate(&rpc, &prepared_call(&rpc))
			.await
			.unwrap();
		assert_eq!(quote, GasQuote::fallback(300_000));
	}

	#[tokio::test]
	async fn test_revert_is_surfaced() {
		let rpc = MockRpc::new("http://a", 84532);
		rpc.push_estimate(Err(ProviderError::Rpc {
			code: 3,
			message: "execution reverted: Sold out".into(),
			data: None,
		}));
		let err = GasEstimator::new(20, 300_000)
			.estimate(&rpc, &prepared_call(&rpc))
			.await
			.unwrap_err();
		assert_eq!(err.kind, ErrorKind::Reverted);
		assert_eq!(err.reason.as_deref(), Some("Sold out"));
	}

	#[tokio::test]
	async fn test_bumped_buffer() {
		let rpc = MockRpc::new("http://a", 84532);
		rpc.push_estimate(Ok(100_000));
		let estimator = GasEstimator::new(20, 300_000).bumped(20);
		assert_eq!(estimator.buffer_percent(), 40);
		let quote = estimator.estimate(&rpc, &prepared_call(&rpc)).await.unwrap();
		assert_eq!(quote.buffered, 140_000);
	}
}
