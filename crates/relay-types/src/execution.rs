//! Per-attempt execution types.
//!
//! A [`PreparedCall`] binds one intent to one (endpoint, contract) pair. The
//! gas estimator turns it into a [`GasQuote`] and the executor records what
//! happened to it in an [`ExecutionAttempt`].

use crate::{ClassifiedError, ContractTarget, RpcEndpoint};
use alloy_primitives::{Address, Bytes, Selector, B256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A fully bound call, immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedCall {
	pub endpoint: RpcEndpoint,
	pub contract: ContractTarget,
	pub function_selector: Selector,
	/// ABI-encoded arguments following the selector.
	pub encoded_args: Bytes,
	pub value: U256,
	pub caller_address: Address,
}

impl PreparedCall {
	/// Splits `calldata` into selector and arguments.
	///
	/// Returns `None` when the calldata is shorter than a selector.
	pub fn new(
		endpoint: RpcEndpoint,
		contract: ContractTarget,
		calldata: &[u8],
		value: U256,
		caller_address: Address,
	) -> Option<Self> {
		if calldata.len() < 4 {
			return None;
		}
		Some(Self {
			endpoint,
			contract,
			function_selector: Selector::from_slice(&calldata[..4]),
			encoded_args: Bytes::copy_from_slice(&calldata[4..]),
			value,
			caller_address,
		})
	}

	/// `selector ++ encoded_args`.
	pub fn calldata(&self) -> Bytes {
		let mut data = Vec::with_capacity(4 + self.encoded_args.len());
		data.extend_from_slice(self.function_selector.as_slice());
		data.extend_from_slice(&self.encoded_args);
		data.into()
	}
}

/// Where a gas limit came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GasSource {
	/// `eth_estimateGas` plus the configured buffer.
	Estimated,
	/// Estimation was unavailable; the configured constant was used.
	FallbackFixed,
	/// Supplied by the caller.
	Provided,
}

impl fmt::Display for GasSource {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			GasSource::Estimated => f.write_str("estimated"),
			GasSource::FallbackFixed => f.write_str("fallback_fixed"),
			GasSource::Provided => f.write_str("provided"),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasQuote {
	pub estimated: u64,
	/// Limit actually placed on the transaction.
	pub buffered: u64,
	pub source: GasSource,
}

impl GasQuote {
	/// `ceil(estimated * (100 + buffer_percent) / 100)`, saturating at `u64::MAX`.
	pub fn estimated(estimated: u64, buffer_percent: u32) -> Self {
		let numerator = estimated as u128 * (100 + buffer_percent as u128);
		let buffered = numerator.div_ceil(100);
		Self {
			estimated,
			buffered: u64::try_from(buffered).unwrap_or(u64::MAX),
			source: GasSource::Estimated,
		}
	}

	pub fn fallback(limit: u64) -> Self {
		Self {
			estimated: limit,
			buffered: limit,
			source: GasSource::FallbackFixed,
		}
	}

	pub fn provided(limit: u64) -> Self {
		Self {
			estimated: limit,
			buffered: limit,
			source: GasSource::Provided,
		}
	}
}

/// Lifecycle state of one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
	Prepared,
	Signed,
	Broadcast,
	Pending,
	Confirmed,
	Reverted,
	TimedOut,
	/// Failed before or during broadcast.
	Failed,
}

impl ExecutionState {
	pub fn is_terminal(&self) -> bool {
		matches!(
			self,
			ExecutionState::Confirmed
				| ExecutionState::Reverted
				| ExecutionState::TimedOut
				| ExecutionState::Failed
		)
	}
}

impl fmt::Display for ExecutionState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			ExecutionState::Prepared => "prepared",
			ExecutionState::Signed => "signed",
			ExecutionState::Broadcast => "broadcast",
			ExecutionState::Pending => "pending",
			ExecutionState::Confirmed => "confirmed",
			ExecutionState::Reverted => "reverted",
			ExecutionState::TimedOut => "timed_out",
			ExecutionState::Failed => "failed",
		};
		f.write_str(s)
	}
}

/// Record of one (endpoint, contract) attempt.
#[derive(Debug, Clone)]
pub struct ExecutionAttempt {
	pub prepared_call: PreparedCall,
	pub gas_quote: GasQuote,
	pub state: ExecutionState,
	pub tx_hash: Option<B256>,
	pub block_number: Option<u64>,
	pub gas_used: Option<u64>,
	pub error: Option<ClassifiedError>,
	/// States visited, in order, starting with `Prepared`.
	pub history: Vec<ExecutionState>,
}

impl ExecutionAttempt {
	pub fn new(prepared_call: PreparedCall, gas_quote: GasQuote) -> Self {
		Self {
			prepared_call,
			gas_quote,
			state: ExecutionState::Prepared,
			tx_hash: None,
			block_number: None,
			gas_used: None,
			error: None,
			history: vec![ExecutionState::Prepared],
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_buffer_rounds_up() {
		let quote = GasQuote::estimated(100_001, 20);
		// 120001.2 rounds up
		assert_eq!(quote.buffered, 120_002);
		assert_eq!(quote.source, GasSource::Estimated);

		let exact = GasQuote::estimated(100_000, 20);
		assert_eq!(exact.buffered, 120_000);
	}

	#[test]
	fn test_buffer_saturates() {
		let quote = GasQuote::estimated(u64::MAX, 500);
		assert_eq!(quote.buffered, u64::MAX);
	}

	#[test]
	fn test_fallback_and_provided_are_unbuffered() {
		assert_eq!(GasQuote::fallback(300_000).buffered, 300_000);
		assert_eq!(GasQuote::provided(90_000).source, GasSource::Provided);
	}

	#[test]
	fn test_prepared_call_splits_selector() {
		let endpoint = RpcEndpoint::new("a", "http://localhost:8545", 1);
		let contract = ContractTarget::unverified(Address::ZERO, "nft");
		let calldata = [0x40, 0xc1, 0x0f, 0x19, 0xaa, 0xbb];

		let call =
			PreparedCall::new(endpoint, contract, &calldata, U256::ZERO, Address::ZERO).unwrap();
		assert_eq!(call.function_selector.as_slice(), &calldata[..4]);
		assert_eq!(call.encoded_args.as_ref(), &[0xaa, 0xbb]);
		assert_eq!(call.calldata().as_ref(), &calldata);
	}

	#[test]
	fn test_prepared_call_rejects_short_calldata() {
		let endpoint = RpcEndpoint::new("a", "http://localhost:8545", 1);
		let contract = ContractTarget::unverified(Address::ZERO, "nft");
		assert!(PreparedCall::new(endpoint, contract, &[0x01], U256::ZERO, Address::ZERO).is_none());
	}

	#[test]
	fn test_terminal_states() {
		assert!(ExecutionState::Confirmed.is_terminal());
		assert!(ExecutionState::Failed.is_terminal());
		assert!(!ExecutionState::Pending.is_terminal());
	}
}
