//! Transaction delivery types.
//!
//! These sit at the boundary between the executor and the signing account or
//! the RPC transport, so they carry plain values rather than alloy request
//! builders.

use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

/// A legacy transaction ready to be signed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedTransaction {
	pub chain_id: u64,
	pub nonce: u64,
	/// Gas price in wei.
	pub gas_price: u128,
	pub gas_limit: u64,
	pub to: Address,
	pub value: U256,
	pub input: Bytes,
}

impl UnsignedTransaction {
	/// Upper bound of what this transaction can cost the sender.
	pub fn max_cost(&self) -> U256 {
		U256::from(self.gas_price)
			.saturating_mul(U256::from(self.gas_limit))
			.saturating_add(self.value)
	}
}

/// An EIP-2718 encoded, signed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
	pub hash: B256,
	pub raw: Bytes,
}

/// Receipt of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
	pub hash: B256,
	pub block_number: u64,
	pub gas_used: u64,
	/// Receipt status; false means the transaction reverted on-chain.
	pub success: bool,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_max_cost() {
		let tx = UnsignedTransaction {
			chain_id: 1,
			nonce: 0,
			gas_price: 10,
			gas_limit: 21_000,
			to: Address::ZERO,
			value: U256::from(5u64),
			input: Bytes::new(),
		};
		assert_eq!(tx.max_cost(), U256::from(210_005u64));
	}
}
