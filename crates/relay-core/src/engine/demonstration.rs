//! Demonstration fallback.
//!
//! When no (endpoint, contract) pair can execute a request, the relay can
//! answer with a clearly labelled demonstration result instead of an error.
//! Its identifier is derived from the intent so repeated requests agree, and
//! it is shaped so that it cannot be mistaken for a transaction hash.

use alloy_primitives::keccak256;
use relay_types::{ClassifiedError, ErrorKind, TransactionIntent};

/// `"demo-"` followed by the first 16 hex digits of `keccak(to ++ data ++ value)`.
///
/// An absent `to` contributes no bytes.
pub fn demonstration_id(intent: &TransactionIntent) -> String {
	let mut preimage = Vec::with_capacity(20 + intent.data.len() + 32);
	if let Some(to) = intent.to {
		preimage.extend_from_slice(to.as_slice());
	}
	preimage.extend_from_slice(&intent.data);
	preimage.extend_from_slice(&intent.value.to_be_bytes::<32>());

	let digest = hex::encode(keccak256(&preimage));
	format!("demo-{}", &digest[..16])
}

pub fn explanation(chain_id: u64, last_error: Option<&ClassifiedError>, tried: usize) -> String {
	let cause = match last_error {
		None => format!("no RPC endpoint for chain {} is reachable", chain_id),
		Some(e) if e.kind == ErrorKind::EndpointUnavailable && tried == 0 => {
			format!("no RPC endpoint for chain {} is reachable", chain_id)
		},
		Some(e) => format!(
			"all {} endpoint and contract combinations failed; last error: {}",
			tried,
			e.user_message()
		),
	};
	format!(
		"Demonstration mode: no transaction was sent because {}. The demonstration id is not a \
		 transaction hash and cannot be looked up on a block explorer.",
		cause
	)
}

#[cfg(test)]
mod tests {
	use super::*;
	use relay_types::{Address, Bytes, U256};

	fn intent(to: Option<Address>, value: u64) -> TransactionIntent {
		TransactionIntent {
			to,
			data: Bytes::from_static(&[0xd8, 0x5d, 0x3d, 0x27]),
			value: U256::from(value),
			gas_limit: None,
		}
	}

	#[test]
	fn test_id_is_deterministic_and_not_a_hash() {
		let a = demonstration_id(&intent(Some(Address::ZERO), 0));
		let b = demonstration_id(&intent(Some(Address::ZERO), 0));
		assert_eq!(a, b);
		assert!(a.starts_with("demo-"));
		assert_eq!(a.len(), "demo-".len() + 16);
		assert!(!a.starts_with("0x"));
	}

	#[test]
	fn test_id_depends_on_every_field() {
		let base = demonstration_id(&intent(Some(Address::ZERO), 0));
		assert_ne!(base, demonstration_id(&intent(None, 0)));
		assert_ne!(base, demonstration_id(&intent(Some(Address::ZERO), 1)));
	}

	#[test]
	fn test_explanation_names_cause() {
		assert!(explanation(84532, None, 0).contains("chain 84532 is reachable"));
		let error = ClassifiedError::new(ErrorKind::ContractNotFound, "no code");
		let text = explanation(84532, Some(&error), 3);
		assert!(text.contains("all 3 endpoint and contract combinations failed"));
		assert!(text.contains("cannot be looked up"));
	}
}
