//! Contract target types.
//!
//! A [`ContractTarget`] is the outcome of resolving a candidate address on a
//! particular endpoint: whether code is deployed there and which of the
//! required selectors it answers to.

use alloy_primitives::{keccak256, Address, Selector};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A contract address that has been checked against an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractTarget {
	pub address: Address,
	pub label: String,
	/// `eth_getCode` returned non-empty bytecode.
	pub bytecode_verified: bool,
	/// Selectors confirmed present by probing.
	pub supported_functions: BTreeSet<Selector>,
}

impl ContractTarget {
	/// An unverified target, as read from configuration.
	pub fn unverified(address: Address, label: impl Into<String>) -> Self {
		Self {
			address,
			label: label.into(),
			bytecode_verified: false,
			supported_functions: BTreeSet::new(),
		}
	}

	pub fn supports(&self, selector: &Selector) -> bool {
		self.supported_functions.contains(selector)
	}

	/// True when code is deployed and every selector in `required` is present.
	pub fn satisfies(&self, required: &[Selector]) -> bool {
		self.bytecode_verified && required.iter().all(|s| self.supports(s))
	}
}

/// Parses a function selector.
///
/// Accepts either four hex-encoded bytes (`0x40c10f19`) or a canonical
/// Solidity signature (`mint(address,uint256)`), in which case the selector
/// is the first four bytes of its keccak-256 hash.
pub fn parse_selector(input: &str) -> Result<Selector, String> {
	let trimmed = input.trim();
	if trimmed.contains('(') {
		if !trimmed.ends_with(')') || trimmed.contains(' ') {
			return Err(format!("Invalid function signature: {}", input));
		}
		let hash = keccak256(trimmed.as_bytes());
		return Ok(Selector::from_slice(&hash[..4]));
	}

	let hex_part = crate::without_0x_prefix(trimmed);
	if hex_part.len() != 8 {
		return Err(format!("Selector must be 4 bytes of hex: {}", input));
	}
	let bytes = hex::decode(hex_part).map_err(|e| format!("Invalid selector {}: {}", input, e))?;
	Ok(Selector::from_slice(&bytes))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_parse_selector_from_hex() {
		let selector = parse_selector("0x40c10f19").unwrap();
		assert_eq!(selector.as_slice(), &[0x40, 0xc1, 0x0f, 0x19]);
	}

	#[test]
	fn test_parse_selector_from_signature() {
		// transfer(address,uint256) is the well known 0xa9059cbb
		let selector = parse_selector("transfer(address,uint256)").unwrap();
		assert_eq!(selector, parse_selector("0xa9059cbb").unwrap());
	}

	#[test]
	fn test_parse_selector_rejects_garbage() {
		assert!(parse_selector("0x1234").is_err());
		assert!(parse_selector("mint(address").is_err());
		assert!(parse_selector("0xzzzzzzzz").is_err());
	}

	#[test]
	fn test_satisfies_requires_code_and_selectors() {
		let mint = parse_selector("mint(address,string)").unwrap();
		let mut target = ContractTarget::unverified(Address::ZERO, "nft");
		assert!(!target.satisfies(&[]));

		target.bytecode_verified = true;
		assert!(target.satisfies(&[]));
		assert!(!target.satisfies(&[mint]));

		target.supported_functions.insert(mint);
		assert!(target.satisfies(&[mint]));
	}
}
