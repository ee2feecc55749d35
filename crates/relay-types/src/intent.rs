//! Transaction intents.
//!
//! An intent is what a caller wants executed. It arrives as loosely typed
//! JSON, either directly on `/execute-transaction` or from the preparation
//! service, and is validated into a [`TransactionIntent`] before any network
//! call is made.

use crate::api::ExecuteTransactionRequest;
use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Reasons an intent is rejected before execution.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IntentError {
	#[error("Invalid target address: {0}")]
	InvalidAddress(String),
	#[error("Missing field: {0}")]
	MissingField(&'static str),
	#[error("Calldata must be 0x-prefixed hex: {0}")]
	InvalidCalldata(String),
	#[error("Calldata must contain at least a 4-byte function selector")]
	CalldataTooShort,
	#[error("Invalid value: {0}")]
	InvalidValue(String),
	#[error("Gas limit must be greater than zero")]
	ZeroGasLimit,
}

/// A validated request to execute one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionIntent {
	/// Explicit target. When absent the configured contracts are tried in order.
	pub to: Option<Address>,
	pub data: Bytes,
	pub value: U256,
	/// Caller-supplied gas limit; skips estimation when set.
	pub gas_limit: Option<u64>,
}

impl TransactionIntent {
	/// First four calldata bytes, zero-filled if the calldata is shorter.
	pub fn selector(&self) -> [u8; 4] {
		let mut out = [0u8; 4];
		if let Some(head) = self.data.get(..4) {
			out.copy_from_slice(head);
		}
		out
	}
}

/// Output of the preparation service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparedIntent {
	pub to: Option<String>,
	pub data: Option<String>,
	pub value: Option<String>,
}

fn parse_address(raw: &str) -> Result<Address, IntentError> {
	let trimmed = raw.trim();
	if !trimmed.starts_with("0x") && !trimmed.starts_with("0X") {
		return Err(IntentError::InvalidAddress(raw.to_string()));
	}
	Address::from_str(trimmed).map_err(|_| IntentError::InvalidAddress(raw.to_string()))
}

fn parse_calldata(raw: &str) -> Result<Bytes, IntentError> {
	let trimmed = raw.trim();
	let hex_part = trimmed
		.strip_prefix("0x")
		.or_else(|| trimmed.strip_prefix("0X"))
		.ok_or_else(|| IntentError::InvalidCalldata(raw.to_string()))?;
	let bytes = hex::decode(hex_part).map_err(|_| IntentError::InvalidCalldata(raw.to_string()))?;
	if bytes.len() < 4 {
		return Err(IntentError::CalldataTooShort);
	}
	Ok(bytes.into())
}

/// Accepts decimal or `0x` hex wei amounts.
fn parse_value(raw: Option<&str>) -> Result<U256, IntentError> {
	let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
		return Ok(U256::ZERO);
	};
	let parsed = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
		Some(hex_part) => U256::from_str_radix(hex_part, 16),
		None => U256::from_str_radix(raw, 10),
	};
	parsed.map_err(|_| IntentError::InvalidValue(raw.to_string()))
}

impl TryFrom<ExecuteTransactionRequest> for TransactionIntent {
	type Error = IntentError;

	fn try_from(request: ExecuteTransactionRequest) -> Result<Self, Self::Error> {
		let to = request.to.as_deref().map(parse_address).transpose()?;
		let data = parse_calldata(&request.data)?;
		let value = parse_value(request.value.as_deref())?;
		if request.gas_limit == Some(0) {
			return Err(IntentError::ZeroGasLimit);
		}
		Ok(Self {
			to,
			data,
			value,
			gas_limit: request.gas_limit,
		})
	}
}

impl TryFrom<PreparedIntent> for TransactionIntent {
	type Error = IntentError;

	/// Prepared intents must name their target.
	fn try_from(prepared: PreparedIntent) -> Result<Self, Self::Error> {
		let to = prepared.to.as_deref().ok_or(IntentError::MissingField("to"))?;
		let data = prepared
			.data
			.as_deref()
			.ok_or(IntentError::MissingField("data"))?;
		Ok(Self {
			to: Some(parse_address(to)?),
			data: parse_calldata(data)?,
			value: parse_value(prepared.value.as_deref())?,
			gas_limit: None,
		})
	}
}
