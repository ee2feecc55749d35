//! Failure taxonomy.
//!
//! Every failure observed by the pipeline, whether raised by an RPC endpoint,
//! a gas estimate, a broadcast, or an on-chain receipt, is reduced to one
//! [`ErrorKind`]. The kind drives the controller's next move and the HTTP
//! status returned to the caller.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of a failed execution step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
	/// The signing account cannot cover value plus gas.
	InsufficientFunds,
	/// Nonce too low, already known, or replacement underpriced.
	NonceConflict,
	/// Fee market rejected the price or the pool is full.
	GasCongestion,
	/// Execution reverted, either during simulation or on-chain.
	Reverted,
	/// No code at the address, or the selector is missing.
	ContractNotFound,
	/// Timeout, connection refusal, or upstream 5xx / 429.
	EndpointUnavailable,
	/// Anything not matched by a more specific rule.
	Unknown,
}

impl ErrorKind {
	/// Kinds that are always worth another attempt somewhere else.
	pub fn default_retryable(&self) -> bool {
		matches!(
			self,
			ErrorKind::NonceConflict
				| ErrorKind::GasCongestion
				| ErrorKind::ContractNotFound
				| ErrorKind::EndpointUnavailable
		)
	}

	/// HTTP status used when this kind is the final outcome of a request.
	pub fn http_status(&self) -> u16 {
		match self {
			ErrorKind::InsufficientFunds => 402,
			ErrorKind::NonceConflict => 409,
			ErrorKind::GasCongestion | ErrorKind::EndpointUnavailable => 503,
			ErrorKind::Reverted => 422,
			ErrorKind::ContractNotFound => 404,
			ErrorKind::Unknown => 500,
		}
	}
}

impl fmt::Display for ErrorKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			ErrorKind::InsufficientFunds => "insufficient_funds",
			ErrorKind::NonceConflict => "nonce_conflict",
			ErrorKind::GasCongestion => "gas_congestion",
			ErrorKind::Reverted => "reverted",
			ErrorKind::ContractNotFound => "contract_not_found",
			ErrorKind::EndpointUnavailable => "endpoint_unavailable",
			ErrorKind::Unknown => "unknown",
		};
		f.write_str(s)
	}
}

/// A failure together with the evidence it was classified from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedError {
	pub kind: ErrorKind,
	/// Message as reported by the endpoint or the local pipeline.
	pub raw_message: String,
	/// Whether another endpoint or contract may succeed.
	pub retryable: bool,
	/// Decoded revert reason, when one was available.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub reason: Option<String>,
}

impl ClassifiedError {
	pub fn new(kind: ErrorKind, raw_message: impl Into<String>) -> Self {
		Self {
			kind,
			raw_message: raw_message.into(),
			retryable: kind.default_retryable(),
			reason: None,
		}
	}

	pub fn with_retryable(mut self, retryable: bool) -> Self {
		self.retryable = retryable;
		self
	}

	pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
		self.reason = Some(reason.into());
		self
	}

	/// Operator-facing sentence describing the failure.
	pub fn user_message(&self) -> String {
		match self.kind {
			ErrorKind::InsufficientFunds => format!(
				"Relayer account has insufficient funds for gas and value: {}",
				self.raw_message
			),
			ErrorKind::NonceConflict => {
				"Transaction nonce conflicted with a pending transaction".to_string()
			},
			ErrorKind::GasCongestion => {
				"Network is congested and the fee offered was rejected".to_string()
			},
			ErrorKind::Reverted => match &self.reason {
				Some(reason) => format!("Transaction reverted: {}", reason),
				None => "Transaction reverted without a reason".to_string(),
			},
			ErrorKind::ContractNotFound => {
				"No usable contract found at the configured addresses".to_string()
			},
			ErrorKind::EndpointUnavailable => "No RPC endpoint is currently reachable".to_string(),
			ErrorKind::Unknown => format!("Transaction failed: {}", self.raw_message),
		}
	}

	pub fn http_status(&self) -> u16 {
		self.kind.http_status()
	}
}

impl fmt::Display for ClassifiedError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}: {}", self.kind, self.raw_message)
	}
}

impl std::error::Error for ClassifiedError {}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_status_mapping() {
		assert_eq!(ErrorKind::InsufficientFunds.http_status(), 402);
		assert_eq!(ErrorKind::NonceConflict.http_status(), 409);
		assert_eq!(ErrorKind::GasCongestion.http_status(), 503);
		assert_eq!(ErrorKind::EndpointUnavailable.http_status(), 503);
		assert_eq!(ErrorKind::Reverted.http_status(), 422);
		assert_eq!(ErrorKind::ContractNotFound.http_status(), 404);
		assert_eq!(ErrorKind::Unknown.http_status(), 500);
	}

	#[test]
	fn test_default_retryability() {
		assert!(!ClassifiedError::new(ErrorKind::InsufficientFunds, "x").retryable);
		assert!(ClassifiedError::new(ErrorKind::NonceConflict, "x").retryable);
		assert!(!ClassifiedError::new(ErrorKind::Unknown, "x").retryable);
		assert!(
			ClassifiedError::new(ErrorKind::Reverted, "x")
				.with_retryable(true)
				.retryable
		);
	}

	#[test]
	fn test_user_message_includes_reason() {
		let err = ClassifiedError::new(ErrorKind::Reverted, "execution reverted")
			.with_reason("Max supply reached");
		assert_eq!(err.user_message(), "Transaction reverted: Max supply reached");
	}
}
