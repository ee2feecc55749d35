//! HTTP API bodies.
//!
//! Field names are camelCase on the wire. Optional response fields are
//! omitted when absent, except `transactionHash` and `explorerUrl`, which are
//! always present so that clients can tell a demonstration apart by the
//! explicit `null`.

use crate::{ExecutionMode, ExecutionState, GasSource, RpcEndpoint, TransactionResult};
use serde::{Deserialize, Serialize};

/// Body of `POST /execute-transaction`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteTransactionRequest {
	#[serde(default)]
	pub to: Option<String>,
	pub data: String,
	/// Wei, as a decimal or `0x` hex string.
	#[serde(default)]
	pub value: Option<String>,
	#[serde(default)]
	pub gas_limit: Option<u64>,
}

/// Successful (200) or timed-out (202) response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteTransactionResponse {
	pub success: bool,
	pub mode: ExecutionMode,
	pub transaction_hash: Option<String>,
	pub explorer_url: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub status: Option<ExecutionState>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub block_number: Option<u64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub gas_used: Option<u64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub gas_source: Option<GasSource>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub demonstration_id: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub explanation: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

impl From<&TransactionResult> for ExecuteTransactionResponse {
	fn from(result: &TransactionResult) -> Self {
		// a timed-out result reports its explanation as the error
		let timed_out = result.is_timed_out();
		Self {
			success: result.success,
			mode: result.mode,
			transaction_hash: result.tx_hash.map(|h| format!("{:#x}", h)),
			explorer_url: result.explorer_url.clone(),
			status: result.status,
			block_number: result.block_number,
			gas_used: result.gas_used,
			gas_source: result.gas_source,
			demonstration_id: result.demonstration_id.clone(),
			explanation: result.explanation.clone().filter(|_| !timed_out),
			error: result.explanation.clone().filter(|_| timed_out),
		}
	}
}

/// Body returned with every 4xx/5xx status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
	pub success: bool,
	pub error: String,
	pub classified_kind: String,
	pub status_code: u16,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub transaction_hash: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub reason: Option<String>,
}

impl ErrorResponse {
	pub fn new(error: impl Into<String>, classified_kind: impl Into<String>, status_code: u16) -> Self {
		Self {
			success: false,
			error: error.into(),
			classified_kind: classified_kind.into(),
			status_code,
			transaction_hash: None,
			reason: None,
		}
	}

	/// Maps a failed result to its error body, or `None` for a non-failure.
	pub fn from_result(result: &TransactionResult) -> Option<Self> {
		if result.success || result.is_timed_out() {
			return None;
		}
		let error = result.classified_error.as_ref()?;
		Some(Self {
			success: false,
			error: error.user_message(),
			classified_kind: error.kind.to_string(),
			status_code: error.http_status(),
			transaction_hash: result.tx_hash.map(|h| format!("{:#x}", h)),
			reason: error.reason.clone(),
		})
	}
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
	pub chain_id: u64,
	pub online: usize,
	pub endpoints: Vec<RpcEndpoint>,
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{ClassifiedError, ErrorKind};

	#[test]
	fn test_request_accepts_camel_case() {
		let request: ExecuteTransactionRequest =
			serde_json::from_str(r#"{"data":"0x40c10f19","gasLimit":100000}"#).unwrap();
		assert_eq!(request.gas_limit, Some(100_000));
		assert!(request.to.is_none());
	}

	#[test]
	fn test_demonstration_serializes_null_links() {
		let result = TransactionResult::demonstration("demo-1".into(), "offline".into(), None, vec![]);
		let json = serde_json::to_value(ExecuteTransactionResponse::from(&result)).unwrap();
		assert_eq!(json["mode"], "demonstration");
		assert!(json["transactionHash"].is_null());
		assert!(json["explorerUrl"].is_null());
		assert_eq!(json["demonstrationId"], "demo-1");
		assert!(json.get("blockNumber").is_none());
	}

	#[test]
	fn test_error_response_from_failure() {
		let error = ClassifiedError::new(ErrorKind::InsufficientFunds, "balance 0");
		let result = TransactionResult::failure(error, vec![]);
		let body = ErrorResponse::from_result(&result).unwrap();
		assert_eq!(body.status_code, 402);
		assert_eq!(body.classified_kind, "insufficient_funds");
		assert!(!body.success);
	}

	#[test]
	fn test_timed_out_reports_error() {
		let mut result = TransactionResult::failure(ClassifiedError::new(ErrorKind::Unknown, "x"), vec![]);
		result.status = Some(ExecutionState::TimedOut);
		result.classified_error = None;
		result.explanation = Some("Transaction is still pending".into());

		assert!(ErrorResponse::from_result(&result).is_none());
		let json = serde_json::to_value(ExecuteTransactionResponse::from(&result)).unwrap();
		assert_eq!(json["status"], "timed_out");
		assert_eq!(json["error"], "Transaction is still pending");
		assert!(json.get("explanation").is_none());
	}
}
