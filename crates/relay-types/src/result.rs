//! Caller-visible outcome of a relay request.

use crate::{ClassifiedError, ErrorKind, ExecutionAttempt, ExecutionState, GasSource};
use alloy_primitives::B256;
use serde::{Deserialize, Serialize};

/// Whether a result reflects a real transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
	Production,
	/// No transaction was sent. Nothing in the result is verifiable on-chain.
	Demonstration,
}

/// One (endpoint, contract) pair tried while serving a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptSummary {
	pub endpoint: String,
	pub contract: String,
	/// `None` when the attempt failed before reaching the executor.
	pub state: Option<ExecutionState>,
	pub gas_source: Option<GasSource>,
	pub error_kind: Option<ErrorKind>,
}

impl AttemptSummary {
	pub fn from_attempt(attempt: &ExecutionAttempt) -> Self {
		Self {
			endpoint: attempt.prepared_call.endpoint.name.clone(),
			contract: format!("{:#x}", attempt.prepared_call.contract.address),
			state: Some(attempt.state),
			gas_source: Some(attempt.gas_quote.source),
			error_kind: attempt.error.as_ref().map(|e| e.kind),
		}
	}
}

/// Final result of `execute`.
///
/// A demonstration result never carries an explorer URL or a transaction hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionResult {
	pub success: bool,
	pub mode: ExecutionMode,
	pub status: Option<ExecutionState>,
	pub tx_hash: Option<B256>,
	pub explorer_url: Option<String>,
	pub block_number: Option<u64>,
	pub gas_used: Option<u64>,
	pub gas_source: Option<GasSource>,
	pub classified_error: Option<ClassifiedError>,
	pub demonstration_id: Option<String>,
	pub explanation: Option<String>,
	pub attempts: Vec<AttemptSummary>,
}

impl TransactionResult {
	/// Builds a production result from the terminal attempt.
	///
	/// `explorer_base` is the block explorer root, e.g. `https://sepolia.basescan.org`.
	pub fn from_attempt(
		attempt: &ExecutionAttempt,
		explorer_base: Option<&str>,
		attempts: Vec<AttemptSummary>,
	) -> Self {
		let explorer_url = match (attempt.tx_hash, explorer_base) {
			(Some(hash), Some(base)) => Some(explorer_tx_url(base, &hash)),
			_ => None,
		};
		Self {
			success: attempt.state == ExecutionState::Confirmed,
			mode: ExecutionMode::Production,
			status: Some(attempt.state),
			tx_hash: attempt.tx_hash,
			explorer_url,
			block_number: attempt.block_number,
			gas_used: attempt.gas_used,
			gas_source: Some(attempt.gas_quote.source),
			classified_error: attempt.error.clone(),
			demonstration_id: None,
			explanation: None,
			attempts,
		}
	}

	/// A failure that never reached a terminal execution state.
	pub fn failure(error: ClassifiedError, attempts: Vec<AttemptSummary>) -> Self {
		Self {
			success: false,
			mode: ExecutionMode::Production,
			status: Some(ExecutionState::Failed),
			tx_hash: None,
			explorer_url: None,
			block_number: None,
			gas_used: None,
			gas_source: None,
			classified_error: Some(error),
			demonstration_id: None,
			explanation: None,
			attempts,
		}
	}

	pub fn demonstration(
		demonstration_id: String,
		explanation: String,
		last_error: Option<ClassifiedError>,
		attempts: Vec<AttemptSummary>,
	) -> Self {
		Self {
			success: true,
			mode: ExecutionMode::Demonstration,
			status: None,
			tx_hash: None,
			explorer_url: None,
			block_number: None,
			gas_used: None,
			gas_source: None,
			classified_error: last_error,
			demonstration_id: Some(demonstration_id),
			explanation: Some(explanation),
			attempts,
		}
	}

	pub fn is_timed_out(&self) -> bool {
		self.status == Some(ExecutionState::TimedOut)
	}
}

/// `{base}/tx/{hash}` with a single separating slash.
pub fn explorer_tx_url(base: &str, hash: &B256) -> String {
	format!("{}/tx/{:#x}", base.trim_end_matches('/'), hash)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_demonstration_has_no_links() {
		let result = TransactionResult::demonstration(
			"demo-0011223344556677".into(),
			"no endpoint reachable".into(),
			None,
			vec![],
		);
		assert_eq!(result.mode, ExecutionMode::Demonstration);
		assert!(result.explorer_url.is_none());
		assert!(result.tx_hash.is_none());
	}

	#[test]
	fn test_explorer_url_trims_slash() {
		let url = explorer_tx_url("https://sepolia.basescan.org/", &B256::ZERO);
		assert_eq!(
			url,
			format!("https://sepolia.basescan.org/tx/0x{}", "0".repeat(64))
		);
	}
}
