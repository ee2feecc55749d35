//! Failure classification.
//!
//! [`classify`] is total: every [`ProviderError`] maps to exactly one
//! [`ErrorKind`]. The mapping is an ordered rule table; the first rule whose
//! matcher accepts the evidence wins.

use crate::ProviderError;
use alloy_sol_types::decode_revert_reason;
use once_cell::sync::Lazy;
use regex::Regex;
use relay_types::{ClassifiedError, ErrorKind};

/// JSON-RPC error code geth and most clients use for execution reverts.
const REVERT_CODE: i64 = 3;

/// Revert reasons that describe a caller or contract state that may change,
/// rather than a permanent business rule.
const TRANSIENT_REVERT_MARKERS: &[&str] = &[
	"not the owner",
	"unauthorized",
	"not authorized",
	"accesscontrol",
	"missing role",
	"paused",
];

const ENDPOINT_MARKERS: &[&str] = &[
	"timeout",
	"timed out",
	"connection refused",
	"connection reset",
	"error sending request",
	"dns",
	"rate limit",
	"too many requests",
	"service unavailable",
	"bad gateway",
];

const CONGESTION_MARKERS: &[&str] = &[
	"underpriced",
	"base fee",
	"fee cap",
	"too low",
	"txpool is full",
	"congest",
];

const CONTRACT_MARKERS: &[&str] = &[
	"no code at",
	"contract not found",
	"selector was not recognized",
	"missing selector",
];

/// Standalone HTTP statuses, so that hex payloads containing the digits do not match.
static HTTP_STATUS: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"\b(429|502|503|504)\b").ok());

/// What a rule can look at.
struct Evidence<'a> {
	error: &'a ProviderError,
	/// Lowercased message.
	message: String,
	reason: Option<String>,
}

impl Evidence<'_> {
	fn contains_any(&self, needles: &[&str]) -> bool {
		needles.iter().any(|n| self.message.contains(n))
	}
}

struct Rule {
	kind: ErrorKind,
	matches: fn(&Evidence) -> bool,
}

static RULES: &[Rule] = &[
	// Reason text after a revert is contract output, even when it says "timed out".
	Rule {
		kind: ErrorKind::Reverted,
		matches: |e| {
			matches!(e.error, ProviderError::Rpc { code, .. } if *code == REVERT_CODE)
				|| e.message.starts_with("execution reverted")
		},
	},
	Rule {
		kind: ErrorKind::EndpointUnavailable,
		matches: |e| {
			matches!(e.error, ProviderError::Timeout(_) | ProviderError::Connection(_))
				|| e.contains_any(ENDPOINT_MARKERS)
				|| HTTP_STATUS
					.as_ref()
					.is_some_and(|re| re.is_match(&e.message))
		},
	},
	Rule {
		kind: ErrorKind::InsufficientFunds,
		matches: |e| e.message.contains("insufficient funds"),
	},
	Rule {
		kind: ErrorKind::NonceConflict,
		matches: |e| {
			e.message.contains("nonce")
				|| e.message.contains("already known")
				|| e.message.contains("replacement transaction underpriced")
		},
	},
	Rule {
		kind: ErrorKind::GasCongestion,
		matches: |e| {
			e.message.contains("transaction underpriced")
				|| ((e.message.contains("gas") || e.message.contains("fee"))
					&& e.contains_any(CONGESTION_MARKERS))
		},
	},
	Rule {
		kind: ErrorKind::ContractNotFound,
		matches: |e| e.contains_any(CONTRACT_MARKERS),
	},
	Rule {
		kind: ErrorKind::Reverted,
		matches: |e| e.message.contains("revert"),
	},
];

/// Extracts a human readable revert reason from the error data or message.
pub fn revert_reason(error: &ProviderError) -> Option<String> {
	let ProviderError::Rpc { message, data, .. } = error else {
		return None;
	};

	if let Some(reason) = data
		.as_ref()
		.filter(|d| !d.is_empty())
		.and_then(|d| decode_revert_reason(d))
	{
		return Some(reason);
	}

	// "execution reverted: Max supply reached"
	let lower = message.to_lowercase();
	let idx = lower.find("reverted:")?;
	let tail = message[idx + "reverted:".len()..].trim();
	(!tail.is_empty()).then(|| tail.to_string())
}

fn revert_retryable(reason: Option<&str>) -> bool {
	match reason {
		None => true,
		Some(reason) => {
			let lower = reason.to_lowercase();
			TRANSIENT_REVERT_MARKERS.iter().any(|m| lower.contains(m))
		},
	}
}

/// Maps a provider failure to the closed failure taxonomy.
pub fn classify(error: &ProviderError) -> ClassifiedError {
	let raw_message = match error {
		ProviderError::Rpc { message, .. } => message.clone(),
		other => other.to_string(),
	};
	let evidence = Evidence {
		error,
		message: raw_message.to_lowercase(),
		reason: revert_reason(error),
	};

	let kind = RULES
		.iter()
		.find(|rule| (rule.matches)(&evidence))
		.map(|rule| rule.kind)
		.unwrap_or(ErrorKind::Unknown);

	let mut classified = ClassifiedError::new(kind, raw_message);
	if kind == ErrorKind::Reverted {
		classified.retryable = revert_retryable(evidence.reason.as_deref());
	}
	if let Some(reason) = evidence.reason.filter(|_| kind == ErrorKind::Reverted) {
		classified = classified.with_reason(reason);
	}
	classified
}

/// A mined transaction whose receipt reports failure.
pub fn classify_onchain_revert(tx_hash: &str) -> ClassifiedError {
	ClassifiedError::new(
		ErrorKind::Reverted,
		format!("Transaction {} reverted on-chain", tx_hash),
	)
	.with_retryable(false)
}
