//! RPC endpoint types.
//!
//! Endpoints are created from the configured endpoint list and only ever
//! mutated by the health monitor. They are never persisted.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Liveness of an RPC endpoint as observed by the last probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EndpointStatus {
	/// Not probed yet.
	#[default]
	Unknown,
	/// Answered `eth_chainId` with the expected chain.
	Online,
	/// Answered, but for a different chain.
	WrongChain,
	/// Did not answer within the probe deadline.
	Timeout,
	/// Refused the connection, failed DNS, or returned an error.
	Offline,
}

impl fmt::Display for EndpointStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			EndpointStatus::Unknown => "unknown",
			EndpointStatus::Online => "online",
			EndpointStatus::WrongChain => "wrong_chain",
			EndpointStatus::Timeout => "timeout",
			EndpointStatus::Offline => "offline",
		};
		f.write_str(s)
	}
}

/// A candidate JSON-RPC endpoint for the target chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcEndpoint {
	/// Operator-facing name, unique within the configuration.
	pub name: String,
	/// HTTP(S) URL of the endpoint.
	pub url: String,
	/// Chain id the endpoint is expected to serve.
	pub chain_id: u64,
	/// Unix timestamp of the last probe.
	pub last_checked_at: Option<u64>,
	/// Result of the last probe.
	pub status: EndpointStatus,
	/// Chain id reported by the endpoint on the last probe, if any.
	pub observed_chain_id: Option<u64>,
	/// Round trip of the last probe in milliseconds.
	pub latency_ms: Option<u64>,
}

impl RpcEndpoint {
	pub fn new(name: impl Into<String>, url: impl Into<String>, chain_id: u64) -> Self {
		Self {
			name: name.into(),
			url: url.into(),
			chain_id,
			last_checked_at: None,
			status: EndpointStatus::Unknown,
			observed_chain_id: None,
			latency_ms: None,
		}
	}

	pub fn is_online(&self) -> bool {
		self.status == EndpointStatus::Online
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_new_endpoint_is_unknown() {
		let endpoint = RpcEndpoint::new("primary", "http://localhost:8545", 84532);
		assert_eq!(endpoint.status, EndpointStatus::Unknown);
		assert!(endpoint.last_checked_at.is_none());
		assert!(!endpoint.is_online());
	}

	#[test]
	fn test_status_serializes_snake_case() {
		let json = serde_json::to_string(&EndpointStatus::WrongChain).unwrap();
		assert_eq!(json, "\"wrong_chain\"");
		assert_eq!(EndpointStatus::WrongChain.to_string(), "wrong_chain");
	}
}
