//! Endpoint and contract discovery for the relay.
//!
//! Nothing about the target network is trusted ahead of time. The
//! [`EndpointHealthMonitor`] decides which configured RPC endpoints are live
//! and serve the expected chain; the [`ContractResolver`] decides whether a
//! candidate address on such an endpoint actually hosts the functions a call
//! needs.

use relay_delivery::RpcInterface;
use relay_types::RpcEndpoint;
use std::sync::Arc;
use thiserror::Error;

pub mod health;
pub mod resolver;

pub use health::{probe_endpoints, select_online, EndpointHealthMonitor};
pub use resolver::ContractResolver;

#[derive(Debug, Error)]
pub enum DiscoveryError {
	/// Every configured endpoint failed its probe.
	#[error("No RPC endpoint is online ({checked} checked)")]
	NoEndpointOnline { checked: usize },
}

/// A configured endpoint together with the client used to reach it.
#[derive(Clone)]
pub struct EndpointClient {
	pub endpoint: RpcEndpoint,
	pub rpc: Arc<dyn RpcInterface>,
}

impl EndpointClient {
	pub fn new(endpoint: RpcEndpoint, rpc: Arc<dyn RpcInterface>) -> Self {
		Self { endpoint, rpc }
	}
}

impl std::fmt::Debug for EndpointClient {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("EndpointClient")
			.field("endpoint", &self.endpoint)
			.field("url", &self.rpc.url())
			.finish()
	}
}
