//! Endpoint liveness and chain identity probing.

use crate::{DiscoveryError, EndpointClient};
use futures::stream::{self, StreamExt};
use relay_delivery::ProviderError;
use relay_types::{current_timestamp, EndpointStatus, RpcEndpoint};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::instrument;

/// Probes one endpoint with `eth_chainId` under `timeout`.
async fn probe_one(client: &EndpointClient, expected_chain_id: u64, timeout: Duration) -> RpcEndpoint {
	let mut endpoint = client.endpoint.clone();
	let started = Instant::now();
	let result = tokio::time::timeout(timeout, client.rpc.chain_id()).await;
	let elapsed = started.elapsed();

	endpoint.last_checked_at = Some(current_timestamp());
	endpoint.observed_chain_id = None;
	endpoint.latency_ms = None;
	endpoint.status = match result {
		Err(_) | Ok(Err(ProviderError::Timeout(_))) => EndpointStatus::Timeout,
		Ok(Err(e)) => {
			tracing::debug!(endpoint = %endpoint.name, error = %e, "Probe failed");
			EndpointStatus::Offline
		},
		Ok(Ok(chain_id)) => {
			endpoint.observed_chain_id = Some(chain_id);
			endpoint.latency_ms = Some(elapsed.as_millis() as u64);
			if chain_id == expected_chain_id {
				EndpointStatus::Online
			} else {
				EndpointStatus::WrongChain
			}
		},
	};
	endpoint
}

/// Probes every endpoint, at most `max_concurrency` at a time.
///
/// The result has one entry per client, in the order given. A probe that
/// fails only marks its own endpoint.
pub async fn probe_endpoints(
	clients: &[EndpointClient],
	expected_chain_id: u64,
	timeout: Duration,
	max_concurrency: usize,
) -> Vec<RpcEndpoint> {
	// Collected first: mapping inside the stream makes callers' futures non-`Send`.
	let probes: Vec<_> = clients
		.iter()
		.map(|client| probe_one(client, expected_chain_id, timeout))
		.collect();
	stream::iter(probes)
		.buffered(max_concurrency.max(1))
		.collect()
		.await
}

/// The first online endpoint in priority order.
pub fn select_online(endpoints: &[RpcEndpoint]) -> Result<&RpcEndpoint, DiscoveryError> {
	endpoints
		.iter()
		.find(|e| e.is_online())
		.ok_or(DiscoveryError::NoEndpointOnline {
			checked: endpoints.len(),
		})
}

/// Owns the configured endpoints and the last probe snapshot.
pub struct EndpointHealthMonitor {
	clients: Vec<EndpointClient>,
	expected_chain_id: u64,
	probe_timeout: Duration,
	max_concurrency: usize,
	snapshot: RwLock<Vec<RpcEndpoint>>,
}

impl EndpointHealthMonitor {
	pub fn new(
		clients: Vec<EndpointClient>,
		expected_chain_id: u64,
		probe_timeout: Duration,
		max_concurrency: usize,
	) -> Self {
		let snapshot = clients.iter().map(|c| c.endpoint.clone()).collect();
		Self {
			clients,
			expected_chain_id,
			probe_timeout,
			max_concurrency,
			snapshot: RwLock::new(snapshot),
		}
	}

	pub fn expected_chain_id(&self) -> u64 {
		self.expected_chain_id
	}

	/// Probes all endpoints and records the result as the new snapshot.
	#[instrument(skip_all, fields(endpoints = self.clients.len(), chain_id = self.expected_chain_id))]
	pub async fn probe(&self) -> Vec<RpcEndpoint> {
		let probed = probe_endpoints(
			&self.clients,
			self.expected_chain_id,
			self.probe_timeout,
			self.max_concurrency,
		)
		.await;

		let mut snapshot = self.snapshot.write().await;
		for (previous, current) in snapshot.iter().zip(&probed) {
			if previous.status != current.status {
				log_transition(previous.status, current);
			}
		}
		*snapshot = probed.clone();
		drop(snapshot);

		let online = probed.iter().filter(|e| e.is_online()).count();
		tracing::info!(online, total = probed.len(), "Endpoint probe complete");
		probed
	}

	/// Probes and returns the online endpoints with their clients, in
	/// priority order.
	pub async fn online_clients(&self) -> Result<Vec<EndpointClient>, DiscoveryError> {
		let probed = self.probe().await;
		select_online(&probed)?;

		Ok(self
			.clients
			.iter()
			.zip(probed)
			.filter(|(_, endpoint)| endpoint.is_online())
			.map(|(client, endpoint)| EndpointClient::new(endpoint, client.rpc.clone()))
			.collect())
	}

	/// Endpoints as of the last probe.
	pub async fn snapshot(&self) -> Vec<RpcEndpoint> {
		self.snapshot.read().await.clone()
	}
}

fn log_transition(from: EndpointStatus, endpoint: &RpcEndpoint) {
	match endpoint.status {
		EndpointStatus::Online => tracing::info!(
			endpoint = %endpoint.name,
			from = %from,
			latency_ms = endpoint.latency_ms,
			"Endpoint online"
		),
		EndpointStatus::WrongChain => tracing::warn!(
			endpoint = %endpoint.name,
			from = %from,
			expected = endpoint.chain_id,
			observed = endpoint.observed_chain_id,
			"Endpoint serves the wrong chain"
		),
		status => tracing::warn!(
			endpoint = %endpoint.name,
			from = %from,
			to = %status,
			"Endpoint unavailable"
		),
	}
}
