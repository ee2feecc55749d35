//! Contract verification with a per-endpoint cache.
//!
//! A candidate address is usable on an endpoint when it has deployed code and
//! answers every required selector. Selector presence is probed with a
//! read-only `eth_call` of the selector followed by one zero word: success or
//! a revert means the function exists, while "selector not recognized" or any
//! other non-revert execution failure means it does not.

use relay_delivery::{classify, CallRequest, RpcInterface};
use relay_types::{
	truncate_id, Address, Bytes, ClassifiedError, ContractTarget, ErrorKind, RpcEndpoint,
	Selector, U256,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::RwLock;
use tracing::instrument;

type CacheKey = (String, Address);

/// Resolutions currently running for one key.
struct InFlight {
	resolutions: usize,
	/// Bumped by every invalidation while resolutions are running.
	generation: u64,
}

/// Registration of one running resolution; deregisters on drop, so a
/// cancelled resolve leaves nothing behind.
struct Resolution<'a> {
	in_flight: &'a Mutex<HashMap<CacheKey, InFlight>>,
	key: CacheKey,
	generation: u64,
}

impl Drop for Resolution<'_> {
	fn drop(&mut self) {
		let mut in_flight = lock(self.in_flight);
		if let Some(entry) = in_flight.get_mut(&self.key) {
			entry.resolutions -= 1;
			if entry.resolutions == 0 {
				in_flight.remove(&self.key);
			}
		}
	}
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
	mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
pub struct ContractResolver {
	targets: RwLock<HashMap<CacheKey, ContractTarget>>,
	/// Only touched while `targets` is locked, except on deregistration.
	in_flight: Mutex<HashMap<CacheKey, InFlight>>,
	/// Addresses whose targets are kept; `None` keeps every address.
	cacheable: Option<HashSet<Address>>,
}

enum SelectorProbe {
	Present,
	Absent,
}

impl ContractResolver {
	pub fn new() -> Self {
		Self::default()
	}

	/// Resolver that only caches targets for `addresses`; any other address
	/// is verified again on every use.
	pub fn for_contracts(addresses: impl IntoIterator<Item = Address>) -> Self {
		Self {
			cacheable: Some(addresses.into_iter().collect()),
			..Self::default()
		}
	}

	/// Verifies `address` on `endpoint` and returns a target that satisfies
	/// every selector in `required`.
	///
	/// Errors are `ContractNotFound` for missing code or selectors and
	/// `EndpointUnavailable` when the endpoint could not answer.
	#[instrument(skip_all, fields(endpoint = %endpoint.name, address = %truncate_id(&format!("{:#x}", address))))]
	pub async fn resolve(
		&self,
		rpc: &dyn RpcInterface,
		endpoint: &RpcEndpoint,
		address: Address,
		label: &str,
		required: &[Selector],
	) -> Result<ContractTarget, ClassifiedError> {
		let key = (endpoint.url.clone(), address);

		let (cached, resolution) = {
			let targets = self.targets.read().await;
			let cached = targets.get(&key).cloned();
			if let Some(target) = cached.as_ref().filter(|t| t.satisfies(required)) {
				tracing::debug!("Contract cache hit");
				return Ok(target.clone());
			}
			(cached, self.begin(key))
		};

		let mut target = match cached {
			Some(target) => target,
			None => {
				self.verify_code(rpc, endpoint, address).await?;
				let mut target = ContractTarget::unverified(address, label);
				target.bytecode_verified = true;
				target
			},
		};

		let unchecked: Vec<Selector> = required
			.iter()
			.filter(|s| !target.supports(s))
			.copied()
			.collect();
		let mut missing = Vec::new();
		for selector in unchecked {
			match self.probe_selector(rpc, address, selector).await? {
				SelectorProbe::Present => {
					target.supported_functions.insert(selector);
				},
				SelectorProbe::Absent => missing.push(selector),
			}
		}

		self.store(&resolution, &target).await;

		if !missing.is_empty() {
			let names: Vec<String> = missing.iter().map(|s| format!("{}", s)).collect();
			tracing::warn!(missing = ?names, "Contract is missing required functions");
			return Err(ClassifiedError::new(
				ErrorKind::ContractNotFound,
				format!(
					"Contract {} on {} has a missing selector: {}",
					address,
					endpoint.name,
					names.join(", ")
				),
			));
		}

		tracing::info!(label, selectors = required.len(), "Contract verified");
		Ok(target)
	}

	/// Drops the cached target for `address` on `endpoint_url`.
	///
	/// Resolutions of the same key that are still running will not cache
	/// what they find.
	pub async fn invalidate(&self, endpoint_url: &str, address: Address) {
		let key = (endpoint_url.to_string(), address);
		let mut targets = self.targets.write().await;
		let removed = targets.remove(&key).is_some();
		if let Some(entry) = lock(&self.in_flight).get_mut(&key) {
			entry.generation += 1;
		}
		drop(targets);

		if removed {
			tracing::info!(endpoint = endpoint_url, address = %address, "Contract cache entry invalidated");
		}
	}

	pub async fn cached(&self, endpoint_url: &str, address: Address) -> Option<ContractTarget> {
		let key = (endpoint_url.to_string(), address);
		self.targets.read().await.get(&key).cloned()
	}

	/// Must be called with `targets` locked.
	fn begin(&self, key: CacheKey) -> Resolution<'_> {
		let mut in_flight = lock(&self.in_flight);
		let entry = in_flight.entry(key.clone()).or_insert(InFlight {
			resolutions: 0,
			generation: 0,
		});
		entry.resolutions += 1;
		Resolution {
			in_flight: &self.in_flight,
			key,
			generation: entry.generation,
		}
	}

	async fn store(&self, resolution: &Resolution<'_>, target: &ContractTarget) {
		let (_, address) = &resolution.key;
		if self
			.cacheable
			.as_ref()
			.is_some_and(|keep| !keep.contains(address))
		{
			return;
		}

		let mut targets = self.targets.write().await;
		let current = lock(&self.in_flight)
			.get(&resolution.key)
			.map(|entry| entry.generation);
		if current != Some(resolution.generation) {
			tracing::debug!("Contract invalidated during resolution, not caching");
			return;
		}
		targets.insert(resolution.key.clone(), target.clone());
	}

	async fn verify_code(
		&self,
		rpc: &dyn RpcInterface,
		endpoint: &RpcEndpoint,
		address: Address,
	) -> Result<(), ClassifiedError> {
		let code = rpc.get_code(address).await.map_err(|e| {
			let classified = classify(&e);
			match classified.kind {
				ErrorKind::EndpointUnavailable => classified,
				// an endpoint that cannot serve eth_getCode is not usable
				_ => ClassifiedError::new(ErrorKind::EndpointUnavailable, classified.raw_message),
			}
		})?;

		if code.is_empty() {
			tracing::warn!("No code at address");
			return Err(ClassifiedError::new(
				ErrorKind::ContractNotFound,
				format!("No code at {} on {}", address, endpoint.name),
			));
		}
		Ok(())
	}

	async fn probe_selector(
		&self,
		rpc: &dyn RpcInterface,
		address: Address,
		selector: Selector,
	) -> Result<SelectorProbe, ClassifiedError> {
		let mut data = Vec::with_capacity(36);
		data.extend_from_slice(selector.as_slice());
		data.extend_from_slice(&[0u8; 32]);

		let request = CallRequest {
			from: None,
			to: address,
			data: Bytes::from(data),
			value: U256::ZERO,
		};

		match rpc.call(&request).await {
			Ok(_) => Ok(SelectorProbe::Present),
			Err(e) => {
				let classified = classify(&e);
				match classified.kind {
					ErrorKind::Reverted => Ok(SelectorProbe::Present),
					ErrorKind::EndpointUnavailable => Err(classified),
					_ => {
						tracing::debug!(selector = %selector, error = %e, "Selector absent");
						Ok(SelectorProbe::Absent)
					},
				}
			},
		}
	}
}
