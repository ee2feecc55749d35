//! The degradation controller.
//!
//! [`RelayEngine::execute`] walks the online endpoints in priority order and,
//! for each, the candidate contracts in configured order. Each pair is
//! resolved, sized and executed; what happens next depends on the classified
//! outcome:
//!
//! - `Confirmed`, an on-chain `Reverted`, or `TimedOut` end the request.
//! - A nonce conflict or fee congestion is retried once on the same pair.
//! - Any other retryable failure advances to the next pair.
//! - A non-retryable failure is surfaced immediately.
//!
//! When every pair has been tried the request degrades to a labelled
//! demonstration result, unless that is disabled.

pub mod demonstration;

use crate::prepare::PreparationInterface;
use crate::RelayError;
use relay_delivery::{GasEstimator, TransactionExecutor};
use relay_discovery::{ContractResolver, EndpointClient, EndpointHealthMonitor};
use relay_types::{
	truncate_id, Address, AttemptSummary, ClassifiedError, ErrorKind, ExecutionState, GasQuote,
	GasSource, HealthResponse, IntentError, PreparedCall, Selector, TransactionIntent, TransactionResult,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// A configured contract address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCandidate {
	pub address: Address,
	pub label: String,
}

/// Request-independent knobs of the controller.
#[derive(Debug, Clone)]
pub struct EngineSettings {
	pub chain_id: u64,
	pub explorer_url: Option<String>,
	pub required_selectors: Vec<Selector>,
	pub congestion_bump_percent: u32,
	pub demonstration_enabled: bool,
	pub receipt_timeout: Duration,
}

enum PairOutcome {
	/// The request is decided.
	Finished(TransactionResult),
	/// This pair is unusable; try the next one.
	Advance(ClassifiedError),
}

pub struct RelayEngine {
	settings: EngineSettings,
	monitor: Arc<EndpointHealthMonitor>,
	resolver: ContractResolver,
	estimator: GasEstimator,
	executor: TransactionExecutor,
	caller: Address,
	contracts: Vec<ContractCandidate>,
	preparation: Option<Arc<dyn PreparationInterface>>,
}

impl RelayEngine {
	#[allow(clippy::too_many_arguments)]
	pub fn new(
		settings: EngineSettings,
		monitor: Arc<EndpointHealthMonitor>,
		resolver: ContractResolver,
		estimator: GasEstimator,
		executor: TransactionExecutor,
		caller: Address,
		contracts: Vec<ContractCandidate>,
		preparation: Option<Arc<dyn PreparationInterface>>,
	) -> Self {
		Self {
			settings,
			monitor,
			resolver,
			estimator,
			executor,
			caller,
			contracts,
			preparation,
		}
	}

	pub fn caller(&self) -> Address {
		self.caller
	}

	pub fn chain_id(&self) -> u64 {
		self.settings.chain_id
	}

	pub fn has_preparation(&self) -> bool {
		self.preparation.is_some()
	}

	/// Executes `intent`, degrading as described in the module docs.
	///
	/// `cancel` is observed between attempts only; an attempt that has
	/// started always reaches its recorded outcome.
	#[instrument(skip_all, fields(
		to = ?intent.to,
		selector = %hex::encode(intent.selector()),
	))]
	pub async fn execute(
		&self,
		intent: TransactionIntent,
		cancel: &CancellationToken,
	) -> TransactionResult {
		if intent.data.len() < 4 {
			let error = ClassifiedError::new(ErrorKind::Unknown, IntentError::CalldataTooShort.to_string())
				.with_retryable(false);
			return TransactionResult::failure(error, Vec::new());
		}

		let clients = match self.monitor.online_clients().await {
			Ok(clients) => clients,
			Err(e) => {
				tracing::warn!(error = %e, "Network-wide outage");
				let error = ClassifiedError::new(ErrorKind::EndpointUnavailable, e.to_string());
				return self.exhausted(&intent, Some(error), Vec::new());
			},
		};

		let candidates = self.candidates(&intent);
		let required = self.required_selectors(&intent);
		let mut attempts = Vec::new();
		let mut last_error = None;

		for client in &clients {
			for candidate in &candidates {
				if cancel.is_cancelled() {
					return cancelled(attempts);
				}
				match self
					.try_pair(client, candidate, &intent, &required, cancel, &mut attempts)
					.await
				{
					PairOutcome::Finished(result) => return result,
					PairOutcome::Advance(error) => {
						tracing::info!(
							endpoint = %client.endpoint.name,
							contract = %candidate.label,
							kind = %error.kind,
							"Advancing to next candidate"
						);
						last_error = Some(error);
					},
				}
			}
		}

		self.exhausted(&intent, last_error, attempts)
	}

	/// Sends `payload` to the preparation service and executes the answer.
	pub async fn prepare_and_execute(
		&self,
		payload: Value,
		cancel: &CancellationToken,
	) -> Result<TransactionResult, RelayError> {
		let preparation = self
			.preparation
			.as_ref()
			.ok_or(RelayError::PreparationUnavailable)?;
		let prepared = preparation.prepare(payload).await?;
		let intent = TransactionIntent::try_from(prepared)?;
		Ok(self.execute(intent, cancel).await)
	}

	/// Probes every endpoint and reports the statuses.
	pub async fn health(&self) -> HealthResponse {
		let endpoints = self.monitor.probe().await;
		HealthResponse {
			chain_id: self.settings.chain_id,
			online: endpoints.iter().filter(|e| e.is_online()).count(),
			endpoints,
		}
	}

	/// The intent's target, or every configured contract.
	fn candidates(&self, intent: &TransactionIntent) -> Vec<ContractCandidate> {
		match intent.to {
			Some(address) => {
				let label = self
					.contracts
					.iter()
					.find(|c| c.address == address)
					.map(|c| c.label.clone())
					.unwrap_or_else(|| "request".to_string());
				vec![ContractCandidate { address, label }]
			},
			None => self.contracts.clone(),
		}
	}

	/// Configured selectors plus the one being called.
	fn required_selectors(&self, intent: &TransactionIntent) -> Vec<Selector> {
		let mut required = self.settings.required_selectors.clone();
		let called = Selector::from(intent.selector());
		if !required.contains(&called) {
			required.push(called);
		}
		required
	}

	async fn try_pair(
		&self,
		client: &EndpointClient,
		candidate: &ContractCandidate,
		intent: &TransactionIntent,
		required: &[Selector],
		cancel: &CancellationToken,
		attempts: &mut Vec<AttemptSummary>,
	) -> PairOutcome {
		let endpoint = &client.endpoint;
		let rpc = client.rpc.as_ref();

		let target = match self
			.resolver
			.resolve(rpc, endpoint, candidate.address, &candidate.label, required)
			.await
		{
			Ok(target) => target,
			Err(error) => {
				attempts.push(unexecuted(client, candidate, &error));
				return self.unusable_pair(client, candidate, error, attempts).await;
			},
		};

		let Some(call) = PreparedCall::new(
			endpoint.clone(),
			target,
			&intent.data,
			intent.value,
			self.caller,
		) else {
			let error = ClassifiedError::new(ErrorKind::Unknown, "Calldata is missing a selector")
				.with_retryable(false);
			return PairOutcome::Finished(TransactionResult::failure(error, attempts.clone()));
		};

		let mut estimator = self.estimator;
		let mut quote = match intent.gas_limit {
			Some(limit) => GasQuote::provided(limit),
			None => match estimator.estimate(rpc, &call).await {
				Ok(quote) => quote,
				Err(error) => {
					attempts.push(unexecuted(client, candidate, &error));
					return self.unusable_pair(client, candidate, error, attempts).await;
				},
			},
		};

		let mut nonce_retried = false;
		let mut congestion_retried = false;
		loop {
			let attempt = match self.executor.execute(rpc, call.clone(), quote).await {
				Ok(attempt) => attempt,
				Err(e) => {
					tracing::error!(error = %e, "Executor state machine error");
					let error = ClassifiedError::new(ErrorKind::Unknown, e.to_string())
						.with_retryable(false);
					return PairOutcome::Finished(TransactionResult::failure(error, attempts.clone()));
				},
			};
			attempts.push(AttemptSummary::from_attempt(&attempt));

			match attempt.state {
				ExecutionState::Confirmed | ExecutionState::Reverted => {
					let result = TransactionResult::from_attempt(
						&attempt,
						self.settings.explorer_url.as_deref(),
						attempts.clone(),
					);
					return PairOutcome::Finished(result);
				},
				ExecutionState::TimedOut => {
					let mut result = TransactionResult::from_attempt(
						&attempt,
						self.settings.explorer_url.as_deref(),
						attempts.clone(),
					);
					let hash = attempt
						.tx_hash
						.map(|h| format!("{:#x}", h))
						.unwrap_or_default();
					tracing::warn!(tx_hash = %truncate_id(&hash), "Receipt wait expired, not resending");
					result.explanation = Some(format!(
						"Transaction {} was broadcast but not confirmed within {}s. It may \
						 still be mined; check the explorer before submitting again.",
						hash,
						self.settings.receipt_timeout.as_secs()
					));
					return PairOutcome::Finished(result);
				},
				_ => {},
			}

			let error = attempt.error.clone().unwrap_or_else(|| {
				ClassifiedError::new(ErrorKind::Unknown, "Attempt failed without an error")
			});

			if cancel.is_cancelled() {
				return PairOutcome::Finished(cancelled(attempts.clone()));
			}
			match error.kind {
				ErrorKind::NonceConflict if !nonce_retried => {
					nonce_retried = true;
					tracing::info!("Nonce conflict, retrying with a fresh nonce");
					continue;
				},
				ErrorKind::GasCongestion if !congestion_retried => {
					congestion_retried = true;
					estimator = estimator.bumped(self.settings.congestion_bump_percent);
					if quote.source == GasSource::Estimated {
						quote = GasQuote::estimated(quote.estimated, estimator.buffer_percent());
					}
					tracing::info!(
						buffer_percent = estimator.buffer_percent(),
						gas_limit = quote.buffered,
						"Fee congestion, retrying with a larger buffer"
					);
					continue;
				},
				_ => {},
			}

			if !error.retryable {
				let result = TransactionResult::from_attempt(
					&attempt,
					self.settings.explorer_url.as_deref(),
					attempts.clone(),
				);
				return PairOutcome::Finished(result);
			}
			return self.unusable_pair(client, candidate, error, attempts).await;
		}
	}

	/// Advances past a retryable pair failure or surfaces a final one.
	async fn unusable_pair(
		&self,
		client: &EndpointClient,
		candidate: &ContractCandidate,
		error: ClassifiedError,
		attempts: &[AttemptSummary],
	) -> PairOutcome {
		if error.kind == ErrorKind::ContractNotFound {
			self.resolver
				.invalidate(&client.endpoint.url, candidate.address)
				.await;
		}
		if error.retryable {
			PairOutcome::Advance(error)
		} else {
			tracing::warn!(kind = %error.kind, error = %error.raw_message, "Non-retryable failure");
			PairOutcome::Finished(TransactionResult::failure(error, attempts.to_vec()))
		}
	}

	fn exhausted(
		&self,
		intent: &TransactionIntent,
		last_error: Option<ClassifiedError>,
		attempts: Vec<AttemptSummary>,
	) -> TransactionResult {
		if self.settings.demonstration_enabled {
			let id = demonstration::demonstration_id(intent);
			let explanation =
				demonstration::explanation(self.settings.chain_id, last_error.as_ref(), attempts.len());
			tracing::warn!(demonstration_id = %id, tried = attempts.len(), "Falling back to demonstration mode");
			return TransactionResult::demonstration(id, explanation, last_error, attempts);
		}

		let error = last_error.unwrap_or_else(|| {
			ClassifiedError::new(ErrorKind::EndpointUnavailable, "No RPC endpoint is online")
		});
		tracing::warn!(kind = %error.kind, tried = attempts.len(), "All candidates exhausted");
		TransactionResult::failure(error, attempts)
	}
}

/// Summary of a pair that failed before reaching the executor.
fn unexecuted(
	client: &EndpointClient,
	candidate: &ContractCandidate,
	error: &ClassifiedError,
) -> AttemptSummary {
	AttemptSummary {
		endpoint: client.endpoint.name.clone(),
		contract: format!("{:#x}", candidate.address),
		state: None,
		gas_source: None,
		error_kind: Some(error.kind),
	}
}

fn cancelled(attempts: Vec<AttemptSummary>) -> TransactionResult {
	tracing::info!(tried = attempts.len(), "Request cancelled between attempts");
	let error =
		ClassifiedError::new(ErrorKind::Unknown, "Request cancelled").with_retryable(false);
	TransactionResult::failure(error, attempts)
}
