//! Configuration for the transaction relay.
//!
//! Configuration is TOML. String values may reference the environment with
//! `${VAR}` or `${VAR:-default}`, and a file may pull in others with
//! `include = ["endpoints.toml", ...]` provided every top-level section is
//! defined exactly once across all files.
//!
//! Everything that can be defaulted is; the minimal file names the relay, the
//! chain, at least one endpoint, at least one contract and the signing
//! account.

#[cfg(any(test, feature = "testing"))]
pub mod builders;
mod loader;

use regex::Regex;
use relay_types::{parse_selector, Address, Selector};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	#[error("Configuration error: {0}")]
	Parse(String),
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// The default Display dumps the whole input.
		ConfigError::Parse(err.message().to_string())
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	pub relay: RelayConfig,
	pub network: NetworkConfig,
	/// Candidate RPC endpoints in priority order.
	pub endpoints: Vec<EndpointConfig>,
	/// Candidate contracts in priority order, used when a request has no `to`.
	pub contracts: Vec<ContractConfig>,
	pub account: AccountConfig,
	#[serde(default)]
	pub execution: ExecutionConfig,
	#[serde(default)]
	pub demonstration: DemonstrationConfig,
	/// Remote service that turns an opaque intent into `{to, data, value}`.
	pub preparation: Option<PreparationConfig>,
	pub api: Option<ApiConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RelayConfig {
	/// Identifies this relay instance in logs.
	pub id: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
	/// Chain every endpoint is expected to serve.
	pub chain_id: u64,
	#[serde(default)]
	pub name: Option<String>,
	/// Block explorer root, e.g. `https://sepolia.basescan.org`.
	#[serde(default)]
	pub explorer_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EndpointConfig {
	pub name: String,
	pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ContractConfig {
	pub address: Address,
	#[serde(default = "default_contract_label")]
	pub label: String,
}

fn default_contract_label() -> String {
	"contract".to_string()
}

/// Signing account selection.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountConfig {
	/// Which implementation to use.
	pub primary: String,
	/// Per-implementation settings, validated by the implementation itself.
	pub implementations: HashMap<String, toml::Value>,
}

/// Knobs of the execution pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ExecutionConfig {
	/// Percent added on top of `eth_estimateGas`.
	#[serde(default = "default_gas_buffer_percent")]
	pub gas_buffer_percent: u32,
	/// Gas limit used when estimation is unavailable.
	#[serde(default = "default_fallback_gas_limit")]
	pub fallback_gas_limit: u64,
	#[serde(default = "default_confirmations")]
	pub confirmations: u64,
	/// How long to wait for a receipt before reporting `timed_out`.
	#[serde(default = "default_receipt_timeout_seconds")]
	pub receipt_timeout_seconds: u64,
	#[serde(default = "default_poll_interval_ms")]
	pub poll_interval_ms: u64,
	#[serde(default = "default_probe_timeout_seconds")]
	pub probe_timeout_seconds: u64,
	/// Deadline for every other individual RPC call.
	#[serde(default = "default_request_timeout_seconds")]
	pub request_timeout_seconds: u64,
	#[serde(default = "default_max_probe_concurrency")]
	pub max_probe_concurrency: usize,
	/// Extra buffer percent for the single retry after a congestion failure.
	#[serde(default = "default_congestion_bump_percent")]
	pub congestion_bump_percent: u32,
	/// Selectors every candidate contract must expose, as hex or signatures.
	#[serde(default)]
	pub required_selectors: Vec<String>,
}

fn default_gas_buffer_percent() -> u32 {
	20
}

fn default_fallback_gas_limit() -> u64 {
	300_000
}

fn default_confirmations() -> u64 {
	1
}

fn default_receipt_timeout_seconds() -> u64 {
	120
}

fn default_poll_interval_ms() -> u64 {
	2_000
}

fn default_probe_timeout_seconds() -> u64 {
	8
}

fn default_request_timeout_seconds() -> u64 {
	15
}

fn default_max_probe_concurrency() -> usize {
	4
}

fn default_congestion_bump_percent() -> u32 {
	20
}

impl Default for ExecutionConfig {
	fn default() -> Self {
		Self {
			gas_buffer_percent: default_gas_buffer_percent(),
			fallback_gas_limit: default_fallback_gas_limit(),
			confirmations: default_confirmations(),
			receipt_timeout_seconds: default_receipt_timeout_seconds(),
			poll_interval_ms: default_poll_interval_ms(),
			probe_timeout_seconds: default_probe_timeout_seconds(),
			request_timeout_seconds: default_request_timeout_seconds(),
			max_probe_concurrency: default_max_probe_concurrency(),
			congestion_bump_percent: default_congestion_bump_percent(),
			required_selectors: Vec::new(),
		}
	}
}

impl ExecutionConfig {
	pub fn probe_timeout(&self) -> Duration {
		Duration::from_secs(self.probe_timeout_seconds)
	}

	pub fn request_timeout(&self) -> Duration {
		Duration::from_secs(self.request_timeout_seconds)
	}

	pub fn receipt_timeout(&self) -> Duration {
		Duration::from_secs(self.receipt_timeout_seconds)
	}

	pub fn poll_interval(&self) -> Duration {
		Duration::from_millis(self.poll_interval_ms)
	}

	/// Parses `required_selectors`.
	pub fn selectors(&self) -> Result<Vec<Selector>, ConfigError> {
		self.required_selectors
			.iter()
			.map(|s| parse_selector(s).map_err(ConfigError::Validation))
			.collect()
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DemonstrationConfig {
	/// Return a labelled demonstration result when no pair is viable.
	#[serde(default = "default_demonstration_enabled")]
	pub enabled: bool,
}

fn default_demonstration_enabled() -> bool {
	true
}

impl Default for DemonstrationConfig {
	fn default() -> Self {
		Self {
			enabled: default_demonstration_enabled(),
		}
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PreparationConfig {
	pub url: String,
	#[serde(default = "default_preparation_timeout_seconds")]
	pub timeout_seconds: u64,
}

fn default_preparation_timeout_seconds() -> u64 {
	30
}

/// HTTP API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	#[serde(default)]
	pub enabled: bool,
	#[serde(default = "default_api_host")]
	pub host: String,
	#[serde(default = "default_api_port")]
	pub port: u16,
	/// Upper bound on a whole request, receipt wait included.
	#[serde(default = "default_api_timeout")]
	pub timeout_seconds: u64,
	#[serde(default = "default_max_request_size")]
	pub max_request_size: usize,
	pub cors: Option<CorsConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorsConfig {
	pub allowed_origins: Vec<String>,
	#[serde(default)]
	pub allowed_headers: Vec<String>,
	#[serde(default)]
	pub allowed_methods: Vec<String>,
}

fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
	3000
}

fn default_api_timeout() -> u64 {
	300
}

fn default_max_request_size() -> usize {
	1024 * 1024
}

/// Replaces `${VAR}` and `${VAR:-default}` with values from the environment.
///
/// Input is capped at 1MB before the regex runs.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut missing = None;
	let resolved = re.replace_all(input, |caps: &regex::Captures| {
		let var_name = &caps[1];
		match (std::env::var(var_name), caps.get(2)) {
			(Ok(value), _) => value,
			(Err(_), Some(default)) => default.as_str().to_string(),
			(Err(_), None) => {
				missing.get_or_insert_with(|| var_name.to_string());
				String::new()
			},
		}
	});

	match missing {
		Some(var_name) => Err(ConfigError::Validation(format!(
			"Environment variable '{}' not found",
			var_name
		))),
		None => Ok(resolved.into_owned()),
	}
}

fn validate_url(field: &str, url: &str) -> Result<(), ConfigError> {
	let rest = url
		.strip_prefix("http://")
		.or_else(|| url.strip_prefix("https://"))
		.ok_or_else(|| {
			ConfigError::Validation(format!("{} must be an http(s) URL, got '{}'", field, url))
		})?;
	if rest.is_empty() || rest.starts_with('/') {
		return Err(ConfigError::Validation(format!(
			"{} has no host: '{}'",
			field, url
		)));
	}
	Ok(())
}

impl Config {
	/// Loads a configuration file, following `include` directives relative to
	/// the file's directory.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;

		let mut loader = loader::ConfigLoader::new(base_dir);
		loader.load_config(file_name).await
	}

	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.relay.id.trim().is_empty() {
			return Err(ConfigError::Validation("Relay ID cannot be empty".into()));
		}
		if self.network.chain_id == 0 {
			return Err(ConfigError::Validation(
				"network.chain_id must be greater than 0".into(),
			));
		}
		if let Some(explorer) = &self.network.explorer_url {
			validate_url("network.explorer_url", explorer)?;
		}

		if self.endpoints.is_empty() {
			return Err(ConfigError::Validation(
				"At least one RPC endpoint must be configured".into(),
			));
		}
		let mut names = HashSet::new();
		for endpoint in &self.endpoints {
			if endpoint.name.trim().is_empty() {
				return Err(ConfigError::Validation("Endpoint name cannot be empty".into()));
			}
			if !names.insert(endpoint.name.as_str()) {
				return Err(ConfigError::Validation(format!(
					"Duplicate endpoint name '{}'",
					endpoint.name
				)));
			}
			validate_url(&format!("endpoint '{}'", endpoint.name), &endpoint.url)?;
		}

		if self.contracts.is_empty() {
			return Err(ConfigError::Validation(
				"At least one contract must be configured".into(),
			));
		}

		if self.account.primary.is_empty() {
			return Err(ConfigError::Validation(
				"Account primary implementation cannot be empty".into(),
			));
		}
		if !self.account.implementations.contains_key(&self.account.primary) {
			return Err(ConfigError::Validation(format!(
				"Primary account '{}' not found in implementations",
				self.account.primary
			)));
		}

		self.validate_execution()?;

		if let Some(preparation) = &self.preparation {
			validate_url("preparation.url", &preparation.url)?;
			if preparation.timeout_seconds == 0 {
				return Err(ConfigError::Validation(
					"preparation.timeout_seconds must be greater than 0".into(),
				));
			}
		}

		Ok(())
	}

	fn validate_execution(&self) -> Result<(), ConfigError> {
		let execution = &self.execution;
		if execution.gas_buffer_percent > 500 {
			return Err(ConfigError::Validation(format!(
				"gas_buffer_percent cannot exceed 500, got {}",
				execution.gas_buffer_percent
			)));
		}
		if execution.congestion_bump_percent > 500 {
			return Err(ConfigError::Validation(format!(
				"congestion_bump_percent cannot exceed 500, got {}",
				execution.congestion_bump_percent
			)));
		}
		if execution.fallback_gas_limit < 21_000 {
			return Err(ConfigError::Validation(format!(
				"fallback_gas_limit must be at least 21000, got {}",
				execution.fallback_gas_limit
			)));
		}
		if !(1..=100).contains(&execution.confirmations) {
			return Err(ConfigError::Validation(format!(
				"confirmations must be between 1 and 100, got {}",
				execution.confirmations
			)));
		}
		if !(1..=30).contains(&execution.probe_timeout_seconds) {
			return Err(ConfigError::Validation(format!(
				"probe_timeout_seconds must be between 1 and 30, got {}",
				execution.probe_timeout_seconds
			)));
		}
		if execution.request_timeout_seconds == 0
			|| execution.receipt_timeout_seconds == 0
			|| execution.poll_interval_ms == 0
		{
			return Err(ConfigError::Validation(
				"Execution timeouts and poll interval must be greater than 0".into(),
			));
		}
		if execution.max_probe_concurrency == 0 {
			return Err(ConfigError::Validation(
				"max_probe_concurrency must be greater than 0".into(),
			));
		}
		execution.selectors()?;
		Ok(())
	}
}

/// Parses a TOML string, resolving environment references and validating
/// the result.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}
