//! Intent preparation collaborator.
//!
//! `POST /mint` receives an opaque, application-specific intent (token URI,
//! licence terms, recipient...). A separate preparation service turns it into
//! concrete call parameters; the relay only checks that the answer names a
//! target and carries well-formed calldata.

use crate::RelayError;
use async_trait::async_trait;
use relay_types::PreparedIntent;
use serde_json::Value;
use std::time::Duration;

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PreparationInterface: Send + Sync {
	/// Turns an opaque intent into `{to, data, value}`.
	async fn prepare(&self, intent: Value) -> Result<PreparedIntent, RelayError>;
}

/// Posts the intent as JSON and reads `{to, data, value}` back.
pub struct HttpPreparation {
	client: reqwest::Client,
	url: String,
}

impl HttpPreparation {
	pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, RelayError> {
		let client = reqwest::Client::builder()
			.pool_idle_timeout(Duration::from_secs(90))
			.timeout(timeout)
			.build()
			.map_err(|e| RelayError::Config(format!("Failed to build HTTP client: {}", e)))?;
		Ok(Self {
			client,
			url: url.into(),
		})
	}
}

#[async_trait]
impl PreparationInterface for HttpPreparation {
	async fn prepare(&self, intent: Value) -> Result<PreparedIntent, RelayError> {
		tracing::debug!(url = %self.url, "Forwarding intent to preparation service");

		let response = self
			.client
			.post(&self.url)
			.json(&intent)
			.send()
			.await
			.map_err(|e| RelayError::Preparation(format!("Request failed: {}", e)))?;

		let status = response.status();
		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			return Err(RelayError::Preparation(format!(
				"Service returned {}: {}",
				status, body
			)));
		}

		response
			.json::<PreparedIntent>()
			.await
			.map_err(|e| RelayError::Preparation(format!("Invalid response: {}", e)))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_unreachable_service_is_preparation_error() {
		let preparation = HttpPreparation::new("http://127.0.0.1:9/prepare", Duration::from_secs(2)).unwrap();
		let err = preparation
			.prepare(serde_json::json!({"tokenUri": "ipfs://x"}))
			.await
			.unwrap_err();
		assert!(matches!(err, RelayError::Preparation(_)));
	}

	#[tokio::test]
	async fn test_mock_preparation() {
		let mut mock = MockPreparationInterface::new();
		mock.expect_prepare().times(1).returning(|_| {
			Ok(PreparedIntent {
				to: Some("0x5FbDB2315678afecb367f032d93F642f64180aa3".into()),
				data: Some("0xd85d3d27".into()),
				value: None,
			})
		});

		let prepared = mock.prepare(Value::Null).await.unwrap();
		assert_eq!(prepared.data.as_deref(), Some("0xd85d3d27"));
	}
}
