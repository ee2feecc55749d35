//! `POST /mint`.
//!
//! The body is opaque to the relay. It is handed to the preparation service,
//! whose `{to, data, value}` answer is executed like a direct request.

use super::{error_response, reject, respond, run_cancellable};
use crate::server::AppState;
use axum::{
	extract::{rejection::JsonRejection, State},
	http::StatusCode,
	response::{Json, Response},
};
use relay_core::RelayError;
use serde_json::Value;

pub async fn handle_mint(
	State(state): State<AppState>,
	payload: Result<Json<Value>, JsonRejection>,
) -> Response {
	let payload = match payload {
		Ok(Json(payload)) => payload,
		Err(rejection) => return reject(rejection),
	};

	if !state.engine.has_preparation() {
		tracing::warn!("Preparation service not configured");
		return error_response(
			StatusCode::SERVICE_UNAVAILABLE,
			"preparation_unavailable",
			"Intent preparation service not configured",
		);
	}

	let outcome = match run_cancellable(&state, move |engine, cancel| async move {
		engine.prepare_and_execute(payload, &cancel).await
	})
	.await
	{
		Ok(outcome) => outcome,
		Err(response) => return response,
	};

	match outcome {
		Ok(result) => respond(&result),
		Err(e) => {
			tracing::warn!(error = %e, "Mint request failed before execution");
			let (status, kind) = match e {
				RelayError::InvalidIntent(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
				RelayError::PreparationUnavailable => {
					(StatusCode::SERVICE_UNAVAILABLE, "preparation_unavailable")
				},
				RelayError::Preparation(_) => (StatusCode::BAD_GATEWAY, "preparation_failed"),
				RelayError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "unknown"),
			};
			error_response(status, kind, e.to_string())
		},
	}
}

#[cfg(test)]
mod tests {
	use crate::server::tests::{body_json, post_json, router, single_endpoint};
	use axum::http::StatusCode;
	use relay_core::{MockPreparationInterface, RelayError};
	use relay_delivery::testing::{MockRpc, TEST_CONTRACT};
	use relay_types::PreparedIntent;
	use std::sync::Arc;
	use tower::ServiceExt;

	const INTENT: &str = r#"{"tokenUri":"ipfs://bafy","recipient":"0x5FbDB2315678afecb367f032d93F642f64180aa3"}"#;

	fn rpc() -> Arc<MockRpc> {
		Arc::new(MockRpc::new("http://mock", 84532))
	}

	#[tokio::test]
	async fn test_without_preparation_is_503() {
		let app = router(single_endpoint(), rpc(), None).await;
		let response = app.oneshot(post_json("/mint", INTENT)).await.unwrap();

		assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
		let body = body_json(response).await;
		assert_eq!(body["classifiedKind"], "preparation_unavailable");
	}

	#[tokio::test(start_paused = true)]
	async fn test_prepared_intent_is_executed() {
		let mut preparation = MockPreparationInterface::new();
		preparation
			.expect_prepare()
			.withf(|intent| intent["tokenUri"] == "ipfs://bafy")
			.times(1)
			.returning(|_| {
				Ok(PreparedIntent {
					to: Some(format!("{:#x}", TEST_CONTRACT)),
					data: Some(format!("0xd85d3d27{}", "00".repeat(32))),
					value: Some("0".into()),
				})
			});

		let app = router(single_endpoint(), rpc(), Some(Arc::new(preparation))).await;
		let response = app.oneshot(post_json("/mint", INTENT)).await.unwrap();

		assert_eq!(response.status(), StatusCode::OK);
		let body = body_json(response).await;
		assert_eq!(body["success"], true);
		assert_eq!(body["status"], "confirmed");
	}

	#[tokio::test]
	async fn test_invalid_prepared_intent_is_400() {
		let mut preparation = MockPreparationInterface::new();
		preparation.expect_prepare().returning(|_| {
			Ok(PreparedIntent {
				to: None,
				data: Some("0xd85d3d27".into()),
				value: None,
			})
		});

		let rpc = rpc();
		let app = router(single_endpoint(), rpc.clone(), Some(Arc::new(preparation))).await;
		let response = app.oneshot(post_json("/mint", INTENT)).await.unwrap();

		assert_eq!(response.status(), StatusCode::BAD_REQUEST);
		assert_eq!(rpc.count("eth_sendRawTransaction"), 0);
	}

	#[tokio::test]
	async fn test_preparation_failure_is_502() {
		let mut preparation = MockPreparationInterface::new();
		preparation
			.expect_prepare()
			.returning(|_| Err(RelayError::Preparation("Service returned 500".into())));

		let app = router(single_endpoint(), rpc(), Some(Arc::new(preparation))).await;
		let response = app.oneshot(post_json("/mint", INTENT)).await.unwrap();

		assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
		let body = body_json(response).await;
		assert_eq!(body["classifiedKind"], "preparation_failed");
	}
}
