//! `POST /execute-transaction`.

use super::{error_response, reject, respond, run_cancellable};
use crate::server::AppState;
use axum::{
	extract::{rejection::JsonRejection, State},
	http::StatusCode,
	response::{Json, Response},
};
use relay_types::{truncate_id, ExecuteTransactionRequest, TransactionIntent};

pub async fn handle_execute(
	State(state): State<AppState>,
	payload: Result<Json<ExecuteTransactionRequest>, JsonRejection>,
) -> Response {
	let request = match payload {
		Ok(Json(request)) => request,
		Err(rejection) => return reject(rejection),
	};

	let intent = match TransactionIntent::try_from(request) {
		Ok(intent) => intent,
		Err(e) => {
			tracing::warn!(error = %e, "Invalid transaction request");
			return error_response(StatusCode::BAD_REQUEST, "invalid_request", e.to_string());
		},
	};

	let result = match run_cancellable(&state, move |engine, cancel| async move {
		engine.execute(intent, &cancel).await
	})
	.await
	{
		Ok(result) => result,
		Err(response) => return response,
	};

	tracing::info!(
		success = result.success,
		mode = ?result.mode,
		tx_hash = %result.tx_hash.map(|h| truncate_id(&format!("{:#x}", h))).unwrap_or_default(),
		attempts = result.attempts.len(),
		"Request finished"
	);
	respond(&result)
}

#[cfg(test)]
mod tests {
	use crate::server::tests::{body_json, post_json, router, single_endpoint};
	use axum::http::StatusCode;
	use relay_config::builders::ConfigBuilder;
	use relay_delivery::testing::{MockRpc, ReceiptMode, TEST_CONTRACT};
	use relay_delivery::ProviderError;
	use relay_types::U256;
	use std::sync::Arc;
	use tower::ServiceExt;

	const MINT: &str = r#"{"data":"0xd85d3d270000000000000000000000000000000000000000000000000000000000000000"}"#;

	fn rpc() -> Arc<MockRpc> {
		Arc::new(MockRpc::new("http://mock", 84532))
	}

	#[tokio::test(start_paused = true)]
	async fn test_confirmed_transaction() {
		let app = router(single_endpoint(), rpc(), None).await;
		let response = app.oneshot(post_json("/execute-transaction", MINT)).await.unwrap();

		assert_eq!(response.status(), StatusCode::OK);
		let body = body_json(response).await;
		assert_eq!(body["success"], true);
		assert_eq!(body["mode"], "production");
		assert_eq!(body["status"], "confirmed");
		assert_eq!(body["gasSource"], "estimated");
		assert!(body["transactionHash"].as_str().is_some_and(|h| h.starts_with("0x")));
		assert!(body["explorerUrl"]
			.as_str()
			.is_some_and(|u| u.starts_with("https://sepolia.basescan.org/tx/")));
	}

	#[tokio::test(start_paused = true)]
	async fn test_demonstration_has_null_links() {
		let rpc = rpc();
		rpc.hang();
		let app = router(single_endpoint(), rpc, None).await;
		let response = app.oneshot(post_json("/execute-transaction", MINT)).await.unwrap();

		assert_eq!(response.status(), StatusCode::OK);
		let body = body_json(response).await;
		assert_eq!(body["mode"], "demonstration");
		assert!(body["transactionHash"].is_null());
		assert!(body["explorerUrl"].is_null());
		assert!(body["demonstrationId"].as_str().is_some_and(|id| id.starts_with("demo-")));
		assert!(body["explanation"].is_string());
	}

	#[tokio::test(start_paused = true)]
	async fn test_insufficient_funds_is_402() {
		let rpc = rpc();
		rpc.set_balance(U256::ZERO);
		let app = router(single_endpoint(), rpc, None).await;
		let response = app.oneshot(post_json("/execute-transaction", MINT)).await.unwrap();

		assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
		let body = body_json(response).await;
		assert_eq!(body["classifiedKind"], "insufficient_funds");
		assert_eq!(body["statusCode"], 402);
	}

	#[tokio::test(start_paused = true)]
	async fn test_onchain_revert_is_422() {
		let rpc = rpc();
		rpc.set_receipt_mode(ReceiptMode::Revert);
		let app = router(single_endpoint(), rpc, None).await;
		let response = app.oneshot(post_json("/execute-transaction", MINT)).await.unwrap();

		assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
		let body = body_json(response).await;
		assert_eq!(body["classifiedKind"], "reverted");
		assert!(body["transactionHash"].is_string());
	}

	#[tokio::test(start_paused = true)]
	async fn test_receipt_timeout_is_202() {
		let rpc = rpc();
		rpc.set_receipt_mode(ReceiptMode::Never);
		let app = router(single_endpoint(), rpc, None).await;
		let response = app.oneshot(post_json("/execute-transaction", MINT)).await.unwrap();

		assert_eq!(response.status(), StatusCode::ACCEPTED);
		let body = body_json(response).await;
		assert_eq!(body["success"], false);
		assert_eq!(body["status"], "timed_out");
		assert!(body["error"].is_string());
	}

	#[tokio::test(start_paused = true)]
	async fn test_outage_without_demonstration_is_503() {
		let rpc = rpc();
		rpc.fail_with(ProviderError::Connection("connection refused".into()));
		let config = ConfigBuilder::new()
			.endpoint("mock", "http://mock")
			.contract(TEST_CONTRACT, "nft")
			.demonstration(false)
			.build();
		let app = router(config, rpc, None).await;
		let response = app.oneshot(post_json("/execute-transaction", MINT)).await.unwrap();

		assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
		let body = body_json(response).await;
		assert_eq!(body["classifiedKind"], "endpoint_unavailable");
	}

	#[tokio::test]
	async fn test_malformed_requests_are_400() {
		for body in [
			"not json",
			r#"{"to":"0x1234"}"#,
			r#"{"data":"0xzz"}"#,
			r#"{"data":"0xd85d3d27","to":"0x12"}"#,
			r#"{"data":"0xd85d3d27","value":"-1"}"#,
		] {
			let app = router(single_endpoint(), rpc(), None).await;
			let response = app.oneshot(post_json("/execute-transaction", body)).await.unwrap();
			assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {}", body);
			let json = body_json(response).await;
			assert_eq!(json["classifiedKind"], "invalid_request");
		}
	}
}
