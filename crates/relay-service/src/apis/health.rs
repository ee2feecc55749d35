//! `GET /health`.

use crate::server::AppState;
use axum::{
	extract::State,
	http::StatusCode,
	response::{IntoResponse, Json, Response},
};

/// Probes every endpoint; 503 when none is online.
pub async fn handle_health(State(state): State<AppState>) -> Response {
	let health = state.engine.health().await;
	let status = if health.online > 0 {
		StatusCode::OK
	} else {
		StatusCode::SERVICE_UNAVAILABLE
	};
	(status, Json(health)).into_response()
}

#[cfg(test)]
mod tests {
	use crate::server::tests::{body_json, router};
	use axum::body::Body;
	use axum::http::{Request, StatusCode};
	use relay_config::builders::ConfigBuilder;
	use relay_delivery::testing::{MockRpc, TEST_CONTRACT};
	use std::sync::Arc;
	use tower::ServiceExt;

	fn get() -> Request<Body> {
		Request::builder().uri("/health").body(Body::empty()).unwrap()
	}

	#[tokio::test]
	async fn test_reports_endpoint_status() {
		let config = ConfigBuilder::new()
			.endpoint("mock", "http://mock")
			.contract(TEST_CONTRACT, "nft")
			.build();
		let app = router(config, Arc::new(MockRpc::new("http://mock", 84532)), None).await;

		let response = app.oneshot(get()).await.unwrap();
		assert_eq!(response.status(), StatusCode::OK);
		let body = body_json(response).await;
		assert_eq!(body["chainId"], 84532);
		assert_eq!(body["online"], 1);
		assert_eq!(body["endpoints"][0]["name"], "mock");
	}

	#[tokio::test]
	async fn test_wrong_chain_is_unavailable() {
		let config = ConfigBuilder::new()
			.endpoint("mock", "http://mock")
			.contract(TEST_CONTRACT, "nft")
			.build();
		let app = router(config, Arc::new(MockRpc::new("http://mock", 1)), None).await;

		let response = app.oneshot(get()).await.unwrap();
		assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
		let body = body_json(response).await;
		assert_eq!(body["online"], 0);
	}
}
