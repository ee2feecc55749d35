//! HTTP server for the relay API.

use crate::apis;
use axum::{
	extract::DefaultBodyLimit,
	http::{HeaderName, HeaderValue, Method},
	routing::{get, post},
	Router,
};
use relay_config::{ApiConfig, CorsConfig};
use relay_core::RelayEngine;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	pub engine: Arc<RelayEngine>,
	/// Deadline after which a request stops starting new attempts.
	pub request_timeout: Duration,
}

/// Builds the router with every route and middleware layer.
pub fn build_router(engine: Arc<RelayEngine>, api_config: &ApiConfig) -> Router {
	let state = AppState {
		engine,
		request_timeout: Duration::from_secs(api_config.timeout_seconds),
	};

	Router::new()
		.route("/execute-transaction", post(apis::execute::handle_execute))
		.route("/mint", post(apis::mint::handle_mint))
		.route("/health", get(apis::health::handle_health))
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(cors_layer(api_config.cors.as_ref()))
				.layer(DefaultBodyLimit::max(api_config.max_request_size)),
		)
		.with_state(state)
}

/// Permissive when no `[api.cors]` table is configured.
fn cors_layer(cors: Option<&CorsConfig>) -> CorsLayer {
	let Some(cors) = cors else {
		return CorsLayer::permissive();
	};

	let mut layer = CorsLayer::new();
	if cors.allowed_origins.iter().any(|o| o == "*") {
		layer = layer.allow_origin(Any);
	} else {
		let origins: Vec<HeaderValue> = cors
			.allowed_origins
			.iter()
			.filter_map(|o| match HeaderValue::from_str(o) {
				Ok(value) => Some(value),
				Err(_) => {
					tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
					None
				},
			})
			.collect();
		layer = layer.allow_origin(origins);
	}

	if cors.allowed_methods.is_empty() {
		layer = layer.allow_methods([Method::GET, Method::POST, Method::OPTIONS]);
	} else {
		let methods: Vec<Method> = cors
			.allowed_methods
			.iter()
			.filter_map(|m| m.parse().ok())
			.collect();
		layer = layer.allow_methods(methods);
	}

	if cors.allowed_headers.is_empty() {
		layer = layer.allow_headers(Any);
	} else {
		let headers: Vec<HeaderName> = cors
			.allowed_headers
			.iter()
			.filter_map(|h| h.parse().ok())
			.collect();
		layer = layer.allow_headers(headers);
	}
	layer
}

/// Serves the API until `shutdown` is cancelled.
pub async fn start_server(
	api_config: ApiConfig,
	engine: Arc<RelayEngine>,
	shutdown: CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
	let app = build_router(engine, &api_config);

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Relay API server starting on {}", bind_address);

	axum::serve(listener, app)
		.with_graceful_shutdown(async move { shutdown.cancelled().await })
		.await?;

	Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;
	use axum::body::{to_bytes, Body};
	use axum::http::{Request, StatusCode};
	use relay_config::builders::ConfigBuilder;
	use relay_config::Config;
	use relay_core::{PreparationInterface, RelayBuilder, RelayFactories};
	use relay_delivery::testing::{MockRpc, TEST_CONTRACT};
	use relay_delivery::{DeliveryError, RpcInterface};
	use std::collections::HashMap;
	use tower::ServiceExt;

	pub(crate) fn api_config() -> ApiConfig {
		ApiConfig {
			enabled: true,
			host: "127.0.0.1".into(),
			port: 0,
			timeout_seconds: 300,
			max_request_size: 1024,
			cors: None,
		}
	}

	pub(crate) fn single_endpoint() -> Config {
		ConfigBuilder::new()
			.endpoint("mock", "http://mock")
			.contract(TEST_CONTRACT, "nft")
			.build()
	}

	/// Router over `rpc` with the relay configured by `config`.
	pub(crate) async fn router(
		config: Config,
		rpc: Arc<MockRpc>,
		preparation: Option<Arc<dyn PreparationInterface>>,
	) -> Router {
		let account_factories: HashMap<String, relay_account::AccountFactory> =
			relay_account::get_all_implementations()
				.into_iter()
				.map(|(name, factory)| (name.to_string(), factory))
				.collect();

		let mut builder = RelayBuilder::new(config);
		if let Some(preparation) = preparation {
			builder = builder.with_preparation(preparation);
		}
		let engine = builder
			.build(RelayFactories {
				account_factories,
				rpc_factory: move |url: &str,
				                   _timeout: Duration|
				      -> Result<Arc<dyn RpcInterface>, DeliveryError> {
					if url == rpc.url() {
						Ok(rpc.clone() as Arc<dyn RpcInterface>)
					} else {
						Err(DeliveryError::InvalidUrl(url.to_string()))
					}
				},
			})
			.await
			.unwrap();
		build_router(Arc::new(engine), &api_config())
	}

	pub(crate) fn post_json(uri: &str, body: &str) -> Request<Body> {
		Request::builder()
			.method("POST")
			.uri(uri)
			.header("content-type", "application/json")
			.body(Body::from(body.to_string()))
			.unwrap()
	}

	pub(crate) async fn body_json(response: axum::response::Response) -> serde_json::Value {
		let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
		serde_json::from_slice(&bytes).unwrap()
	}

	#[tokio::test]
	async fn test_unknown_route_is_404() {
		let app = router(single_endpoint(), Arc::new(MockRpc::new("http://mock", 84532)), None).await;
		let response = app
			.oneshot(Request::builder().uri("/orders").body(Body::empty()).unwrap())
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::NOT_FOUND);
	}

	#[tokio::test]
	async fn test_oversized_body_is_rejected() {
		let app = router(single_endpoint(), Arc::new(MockRpc::new("http://mock", 84532)), None).await;
		let data = format!("0x{}", "00".repeat(2048));
		let response = app
			.oneshot(post_json(
				"/execute-transaction",
				&format!(r#"{{"data":"{}"}}"#, data),
			))
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
	}

	#[test]
	fn test_cors_from_config() {
		let cors = CorsConfig {
			allowed_origins: vec!["https://app.example".into(), "not a header\n".into()],
			allowed_headers: vec!["content-type".into()],
			allowed_methods: vec!["POST".into()],
		};
		// builds without panicking on the invalid origin
		let _ = cors_layer(Some(&cors));
		let _ = cors_layer(None);
	}
}
