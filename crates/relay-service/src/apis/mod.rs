//! Route handlers and the response mapping they share.

pub mod execute;
pub mod health;
pub mod mint;

use crate::server::AppState;
use axum::{
	extract::rejection::JsonRejection,
	http::StatusCode,
	response::{IntoResponse, Json, Response},
};
use relay_core::RelayEngine;
use relay_types::{ErrorResponse, ExecuteTransactionResponse, TransactionResult};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub(crate) fn error_response(status: StatusCode, kind: &str, message: impl Into<String>) -> Response {
	(
		status,
		Json(ErrorResponse::new(message, kind, status.as_u16())),
	)
		.into_response()
}

/// 413 stays 413; every other body problem is a malformed request.
pub(crate) fn reject(rejection: JsonRejection) -> Response {
	tracing::warn!(error = %rejection.body_text(), "Rejected request body");
	let status = match rejection.status() {
		StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
		_ => StatusCode::BAD_REQUEST,
	};
	error_response(status, "invalid_request", rejection.body_text())
}

/// 200 for success or demonstration, 202 for a timed-out broadcast, and the
/// classified status for a failure.
pub(crate) fn respond(result: &TransactionResult) -> Response {
	if let Some(body) = ErrorResponse::from_result(result) {
		let status =
			StatusCode::from_u16(body.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
		return (status, Json(body)).into_response();
	}
	if !result.success && !result.is_timed_out() {
		return error_response(
			StatusCode::INTERNAL_SERVER_ERROR,
			"unknown",
			"Execution failed without a classified error",
		);
	}

	let status = if result.is_timed_out() {
		StatusCode::ACCEPTED
	} else {
		StatusCode::OK
	};
	(status, Json(ExecuteTransactionResponse::from(result))).into_response()
}

/// Runs `work` on its own task so that an attempt in flight completes even if
/// the client goes away.
///
/// The token handed to `work` is cancelled when the client disconnects or the
/// request deadline passes; the engine then stops before its next attempt.
pub(crate) async fn run_cancellable<T, F, Fut>(state: &AppState, work: F) -> Result<T, Response>
where
	F: FnOnce(Arc<RelayEngine>, CancellationToken) -> Fut,
	Fut: Future<Output = T> + Send + 'static,
	T: Send + 'static,
{
	let cancel = CancellationToken::new();
	// dropped with the handler future when the connection closes
	let _disconnect = cancel.clone().drop_guard();

	let mut task = tokio::spawn(work(state.engine.clone(), cancel.clone()));
	let joined = tokio::select! {
		joined = &mut task => joined,
		_ = tokio::time::sleep(state.request_timeout) => {
			tracing::warn!(
				timeout_seconds = state.request_timeout.as_secs(),
				"Request deadline reached, stopping after the current attempt"
			);
			cancel.cancel();
			(&mut task).await
		}
	};

	joined.map_err(|e| {
		tracing::error!(error = %e, "Request task failed");
		error_response(StatusCode::INTERNAL_SERVER_ERROR, "unknown", "Internal error")
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::server::tests::body_json;
	use relay_types::{ClassifiedError, ErrorKind, ExecutionState, B256};

	#[tokio::test]
	async fn test_failure_uses_classified_status() {
		let error = ClassifiedError::new(ErrorKind::NonceConflict, "nonce too low");
		let response = respond(&TransactionResult::failure(error, vec![]));
		assert_eq!(response.status(), StatusCode::CONFLICT);

		let body = body_json(response).await;
		assert_eq!(body["success"], false);
		assert_eq!(body["classifiedKind"], "nonce_conflict");
		assert_eq!(body["statusCode"], 409);
	}

	#[tokio::test]
	async fn test_timed_out_is_accepted() {
		let error = ClassifiedError::new(ErrorKind::EndpointUnavailable, "receipt wait expired");
		let mut result = TransactionResult::failure(error, vec![]);
		result.status = Some(ExecutionState::TimedOut);
		result.tx_hash = Some(B256::repeat_byte(0xab));
		result.explanation = Some("may still be mined".into());

		let response = respond(&result);
		assert_eq!(response.status(), StatusCode::ACCEPTED);
		let body = body_json(response).await;
		assert_eq!(body["status"], "timed_out");
		assert_eq!(body["error"], "may still be mined");
		assert!(body["transactionHash"].as_str().is_some());
	}
}
