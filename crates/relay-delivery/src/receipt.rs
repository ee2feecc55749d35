//! Receipt polling.

use crate::RpcInterface;
use relay_types::{truncate_id, TransactionReceipt, B256};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiptOutcome {
	/// Mined with the requested confirmation depth.
	Mined(TransactionReceipt),
	/// No sufficiently confirmed receipt within the window, or cancelled.
	TimedOut,
}

/// Polls for `hash` until it is mined with `confirmations` blocks on top
/// (the inclusion block counts as the first), `window` elapses, or `cancel`
/// fires.
///
/// Failed polls are logged and retried; they never end the wait early.
pub async fn wait_for_receipt(
	rpc: &dyn RpcInterface,
	hash: B256,
	confirmations: u64,
	window: Duration,
	poll_interval: Duration,
	cancel: &CancellationToken,
) -> ReceiptOutcome {
	let hash_str = format!("{:#x}", hash);
	let poll = async {
		loop {
			if let Some(receipt) = poll_once(rpc, hash, confirmations, &hash_str).await {
				return receipt;
			}
			tokio::time::sleep(poll_interval).await;
		}
	};

	tokio::select! {
		_ = cancel.cancelled() => {
			tracing::warn!(tx_hash = %truncate_id(&hash_str), "Receipt wait cancelled");
			ReceiptOutcome::TimedOut
		}
		result = tokio::time::timeout(window, poll) => match result {
			Ok(receipt) => ReceiptOutcome::Mined(receipt),
			Err(_) => {
				tracing::warn!(
					tx_hash = %truncate_id(&hash_str),
					window_secs = window.as_secs(),
					"No receipt within wait window"
				);
				ReceiptOutcome::TimedOut
			}
		},
	}
}

async fn poll_once(
	rpc: &dyn RpcInterface,
	hash: B256,
	confirmations: u64,
	hash_str: &str,
) -> Option<TransactionReceipt> {
	let receipt = match rpc.get_transaction_receipt(hash).await {
		Ok(Some(receipt)) => receipt,
		Ok(None) => {
			tracing::debug!(tx_hash = %truncate_id(hash_str), "Not mined yet");
			return None;
		},
		Err(e) => {
			tracing::debug!(tx_hash = %truncate_id(hash_str), error = %e, "Receipt poll failed");
			return None;
		},
	};

	if confirmations <= 1 {
		return Some(receipt);
	}

	match rpc.block_number().await {
		Ok(current) => {
			let depth = current.saturating_sub(receipt.block_number) + 1;
			if depth >= confirmations {
				Some(receipt)
			} else {
				tracing::debug!(
					tx_hash = %truncate_id(hash_str),
					depth,
					confirmations,
					"Waiting for confirmations"
				);
				None
			}
		},
		Err(e) => {
			tracing::debug!(error = %e, "Block number poll failed");
			None
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::{MockRpc, ReceiptMode};
	use relay_types::Bytes;

	async fn broadcast(rpc: &MockRpc) -> B256 {
		rpc.send_raw_transaction(&Bytes::from_static(&[0x01, 0x02]))
			.await
			.unwrap()
	}

	#[tokio::test(start_paused = true)]
	async fn test_returns_mined_receipt() {
		let rpc = MockRpc::new("http://a", 84532);
		let hash = broadcast(&rpc).await;

		let outcome = wait_for_receipt(
			&rpc,
			hash,
			1,
			Duration::from_secs(10),
			Duration::from_millis(100),
			&CancellationToken::new(),
		)
		.await;
		let ReceiptOutcome::Mined(receipt) = outcome else {
			panic!("expected a receipt, got {:?}", outcome);
		};
		assert!(receipt.success);
		assert_eq!(receipt.hash, hash);
	}

	#[tokio::test(start_paused = true)]
	async fn test_waits_for_depth() {
		let rpc = MockRpc::new("http://a", 84532);
		let hash = broadcast(&rpc).await;

		let outcome = wait_for_receipt(
			&rpc,
			hash,
			3,
			Duration::from_secs(10),
			Duration::from_millis(100),
			&CancellationToken::new(),
		)
		.await;
		assert!(matches!(outcome, ReceiptOutcome::Mined(_)));
		// mock advances one block per eth_blockNumber call
		assert!(rpc.count("eth_blockNumber") >= 2);
	}

	#[tokio::test(start_paused = true)]
	async fn test_times_out_when_never_mined() {
		let rpc = MockRpc::new("http://a", 84532);
		rpc.set_receipt_mode(ReceiptMode::Never);
		let hash = broadcast(&rpc).await;

		let outcome = wait_for_receipt(
			&rpc,
			hash,
			1,
			Duration::from_secs(5),
			Duration::from_secs(1),
			&CancellationToken::new(),
		)
		.await;
		assert_eq!(outcome, ReceiptOutcome::TimedOut);
		assert!(rpc.count("eth_getTransactionReceipt") >= 5);
	}

	#[tokio::test(start_paused = true)]
	async fn test_cancellation_stops_wait() {
		let rpc = MockRpc::new("http://a", 84532);
		rpc.set_receipt_mode(ReceiptMode::Never);
		let hash = broadcast(&rpc).await;
		let cancel = CancellationToken::new();
		cancel.cancel();

		let outcome = wait_for_receipt(
			&rpc,
			hash,
			1,
			Duration::from_secs(3600),
			Duration::from_secs(1),
			&cancel,
		)
		.await;
		assert_eq!(outcome, ReceiptOutcome::TimedOut);
	}
}
