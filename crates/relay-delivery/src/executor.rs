//! Transaction execution state machine.
//!
//! One call to [`TransactionExecutor::execute`] drives one attempt through
//! `Prepared -> Signed -> Broadcast -> Pending` and into a terminal state.
//! Every transition is checked against a static table; the signing lane is
//! held for the whole attempt so the nonce read and the broadcast cannot
//! interleave with another request.

use crate::{
	classify, classify_onchain_revert, wait_for_receipt, DeliveryError, ProviderError,
	ReceiptOutcome, RpcInterface,
};
use once_cell::sync::Lazy;
use relay_account::AccountService;
use relay_types::{
	format_wei, truncate_id, ClassifiedError, ErrorKind, ExecutionAttempt, ExecutionState,
	GasQuote, PreparedCall, UnsignedTransaction,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

static TRANSITIONS: Lazy<HashMap<ExecutionState, HashSet<ExecutionState>>> = Lazy::new(|| {
	use ExecutionState::*;

	let mut m = HashMap::new();
	m.insert(Prepared, HashSet::from([Signed, Failed]));
	m.insert(Signed, HashSet::from([Broadcast, Failed]));
	m.insert(Broadcast, HashSet::from([Pending, Failed]));
	m.insert(Pending, HashSet::from([Confirmed, Reverted, TimedOut]));
	m.insert(Confirmed, HashSet::new()); // terminal
	m.insert(Reverted, HashSet::new()); // terminal
	m.insert(TimedOut, HashSet::new()); // terminal
	m.insert(Failed, HashSet::new()); // terminal
	m
});

pub fn is_valid_transition(from: ExecutionState, to: ExecutionState) -> bool {
	TRANSITIONS
		.get(&from)
		.is_some_and(|set| set.contains(&to))
}

/// Moves `attempt` to `to`, recording it in the history.
pub fn transition(attempt: &mut ExecutionAttempt, to: ExecutionState) -> Result<(), DeliveryError> {
	if !is_valid_transition(attempt.state, to) {
		return Err(DeliveryError::InvalidTransition {
			from: attempt.state,
			to,
		});
	}
	attempt.state = to;
	attempt.history.push(to);
	Ok(())
}

fn fail(
	mut attempt: ExecutionAttempt,
	error: ClassifiedError,
) -> Result<ExecutionAttempt, DeliveryError> {
	tracing::warn!(
		state = %attempt.state,
		kind = %error.kind,
		error = %error.raw_message,
		"Attempt failed"
	);
	transition(&mut attempt, ExecutionState::Failed)?;
	attempt.error = Some(error);
	Ok(attempt)
}

pub struct TransactionExecutor {
	account: Arc<AccountService>,
	confirmations: u64,
	receipt_timeout: Duration,
	poll_interval: Duration,
	/// Process shutdown; ends receipt waits early. Request cancellation never
	/// reaches an attempt in flight.
	shutdown: CancellationToken,
}

impl TransactionExecutor {
	pub fn new(
		account: Arc<AccountService>,
		confirmations: u64,
		receipt_timeout: Duration,
		poll_interval: Duration,
		shutdown: CancellationToken,
	) -> Self {
		Self {
			account,
			confirmations: confirmations.max(1),
			receipt_timeout,
			poll_interval,
			shutdown,
		}
	}

	/// Runs one attempt of `call` on `rpc` to a terminal state.
	///
	/// Failures of the call itself are recorded on the returned attempt; the
	/// `Err` case is reserved for state machine misuse.
	#[instrument(skip_all, fields(
		endpoint = %call.endpoint.name,
		contract = %truncate_id(&format!("{:#x}", call.contract.address)),
		gas_limit = quote.buffered,
	))]
	pub async fn execute(
		&self,
		rpc: &dyn RpcInterface,
		call: PreparedCall,
		quote: GasQuote,
	) -> Result<ExecutionAttempt, DeliveryError> {
		let _lane = self.account.acquire_lane().await;
		let mut attempt = ExecutionAttempt::new(call, quote);

		let tx = match self.build_transaction(rpc, &attempt).await {
			Ok(tx) => tx,
			Err(error) => return fail(attempt, error),
		};

		let signed = match self.account.sign(&tx).await {
			Ok(signed) => signed,
			Err(e) => return fail(attempt, ClassifiedError::new(ErrorKind::Unknown, e.to_string())),
		};
		transition(&mut attempt, ExecutionState::Signed)?;

		let hash = match rpc.send_raw_transaction(&signed.raw).await {
			Ok(hash) => {
				if hash != signed.hash {
					tracing::warn!(
						local = %signed.hash,
						reported = %hash,
						"Endpoint reported a different transaction hash"
					);
				}
				hash
			},
			// The request may have reached the node; only the receipt can tell.
			Err(e @ (ProviderError::Timeout(_) | ProviderError::Connection(_))) => {
				tracing::warn!(
					tx_hash = %truncate_id(&format!("{:#x}", signed.hash)),
					error = %e,
					"Broadcast outcome unknown, tracking the signed transaction"
				);
				signed.hash
			},
			Err(e) => return fail(attempt, classify(&e)),
		};
		attempt.tx_hash = Some(hash);
		transition(&mut attempt, ExecutionState::Broadcast)?;

		let hash_str = format!("{:#x}", hash);
		tracing::info!(tx_hash = %truncate_id(&hash_str), nonce = tx.nonce, "Transaction broadcast");
		transition(&mut attempt, ExecutionState::Pending)?;

		let outcome = wait_for_receipt(
			rpc,
			hash,
			self.confirmations,
			self.receipt_timeout,
			self.poll_interval,
			&self.shutdown,
		)
		.await;

		match outcome {
			ReceiptOutcome::Mined(receipt) => {
				attempt.block_number = Some(receipt.block_number);
				attempt.gas_used = Some(receipt.gas_used);
				if receipt.success {
					transition(&mut attempt, ExecutionState::Confirmed)?;
					tracing::info!(
						tx_hash = %truncate_id(&hash_str),
						block = receipt.block_number,
						gas_used = receipt.gas_used,
						"Transaction confirmed"
					);
				} else {
					transition(&mut attempt, ExecutionState::Reverted)?;
					attempt.error = Some(classify_onchain_revert(&hash_str));
					tracing::warn!(
						tx_hash = %truncate_id(&hash_str),
						block = receipt.block_number,
						"Transaction reverted on-chain"
					);
				}
			},
			ReceiptOutcome::TimedOut => {
				transition(&mut attempt, ExecutionState::TimedOut)?;
			},
		}

		Ok(attempt)
	}

	/// Reads nonce, gas price and balance and builds the transaction.
	async fn build_transaction(
		&self,
		rpc: &dyn RpcInterface,
		attempt: &ExecutionAttempt,
	) -> Result<UnsignedTransaction, ClassifiedError> {
		let call = &attempt.prepared_call;
		let sender = call.caller_address;

		let nonce = rpc
			.get_transaction_count(sender)
			.await
			.map_err(|e| classify(&e))?;
		let gas_price = rpc.gas_price().await.map_err(|e| classify(&e))?;
		let balance = rpc.get_balance(sender).await.map_err(|e| classify(&e))?;

		let tx = UnsignedTransaction {
			chain_id: call.endpoint.chain_id,
			nonce,
			gas_price,
			gas_limit: attempt.gas_quote.buffered,
			to: call.contract.address,
			value: call.value,
			input: call.calldata(),
		};

		let required = tx.max_cost();
		if balance < required {
			return Err(ClassifiedError::new(
				ErrorKind::InsufficientFunds,
				format!(
					"Account {} holds {} but needs up to {}; fund this address to continue",
					sender,
					format_wei(balance),
					format_wei(required)
				),
			));
		}

		tracing::debug!(nonce, gas_price, "Transaction built");
		Ok(tx)
	}
}
