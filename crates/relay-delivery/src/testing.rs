//! Scripted in-process RPC endpoint for tests.
//!
//! [`MockRpc`] answers every [`RpcInterface`] method from a small in-memory
//! chain. Responses that tests need to vary (estimates, broadcasts, receipts)
//! can be scripted per call; everything else has a sensible default.

use crate::{CallRequest, ProviderError, RpcInterface};
use async_trait::async_trait;
use relay_account::{implementations::local, AccountService};
use relay_types::{
	Address, Bytes, ContractTarget, PreparedCall, RpcEndpoint, TransactionReceipt, B256, U256,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Semaphore;

/// Anvil's first development key.
pub const TEST_PRIVATE_KEY: &str =
	"0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

/// Address the default test contract is deployed at.
pub const TEST_CONTRACT: Address = Address::new([0x5f; 20]);

/// Mint calldata: a four-byte selector followed by one zero argument word.
pub const MINT_CALLDATA: [u8; 36] = {
	let mut data = [0u8; 36];
	data[0] = 0xd8;
	data[1] = 0x5d;
	data[2] = 0x3d;
	data[3] = 0x27;
	data
};

/// Gas reported by every scripted receipt.
pub const RECEIPT_GAS_USED: u64 = 48_000;

/// What the endpoint does once a transaction has been broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptMode {
	Success,
	Revert,
	/// Never mined.
	Never,
}

/// Scripted result of one `eth_sendRawTransaction`.
enum SendOutcome {
	Accept,
	Reject(ProviderError),
	/// Mined, but the reply never reaches the caller.
	Lose(ProviderError),
}

struct MockState {
	chain_id: Result<u64, ProviderError>,
	hang: bool,
	code: HashMap<Address, Bytes>,
	missing_selectors: HashSet<[u8; 4]>,
	estimates: VecDeque<Result<u64, ProviderError>>,
	default_estimate: u64,
	nonce: u64,
	balance: U256,
	gas_price: u128,
	sends: VecDeque<SendOutcome>,
	call_gate: Option<Arc<Semaphore>>,
	receipt_mode: ReceiptMode,
	block_number: u64,
	mined: HashMap<B256, u64>,
	calls: Vec<&'static str>,
}

pub struct MockRpc {
	url: String,
	state: Mutex<MockState>,
}

impl MockRpc {
	/// A funded, reachable endpoint with [`TEST_CONTRACT`] deployed.
	pub fn new(url: impl Into<String>, chain_id: u64) -> Self {
		let mut code = HashMap::new();
		code.insert(TEST_CONTRACT, Bytes::from_static(&[0x60, 0x80, 0x60, 0x40]));
		Self {
			url: url.into(),
			state: Mutex::new(MockState {
				chain_id: Ok(chain_id),
				hang: false,
				code,
				missing_selectors: HashSet::new(),
				estimates: VecDeque::new(),
				default_estimate: 50_000,
				nonce: 0,
				balance: U256::from(10u128 * 10u128.pow(18)),
				gas_price: 1_000_000_000,
				sends: VecDeque::new(),
				call_gate: None,
				receipt_mode: ReceiptMode::Success,
				block_number: 100,
				mined: HashMap::new(),
				calls: Vec::new(),
			}),
		}
	}

	fn state(&self) -> MutexGuard<'_, MockState> {
		self.state.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Every call on this endpoint fails with `error`.
	pub fn fail_with(&self, error: ProviderError) {
		self.state().chain_id = Err(error);
	}

	/// Every call on this endpoint waits forever.
	pub fn hang(&self) {
		self.state().hang = true;
	}

	pub fn set_code(&self, address: Address, code: Bytes) {
		self.state().code.insert(address, code);
	}

	pub fn remove_code(&self, address: Address) {
		self.state().code.remove(&address);
	}

	pub fn missing_selector(&self, selector: [u8; 4]) {
		self.state().missing_selectors.insert(selector);
	}

	pub fn push_estimate(&self, result: Result<u64, ProviderError>) {
		self.state().estimates.push_back(result);
	}

	pub fn set_balance(&self, balance: U256) {
		self.state().balance = balance;
	}

	pub fn set_nonce(&self, nonce: u64) {
		self.state().nonce = nonce;
	}

	pub fn push_send(&self, result: Result<(), ProviderError>) {
		let outcome = match result {
			Ok(()) => SendOutcome::Accept,
			Err(e) => SendOutcome::Reject(e),
		};
		self.state().sends.push_back(outcome);
	}

	/// The next broadcast is mined but the caller sees `error`.
	pub fn push_lost_send(&self, error: ProviderError) {
		self.state().sends.push_back(SendOutcome::Lose(error));
	}

	/// Holds every `eth_call` until a permit is added to the returned gate.
	pub fn gate_calls(&self) -> Arc<Semaphore> {
		let gate = Arc::new(Semaphore::new(0));
		self.state().call_gate = Some(gate.clone());
		gate
	}

	pub fn set_receipt_mode(&self, mode: ReceiptMode) {
		self.state().receipt_mode = mode;
	}

	/// Method names in call order.
	pub fn calls(&self) -> Vec<&'static str> {
		self.state().calls.clone()
	}

	pub fn count(&self, method: &str) -> usize {
		self.state().calls.iter().filter(|m| **m == method).count()
	}

	async fn enter(&self, method: &'static str) -> Result<(), ProviderError> {
		let hang = {
			let mut state = self.state();
			state.calls.push(method);
			state.hang
		};
		if hang {
			std::future::pending::<()>().await;
		}
		self.state().chain_id.clone().map(|_| ())
	}
}

#[async_trait]
impl RpcInterface for MockRpc {
	fn url(&self) -> &str {
		&self.url
	}

	async fn chain_id(&self) -> Result<u64, ProviderError> {
		self.enter("eth_chainId").await?;
		self.state().chain_id.clone()
	}

	async fn get_code(&self, address: Address) -> Result<Bytes, ProviderError> {
		self.enter("eth_getCode").await?;
		Ok(self.state().code.get(&address).cloned().unwrap_or_default())
	}

	async fn call(&self, request: &CallRequest) -> Result<Bytes, ProviderError> {
		self.enter("eth_call").await?;
		let gate = self.state().call_gate.clone();
		if let Some(gate) = gate {
			if let Ok(permit) = gate.acquire().await {
				permit.forget();
			}
		}
		let state = self.state();
		if !state.code.contains_key(&request.to) {
			return Ok(Bytes::new());
		}
		let selector: Option<[u8; 4]> = request.data.get(..4).and_then(|s| s.try_into().ok());
		match selector {
			Some(s) if state.missing_selectors.contains(&s) => Err(ProviderError::Rpc {
				code: -32000,
				message: "function selector was not recognized and there's no fallback function"
					.into(),
				data: None,
			}),
			_ => Ok(Bytes::new()),
		}
	}

	async fn estimate_gas(&self, _request: &CallRequest) -> Result<u64, ProviderError> {
		self.enter("eth_estimateGas").await?;
		let mut state = self.state();
		let default = state.default_estimate;
		state.estimates.pop_front().unwrap_or(Ok(default))
	}

	async fn get_transaction_count(&self, _address: Address) -> Result<u64, ProviderError> {
		self.enter("eth_getTransactionCount").await?;
		Ok(self.state().nonce)
	}

	async fn get_balance(&self, _address: Address) -> Result<U256, ProviderError> {
		self.enter("eth_getBalance").await?;
		Ok(self.state().balance)
	}

	async fn gas_price(&self) -> Result<u128, ProviderError> {
		self.enter("eth_gasPrice").await?;
		Ok(self.state().gas_price)
	}

	async fn send_raw_transaction(&self, raw: &Bytes) -> Result<B256, ProviderError> {
		self.enter("eth_sendRawTransaction").await?;
		let mut state = self.state();
		let lost = match state.sends.pop_front().unwrap_or(SendOutcome::Accept) {
			SendOutcome::Accept => None,
			SendOutcome::Reject(e) => return Err(e),
			SendOutcome::Lose(e) => Some(e),
		};

		// Legacy transactions hash to keccak of their encoding.
		let hash = alloy_primitives::keccak256(raw);
		state.nonce += 1;
		state.block_number += 1;
		let block = state.block_number;
		state.mined.insert(hash, block);
		match lost {
			Some(e) => Err(e),
			None => Ok(hash),
		}
	}

	async fn get_transaction_receipt(
		&self,
		hash: B256,
	) -> Result<Option<TransactionReceipt>, ProviderError> {
		self.enter("eth_getTransactionReceipt").await?;
		let state = self.state();
		let Some(block_number) = state.mined.get(&hash).copied() else {
			return Ok(None);
		};
		Ok(match state.receipt_mode {
			ReceiptMode::Never => None,
			mode => Some(TransactionReceipt {
				hash,
				block_number,
				gas_used: RECEIPT_GAS_USED,
				success: mode == ReceiptMode::Success,
			}),
		})
	}

	async fn block_number(&self) -> Result<u64, ProviderError> {
		self.enter("eth_blockNumber").await?;
		let mut state = self.state();
		state.block_number += 1;
		Ok(state.block_number)
	}
}

/// Account service signing with [`TEST_PRIVATE_KEY`].
pub fn test_account() -> Arc<AccountService> {
	let mut table = toml::map::Map::new();
	table.insert(
		"private_key".to_string(),
		toml::Value::String(TEST_PRIVATE_KEY.to_string()),
	);
	let config = toml::Value::Table(table);
	let account = match local::create_account(&config) {
		Ok(account) => account,
		Err(e) => panic!("test key must be valid: {}", e),
	};
	Arc::new(AccountService::new(account))
}

/// Address of [`TEST_PRIVATE_KEY`].
pub fn test_address() -> Address {
	Address::new([
		0xf3, 0x9f, 0xd6, 0xe5, 0x1a, 0xad, 0x88, 0xf6, 0xf4, 0xce, 0x6a, 0xb8, 0x82, 0x72, 0x79,
		0xcf, 0xff, 0xb9, 0x22, 0x66,
	])
}

/// A mint call against [`TEST_CONTRACT`] on `rpc`'s endpoint.
pub fn prepared_call(rpc: &MockRpc) -> PreparedCall {
	let endpoint = RpcEndpoint::new("mock", rpc.url(), 84532);
	let mut contract = ContractTarget::unverified(TEST_CONTRACT, "nft");
	contract.bytecode_verified = true;
	match PreparedCall::new(endpoint, contract, &MINT_CALLDATA, U256::ZERO, test_address()) {
		Some(call) => call,
		None => panic!("mint calldata carries a selector"),
	}
}
