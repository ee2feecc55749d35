//! Common types for the transaction relay.
//!
//! This crate defines the data model shared by every stage of the execution
//! pipeline: endpoints and their health, resolved contract targets, prepared
//! calls, gas quotes, execution attempts and the caller-visible result.

/// HTTP request and response bodies.
pub mod api;
/// Failure taxonomy produced by the classifier.
pub mod classification;
/// Contract targets and function selectors.
pub mod contract;
/// Signed and unsigned transactions, receipts.
pub mod delivery;
/// RPC endpoints and probe status.
pub mod endpoint;
/// Prepared calls, gas quotes and execution attempts.
pub mod execution;
/// Transaction intents supplied by callers.
pub mod intent;
/// Zeroed private key text.
pub mod key_material;
/// Self-registering implementation factories.
pub mod registry;
/// Caller-visible transaction outcome.
pub mod result;
/// Hex and display helpers.
pub mod utils;
/// TOML schema validation.
pub mod validation;

pub use alloy_primitives::{Address, Bytes, Selector, B256, U256};
pub use api::*;
pub use classification::{ClassifiedError, ErrorKind};
pub use contract::{parse_selector, ContractTarget};
pub use delivery::{SignedTransaction, TransactionReceipt, UnsignedTransaction};
pub use endpoint::{EndpointStatus, RpcEndpoint};
pub use execution::{ExecutionAttempt, ExecutionState, GasQuote, GasSource, PreparedCall};
pub use intent::{IntentError, PreparedIntent, TransactionIntent};
pub use key_material::KeyMaterial;
pub use registry::ImplementationRegistry;
pub use result::{explorer_tx_url, AttemptSummary, ExecutionMode, TransactionResult};
pub use utils::{current_timestamp, format_wei, truncate_id, with_0x_prefix, without_0x_prefix};
pub use validation::*;
