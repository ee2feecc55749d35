//! Private-key signer held in process memory.

use crate::{AccountError, AccountFactory, AccountInterface, AccountRegistry};
use alloy_consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy_eips::eip2718::Encodable2718;
use alloy_network::TxSignerSync;
use alloy_primitives::TxKind;
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use relay_types::{
	Address, ConfigSchema, Field, FieldType, ImplementationRegistry, KeyMaterial, Schema,
	SignedTransaction, UnsignedTransaction, ValidationError,
};
use std::str::FromStr;

/// Config: `private_key = "0x..."` (32 bytes, hex).
pub struct LocalWalletSchema;

impl LocalWalletSchema {
	fn schema() -> Schema {
		Schema::new(
			vec![Field::new("private_key", FieldType::String).with_validator(|value| {
				let key = value.as_str().unwrap_or_default().trim();
				let hex_part = relay_types::without_0x_prefix(key);
				if hex_part.len() != 64 {
					return Err("Private key must be 32 bytes of hex".to_string());
				}
				if !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
					return Err("Private key must be valid hex".to_string());
				}
				Ok(())
			})],
			vec![],
		)
	}
}

impl ConfigSchema for LocalWalletSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Self::schema().validate(config)
	}
}

pub struct LocalWallet {
	signer: PrivateKeySigner,
}

impl LocalWallet {
	pub fn new(private_key: &KeyMaterial) -> Result<Self, AccountError> {
		let signer = private_key
			.expose(PrivateKeySigner::from_str)
			.map_err(|e| AccountError::InvalidKey(e.to_string()))?;
		Ok(Self { signer })
	}
}

#[async_trait]
impl AccountInterface for LocalWallet {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(LocalWalletSchema)
	}

	async fn address(&self) -> Result<Address, AccountError> {
		Ok(self.signer.address())
	}

	async fn sign_transaction(
		&self,
		tx: &UnsignedTransaction,
	) -> Result<SignedTransaction, AccountError> {
		let mut legacy = TxLegacy {
			chain_id: Some(tx.chain_id),
			nonce: tx.nonce,
			gas_price: tx.gas_price,
			gas_limit: tx.gas_limit,
			to: TxKind::Call(tx.to),
			value: tx.value,
			input: tx.input.clone(),
		};

		let signature = self
			.signer
			.sign_transaction_sync(&mut legacy)
			.map_err(|e| AccountError::SigningFailed(e.to_string()))?;
		let envelope = TxEnvelope::from(legacy.into_signed(signature));

		Ok(SignedTransaction {
			hash: *envelope.tx_hash(),
			raw: envelope.encoded_2718().into(),
		})
	}
}

pub fn create_account(config: &toml::Value) -> Result<Box<dyn AccountInterface>, AccountError> {
	LocalWalletSchema
		.validate(config)
		.map_err(|e| AccountError::InvalidKey(e.to_string()))?;

	let key = config
		.get("private_key")
		.and_then(|v| v.as_str())
		.map(KeyMaterial::new)
		.ok_or_else(|| AccountError::InvalidKey("private_key is required".to_string()))?;

	Ok(Box::new(LocalWallet::new(&key)?))
}

pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "local";
	type Factory = AccountFactory;

	fn factory() -> Self::Factory {
		create_account
	}
}

impl AccountRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use relay_types::{Bytes, U256};

	const KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

	fn config(key: &str) -> toml::Value {
		let mut table = toml::map::Map::new();
		table.insert("private_key".into(), toml::Value::String(key.into()));
		toml::Value::Table(table)
	}

	#[tokio::test]
	async fn test_address_matches_key() {
		let account = create_account(&config(KEY)).unwrap();
		let expected = Address::from_str("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266").unwrap();
		assert_eq!(account.address().await.unwrap(), expected);
	}

	#[tokio::test]
	async fn test_key_with_trailing_newline() {
		let account = create_account(&config(&format!("{}\n", KEY))).unwrap();
		let expected = Address::from_str("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266").unwrap();
		assert_eq!(account.address().await.unwrap(), expected);
	}

	#[test]
	fn test_rejects_malformed_key() {
		assert!(matches!(
			create_account(&config("0x1234")),
			Err(AccountError::InvalidKey(_))
		));
		assert!(create_account(&toml::Value::Table(Default::default())).is_err());
	}

	#[tokio::test]
	async fn test_signing_is_deterministic() {
		let account = create_account(&config(KEY)).unwrap();
		let tx = UnsignedTransaction {
			chain_id: 84532,
			nonce: 7,
			gas_price: 1_000_000_000,
			gas_limit: 100_000,
			to: Address::ZERO,
			value: U256::ZERO,
			input: Bytes::from_static(&[0x40, 0xc1, 0x0f, 0x19]),
		};

		let first = account.sign_transaction(&tx).await.unwrap();
		let second = account.sign_transaction(&tx).await.unwrap();
		assert_eq!(first, second);
		assert!(!first.raw.is_empty());

		let other = account
			.sign_transaction(&UnsignedTransaction { nonce: 8, ..tx })
			.await
			.unwrap();
		assert_ne!(first.hash, other.hash);
	}
}
