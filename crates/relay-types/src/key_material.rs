//! Signing key text read from configuration.

use std::fmt;
use zeroize::Zeroizing;

/// Hex private key as written in `[account.implementations.local]`.
///
/// The text is zeroed on drop and never formatted; signers read it through
/// [`KeyMaterial::expose`].
pub struct KeyMaterial(Zeroizing<String>);

impl KeyMaterial {
	/// Surrounding whitespace (a trailing newline from a pasted key) is dropped.
	pub fn new(text: &str) -> Self {
		Self(Zeroizing::new(text.trim().to_string()))
	}

	pub fn expose<R>(&self, f: impl FnOnce(&str) -> R) -> R {
		f(&self.0)
	}
}

impl fmt::Debug for KeyMaterial {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "KeyMaterial({} chars)", self.0.len())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

	#[test]
	fn test_debug_hides_key() {
		let key = KeyMaterial::new(KEY);
		assert_eq!(format!("{:?}", key), "KeyMaterial(66 chars)");
	}

	#[test]
	fn test_pasted_key_is_trimmed() {
		let key = KeyMaterial::new(&format!("  {}\n", KEY));
		assert!(key.expose(|text| text == KEY));
	}
}
