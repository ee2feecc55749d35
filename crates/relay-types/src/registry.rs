//! Self-registration of pluggable implementations.
//!
//! Crates with interchangeable backends (signing accounts, RPC transports)
//! expose one `Registry` per backend. The config names the backend and the
//! owning crate looks up its factory by that name.

/// Associates a configuration name with a factory.
pub trait ImplementationRegistry {
	/// Key under `implementations` in the TOML file, e.g. `local` for
	/// `[account.implementations.local]`.
	const NAME: &'static str;

	/// Factory signature, defined by the owning crate.
	type Factory;

	fn factory() -> Self::Factory;
}
