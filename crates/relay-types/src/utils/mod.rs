//! Hex and display helpers shared across the relay crates.

pub mod formatting;

pub use formatting::{format_wei, truncate_id, with_0x_prefix, without_0x_prefix};

/// Seconds since the Unix epoch, or 0 if the clock is before it.
pub fn current_timestamp() -> u64 {
	std::time::SystemTime::now()
		.duration_since(std::time::UNIX_EPOCH)
		.map(|d| d.as_secs())
		.unwrap_or(0)
}
