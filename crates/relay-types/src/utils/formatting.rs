//! String formatting for logs and operator-facing messages.

use alloy_primitives::U256;

/// Shortens a hash or id for log lines: first 10 characters then `..`.
pub fn truncate_id(id: &str) -> String {
	if id.len() <= 10 {
		id.to_string()
	} else {
		format!("{}..", &id[..10])
	}
}

pub fn with_0x_prefix(hex_str: &str) -> String {
	if hex_str.starts_with("0x") || hex_str.starts_with("0X") {
		hex_str.to_string()
	} else {
		format!("0x{}", hex_str)
	}
}

pub fn without_0x_prefix(hex_str: &str) -> &str {
	hex_str
		.strip_prefix("0x")
		.or_else(|| hex_str.strip_prefix("0X"))
		.unwrap_or(hex_str)
}

/// Renders a wei amount in ether with trailing zeros removed, e.g. `0.0015 ETH`.
pub fn format_wei(amount: U256) -> String {
	let digits = amount.to_string();
	let decimals = 18usize;

	let (whole, fraction) = if digits.len() <= decimals {
		("0".to_string(), format!("{:0>width$}", digits, width = decimals))
	} else {
		let split = digits.len() - decimals;
		(digits[..split].to_string(), digits[split..].to_string())
	};

	let fraction = fraction.trim_end_matches('0');
	if fraction.is_empty() {
		format!("{} ETH", whole)
	} else {
		format!("{}.{} ETH", whole, fraction)
	}
}
