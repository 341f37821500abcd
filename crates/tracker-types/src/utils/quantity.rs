//! Serde adapters for numeric quantities.
//!
//! Chain nodes encode quantities as `0x`-prefixed hex strings, explorers as
//! decimal strings, and wallets sometimes as plain JSON numbers. The adapters
//! here accept all three and always serialize back to the JSON-RPC hex form.

use alloy_primitives::U256;
use serde::{Deserialize, Deserializer, Serializer};
use std::str::FromStr;

#[derive(Deserialize)]
#[serde(untagged)]
enum RawQuantity {
	Number(u64),
	Text(String),
}

/// Parses a hex (`0x`-prefixed) or decimal string into a `u64`.
pub fn parse_quantity(value: &str) -> Option<u64> {
	let value = value.trim();
	if value.is_empty() {
		return None;
	}
	match value
		.strip_prefix("0x")
		.or_else(|| value.strip_prefix("0X"))
	{
		Some("") => Some(0),
		Some(hex) => u64::from_str_radix(hex, 16).ok(),
		None => value.parse().ok(),
	}
}

/// Parses a hex (`0x`-prefixed) or decimal string into a `U256`.
pub fn parse_u256(value: &str) -> Option<U256> {
	let value = value.trim();
	if value.is_empty() {
		return None;
	}
	if value.eq_ignore_ascii_case("0x") {
		return Some(U256::ZERO);
	}
	U256::from_str(value).ok()
}

/// `Option<u64>` quantity adapter, for fields such as `blockNumber` and `status`.
pub mod opt_u64 {
	use super::*;

	pub fn serialize<S>(value: &Option<u64>, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		match value {
			Some(v) => serializer.serialize_str(&format!("{:#x}", v)),
			None => serializer.serialize_none(),
		}
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
	where
		D: Deserializer<'de>,
	{
		match Option::<RawQuantity>::deserialize(deserializer)? {
			None => Ok(None),
			Some(RawQuantity::Number(n)) => Ok(Some(n)),
			Some(RawQuantity::Text(s)) if s.trim().is_empty() => Ok(None),
			Some(RawQuantity::Text(s)) => parse_quantity(&s)
				.map(Some)
				.ok_or_else(|| serde::de::Error::custom(format!("invalid quantity '{}'", s))),
		}
	}
}

/// `Option<U256>` quantity adapter, for transaction values.
pub mod opt_u256 {
	use super::*;

	pub fn serialize<S>(value: &Option<U256>, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		match value {
			Some(v) => serializer.serialize_str(&format!("{:#x}", v)),
			None => serializer.serialize_none(),
		}
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<U256>, D::Error>
	where
		D: Deserializer<'de>,
	{
		match Option::<RawQuantity>::deserialize(deserializer)? {
			None => Ok(None),
			Some(RawQuantity::Number(n)) => Ok(Some(U256::from(n))),
			Some(RawQuantity::Text(s)) if s.trim().is_empty() => Ok(None),
			Some(RawQuantity::Text(s)) => parse_u256(&s)
				.map(Some)
				.ok_or_else(|| serde::de::Error::custom(format!("invalid quantity '{}'", s))),
		}
	}
}
