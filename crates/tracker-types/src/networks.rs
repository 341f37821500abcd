//! Network configuration types for multi-chain tracking.
//!
//! This module defines the per-chain settings the tracker needs: the RPC
//! endpoint used for receipt lookups and the optional block explorer used
//! to reconcile replacement transactions.

use crate::ApiKey;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Block explorer endpoint for a network.
///
/// # Fields
///
/// * `api_url` - Etherscan-compatible API endpoint
/// * `api_keys` - API keys; blank entries (an unset `${VAR:-}`) are skipped
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExplorerConfig {
	pub api_url: String,
	#[serde(default)]
	pub api_keys: Vec<ApiKey>,
}

impl ExplorerConfig {
	/// The key sent with every request: the first configured key that is
	/// not blank. A list whose first entry is blank therefore falls through
	/// to the next key instead of sending an empty `apikey`.
	pub fn first_usable_key(&self) -> Option<&ApiKey> {
		self.api_keys.iter().find(|key| !key.is_blank())
	}
}

/// Configuration for a single blockchain network.
///
/// # Fields
///
/// * `rpc_url` - The HTTP(S) RPC endpoint for receipt and transaction lookups
/// * `explorer` - Optional explorer used to detect replacement transactions
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
	pub rpc_url: String,
	#[serde(default)]
	pub explorer: Option<ExplorerConfig>,
}

/// Networks configuration mapping chain IDs to their configurations.
pub type NetworksConfig = HashMap<u64, NetworkConfig>;

/// Helper function to deserialize network configurations from TOML.
///
/// TOML tables only have string keys, so chain IDs arrive as strings and are
/// converted to `u64` here.
///
/// # Errors
///
/// Returns a deserialization error if a chain ID key cannot be parsed as a u64.
pub fn deserialize_networks<'de, D>(deserializer: D) -> Result<NetworksConfig, D::Error>
where
	D: Deserializer<'de>,
{
	let string_map: HashMap<String, NetworkConfig> = HashMap::deserialize(deserializer)?;
	let mut result = HashMap::new();

	for (key, value) in string_map {
		let chain_id = key
			.parse::<u64>()
			.map_err(|e| serde::de::Error::custom(format!("Invalid chain_id '{}': {}", key, e)))?;
		result.insert(chain_id, value);
	}

	Ok(result)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_blank_keys_are_skipped() {
		let explorer = ExplorerConfig {
			api_url: "https://api.etherscan.io/api".into(),
			api_keys: vec![ApiKey::new(""), ApiKey::new("KEY1"), ApiKey::new("KEY2")],
		};
		assert_eq!(explorer.first_usable_key().unwrap().expose(), "KEY1");
	}

	#[test]
	fn test_first_key_wins() {
		let explorer = ExplorerConfig {
			api_url: "https://api.etherscan.io/api".into(),
			api_keys: vec![ApiKey::new("KEY1"), ApiKey::new("KEY2")],
		};
		assert_eq!(explorer.first_usable_key().unwrap().expose(), "KEY1");
	}

	#[test]
	fn test_no_keys() {
		let explorer = ExplorerConfig {
			api_url: "https://api.etherscan.io/api".into(),
			api_keys: vec![],
		};
		assert!(explorer.first_usable_key().is_none());
	}
}
