//! JSON-RPC request payloads.
//!
//! A watched transaction is described by the request that produced it, for
//! example an `eth_sendTransaction` call. The payload is otherwise opaque to
//! the tracker; only the embedded transaction config is ever inspected.

use crate::utils::quantity;
use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

/// Methods whose first parameter is a transaction config object.
const CONFIG_METHODS: &[&str] = &[
	"eth_sendTransaction",
	"eth_signTransaction",
	"eth_call",
	"eth_estimateGas",
	"mask_replaceTransaction",
];

fn default_jsonrpc() -> String {
	"2.0".to_string()
}

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcPayload {
	#[serde(default = "default_jsonrpc")]
	pub jsonrpc: String,
	#[serde(default)]
	pub id: serde_json::Value,
	pub method: String,
	#[serde(default)]
	pub params: Vec<serde_json::Value>,
}

impl JsonRpcPayload {
	/// Builds an `eth_sendTransaction` request carrying the given config.
	pub fn send_transaction(config: TransactionConfig) -> Self {
		Self {
			jsonrpc: default_jsonrpc(),
			id: serde_json::Value::Null,
			method: "eth_sendTransaction".to_string(),
			params: vec![serde_json::to_value(config).unwrap_or(serde_json::Value::Null)],
		}
	}

	/// Extracts the transaction config, if this request carries one.
	///
	/// Returns `None` for methods without a config parameter and for configs
	/// that fail to decode.
	pub fn config(&self) -> Option<TransactionConfig> {
		if !CONFIG_METHODS.contains(&self.method.as_str()) {
			return None;
		}
		let first = self.params.first()?;
		serde_json::from_value(first.clone()).ok()
	}

	/// Sender of the embedded transaction.
	pub fn from(&self) -> Option<Address> {
		self.config().and_then(|config| config.from)
	}

	/// Nonce of the embedded transaction.
	pub fn nonce(&self) -> Option<u64> {
		self.config().and_then(|config| config.nonce)
	}
}

/// Transaction fields of a send/sign request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionConfig {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub from: Option<Address>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub to: Option<Address>,
	#[serde(
		default,
		with = "quantity::opt_u256",
		skip_serializing_if = "Option::is_none"
	)]
	pub value: Option<U256>,
	#[serde(default, alias = "input", skip_serializing_if = "Option::is_none")]
	pub data: Option<Bytes>,
	#[serde(
		default,
		with = "quantity::opt_u64",
		skip_serializing_if = "Option::is_none"
	)]
	pub nonce: Option<u64>,
	#[serde(
		default,
		with = "quantity::opt_u64",
		skip_serializing_if = "Option::is_none"
	)]
	pub gas: Option<u64>,
	#[serde(
		default,
		with = "quantity::opt_u256",
		skip_serializing_if = "Option::is_none"
	)]
	pub gas_price: Option<U256>,
	#[serde(
		default,
		with = "quantity::opt_u256",
		skip_serializing_if = "Option::is_none"
	)]
	pub max_fee_per_gas: Option<U256>,
	#[serde(
		default,
		with = "quantity::opt_u256",
		skip_serializing_if = "Option::is_none"
	)]
	pub max_priority_fee_per_gas: Option<U256>,
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn test_config_extracted_from_send_transaction() {
		let payload: JsonRpcPayload = serde_json::from_value(json!({
			"jsonrpc": "2.0",
			"id": 7,
			"method": "eth_sendTransaction",
			"params": [{
				"from": "0x5fbdb2315678afecb367f032d93f642f64180aa3",
				"to": "0xe7f1725e7734ce288f8367e1bb143e90bb3f0512",
				"value": "0x1",
				"data": "0x",
				"nonce": "0x5"
			}]
		}))
		.unwrap();

		let config = payload.config().unwrap();
		assert_eq!(config.nonce, Some(5));
		assert_eq!(config.value, Some(U256::from(1u64)));
		assert_eq!(payload.nonce(), Some(5));
		assert!(payload.from().is_some());
	}

	#[test]
	fn test_input_alias_accepted() {
		let config: TransactionConfig = serde_json::from_value(json!({ "input": "0xa9059cbb" })).unwrap();
		assert_eq!(config.data.unwrap().len(), 4);
	}

	#[test]
	fn test_raw_transaction_has_no_config() {
		let payload = JsonRpcPayload {
			jsonrpc: "2.0".into(),
			id: json!(1),
			method: "eth_sendRawTransaction".into(),
			params: vec![json!("0xf86b")],
		};
		assert!(payload.config().is_none());
		assert!(payload.nonce().is_none());
	}

	#[test]
	fn test_send_transaction_builder_round_trips_config() {
		let config = TransactionConfig {
			nonce: Some(9),
			..Default::default()
		};
		let payload = JsonRpcPayload::send_transaction(config.clone());
		assert_eq!(payload.config(), Some(config));
	}
}
