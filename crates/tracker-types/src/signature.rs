//! Content-derived progress identifiers.
//!
//! A logical submission keeps its identity across hash replacements because
//! the identifier is computed from the transaction's content rather than
//! from its hash. Every function here is pure: the same inputs always give
//! the same identifier and nothing is cached.

use crate::{ChainTransaction, JsonRpcPayload, TransactionConfig};
use alloy_primitives::{keccak256, Address, B256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fixed-width fingerprint of one logical submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProgressId(pub B256);

impl fmt::Display for ProgressId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "0x{}", hex::encode(self.0))
	}
}

impl FromStr for ProgressId {
	type Err = hex::FromHexError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let bytes = hex::decode(crate::without_0x_prefix(s.trim()))?;
		if bytes.len() != 32 {
			return Err(hex::FromHexError::InvalidStringLength);
		}
		Ok(Self(B256::from_slice(&bytes)))
	}
}

fn address_part(address: Option<&Address>) -> String {
	address
		.map(|a| format!("0x{}", hex::encode(a)))
		.unwrap_or_default()
}

/// Computes the signature of a transaction from its content.
///
/// The preimage is `{from}_{to}_{input}_{value}` with lowercase hex
/// addresses, `0x0` for empty input and the value as minimal hex, so a
/// decimal explorer value and a hex payload value agree.
pub fn signature(
	from: Option<&Address>,
	to: Option<&Address>,
	input: &[u8],
	value: Option<U256>,
) -> ProgressId {
	let input = if input.is_empty() {
		"0x0".to_string()
	} else {
		format!("0x{}", hex::encode(input))
	};
	let value = format!("{:#x}", value.unwrap_or(U256::ZERO));
	let preimage = [address_part(from), address_part(to), input, value].join("_");
	ProgressId(keccak256(preimage.as_bytes()))
}

/// Signature of a transaction config.
pub fn config_signature(config: &TransactionConfig) -> ProgressId {
	signature(
		config.from.as_ref(),
		config.to.as_ref(),
		config.data.as_ref().map(|data| &data[..]).unwrap_or(&[]),
		config.value,
	)
}

/// Signature derived from a request payload, if it carries a transaction config.
pub fn payload_signature(payload: &JsonRpcPayload) -> Option<ProgressId> {
	payload.config().as_ref().map(config_signature)
}

/// Signature of a transaction observed on chain.
pub fn transaction_signature(transaction: &ChainTransaction) -> ProgressId {
	signature(
		Some(&transaction.from),
		transaction.to.as_ref(),
		&transaction.input,
		transaction.value,
	)
}

impl ProgressId {
	/// Derives the progress id for a submission.
	///
	/// The payload-derived signature is preferred; the transaction content is
	/// the fallback for payloads without a transaction config.
	pub fn derive(
		payload: Option<&JsonRpcPayload>,
		transaction: Option<&ChainTransaction>,
	) -> Option<Self> {
		payload
			.and_then(payload_signature)
			.or_else(|| transaction.map(transaction_signature))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::TransactionHash;
	use alloy_primitives::{address, Bytes};

	fn config() -> TransactionConfig {
		TransactionConfig {
			from: Some(address!("5fbdb2315678afecb367f032d93f642f64180aa3")),
			to: Some(address!("e7f1725e7734ce288f8367e1bb143e90bb3f0512")),
			value: Some(U256::from(1_000_000_000_000_000_000u128)),
			data: Some(Bytes::from(vec![0xa9, 0x05, 0x9c, 0xbb])),
			nonce: Some(3),
			..Default::default()
		}
	}

	#[test]
	fn test_payload_and_chain_transaction_agree() {
		let config = config();
		let payload = JsonRpcPayload::send_transaction(config.clone());
		let mined = ChainTransaction {
			hash: TransactionHash(B256::repeat_byte(0x11)),
			from: config.from.unwrap(),
			to: config.to,
			input: config.data.clone().unwrap(),
			value: config.value,
			nonce: Some(3),
			block_number: Some(100),
		};

		assert_eq!(payload_signature(&payload), Some(transaction_signature(&mined)));
	}

	#[test]
	fn test_signature_ignores_nonce_and_gas() {
		let a = config();
		let b = TransactionConfig {
			nonce: Some(4),
			gas: Some(21_000),
			..config()
		};
		assert_eq!(config_signature(&a), config_signature(&b));
	}

	#[test]
	fn test_signature_depends_on_value() {
		let a = config();
		let b = TransactionConfig {
			value: Some(U256::from(2u64)),
			..config()
		};
		assert_ne!(config_signature(&a), config_signature(&b));
	}

	#[test]
	fn test_missing_value_equals_zero_value() {
		let a = TransactionConfig {
			value: None,
			..config()
		};
		let b = TransactionConfig {
			value: Some(U256::ZERO),
			..config()
		};
		assert_eq!(config_signature(&a), config_signature(&b));
	}

	#[test]
	fn test_derive_falls_back_to_transaction() {
		let raw = JsonRpcPayload {
			jsonrpc: "2.0".into(),
			id: serde_json::Value::Null,
			method: "eth_sendRawTransaction".into(),
			params: vec![],
		};
		let mined = ChainTransaction {
			hash: TransactionHash(B256::repeat_byte(0x22)),
			from: Address::ZERO,
			to: None,
			input: Bytes::new(),
			value: None,
			nonce: None,
			block_number: None,
		};
		assert_eq!(
			ProgressId::derive(Some(&raw), Some(&mined)),
			Some(transaction_signature(&mined))
		);
		assert_eq!(ProgressId::derive(Some(&raw), None), None);
	}

	#[test]
	fn test_progress_id_display_round_trip() {
		let id = config_signature(&config());
		let parsed: ProgressId = id.to_string().parse().unwrap();
		assert_eq!(parsed, id);
	}
}
