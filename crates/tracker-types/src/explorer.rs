//! Block explorer record types.
//!
//! Explorers in the Etherscan family report every field of an account
//! transaction as a string. The raw strings are kept as received and decoded
//! lazily, so one malformed field only disables the matching rule that needs
//! it.

use crate::utils::quantity::{parse_quantity, parse_u256};
use crate::{signature, JsonRpcPayload, ProgressId, TransactionConfig, TransactionHash};
use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

/// One entry of an explorer's account transaction list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplorerTransaction {
	#[serde(default)]
	pub hash: String,
	#[serde(default)]
	pub nonce: String,
	#[serde(default)]
	pub from: String,
	#[serde(default)]
	pub to: String,
	#[serde(default)]
	pub value: String,
	#[serde(default)]
	pub input: String,
	#[serde(default)]
	pub block_number: String,
	#[serde(default)]
	pub time_stamp: String,
	#[serde(default)]
	pub is_error: String,
}

impl ExplorerTransaction {
	pub fn tx_hash(&self) -> Option<TransactionHash> {
		self.hash.parse().ok()
	}

	pub fn nonce(&self) -> Option<u64> {
		parse_quantity(&self.nonce)
	}

	pub fn from_address(&self) -> Option<Address> {
		self.from.trim().parse().ok()
	}

	/// Recipient; `None` for contract creations.
	pub fn to_address(&self) -> Option<Address> {
		let to = self.to.trim();
		if to.is_empty() {
			return None;
		}
		to.parse().ok()
	}

	pub fn value_u256(&self) -> Option<U256> {
		parse_u256(&self.value)
	}

	pub fn input_bytes(&self) -> Bytes {
		let input = crate::without_0x_prefix(self.input.trim());
		hex::decode(input).map(Bytes::from).unwrap_or_default()
	}

	/// Content signature, comparable with payload signatures.
	pub fn signature(&self) -> ProgressId {
		signature(
			self.from_address().as_ref(),
			self.to_address().as_ref(),
			&self.input_bytes(),
			self.value_u256(),
		)
	}

	/// Converts the record into an `eth_sendTransaction` payload.
	pub fn to_payload(&self) -> JsonRpcPayload {
		JsonRpcPayload::send_transaction(TransactionConfig {
			from: self.from_address(),
			to: self.to_address(),
			value: self.value_u256(),
			data: Some(self.input_bytes()),
			nonce: self.nonce(),
			..Default::default()
		})
	}

	/// A zero-value, empty-input transfer to the sender itself: the shape
	/// wallets use to cancel a pending transaction.
	pub fn is_cancellation(&self) -> bool {
		match (self.from_address(), self.to_address()) {
			(Some(from), Some(to)) => {
				from == to
					&& self.input_bytes().is_empty()
					&& self.value_u256().unwrap_or(U256::ZERO).is_zero()
			}
			_ => false,
		}
	}
}
