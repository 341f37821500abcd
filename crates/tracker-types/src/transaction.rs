//! Chain transaction types for the tracker.
//!
//! This module defines the shapes returned by `eth_getTransactionByHash` and
//! `eth_getTransactionReceipt`, together with the hash newtype used as the
//! watch key throughout the system.

use crate::utils::quantity;
use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Blockchain transaction hash representation.
///
/// Parsing is case-insensitive, so two spellings of the same hash always
/// compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionHash(pub B256);

impl TransactionHash {
	/// Returns the lowercase `0x`-prefixed hex form.
	pub fn to_hex(&self) -> String {
		format!("0x{}", hex::encode(self.0))
	}
}

impl fmt::Display for TransactionHash {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.to_hex())
	}
}

impl FromStr for TransactionHash {
	type Err = hex::FromHexError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let bytes = hex::decode(crate::without_0x_prefix(s.trim()))?;
		if bytes.len() != 32 {
			return Err(hex::FromHexError::InvalidStringLength);
		}
		Ok(Self(B256::from_slice(&bytes)))
	}
}

impl From<B256> for TransactionHash {
	fn from(hash: B256) -> Self {
		Self(hash)
	}
}

/// A transaction as returned by `eth_getTransactionByHash`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainTransaction {
	pub hash: TransactionHash,
	pub from: Address,
	#[serde(default)]
	pub to: Option<Address>,
	#[serde(default)]
	pub input: Bytes,
	#[serde(default, with = "quantity::opt_u256")]
	pub value: Option<U256>,
	#[serde(default, with = "quantity::opt_u64")]
	pub nonce: Option<u64>,
	/// `None` while the transaction is still in the mempool.
	#[serde(default, with = "quantity::opt_u64")]
	pub block_number: Option<u64>,
}

/// Transaction receipt containing execution details.
///
/// A receipt without a block number is a pending receipt; some nodes return
/// those for transactions that are known but not yet included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
	pub transaction_hash: TransactionHash,
	#[serde(default, with = "quantity::opt_u64")]
	pub block_number: Option<u64>,
	/// `0x1` on success, `0x0` on revert, absent on pre-Byzantium chains.
	#[serde(default, with = "quantity::opt_u64")]
	pub status: Option<u64>,
	#[serde(default)]
	pub from: Option<Address>,
	#[serde(default)]
	pub to: Option<Address>,
}

impl TransactionReceipt {
	/// Classifies the execution status reported by the receipt.
	///
	/// Receipts never report `Cancelled` by themselves; that status is only
	/// assigned when the tracker knows the receipt belongs to a cancel
	/// replacement.
	pub fn status_type(&self) -> ReceiptStatus {
		match self.status {
			Some(1) => ReceiptStatus::Succeed,
			Some(0) => ReceiptStatus::Failed,
			_ => ReceiptStatus::NotDepend,
		}
	}
}

/// Execution status of a mined transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReceiptStatus {
	/// Executed successfully.
	Succeed,
	/// Reverted.
	Failed,
	/// The receipt carries no usable status.
	NotDepend,
	/// Superseded by a cancel replacement that was mined instead.
	Cancelled,
}
