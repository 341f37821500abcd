//! Progress state of a tracked submission.
//!
//! Lifecycle: Unknown -> WaitForConfirming -> Hash -> Receipt -> Confirmed,
//! with Failed reachable from every non-terminal state. The legal transitions
//! are enforced by the progress state machine in `tracker-core`.

use crate::{JsonRpcPayload, ProgressId, TransactionHash, TransactionReceipt};
use serde::{Deserialize, Serialize};

/// Failure reason for a reverted transaction.
pub const REASON_FAILED: &str = "FAILED";
/// Failure reason for a transaction superseded by a cancel replacement.
pub const REASON_CANCELLED: &str = "CANCELLED";
/// Failure reason for a receipt without a usable status.
pub const REASON_INVALID_STATUS: &str = "Invalid transaction status.";

/// Discriminant of [`TransactionState`], used for transition checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStateType {
	Unknown,
	WaitForConfirming,
	Hash,
	Receipt,
	Confirmed,
	Failed,
}

impl TransactionStateType {
	/// Confirmed and Failed accept no further transitions.
	pub fn is_final(&self) -> bool {
		matches!(self, Self::Confirmed | Self::Failed)
	}
}

/// Progress state of a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionState {
	Unknown,
	WaitForConfirming,
	Hash {
		hash: TransactionHash,
	},
	Receipt {
		receipt: TransactionReceipt,
	},
	Confirmed {
		receipt: TransactionReceipt,
	},
	Failed {
		receipt: Option<TransactionReceipt>,
		error: String,
	},
}

impl TransactionState {
	pub fn kind(&self) -> TransactionStateType {
		match self {
			Self::Unknown => TransactionStateType::Unknown,
			Self::WaitForConfirming => TransactionStateType::WaitForConfirming,
			Self::Hash { .. } => TransactionStateType::Hash,
			Self::Receipt { .. } => TransactionStateType::Receipt,
			Self::Confirmed { .. } => TransactionStateType::Confirmed,
			Self::Failed { .. } => TransactionStateType::Failed,
		}
	}

	pub fn is_final(&self) -> bool {
		self.kind().is_final()
	}

	/// Hash this state refers to, if any.
	pub fn hash(&self) -> Option<TransactionHash> {
		match self {
			Self::Hash { hash } => Some(*hash),
			Self::Receipt { receipt } | Self::Confirmed { receipt } => {
				Some(receipt.transaction_hash)
			}
			Self::Failed {
				receipt: Some(receipt),
				..
			} => Some(receipt.transaction_hash),
			_ => None,
		}
	}
}

/// Snapshot of a progress entry, as broadcast to observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionProgress {
	pub progress_id: ProgressId,
	pub state: TransactionState,
	pub payload: JsonRpcPayload,
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::B256;

	#[test]
	fn test_final_states() {
		assert!(TransactionStateType::Confirmed.is_final());
		assert!(TransactionStateType::Failed.is_final());
		assert!(!TransactionStateType::Receipt.is_final());
		assert!(!TransactionStateType::Unknown.is_final());
	}

	#[test]
	fn test_state_serializes_with_type_tag() {
		let state = TransactionState::Hash {
			hash: TransactionHash(B256::repeat_byte(0xab)),
		};
		let json = serde_json::to_value(&state).unwrap();
		assert_eq!(json["type"], "HASH");
		assert_eq!(state.kind(), TransactionStateType::Hash);
		assert_eq!(state.hash(), Some(TransactionHash(B256::repeat_byte(0xab))));

		let waiting = serde_json::to_value(TransactionState::WaitForConfirming).unwrap();
		assert_eq!(waiting["type"], "WAIT_FOR_CONFIRMING");
	}
}
