//! Notifier bridging chain RPC observations into progress transitions.
//!
//! Every receipt the tracker sees, whether fetched by the watcher or read
//! live on request, passes through here. The receipt is classified into a
//! progress state, applied to the submission it belongs to, and broadcast as
//! a hash-level state update for observers that do not track submissions.

use crate::engine::event_bus::EventBus;
use crate::state::ProgressStateMachine;
use std::sync::Arc;
use tracing::instrument;
use tracker_types::{
	transaction_signature, truncate_id, ChainId, ChainTransaction, ProgressId, ReceiptStatus,
	StateEvent, TrackerEvent, TransactionReceipt, TransactionState, REASON_CANCELLED,
	REASON_FAILED, REASON_INVALID_STATUS,
};

/// What the tracker knows about the hash a receipt belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiptContext {
	/// Submission the hash was watched for.
	pub progress_id: Option<ProgressId>,
	/// The hash is a wallet cancel replacing the submitted transaction.
	pub cancellation: bool,
}

/// Feeds chain observations to the progress state machine.
pub struct Notifier {
	progress: Arc<ProgressStateMachine>,
	event_bus: EventBus,
}

impl Notifier {
	pub fn new(progress: Arc<ProgressStateMachine>, event_bus: EventBus) -> Self {
		Self {
			progress,
			event_bus,
		}
	}

	/// Classifies a receipt into a progress state.
	///
	/// A receipt without a block number is still pending inclusion. A
	/// successful cancel replacement means the submission itself never ran.
	pub fn receipt_state(receipt: &TransactionReceipt, cancellation: bool) -> TransactionState {
		if receipt.block_number.is_none() {
			return TransactionState::Receipt {
				receipt: receipt.clone(),
			};
		}

		let status = match receipt.status_type() {
			ReceiptStatus::Succeed if cancellation => ReceiptStatus::Cancelled,
			status => status,
		};
		let error = match status {
			ReceiptStatus::Succeed => {
				return TransactionState::Confirmed {
					receipt: receipt.clone(),
				}
			},
			ReceiptStatus::Failed => REASON_FAILED,
			ReceiptStatus::Cancelled => REASON_CANCELLED,
			ReceiptStatus::NotDepend => REASON_INVALID_STATUS,
		};
		TransactionState::Failed {
			receipt: Some(receipt.clone()),
			error: error.to_string(),
		}
	}

	/// Handles an `eth_getTransactionByHash` result.
	///
	/// Moves the submission with the same content signature to `Hash`.
	pub fn notify_transaction(&self, transaction: &ChainTransaction) -> bool {
		let progress_id = transaction_signature(transaction);
		self.progress.apply_transition(
			&progress_id,
			TransactionState::Hash {
				hash: transaction.hash,
			},
		)
	}

	/// Handles an `eth_getTransactionReceipt` result.
	///
	/// The submission is the one the hash was watched for, or else the one
	/// whose current state already refers to the hash. The hash-level update
	/// is broadcast either way. Returns whether a submission advanced.
	#[instrument(skip_all, fields(chain_id = chain_id, tx_hash = %truncate_id(&receipt.transaction_hash.to_string())))]
	pub fn notify_receipt(
		&self,
		chain_id: ChainId,
		receipt: &TransactionReceipt,
		context: ReceiptContext,
	) -> bool {
		let state = Self::receipt_state(receipt, context.cancellation);

		let advanced = context
			.progress_id
			.or_else(|| self.progress.find_by_hash(&receipt.transaction_hash))
			.is_some_and(|progress_id| self.progress.apply_transition(&progress_id, state.clone()));

		tracing::debug!(state = ?state.kind(), advanced, "Receipt observed");
		self.event_bus.publish(TrackerEvent::State(StateEvent::Updated {
			chain_id,
			hash: receipt.transaction_hash,
			state,
		}));
		advanced
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tracker_types::{
		payload_signature, Address, JsonRpcPayload, TransactionConfig, TransactionHash,
		TransactionStateType, B256, U256,
	};

	fn receipt(block_number: Option<u64>, status: Option<u64>) -> TransactionReceipt {
		TransactionReceipt {
			transaction_hash: TransactionHash(B256::repeat_byte(0xab)),
			block_number,
			status,
			from: None,
			to: None,
		}
	}

	fn config() -> TransactionConfig {
		TransactionConfig {
			from: Some(Address::repeat_byte(0x11)),
			to: Some(Address::repeat_byte(0x22)),
			value: Some(U256::from(5)),
			nonce: Some(3),
			..Default::default()
		}
	}

	fn setup() -> (Notifier, Arc<ProgressStateMachine>, EventBus, ProgressId) {
		let bus = EventBus::new(64);
		let progress = Arc::new(ProgressStateMachine::new(bus.clone()));
		let payload = JsonRpcPayload::send_transaction(config());
		let progress_id = payload_signature(&payload).unwrap();
		progress.begin_tracking(progress_id, TransactionState::WaitForConfirming, payload);
		(
			Notifier::new(progress.clone(), bus.clone()),
			progress,
			bus,
			progress_id,
		)
	}

	#[test]
	fn test_receipt_classification() {
		let state = |r: &TransactionReceipt, cancel| Notifier::receipt_state(r, cancel);

		assert_eq!(
			state(&receipt(None, Some(1)), false).kind(),
			TransactionStateType::Receipt
		);
		assert_eq!(
			state(&receipt(Some(1), Some(1)), false).kind(),
			TransactionStateType::Confirmed
		);

		let failed = |r: &TransactionReceipt, cancel| match state(r, cancel) {
			TransactionState::Failed { error, .. } => error,
			other => panic!("expected failure, got {:?}", other),
		};
		assert_eq!(failed(&receipt(Some(1), Some(0)), false), REASON_FAILED);
		assert_eq!(failed(&receipt(Some(1), None), false), REASON_INVALID_STATUS);
		assert_eq!(failed(&receipt(Some(1), Some(1)), true), REASON_CANCELLED);
		// A reverted cancel is still a plain failure.
		assert_eq!(failed(&receipt(Some(1), Some(0)), true), REASON_FAILED);
	}

	#[test]
	fn test_pending_then_mined_receipt() {
		let (notifier, progress, _bus, progress_id) = setup();
		let context = ReceiptContext {
			progress_id: Some(progress_id),
			cancellation: false,
		};

		assert!(notifier.notify_receipt(1, &receipt(None, None), context));
		assert_eq!(
			progress.get(&progress_id).unwrap().state.kind(),
			TransactionStateType::Receipt
		);

		assert!(notifier.notify_receipt(1, &receipt(Some(7), Some(1)), context));
		assert!(progress.get(&progress_id).is_none());
	}

	#[test]
	fn test_receipt_found_through_hash_state() {
		let (notifier, progress, _bus, progress_id) = setup();
		progress.apply_transition(
			&progress_id,
			TransactionState::Hash {
				hash: TransactionHash(B256::repeat_byte(0xab)),
			},
		);

		assert!(notifier.notify_receipt(
			1,
			&receipt(Some(7), Some(0)),
			ReceiptContext::default()
		));
		assert!(progress.is_empty());
	}

	#[tokio::test]
	async fn test_untracked_receipt_is_still_broadcast() {
		let (notifier, _progress, bus, _) = setup();
		let mut events = bus.subscribe();

		assert!(!notifier.notify_receipt(
			137,
			&receipt(Some(7), Some(1)),
			ReceiptContext::default()
		));
		match events.recv().await.unwrap() {
			TrackerEvent::State(StateEvent::Updated {
				chain_id, state, ..
			}) => {
				assert_eq!(chain_id, 137);
				assert_eq!(state.kind(), TransactionStateType::Confirmed);
			},
			other => panic!("unexpected event {:?}", other),
		}
	}

	#[test]
	fn test_transaction_lookup_moves_to_hash() {
		let (notifier, progress, _bus, progress_id) = setup();
		let config = config();
		let transaction = ChainTransaction {
			hash: TransactionHash(B256::repeat_byte(0xab)),
			from: config.from.unwrap(),
			to: config.to,
			input: Default::default(),
			value: config.value,
			nonce: config.nonce,
			block_number: None,
		};

		assert!(notifier.notify_transaction(&transaction));
		assert_eq!(
			progress.get(&progress_id).unwrap().state,
			TransactionState::Hash {
				hash: transaction.hash
			}
		);
	}
}
