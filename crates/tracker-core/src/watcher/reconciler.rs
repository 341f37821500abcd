//! Explorer reconciler.
//!
//! Wallets replace pending transactions (speed-up, cancel) by broadcasting a
//! new transaction with the same nonce. The chain never links the two
//! hashes, so the reconciler reads the account's latest transactions from a
//! block explorer and matches them against the watched records: by hash, by
//! nonce, then by content signature. A match under a different hash moves
//! the watch to the new hash and records the replacement in the history.

use super::registry::{TransactionRegistry, WatchRecord};
use crate::engine::event_bus::EventBus;
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;
use tracker_explorer::ExplorerService;
use tracker_storage::RecentTransactionStore;
use tracker_types::{
	payload_signature, truncate_id, Address, ChainId, ExplorerTransaction, TrackerEvent,
	TransactionHash, WatcherEvent,
};

/// Errors that can occur while reconciling an account.
///
/// Both are transient: the next watcher round tries again.
#[derive(Debug, Error)]
pub enum ReconcileError {
	#[error("Explorer error: {0}")]
	Explorer(String),
	#[error("Storage error: {0}")]
	Storage(String),
}

/// A watched hash superseded by another transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
	pub old_hash: TransactionHash,
	pub new_hash: TransactionHash,
	pub cancellation: bool,
}

/// Detects replaced transactions through a block explorer.
pub struct ExplorerReconciler {
	explorer: ExplorerService,
	registry: Arc<TransactionRegistry>,
	store: Arc<dyn RecentTransactionStore>,
	event_bus: EventBus,
	latest_transaction_size: usize,
}

impl ExplorerReconciler {
	pub fn new(
		explorer: ExplorerService,
		registry: Arc<TransactionRegistry>,
		store: Arc<dyn RecentTransactionStore>,
		event_bus: EventBus,
		latest_transaction_size: usize,
	) -> Self {
		Self {
			explorer,
			registry,
			store,
			event_bus,
			latest_transaction_size,
		}
	}

	/// Whether the chain has an explorer to reconcile against.
	pub fn supports(&self, chain_id: ChainId) -> bool {
		self.explorer.supports(chain_id)
	}

	/// Matches the account's latest explorer transactions against its
	/// watched records and applies every replacement found.
	#[instrument(skip_all, fields(chain_id = chain_id, account = %account))]
	pub async fn reconcile(
		&self,
		chain_id: ChainId,
		account: Address,
	) -> Result<Vec<Replacement>, ReconcileError> {
		let latest = self
			.explorer
			.get_latest_transactions(chain_id, &account, self.latest_transaction_size)
			.await
			.map_err(|e| ReconcileError::Explorer(e.to_string()))?;

		let watched: Vec<(TransactionHash, WatchRecord)> = self
			.registry
			.watched(chain_id)
			.into_iter()
			.filter(|(_, record)| record.account() == Some(account))
			.collect();

		let mut replacements = Vec::new();
		for candidate in &latest {
			// The explorer also lists transactions the account received.
			if candidate.from_address() != Some(account) {
				continue;
			}
			let Some(new_hash) = candidate.tx_hash() else {
				continue;
			};
			let Some((old_hash, record)) = watched
				.iter()
				.find(|(hash, record)| Self::matches(candidate, &new_hash, hash, record))
			else {
				continue;
			};
			if *old_hash == new_hash {
				continue;
			}

			let cancellation = candidate.is_cancellation();
			let payload = candidate.to_payload();
			// Another candidate may already have replaced this record.
			if !self.registry.replace(
				chain_id,
				old_hash,
				new_hash,
				record.replaced_by(payload.clone(), cancellation),
			) {
				continue;
			}

			tracing::info!(
				old_hash = %truncate_id(&old_hash.to_string()),
				new_hash = %truncate_id(&new_hash.to_string()),
				cancellation,
				"Transaction replaced"
			);

			self.store
				.replace_recent_transaction(chain_id, account, *old_hash, new_hash, payload)
				.await
				.map_err(|e| ReconcileError::Storage(e.to_string()))?;

			self.event_bus
				.publish(TrackerEvent::Watcher(WatcherEvent::TransactionReplaced {
					chain_id,
					account,
					old_hash: *old_hash,
					new_hash,
					cancellation,
				}));

			replacements.push(Replacement {
				old_hash: *old_hash,
				new_hash,
				cancellation,
			});
		}

		Ok(replacements)
	}

	/// Hash equality, then nonce equality, then signature equality.
	///
	/// A payload nonce decides on its own; only payloads without one fall
	/// through to the signature.
	fn matches(
		candidate: &ExplorerTransaction,
		candidate_hash: &TransactionHash,
		hash: &TransactionHash,
		record: &WatchRecord,
	) -> bool {
		if candidate_hash == hash {
			return true;
		}
		if let Some(nonce) = record.payload.nonce() {
			return candidate.nonce() == Some(nonce);
		}
		payload_signature(&record.payload) == Some(candidate.signature())
	}
}
