//! Recent-transaction history resolved against the chain.
//!
//! A stored history row only knows the hashes a submission went through.
//! Reading the history asks the chain which of them was mined, presents the
//! row under that hash, and keeps the watcher in step: the losing hashes are
//! unwatched once one is mined, and every hash of an unresolved row is
//! watched again.

use super::{TrackerError, TransactionTracker};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracker_storage::RecentTransaction;
use tracker_types::{
	truncate_id, Address, ChainId, JsonRpcPayload, ReceiptStatus, TransactionHash,
	TransactionReceipt,
};

/// Narrows a history read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct RecentTransactionFilter {
	/// Keep only rows in this status.
	#[serde(default)]
	pub status: Option<ReceiptStatus>,
}

/// A history row with its outcome on chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedTransaction {
	/// Milliseconds since the epoch when the submission was first recorded.
	pub at: u64,
	/// The mined hash, or the latest hash while nothing is mined.
	pub hash: TransactionHash,
	pub payload: JsonRpcPayload,
	/// `NotDepend` until one of the hashes is mined.
	pub status: ReceiptStatus,
	pub receipt: Option<TransactionReceipt>,
	/// Every other hash of the submission (hex) with its payload.
	pub replacements: BTreeMap<String, JsonRpcPayload>,
}

impl ResolvedTransaction {
	fn has_hash(&self, hash: &TransactionHash) -> bool {
		self.hash == *hash || self.replacements.contains_key(&hash.to_string())
	}
}

impl TransactionTracker {
	/// The sender's transaction history on a chain, newest first, with each
	/// row resolved against the chain.
	pub async fn recent_transactions(
		&self,
		chain_id: ChainId,
		account: Address,
		filter: RecentTransactionFilter,
	) -> Result<Vec<ResolvedTransaction>, TrackerError> {
		self.ensure_chain(chain_id)?;
		let entries = self.recent.get_recent_transactions(chain_id, account).await?;

		let resolved = join_all(
			entries
				.into_iter()
				.map(|entry| self.resolve_recent(chain_id, entry)),
		)
		.await;

		Ok(resolved
			.into_iter()
			.filter(|row| filter.status.is_none_or(|status| row.status == status))
			.collect())
	}

	/// The history row holding `hash`, current or superseded.
	pub async fn recent_transaction(
		&self,
		chain_id: ChainId,
		account: Address,
		hash: &TransactionHash,
		filter: RecentTransactionFilter,
	) -> Result<Option<ResolvedTransaction>, TrackerError> {
		Ok(self
			.recent_transactions(chain_id, account, filter)
			.await?
			.into_iter()
			.find(|row| row.has_hash(hash)))
	}

	async fn resolve_recent(&self, chain_id: ChainId, entry: RecentTransaction) -> ResolvedTransaction {
		let RecentTransaction {
			at,
			hash,
			payload,
			replacements,
		} = entry;

		let current = (hash, payload);
		let mut superseded = Vec::with_capacity(replacements.len());
		for (old_hash, payload) in replacements {
			match old_hash.parse::<TransactionHash>() {
				Ok(old_hash) => superseded.push((old_hash, payload)),
				Err(e) => tracing::warn!(
					chain_id,
					hash = %old_hash,
					error = %e,
					"Ignoring malformed superseded hash in history"
				),
			}
		}

		// Index into `current` followed by `superseded`.
		let mut mined = None;
		for (index, (candidate, _)) in std::iter::once(&current).chain(&superseded).enumerate() {
			match self
				.fetcher
				.fetch_receipt(chain_id, candidate, self.receipt_context(chain_id, candidate))
				.await
			{
				Ok(Some(receipt)) if receipt.block_number.is_some() => {
					mined = Some((index, receipt));
					break;
				},
				Ok(_) => {},
				// Unresolved for this read; the watcher keeps trying.
				Err(e) => {
					tracing::debug!(
						chain_id,
						tx_hash = %truncate_id(&candidate.to_string()),
						error = %e,
						"History receipt lookup failed"
					);
					break;
				},
			}
		}

		let Some((index, receipt)) = mined else {
			for (candidate, payload) in std::iter::once(&current).chain(&superseded) {
				self.scheduler.watch(chain_id, *candidate, payload.clone());
			}
			let (hash, payload) = current;
			return ResolvedTransaction {
				at,
				hash,
				payload,
				status: ReceiptStatus::NotDepend,
				receipt: None,
				replacements: into_replacements(superseded),
			};
		};

		let (hash, payload, losers) = if index == 0 {
			(current.0, current.1, superseded)
		} else {
			let (hash, payload) = superseded.swap_remove(index - 1);
			superseded.push(current);
			(hash, payload, superseded)
		};
		for (loser, _) in &losers {
			self.scheduler.unwatch(chain_id, loser);
		}

		let status = match receipt.status_type() {
			ReceiptStatus::Succeed if self.receipt_context(chain_id, &hash).cancellation => {
				ReceiptStatus::Cancelled
			},
			status => status,
		};
		ResolvedTransaction {
			at,
			hash,
			payload,
			status,
			receipt: Some(receipt),
			replacements: into_replacements(losers),
		}
	}
}

fn into_replacements(
	candidates: impl IntoIterator<Item = (TransactionHash, JsonRpcPayload)>,
) -> BTreeMap<String, JsonRpcPayload> {
	candidates
		.into_iter()
		.map(|(hash, payload)| (hash.to_string(), payload))
		.collect()
}
