//! In-memory index of watched transactions.
//!
//! One map per chain from transaction hash to [`WatchRecord`]. Records are
//! ordered newest first; only the newest `max_watched` records with checks
//! left are polled, and everything past that cutoff is evicted on the next
//! round regardless of its remaining checks.

use dashmap::DashMap;
use futures::future::{BoxFuture, Shared};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tracker_types::{
	current_timestamp_millis, payload_signature, Address, ChainId, JsonRpcPayload, ProgressId,
	TransactionHash, TransactionReceipt,
};

/// A receipt lookup shared by every reader of the same record.
///
/// Resolves to `None` when the node has no receipt yet or the call failed.
pub type PendingReceipt = Shared<BoxFuture<'static, Option<TransactionReceipt>>>;

/// Watch state of one transaction hash.
#[derive(Clone)]
pub struct WatchRecord {
	/// Milliseconds since the epoch when the submission was first watched.
	pub created_at: u64,
	/// Check rounds left before the record goes inert.
	pub remaining_checks: u32,
	/// Request that produced the hash.
	pub payload: JsonRpcPayload,
	/// Progress entry fed by receipts of this hash. Carried over replacements.
	pub progress_id: Option<ProgressId>,
	/// Set when the hash replaced another one as a wallet cancel.
	pub cancellation: bool,
	/// Latest receipt lookup, in flight or resolved.
	pub pending_receipt: Option<PendingReceipt>,
	sequence: u64,
}

impl WatchRecord {
	pub fn new(payload: JsonRpcPayload, remaining_checks: u32) -> Self {
		Self {
			created_at: current_timestamp_millis(),
			remaining_checks,
			progress_id: payload_signature(&payload),
			payload,
			cancellation: false,
			pending_receipt: None,
			sequence: 0,
		}
	}

	/// Record for the hash that superseded this one.
	///
	/// Keeps the watch age, the remaining checks and the progress entry; the
	/// receipt lookup starts over.
	pub fn replaced_by(&self, payload: JsonRpcPayload, cancellation: bool) -> Self {
		Self {
			created_at: self.created_at,
			remaining_checks: self.remaining_checks,
			payload,
			progress_id: self.progress_id,
			cancellation,
			pending_receipt: None,
			sequence: self.sequence,
		}
	}

	/// Sender of the watched transaction, taken from the payload.
	pub fn account(&self) -> Option<Address> {
		self.payload.from()
	}

	/// Resolved receipt, if the latest lookup already finished with one.
	pub fn resolved_receipt(&self) -> Option<TransactionReceipt> {
		self.pending_receipt
			.as_ref()
			.and_then(|pending| pending.peek().cloned().flatten())
	}
}

impl fmt::Debug for WatchRecord {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("WatchRecord")
			.field("created_at", &self.created_at)
			.field("remaining_checks", &self.remaining_checks)
			.field("progress_id", &self.progress_id)
			.field("cancellation", &self.cancellation)
			.field("pending_receipt", &self.pending_receipt.is_some())
			.finish()
	}
}

/// Per-chain registry of watched transactions.
pub struct TransactionRegistry {
	chains: DashMap<ChainId, HashMap<TransactionHash, WatchRecord>>,
	sequence: AtomicU64,
	max_watched: usize,
}

impl TransactionRegistry {
	pub fn new(max_watched: usize) -> Self {
		Self {
			chains: DashMap::new(),
			sequence: AtomicU64::new(0),
			max_watched,
		}
	}

	pub fn max_watched(&self) -> usize {
		self.max_watched
	}

	fn next_sequence(&self) -> u64 {
		self.sequence.fetch_add(1, Ordering::Relaxed) + 1
	}

	pub fn has(&self, chain_id: ChainId, hash: &TransactionHash) -> bool {
		self.chains
			.get(&chain_id)
			.is_some_and(|records| records.contains_key(hash))
	}

	pub fn get(&self, chain_id: ChainId, hash: &TransactionHash) -> Option<WatchRecord> {
		self.chains
			.get(&chain_id)
			.and_then(|records| records.get(hash).cloned())
	}

	/// Inserts or overwrites a record. An overwrite keeps the original
	/// insertion order.
	pub fn set(&self, chain_id: ChainId, hash: TransactionHash, mut record: WatchRecord) {
		let mut records = self.chains.entry(chain_id).or_default();
		record.sequence = match records.get(&hash) {
			Some(existing) => existing.sequence,
			None => self.next_sequence(),
		};
		records.insert(hash, record);
	}

	/// Inserts the record unless the hash is already tracked.
	///
	/// Returns `true` when the record was inserted.
	pub fn insert_if_absent(
		&self,
		chain_id: ChainId,
		hash: TransactionHash,
		mut record: WatchRecord,
	) -> bool {
		let mut records = self.chains.entry(chain_id).or_default();
		if records.contains_key(&hash) {
			return false;
		}
		record.sequence = self.next_sequence();
		records.insert(hash, record);
		true
	}

	pub fn remove(&self, chain_id: ChainId, hash: &TransactionHash) -> Option<WatchRecord> {
		self.chains
			.get_mut(&chain_id)
			.and_then(|mut records| records.remove(hash))
	}

	/// Applies `update` to a tracked record. Returns `false` when the hash is
	/// not tracked.
	pub fn update<F>(&self, chain_id: ChainId, hash: &TransactionHash, update: F) -> bool
	where
		F: FnOnce(&mut WatchRecord),
	{
		match self.chains.get_mut(&chain_id) {
			Some(mut records) => match records.get_mut(hash) {
				Some(record) => {
					update(record);
					true
				},
				None => false,
			},
			None => false,
		}
	}

	/// Moves tracking from `old_hash` to `new_hash` in one step.
	///
	/// Returns `false` without changes when `old_hash` is no longer tracked.
	/// When `new_hash` is already tracked its record is kept and only the old
	/// one is dropped.
	pub fn replace(
		&self,
		chain_id: ChainId,
		old_hash: &TransactionHash,
		new_hash: TransactionHash,
		mut record: WatchRecord,
	) -> bool {
		let mut records = self.chains.entry(chain_id).or_default();
		let Some(old) = records.remove(old_hash) else {
			return false;
		};
		if !records.contains_key(&new_hash) {
			record.sequence = old.sequence;
			records.insert(new_hash, record);
		}
		true
	}

	/// All records of a chain, newest first.
	pub fn list(&self, chain_id: ChainId) -> Vec<(TransactionHash, WatchRecord)> {
		let mut entries: Vec<_> = match self.chains.get(&chain_id) {
			Some(records) => records
				.iter()
				.map(|(hash, record)| (*hash, record.clone()))
				.collect(),
			None => Vec::new(),
		};
		entries.sort_by(|(_, a), (_, b)| {
			b.created_at
				.cmp(&a.created_at)
				.then(b.sequence.cmp(&a.sequence))
		});
		entries
	}

	/// Newest records that still have checks left, at most `max_watched`.
	pub fn watched(&self, chain_id: ChainId) -> Vec<(TransactionHash, WatchRecord)> {
		self.list(chain_id)
			.into_iter()
			.filter(|(_, record)| record.remaining_checks > 0)
			.take(self.max_watched)
			.collect()
	}

	/// Records past the `max_watched` cutoff, due for eviction.
	pub fn unwatched(&self, chain_id: ChainId) -> Vec<(TransactionHash, WatchRecord)> {
		self.list(chain_id)
			.into_iter()
			.skip(self.max_watched)
			.collect()
	}

	pub fn watched_accounts(&self, chain_id: ChainId) -> Vec<Address> {
		unique_accounts(&self.watched(chain_id))
	}

	pub fn unwatched_accounts(&self, chain_id: ChainId) -> Vec<Address> {
		unique_accounts(&self.unwatched(chain_id))
	}

	/// Spends one check of every watched record, floored at zero.
	///
	/// Returns the hashes that ran out of checks with this call.
	pub fn decrement_checks(&self, chain_id: ChainId) -> Vec<TransactionHash> {
		let watched: Vec<TransactionHash> = self
			.watched(chain_id)
			.into_iter()
			.map(|(hash, _)| hash)
			.collect();

		let Some(mut records) = self.chains.get_mut(&chain_id) else {
			return Vec::new();
		};
		let mut exhausted = Vec::new();
		for hash in watched {
			if let Some(record) = records.get_mut(&hash) {
				record.remaining_checks = record.remaining_checks.saturating_sub(1);
				if record.remaining_checks == 0 {
					exhausted.push(hash);
				}
			}
		}
		exhausted
	}

	/// The record's receipt lookup, without starting a new one.
	pub fn pending_receipt(
		&self,
		chain_id: ChainId,
		hash: &TransactionHash,
	) -> Option<PendingReceipt> {
		self.chains
			.get(&chain_id)
			.and_then(|records| records.get(hash).and_then(|r| r.pending_receipt.clone()))
	}

	pub fn len(&self, chain_id: ChainId) -> usize {
		self.chains.get(&chain_id).map_or(0, |records| records.len())
	}

	pub fn is_empty(&self, chain_id: ChainId) -> bool {
		self.len(chain_id) == 0
	}
}

fn unique_accounts(entries: &[(TransactionHash, WatchRecord)]) -> Vec<Address> {
	let mut accounts = Vec::new();
	for account in entries.iter().filter_map(|(_, record)| record.account()) {
		if !accounts.contains(&account) {
			accounts.push(account);
		}
	}
	accounts
}

#[cfg(test)]
mod tests {
	use super::*;
	use futures::FutureExt;
	use tracker_types::{TransactionConfig, B256};

	fn hash(byte: u8) -> TransactionHash {
		TransactionHash(B256::repeat_byte(byte))
	}

	fn payload(from: u8, nonce: u64) -> JsonRpcPayload {
		JsonRpcPayload::send_transaction(TransactionConfig {
			from: Some(Address::repeat_byte(from)),
			to: Some(Address::repeat_byte(0xee)),
			nonce: Some(nonce),
			..Default::default()
		})
	}

	fn record_at(created_at: u64, from: u8) -> WatchRecord {
		WatchRecord {
			created_at,
			..WatchRecord::new(payload(from, created_at), 30)
		}
	}

	#[test]
	fn test_insert_is_idempotent() {
		let registry = TransactionRegistry::new(40);
		assert!(registry.insert_if_absent(1, hash(1), record_at(100, 1)));
		assert!(!registry.insert_if_absent(1, hash(1), record_at(200, 1)));

		assert_eq!(registry.len(1), 1);
		assert_eq!(registry.get(1, &hash(1)).unwrap().created_at, 100);
		assert!(!registry.has(137, &hash(1)));
	}

	#[test]
	fn test_list_is_newest_first_with_stable_ties() {
		let registry = TransactionRegistry::new(40);
		registry.set(1, hash(1), record_at(100, 1));
		registry.set(1, hash(2), record_at(300, 1));
		registry.set(1, hash(3), record_at(200, 1));
		registry.set(1, hash(4), record_at(300, 1));

		let order: Vec<_> = registry.list(1).into_iter().map(|(h, _)| h).collect();
		assert_eq!(order, vec![hash(4), hash(2), hash(3), hash(1)]);

		// Overwriting keeps the original position.
		registry.set(1, hash(2), record_at(300, 1));
		let order: Vec<_> = registry.list(1).into_iter().map(|(h, _)| h).collect();
		assert_eq!(order, vec![hash(4), hash(2), hash(3), hash(1)]);
	}

	#[test]
	fn test_watched_is_capped_and_skips_exhausted() {
		let registry = TransactionRegistry::new(3);
		for i in 0..5u8 {
			registry.set(1, hash(i), record_at(i as u64, 1));
		}
		registry.update(1, &hash(4), |record| record.remaining_checks = 0);

		let watched: Vec<_> = registry.watched(1).into_iter().map(|(h, _)| h).collect();
		assert_eq!(watched, vec![hash(3), hash(2), hash(1)]);

		let unwatched: Vec<_> = registry.unwatched(1).into_iter().map(|(h, _)| h).collect();
		assert_eq!(unwatched, vec![hash(1), hash(0)]);
	}

	#[test]
	fn test_accounts_are_deduplicated() {
		let registry = TransactionRegistry::new(2);
		registry.set(1, hash(1), record_at(1, 0xaa));
		registry.set(1, hash(2), record_at(2, 0xaa));
		registry.set(1, hash(3), record_at(3, 0xbb));
		registry.set(1, hash(4), record_at(0, 0xcc));

		assert_eq!(
			registry.watched_accounts(1),
			vec![Address::repeat_byte(0xbb), Address::repeat_byte(0xaa)]
		);
		assert_eq!(
			registry.unwatched_accounts(1),
			vec![Address::repeat_byte(0xaa), Address::repeat_byte(0xcc)]
		);
	}

	#[test]
	fn test_decrement_floors_at_zero() {
		let registry = TransactionRegistry::new(40);
		registry.set(
			1,
			hash(1),
			WatchRecord {
				remaining_checks: 2,
				..record_at(1, 1)
			},
		);

		assert!(registry.decrement_checks(1).is_empty());
		assert_eq!(registry.decrement_checks(1), vec![hash(1)]);
		// Exhausted records are no longer watched, so nothing changes.
		assert!(registry.decrement_checks(1).is_empty());
		assert_eq!(registry.get(1, &hash(1)).unwrap().remaining_checks, 0);
		assert!(registry.watched(1).is_empty());
	}

	#[test]
	fn test_replace_moves_record() {
		let registry = TransactionRegistry::new(40);
		registry.set(1, hash(1), record_at(1, 1));
		registry.set(1, hash(2), record_at(2, 1));

		assert!(registry.replace(1, &hash(1), hash(9), record_at(1, 1)));
		assert!(!registry.has(1, &hash(1)));
		assert!(registry.has(1, &hash(9)));
		let order: Vec<_> = registry.list(1).into_iter().map(|(h, _)| h).collect();
		assert_eq!(order, vec![hash(2), hash(9)]);

		// Old hash gone: nothing to replace.
		assert!(!registry.replace(1, &hash(1), hash(10), record_at(1, 1)));
		assert!(!registry.has(1, &hash(10)));
	}

	#[tokio::test]
	async fn test_pending_receipt_is_shared() {
		let registry = TransactionRegistry::new(40);
		registry.set(1, hash(1), record_at(1, 1));
		assert!(registry.pending_receipt(1, &hash(1)).is_none());

		let pending: PendingReceipt = async { None }.boxed().shared();
		registry.update(1, &hash(1), |record| {
			record.pending_receipt = Some(pending.clone())
		});

		let cached = registry.pending_receipt(1, &hash(1)).unwrap();
		assert_eq!(cached.await, None);
		assert!(registry.get(1, &hash(1)).unwrap().resolved_receipt().is_none());
	}
}
