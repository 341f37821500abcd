//! Recent-transaction history per chain and account.
//!
//! Each account keeps a newest-first list of the transactions it sent. When
//! a transaction is replaced (sped up or cancelled from the wallet) the entry
//! moves to the new hash and remembers every hash it superseded, so the
//! history shows one row per logical submission.

use crate::{StorageError, StorageService};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracker_types::{
	current_timestamp_millis, Address, ChainId, JsonRpcPayload, StorageKey, TransactionHash,
};

/// Entries kept per account; older ones are dropped.
pub const MAX_RECENT_TRANSACTIONS: usize = 20;

/// One row of an account's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentTransaction {
	/// Milliseconds since the epoch when the submission was first recorded.
	pub at: u64,
	/// Current hash of the submission.
	pub hash: TransactionHash,
	/// Request that produced the current hash.
	pub payload: JsonRpcPayload,
	/// Superseded hashes (hex) with the payloads that produced them.
	#[serde(default)]
	pub replacements: BTreeMap<String, JsonRpcPayload>,
}

impl RecentTransaction {
	/// Whether `hash` is the current or any superseded hash of this entry.
	pub fn has_hash(&self, hash: &TransactionHash) -> bool {
		self.hash == *hash || self.replacements.contains_key(&hash.to_string())
	}
}

/// Persistent store of recently sent transactions.
#[async_trait]
pub trait RecentTransactionStore: Send + Sync {
	async fn add_recent_transaction(
		&self,
		chain_id: ChainId,
		account: Address,
		hash: TransactionHash,
		payload: JsonRpcPayload,
	) -> Result<(), StorageError>;

	async fn remove_recent_transaction(
		&self,
		chain_id: ChainId,
		account: Address,
		hash: TransactionHash,
	) -> Result<(), StorageError>;

	/// Moves the entry holding `old_hash` to `new_hash`. When no entry holds
	/// `old_hash` the new hash is recorded as a fresh entry.
	async fn replace_recent_transaction(
		&self,
		chain_id: ChainId,
		account: Address,
		old_hash: TransactionHash,
		new_hash: TransactionHash,
		new_payload: JsonRpcPayload,
	) -> Result<(), StorageError>;

	async fn clear_recent_transactions(
		&self,
		chain_id: ChainId,
		account: Address,
	) -> Result<(), StorageError>;

	/// Newest first.
	async fn get_recent_transactions(
		&self,
		chain_id: ChainId,
		account: Address,
	) -> Result<Vec<RecentTransaction>, StorageError>;
}

/// [`RecentTransactionStore`] persisted through a [`StorageService`].
pub struct StorageRecentTransactions {
	storage: Arc<StorageService>,
	// Serializes read-modify-write cycles on the stored lists.
	write_lock: Mutex<()>,
}

impl StorageRecentTransactions {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self {
			storage,
			write_lock: Mutex::new(()),
		}
	}

	fn list_id(chain_id: ChainId, account: &Address) -> String {
		format!("{}_{:#x}", chain_id, account)
	}

	async fn load(
		&self,
		chain_id: ChainId,
		account: &Address,
	) -> Result<Vec<RecentTransaction>, StorageError> {
		Ok(self
			.storage
			.retrieve_optional(
				StorageKey::RecentTransactions.as_str(),
				&Self::list_id(chain_id, account),
			)
			.await?
			.unwrap_or_default())
	}

	async fn save(
		&self,
		chain_id: ChainId,
		account: &Address,
		mut list: Vec<RecentTransaction>,
	) -> Result<(), StorageError> {
		let id = Self::list_id(chain_id, account);
		if list.is_empty() {
			return self
				.storage
				.remove(StorageKey::RecentTransactions.as_str(), &id)
				.await;
		}
		list.truncate(MAX_RECENT_TRANSACTIONS);
		self.storage
			.store(StorageKey::RecentTransactions.as_str(), &id, &list)
			.await
	}
}

#[async_trait]
impl RecentTransactionStore for StorageRecentTransactions {
	async fn add_recent_transaction(
		&self,
		chain_id: ChainId,
		account: Address,
		hash: TransactionHash,
		payload: JsonRpcPayload,
	) -> Result<(), StorageError> {
		let _guard = self.write_lock.lock().await;
		let mut list = self.load(chain_id, &account).await?;
		list.retain(|entry| !entry.has_hash(&hash));
		list.insert(
			0,
			RecentTransaction {
				at: current_timestamp_millis(),
				hash,
				payload,
				replacements: BTreeMap::new(),
			},
		);
		self.save(chain_id, &account, list).await
	}

	async fn remove_recent_transaction(
		&self,
		chain_id: ChainId,
		account: Address,
		hash: TransactionHash,
	) -> Result<(), StorageError> {
		let _guard = self.write_lock.lock().await;
		let mut list = self.load(chain_id, &account).await?;
		list.retain(|entry| !entry.has_hash(&hash));
		self.save(chain_id, &account, list).await
	}

	async fn replace_recent_transaction(
		&self,
		chain_id: ChainId,
		account: Address,
		old_hash: TransactionHash,
		new_hash: TransactionHash,
		new_payload: JsonRpcPayload,
	) -> Result<(), StorageError> {
		let _guard = self.write_lock.lock().await;
		let mut list = self.load(chain_id, &account).await?;

		match list.iter_mut().find(|entry| entry.has_hash(&old_hash)) {
			Some(entry) => {
				if entry.hash != new_hash {
					let previous_payload = std::mem::replace(&mut entry.payload, new_payload);
					let previous_hash = std::mem::replace(&mut entry.hash, new_hash);
					entry
						.replacements
						.insert(previous_hash.to_string(), previous_payload);
					entry.replacements.remove(&new_hash.to_string());
				}
			},
			None => {
				tracing::debug!(
					chain_id,
					old_hash = %tracker_types::truncate_id(&old_hash.to_string()),
					"Replaced hash not in history, recording the new hash"
				);
				list.insert(
					0,
					RecentTransaction {
						at: current_timestamp_millis(),
						hash: new_hash,
						payload: new_payload,
						replacements: BTreeMap::new(),
					},
				);
			},
		}

		self.save(chain_id, &account, list).await
	}

	async fn clear_recent_transactions(
		&self,
		chain_id: ChainId,
		account: Address,
	) -> Result<(), StorageError> {
		let _guard = self.write_lock.lock().await;
		self.save(chain_id, &account, Vec::new()).await
	}

	async fn get_recent_transactions(
		&self,
		chain_id: ChainId,
		account: Address,
	) -> Result<Vec<RecentTransaction>, StorageError> {
		self.load(chain_id, &account).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::implementations::memory::MemoryStorage;
	use tracker_types::{TransactionConfig, B256};

	fn store() -> StorageRecentTransactions {
		StorageRecentTransactions::new(Arc::new(StorageService::new(Box::new(
			MemoryStorage::new(),
		))))
	}

	fn hash(byte: u8) -> TransactionHash {
		TransactionHash(B256::repeat_byte(byte))
	}

	fn payload(nonce: u64) -> JsonRpcPayload {
		JsonRpcPayload::send_transaction(TransactionConfig {
			nonce: Some(nonce),
			..Default::default()
		})
	}

	const ACCOUNT: Address = Address::new([0xaa; 20]);

	#[tokio::test]
	async fn test_newest_first_and_per_chain() {
		let store = store();
		store
			.add_recent_transaction(1, ACCOUNT, hash(1), payload(1))
			.await
			.unwrap();
		store
			.add_recent_transaction(1, ACCOUNT, hash(2), payload(2))
			.await
			.unwrap();
		store
			.add_recent_transaction(137, ACCOUNT, hash(3), payload(3))
			.await
			.unwrap();

		let list = store.get_recent_transactions(1, ACCOUNT).await.unwrap();
		let hashes: Vec<_> = list.iter().map(|entry| entry.hash).collect();
		assert_eq!(hashes, vec![hash(2), hash(1)]);
		assert_eq!(
			store.get_recent_transactions(137, ACCOUNT).await.unwrap().len(),
			1
		);
	}

	#[tokio::test]
	async fn test_replace_keeps_superseded_hash() {
		let store = store();
		store
			.add_recent_transaction(1, ACCOUNT, hash(1), payload(5))
			.await
			.unwrap();
		store
			.replace_recent_transaction(1, ACCOUNT, hash(1), hash(9), payload(5))
			.await
			.unwrap();

		let list = store.get_recent_transactions(1, ACCOUNT).await.unwrap();
		assert_eq!(list.len(), 1);
		assert_eq!(list[0].hash, hash(9));
		assert!(list[0].replacements.contains_key(&hash(1).to_string()));
		assert!(list[0].has_hash(&hash(1)));

		// A second replacement chains onto the same entry.
		store
			.replace_recent_transaction(1, ACCOUNT, hash(9), hash(10), payload(5))
			.await
			.unwrap();
		let list = store.get_recent_transactions(1, ACCOUNT).await.unwrap();
		assert_eq!(list.len(), 1);
		assert_eq!(list[0].hash, hash(10));
		assert_eq!(list[0].replacements.len(), 2);
	}

	#[tokio::test]
	async fn test_replace_unknown_hash_records_new_entry() {
		let store = store();
		store
			.replace_recent_transaction(1, ACCOUNT, hash(1), hash(2), payload(1))
			.await
			.unwrap();
		let list = store.get_recent_transactions(1, ACCOUNT).await.unwrap();
		assert_eq!(list.len(), 1);
		assert_eq!(list[0].hash, hash(2));
	}

	#[tokio::test]
	async fn test_remove_and_clear() {
		let store = store();
		for i in 1..=3 {
			store
				.add_recent_transaction(1, ACCOUNT, hash(i), payload(i as u64))
				.await
				.unwrap();
		}
		store
			.remove_recent_transaction(1, ACCOUNT, hash(2))
			.await
			.unwrap();
		assert_eq!(store.get_recent_transactions(1, ACCOUNT).await.unwrap().len(), 2);

		store.clear_recent_transactions(1, ACCOUNT).await.unwrap();
		assert!(store
			.get_recent_transactions(1, ACCOUNT)
			.await
			.unwrap()
			.is_empty());
	}

	#[tokio::test]
	async fn test_history_is_capped() {
		let store = store();
		for i in 0..(MAX_RECENT_TRANSACTIONS as u8 + 5) {
			store
				.add_recent_transaction(1, ACCOUNT, hash(i), payload(i as u64))
				.await
				.unwrap();
		}
		let list = store.get_recent_transactions(1, ACCOUNT).await.unwrap();
		assert_eq!(list.len(), MAX_RECENT_TRANSACTIONS);
		assert_eq!(list[0].hash, hash(MAX_RECENT_TRANSACTIONS as u8 + 4));
	}
}
