//! In-memory chain and explorer doubles shared by the unit tests.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracker_explorer::{ExplorerError, ExplorerInterface, ExplorerService};
use tracker_rpc::{RpcError, RpcInterface, RpcService};
use tracker_storage::implementations::memory::MemoryStorage;
use tracker_storage::{StorageRecentTransactions, StorageService};
use tracker_types::{
	Address, ChainId, ChainTransaction, ConfigSchema, ExplorerConfig, ExplorerTransaction,
	NetworkConfig, NetworksConfig, Schema, TransactionHash, TransactionReceipt, ValidationError,
	B256,
};

pub fn hash(byte: u8) -> TransactionHash {
	TransactionHash(B256::repeat_byte(byte))
}

pub fn mined(hash: TransactionHash, status: u64) -> TransactionReceipt {
	TransactionReceipt {
		transaction_hash: hash,
		block_number: Some(100),
		status: Some(status),
		from: None,
		to: None,
	}
}

/// Recent-transaction store over in-memory storage.
pub fn recent_store() -> Arc<StorageRecentTransactions> {
	Arc::new(StorageRecentTransactions::new(Arc::new(StorageService::new(
		Box::new(MemoryStorage::new()),
	))))
}

/// Chain 1 with an explorer, chain 31337 without one.
pub fn networks() -> NetworksConfig {
	let mut networks = HashMap::new();
	networks.insert(
		1,
		NetworkConfig {
			rpc_url: "http://localhost:8545".to_string(),
			explorer: Some(ExplorerConfig {
				api_url: "http://localhost:9000/api".to_string(),
				api_keys: vec![],
			}),
		},
	);
	networks.insert(
		31337,
		NetworkConfig {
			rpc_url: "http://localhost:8546".to_string(),
			explorer: None,
		},
	);
	networks
}

struct EmptySchema;

impl ConfigSchema for EmptySchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(vec![], vec![]).validate(config)
	}
}

#[derive(Default)]
struct RpcState {
	receipts: Mutex<HashMap<TransactionHash, TransactionReceipt>>,
	transactions: Mutex<HashMap<TransactionHash, ChainTransaction>>,
	receipt_calls: Mutex<HashMap<TransactionHash, usize>>,
	failing: AtomicBool,
}

/// Chain double answering from preset receipts and transactions.
#[derive(Clone, Default)]
pub struct MockRpc {
	state: Arc<RpcState>,
}

impl MockRpc {
	pub fn set_receipt(&self, receipt: TransactionReceipt) {
		self.state
			.receipts
			.lock()
			.unwrap()
			.insert(receipt.transaction_hash, receipt);
	}

	pub fn set_transaction(&self, transaction: ChainTransaction) {
		self.state
			.transactions
			.lock()
			.unwrap()
			.insert(transaction.hash, transaction);
	}

	pub fn set_failing(&self, failing: bool) {
		self.state.failing.store(failing, Ordering::SeqCst);
	}

	pub fn receipt_calls(&self, hash: &TransactionHash) -> usize {
		self.state
			.receipt_calls
			.lock()
			.unwrap()
			.get(hash)
			.copied()
			.unwrap_or(0)
	}

	pub fn service(&self) -> RpcService {
		RpcService::new(Box::new(self.clone()), Duration::from_secs(5))
	}
}

#[async_trait]
impl RpcInterface for MockRpc {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(EmptySchema)
	}

	async fn get_transaction_receipt(
		&self,
		_chain_id: ChainId,
		hash: &TransactionHash,
	) -> Result<Option<TransactionReceipt>, RpcError> {
		*self
			.state
			.receipt_calls
			.lock()
			.unwrap()
			.entry(*hash)
			.or_default() += 1;
		if self.state.failing.load(Ordering::SeqCst) {
			return Err(RpcError::Network("connection refused".to_string()));
		}
		Ok(self.state.receipts.lock().unwrap().get(hash).cloned())
	}

	async fn get_transaction_by_hash(
		&self,
		_chain_id: ChainId,
		hash: &TransactionHash,
	) -> Result<Option<ChainTransaction>, RpcError> {
		if self.state.failing.load(Ordering::SeqCst) {
			return Err(RpcError::Network("connection refused".to_string()));
		}
		Ok(self.state.transactions.lock().unwrap().get(hash).cloned())
	}
}

#[derive(Default)]
struct ExplorerState {
	latest: Mutex<HashMap<Address, Vec<ExplorerTransaction>>>,
	failing: Mutex<HashSet<Address>>,
	calls: Mutex<Vec<Address>>,
}

/// Explorer double returning preset account histories.
#[derive(Clone, Default)]
pub struct MockExplorer {
	state: Arc<ExplorerState>,
}

impl MockExplorer {
	pub fn set_latest(&self, account: Address, transactions: Vec<ExplorerTransaction>) {
		self.state
			.latest
			.lock()
			.unwrap()
			.insert(account, transactions);
	}

	pub fn fail_for(&self, account: Address) {
		self.state.failing.lock().unwrap().insert(account);
	}

	pub fn calls(&self) -> Vec<Address> {
		self.state.calls.lock().unwrap().clone()
	}

	pub fn service(&self) -> ExplorerService {
		ExplorerService::new(Box::new(self.clone()), &networks(), Duration::from_secs(5))
	}
}

#[async_trait]
impl ExplorerInterface for MockExplorer {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(EmptySchema)
	}

	async fn get_latest_transactions(
		&self,
		_endpoint: &ExplorerConfig,
		account: &Address,
		size: usize,
	) -> Result<Vec<ExplorerTransaction>, ExplorerError> {
		self.state.calls.lock().unwrap().push(*account);
		if self.state.failing.lock().unwrap().contains(account) {
			return Err(ExplorerError::Api("Max rate limit reached".to_string()));
		}
		let mut latest = self
			.state
			.latest
			.lock()
			.unwrap()
			.get(account)
			.cloned()
			.unwrap_or_default();
		latest.truncate(size);
		Ok(latest)
	}
}
