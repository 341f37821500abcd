//! Chain RPC module for the transaction tracker.
//!
//! The tracker only reads from chains: receipts for watched hashes and, for
//! the live receipt path, the transaction itself. Implementations talk to a
//! node over JSON-RPC; [`RpcService`] adds a per-call timeout on top.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracker_types::{
	ChainId, ChainTransaction, ConfigSchema, ImplementationRegistry, NetworksConfig,
	TransactionHash, TransactionReceipt,
};

pub mod implementations {
	pub mod evm {
		pub mod alloy;
	}
}

/// Errors that can occur during chain RPC calls.
#[derive(Debug, Error)]
pub enum RpcError {
	/// Error that occurs during network communication.
	#[error("Network error: {0}")]
	Network(String),
	/// The call did not complete within the configured timeout.
	#[error("RPC call timed out after {0:?}")]
	Timeout(Duration),
	/// No endpoint is configured for the chain.
	#[error("No provider configured for chain {0}")]
	NoProviderAvailable(ChainId),
	/// Error that occurs when the implementation configuration is invalid.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Trait defining the interface for chain RPC implementations.
///
/// `Ok(None)` means the node answered and does not know the hash (or has no
/// receipt for it yet); transport failures are errors.
#[async_trait]
pub trait RpcInterface: Send + Sync {
	/// Returns the configuration schema for this implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// `eth_getTransactionReceipt`.
	async fn get_transaction_receipt(
		&self,
		chain_id: ChainId,
		hash: &TransactionHash,
	) -> Result<Option<TransactionReceipt>, RpcError>;

	/// `eth_getTransactionByHash`.
	async fn get_transaction_by_hash(
		&self,
		chain_id: ChainId,
		hash: &TransactionHash,
	) -> Result<Option<ChainTransaction>, RpcError>;
}

/// Type alias for RPC factory functions.
pub type RpcFactory = fn(&toml::Value, &NetworksConfig) -> Result<Box<dyn RpcInterface>, RpcError>;

/// Registry trait for RPC implementations.
pub trait RpcRegistry: ImplementationRegistry<Factory = RpcFactory> {}

/// Get all registered RPC implementations.
pub fn get_all_implementations() -> Vec<(&'static str, RpcFactory)> {
	use implementations::evm::alloy;

	vec![(alloy::Registry::NAME, alloy::Registry::factory())]
}

/// Service wrapping an RPC implementation with a per-call timeout.
#[derive(Clone)]
pub struct RpcService {
	implementation: Arc<dyn RpcInterface>,
	timeout: Duration,
}

impl RpcService {
	pub fn new(implementation: Box<dyn RpcInterface>, timeout: Duration) -> Self {
		Self {
			implementation: Arc::from(implementation),
			timeout,
		}
	}

	/// Fetches the receipt for a hash, bounded by the configured timeout.
	pub async fn get_transaction_receipt(
		&self,
		chain_id: ChainId,
		hash: &TransactionHash,
	) -> Result<Option<TransactionReceipt>, RpcError> {
		tokio::time::timeout(
			self.timeout,
			self.implementation.get_transaction_receipt(chain_id, hash),
		)
		.await
		.map_err(|_| RpcError::Timeout(self.timeout))?
	}

	/// Fetches the transaction for a hash, bounded by the configured timeout.
	pub async fn get_transaction_by_hash(
		&self,
		chain_id: ChainId,
		hash: &TransactionHash,
	) -> Result<Option<ChainTransaction>, RpcError> {
		tokio::time::timeout(
			self.timeout,
			self.implementation.get_transaction_by_hash(chain_id, hash),
		)
		.await
		.map_err(|_| RpcError::Timeout(self.timeout))?
	}
}
