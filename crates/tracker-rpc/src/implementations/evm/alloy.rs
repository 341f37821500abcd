//! Alloy-based EVM RPC implementation.
//!
//! One HTTP provider per configured network. Responses are decoded into the
//! tracker's own receipt and transaction shapes, which only carry the fields
//! the watcher needs.

use crate::{RpcError, RpcFactory, RpcInterface, RpcRegistry};
use alloy_provider::{Provider, ProviderBuilder};
use alloy_transport_http::Http;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracker_types::{
	truncate_id, ChainId, ChainTransaction, ConfigSchema, Field, FieldType,
	ImplementationRegistry, NetworksConfig, Schema, TransactionHash, TransactionReceipt,
	ValidationError,
};

type HttpProvider = Arc<dyn Provider<Http<reqwest::Client>> + Send + Sync>;

/// Read-only RPC access to EVM chains through alloy HTTP providers.
pub struct AlloyRpc {
	providers: HashMap<ChainId, HttpProvider>,
}

impl AlloyRpc {
	/// Creates providers for the given networks.
	///
	/// An empty `network_ids` list means every configured network.
	pub fn new(network_ids: &[ChainId], networks: &NetworksConfig) -> Result<Self, RpcError> {
		let selected: Vec<ChainId> = if network_ids.is_empty() {
			networks.keys().copied().collect()
		} else {
			network_ids.to_vec()
		};

		if selected.is_empty() {
			return Err(RpcError::Configuration(
				"At least one network must be configured".to_string(),
			));
		}

		let mut providers = HashMap::new();
		for chain_id in selected {
			let network = networks.get(&chain_id).ok_or_else(|| {
				RpcError::Configuration(format!("Network {} not found in configuration", chain_id))
			})?;

			let url = network.rpc_url.parse().map_err(|e| {
				RpcError::Configuration(format!("Invalid RPC URL for network {}: {}", chain_id, e))
			})?;

			let provider = ProviderBuilder::new().on_http(url);
			providers.insert(chain_id, Arc::new(provider) as HttpProvider);
		}

		Ok(Self { providers })
	}

	fn get_provider(&self, chain_id: ChainId) -> Result<&HttpProvider, RpcError> {
		self.providers
			.get(&chain_id)
			.ok_or(RpcError::NoProviderAvailable(chain_id))
	}
}

/// Configuration schema for the alloy RPC implementation.
pub struct AlloyRpcSchema;

impl ConfigSchema for AlloyRpcSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![Field::new(
				"network_ids",
				FieldType::Array(Box::new(FieldType::Integer {
					min: Some(1),
					max: None,
				})),
			)],
		);
		schema.validate(config)
	}
}

#[async_trait]
impl RpcInterface for AlloyRpc {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(AlloyRpcSchema)
	}

	async fn get_transaction_receipt(
		&self,
		chain_id: ChainId,
		hash: &TransactionHash,
	) -> Result<Option<TransactionReceipt>, RpcError> {
		let provider = self.get_provider(chain_id)?;
		let receipt: Option<TransactionReceipt> = provider
			.client()
			.request("eth_getTransactionReceipt", (*hash,))
			.await
			.map_err(|e| {
				RpcError::Network(format!(
					"Failed to get receipt on chain {}: {}",
					chain_id, e
				))
			})?;

		tracing::trace!(
			chain_id,
			tx_hash = %truncate_id(&hash.to_string()),
			found = receipt.is_some(),
			"Fetched receipt"
		);
		Ok(receipt)
	}

	async fn get_transaction_by_hash(
		&self,
		chain_id: ChainId,
		hash: &TransactionHash,
	) -> Result<Option<ChainTransaction>, RpcError> {
		let provider = self.get_provider(chain_id)?;
		let transaction: Option<ChainTransaction> = provider
			.client()
			.request("eth_getTransactionByHash", (*hash,))
			.await
			.map_err(|e| {
				RpcError::Network(format!(
					"Failed to get transaction on chain {}: {}",
					chain_id, e
				))
			})?;
		Ok(transaction)
	}
}

/// Factory function to create the alloy RPC implementation.
///
/// Configuration parameters:
/// - `network_ids`: optional subset of `[networks]` to serve (default: all)
pub fn create_rpc(
	config: &toml::Value,
	networks: &NetworksConfig,
) -> Result<Box<dyn RpcInterface>, RpcError> {
	AlloyRpcSchema
		.validate(config)
		.map_err(|e| RpcError::Configuration(format!("Invalid configuration: {}", e)))?;

	let network_ids: Vec<ChainId> = config
		.get("network_ids")
		.and_then(|v| v.as_array())
		.map(|ids| {
			ids.iter()
				.filter_map(|v| v.as_integer())
				.map(|v| v as ChainId)
				.collect()
		})
		.unwrap_or_default();

	Ok(Box::new(AlloyRpc::new(&network_ids, networks)?))
}

/// Registry for the alloy RPC implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "alloy";
	type Factory = RpcFactory;

	fn factory() -> Self::Factory {
		create_rpc
	}
}

impl RpcRegistry for Registry {}
