//! Block explorer module for the transaction tracker.
//!
//! Explorers index every transaction an account sends, including the ones a
//! wallet broadcast to replace a pending transaction. The tracker reads an
//! account's latest transactions from here to notice such replacements.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracker_types::{
	Address, ChainId, ConfigSchema, ExplorerConfig, ExplorerTransaction, ImplementationRegistry,
	NetworksConfig,
};

pub mod implementations {
	pub mod etherscan;
}

/// Errors that can occur while querying a block explorer.
#[derive(Debug, Error)]
pub enum ExplorerError {
	/// Error that occurs during network communication.
	#[error("Network error: {0}")]
	Network(String),
	/// The explorer answered with an error status.
	#[error("Explorer API error: {0}")]
	Api(String),
	/// The response body could not be decoded.
	#[error("Parse error: {0}")]
	Parse(String),
	/// The call did not complete within the configured timeout.
	#[error("Explorer call timed out after {0:?}")]
	Timeout(Duration),
	/// No explorer endpoint is configured for the chain.
	#[error("No explorer configured for chain {0}")]
	NotConfigured(ChainId),
	/// Error that occurs when the implementation configuration is invalid.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Trait defining the interface for block explorer implementations.
#[async_trait]
pub trait ExplorerInterface: Send + Sync {
	/// Returns the configuration schema for this implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Returns up to `size` of the account's most recent transactions,
	/// newest first.
	async fn get_latest_transactions(
		&self,
		endpoint: &ExplorerConfig,
		account: &Address,
		size: usize,
	) -> Result<Vec<ExplorerTransaction>, ExplorerError>;
}

/// Type alias for explorer factory functions.
pub type ExplorerFactory = fn(&toml::Value) -> Result<Box<dyn ExplorerInterface>, ExplorerError>;

/// Registry trait for explorer implementations.
pub trait ExplorerRegistry: ImplementationRegistry<Factory = ExplorerFactory> {}

/// Get all registered explorer implementations.
pub fn get_all_implementations() -> Vec<(&'static str, ExplorerFactory)> {
	use implementations::etherscan;

	vec![(etherscan::Registry::NAME, etherscan::Registry::factory())]
}

/// Routes explorer queries to the endpoint configured for each chain.
#[derive(Clone)]
pub struct ExplorerService {
	implementation: Arc<dyn ExplorerInterface>,
	endpoints: HashMap<ChainId, ExplorerConfig>,
	timeout: Duration,
}

impl ExplorerService {
	/// Creates the service; chains without an `explorer` table are not served.
	pub fn new(
		implementation: Box<dyn ExplorerInterface>,
		networks: &NetworksConfig,
		timeout: Duration,
	) -> Self {
		let endpoints = networks
			.iter()
			.filter_map(|(chain_id, network)| {
				network
					.explorer
					.as_ref()
					.map(|explorer| (*chain_id, explorer.clone()))
			})
			.collect();

		Self {
			implementation: Arc::from(implementation),
			endpoints,
			timeout,
		}
	}

	/// Whether an explorer endpoint is configured for the chain.
	pub fn supports(&self, chain_id: ChainId) -> bool {
		self.endpoints.contains_key(&chain_id)
	}

	/// Fetches the account's latest transactions on a chain.
	pub async fn get_latest_transactions(
		&self,
		chain_id: ChainId,
		account: &Address,
		size: usize,
	) -> Result<Vec<ExplorerTransaction>, ExplorerError> {
		let endpoint = self
			.endpoints
			.get(&chain_id)
			.ok_or(ExplorerError::NotConfigured(chain_id))?;

		tokio::time::timeout(
			self.timeout,
			self.implementation
				.get_latest_transactions(endpoint, account, size),
		)
		.await
		.map_err(|_| ExplorerError::Timeout(self.timeout))?
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tracker_types::{NetworkConfig, Schema, ValidationError};

	struct FixedExplorer;

	struct EmptySchema;

	impl ConfigSchema for EmptySchema {
		fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
			Schema::new(vec![], vec![]).validate(config)
		}
	}

	#[async_trait]
	impl ExplorerInterface for FixedExplorer {
		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			Box::new(EmptySchema)
		}

		async fn get_latest_transactions(
			&self,
			endpoint: &ExplorerConfig,
			_account: &Address,
			size: usize,
		) -> Result<Vec<ExplorerTransaction>, ExplorerError> {
			assert_eq!(endpoint.api_url, "https://api.etherscan.io/api");
			Ok(vec![ExplorerTransaction::default(); size])
		}
	}

	fn networks() -> NetworksConfig {
		let mut networks = HashMap::new();
		networks.insert(
			1,
			NetworkConfig {
				rpc_url: "http://localhost:8545".into(),
				explorer: Some(ExplorerConfig {
					api_url: "https://api.etherscan.io/api".into(),
					api_keys: vec![],
				}),
			},
		);
		networks.insert(
			31337,
			NetworkConfig {
				rpc_url: "http://localhost:8546".into(),
				explorer: None,
			},
		);
		networks
	}

	#[tokio::test]
	async fn test_routes_to_chain_endpoint() {
		let service = ExplorerService::new(
			Box::new(FixedExplorer),
			&networks(),
			Duration::from_secs(5),
		);

		assert!(service.supports(1));
		assert!(!service.supports(31337));

		let account = Address::repeat_byte(0x11);
		let latest = service.get_latest_transactions(1, &account, 5).await.unwrap();
		assert_eq!(latest.len(), 5);
		assert!(matches!(
			service.get_latest_transactions(31337, &account, 5).await,
			Err(ExplorerError::NotConfigured(31337))
		));
	}
}
