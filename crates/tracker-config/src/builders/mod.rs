//! Configuration builder for tests and local development.

use crate::{
	ApiConfig, Config, ExplorerServiceConfig, RpcConfig, StorageConfig, TrackerConfig,
};
use std::collections::HashMap;
use tracker_types::{ExplorerConfig, NetworkConfig, NetworksConfig, ApiKey};

/// Builder for creating `Config` instances with a fluent API.
///
/// Starts from a single local network with in-memory storage and the
/// default scheduler settings.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	tracker: TrackerConfig,
	networks: NetworksConfig,
	storage_primary: String,
	api: Option<ApiConfig>,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigBuilder {
	pub fn new() -> Self {
		let mut networks = HashMap::new();
		networks.insert(
			1,
			NetworkConfig {
				rpc_url: "http://localhost:8545".to_string(),
				explorer: None,
			},
		);
		Self {
			tracker: TrackerConfig {
				id: "test-tracker".to_string(),
				check_delay_seconds: 30,
				check_times: 30,
				max_watched: 40,
				latest_transaction_size: 5,
				rpc_timeout_seconds: 15,
				explorer_timeout_seconds: 15,
			},
			networks,
			storage_primary: "memory".to_string(),
			api: None,
		}
	}

	pub fn tracker_id(mut self, id: impl Into<String>) -> Self {
		self.tracker.id = id.into();
		self
	}

	pub fn check_delay_seconds(mut self, seconds: u64) -> Self {
		self.tracker.check_delay_seconds = seconds;
		self
	}

	pub fn check_times(mut self, times: u32) -> Self {
		self.tracker.check_times = times;
		self
	}

	pub fn max_watched(mut self, max: usize) -> Self {
		self.tracker.max_watched = max;
		self
	}

	pub fn latest_transaction_size(mut self, size: usize) -> Self {
		self.tracker.latest_transaction_size = size;
		self
	}

	/// Adds or replaces a network, optionally with an explorer endpoint.
	pub fn network(mut self, chain_id: u64, rpc_url: &str, explorer_url: Option<&str>) -> Self {
		self.networks.insert(
			chain_id,
			NetworkConfig {
				rpc_url: rpc_url.to_string(),
				explorer: explorer_url.map(|url| ExplorerConfig {
					api_url: url.to_string(),
					api_keys: vec![ApiKey::new("test-key")],
				}),
			},
		);
		self
	}

	pub fn storage_primary(mut self, primary: impl Into<String>) -> Self {
		self.storage_primary = primary.into();
		self
	}

	pub fn api(mut self, api: Option<ApiConfig>) -> Self {
		self.api = api;
		self
	}

	pub fn build(self) -> Config {
		let mut implementations = HashMap::new();
		implementations.insert(
			self.storage_primary.clone(),
			toml::Value::Table(toml::map::Map::new()),
		);

		Config {
			tracker: self.tracker,
			networks: self.networks,
			storage: StorageConfig {
				primary: self.storage_primary,
				implementations,
			},
			rpc: RpcConfig::default_alloy(),
			explorer: ExplorerServiceConfig::default_etherscan(),
			api: self.api,
		}
	}
}
