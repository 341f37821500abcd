//! Configuration module for the transaction tracker.
//!
//! This module provides structures and utilities for managing tracker configuration.
//! It supports loading configuration from TOML files and provides validation to ensure
//! all required configuration values are properly set.
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files for better organization:
//! - Use `include = ["file1.toml", "file2.toml"]` to include other config files
//! - Each top-level section comes from one file; under `networks` each chain
//!   comes from one file, so chains can be kept in per-network files

#[cfg(any(test, feature = "testing"))]
pub mod builders;
mod loader;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracker_types::{networks::deserialize_networks, NetworksConfig};

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Keep the message only; the default rendering dumps the input.
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure for the tracker.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Scheduler and lookup tuning.
	pub tracker: TrackerConfig,
	/// Per-chain RPC and explorer endpoints.
	#[serde(deserialize_with = "deserialize_networks")]
	pub networks: NetworksConfig,
	/// Storage backend for the recent-transaction history.
	pub storage: StorageConfig,
	/// Chain RPC implementation selection.
	#[serde(default = "RpcConfig::default_alloy")]
	pub rpc: RpcConfig,
	/// Block explorer implementation selection.
	#[serde(default = "ExplorerServiceConfig::default_etherscan")]
	pub explorer: ExplorerServiceConfig,
	/// Configuration for the HTTP API server.
	pub api: Option<ApiConfig>,
}

/// Tracker instance settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrackerConfig {
	/// Identifier used in logs.
	pub id: String,
	/// Delay between two check rounds of the same chain.
	#[serde(default = "default_check_delay_seconds")]
	pub check_delay_seconds: u64,
	/// Check rounds a newly watched transaction gets before it is dropped.
	#[serde(default = "default_check_times")]
	pub check_times: u32,
	/// Maximum number of watched transactions per chain.
	#[serde(default = "default_max_watched")]
	pub max_watched: usize,
	/// Number of explorer records fetched per account during reconciliation.
	#[serde(default = "default_latest_transaction_size")]
	pub latest_transaction_size: usize,
	/// Timeout applied to each chain RPC call.
	#[serde(default = "default_rpc_timeout_seconds")]
	pub rpc_timeout_seconds: u64,
	/// Timeout applied to each explorer call.
	#[serde(default = "default_explorer_timeout_seconds")]
	pub explorer_timeout_seconds: u64,
}

fn default_check_delay_seconds() -> u64 {
	30
}

fn default_check_times() -> u32 {
	30
}

fn default_max_watched() -> usize {
	40
}

fn default_latest_transaction_size() -> usize {
	5
}

fn default_rpc_timeout_seconds() -> u64 {
	15
}

fn default_explorer_timeout_seconds() -> u64 {
	15
}

/// Configuration for the storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of storage implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Chain RPC implementation selection.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RpcConfig {
	pub primary: String,
	/// Implementation specific settings, passed to the factory as is.
	#[serde(default)]
	pub implementations: HashMap<String, toml::Value>,
}

impl RpcConfig {
	fn default_alloy() -> Self {
		Self {
			primary: "alloy".to_string(),
			implementations: HashMap::new(),
		}
	}
}

/// Block explorer implementation selection.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExplorerServiceConfig {
	pub primary: String,
	#[serde(default)]
	pub implementations: HashMap<String, toml::Value>,
}

impl ExplorerServiceConfig {
	fn default_etherscan() -> Self {
		Self {
			primary: "etherscan".to_string(),
			implementations: HashMap::new(),
		}
	}
}

/// Configuration for the HTTP API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	/// Whether the API server is enabled.
	#[serde(default)]
	pub enabled: bool,
	/// Host address to bind the server to.
	#[serde(default = "default_api_host")]
	pub host: String,
	/// Port to bind the server to.
	#[serde(default = "default_api_port")]
	pub port: u16,
	/// Request timeout in seconds.
	#[serde(default = "default_api_timeout")]
	pub timeout_seconds: u64,
}

fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
	3000
}

fn default_api_timeout() -> u64 {
	30
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}; the default may
/// be empty.
///
/// Input strings are limited to 1MB to prevent ReDoS attacks.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = String::with_capacity(input.len());
	let mut last = 0;

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let default_value = cap.get(2).map(|m| m.as_str());

		let value = match std::env::var(var_name.as_str()) {
			Ok(v) => v,
			Err(_) => match default_value {
				Some(default) => default.to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name.as_str()
					)));
				},
			},
		};

		result.push_str(&input[last..full_match.start()]);
		result.push_str(&value);
		last = full_match.end();
	}
	result.push_str(&input[last..]);

	Ok(result)
}

impl Config {
	/// Loads configuration from a file with async environment variable resolution.
	///
	/// The file may `include` other files, and chains under `networks` may be
	/// spread across them; see the loader for the merge rules.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		loader::ConfigLoader::new().load(Path::new(path)).await
	}

	/// Deserializes and validates an already resolved TOML document.
	pub(crate) fn from_toml(value: toml::Value) -> Result<Self, ConfigError> {
		let config: Config = value.try_into()?;
		config.validate()?;
		Ok(config)
	}

	/// Validates the configuration to ensure all required fields are properly set.
	fn validate(&self) -> Result<(), ConfigError> {
		if self.tracker.id.is_empty() {
			return Err(ConfigError::Validation("Tracker ID cannot be empty".into()));
		}
		if self.tracker.check_delay_seconds == 0 {
			return Err(ConfigError::Validation(
				"check_delay_seconds must be greater than 0".into(),
			));
		}
		if self.tracker.check_times == 0 {
			return Err(ConfigError::Validation(
				"check_times must be at least 1".into(),
			));
		}
		if self.tracker.max_watched == 0 {
			return Err(ConfigError::Validation(
				"max_watched must be at least 1".into(),
			));
		}
		if self.tracker.latest_transaction_size == 0 {
			return Err(ConfigError::Validation(
				"latest_transaction_size must be at least 1".into(),
			));
		}
		if self.tracker.rpc_timeout_seconds == 0 || self.tracker.explorer_timeout_seconds == 0 {
			return Err(ConfigError::Validation(
				"Lookup timeouts must be greater than 0".into(),
			));
		}

		if self.networks.is_empty() {
			return Err(ConfigError::Validation(
				"Networks configuration cannot be empty".into(),
			));
		}
		for (chain_id, network) in &self.networks {
			if network.rpc_url.trim().is_empty() {
				return Err(ConfigError::Validation(format!(
					"Network {} must have rpc_url",
					chain_id
				)));
			}
			if let Some(explorer) = &network.explorer {
				if explorer.api_url.trim().is_empty() {
					return Err(ConfigError::Validation(format!(
						"Network {} explorer must have api_url",
						chain_id
					)));
				}
			}
		}

		if self.storage.implementations.is_empty() {
			return Err(ConfigError::Validation(
				"At least one storage implementation must be configured".into(),
			));
		}
		if self.storage.primary.is_empty() {
			return Err(ConfigError::Validation(
				"Storage primary implementation cannot be empty".into(),
			));
		}
		if !self
			.storage
			.implementations
			.contains_key(&self.storage.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary storage '{}' not found in implementations",
				self.storage.primary
			)));
		}

		if self.rpc.primary.is_empty() {
			return Err(ConfigError::Validation(
				"RPC primary implementation cannot be empty".into(),
			));
		}
		if self.explorer.primary.is_empty() {
			return Err(ConfigError::Validation(
				"Explorer primary implementation cannot be empty".into(),
			));
		}

		Ok(())
	}
}

/// Parses a TOML string, resolving environment variables first and
/// validating the result.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		Config::from_toml(toml::from_str(&resolved)?)
	}
}
