//! Builder for constructing transaction trackers.
//!
//! Composes a [`TransactionTracker`] from the implementations named in the
//! configuration. Each collaborator (storage, chain RPC, block explorer) is
//! created through a factory registered under the implementation's name.

use crate::engine::TransactionTracker;
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracker_config::Config;
use tracker_explorer::{ExplorerError, ExplorerInterface, ExplorerService};
use tracker_rpc::{RpcError, RpcInterface, RpcService};
use tracker_storage::{StorageError, StorageInterface, StorageRecentTransactions, StorageService};
use tracker_types::NetworksConfig;

/// Errors that can occur while building a tracker.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Factory functions for every collaborator, keyed by implementation name.
pub struct TrackerFactories<SF, RF, EF> {
	pub storage_factories: HashMap<String, SF>,
	pub rpc_factories: HashMap<String, RF>,
	pub explorer_factories: HashMap<String, EF>,
}

/// Builder for constructing a TransactionTracker with pluggable implementations.
pub struct TrackerBuilder {
	config: Config,
}

impl TrackerBuilder {
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	/// Builds the tracker, creating the primary implementation of each
	/// collaborator.
	pub fn build<SF, RF, EF>(
		self,
		factories: TrackerFactories<SF, RF, EF>,
	) -> Result<TransactionTracker, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
		RF: Fn(&toml::Value, &NetworksConfig) -> Result<Box<dyn RpcInterface>, RpcError>,
		EF: Fn(&toml::Value) -> Result<Box<dyn ExplorerInterface>, ExplorerError>,
	{
		// Storage implementations must be configured explicitly
		let mut storage_impls = HashMap::new();
		for (name, config) in &self.config.storage.implementations {
			if let Some(factory) = factories.storage_factories.get(name) {
				let implementation = create("storage", name, || factory(config))?;
				let is_primary = &self.config.storage.primary == name;
				tracing::info!(component = "storage", implementation = %name, enabled = %is_primary, "Loaded");
				storage_impls.insert(name.clone(), implementation);
			}
		}

		if storage_impls.is_empty() {
			return Err(BuilderError::Config(
				"No valid storage implementations available".into(),
			));
		}

		let primary_storage = &self.config.storage.primary;
		let storage_backend = storage_impls.remove(primary_storage).ok_or_else(|| {
			BuilderError::Config(format!(
				"Primary storage '{}' failed to load or has invalid configuration",
				primary_storage
			))
		})?;
		let storage = Arc::new(StorageService::new(storage_backend));
		let recent = Arc::new(StorageRecentTransactions::new(storage));

		// RPC and explorer implementations run with defaults unless configured
		let rpc_name = &self.config.rpc.primary;
		let rpc_factory = factories
			.rpc_factories
			.get(rpc_name)
			.ok_or_else(|| BuilderError::MissingComponent(format!("rpc '{}'", rpc_name)))?;
		let rpc_config = implementation_config(&self.config.rpc.implementations, rpc_name);
		let rpc_impl = create("rpc", rpc_name, || {
			rpc_factory(&rpc_config, &self.config.networks)
		})?;
		tracing::info!(component = "rpc", implementation = %rpc_name, networks = self.config.networks.len(), "Loaded");

		let explorer_name = &self.config.explorer.primary;
		let explorer_factory = factories
			.explorer_factories
			.get(explorer_name)
			.ok_or_else(|| {
				BuilderError::MissingComponent(format!("explorer '{}'", explorer_name))
			})?;
		let explorer_config =
			implementation_config(&self.config.explorer.implementations, explorer_name);
		let explorer_impl = create("explorer", explorer_name, || explorer_factory(&explorer_config))?;
		let explorer_chains = self
			.config
			.networks
			.values()
			.filter(|network| network.explorer.is_some())
			.count();
		if explorer_chains == 0 {
			tracing::warn!("No explorer endpoints configured - replaced transactions will not be detected");
		}
		tracing::info!(component = "explorer", implementation = %explorer_name, chains = explorer_chains, "Loaded");

		let tracker = &self.config.tracker;
		let rpc = RpcService::new(rpc_impl, Duration::from_secs(tracker.rpc_timeout_seconds));
		let explorer = ExplorerService::new(
			explorer_impl,
			&self.config.networks,
			Duration::from_secs(tracker.explorer_timeout_seconds),
		);

		Ok(TransactionTracker::new(self.config, rpc, explorer, recent))
	}
}

fn implementation_config(implementations: &HashMap<String, toml::Value>, name: &str) -> toml::Value {
	implementations
		.get(name)
		.cloned()
		.unwrap_or_else(|| toml::Value::Table(toml::map::Map::new()))
}

/// Runs a factory, logging and converting its error.
fn create<T, E: Display>(
	component: &'static str,
	name: &str,
	factory: impl FnOnce() -> Result<T, E>,
) -> Result<T, BuilderError> {
	factory().map_err(|e| {
		tracing::error!(
			component,
			implementation = %name,
			error = %e,
			"Failed to create implementation"
		);
		BuilderError::Config(format!(
			"Failed to create {} implementation '{}': {}",
			component, name, e
		))
	})
}
