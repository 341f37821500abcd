//! Factory registry for tracker implementations.
//!
//! Collects the factories every collaborator crate registers and selects the
//! ones a configuration names, so implementations are instantiated by name.

use std::collections::HashMap;
use std::sync::OnceLock;
use tracker_config::Config;
use tracker_core::{TrackerBuilder, TrackerFactories, TransactionTracker};
use tracker_explorer::ExplorerFactory;
use tracker_rpc::RpcFactory;
use tracker_storage::StorageFactory;

/// Every known implementation, by collaborator kind and name.
pub struct FactoryRegistry {
	pub storage: HashMap<String, StorageFactory>,
	pub rpc: HashMap<String, RpcFactory>,
	pub explorer: HashMap<String, ExplorerFactory>,
}

impl FactoryRegistry {
	pub fn new() -> Self {
		Self {
			storage: HashMap::new(),
			rpc: HashMap::new(),
			explorer: HashMap::new(),
		}
	}

	pub fn register_storage(&mut self, name: impl Into<String>, factory: StorageFactory) {
		self.storage.insert(name.into(), factory);
	}

	pub fn register_rpc(&mut self, name: impl Into<String>, factory: RpcFactory) {
		self.rpc.insert(name.into(), factory);
	}

	pub fn register_explorer(&mut self, name: impl Into<String>, factory: ExplorerFactory) {
		self.explorer.insert(name.into(), factory);
	}
}

static REGISTRY: OnceLock<FactoryRegistry> = OnceLock::new();

/// Returns the global registry, populating it on first use.
pub fn get_registry() -> &'static FactoryRegistry {
	REGISTRY.get_or_init(|| {
		let mut registry = FactoryRegistry::new();

		for (name, factory) in tracker_storage::get_all_implementations() {
			tracing::debug!("Registering storage implementation: {}", name);
			registry.register_storage(name, factory);
		}

		for (name, factory) in tracker_rpc::get_all_implementations() {
			tracing::debug!("Registering rpc implementation: {}", name);
			registry.register_rpc(name, factory);
		}

		for (name, factory) in tracker_explorer::get_all_implementations() {
			tracing::debug!("Registering explorer implementation: {}", name);
			registry.register_explorer(name, factory);
		}

		registry
	})
}

/// Selects the factories for the primary and every configured implementation
/// of a section, failing on names nobody registered.
macro_rules! build_factories {
	($registry:expr, $section:expr, $registry_field:ident, $type_name:literal) => {{
		let mut factories = HashMap::new();
		let names = $section
			.implementations
			.keys()
			.chain(std::iter::once(&$section.primary));
		for name in names {
			if let Some(factory) = $registry.$registry_field.get(name) {
				factories.insert(name.clone(), *factory);
			} else {
				let mut available: Vec<_> = $registry.$registry_field.keys().cloned().collect();
				available.sort();
				return Err(format!(
					"Unknown {} implementation '{}'. Available: [{}]",
					$type_name,
					name,
					available.join(", ")
				)
				.into());
			}
		}
		factories
	}};
}

/// Builds a tracker from the registry and the configuration.
pub fn build_tracker_from_config(
	config: Config,
) -> Result<TransactionTracker, Box<dyn std::error::Error>> {
	let registry = get_registry();

	let storage_factories = build_factories!(registry, config.storage, storage, "storage");
	let rpc_factories = build_factories!(registry, config.rpc, rpc, "rpc");
	let explorer_factories = build_factories!(registry, config.explorer, explorer, "explorer");

	let factories = TrackerFactories {
		storage_factories,
		rpc_factories,
		explorer_factories,
	};

	Ok(TrackerBuilder::new(config).build(factories)?)
}

#[cfg(test)]
mod tests {
	use super::*;
	use tracker_config::builders::ConfigBuilder;

	#[test]
	fn test_registry_knows_bundled_implementations() {
		let registry = get_registry();
		assert!(registry.storage.contains_key("memory"));
		assert!(registry.storage.contains_key("file"));
		assert!(registry.rpc.contains_key("alloy"));
		assert!(registry.explorer.contains_key("etherscan"));
	}

	#[tokio::test]
	async fn test_build_tracker_from_config() {
		let config = ConfigBuilder::new().tracker_id("registry-test").build();
		let tracker = build_tracker_from_config(config).unwrap();
		assert_eq!(tracker.config().tracker.id, "registry-test");
	}

	#[tokio::test]
	async fn test_unknown_implementation_lists_available() {
		let config = ConfigBuilder::new().storage_primary("redis").build();
		let error = build_tracker_from_config(config).err().unwrap().to_string();
		assert!(error.contains("Unknown storage implementation 'redis'"));
		assert!(error.contains("file, memory"));
	}
}
