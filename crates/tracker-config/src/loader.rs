//! Multi-file configuration loading.
//!
//! A file may name other files with `include` (a string or an array of
//! strings). Include paths are relative to the file that names them, and
//! included files may include further files. Every file is read once.
//!
//! Sections merge by owner: each top-level section comes from a single file,
//! except `networks`, where each chain is owned separately. Chains can
//! therefore live in one file per network next to a shared main file.

use crate::{resolve_env_vars, Config, ConfigError};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};

const INCLUDE_KEY: &str = "include";
const NETWORKS_KEY: &str = "networks";

/// Collects a configuration spread over included files into one table.
pub(crate) struct ConfigLoader {
	loaded: HashSet<PathBuf>,
	/// Section (`tracker`, `networks.137`, ...) to the file that defined it.
	owners: HashMap<String, PathBuf>,
	merged: toml::Table,
}

impl ConfigLoader {
	pub fn new() -> Self {
		Self {
			loaded: HashSet::new(),
			owners: HashMap::new(),
			merged: toml::Table::new(),
		}
	}

	/// Loads `entry` and every file it includes, then validates the result.
	pub async fn load(mut self, entry: &Path) -> Result<Config, ConfigError> {
		let mut pending = VecDeque::from([entry.to_path_buf()]);

		while let Some(path) = pending.pop_front() {
			let (table, includes) = self.read(&path).await?;
			self.merge(table, &path)?;
			pending.extend(includes);
		}

		Config::from_toml(toml::Value::Table(self.merged))
	}

	/// Reads one file with environment variables resolved, returning its
	/// sections and the resolved paths it includes.
	async fn read(&mut self, path: &Path) -> Result<(toml::Table, Vec<PathBuf>), ConfigError> {
		let canonical = tokio::fs::canonicalize(path).await.map_err(|e| {
			ConfigError::Io(std::io::Error::new(
				e.kind(),
				format!("Configuration file not found: {}: {}", path.display(), e),
			))
		})?;

		if !self.loaded.insert(canonical.clone()) {
			return Err(ConfigError::Validation(format!(
				"Circular include: {} was already loaded",
				canonical.display()
			)));
		}

		let content = tokio::fs::read_to_string(&canonical).await?;
		let mut table: toml::Table = toml::from_str(&resolve_env_vars(&content)?)?;

		let includes = match table.remove(INCLUDE_KEY) {
			Some(value) => {
				let dir = canonical.parent().unwrap_or_else(|| Path::new("."));
				include_paths(value, &canonical)?
					.into_iter()
					.map(|include| dir.join(include))
					.collect()
			},
			None => Vec::new(),
		};

		Ok((table, includes))
	}

	fn merge(&mut self, table: toml::Table, source: &Path) -> Result<(), ConfigError> {
		for (key, value) in table {
			if key == NETWORKS_KEY {
				self.merge_networks(value, source)?;
			} else {
				self.claim(key.clone(), source)?;
				self.merged.insert(key, value);
			}
		}
		Ok(())
	}

	fn merge_networks(&mut self, value: toml::Value, source: &Path) -> Result<(), ConfigError> {
		let toml::Value::Table(chains) = value else {
			return Err(ConfigError::Validation(format!(
				"'{}' in {} must be a table of chains",
				NETWORKS_KEY,
				source.display()
			)));
		};

		for chain in chains.keys() {
			self.claim(format!("{}.{}", NETWORKS_KEY, chain), source)?;
		}

		// Only this method writes the networks section, so it is always a table.
		if let toml::Value::Table(merged) = self
			.merged
			.entry(NETWORKS_KEY)
			.or_insert(toml::Value::Table(toml::Table::new()))
		{
			for (chain, network) in chains {
				merged.insert(chain, network);
			}
		}
		Ok(())
	}

	fn claim(&mut self, section: String, source: &Path) -> Result<(), ConfigError> {
		if let Some(owner) = self.owners.get(&section) {
			return Err(ConfigError::Validation(format!(
				"Section '{}' is defined in both {} and {}",
				section,
				owner.display(),
				source.display()
			)));
		}
		self.owners.insert(section, source.to_path_buf());
		Ok(())
	}
}

fn include_paths(value: toml::Value, source: &Path) -> Result<Vec<PathBuf>, ConfigError> {
	let invalid = || {
		ConfigError::Validation(format!(
			"'{}' in {} must be a path or a list of paths",
			INCLUDE_KEY,
			source.display()
		))
	};

	match value {
		toml::Value::String(path) => Ok(vec![PathBuf::from(path)]),
		toml::Value::Array(items) => items
			.into_iter()
			.map(|item| match item {
				toml::Value::String(path) => Ok(PathBuf::from(path)),
				_ => Err(invalid()),
			})
			.collect(),
		_ => Err(invalid()),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;
	use tempfile::TempDir;

	const TRACKER: &str = r#"
[tracker]
id = "tracker-test"
check_delay_seconds = 5
"#;

	const MAINNET: &str = r#"
[networks.1]
rpc_url = "http://localhost:8545"
"#;

	const POLYGON: &str = r#"
[networks.137]
rpc_url = "http://localhost:8546"
[networks.137.explorer]
api_url = "https://api.polygonscan.com/api"
api_keys = ["KEY"]
"#;

	const STORAGE: &str = r#"
[storage]
primary = "memory"
[storage.implementations.memory]
"#;

	async fn load(dir: &TempDir, entry: &str) -> Result<Config, ConfigError> {
		ConfigLoader::new().load(&dir.path().join(entry)).await
	}

	#[tokio::test]
	async fn test_single_file_config() {
		let dir = TempDir::new().unwrap();
		fs::write(
			dir.path().join("config.toml"),
			format!("{}{}{}{}", TRACKER, MAINNET, POLYGON, STORAGE),
		)
		.unwrap();

		let config = load(&dir, "config.toml").await.unwrap();
		assert_eq!(config.tracker.check_delay_seconds, 5);
		assert_eq!(config.networks.len(), 2);
	}

	#[tokio::test]
	async fn test_networks_split_across_files() {
		let dir = TempDir::new().unwrap();
		fs::create_dir(dir.path().join("networks")).unwrap();
		fs::write(
			dir.path().join("main.toml"),
			format!(
				"include = [\"networks/polygon.toml\", \"storage.toml\"]\n{}{}",
				TRACKER, MAINNET
			),
		)
		.unwrap();
		fs::write(dir.path().join("networks/polygon.toml"), POLYGON).unwrap();
		fs::write(dir.path().join("storage.toml"), STORAGE).unwrap();

		let config = load(&dir, "main.toml").await.unwrap();
		assert_eq!(config.networks.len(), 2);
		assert!(config.networks[&1].explorer.is_none());
		assert!(config.networks[&137].explorer.is_some());
		assert_eq!(config.storage.primary, "memory");
	}

	#[tokio::test]
	async fn test_nested_include_is_relative_to_its_file() {
		let dir = TempDir::new().unwrap();
		fs::create_dir(dir.path().join("chains")).unwrap();
		fs::write(
			dir.path().join("main.toml"),
			format!("include = \"chains/all.toml\"\n{}{}", TRACKER, STORAGE),
		)
		.unwrap();
		fs::write(
			dir.path().join("chains/all.toml"),
			format!("include = [\"polygon.toml\"]\n{}", MAINNET),
		)
		.unwrap();
		fs::write(dir.path().join("chains/polygon.toml"), POLYGON).unwrap();

		let config = load(&dir, "main.toml").await.unwrap();
		assert_eq!(config.networks.len(), 2);
	}

	#[tokio::test]
	async fn test_chain_defined_twice_is_rejected() {
		let dir = TempDir::new().unwrap();
		fs::write(
			dir.path().join("main.toml"),
			format!("include = [\"again.toml\"]\n{}{}{}", TRACKER, MAINNET, STORAGE),
		)
		.unwrap();
		fs::write(dir.path().join("again.toml"), MAINNET).unwrap();

		let error = load(&dir, "main.toml").await.unwrap_err().to_string();
		assert!(error.contains("Section 'networks.1' is defined in both"));
	}

	#[tokio::test]
	async fn test_duplicate_section_is_rejected() {
		let dir = TempDir::new().unwrap();
		fs::write(
			dir.path().join("main.toml"),
			format!("include = [\"other.toml\"]\n{}{}{}", TRACKER, MAINNET, STORAGE),
		)
		.unwrap();
		fs::write(dir.path().join("other.toml"), "[tracker]\nid = \"other\"\n").unwrap();

		let error = load(&dir, "main.toml").await.unwrap_err().to_string();
		assert!(error.contains("Section 'tracker' is defined in both"));
	}

	#[tokio::test]
	async fn test_include_cycle_is_rejected() {
		let dir = TempDir::new().unwrap();
		fs::write(
			dir.path().join("a.toml"),
			format!("include = \"b.toml\"\n{}{}", TRACKER, STORAGE),
		)
		.unwrap();
		fs::write(
			dir.path().join("b.toml"),
			format!("include = \"a.toml\"\n{}", MAINNET),
		)
		.unwrap();

		let error = load(&dir, "a.toml").await.unwrap_err().to_string();
		assert!(error.contains("already loaded"));
	}

	#[tokio::test]
	async fn test_missing_include_and_bad_include_value() {
		let dir = TempDir::new().unwrap();
		fs::write(
			dir.path().join("missing.toml"),
			format!("include = [\"absent.toml\"]\n{}", TRACKER),
		)
		.unwrap();
		let error = load(&dir, "missing.toml").await.unwrap_err().to_string();
		assert!(error.contains("not found"));

		fs::write(
			dir.path().join("bad.toml"),
			format!("include = [1]\n{}", TRACKER),
		)
		.unwrap();
		let error = load(&dir, "bad.toml").await.unwrap_err().to_string();
		assert!(error.contains("must be a path or a list of paths"));
	}
}
