//! Etherscan-compatible explorer implementation.
//!
//! Works against any explorer exposing the Etherscan `account/txlist` API
//! (Etherscan, Polygonscan, BscScan and their forks).

use crate::{ExplorerError, ExplorerFactory, ExplorerInterface, ExplorerRegistry};
use async_trait::async_trait;
use serde::Deserialize;
use tracker_types::{
	Address, ConfigSchema, ExplorerConfig, ExplorerTransaction, Field, FieldType,
	ImplementationRegistry, Schema, ValidationError,
};

/// Message Etherscan returns with status "0" for an account without history.
const NO_TRANSACTIONS_FOUND: &str = "No transactions found";

/// Response envelope of the Etherscan API.
#[derive(Debug, Deserialize)]
struct EtherscanResponse {
	status: String,
	message: String,
	result: EtherscanResult,
}

/// `result` is the record list on success and an error string otherwise.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EtherscanResult {
	Transactions(Vec<ExplorerTransaction>),
	Message(String),
}

/// Etherscan HTTP client.
pub struct EtherscanExplorer {
	client: reqwest::Client,
}

impl EtherscanExplorer {
	pub fn new(client: reqwest::Client) -> Self {
		Self { client }
	}

	fn decode(response: EtherscanResponse) -> Result<Vec<ExplorerTransaction>, ExplorerError> {
		match (response.status.as_str(), response.result) {
			("1", EtherscanResult::Transactions(transactions)) => Ok(transactions),
			(_, EtherscanResult::Transactions(transactions))
				if response.message.starts_with(NO_TRANSACTIONS_FOUND) =>
			{
				Ok(transactions)
			},
			(_, EtherscanResult::Message(detail)) => Err(ExplorerError::Api(format!(
				"{}: {}",
				response.message, detail
			))),
			(status, EtherscanResult::Transactions(_)) => Err(ExplorerError::Api(format!(
				"status {}: {}",
				status, response.message
			))),
		}
	}
}

#[async_trait]
impl ExplorerInterface for EtherscanExplorer {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(EtherscanSchema)
	}

	async fn get_latest_transactions(
		&self,
		endpoint: &ExplorerConfig,
		account: &Address,
		size: usize,
	) -> Result<Vec<ExplorerTransaction>, ExplorerError> {
		let address = format!("{:#x}", account);
		let offset = size.to_string();
		let mut query: Vec<(&str, &str)> = vec![
			("module", "account"),
			("action", "txlist"),
			("address", address.as_str()),
			("startblock", "0"),
			("endblock", "99999999"),
			("page", "1"),
			("offset", offset.as_str()),
			("sort", "desc"),
		];
		// Blank keys are skipped, so an unset `${VAR:-}` in front of a real key
		// never sends an empty `apikey`.
		if let Some(key) = endpoint.first_usable_key() {
			query.push(("apikey", key.expose()));
		}

		let response = self
			.client
			.get(&endpoint.api_url)
			.query(&query)
			.send()
			.await
			.map_err(|e| ExplorerError::Network(e.to_string()))?;

		if !response.status().is_success() {
			return Err(ExplorerError::Network(format!(
				"Explorer returned HTTP {}",
				response.status()
			)));
		}

		let body: EtherscanResponse = response
			.json()
			.await
			.map_err(|e| ExplorerError::Parse(e.to_string()))?;

		let mut transactions = Self::decode(body)?;
		transactions.truncate(size);

		tracing::debug!(
			account = %address,
			count = transactions.len(),
			"Fetched latest explorer transactions"
		);
		Ok(transactions)
	}
}

/// Configuration schema for the Etherscan implementation.
pub struct EtherscanSchema;

impl ConfigSchema for EtherscanSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![Field::new("user_agent", FieldType::String)],
		);
		schema.validate(config)
	}
}

/// Factory function to create the Etherscan implementation.
///
/// Configuration parameters:
/// - `user_agent`: optional User-Agent header sent with every request
pub fn create_explorer(config: &toml::Value) -> Result<Box<dyn ExplorerInterface>, ExplorerError> {
	EtherscanSchema
		.validate(config)
		.map_err(|e| ExplorerError::Configuration(format!("Invalid configuration: {}", e)))?;

	let mut builder = reqwest::Client::builder()
		.pool_idle_timeout(std::time::Duration::from_secs(90))
		.pool_max_idle_per_host(10);
	if let Some(user_agent) = config.get("user_agent").and_then(|v| v.as_str()) {
		builder = builder.user_agent(user_agent.to_string());
	}
	let client = builder
		.build()
		.map_err(|e| ExplorerError::Configuration(e.to_string()))?;

	Ok(Box::new(EtherscanExplorer::new(client)))
}

/// Registry for the Etherscan implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "etherscan";
	type Factory = ExplorerFactory;

	fn factory() -> Self::Factory {
		create_explorer
	}
}

impl ExplorerRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::{extract::Query, routing::get, Json, Router};
	use serde_json::{json, Value};
	use std::collections::HashMap;
	use tracker_types::ApiKey;

	const ACCOUNT: &str = "0x5fbdb2315678afecb367f032d93f642f64180aa3";

	async fn txlist(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
		if params.get("apikey").map(String::as_str) != Some("KEY1") {
			return Json(json!({
				"status": "0",
				"message": "NOTOK",
				"result": "Invalid API Key"
			}));
		}
		if params.get("address").map(String::as_str) != Some(ACCOUNT) {
			return Json(json!({
				"status": "0",
				"message": "No transactions found",
				"result": []
			}));
		}
		assert_eq!(params.get("sort").map(String::as_str), Some("desc"));
		let offset: usize = params["offset"].parse().unwrap();
		let records: Vec<Value> = (0..10u64)
			.rev()
			.map(|nonce| {
				json!({
					"hash": format!("0x{:064x}", nonce + 1),
					"nonce": nonce.to_string(),
					"from": ACCOUNT,
					"to": ACCOUNT,
					"value": "0",
					"input": "0x",
					"blockNumber": "100",
				})
			})
			.take(offset)
			.collect();
		Json(json!({ "status": "1", "message": "OK", "result": records }))
	}

	async fn serve() -> String {
		let app = Router::new().route("/api", get(txlist));
		let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		tokio::spawn(async move {
			axum::serve(listener, app).await.unwrap();
		});
		format!("http://{}/api", addr)
	}

	fn endpoint(api_url: String, keys: &[&str]) -> ExplorerConfig {
		ExplorerConfig {
			api_url,
			api_keys: keys.iter().map(ApiKey::new).collect(),
		}
	}

	#[tokio::test]
	async fn test_fetches_latest_transactions() {
		let url = serve().await;
		let explorer = EtherscanExplorer::new(reqwest::Client::new());
		let account: Address = ACCOUNT.parse().unwrap();

		let latest = explorer
			.get_latest_transactions(&endpoint(url, &["", "KEY1"]), &account, 5)
			.await
			.unwrap();
		assert_eq!(latest.len(), 5);
		assert_eq!(latest[0].nonce(), Some(9));
		assert!(latest[0].is_cancellation());
	}

	#[tokio::test]
	async fn test_empty_history_is_not_an_error() {
		let url = serve().await;
		let explorer = EtherscanExplorer::new(reqwest::Client::new());
		let other = Address::repeat_byte(0x22);

		let latest = explorer
			.get_latest_transactions(&endpoint(url, &["KEY1"]), &other, 5)
			.await
			.unwrap();
		assert!(latest.is_empty());
	}

	#[tokio::test]
	async fn test_api_error_surfaces() {
		let url = serve().await;
		let explorer = EtherscanExplorer::new(reqwest::Client::new());
		let account: Address = ACCOUNT.parse().unwrap();

		let err = explorer
			.get_latest_transactions(&endpoint(url, &["WRONG"]), &account, 5)
			.await
			.unwrap_err();
		assert!(matches!(err, ExplorerError::Api(message) if message.contains("Invalid API Key")));
	}

	#[test]
	fn test_factory_validates_config() {
		let ok: toml::Value = toml::from_str("user_agent = \"tracker\"").unwrap();
		assert!(create_explorer(&ok).is_ok());

		let bad: toml::Value = toml::from_str("user_agent = 5").unwrap();
		assert!(create_explorer(&bad).is_err());
	}
}
