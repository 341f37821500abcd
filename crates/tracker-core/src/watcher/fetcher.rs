//! Receipt fetcher.
//!
//! Thin layer over the chain RPC service. Every successful lookup is handed
//! to the notifier, so progress advances the same way whether the watcher or
//! a caller triggered the read. Lookups started by the watcher run as their
//! own tasks and are shared through [`PendingReceipt`].

use super::registry::PendingReceipt;
use crate::handlers::{Notifier, ReceiptContext};
use futures::FutureExt;
use std::sync::Arc;
use tracker_rpc::{RpcError, RpcService};
use tracker_types::{truncate_id, ChainId, ChainTransaction, TransactionHash, TransactionReceipt};

/// Fetches receipts and transactions, reporting them to the notifier.
#[derive(Clone)]
pub struct ReceiptFetcher {
	rpc: RpcService,
	notifier: Arc<Notifier>,
}

impl ReceiptFetcher {
	pub fn new(rpc: RpcService, notifier: Arc<Notifier>) -> Self {
		Self { rpc, notifier }
	}

	/// Fetches the receipt of `hash` from the chain.
	pub async fn fetch_receipt(
		&self,
		chain_id: ChainId,
		hash: &TransactionHash,
		context: ReceiptContext,
	) -> Result<Option<TransactionReceipt>, RpcError> {
		let receipt = self.rpc.get_transaction_receipt(chain_id, hash).await?;
		if let Some(receipt) = &receipt {
			self.notifier.notify_receipt(chain_id, receipt, context);
		}
		Ok(receipt)
	}

	/// Fetches the transaction of `hash` from the chain.
	pub async fn fetch_transaction(
		&self,
		chain_id: ChainId,
		hash: &TransactionHash,
	) -> Result<Option<ChainTransaction>, RpcError> {
		let transaction = self.rpc.get_transaction_by_hash(chain_id, hash).await?;
		if let Some(transaction) = &transaction {
			self.notifier.notify_transaction(transaction);
		}
		Ok(transaction)
	}

	/// Starts a receipt lookup in the background.
	///
	/// The lookup runs to completion even if nobody awaits it. Errors resolve
	/// to `None`; the next watcher round retries.
	pub fn spawn_fetch(
		&self,
		chain_id: ChainId,
		hash: TransactionHash,
		context: ReceiptContext,
	) -> PendingReceipt {
		let fetcher = self.clone();
		let task = tokio::spawn(async move {
			match fetcher.fetch_receipt(chain_id, &hash, context).await {
				Ok(receipt) => receipt,
				Err(e) => {
					tracing::warn!(
						chain_id,
						tx_hash = %truncate_id(&hash.to_string()),
						error = %e,
						"Receipt lookup failed"
					);
					None
				},
			}
		});
		task.map(|joined| joined.ok().flatten()).boxed().shared()
	}
}
