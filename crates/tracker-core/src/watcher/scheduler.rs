//! Per-chain watcher scheduler.
//!
//! Each chain has at most one armed timer. When it fires, a check round runs:
//! evict records past the watch cap, spend one check of every watched record,
//! refresh receipts, reconcile every watched account against the explorer,
//! then either stop (every watched record has a mined receipt) or arm the
//! next timer. Rounds of one chain never overlap; rounds of different chains
//! run independently.

use super::fetcher::ReceiptFetcher;
use super::reconciler::ExplorerReconciler;
use super::registry::{PendingReceipt, TransactionRegistry, WatchRecord};
use crate::engine::event_bus::EventBus;
use crate::handlers::ReceiptContext;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::join_all;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::AbortHandle;
use tracing::instrument;
use tracker_types::{
	truncate_id, ChainId, JsonRpcPayload, TrackerEvent, TransactionHash, TransactionReceipt,
	WatcherEvent,
};

/// Timing of the watcher.
#[derive(Debug, Clone, Copy)]
pub struct WatchSettings {
	/// Delay between two check rounds of a chain.
	pub check_delay: Duration,
	/// Rounds a new record is checked in before it goes inert.
	pub check_times: u32,
}

struct ChainTimer {
	handle: AbortHandle,
	generation: u64,
}

/// Drives check rounds for every chain with watched transactions.
#[derive(Clone)]
pub struct WatcherScheduler {
	registry: Arc<TransactionRegistry>,
	fetcher: ReceiptFetcher,
	reconciler: Arc<ExplorerReconciler>,
	event_bus: EventBus,
	settings: WatchSettings,
	timers: Arc<DashMap<ChainId, ChainTimer>>,
	rounds: Arc<DashMap<ChainId, Arc<Mutex<()>>>>,
	generation: Arc<AtomicU64>,
}

fn is_mined(receipt: Option<&TransactionReceipt>) -> bool {
	receipt.is_some_and(|receipt| receipt.block_number.is_some())
}

impl WatcherScheduler {
	pub fn new(
		registry: Arc<TransactionRegistry>,
		fetcher: ReceiptFetcher,
		reconciler: Arc<ExplorerReconciler>,
		event_bus: EventBus,
		settings: WatchSettings,
	) -> Self {
		Self {
			registry,
			fetcher,
			reconciler,
			event_bus,
			settings,
			timers: Arc::new(DashMap::new()),
			rounds: Arc::new(DashMap::new()),
			generation: Arc::new(AtomicU64::new(0)),
		}
	}

	/// Starts watching a hash. Watching a tracked hash again changes nothing
	/// but still makes sure a round is scheduled.
	///
	/// Returns `true` when a new record was created.
	pub fn watch(&self, chain_id: ChainId, hash: TransactionHash, payload: JsonRpcPayload) -> bool {
		let inserted = self.registry.insert_if_absent(
			chain_id,
			hash,
			WatchRecord::new(payload, self.settings.check_times),
		);
		if inserted {
			tracing::debug!(
				chain_id,
				tx_hash = %truncate_id(&hash.to_string()),
				"Watching transaction"
			);
		}
		self.start_check(chain_id, false);
		inserted
	}

	/// Stops watching a hash. A lookup already in flight finishes unobserved.
	pub fn unwatch(&self, chain_id: ChainId, hash: &TransactionHash) -> bool {
		self.registry.remove(chain_id, hash).is_some()
	}

	/// The latest receipt lookup of a watched hash, without starting one.
	pub fn receipt_from_cache(
		&self,
		chain_id: ChainId,
		hash: &TransactionHash,
	) -> Option<PendingReceipt> {
		self.registry.pending_receipt(chain_id, hash)
	}

	/// Whether a round is armed for the chain.
	pub fn is_scheduled(&self, chain_id: ChainId) -> bool {
		self.timers.contains_key(&chain_id)
	}

	/// Arms the chain's timer unless one is already armed. With `force` the
	/// armed timer is replaced.
	pub fn start_check(&self, chain_id: ChainId, force: bool) {
		if force {
			self.stop_check(chain_id);
		}

		if let Entry::Vacant(vacant) = self.timers.entry(chain_id) {
			let generation = self.generation.fetch_add(1, Ordering::Relaxed);
			let scheduler = self.clone();
			let delay = self.settings.check_delay;
			let task = tokio::spawn(async move {
				tokio::time::sleep(delay).await;
				scheduler
					.timers
					.remove_if(&chain_id, |_, timer| timer.generation == generation);
				scheduler.check(chain_id).await;
			});
			vacant.insert(ChainTimer {
				handle: task.abort_handle(),
				generation,
			});
		}
	}

	/// Disarms the chain's timer. A no-op when none is armed.
	pub fn stop_check(&self, chain_id: ChainId) {
		if let Some((_, timer)) = self.timers.remove(&chain_id) {
			timer.handle.abort();
		}
	}

	/// Disarms every timer.
	pub fn stop_all(&self) {
		self.timers.retain(|_, timer| {
			timer.handle.abort();
			false
		});
	}

	/// Runs one check round for a chain.
	///
	/// Returns whether another round was scheduled.
	#[instrument(skip(self))]
	pub async fn check(&self, chain_id: ChainId) -> bool {
		let round = self.rounds.entry(chain_id).or_default().clone();
		let _round = round.lock().await;

		self.stop_check(chain_id);

		for (hash, _) in self.registry.unwatched(chain_id) {
			self.registry.remove(chain_id, &hash);
			tracing::debug!(tx_hash = %truncate_id(&hash.to_string()), "Evicted watched transaction");
		}

		for hash in self.registry.decrement_checks(chain_id) {
			let settled = self
				.registry
				.get(chain_id, &hash)
				.is_some_and(|record| is_mined(record.resolved_receipt().as_ref()));
			if !settled {
				tracing::info!(tx_hash = %truncate_id(&hash.to_string()), "Watch expired without receipt");
				self.event_bus
					.publish(TrackerEvent::Watcher(WatcherEvent::WatchExpired { chain_id, hash }));
			}
		}

		self.check_receipts(chain_id).await;
		self.check_accounts(chain_id).await;

		if self.all_settled(chain_id).await {
			tracing::debug!("All watched transactions settled");
			return false;
		}

		self.start_check(chain_id, true);
		true
	}

	/// Starts a lookup for every watched record without a mined receipt.
	async fn check_receipts(&self, chain_id: ChainId) {
		let lookups = self
			.registry
			.watched(chain_id)
			.into_iter()
			.map(|(hash, record)| async move {
				if let Some(pending) = record.pending_receipt.clone() {
					if is_mined(pending.await.as_ref()) {
						return;
					}
				}
				let context = ReceiptContext {
					progress_id: record.progress_id,
					cancellation: record.cancellation,
				};
				let pending = self.fetcher.spawn_fetch(chain_id, hash, context);
				self.registry.update(chain_id, &hash, |record| {
					record.pending_receipt = Some(pending);
				});
			});
		join_all(lookups).await;
	}

	/// Reconciles every watched account. Failures are logged and skipped.
	async fn check_accounts(&self, chain_id: ChainId) {
		if !self.reconciler.supports(chain_id) {
			return;
		}

		let accounts = self.registry.watched_accounts(chain_id);
		let results = join_all(
			accounts
				.iter()
				.map(|account| self.reconciler.reconcile(chain_id, *account)),
		)
		.await;

		for (account, result) in accounts.iter().zip(results) {
			if let Err(e) = result {
				tracing::warn!(account = %account, error = %e, "Reconciliation failed");
			}
		}
	}

	/// Waits for the watched records' lookups and reports whether every one
	/// found a mined receipt.
	async fn all_settled(&self, chain_id: ChainId) -> bool {
		let receipts = join_all(self.registry.watched(chain_id).into_iter().map(
			|(_, record)| async move {
				match record.pending_receipt {
					Some(pending) => pending.await,
					None => None,
				}
			},
		))
		.await;
		receipts.iter().all(|receipt| is_mined(receipt.as_ref()))
	}
}
