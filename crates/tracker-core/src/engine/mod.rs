//! Transaction tracker facade.
//!
//! [`TransactionTracker`] owns the watcher, the progress state machine and
//! the collaborator services, and exposes the operations callers use:
//! submitting and watching hashes, cached and live receipt reads, and
//! progress snapshots. Its event loop reacts to watcher events until the
//! process receives Ctrl-C.

pub mod event_bus;
pub mod history;

use crate::handlers::{Notifier, ReceiptContext};
use crate::state::ProgressStateMachine;
use crate::watcher::{
	ExplorerReconciler, PendingReceipt, ReceiptFetcher, TransactionRegistry, WatchSettings,
	WatcherScheduler,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, Semaphore};
use tracker_config::Config;
use tracker_explorer::ExplorerService;
use tracker_rpc::{RpcError, RpcService};
use tracker_storage::{RecentTransactionStore, StorageError};
use tracker_types::{
	payload_signature, truncate_id, ChainId, ChainTransaction, JsonRpcPayload,
	ProgressId, TrackerEvent, TransactionHash, TransactionProgress, TransactionReceipt,
	TransactionState, WatcherEvent,
};

/// Errors returned by tracker operations.
#[derive(Debug, Error)]
pub enum TrackerError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Chain {0} is not configured")]
	UnsupportedChain(ChainId),
	#[error("RPC error: {0}")]
	Rpc(#[from] RpcError),
	#[error("Storage error: {0}")]
	Storage(#[from] StorageError),
	#[error("Handler error: {0}")]
	Handler(String),
}

/// Capacity of the tracker's event bus.
const EVENT_BUS_CAPACITY: usize = 1000;

/// Tracks submitted transactions until they settle.
#[derive(Clone)]
pub struct TransactionTracker {
	config: Config,
	registry: Arc<TransactionRegistry>,
	progress: Arc<ProgressStateMachine>,
	fetcher: ReceiptFetcher,
	scheduler: WatcherScheduler,
	recent: Arc<dyn RecentTransactionStore>,
	event_bus: event_bus::EventBus,
}

impl TransactionTracker {
	/// Wires the tracker's components over the given collaborators.
	pub fn new(
		config: Config,
		rpc: RpcService,
		explorer: ExplorerService,
		recent: Arc<dyn RecentTransactionStore>,
	) -> Self {
		let event_bus = event_bus::EventBus::new(EVENT_BUS_CAPACITY);
		let registry = Arc::new(TransactionRegistry::new(config.tracker.max_watched));
		let progress = Arc::new(ProgressStateMachine::new(event_bus.clone()));
		let notifier = Arc::new(Notifier::new(progress.clone(), event_bus.clone()));
		let fetcher = ReceiptFetcher::new(rpc, notifier);

		let reconciler = Arc::new(ExplorerReconciler::new(
			explorer,
			registry.clone(),
			recent.clone(),
			event_bus.clone(),
			config.tracker.latest_transaction_size,
		));

		let scheduler = WatcherScheduler::new(
			registry.clone(),
			fetcher.clone(),
			reconciler,
			event_bus.clone(),
			WatchSettings {
				check_delay: Duration::from_secs(config.tracker.check_delay_seconds),
				check_times: config.tracker.check_times,
			},
		);

		Self {
			config,
			registry,
			progress,
			fetcher,
			scheduler,
			recent,
			event_bus,
		}
	}

	fn ensure_chain(&self, chain_id: ChainId) -> Result<(), TrackerError> {
		if self.config.networks.contains_key(&chain_id) {
			Ok(())
		} else {
			Err(TrackerError::UnsupportedChain(chain_id))
		}
	}

	/// Records a freshly broadcast transaction: adds it to the sender's
	/// history, watches the hash and starts tracking its progress.
	///
	/// Returns the progress id, or `None` when the payload carries no
	/// transaction to derive one from.
	pub async fn submit(
		&self,
		chain_id: ChainId,
		hash: TransactionHash,
		payload: JsonRpcPayload,
	) -> Result<Option<ProgressId>, TrackerError> {
		self.ensure_chain(chain_id)?;

		if let Some(account) = payload.from() {
			self.recent
				.add_recent_transaction(chain_id, account, hash, payload.clone())
				.await?;
		}

		self.scheduler.watch(chain_id, hash, payload.clone());

		let progress_id = payload_signature(&payload);
		if let Some(progress_id) = progress_id {
			self.progress
				.begin_tracking(progress_id, TransactionState::WaitForConfirming, payload);
		}

		tracing::info!(
			chain_id,
			tx_hash = %truncate_id(&hash.to_string()),
			"Transaction submitted"
		);
		Ok(progress_id)
	}

	/// Watches a hash without touching history or progress.
	pub fn watch(
		&self,
		chain_id: ChainId,
		hash: TransactionHash,
		payload: JsonRpcPayload,
	) -> Result<bool, TrackerError> {
		self.ensure_chain(chain_id)?;
		Ok(self.scheduler.watch(chain_id, hash, payload))
	}

	pub fn unwatch(&self, chain_id: ChainId, hash: &TransactionHash) -> bool {
		self.scheduler.unwatch(chain_id, hash)
	}

	/// The watcher's latest receipt lookup for a hash. Never starts I/O.
	pub fn receipt_from_cache(
		&self,
		chain_id: ChainId,
		hash: &TransactionHash,
	) -> Option<PendingReceipt> {
		self.scheduler.receipt_from_cache(chain_id, hash)
	}

	/// Reads the receipt from the chain and feeds it to the notifier.
	pub async fn receipt_from_chain(
		&self,
		chain_id: ChainId,
		hash: &TransactionHash,
	) -> Result<Option<TransactionReceipt>, TrackerError> {
		self.ensure_chain(chain_id)?;
		let context = self.receipt_context(chain_id, hash);
		Ok(self.fetcher.fetch_receipt(chain_id, hash, context).await?)
	}

	/// What the watcher knows about a hash; empty when it is not watched.
	fn receipt_context(&self, chain_id: ChainId, hash: &TransactionHash) -> ReceiptContext {
		self.registry
			.get(chain_id, hash)
			.map(|record| ReceiptContext {
				progress_id: record.progress_id,
				cancellation: record.cancellation,
			})
			.unwrap_or_default()
	}

	/// Reads the transaction from the chain and feeds it to the notifier.
	pub async fn transaction_by_hash(
		&self,
		chain_id: ChainId,
		hash: &TransactionHash,
	) -> Result<Option<ChainTransaction>, TrackerError> {
		self.ensure_chain(chain_id)?;
		Ok(self.fetcher.fetch_transaction(chain_id, hash).await?)
	}

	pub fn begin_tracking(
		&self,
		progress_id: ProgressId,
		initial: TransactionState,
		payload: JsonRpcPayload,
	) -> bool {
		self.progress.begin_tracking(progress_id, initial, payload)
	}

	/// Snapshot of a tracked submission. Settled submissions are gone.
	pub fn progress(&self, progress_id: &ProgressId) -> Option<TransactionProgress> {
		self.progress.get(progress_id)
	}

	pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
		self.event_bus.subscribe()
	}

	/// Main event loop. Returns on Ctrl-C after disarming every watcher timer.
	pub async fn run(&self) -> Result<(), TrackerError> {
		let mut event_receiver = self.event_bus.subscribe();

		let semaphore = Arc::new(Semaphore::new(100));

		loop {
			tokio::select! {
				Ok(event) = event_receiver.recv() => {
					if let TrackerEvent::Watcher(WatcherEvent::TransactionReplaced { chain_id, new_hash, .. }) = event {
						self.spawn_handler(&semaphore, move |tracker| async move {
							tracker
								.transaction_by_hash(chain_id, &new_hash)
								.await
								.map_err(|e| TrackerError::Handler(format!("Failed to fetch replacement transaction: {}", e)))?;
							Ok(())
						})
						.await;
					}
				}

				_ = tokio::signal::ctrl_c() => {
					tracing::info!("Shutting down tracker");
					break;
				}
			}
		}

		self.scheduler.stop_all();
		Ok(())
	}

	pub fn event_bus(&self) -> &event_bus::EventBus {
		&self.event_bus
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	/// Spawns a handler task, bounded by the semaphore. Handler errors are
	/// logged.
	async fn spawn_handler<F, Fut>(&self, semaphore: &Arc<Semaphore>, handler: F)
	where
		F: FnOnce(TransactionTracker) -> Fut + Send + 'static,
		Fut: Future<Output = Result<(), TrackerError>> + Send,
	{
		let tracker = self.clone();
		match semaphore.clone().acquire_owned().await {
			Ok(permit) => {
				tokio::spawn(async move {
					let _permit = permit;
					if let Err(e) = handler(tracker).await {
						tracing::error!("Handler error: {}", e);
					}
				});
			},
			Err(e) => {
				tracing::error!("Failed to acquire semaphore permit: {}", e);
			},
		}
	}
}
