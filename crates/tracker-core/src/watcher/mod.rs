//! Transaction watcher.
//!
//! Polls watched hashes for receipts and follows them across wallet
//! replacements until every one resolves or runs out of checks.

pub mod fetcher;
pub mod reconciler;
pub mod registry;
pub mod scheduler;

pub use fetcher::ReceiptFetcher;
pub use reconciler::{ExplorerReconciler, ReconcileError, Replacement};
pub use registry::{PendingReceipt, TransactionRegistry, WatchRecord};
pub use scheduler::{WatchSettings, WatcherScheduler};
