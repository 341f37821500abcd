//! Event types broadcast by the tracker.
//!
//! Events flow through the event bus to any number of observers. Delivery is
//! fire-and-forget: an event published while nobody listens is dropped.

use crate::{Address, ChainId, TransactionHash, TransactionProgress, TransactionState};
use serde::{Deserialize, Serialize};

/// Main event type encompassing all tracker events.
///
/// Events are categorized by the component that produces them, allowing
/// consumers to filter and handle specific event types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TrackerEvent {
	/// Events from the progress state machine.
	Progress(ProgressEvent),
	/// Chain-wide transaction state observations from the notifier.
	State(StateEvent),
	/// Events from the watcher scheduler.
	Watcher(WatcherEvent),
}

/// Events related to a logical submission's progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ProgressEvent {
	/// A progress entry moved to a new state. Carries the full entry snapshot.
	Updated { progress: TransactionProgress },
}

/// Events related to a specific transaction hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StateEvent {
	/// A receipt was observed for a hash, regardless of per-id tracking.
	Updated {
		chain_id: ChainId,
		hash: TransactionHash,
		state: TransactionState,
	},
}

/// Events related to watched transactions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WatcherEvent {
	/// The explorer reported a different hash for a watched submission.
	TransactionReplaced {
		chain_id: ChainId,
		account: Address,
		old_hash: TransactionHash,
		new_hash: TransactionHash,
		cancellation: bool,
	},
	/// A watched record ran out of checks without a receipt.
	WatchExpired {
		chain_id: ChainId,
		hash: TransactionHash,
	},
}
