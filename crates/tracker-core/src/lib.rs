//! Core transaction lifecycle tracker.
//!
//! Watches submitted transactions until the chain settles them, follows
//! wallet replacements through a block explorer, and drives the progress
//! state machine that observers subscribe to. The pieces are:
//!
//! - [`watcher`]: registry of watched hashes, receipt fetcher, explorer
//!   reconciler and the per-chain scheduler that runs check rounds
//! - [`state`]: the monotonic progress state machine
//! - [`handlers`]: the notifier turning chain observations into transitions
//! - [`engine`]: the [`TransactionTracker`] facade, its event bus and the
//!   sender history resolved against the chain
//! - [`builder`]: composition of a tracker from configured implementations

pub mod builder;
pub mod engine;
pub mod handlers;
pub mod state;
pub mod watcher;

#[cfg(test)]
mod mocks;

pub use builder::{BuilderError, TrackerBuilder, TrackerFactories};
pub use engine::event_bus::EventBus;
pub use engine::history::{RecentTransactionFilter, ResolvedTransaction};
pub use engine::{TrackerError, TransactionTracker};
pub use state::ProgressStateMachine;
pub use watcher::PendingReceipt;
