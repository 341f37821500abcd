//! Common types module for the transaction tracker.
//!
//! This module defines the core data types shared by every tracker component:
//! chain transactions and receipts, JSON-RPC request payloads, the progress
//! state of a tracked submission, explorer records and the events broadcast
//! to observers.

/// Explorer API keys.
pub mod api_key;
/// Event types broadcast to tracker observers.
pub mod events;
/// Block explorer record types.
pub mod explorer;
/// Network configuration types.
pub mod networks;
/// JSON-RPC request payloads and the transaction config they carry.
pub mod payload;
/// Progress state of a tracked submission.
pub mod progress;
/// Base trait for self-registering implementations.
pub mod registry;
/// Content-derived progress identifiers.
pub mod signature;
/// Storage key namespaces.
pub mod storage;
/// Chain transaction and receipt types.
pub mod transaction;
/// Utility functions for formatting and serde helpers.
pub mod utils;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;

// Re-export all types for convenient access
pub use api_key::ApiKey;
pub use events::*;
pub use explorer::*;
pub use networks::{ExplorerConfig, NetworkConfig, NetworksConfig};
pub use payload::*;
pub use progress::*;
pub use registry::ImplementationRegistry;
pub use signature::*;
pub use storage::*;
pub use transaction::*;
pub use utils::{current_timestamp_millis, truncate_id, without_0x_prefix};
pub use validation::*;

/// Numeric EVM chain identifier.
pub type ChainId = u64;

pub use alloy_primitives::{Address, Bytes, B256, U256};
