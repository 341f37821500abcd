//! Utility functions for common type conversions and transformations.
//!
//! This module provides helper functions for hex string handling, timestamps
//! and the serde adapters used to read JSON-RPC and explorer quantities.

pub mod formatting;
pub mod helpers;
pub mod quantity;

pub use formatting::{truncate_id, without_0x_prefix};
pub use helpers::current_timestamp_millis;
