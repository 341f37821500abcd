//! Handlers turning chain observations into tracker state.
//!
//! The notifier classifies receipts and transaction lookups and feeds them
//! to the progress state machine.

pub mod notifier;

pub use notifier::{Notifier, ReceiptContext};
