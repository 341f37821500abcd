//! Progress tracking for logical submissions.
//!
//! This module provides the state machine that moves a submission through
//! its lifecycle, rejecting out-of-order and duplicate observations.

pub mod progress;

pub use progress::ProgressStateMachine;
