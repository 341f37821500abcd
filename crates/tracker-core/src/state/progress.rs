//! Progress state machine implementation.
//!
//! Keeps one entry per [`ProgressId`] and moves it through
//! WaitForConfirming -> Hash -> Receipt -> Confirmed, with Failed reachable
//! from every non-terminal state. Observations arrive from several tasks in
//! any order; an observation that would move an entry backwards is dropped.
//! Entries leave the machine once they reach a terminal state.

use crate::engine::event_bus::EventBus;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};
use tracker_types::{
	JsonRpcPayload, ProgressEvent, ProgressId, TrackerEvent, TransactionHash, TransactionProgress,
	TransactionState, TransactionStateType,
};

/// Tracks the progress of logical submissions and broadcasts every change.
pub struct ProgressStateMachine {
	entries: DashMap<ProgressId, TransactionProgress>,
	event_bus: EventBus,
}

impl ProgressStateMachine {
	pub fn new(event_bus: EventBus) -> Self {
		Self {
			entries: DashMap::new(),
			event_bus,
		}
	}

	/// Starts tracking a submission with `initial` as its first state and
	/// broadcasts it.
	///
	/// The first state is not checked against the transition table: any
	/// state may open an entry. A terminal first state is broadcast and the
	/// entry is dropped straight away. Returns `false` when the id is
	/// already tracked.
	pub fn begin_tracking(
		&self,
		progress_id: ProgressId,
		initial: TransactionState,
		payload: JsonRpcPayload,
	) -> bool {
		let progress = TransactionProgress {
			progress_id,
			state: initial,
			payload,
		};
		match self.entries.entry(progress_id) {
			Entry::Occupied(_) => return false,
			Entry::Vacant(vacant) => {
				if !progress.state.is_final() {
					vacant.insert(progress.clone());
				}
			},
		}

		tracing::debug!(
			progress_id = %progress_id,
			state = ?progress.state.kind(),
			"Progress tracking started"
		);
		self.event_bus
			.publish(TrackerEvent::Progress(ProgressEvent::Updated { progress }));
		true
	}

	/// Moves an entry to `next` if the transition table allows it.
	///
	/// Unknown ids and illegal transitions are ignored. Returns whether the
	/// state changed.
	pub fn apply_transition(&self, progress_id: &ProgressId, next: TransactionState) -> bool {
		let snapshot = {
			let Some(mut entry) = self.entries.get_mut(progress_id) else {
				return false;
			};
			if !Self::is_valid_transition(entry.state.kind(), next.kind()) {
				tracing::trace!(
					progress_id = %progress_id,
					from = ?entry.state.kind(),
					to = ?next.kind(),
					"Ignored progress transition"
				);
				return false;
			}
			entry.state = next;
			entry.clone()
		};

		if snapshot.state.is_final() {
			self.entries.remove(progress_id);
		}

		tracing::debug!(
			progress_id = %progress_id,
			state = ?snapshot.state.kind(),
			"Progress updated"
		);
		self.event_bus
			.publish(TrackerEvent::Progress(ProgressEvent::Updated {
				progress: snapshot,
			}));
		true
	}

	/// Stops tracking without a final transition.
	pub fn remove(&self, progress_id: &ProgressId) -> Option<TransactionProgress> {
		self.entries.remove(progress_id).map(|(_, progress)| progress)
	}

	pub fn get(&self, progress_id: &ProgressId) -> Option<TransactionProgress> {
		self.entries.get(progress_id).map(|entry| entry.clone())
	}

	/// Finds the entry whose current state refers to `hash`.
	pub fn find_by_hash(&self, hash: &TransactionHash) -> Option<ProgressId> {
		self.entries
			.iter()
			.find(|entry| entry.state.hash().as_ref() == Some(hash))
			.map(|entry| *entry.key())
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Checks if a state transition is valid
	fn is_valid_transition(from: TransactionStateType, to: TransactionStateType) -> bool {
		use TransactionStateType::*;

		// Each target state maps to the states it may be entered from
		static TRANSITIONS: Lazy<HashMap<TransactionStateType, HashSet<TransactionStateType>>> =
			Lazy::new(|| {
				let mut m = HashMap::new();
				m.insert(Unknown, HashSet::new()); // initial only
				m.insert(WaitForConfirming, HashSet::from([Unknown]));
				m.insert(Hash, HashSet::from([Unknown, WaitForConfirming]));
				m.insert(Receipt, HashSet::from([Unknown, WaitForConfirming, Hash]));
				m.insert(Confirmed, HashSet::from([WaitForConfirming, Hash, Receipt]));
				m.insert(
					Failed,
					HashSet::from([Unknown, WaitForConfirming, Hash, Receipt]),
				);
				m
			});

		TRANSITIONS
			.get(&to)
			.is_some_and(|sources| sources.contains(&from))
	}
}
