//! Broadcast event bus connecting tracker components to observers.
//!
//! Backed by a `tokio::sync::broadcast` channel. Publishing never waits for
//! receivers; an observer that falls behind by more than the channel capacity
//! loses the oldest events.

use tokio::sync::broadcast;
use tracker_types::TrackerEvent;

/// Fire-and-forget broadcaster for [`TrackerEvent`]s.
#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<TrackerEvent>,
}

impl EventBus {
	/// Creates a bus buffering up to `capacity` events per receiver.
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	/// Sends an event to every current subscriber and returns how many
	/// received it. An event published while nobody listens is dropped.
	pub fn publish(&self, event: TrackerEvent) -> usize {
		self.sender.send(event).unwrap_or(0)
	}

	/// Subscribes to events published from now on.
	pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
		self.sender.subscribe()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tracker_types::{TransactionHash, WatcherEvent, B256};

	fn expired() -> TrackerEvent {
		TrackerEvent::Watcher(WatcherEvent::WatchExpired {
			chain_id: 1,
			hash: TransactionHash(B256::repeat_byte(1)),
		})
	}

	#[test]
	fn test_publish_without_subscribers_is_dropped() {
		let bus = EventBus::new(8);
		assert_eq!(bus.publish(expired()), 0);
	}

	#[tokio::test]
	async fn test_every_subscriber_receives() {
		let bus = EventBus::new(8);
		let mut first = bus.subscribe();
		let mut second = bus.subscribe();

		assert_eq!(bus.publish(expired()), 2);
		assert!(matches!(
			first.recv().await.unwrap(),
			TrackerEvent::Watcher(WatcherEvent::WatchExpired { chain_id: 1, .. })
		));
		assert!(second.recv().await.is_ok());
	}
}
