//! Adapters for the outbound ports.

pub mod clock;
pub mod notifier;

pub use clock::ManualClock;
pub use notifier::{NullNotifier, RecordedEvent, RecordingNotifier, RecordingSubscriber};
