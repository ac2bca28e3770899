//! Notifier and subscriber adapters.

use crate::ports::outbound::{ChainEventSubscriber, Inventory, NetworkNotifier, PeerId};
use parking_lot::Mutex;
use shared_types::{Block, Hash, Transaction};

/// Drops every notification. Used when no network is attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

impl NetworkNotifier for NullNotifier {
    fn announce(&self, _inventory: Inventory) {}

    fn misbehaving(&self, _peer: PeerId, _score: u32) {}
}

/// Keeps every notification for inspection.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    announced: Mutex<Vec<Inventory>>,
    misbehaving: Mutex<Vec<(PeerId, u32)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn announced(&self) -> Vec<Inventory> {
        self.announced.lock().clone()
    }

    pub fn misbehaving_reports(&self) -> Vec<(PeerId, u32)> {
        self.misbehaving.lock().clone()
    }
}

impl NetworkNotifier for RecordingNotifier {
    fn announce(&self, inventory: Inventory) {
        self.announced.lock().push(inventory);
    }

    fn misbehaving(&self, peer: PeerId, score: u32) {
        self.misbehaving.lock().push((peer, score));
    }
}

/// Chain event as seen by [`RecordingSubscriber`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordedEvent {
    Connected { hash: Hash, height: u32 },
    Disconnected { hash: Hash, height: u32 },
    TxAccepted(Hash),
}

#[derive(Debug, Default)]
pub struct RecordingSubscriber {
    events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingSubscriber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl ChainEventSubscriber for RecordingSubscriber {
    fn block_connected(&self, block: &Block, height: u32) {
        self.events.lock().push(RecordedEvent::Connected {
            hash: block.hash(),
            height,
        });
    }

    fn block_disconnected(&self, block: &Block, height: u32) {
        self.events.lock().push(RecordedEvent::Disconnected {
            hash: block.hash(),
            height,
        });
    }

    fn transaction_accepted(&self, tx: &Transaction) {
        self.events.lock().push(RecordedEvent::TxAccepted(tx.txid()));
    }
}
