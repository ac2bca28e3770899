//! Driven ports (outbound dependencies).
//!
//! The chain state never talks to sockets or wall clocks directly. The host
//! wires a [`NetworkNotifier`] for relay and peer scoring, any number of
//! [`ChainEventSubscriber`]s for committed changes, and a [`TimeSource`]
//! for network-adjusted time.

use shared_types::{Block, Hash, Transaction};
use std::time::{SystemTime, UNIX_EPOCH};

/// Host-assigned peer identifier.
pub type PeerId = u64;

/// Item announced to peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Inventory {
    Block(Hash),
    Tx(Hash),
}

pub trait NetworkNotifier: Send + Sync {
    /// Relay a newly accepted block or transaction.
    fn announce(&self, inventory: Inventory);

    /// Charge `peer` a misbehaviour score.
    fn misbehaving(&self, peer: PeerId, score: u32);
}

/// Observer of committed chain changes. Called with the chain lock held,
/// after the storage transaction committed.
pub trait ChainEventSubscriber: Send + Sync {
    fn block_connected(&self, _block: &Block, _height: u32) {}

    fn block_disconnected(&self, _block: &Block, _height: u32) {}

    fn transaction_accepted(&self, _tx: &Transaction) {}
}

/// Source of network-adjusted time in seconds.
pub trait TimeSource: Send + Sync {
    fn adjusted_time(&self) -> u32;
}

/// Local wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn adjusted_time(&self) -> u32 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or_default()
    }
}
