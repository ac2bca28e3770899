//! Ports: what the chain state needs from its host.

pub mod outbound;

pub use outbound::{
    ChainEventSubscriber, Inventory, NetworkNotifier, PeerId, SystemTimeSource, TimeSource,
};
