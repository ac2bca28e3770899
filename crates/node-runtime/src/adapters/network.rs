//! # Peer Scoreboard
//!
//! `NetworkNotifier` for a node without a P2P layer attached: announcements
//! are queued for whatever relays them, misbehaviour accumulates per peer
//! and a peer reaching the ban threshold is banned.

use parking_lot::Mutex;
use pc_08_consensus::{Inventory, NetworkNotifier, PeerId};
use std::collections::{HashMap, HashSet};

/// Accumulated score at which a peer is banned.
pub const DEFAULT_BAN_SCORE: u32 = 100;

#[derive(Debug, Default)]
struct Board {
    scores: HashMap<PeerId, u32>,
    banned: HashSet<PeerId>,
    pending: Vec<Inventory>,
}

#[derive(Debug)]
pub struct PeerScoreboard {
    ban_score: u32,
    board: Mutex<Board>,
}

impl Default for PeerScoreboard {
    fn default() -> Self {
        Self::new(DEFAULT_BAN_SCORE)
    }
}

impl PeerScoreboard {
    pub fn new(ban_score: u32) -> Self {
        Self {
            ban_score,
            board: Mutex::new(Board::default()),
        }
    }

    pub fn score(&self, peer: PeerId) -> u32 {
        self.board.lock().scores.get(&peer).copied().unwrap_or(0)
    }

    pub fn is_banned(&self, peer: PeerId) -> bool {
        self.board.lock().banned.contains(&peer)
    }

    /// Announcements queued since the last drain.
    pub fn drain_announcements(&self) -> Vec<Inventory> {
        std::mem::take(&mut self.board.lock().pending)
    }
}

impl NetworkNotifier for PeerScoreboard {
    fn announce(&self, inventory: Inventory) {
        self.board.lock().pending.push(inventory);
    }

    fn misbehaving(&self, peer: PeerId, score: u32) {
        let mut board = self.board.lock();
        let total = {
            let entry = board.scores.entry(peer).or_insert(0);
            *entry = entry.saturating_add(score);
            *entry
        };
        if total >= self.ban_score && board.banned.insert(peer) {
            tracing::warn!("[node] 🚫 Peer {} banned (score {})", peer, total);
        } else {
            tracing::debug!("[node] Peer {} misbehaving: +{} = {}", peer, score, total);
        }
    }
}
