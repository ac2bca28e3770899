//! # Rejection Classification
//!
//! Every validation error in the node core falls into one of three classes:
//!
//! | Class | `dos_score` | Handling |
//! |-------|-------------|----------|
//! | protocol violation | 1..=100 | reject, report the peer as misbehaving |
//! | soft rejection | 0, `is_soft` | reject quietly (orphan, duplicate, not yet mature) |
//! | fatal | 0, `is_fatal` | storage or integrity failure, abort the operation |

/// Implemented by every error that can reject a block or transaction.
pub trait DosScore {
    /// Misbehaviour score to charge the relaying peer.
    fn dos_score(&self) -> u32;

    /// Rejected without fault; the same data may become acceptable later.
    fn is_soft(&self) -> bool {
        false
    }

    /// Local failure unrelated to the data's validity.
    fn is_fatal(&self) -> bool {
        false
    }
}
