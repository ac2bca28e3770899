//! Where the accountant reads input fractions from.
//!
//! Block connect reads the peg store through the open storage transaction.
//! Mempool admission layers pooled, unconfirmed outputs over the same store.

use crate::domain::errors::PegError;
use crate::domain::fractions::Fractions;
use shared_types::OutPoint;

pub trait FractionsSource {
    /// Stored fractions of an output, `None` if never recorded.
    fn fractions(&self, outpoint: &OutPoint) -> Result<Option<Fractions>, PegError>;

    /// True while the output waits in the frozen queue.
    fn is_frozen(&self, outpoint: &OutPoint) -> Result<bool, PegError>;
}
