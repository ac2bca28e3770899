//! Outbound ports of the UTXO engine.

use shared_types::{Hash, Transaction};

/// Read access to pooled transactions, the last source `fetch_inputs`
/// consults.
pub trait PoolView {
    fn pooled_tx(&self, txid: &Hash) -> Option<&Transaction>;
}
