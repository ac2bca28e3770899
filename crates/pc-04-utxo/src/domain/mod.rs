pub mod context;
pub mod errors;
pub mod tx_index;
