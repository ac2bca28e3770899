pub mod calc;
pub mod errors;
pub mod fractions;
pub mod ledger;
pub mod vote;
