pub mod keys;
pub mod peg_db;
