pub mod tx_db;
