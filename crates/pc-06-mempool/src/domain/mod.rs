pub mod entities;
pub mod errors;
pub mod free_relay;
pub mod orphans;
pub mod pool;
