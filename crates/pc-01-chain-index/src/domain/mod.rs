pub mod arena;
pub mod entities;
pub mod errors;
