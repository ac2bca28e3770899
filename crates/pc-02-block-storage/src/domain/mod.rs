pub mod errors;
pub mod txn;
pub mod value_objects;
