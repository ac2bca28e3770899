pub mod file;
pub mod flat_file;
pub mod memory;
