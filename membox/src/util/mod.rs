mod address;
pub mod memory;

pub use address::*;
