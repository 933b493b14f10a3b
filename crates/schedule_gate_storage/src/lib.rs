#![forbid(unsafe_code)]

pub mod file_slot;
pub mod memory_slot;
pub mod repo;
