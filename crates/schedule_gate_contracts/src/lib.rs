#![forbid(unsafe_code)]

pub mod common;
pub mod pending;
pub mod schedule;

pub use common::{ContractViolation, SchemaVersion, Validate};
