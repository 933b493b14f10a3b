#![forbid(unsafe_code)]

pub mod clock;
pub mod config;
pub mod gate;
pub mod store;
