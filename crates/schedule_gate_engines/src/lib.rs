#![forbid(unsafe_code)]

pub mod fingerprint;
pub mod promotion;
