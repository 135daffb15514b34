//! Async helpers

pub mod timeout;
