//! Core infrastructure shared across the scanner

pub mod config;
pub mod error_handling;
pub mod logging;
pub mod retry;
pub mod shutdown;
