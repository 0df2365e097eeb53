//! Embedded servers

pub mod health;

pub use health::run_health_server;
