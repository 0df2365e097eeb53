//! Application startup and wiring

pub mod startup;
