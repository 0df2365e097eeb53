//! Scan-progress checkpoint
//!
//! The checkpoint is the single durable record of scan progress: the last
//! completed scan time, the queries finished in the current pass, every
//! content sha already processed, and the per-sink pending-delivery sets.
//! It round-trips through a local JSON file so a restart resumes where the
//! previous run stopped and never loses keys awaiting delivery.

mod state;
mod store;

pub use state::{Checkpoint, SinkId};
pub use store::{CheckpointStore, StoreError};
