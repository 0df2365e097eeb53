//! Scan pipeline
//!
//! The scanner drives the whole system: it iterates the configured search
//! queries, applies the skip-decision filter to every result item, triages
//! candidate keys out of raw content, and hands confirmed-valid keys to the
//! sync dispatcher. Progress is recorded in the checkpoint as it goes.

pub mod filter;
pub mod manager;
pub mod query;
pub mod triage;

pub use filter::{should_skip, SkipReason, SkipStats};
pub use manager::ScanManager;
pub use query::normalize_query;
pub use triage::{KeyExtractor, TriageOutcome};
