//! Sync dispatcher and downstream sinks
//!
//! Confirmed-valid keys are delivered to independently configured sinks on a
//! recurring flush cycle with at-least-once semantics: a sink's pending set
//! is only cleared after a confirmed-successful flush, so failures leave the
//! same keys queued for the next cycle. Every key receives an explicit
//! per-flush outcome in the send-result report.

pub mod dispatcher;
pub mod grouped;
pub mod merge;
pub mod outcome;

pub use dispatcher::SyncDispatcher;
pub use grouped::{Group, GroupTransport, GroupedAppendSink, HttpGroupTransport};
pub use merge::{HttpMergeTransport, MergeListSink, MergeTransport};
pub use outcome::{DeliveryOutcome, FlushReport};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("sink transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{context}: HTTP {status}")]
    Status { context: &'static str, status: u16 },
    #[error("sink API error code {code}")]
    Api { code: i64 },
    #[error("unexpected sink response: {0}")]
    UnexpectedBody(String),
}
