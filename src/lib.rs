pub mod app;
pub mod checkpoint;
pub mod core;
pub mod notifications;
pub mod output;
pub mod scanner;
pub mod search;
pub mod server;
pub mod sync;

include!(concat!(env!("OUT_DIR"), "/version.rs"));
