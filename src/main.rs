mod app;
mod checkpoint;
mod core;
mod notifications;
mod output;
mod scanner;
mod search;
mod server;
mod sync;

include!(concat!(env!("OUT_DIR"), "/version.rs"));

fn main() {
    app::startup::startup();
}
