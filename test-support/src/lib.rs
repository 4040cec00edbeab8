pub mod fake_email_api;
pub mod fake_smtp;

use simplelog::{Config, LevelFilter, SimpleLogger};
use std::net::TcpListener;

pub fn setup_logging() {
    let _ = SimpleLogger::init(LevelFilter::Debug, Config::default());
}

/// Returns a local port which nothing is listening on at the time of the call.
pub fn unused_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .and_then(|listener| listener.local_addr())
        .map(|address| address.port())
        .unwrap()
}
