//! Metered web server
//!
//! # Architecture
//! - **core**: Event record and the windowed EventPool
//! - **intercept**: pre/post interceptor chain around any request dispatcher
//! - **history**: durable append-only request log with startup replay
//! - **engine**: capture hook and the single-consumer aggregator
//! - **server**: router wiring, stat endpoint, lifecycle control
//! - **infrastructure**: cold path (configuration, logging)

pub mod core;
pub mod engine;
pub mod history;
pub mod infrastructure;
pub mod intercept;
pub mod server;

// Re-export commonly used types
pub use infrastructure::config::{Config, MeterConfig, ServerConfig};

use thiserror::Error;

/// Main error type for the metered web server
#[derive(Error, Debug)]
pub enum MeterError {
    #[error("History log error: {0}")]
    History(String),

    #[error("History replay error: {0}")]
    Replay(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, MeterError>;
