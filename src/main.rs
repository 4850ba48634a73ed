//! Metered web server binary
//!
//! Counts every handled request, serves the trailing 60-second total on
//! /stat, and persists observations to req.his across restarts.

use axum::{routing::get, Router};

use reqmeter::infrastructure::logging::init_logging;
use reqmeter::server::MeteredServer;
use reqmeter::{Config, Result};

/// Main application state
pub struct MeterApp {
    config: Config,
}

impl MeterApp {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Build the demo dispatcher and run the metered server
    pub async fn run(&self) -> Result<()> {
        // Business routes live on the plain dispatcher; the metering chain
        // wraps whatever is mounted here
        let dispatcher = Router::new().route("/", get(|| async { "hello" }));

        let server = MeteredServer::new(dispatcher, &self.config.meter)?;
        server.run(&self.config.endpoint()).await
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Guards must stay alive so file logging keeps flushing until exit
    let _guards = init_logging();

    // Load config or use defaults
    let config = Config::load().unwrap_or_default();

    let app = MeterApp::new(config);
    app.run().await
}
