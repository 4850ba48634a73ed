//! Metered web server
//!
//! Wires the interceptor chain, aggregation engine, and durable history into
//! one server context with explicit construction at startup and teardown at
//! shutdown:
//!
//! - starting: open the history log, replay it, wire the chain (failures
//!   here are fatal, before any traffic is accepted)
//! - running: serve requests, watch for SIGINT/SIGTERM
//! - draining: stop accepting, drain the ingestion queue, flush the history
//! - stopped: resources released, [`MeteredServer::run`] returns

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use axum::{extract::State, routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;

use crate::core::{event, EventPool};
use crate::engine::{capture_hook, Aggregator};
use crate::history::HistoryLog;
use crate::infrastructure::config::MeterConfig;
use crate::intercept::compose;
use crate::Result;

/// URL handling HTTP request statistic inquiries
pub const STAT_URL: &str = "/stat";

/// Lifecycle states, ordered; transitions are strictly forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LifecycleState {
    Starting = 0,
    Running = 1,
    Draining = 2,
    Stopped = 3,
}

/// Forward-only lifecycle tracker shared between the serving flow and the
/// shutdown watcher
#[derive(Debug)]
pub struct Lifecycle {
    state: AtomicU8,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(LifecycleState::Starting as u8),
        }
    }

    /// Advance to `next`. fetch_max keeps the furthest state if another task
    /// already moved past `next`, so transitions never go backwards.
    pub fn advance(&self, next: LifecycleState) {
        let prev = self.state.fetch_max(next as u8, Ordering::SeqCst);
        if prev < next as u8 {
            tracing::info!(state = ?next, "lifecycle transition");
        }
    }

    pub fn current(&self) -> LifecycleState {
        match self.state.load(Ordering::SeqCst) {
            0 => LifecycleState::Starting,
            1 => LifecycleState::Running,
            2 => LifecycleState::Draining,
            _ => LifecycleState::Stopped,
        }
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared state for the stat endpoint
#[derive(Clone)]
struct AppState {
    pool: Arc<EventPool>,
}

/// Handler for statistic inquiries: prune the pool to the trailing window,
/// then answer with the fixed-format count
async fn statistic(State(state): State<AppState>) -> String {
    let total = state.pool.prune_and_count(event::window_cutoff());
    format!("Total Request in Last 60 Seconds: {total}")
}

/// Metered web server: wraps a dispatcher so every request is counted
pub struct MeteredServer {
    app: Router,
    pool: Arc<EventPool>,
    aggregator: Aggregator,
    lifecycle: Arc<Lifecycle>,
}

impl MeteredServer {
    /// Open and replay the history log, then wire the metering chain around
    /// `dispatcher`. The [`STAT_URL`] route is reserved and registered here.
    ///
    /// Errors are startup-fatal: the process must terminate without serving
    /// traffic.
    pub fn new(dispatcher: Router, config: &MeterConfig) -> Result<Self> {
        let pool = Arc::new(EventPool::new());

        let mut history = HistoryLog::open(&config.history_file)?;
        let restored = history.replay(event::unix_nanos())?;
        tracing::info!(restored = restored.len(), "request history replayed");
        pool.add(restored);

        let (tx, rx) = mpsc::channel(config.queue_capacity);
        let aggregator = Aggregator::new(rx, pool.clone(), history);

        let stat = Router::new()
            .route(STAT_URL, get(statistic))
            .with_state(AppState { pool: pool.clone() });

        // The stat route joins the dispatcher before wrapping, so stat
        // queries pass through the capture hook like any other request
        let app = compose(Some(dispatcher.merge(stat)), Some(capture_hook(tx)), None)
            .layer(TraceLayer::new_for_http());

        Ok(Self {
            app,
            pool,
            aggregator,
            lifecycle: Arc::new(Lifecycle::new()),
        })
    }

    /// Pool shared with the stat endpoint
    pub fn pool(&self) -> Arc<EventPool> {
        self.pool.clone()
    }

    pub fn lifecycle(&self) -> Arc<Lifecycle> {
        self.lifecycle.clone()
    }

    /// Bind `endpoint` and serve until a termination signal drains the
    /// pipeline.
    ///
    /// Returns only after the aggregator finished every queued event and the
    /// history log was flushed and closed; events still in flight inside
    /// already-accepted handlers at signal time are waited for as part of
    /// the graceful stop.
    pub async fn run(self, endpoint: &str) -> Result<()> {
        let Self {
            app,
            aggregator,
            lifecycle,
            ..
        } = self;

        let aggregator = tokio::spawn(aggregator.run());

        let listener = TcpListener::bind(endpoint).await?;
        tracing::info!(%endpoint, "metered web server listening");

        lifecycle.advance(LifecycleState::Running);
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal(lifecycle.clone()))
            .await?;

        // serve() returning has dropped the router and with it the last
        // queue sender: the aggregator drains what is left and exits
        lifecycle.advance(LifecycleState::Draining);
        if let Err(err) = aggregator.await {
            tracing::error!(%err, "aggregator task failed");
        }

        lifecycle.advance(LifecycleState::Stopped);
        tracing::info!("metered web server stopped");
        Ok(())
    }
}

/// Wait for SIGINT or SIGTERM, then flag the draining transition
async fn shutdown_signal(lifecycle: Arc<Lifecycle>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("termination signal received, draining");
    lifecycle.advance(LifecycleState::Draining);
}
