//! Event aggregation engine
//!
//! Bridges the interceptor chain's capture point to the event pool and the
//! durable history log. Request tasks race to enqueue; exactly one
//! aggregator task drains the queue, so pool insertion and log append follow
//! a single total order across all requests.

use std::sync::Arc;

use axum::extract::Request;
use tokio::sync::mpsc;

use crate::core::{Event, EventPool};
use crate::history::HistoryLog;
use crate::intercept::PreHook;

/// Build the capture hook installed as the chain's pre-hook.
///
/// Constructs an event from the request URI and hands it to the ingestion
/// queue. The send awaits when the aggregator is momentarily behind:
/// backpressure is preferred over silently dropping an event.
pub fn capture_hook(tx: mpsc::Sender<Event>) -> PreHook {
    Arc::new(move |req: &Request| {
        let event = Event::now(req.uri().to_string());
        let tx = tx.clone();
        Box::pin(async move {
            if tx.send(event).await.is_err() {
                // Queue already closed: the request was accepted before the
                // termination signal landed.
                tracing::warn!("ingestion queue closed; event not recorded");
            }
        })
    })
}

/// Single-consumer aggregator.
///
/// Owns the receiving end of the ingestion queue and the history file
/// handle. No other task touches either, so the pool mutex is the only lock
/// in the pipeline.
pub struct Aggregator {
    rx: mpsc::Receiver<Event>,
    pool: Arc<EventPool>,
    history: HistoryLog,
}

impl Aggregator {
    pub fn new(rx: mpsc::Receiver<Event>, pool: Arc<EventPool>, history: HistoryLog) -> Self {
        Self { rx, pool, history }
    }

    /// Drain the ingestion queue until every sender is gone, then flush the
    /// history log and exit.
    ///
    /// An append failure does not stop aggregation and does not affect the
    /// in-memory count.
    pub async fn run(mut self) {
        while let Some(event) = self.rx.recv().await {
            self.pool.add([event.clone()]);
            if let Err(err) = self.history.append(&event) {
                tracing::warn!(%err, url = %event.url, "history append failed");
            }
        }

        tracing::info!("ingestion queue closed, flushing history");
        if let Err(err) = self.history.sync() {
            tracing::warn!(%err, "history sync failed during shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::event::{unix_nanos, window_cutoff};
    use std::fs;
    use std::path::PathBuf;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("reqmeter_engine_{}_{}.his", name, std::process::id()))
    }

    #[tokio::test]
    async fn test_aggregator_drains_in_order_then_exits() {
        let path = scratch_path("drain");
        fs::remove_file(&path).ok();

        let pool = Arc::new(EventPool::new());
        let history = HistoryLog::open(&path).unwrap();
        let (tx, rx) = mpsc::channel(8);

        let aggregator = tokio::spawn(Aggregator::new(rx, pool.clone(), history).run());

        for url in ["/a", "/b", "/c"] {
            tx.send(Event::now(url)).await.unwrap();
        }
        drop(tx); // close the queue: the aggregator drains and exits

        aggregator.await.unwrap();
        assert_eq!(pool.prune_and_count(window_cutoff()), 3);

        let contents = fs::read_to_string(&path).unwrap();
        let urls: Vec<String> = contents
            .lines()
            .map(|l| serde_json::from_str::<Event>(l).unwrap().url)
            .collect();
        assert_eq!(urls, vec!["/a", "/b", "/c"]);

        fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn test_capture_hook_enqueues_request_uri() {
        let (tx, mut rx) = mpsc::channel(1);
        let hook = capture_hook(tx);

        let before = unix_nanos();
        let req = Request::builder()
            .uri("/stat?verbose=1")
            .body(axum::body::Body::empty())
            .unwrap();
        hook(&req).await;

        let event = rx.recv().await.unwrap();
        assert_eq!(event.url, "/stat?verbose=1");
        assert!(event.time >= before);
    }

    #[tokio::test]
    async fn test_capture_hook_survives_closed_queue() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let hook = capture_hook(tx);

        let req = Request::builder()
            .uri("/")
            .body(axum::body::Body::empty())
            .unwrap();
        // Logged and swallowed; the request itself is unaffected
        hook(&req).await;
    }
}
