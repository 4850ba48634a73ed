//! Shared pool of observed request events
//!
//! Insertion-ordered events guarded by a single mutex, so add/prune/count
//! never observe a partially modified pool. Pruning is lazy: it runs only
//! when a stat query asks for it, never on a timer. Between queries the pool
//! can grow unboundedly if ingestion outpaces query frequency - an accepted
//! tradeoff, not a bug.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::core::Event;

/// Thread-safe, time-windowed container of observed events
#[derive(Debug, Default)]
pub struct EventPool {
    entries: Mutex<VecDeque<Event>>,
}

impl EventPool {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(1024)),
        }
    }

    /// Append events to the pool, preserving arrival order. Always succeeds.
    pub fn add<I>(&self, events: I)
    where
        I: IntoIterator<Item = Event>,
    {
        let mut entries = self.entries.lock();
        entries.extend(events);
    }

    /// Remove every event with a timestamp strictly earlier than `cutoff`,
    /// leaving the rest in original relative order
    pub fn prune(&self, cutoff: i64) {
        let mut entries = self.entries.lock();
        Self::evict_old(&mut entries, cutoff);
    }

    /// Number of events currently held
    pub fn count(&self) -> usize {
        self.entries.lock().len()
    }

    /// Prune then count under a single lock acquisition.
    ///
    /// The stat query uses this so no concurrent add can land between the
    /// prune and the read.
    pub fn prune_and_count(&self, cutoff: i64) -> usize {
        let mut entries = self.entries.lock();
        Self::evict_old(&mut entries, cutoff);
        entries.len()
    }

    fn evict_old(entries: &mut VecDeque<Event>, cutoff: i64) {
        // Events sit in enqueue order, but timestamps taken by racing
        // requests are not guaranteed monotonic across entries.
        entries.retain(|e| e.time >= cutoff);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::event::{unix_nanos, window_cutoff};
    use proptest::prelude::*;
    use std::sync::Arc;

    fn make_event(time: i64) -> Event {
        Event {
            url: "/".to_string(),
            time,
        }
    }

    #[test]
    fn test_fresh_pool_is_empty() {
        let pool = EventPool::new();
        assert_eq!(pool.count(), 0);
    }

    #[test]
    fn test_add_ten_current_events() {
        let pool = EventPool::new();
        pool.add((0..10).map(|_| Event::now("/")));
        assert_eq!(pool.count(), 10);
        assert_eq!(pool.prune_and_count(window_cutoff()), 10);
    }

    #[test]
    fn test_prune_far_future_cutoff_clears_pool() {
        let pool = EventPool::new();
        let now = unix_nanos();
        pool.add((0..10).map(|_| make_event(now)));

        // Cutoff 61 seconds ahead of the events
        pool.prune(now + 61_000_000_000);
        assert_eq!(pool.count(), 0);
    }

    #[test]
    fn test_prune_keeps_recent_in_order() {
        let pool = EventPool::new();
        pool.add(vec![
            make_event(100),
            make_event(50),
            make_event(200),
            make_event(150),
        ]);

        pool.prune(120);
        let remaining: Vec<i64> = pool.entries.lock().iter().map(|e| e.time).collect();
        assert_eq!(remaining, vec![200, 150]);
    }

    #[test]
    fn test_prune_cutoff_boundary_is_exclusive() {
        let pool = EventPool::new();
        pool.add(vec![make_event(99), make_event(100), make_event(101)]);

        // Strictly earlier than the cutoff is removed; equal stays
        assert_eq!(pool.prune_and_count(100), 2);
    }

    #[test]
    fn test_add_nothing() {
        let pool = EventPool::new();
        pool.add(std::iter::empty());
        assert_eq!(pool.count(), 0);
    }

    #[test]
    fn test_concurrent_add_and_count() {
        let pool = Arc::new(EventPool::new());
        let mut handles = Vec::new();

        for _ in 0..4 {
            let pool = pool.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..250 {
                    pool.add([Event::now("/")]);
                    // Interleaved queries never see a torn pool
                    let _ = pool.prune_and_count(window_cutoff());
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        // Everything added is current, so nothing was pruned
        assert_eq!(pool.prune_and_count(window_cutoff()), 1000);
    }

    proptest! {
        #[test]
        fn prune_and_count_matches_window(
            times in proptest::collection::vec(0i64..2_000_000, 0..200),
            cutoff in 0i64..2_000_000,
        ) {
            let pool = EventPool::new();
            pool.add(times.iter().map(|&t| make_event(t)));

            let expected = times.iter().filter(|&&t| t >= cutoff).count();
            prop_assert_eq!(pool.prune_and_count(cutoff), expected);
        }
    }
}
