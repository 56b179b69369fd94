//! Count- and time-bounded event suppression
//!
//! The controller mirrors state in both directions (tmux to host, host to
//! tmux). Each mirrored change registers a block on the event its own echo
//! will produce, so the two sides never trigger each other indefinitely.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Bounds for a block. With neither bound the block lasts until cancelled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockOptions {
    /// Number of `is_blocked` checks the block absorbs
    pub count: Option<u32>,
    /// Lifetime of the block, whatever its remaining count
    pub time: Option<Duration>,
}

impl BlockOptions {
    pub fn count(count: u32) -> Self {
        Self {
            count: Some(count),
            time: None,
        }
    }

    pub fn time(time: Duration) -> Self {
        Self {
            count: None,
            time: Some(time),
        }
    }

    pub fn with_time(mut self, time: Duration) -> Self {
        self.time = Some(time);
        self
    }
}

#[derive(Debug)]
struct Entry {
    id: u64,
    remaining: Option<u32>,
    expires_at: Option<Instant>,
}

#[derive(Debug)]
struct Registry<E> {
    next_id: u64,
    entries: HashMap<E, Vec<Entry>>,
}

impl<E> Registry<E> {
    /// Drop expired entries for every event, and events left with none.
    fn prune(&mut self, now: Instant) {
        self.entries.retain(|_, entries| {
            entries.retain(|e| e.expires_at.is_none_or(|at| at > now));
            !entries.is_empty()
        });
    }

    fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}

/// Shared suppression registry. Clones refer to the same registry.
#[derive(Debug)]
pub struct EventBlocker<E> {
    registry: Arc<Mutex<Registry<E>>>,
}

impl<E> Clone for EventBlocker<E> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<E: Eq + Hash + Clone + Debug> Default for EventBlocker<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Eq + Hash + Clone + Debug> EventBlocker<E> {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                entries: HashMap::new(),
            })),
        }
    }

    /// Whether `event` is currently suppressed.
    ///
    /// A positive answer consumes one trigger from the oldest count-bounded
    /// entry; entries whose count reaches zero are dropped.
    pub fn is_blocked(&self, event: &E) -> bool {
        let now = Instant::now();
        let mut registry = self.registry.lock();
        let Some(entries) = registry.entries.get_mut(event) else {
            return false;
        };

        entries.retain(|e| e.expires_at.is_none_or(|at| at > now));
        let blocked = !entries.is_empty();

        if let Some(entry) = entries
            .iter_mut()
            .find(|e| e.remaining.is_some_and(|n| n > 0))
        {
            entry.remaining = entry.remaining.map(|n| n - 1);
        }
        entries.retain(|e| e.remaining != Some(0));

        if entries.is_empty() {
            registry.entries.remove(event);
        }
        if blocked {
            crate::debug_trace!("BLOCKER", "{:?} suppressed", event);
        }
        blocked
    }

    /// Register one entry per event in `events`.
    ///
    /// Expired entries of every event are dropped first, so events that are
    /// blocked but never checked do not accumulate.
    pub fn block_event(
        &self,
        events: impl IntoIterator<Item = E>,
        options: BlockOptions,
    ) -> BlockHandle<E> {
        let now = Instant::now();
        let expires_at = options.time.map(|t| now + t);
        let mut registry = self.registry.lock();
        registry.prune(now);
        let mut handles = Vec::new();

        for event in events {
            let id = registry.next_id;
            registry.next_id += 1;
            crate::debug_trace!("BLOCKER", "Blocking {:?} ({:?})", event, options);
            registry.entries.entry(event.clone()).or_default().push(Entry {
                id,
                remaining: options.count,
                expires_at,
            });
            handles.push((event, id));
        }

        BlockHandle {
            registry: Arc::clone(&self.registry),
            entries: handles,
        }
    }

    /// Register a single entry.
    pub fn block(&self, event: E, options: BlockOptions) -> BlockHandle<E> {
        self.block_event([event], options)
    }

    /// Number of entries held for all events, including expired ones not
    /// yet pruned.
    pub fn stored_entries(&self) -> usize {
        self.registry.lock().len()
    }

    /// Number of live entries for `event`. Does not consume triggers.
    pub fn active_blocks(&self, event: &E) -> usize {
        let now = Instant::now();
        self.registry.lock().entries.get(event).map_or(0, |entries| {
            entries
                .iter()
                .filter(|e| e.expires_at.is_none_or(|at| at > now))
                .count()
        })
    }
}

/// Removes the entries created by one `block_event` call.
///
/// Dropping the handle leaves the entries in place.
#[derive(Debug)]
pub struct BlockHandle<E: Eq + Hash> {
    registry: Arc<Mutex<Registry<E>>>,
    entries: Vec<(E, u64)>,
}

impl<E: Eq + Hash> BlockHandle<E> {
    /// Remove exactly this handle's entries. Safe to call more than once.
    pub fn cancel(&self) {
        let mut registry = self.registry.lock();
        for (event, id) in &self.entries {
            if let Some(entries) = registry.entries.get_mut(event) {
                entries.retain(|e| e.id != *id);
                if entries.is_empty() {
                    registry.entries.remove(event);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_event_not_blocked() {
        let blocker: EventBlocker<&str> = EventBlocker::new();
        assert!(!blocker.is_blocked(&"X"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_count_block_consumed_once() {
        let blocker = EventBlocker::new();
        blocker.block("X", BlockOptions::count(1));
        assert!(blocker.is_blocked(&"X"));
        assert!(!blocker.is_blocked(&"X"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_time_block_expires() {
        let blocker = EventBlocker::new();
        blocker.block("Y", BlockOptions::time(Duration::from_millis(50)));
        assert!(blocker.is_blocked(&"Y"));
        assert!(blocker.is_blocked(&"Y"));

        tokio::time::advance(Duration::from_millis(51)).await;
        assert!(!blocker.is_blocked(&"Y"));
        assert_eq!(blocker.active_blocks(&"Y"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_count_and_time_whichever_first() {
        let blocker = EventBlocker::new();
        blocker.block(
            "Z",
            BlockOptions::count(3).with_time(Duration::from_millis(100)),
        );
        assert!(blocker.is_blocked(&"Z"));
        tokio::time::advance(Duration::from_millis(150)).await;
        assert!(!blocker.is_blocked(&"Z"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_until_cancelled() {
        let blocker = EventBlocker::new();
        let handle = blocker.block("L", BlockOptions::default());
        tokio::time::advance(Duration::from_secs(3600)).await;
        for _ in 0..5 {
            assert!(blocker.is_blocked(&"L"));
        }
        handle.cancel();
        assert!(!blocker.is_blocked(&"L"));
        handle.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_removes_only_own_entries() {
        let blocker = EventBlocker::new();
        let first = blocker.block("A", BlockOptions::default());
        let _second = blocker.block("A", BlockOptions::default());
        assert_eq!(blocker.active_blocks(&"A"), 2);

        first.cancel();
        assert_eq!(blocker.active_blocks(&"A"), 1);
        assert!(blocker.is_blocked(&"A"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_multi_event_entries_are_independent() {
        let blocker = EventBlocker::new();
        let handle = blocker.block_event(["A", "B"], BlockOptions::count(1));
        assert!(blocker.is_blocked(&"A"));
        assert!(!blocker.is_blocked(&"A"));
        assert!(blocker.is_blocked(&"B"));

        handle.cancel();
        assert!(!blocker.is_blocked(&"B"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_consumes_oldest_counted_entry() {
        let blocker = EventBlocker::new();
        blocker.block("E", BlockOptions::time(Duration::from_millis(10)));
        blocker.block("E", BlockOptions::count(1));
        // Unbounded-count entry keeps it blocked; the counted one is consumed
        assert!(blocker.is_blocked(&"E"));
        assert_eq!(blocker.active_blocks(&"E"), 1);
        tokio::time::advance(Duration::from_millis(20)).await;
        assert!(!blocker.is_blocked(&"E"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clones_share_registry() {
        let blocker = EventBlocker::new();
        let other = blocker.clone();
        blocker.block(1u8, BlockOptions::count(1));
        assert!(other.is_blocked(&1));
        assert!(!blocker.is_blocked(&1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unchecked_expired_blocks_are_pruned() {
        let blocker = EventBlocker::new();
        for n in 0u32..1000 {
            blocker.block(n % 7, BlockOptions::count(1).with_time(Duration::from_millis(1)));
            tokio::time::advance(Duration::from_millis(5)).await;
        }
        assert_eq!(blocker.stored_entries(), 1);

        // Entries without a time bound stay until consumed or cancelled
        let handle = blocker.block(100, BlockOptions::default());
        blocker.block(101, BlockOptions::count(1));
        tokio::time::advance(Duration::from_secs(60)).await;
        blocker.block(102, BlockOptions::time(Duration::from_secs(1)));
        assert_eq!(blocker.stored_entries(), 3);

        handle.cancel();
        assert!(blocker.is_blocked(&101));
        assert_eq!(blocker.stored_entries(), 1);
    }
}
