//! Rolling time windows.
//!
//! A window is a sorted multiset of unix-second timestamps. Every access
//! first discards entries older than `now - duration`, so the window only
//! ever holds events from `[now - duration, now]`.

use std::collections::BTreeMap;

/// Sorted multiset of event timestamps within a trailing duration.
#[derive(Debug, Clone, Default)]
pub struct RollingWindow {
    /// Timestamp -> number of events recorded at that second
    events: BTreeMap<i64, u64>,

    /// Total number of events across all timestamps
    len: u64,
}

impl RollingWindow {
    /// Create an empty window.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop everything older than `now - duration`.
    pub fn prune(&mut self, now: i64, duration: u64) {
        let cutoff = now.saturating_sub(i64::try_from(duration).unwrap_or(i64::MAX));
        let kept = self.events.split_off(&cutoff);
        let dropped: u64 = self.events.values().sum();
        self.events = kept;
        self.len -= dropped;
    }

    /// Prune, record an event at `now`, and return the resulting count.
    ///
    /// Events in the same second are counted individually.
    pub fn increment(&mut self, now: i64, duration: u64) -> u64 {
        self.prune(now, duration);
        *self.events.entry(now).or_insert(0) += 1;
        self.len += 1;
        self.len
    }

    /// Prune and return the number of events still in range.
    pub fn count(&mut self, now: i64, duration: u64) -> u64 {
        self.prune(now, duration);
        self.len
    }

    /// Number of events currently held, without pruning.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Whether the window holds no events.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Forget every event.
    pub fn clear(&mut self) {
        self.events.clear();
        self.len = 0;
    }

    /// Oldest timestamp still held, if any.
    pub fn oldest(&self) -> Option<i64> {
        self.events.keys().next().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_increment_by_one() {
        let mut window = RollingWindow::new();
        assert_eq!(window.increment(100, 60), 1);
    }

    #[test]
    fn test_increment_by_sixty_same_second() {
        let mut window = RollingWindow::new();
        for i in 0..60 {
            assert_eq!(window.increment(100, 60), i + 1);
        }
    }

    #[test]
    fn test_eviction_after_duration() {
        let mut window = RollingWindow::new();
        assert_eq!(window.increment(100, 1), 1);
        assert_eq!(window.count(102, 1), 0);
        assert!(window.is_empty());
        assert_eq!(window.increment(102, 1), 1);
    }

    #[test]
    fn test_lower_bound_is_inclusive() {
        let mut window = RollingWindow::new();
        window.increment(100, 10);

        // 110 - 10 == 100, still in range
        assert_eq!(window.count(110, 10), 1);
        assert_eq!(window.count(111, 10), 0);
    }

    #[test]
    fn test_partial_eviction_keeps_recent_events() {
        let mut window = RollingWindow::new();
        window.increment(100, 10);
        window.increment(105, 10);
        window.increment(105, 10);
        window.increment(109, 10);

        assert_eq!(window.count(112, 10), 3);
        assert_eq!(window.oldest(), Some(105));
        assert_eq!(window.count(116, 10), 1);
    }

    #[test]
    fn test_huge_duration_keeps_everything() {
        let mut window = RollingWindow::new();
        window.increment(100, u64::MAX);
        assert_eq!(window.increment(200, u64::MAX), 2);
        assert_eq!(window.count(i64::MAX, u64::MAX), 2);
    }

    #[test]
    fn test_clear() {
        let mut window = RollingWindow::new();
        window.increment(100, 10);
        window.increment(101, 10);
        window.clear();
        assert_eq!(window.len(), 0);
        assert_eq!(window.oldest(), None);
    }

    proptest! {
        #[test]
        fn prop_count_matches_events_in_range(
            offsets in proptest::collection::vec(0i64..200, 0..100),
            duration in 1u64..120,
        ) {
            let mut offsets = offsets;
            offsets.sort_unstable();
            let base = 1_000_000i64;
            let mut window = RollingWindow::new();
            for offset in &offsets {
                window.increment(base + offset, duration);
            }

            let now = base + offsets.last().copied().unwrap_or(0);
            let cutoff = now - duration as i64;
            let expected = offsets.iter().filter(|o| base + **o >= cutoff).count() as u64;

            prop_assert_eq!(window.count(now, duration), expected);
            if let Some(oldest) = window.oldest() {
                prop_assert!(oldest >= cutoff);
            }
        }
    }
}
