//! Recursive parallelism budget.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Number of threads a fan-out call may keep live, its own included.
///
/// Always a power of two. A call over `n` items with budget `b` uses
/// `min(b, n)` workers, each handed a child budget of `max(b / n, 1)`, so
/// nested maps never exceed the top-level budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParallelBudget(usize);

impl ParallelBudget {
    /// Largest power of two not above `max`, at least 1.
    pub fn new(max: usize) -> Self {
        let max = max.max(1);
        Self(1 << (usize::BITS - 1 - max.leading_zeros()))
    }

    /// Threads available.
    pub fn get(&self) -> usize {
        self.0
    }

    /// Worker count and per-worker child budget for `items` items.
    pub fn split(&self, items: usize) -> (usize, ParallelBudget) {
        if items == 0 {
            return (0, *self);
        }
        let workers = self.0.min(items);
        (workers, Self::new(self.0 / items))
    }
}

/// Live and peak count of evaluating threads for one request.
#[derive(Debug)]
pub struct ThreadGauge {
    live: AtomicUsize,
    peak: AtomicUsize,
}

impl ThreadGauge {
    /// A gauge that already counts the request thread.
    pub fn new() -> Self {
        Self {
            live: AtomicUsize::new(1),
            peak: AtomicUsize::new(1),
        }
    }

    /// Count a newly started worker thread until the guard drops.
    pub fn enter(&self) -> GaugeGuard<'_> {
        let now = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        GaugeGuard { gauge: self }
    }

    /// Threads currently live.
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Most threads live at once so far.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl Default for ThreadGauge {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements the gauge on drop.
pub struct GaugeGuard<'a> {
    gauge: &'a ThreadGauge,
}

impl Drop for GaugeGuard<'_> {
    fn drop(&mut self) {
        self.gauge.live.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_down_to_power_of_two() {
        assert_eq!(ParallelBudget::new(0).get(), 1);
        assert_eq!(ParallelBudget::new(1).get(), 1);
        assert_eq!(ParallelBudget::new(12).get(), 8);
        assert_eq!(ParallelBudget::new(16).get(), 16);
    }

    #[test]
    fn split_never_exceeds_parent() {
        for budget in [1, 2, 4, 8, 16] {
            let parent = ParallelBudget::new(budget);
            for items in 1..40 {
                let (workers, child) = parent.split(items);
                assert!(workers * child.get() <= parent.get());
                assert!(workers <= parent.get());
                assert!(child.get() >= 1);
            }
        }
    }

    #[test]
    fn split_examples() {
        let b = ParallelBudget::new(8);
        assert_eq!(b.split(2), (2, ParallelBudget::new(4)));
        assert_eq!(b.split(3), (3, ParallelBudget::new(2)));
        assert_eq!(b.split(100), (8, ParallelBudget::new(1)));
    }

    #[test]
    fn gauge_tracks_peak() {
        let gauge = ThreadGauge::new();
        {
            let _a = gauge.enter();
            let _b = gauge.enter();
            assert_eq!(gauge.live(), 3);
        }
        assert_eq!(gauge.live(), 1);
        assert_eq!(gauge.peak(), 3);
    }
}
