use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lightweight replay accounting updated by the channel workers.
#[derive(Debug, Default)]
pub struct ReplayStats {
    frames_published: AtomicU64,
    frames_skipped: AtomicU64,
}

impl ReplayStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_published(&self) {
        self.frames_published.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_skipped(&self) {
        self.frames_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn summary(&self) -> StatsSummary {
        StatsSummary {
            frames_published: self.frames_published.load(Ordering::Relaxed),
            frames_skipped: self.frames_skipped.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of the replay counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSummary {
    pub frames_published: u64,
    pub frames_skipped: u64,
}

impl fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "published={} skipped={}",
            self.frames_published, self.frames_skipped
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_accumulate() {
        let stats = ReplayStats::new();
        stats.record_published();
        stats.record_published();
        stats.record_skipped();

        let summary = stats.summary();
        assert_eq!(summary.frames_published, 2);
        assert_eq!(summary.frames_skipped, 1);
        assert_eq!(summary.to_string(), "published=2 skipped=1");
    }
}
