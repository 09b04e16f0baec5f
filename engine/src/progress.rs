//! Progress accounting.
//!
//! Recomputed after every job completion: `{completed, total, elapsed,
//! estimated_remaining}` where the ETA is the median per-job duration times
//! the jobs still outstanding. Progress is observational only - nothing in
//! scheduling reads it.

use std::time::{Duration, Instant};

use dragnet_tools::RunOutcome;

/// One progress snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    pub elapsed: Duration,
    /// `None` until at least one job has finished.
    pub estimated_remaining: Option<Duration>,
}

/// Events emitted by the orchestrator while a scan runs.
#[derive(Debug, Clone)]
pub enum ScanEvent {
    JobStarted {
        tool: String,
        target: String,
        attempt: u32,
    },
    JobFinished {
        tool: String,
        target: String,
        outcome: RunOutcome,
        duration: Duration,
    },
    Progress(Progress),
}

/// Tracks completions and computes snapshots.
#[derive(Debug)]
pub struct ProgressTracker {
    started: Instant,
    total: usize,
    completed: usize,
    durations_ms: Vec<u64>,
}

impl ProgressTracker {
    #[must_use]
    pub fn new(total: usize) -> Self {
        Self {
            started: Instant::now(),
            total,
            completed: 0,
            durations_ms: Vec::with_capacity(total),
        }
    }

    /// Record one terminal job completion. Retried attempts are not
    /// completions; only the terminal outcome counts.
    pub fn record(&mut self, duration: Duration) -> Progress {
        self.completed += 1;
        self.durations_ms.push(duration.as_millis() as u64);
        self.snapshot()
    }

    #[must_use]
    pub fn snapshot(&self) -> Progress {
        let remaining_jobs = self.total.saturating_sub(self.completed);
        let estimated_remaining = self.median_ms().map(|median| {
            Duration::from_millis(median.saturating_mul(remaining_jobs as u64))
        });
        Progress {
            completed: self.completed,
            total: self.total,
            elapsed: self.started.elapsed(),
            estimated_remaining,
        }
    }

    fn median_ms(&self) -> Option<u64> {
        if self.durations_ms.is_empty() {
            return None;
        }
        let mut sorted = self.durations_ms.clone();
        sorted.sort_unstable();
        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 0 {
            u64::midpoint(sorted[mid - 1], sorted[mid])
        } else {
            sorted[mid]
        };
        Some(median)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::ProgressTracker;

    #[test]
    fn no_completions_no_eta() {
        let tracker = ProgressTracker::new(4);
        let p = tracker.snapshot();
        assert_eq!(p.completed, 0);
        assert_eq!(p.total, 4);
        assert!(p.estimated_remaining.is_none());
    }

    #[test]
    fn eta_is_median_times_remaining() {
        let mut tracker = ProgressTracker::new(4);
        tracker.record(Duration::from_millis(100));
        tracker.record(Duration::from_millis(300));
        let p = tracker.record(Duration::from_millis(200));
        // median of {100, 200, 300} = 200ms, one job left.
        assert_eq!(p.completed, 3);
        assert_eq!(p.estimated_remaining, Some(Duration::from_millis(200)));
    }

    #[test]
    fn even_count_median_averages() {
        let mut tracker = ProgressTracker::new(10);
        tracker.record(Duration::from_millis(100));
        let p = tracker.record(Duration::from_millis(200));
        // median of {100, 200} = 150ms, eight jobs left.
        assert_eq!(p.estimated_remaining, Some(Duration::from_millis(1_200)));
    }
}
