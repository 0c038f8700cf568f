//! Frame counters shared between the worker and the controller.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::processor::AbandonReason;

/// Counters updated by the worker.
#[derive(Debug, Default)]
pub struct PipelineStats {
    frames_acquired: AtomicU64,
    poses_published: AtomicU64,
    no_candidates: AtomicU64,
    no_pattern: AtomicU64,
    no_match: AtomicU64,
    reindex_failed: AtomicU64,
    solver_failed: AtomicU64,
}

/// Point-in-time copy of `PipelineStats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStatsSnapshot {
    pub frames_acquired: u64,
    pub poses_published: u64,
    pub no_candidates: u64,
    pub no_pattern: u64,
    pub no_match: u64,
    pub reindex_failed: u64,
    pub solver_failed: u64,
}

impl PipelineStats {
    pub fn record_frame(&self) {
        self.frames_acquired.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_published(&self) {
        self.poses_published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_abandoned(&self, reason: AbandonReason) {
        let counter = match reason {
            AbandonReason::NoCandidates => &self.no_candidates,
            AbandonReason::NoPattern => &self.no_pattern,
            AbandonReason::NoMatch => &self.no_match,
            AbandonReason::Reindex => &self.reindex_failed,
            AbandonReason::PoseSolver => &self.solver_failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> FrameStatsSnapshot {
        FrameStatsSnapshot {
            frames_acquired: self.frames_acquired.load(Ordering::Relaxed),
            poses_published: self.poses_published.load(Ordering::Relaxed),
            no_candidates: self.no_candidates.load(Ordering::Relaxed),
            no_pattern: self.no_pattern.load(Ordering::Relaxed),
            no_match: self.no_match.load(Ordering::Relaxed),
            reindex_failed: self.reindex_failed.load(Ordering::Relaxed),
            solver_failed: self.solver_failed.load(Ordering::Relaxed),
        }
    }
}

impl FrameStatsSnapshot {
    /// Frames abandoned before a pose was published.
    pub fn abandoned(&self) -> u64 {
        self.no_candidates + self.no_pattern + self.no_match + self.reindex_failed + self.solver_failed
    }

    /// Acquired frames per second over `elapsed`.
    pub fn fps(&self, elapsed: Duration) -> f64 {
        let secs = elapsed.as_secs_f64();
        if secs > 0.0 {
            self.frames_acquired as f64 / secs
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_counts_outcomes() {
        let stats = PipelineStats::default();
        for _ in 0..3 {
            stats.record_frame();
        }
        stats.record_published();
        stats.record_abandoned(AbandonReason::NoMatch);
        stats.record_abandoned(AbandonReason::NoCandidates);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.frames_acquired, 3);
        assert_eq!(snapshot.poses_published, 1);
        assert_eq!(snapshot.abandoned(), 2);
        assert_relative_eq!(snapshot.fps(Duration::from_millis(1500)), 2.0);
        assert_relative_eq!(snapshot.fps(Duration::ZERO), 0.0);
    }
}
