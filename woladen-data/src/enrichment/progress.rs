//! Periodic progress logging for long enrichment runs.

use std::time::{Duration, Instant};

use log::info;

/// When to emit a progress line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSettings {
    /// Log after every this many stations; zero disables the count trigger.
    pub every: usize,
    /// Log when this much time has passed since the last line.
    pub interval: Duration,
}

impl Default for ProgressSettings {
    fn default() -> Self {
        Self {
            every: 250,
            interval: Duration::from_secs(30),
        }
    }
}

/// Emits `info!` lines on a count or time trigger.
#[derive(Debug)]
pub struct ProgressReporter {
    settings: ProgressSettings,
    total: usize,
    started: Instant,
    last: Instant,
}

impl ProgressReporter {
    /// Reporter for a run over `total` stations.
    #[must_use]
    pub fn new(settings: ProgressSettings, total: usize) -> Self {
        let now = Instant::now();
        Self {
            settings,
            total,
            started: now,
            last: now,
        }
    }

    /// Whether a line is due after `done` stations at `now`.
    #[must_use]
    pub fn is_due(&self, done: usize, now: Instant) -> bool {
        if done == 0 {
            return false;
        }
        let count_due = self.settings.every > 0 && done % self.settings.every == 0;
        let time_due = now.saturating_duration_since(self.last) >= self.settings.interval;
        count_due || time_due || done == self.total
    }

    /// Record that `done` stations are finished and log if a line is due.
    /// Returns whether a line was logged.
    pub fn record(&mut self, done: usize, detail: impl FnOnce() -> String) -> bool {
        let now = Instant::now();
        if !self.is_due(done, now) {
            return false;
        }
        self.last = now;
        info!(
            "enriched {done}/{} stations in {:.1}s ({})",
            self.total,
            now.saturating_duration_since(self.started).as_secs_f64(),
            detail()
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn reporter(every: usize, interval_secs: u64, total: usize) -> ProgressReporter {
        ProgressReporter::new(
            ProgressSettings {
                every,
                interval: Duration::from_secs(interval_secs),
            },
            total,
        )
    }

    #[rstest]
    #[case(1, false)]
    #[case(9, false)]
    #[case(10, true)]
    #[case(20, true)]
    #[case(25, true)]
    fn count_and_completion_trigger_lines(#[case] done: usize, #[case] due: bool) {
        let progress = reporter(10, 3_600, 25);
        assert_eq!(progress.is_due(done, Instant::now()), due);
    }

    #[rstest]
    fn elapsed_time_triggers_a_line() {
        let progress = reporter(0, 5, 100);
        let later = Instant::now() + Duration::from_secs(6);
        assert!(progress.is_due(3, later));
        assert!(!progress.is_due(0, later));
    }

    #[rstest]
    fn recording_resets_the_timer() {
        let mut progress = reporter(2, 3_600, 100);
        assert!(!progress.record(1, String::new));
        assert!(progress.record(2, || "live=2".to_owned()));
    }
}
