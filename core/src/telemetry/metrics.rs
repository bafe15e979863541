use std::sync::Mutex;

/// Per-session counters for the capture loop.
pub struct MetricsRecorder {
    inner: Mutex<Metrics>,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub submitted: usize,
    pub verdicts: usize,
    pub failures: usize,
    pub skipped_busy: usize,
    pub skipped_no_frame: usize,
}

#[derive(Default)]
struct Metrics {
    snapshot: MetricsSnapshot,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Metrics::default()),
        }
    }

    pub fn record_submitted(&self) {
        self.update(|m| m.submitted += 1);
    }

    pub fn record_verdict(&self) {
        self.update(|m| m.verdicts += 1);
    }

    pub fn record_failure(&self) {
        self.update(|m| m.failures += 1);
    }

    pub fn record_skipped_busy(&self) {
        self.update(|m| m.skipped_busy += 1);
    }

    pub fn record_skipped_no_frame(&self) {
        self.update(|m| m.skipped_no_frame += 1);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        if let Ok(metrics) = self.inner.lock() {
            metrics.snapshot
        } else {
            MetricsSnapshot::default()
        }
    }

    fn update(&self, apply: impl FnOnce(&mut MetricsSnapshot)) {
        if let Ok(mut metrics) = self.inner.lock() {
            apply(&mut metrics.snapshot);
        }
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "submitted {} | verdicts {} | failures {} | skipped busy {} | skipped no-frame {}",
            self.submitted, self.verdicts, self.failures, self.skipped_busy, self.skipped_no_frame
        )
    }
}
