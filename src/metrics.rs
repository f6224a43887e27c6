use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use sysinfo::System;

use crate::agent::SessionStatus;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionReport {
    pub duration: Duration,
    pub used_memory_bytes: u64,
    pub dispatches: usize,
    pub failed_dispatches: usize,
    /// `None` when the session ended with a generator failure.
    pub status: Option<SessionStatus>,
}

impl SessionReport {
    pub fn answered_rate(reports: &[Self]) -> f32 {
        if reports.is_empty() {
            return 0.0;
        }
        let answered = reports
            .iter()
            .filter(|r| r.status == Some(SessionStatus::Answered))
            .count();
        answered as f32 / reports.len() as f32
    }
}

/// Collects one [`SessionReport`] per finished session. Clones share storage.
#[derive(Default, Clone)]
pub struct MetricsTracker {
    reports: Arc<Mutex<Vec<SessionReport>>>,
}

impl MetricsTracker {
    pub fn start_session(&self) -> SessionGuard {
        SessionGuard {
            start: Instant::now(),
            dispatches: 0,
            failed_dispatches: 0,
            metrics: self.clone(),
        }
    }

    pub fn reports(&self) -> Vec<SessionReport> {
        self.reports
            .lock()
            .map(|reports| reports.clone())
            .unwrap_or_default()
    }
}

pub struct SessionGuard {
    start: Instant,
    dispatches: usize,
    failed_dispatches: usize,
    metrics: MetricsTracker,
}

impl SessionGuard {
    pub fn record_dispatch(&mut self, failed: bool) {
        self.dispatches += 1;
        if failed {
            self.failed_dispatches += 1;
        }
    }

    pub fn finish(self, status: Option<SessionStatus>) -> SessionReport {
        let duration = self.start.elapsed();
        let mut system = System::new();
        system.refresh_memory();
        let report = SessionReport {
            duration,
            used_memory_bytes: system.used_memory(),
            dispatches: self.dispatches,
            failed_dispatches: self.failed_dispatches,
            status,
        };
        if let Ok(mut reports) = self.metrics.reports.lock() {
            reports.push(report.clone());
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_answered_rate() {
        let tracker = MetricsTracker::default();
        let mut guard = tracker.start_session();
        guard.record_dispatch(false);
        guard.record_dispatch(true);
        let report = guard.finish(Some(SessionStatus::Answered));
        tracker.start_session().finish(Some(SessionStatus::Exhausted));

        assert_eq!(report.dispatches, 2);
        assert_eq!(report.failed_dispatches, 1);
        let reports = tracker.reports();
        assert_eq!(reports.len(), 2);
        assert_eq!(SessionReport::answered_rate(&reports), 0.5);
    }
}
