use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use chrono::{DateTime, TimeZone, Utc};

use crate::action::Action;

/// Run-wide counters shared by every worker.
///
/// Each counter is independent and only ever incremented, so `Relaxed` adds are
/// enough; nothing reads two counters as a unit until the run has drained.
#[derive(Debug, Default)]
pub struct Metrics {
    write_success: AtomicU64,
    write_error: AtomicU64,
    read_success: AtomicU64,
    read_error: AtomicU64,
    // nanoseconds since the unix epoch, 0 until the first successful write
    last_success_nanos: AtomicI64,
}

impl Metrics {
    pub fn record_write_success(&self, at: DateTime<Utc>) {
        self.write_success.fetch_add(1, Ordering::Relaxed);
        if let Some(nanos) = at.timestamp_nanos_opt() {
            self.last_success_nanos.fetch_max(nanos, Ordering::Relaxed);
        }
    }

    pub fn record_write_error(&self) {
        self.write_error.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_read_success(&self) {
        self.read_success.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_read_error(&self) {
        self.read_error.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let nanos = self.last_success_nanos.load(Ordering::Relaxed);
        MetricsSnapshot {
            write_success: self.write_success.load(Ordering::Relaxed),
            write_error: self.write_error.load(Ordering::Relaxed),
            read_success: self.read_success.load(Ordering::Relaxed),
            read_error: self.read_error.load(Ordering::Relaxed),
            last_success: (nanos != 0).then(|| Utc.timestamp_nanos(nanos)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub write_success: u64,
    pub write_error: u64,
    pub read_success: u64,
    pub read_error: u64,
    pub last_success: Option<DateTime<Utc>>,
}

impl MetricsSnapshot {
    pub fn total_calls(&self) -> u64 {
        self.write_success + self.write_error + self.read_success + self.read_error
    }
}

/// Final report of a run.
#[derive(Debug, Clone)]
pub struct Summary {
    pub action: Action,
    pub counts: MetricsSnapshot,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl Summary {
    pub fn elapsed_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }

    pub fn duration_secs(&self) -> f64 {
        seconds_between(self.started_at, self.finished_at)
    }

    /// Whole milliseconds per logical call across every counted category.
    pub fn average_ms(&self) -> i64 {
        match self.counts.total_calls() {
            0 => 0,
            total => self.elapsed_ms() / total as i64,
        }
    }

    /// Time from the start of the run to the last successful write. Falls back
    /// to the end of the run when nothing succeeded.
    pub fn last_success_secs(&self) -> f64 {
        let last = self.counts.last_success.unwrap_or(self.finished_at);
        seconds_between(self.started_at, last)
    }
}

fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let delta = to - from;
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1_000_000.0,
        None => delta.num_milliseconds() as f64 / 1_000.0,
    }
}

impl Display for Summary {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{:-<23}", "")?;
        writeln!(f, "Benchmark Summary - {}", self.action)?;
        writeln!(f, "{:-<23}", "")?;
        writeln!(f, "Sent messages: {}", self.counts.write_success)?;
        writeln!(f, "Errors: {}", self.counts.write_error)?;
        writeln!(f, "(GET)Sent messages: {}", self.counts.read_success)?;
        writeln!(f, "(GET)Errors: {}", self.counts.read_error)?;
        writeln!(f, "Duration (sec): {}", self.duration_secs())?;
        writeln!(f, "Average (ms): {}", self.average_ms())?;
        write!(f, "Last Succeed Duration (sec): {}", self.last_success_secs())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::TimeDelta;

    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_increments_are_not_lost() {
        let metrics = Arc::new(Metrics::default());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let metrics = metrics.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..1000 {
                    metrics.record_write_success(Utc::now());
                    metrics.record_write_error();
                    metrics.record_read_success();
                    metrics.record_read_error();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.write_success, 8000);
        assert_eq!(snapshot.write_error, 8000);
        assert_eq!(snapshot.read_success, 8000);
        assert_eq!(snapshot.read_error, 8000);
        assert_eq!(snapshot.total_calls(), 32000);
    }

    #[test]
    fn last_success_never_moves_backwards() {
        let metrics = Metrics::default();
        assert_eq!(metrics.snapshot().last_success, None);

        let later = Utc::now();
        let earlier = later - TimeDelta::seconds(5);
        metrics.record_write_success(later);
        metrics.record_write_success(earlier);
        assert_eq!(metrics.snapshot().last_success, Some(later));
    }

    fn summary(counts: MetricsSnapshot, elapsed_ms: i64) -> Summary {
        let started_at = Utc::now();
        Summary {
            action: Action::WriteCondition,
            counts,
            started_at,
            finished_at: started_at + TimeDelta::milliseconds(elapsed_ms),
        }
    }

    #[test]
    fn average_divides_elapsed_by_every_category() {
        let counts = MetricsSnapshot {
            write_success: 3,
            write_error: 2,
            read_success: 4,
            read_error: 1,
            last_success: None,
        };
        let summary = summary(counts, 1234);
        assert_eq!(summary.elapsed_ms(), 1234);
        assert_eq!(summary.average_ms(), 1234 / 10);
        assert_eq!(summary.duration_secs(), 1.234);
        // no success recorded: measured to the end of the run
        assert_eq!(summary.last_success_secs(), 1.234);
    }

    #[test]
    fn report_layout() {
        let counts = MetricsSnapshot {
            write_success: 55,
            write_error: 45,
            read_success: 0,
            read_error: 0,
            last_success: None,
        };
        let mut summary = summary(counts, 2000);
        summary.counts.last_success = Some(summary.started_at + TimeDelta::milliseconds(500));

        let report = summary.to_string();
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(
            lines,
            vec![
                "-----------------------",
                "Benchmark Summary - write-condition",
                "-----------------------",
                "Sent messages: 55",
                "Errors: 45",
                "(GET)Sent messages: 0",
                "(GET)Errors: 0",
                "Duration (sec): 2",
                "Average (ms): 20",
                "Last Succeed Duration (sec): 0.5",
            ]
        );
    }
}
