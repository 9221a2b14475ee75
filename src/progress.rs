//! Upload progress reporting.
//!
//! Backends feed byte counts into a [`ProgressTracker`], which forwards
//! snapshots to an optional [`ProgressSink`]. Sinks run inline on the upload
//! path and must return quickly.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

/// Snapshot of an upload in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    pub bytes_sent: u64,
    pub total_bytes: u64,
}

impl UploadProgress {
    /// Completion in percent, 0.0 to 100.0. Empty uploads count as complete.
    pub fn percent(&self) -> f32 {
        if self.total_bytes == 0 {
            return 100.0;
        }
        (self.bytes_sent.min(self.total_bytes) as f64 / self.total_bytes as f64 * 100.0) as f32
    }

    pub fn is_complete(&self) -> bool {
        self.bytes_sent >= self.total_bytes
    }
}

/// Progress callback type
pub type ProgressSink = Arc<dyn Fn(UploadProgress) + Send + Sync>;

/// Counts bytes handed to the transport for one upload.
pub struct ProgressTracker {
    total: u64,
    sent: AtomicU64,
    sink: Option<ProgressSink>,
}

impl ProgressTracker {
    pub fn new(total: u64, sink: Option<ProgressSink>) -> Self {
        Self {
            total,
            sent: AtomicU64::new(0),
            sink,
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    /// Record `bytes` more as sent and notify the sink.
    pub fn advance(&self, bytes: u64) {
        let sent = self.sent.fetch_add(bytes, Ordering::Relaxed) + bytes;
        self.report(sent);
    }

    /// Report the upload as fully sent.
    pub fn finish(&self) {
        self.sent.store(self.total, Ordering::Relaxed);
        self.report(self.total);
    }

    fn report(&self, sent: u64) {
        if let Some(ref sink) = self.sink {
            sink(UploadProgress {
                bytes_sent: sent,
                total_bytes: self.total,
            });
        }
    }
}

/// Fires once each time progress enters a new 10% step.
struct PercentSteps {
    last: AtomicU8,
}

impl PercentSteps {
    fn new() -> Self {
        Self {
            last: AtomicU8::new(0),
        }
    }

    fn crossed(&self, progress: UploadProgress) -> bool {
        let step = (progress.percent() / 10.0).floor() as u8;
        step > self.last.fetch_max(step, Ordering::Relaxed)
    }
}

/// Sink that logs once per 10% step.
pub fn logging_sink(label: impl Into<String>) -> ProgressSink {
    let label = label.into();
    let steps = PercentSteps::new();

    Arc::new(move |progress: UploadProgress| {
        if steps.crossed(progress) {
            tracing::info!("[{:.0}%] {}", progress.percent(), label);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn recording_sink() -> (ProgressSink, Arc<Mutex<Vec<UploadProgress>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let captured = seen.clone();
        let sink: ProgressSink = Arc::new(move |p| captured.lock().push(p));
        (sink, seen)
    }

    #[test]
    fn test_percent() {
        let p = UploadProgress {
            bytes_sent: 25,
            total_bytes: 100,
        };
        assert!((p.percent() - 25.0).abs() < f32::EPSILON);
        assert!(!p.is_complete());

        let empty = UploadProgress {
            bytes_sent: 0,
            total_bytes: 0,
        };
        assert!((empty.percent() - 100.0).abs() < f32::EPSILON);
        assert!(empty.is_complete());
    }

    #[test]
    fn test_tracker_accumulates() {
        let (sink, seen) = recording_sink();
        let tracker = ProgressTracker::new(10, Some(sink));

        tracker.advance(4);
        tracker.advance(6);

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].bytes_sent, 4);
        assert_eq!(seen[1].bytes_sent, 10);
        assert!(seen[1].is_complete());
    }

    #[test]
    fn test_tracker_without_sink() {
        let tracker = ProgressTracker::new(3, None);
        tracker.advance(1);
        tracker.finish();
        assert_eq!(tracker.sent(), 3);
    }

    #[test]
    fn test_steps_fire_once_per_ten_percent() {
        let steps = PercentSteps::new();
        let at = |sent| UploadProgress {
            bytes_sent: sent,
            total_bytes: 100,
        };

        let fired: Vec<u64> = [0, 5, 10, 15, 19, 20, 55, 100, 100]
            .into_iter()
            .filter(|&sent| steps.crossed(at(sent)))
            .collect();

        assert_eq!(fired, vec![10, 20, 55, 100]);
    }

    #[test]
    fn test_steps_ignore_going_backwards() {
        let steps = PercentSteps::new();
        let at = |sent| UploadProgress {
            bytes_sent: sent,
            total_bytes: 10,
        };

        assert!(steps.crossed(at(5)));
        assert!(!steps.crossed(at(2)));
        assert!(!steps.crossed(at(5)));
        assert!(steps.crossed(at(6)));
    }

    #[test]
    fn test_logging_sink_through_tracker() {
        let tracker = ProgressTracker::new(1000, Some(logging_sink("medias")));
        for _ in 0..100 {
            tracker.advance(10);
        }
        tracker.finish();
        assert_eq!(tracker.sent(), 1000);
    }
}
