use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic clock used to stamp stimulus onsets and responses.
pub trait Timer: Clone + Send + Sync {
    type Timestamp: Copy + Clone + Send + Sync;
    fn now(&self) -> Self::Timestamp;
    fn elapsed(&self, ts: Self::Timestamp) -> Duration;
    fn record_frame(&mut self, d: Duration);
    fn frame_stats(&self) -> FrameTimingStats;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameTimingStats {
    pub samples: usize,
    pub average_frame_time_ns: f64,
    pub jitter_ns: f64,
    pub min_frame_time_ns: f64,
    pub max_frame_time_ns: f64,
}

impl FrameTimingStats {
    fn from_samples(frame_times: &[Duration]) -> Self {
        let times: Vec<f64> = frame_times.iter().map(|d| d.as_nanos() as f64).collect();
        if times.is_empty() {
            return Self::default();
        }
        let avg = times.iter().sum::<f64>() / times.len() as f64;
        let var = times.iter().map(|x| (x - avg).powi(2)).sum::<f64>() / times.len() as f64;
        let min = times.iter().copied().fold(f64::INFINITY, f64::min);
        let max = times.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Self {
            samples: times.len(),
            average_frame_time_ns: avg,
            jitter_ns: var.sqrt(),
            min_frame_time_ns: min,
            max_frame_time_ns: max,
        }
    }
}

/// Wall-clock timer backed by [`Instant`], keeping a bounded window of
/// frame durations.
#[derive(Debug, Clone)]
pub struct HighPrecisionTimer {
    pub start: Instant,
    pub frame_times: Vec<Duration>,
    pub max_samples: usize,
}

impl Timer for HighPrecisionTimer {
    type Timestamp = u64;
    fn now(&self) -> u64 {
        self.start.elapsed().as_nanos() as u64
    }
    fn elapsed(&self, ts: u64) -> Duration {
        Duration::from_nanos(self.now().saturating_sub(ts))
    }
    fn record_frame(&mut self, d: Duration) {
        if self.frame_times.len() >= self.max_samples {
            self.frame_times.remove(0);
        }
        self.frame_times.push(d);
    }
    fn frame_stats(&self) -> FrameTimingStats {
        FrameTimingStats::from_samples(&self.frame_times)
    }
}

impl HighPrecisionTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            frame_times: Vec::with_capacity(1000),
            max_samples: 1000,
        }
    }
}

impl Default for HighPrecisionTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// Timer whose clock only moves when told to. Clones share the clock.
#[derive(Debug, Clone, Default)]
pub struct ManualTimer {
    now_ns: Arc<AtomicU64>,
    frame_times: Vec<Duration>,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, d: Duration) {
        self.now_ns.fetch_add(d.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Timer for ManualTimer {
    type Timestamp = u64;
    fn now(&self) -> u64 {
        self.now_ns.load(Ordering::SeqCst)
    }
    fn elapsed(&self, ts: u64) -> Duration {
        Duration::from_nanos(self.now().saturating_sub(ts))
    }
    fn record_frame(&mut self, d: Duration) {
        self.frame_times.push(d);
    }
    fn frame_stats(&self) -> FrameTimingStats {
        FrameTimingStats::from_samples(&self.frame_times)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_over_recorded_frames() {
        let mut timer = ManualTimer::new();
        for ms in [16, 17, 18] {
            timer.record_frame(Duration::from_millis(ms));
        }
        let stats = timer.frame_stats();
        assert_eq!(stats.samples, 3);
        assert!((stats.average_frame_time_ns - 17_000_000.0).abs() < 1.0);
        assert_eq!(stats.min_frame_time_ns, 16_000_000.0);
        assert_eq!(stats.max_frame_time_ns, 18_000_000.0);
        assert!(stats.jitter_ns > 0.0);
    }

    #[test]
    fn empty_stats_are_zero() {
        assert_eq!(HighPrecisionTimer::new().frame_stats(), FrameTimingStats::default());
    }

    #[test]
    fn frame_window_is_bounded() {
        let mut timer = HighPrecisionTimer::new();
        timer.max_samples = 4;
        for i in 0..10 {
            timer.record_frame(Duration::from_micros(i));
        }
        assert_eq!(timer.frame_times.len(), 4);
        assert_eq!(timer.frame_times[0], Duration::from_micros(6));
    }

    #[test]
    fn manual_clock_is_shared_by_clones() {
        let timer = ManualTimer::new();
        let clone = timer.clone();
        let start = clone.now();
        timer.advance(Duration::from_millis(250));
        assert_eq!(clone.elapsed(start), Duration::from_millis(250));
    }
}
