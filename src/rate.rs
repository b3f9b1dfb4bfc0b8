use std::time::{Duration, Instant};

/// Per-session sample counters with a fixed reporting window.
///
/// All the state the multicam diagnostic keeps per device: a pose counter,
/// an auxiliary-event counter, and the start of the current window. Counters
/// reset every time a window elapses.
#[derive(Debug)]
pub struct RateMeter {
    window: Duration,
    window_start: Instant,
    poses: u64,
    aux: u64,
}

/// Counter snapshot for one elapsed window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateReport {
    pub poses: u64,
    pub aux: u64,
    pub elapsed: Duration,
}

impl RateReport {
    pub fn pose_hz(&self) -> f64 {
        self.poses as f64 / self.elapsed.as_secs_f64()
    }
}

impl RateMeter {
    pub fn new(window: Duration) -> Self {
        Self::starting_at(window, Instant::now())
    }

    pub fn starting_at(window: Duration, now: Instant) -> Self {
        RateMeter {
            window,
            window_start: now,
            poses: 0,
            aux: 0,
        }
    }

    pub fn record_pose(&mut self) {
        self.poses += 1;
    }

    pub fn record_aux(&mut self) {
        self.aux += 1;
    }

    /// Report and reset the counters once per window, `None` in between.
    pub fn sample(&mut self) -> Option<RateReport> {
        self.sample_at(Instant::now())
    }

    pub fn sample_at(&mut self, now: Instant) -> Option<RateReport> {
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < self.window {
            return None;
        }

        let report = RateReport {
            poses: self.poses,
            aux: self.aux,
            elapsed,
        };
        self.poses = 0;
        self.aux = 0;
        self.window_start = now;
        Some(report)
    }
}
