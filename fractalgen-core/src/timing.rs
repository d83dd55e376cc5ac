use std::time::{Duration, Instant};

/// Timing of the most recent dispatched frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTimingSample {
    pub captured_at: Instant,
    pub delta_from_previous: Duration,
}

/// Keeps one live sample plus a smoothed frame time for display.
#[derive(Debug, Clone, Default)]
pub struct FrameTimer {
    last: Option<FrameTimingSample>,
    average_secs: Option<f64>,
}

/// Weight of the newest sample in the running average.
const SMOOTHING: f64 = 0.1;

impl FrameTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp a frame, overwriting the previous sample.
    pub fn record(&mut self, now: Instant) -> FrameTimingSample {
        let delta = self
            .last
            .map(|prev| now.saturating_duration_since(prev.captured_at))
            .unwrap_or_default();
        if self.last.is_some() {
            let secs = delta.as_secs_f64();
            self.average_secs = Some(match self.average_secs {
                Some(avg) => avg + (secs - avg) * SMOOTHING,
                None => secs,
            });
        }
        let sample = FrameTimingSample {
            captured_at: now,
            delta_from_previous: delta,
        };
        self.last = Some(sample);
        sample
    }

    pub fn last(&self) -> Option<FrameTimingSample> {
        self.last
    }

    pub fn average_frame_time(&self) -> Option<Duration> {
        self.average_secs.map(Duration::from_secs_f64)
    }
}
