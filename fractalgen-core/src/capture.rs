//! Unattended deep-zoom capture.
//!
//! A session steps the magnification geometrically from a start value
//! towards a stop value, rendering one frame per tick and saving it on the
//! following tick, once its dispatch has been barrier-confirmed.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::error::{ConfigError, ResourceError};
use crate::frame::SaveRequest;
use crate::viewport::{ViewportState, MAX_ITERATIONS, MIN_ITERATIONS};

/// Rounding allowance for the step count, in units of `f64::EPSILON`
/// relative to the magnitudes involved. Exact power ratios such as
/// 125 = 5³ must not gain a frame through rounding in `ln`, while a range
/// that ends even slightly above a power still gets the extra frame.
const STEP_SNAP_ULPS: f64 = 8.0;

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// User-editable capture range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CaptureSettings {
    #[serde(default = "default_magnitude")]
    pub min_magnitude: f64,
    #[serde(default = "default_magnitude")]
    pub max_magnitude: f64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f32,
}

fn default_magnitude() -> f64 {
    1.0
}
fn default_multiplier() -> f32 {
    2.0
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            min_magnitude: default_magnitude(),
            max_magnitude: default_magnitude(),
            multiplier: default_multiplier(),
        }
    }
}

impl CaptureSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let (min, max) = (self.min_magnitude, self.max_magnitude);
        if !(min > 0.0) || !min.is_finite() || !max.is_finite() || min > max {
            return Err(ConfigError::InvalidRange { min, max });
        }
        if !(self.multiplier > 1.0) || !self.multiplier.is_finite() {
            return Err(ConfigError::InvalidMultiplier(self.multiplier));
        }
        Ok(())
    }

    /// Number of frames a session with these settings renders:
    /// `ceil(ln(max / min) / ln(multiplier))`.
    pub fn total_frames(&self) -> Result<u32, ConfigError> {
        self.validate()?;
        let (ln_min, ln_max) = (self.min_magnitude.ln(), self.max_magnitude.ln());
        let ln_mult = (self.multiplier as f64).ln();
        let steps = (ln_max - ln_min) / ln_mult;

        let tolerance =
            STEP_SNAP_ULPS * f64::EPSILON * ((ln_min.abs() + ln_max.abs()) / ln_mult + steps);
        let nearest = steps.round();
        let steps = if (steps - nearest).abs() <= tolerance {
            nearest
        } else {
            steps
        };

        let frames = steps.ceil().max(0.0);
        if frames > u32::MAX as f64 {
            return Err(ConfigError::TooManyFrames(frames));
        }
        Ok(frames as u32)
    }
}

/// Playback length of `frames` frames at `fps`.
pub fn video_duration(frames: u32, fps: f64) -> Duration {
    if fps > 0.0 {
        Duration::from_secs_f64(frames as f64 / fps)
    } else {
        Duration::ZERO
    }
}

/// Minutes since the Unix epoch. Two sessions started within the same
/// minute share a directory.
pub fn session_id_at(time: SystemTime) -> String {
    let minutes = time
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
        / 60;
    minutes.to_string()
}

// ---------------------------------------------------------------------------
// Iteration growth
// ---------------------------------------------------------------------------

/// How the iteration count evolves from frame to frame during a capture.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IterationGrowth {
    /// Keep the count the session started with.
    Fixed,
    /// Grow by the magnification multiplier every frame.
    #[default]
    MatchMultiplier,
    /// Grow by a fixed factor every frame.
    Geometric { factor: f64 },
}

impl IterationGrowth {
    /// Iteration count for frame `frame_index` (0 = first frame, which
    /// always uses `base`).
    pub fn iterations_for(&self, base: u32, frame_index: u32, multiplier: f32) -> u32 {
        let factor = match *self {
            Self::Fixed => return base,
            Self::MatchMultiplier => multiplier as f64,
            Self::Geometric { factor } => factor,
        };
        let value = base as f64 * factor.powf(frame_index as f64);
        if value.is_nan() {
            return base;
        }
        value
            .round()
            .clamp(MIN_ITERATIONS as f64, MAX_ITERATIONS as f64) as u32
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Fixed => "Fixed",
            Self::MatchMultiplier => "Match multiplier",
            Self::Geometric { .. } => "Geometric",
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Running,
    /// All frames dispatched; the last one still has to be saved.
    Completing,
}

impl CaptureState {
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Running => "Running",
            Self::Completing => "Completing",
        }
    }
}

/// View settings a session overrides and puts back when it ends.
#[derive(Debug, Clone, Copy, PartialEq)]
struct RestorePoint {
    double_precision: bool,
    iterations: u32,
}

/// State of one running capture.
#[derive(Debug, Clone)]
pub struct CaptureSession {
    pub settings: CaptureSettings,
    pub current_magnitude: f64,
    pub total_frames: u32,
    pub current_frame_index: u32,
    pub session_id: String,
    pub started_at: Instant,
    pub frames_saved: u32,
    pub frames_failed: u32,
    pub last_frame_time: Option<Duration>,
    base_iterations: u32,
    last_step_at: Option<Instant>,
    restore: RestorePoint,
}

/// Save owed for a frame dispatched on an earlier tick.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSave {
    pub request: SaveRequest,
    /// Serial of the dispatch that produced the frame, once confirmed.
    pub dispatch_serial: Option<u64>,
}

/// One configured frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureStep {
    pub frame_index: u32,
    pub magnitude: f64,
    pub iterations: u32,
}

/// Outcome of a finished or cancelled session.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureSummary {
    pub session_id: String,
    pub frames_dispatched: u32,
    pub frames_saved: u32,
    pub frames_failed: u32,
    pub elapsed: Duration,
    pub cancelled: bool,
}

/// What a tick did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureTick {
    /// Frame configured this tick; a dispatch must follow.
    pub step: Option<CaptureStep>,
    /// Set on the tick the session returned to idle.
    pub finished: Option<CaptureSummary>,
}

/// Snapshot for status displays.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureProgress {
    pub state: CaptureState,
    pub session_id: String,
    pub frame_index: u32,
    pub total_frames: u32,
    pub current_magnitude: f64,
    pub elapsed: Duration,
    pub estimated_remaining: Option<Duration>,
    pub last_frame_time: Option<Duration>,
    pub frames_saved: u32,
    pub frames_failed: u32,
}

// ---------------------------------------------------------------------------
// Sequencer
// ---------------------------------------------------------------------------

/// Drives capture sessions: `Idle -> Running -> Completing -> Idle`.
#[derive(Debug, Clone)]
pub struct CaptureSequencer {
    state: CaptureState,
    settings: CaptureSettings,
    planned_frames: Result<u32, ConfigError>,
    growth: IterationGrowth,
    session: Option<CaptureSession>,
    pending: Option<PendingSave>,
    last_summary: Option<CaptureSummary>,
}

impl Default for CaptureSequencer {
    fn default() -> Self {
        Self::new(CaptureSettings::default(), IterationGrowth::default())
    }
}

impl CaptureSequencer {
    pub fn new(settings: CaptureSettings, growth: IterationGrowth) -> Self {
        Self {
            state: CaptureState::Idle,
            planned_frames: settings.total_frames(),
            settings,
            growth,
            session: None,
            pending: None,
            last_summary: None,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// `true` while a session owns the viewport (Running or Completing).
    pub fn is_running(&self) -> bool {
        self.state != CaptureState::Idle
    }

    pub fn session(&self) -> Option<&CaptureSession> {
        self.session.as_ref()
    }

    pub fn pending_save(&self) -> Option<&PendingSave> {
        self.pending.as_ref()
    }

    pub fn last_summary(&self) -> Option<&CaptureSummary> {
        self.last_summary.as_ref()
    }

    pub fn settings(&self) -> CaptureSettings {
        self.settings
    }

    /// Update the range for the next session. The frame plan is recomputed
    /// immediately; a running session keeps the settings it started with.
    pub fn set_settings(&mut self, settings: CaptureSettings) {
        self.settings = settings;
        self.planned_frames = settings.total_frames();
    }

    /// Frame count for the current settings, or why they are invalid.
    pub fn planned_frames(&self) -> Result<u32, ConfigError> {
        self.planned_frames.clone()
    }

    pub fn iteration_growth(&self) -> IterationGrowth {
        self.growth
    }

    pub fn set_iteration_growth(&mut self, growth: IterationGrowth) {
        self.growth = growth;
    }

    /// Start a session with the stored settings.
    pub fn start(
        &mut self,
        base_iterations: u32,
        viewport: &mut ViewportState,
    ) -> Result<(), ConfigError> {
        self.start_at(base_iterations, viewport, SystemTime::now(), Instant::now())
    }

    /// Start a session with explicit clocks.
    pub fn start_at(
        &mut self,
        base_iterations: u32,
        viewport: &mut ViewportState,
        wall_clock: SystemTime,
        now: Instant,
    ) -> Result<(), ConfigError> {
        if self.is_running() {
            return Err(ConfigError::CaptureAlreadyRunning);
        }
        let settings = self.settings;
        let total_frames = settings.total_frames()?;

        let restore = RestorePoint {
            double_precision: viewport.uses_double_precision(),
            iterations: viewport.iterations(),
        };
        viewport.set_double_precision(true);

        let session_id = session_id_at(wall_clock);
        info!(
            session_id = %session_id,
            total_frames,
            min = settings.min_magnitude,
            max = settings.max_magnitude,
            multiplier = settings.multiplier,
            "Starting capture"
        );
        info!(
            "Capture duration: {:.2}s at 30 fps, {:.2}s at 60 fps",
            video_duration(total_frames, 30.0).as_secs_f64(),
            video_duration(total_frames, 60.0).as_secs_f64()
        );

        self.session = Some(CaptureSession {
            settings,
            current_magnitude: settings.min_magnitude,
            total_frames,
            current_frame_index: 0,
            session_id,
            started_at: now,
            frames_saved: 0,
            frames_failed: 0,
            last_frame_time: None,
            base_iterations: base_iterations.clamp(MIN_ITERATIONS, MAX_ITERATIONS),
            last_step_at: None,
            restore,
        });
        self.pending = None;
        self.state = if total_frames == 0 {
            CaptureState::Completing
        } else {
            CaptureState::Running
        };
        Ok(())
    }

    /// Advance one render-loop iteration.
    ///
    /// Any save owed from the previous tick is handed to `save` first, while
    /// the output image still holds that frame. Then, while frames remain,
    /// the viewport is set up for the next one and a new save is queued.
    pub fn tick<F>(&mut self, viewport: &mut ViewportState, now: Instant, mut save: F) -> CaptureTick
    where
        F: FnMut(&PendingSave) -> Result<(), ResourceError>,
    {
        match self.state {
            CaptureState::Idle => CaptureTick::default(),
            CaptureState::Running => {
                self.flush_pending(&mut save);
                let step = self.advance(viewport, now);
                CaptureTick {
                    step,
                    finished: None,
                }
            }
            CaptureState::Completing => {
                self.flush_pending(&mut save);
                let summary = self.finish(viewport, now, false);
                CaptureTick {
                    step: None,
                    finished: summary,
                }
            }
        }
    }

    /// Attach the serial of the dispatch that rendered the queued frame.
    pub fn confirm_dispatch(&mut self, serial: u64) {
        if let Some(pending) = self.pending.as_mut() {
            if pending.dispatch_serial.is_none() {
                pending.dispatch_serial = Some(serial);
            }
        }
    }

    /// Cancel between ticks. The frame still waiting to be saved is
    /// discarded.
    pub fn stop(&mut self, viewport: &mut ViewportState) -> Option<CaptureSummary> {
        if !self.is_running() {
            return None;
        }
        if let Some(pending) = self.pending.take() {
            debug!(
                frame = pending.request.frame_index,
                "Discarding unsaved frame on cancel"
            );
        }
        self.finish(viewport, Instant::now(), true)
    }

    pub fn progress(&self, now: Instant) -> Option<CaptureProgress> {
        let s = self.session.as_ref()?;
        let elapsed = now.saturating_duration_since(s.started_at);
        let estimated_remaining = (s.current_frame_index > 0).then(|| {
            let per_frame = elapsed.as_secs_f64() / s.current_frame_index as f64;
            let left = s.total_frames.saturating_sub(s.current_frame_index);
            Duration::from_secs_f64(per_frame * left as f64)
        });
        Some(CaptureProgress {
            state: self.state,
            session_id: s.session_id.clone(),
            frame_index: s.current_frame_index,
            total_frames: s.total_frames,
            current_magnitude: s.current_magnitude,
            elapsed,
            estimated_remaining,
            last_frame_time: s.last_frame_time,
            frames_saved: s.frames_saved,
            frames_failed: s.frames_failed,
        })
    }

    fn flush_pending<F>(&mut self, save: &mut F)
    where
        F: FnMut(&PendingSave) -> Result<(), ResourceError>,
    {
        let Some(pending) = self.pending.take() else {
            return;
        };
        let result = save(&pending);
        let Some(session) = self.session.as_mut() else {
            return;
        };
        match result {
            Ok(()) => {
                session.frames_saved += 1;
                debug!(frame = pending.request.frame_index, "Saved capture frame");
            }
            Err(e) => {
                session.frames_failed += 1;
                error!(
                    frame = pending.request.frame_index,
                    "Skipping capture frame: {e}"
                );
            }
        }
    }

    fn advance(&mut self, viewport: &mut ViewportState, now: Instant) -> Option<CaptureStep> {
        let growth = self.growth;
        let session = self.session.as_mut()?;

        if session.current_frame_index >= session.total_frames {
            self.state = CaptureState::Completing;
            return None;
        }

        if let Some(prev) = session.last_step_at {
            session.last_frame_time = Some(now.saturating_duration_since(prev));
        }
        session.last_step_at = Some(now);

        let frame_index = session.current_frame_index;
        let magnitude = viewport.set_magnitude_clamped(session.current_magnitude);
        let iterations = growth.iterations_for(
            session.base_iterations,
            frame_index,
            session.settings.multiplier,
        );
        viewport.set_iterations(iterations as i64);
        viewport.set_double_precision(true);

        self.pending = Some(PendingSave {
            request: SaveRequest {
                session_id: session.session_id.clone(),
                frame_index,
                magnitude,
            },
            dispatch_serial: None,
        });
        debug!(
            frame = frame_index,
            total = session.total_frames,
            magnitude,
            iterations,
            "Capture step"
        );

        session.current_frame_index += 1;
        session.current_magnitude *= session.settings.multiplier as f64;
        if session.current_frame_index >= session.total_frames {
            self.state = CaptureState::Completing;
        }

        Some(CaptureStep {
            frame_index,
            magnitude,
            iterations,
        })
    }

    fn finish(
        &mut self,
        viewport: &mut ViewportState,
        now: Instant,
        cancelled: bool,
    ) -> Option<CaptureSummary> {
        self.state = CaptureState::Idle;
        self.pending = None;
        let session = self.session.take()?;

        viewport.set_double_precision(session.restore.double_precision);
        viewport.set_iterations(session.restore.iterations as i64);
        let frames_dispatched = session.current_frame_index;

        let summary = CaptureSummary {
            session_id: session.session_id,
            frames_dispatched,
            frames_saved: session.frames_saved,
            frames_failed: session.frames_failed,
            elapsed: now.saturating_duration_since(session.started_at),
            cancelled,
        };
        if cancelled {
            info!(
                session_id = %summary.session_id,
                frames_saved = summary.frames_saved,
                "Capture cancelled"
            );
        } else {
            info!(
                session_id = %summary.session_id,
                frames_saved = summary.frames_saved,
                frames_failed = summary.frames_failed,
                elapsed_s = summary.elapsed.as_secs_f64(),
                "Capture complete"
            );
        }
        self.last_summary = Some(summary.clone());
        Some(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(min: f64, max: f64, multiplier: f32) -> CaptureSettings {
        CaptureSettings {
            min_magnitude: min,
            max_magnitude: max,
            multiplier,
        }
    }

    fn sequencer(min: f64, max: f64, multiplier: f32) -> CaptureSequencer {
        CaptureSequencer::new(settings(min, max, multiplier), IterationGrowth::Fixed)
    }

    fn ok_save(_: &PendingSave) -> Result<(), ResourceError> {
        Ok(())
    }

    #[test]
    fn total_frames_formula() {
        assert_eq!(settings(1.0, 8.0, 2.0).total_frames(), Ok(3));
        assert_eq!(settings(1.0, 10.0, 2.0).total_frames(), Ok(4));
        assert_eq!(settings(1.0, 1.0, 2.0).total_frames(), Ok(0));
        assert_eq!(settings(1.0, 125.0, 5.0).total_frames(), Ok(3));
        assert_eq!(settings(1.0, 1000.0, 10.0).total_frames(), Ok(3));
        assert_eq!(settings(1.0, 1e12, 1.5).total_frames(), Ok(69));
    }

    #[test]
    fn total_frames_over_the_full_f64_range() {
        // max / min overflows f64 here; the count must still be exact.
        assert_eq!(settings(1e-20, 1e300, 2.0).total_frames(), Ok(1064));
        assert_eq!(settings(f64::MIN_POSITIVE, f64::MAX, 2.0).total_frames(), Ok(2046));
    }

    #[test]
    fn total_frames_beyond_u32_is_rejected() {
        let err = settings(1.0, 1e300, 1.000_000_1).total_frames().unwrap_err();
        assert!(matches!(err, ConfigError::TooManyFrames(n) if n > u32::MAX as f64));

        let mut vp = ViewportState::default();
        let mut seq = sequencer(1.0, 1e300, 1.000_000_1);
        assert!(seq.start(20, &mut vp).is_err());
        assert_eq!(seq.state(), CaptureState::Idle);
    }

    #[test]
    fn range_just_above_a_power_gets_its_last_frame() {
        assert_eq!(settings(1.0, 8.0, 2.0).total_frames(), Ok(3));
        assert_eq!(settings(1.0, 8.000_000_001, 2.0).total_frames(), Ok(4));
        assert_eq!(settings(1.0, 125.000_001, 5.0).total_frames(), Ok(4));
    }

    #[test]
    fn wide_session_stays_below_stop_and_in_range() {
        let mut vp = ViewportState::default();
        let mut seq = sequencer(1e-20, 1e300, 2.0);
        seq.start(20, &mut vp).unwrap();

        let now = Instant::now();
        let mut last = 0.0;
        for serial in 1..=1064u64 {
            let step = seq.tick(&mut vp, now, ok_save).step.expect("frame expected");
            assert!(step.magnitude.is_finite() && step.magnitude < 1e300);
            assert!(step.magnitude > last);
            assert!(vp.scale().is_finite() && vp.scale() > 0.0);
            last = step.magnitude;
            seq.confirm_dispatch(serial);
        }
        assert_eq!(seq.state(), CaptureState::Completing);
        assert!(seq.tick(&mut vp, now, ok_save).finished.is_some());
    }

    #[test]
    fn invalid_settings_are_rejected() {
        assert!(matches!(
            settings(5.0, 1.0, 2.0).validate(),
            Err(ConfigError::InvalidRange { .. })
        ));
        assert!(matches!(
            settings(0.0, 1.0, 2.0).validate(),
            Err(ConfigError::InvalidRange { .. })
        ));
        assert!(matches!(
            settings(1.0, f64::INFINITY, 2.0).validate(),
            Err(ConfigError::InvalidRange { .. })
        ));
        assert_eq!(
            settings(1.0, 2.0, 1.0).validate(),
            Err(ConfigError::InvalidMultiplier(1.0))
        );
        assert!(settings(1.0, 2.0, f32::NAN).validate().is_err());
    }

    #[test]
    fn planned_frames_follow_setting_changes() {
        let mut seq = sequencer(1.0, 8.0, 2.0);
        assert_eq!(seq.planned_frames(), Ok(3));
        seq.set_settings(settings(1.0, 16.0, 2.0));
        assert_eq!(seq.planned_frames(), Ok(4));
        seq.set_settings(settings(1.0, 16.0, 4.0));
        assert_eq!(seq.planned_frames(), Ok(2));
        seq.set_settings(settings(16.0, 1.0, 4.0));
        assert!(seq.planned_frames().is_err());
    }

    #[test]
    fn start_forces_double_precision_and_resets_index() {
        let mut vp = ViewportState::default();
        let mut seq = sequencer(1.0, 8.0, 2.0);
        seq.start(20, &mut vp).unwrap();

        assert_eq!(seq.state(), CaptureState::Running);
        assert!(seq.is_running());
        assert!(vp.uses_double_precision());
        let s = seq.session().unwrap();
        assert_eq!(s.current_magnitude, 1.0);
        assert_eq!(s.current_frame_index, 0);
        assert_eq!(s.total_frames, 3);
    }

    #[test]
    fn start_with_inverted_range_stays_idle() {
        let mut vp = ViewportState::default();
        let mut seq = sequencer(5.0, 1.0, 2.0);
        let err = seq.start(20, &mut vp).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRange { .. }));
        assert_eq!(seq.state(), CaptureState::Idle);
        assert!(seq.session().is_none());
        assert!(!vp.uses_double_precision());
    }

    #[test]
    fn second_start_is_rejected() {
        let mut vp = ViewportState::default();
        let mut seq = sequencer(1.0, 8.0, 2.0);
        seq.start(20, &mut vp).unwrap();
        assert_eq!(
            seq.start(20, &mut vp),
            Err(ConfigError::CaptureAlreadyRunning)
        );
    }

    #[test]
    fn visits_magnitudes_below_stop() {
        let mut vp = ViewportState::default();
        let mut seq = sequencer(1.0, 8.0, 2.0);
        seq.start(20, &mut vp).unwrap();

        let now = Instant::now();
        let mut visited = Vec::new();
        let mut scales = Vec::new();
        for _ in 0..3 {
            let tick = seq.tick(&mut vp, now, ok_save);
            let step = tick.step.expect("frame expected");
            visited.push(step.magnitude);
            scales.push(vp.scale());
            seq.confirm_dispatch(visited.len() as u64);
        }
        assert_eq!(visited, vec![1.0, 2.0, 4.0]);
        assert_eq!(scales, vec![1.0, 0.5, 0.25]);
        assert_eq!(seq.state(), CaptureState::Completing);

        let tick = seq.tick(&mut vp, now, ok_save);
        assert!(tick.step.is_none());
        let summary = tick.finished.expect("session should finish");
        assert_eq!(summary.frames_dispatched, 3);
        assert_eq!(summary.frames_saved, 3);
        assert!(!summary.cancelled);
        assert_eq!(seq.state(), CaptureState::Idle);
    }

    #[test]
    fn saves_lag_dispatch_by_one_tick() {
        let mut vp = ViewportState::default();
        let mut seq = sequencer(1.0, 8.0, 2.0);
        seq.start(20, &mut vp).unwrap();
        let now = Instant::now();

        let saved: std::cell::RefCell<Vec<(u32, Option<u64>)>> =
            std::cell::RefCell::new(Vec::new());
        let mut record = |p: &PendingSave| -> Result<(), ResourceError> {
            saved.borrow_mut().push((p.request.frame_index, p.dispatch_serial));
            Ok(())
        };

        seq.tick(&mut vp, now, &mut record);
        seq.confirm_dispatch(10);
        assert!(saved.borrow().is_empty(), "nothing to save before the first dispatch");

        seq.tick(&mut vp, now, &mut record);
        seq.confirm_dispatch(11);
        seq.tick(&mut vp, now, &mut record);
        seq.confirm_dispatch(12);
        seq.tick(&mut vp, now, &mut record);

        assert_eq!(*saved.borrow(), vec![(0, Some(10)), (1, Some(11)), (2, Some(12))]);
    }

    #[test]
    fn failed_save_does_not_abort_session() {
        let mut vp = ViewportState::default();
        let mut seq = sequencer(1.0, 8.0, 2.0);
        seq.start(20, &mut vp).unwrap();
        let now = Instant::now();

        let mut fail_first = |p: &PendingSave| -> Result<(), ResourceError> {
            if p.request.frame_index == 0 {
                Err(ResourceError::SinkUnavailable {
                    reason: "disk full".into(),
                })
            } else {
                Ok(())
            }
        };
        let mut finished = None;
        for _ in 0..4 {
            let tick = seq.tick(&mut vp, now, &mut fail_first);
            seq.confirm_dispatch(1);
            finished = tick.finished.or(finished);
        }
        let summary = finished.unwrap();
        assert_eq!(summary.frames_failed, 1);
        assert_eq!(summary.frames_saved, 2);
    }

    #[test]
    fn stop_restores_precision_and_index() {
        let mut vp = ViewportState::with_iterations(64);
        vp.set_double_precision(false);
        let mut seq = sequencer(1.0, 1024.0, 2.0);
        seq.start(64, &mut vp).unwrap();
        let now = Instant::now();
        seq.tick(&mut vp, now, ok_save);
        seq.tick(&mut vp, now, ok_save);
        assert_eq!(seq.session().unwrap().current_frame_index, 2);

        let summary = seq.stop(&mut vp).unwrap();
        assert!(summary.cancelled);
        assert_eq!(summary.frames_dispatched, 2);
        assert_eq!(seq.state(), CaptureState::Idle);
        assert!(seq.session().is_none());
        assert!(seq.pending_save().is_none());
        assert!(!vp.uses_double_precision());
        assert_eq!(vp.iterations(), 64);

        // A fresh session starts back at frame 0.
        seq.start(64, &mut vp).unwrap();
        assert_eq!(seq.session().unwrap().current_frame_index, 0);
    }

    #[test]
    fn stop_keeps_user_double_precision() {
        let mut vp = ViewportState::default();
        vp.set_double_precision(true);
        let mut seq = sequencer(1.0, 8.0, 2.0);
        seq.start(20, &mut vp).unwrap();
        seq.stop(&mut vp);
        assert!(vp.uses_double_precision());
    }

    #[test]
    fn stop_when_idle_is_a_no_op() {
        let mut vp = ViewportState::default();
        let mut seq = CaptureSequencer::default();
        assert!(seq.stop(&mut vp).is_none());
    }

    #[test]
    fn empty_range_completes_without_frames() {
        let mut vp = ViewportState::default();
        let mut seq = sequencer(3.0, 3.0, 2.0);
        seq.start(20, &mut vp).unwrap();
        assert_eq!(seq.state(), CaptureState::Completing);
        let tick = seq.tick(&mut vp, Instant::now(), ok_save);
        assert!(tick.step.is_none());
        assert_eq!(tick.finished.unwrap().frames_dispatched, 0);
        assert_eq!(seq.state(), CaptureState::Idle);
    }

    #[test]
    fn iteration_growth_policies() {
        assert_eq!(IterationGrowth::Fixed.iterations_for(100, 5, 2.0), 100);
        assert_eq!(IterationGrowth::MatchMultiplier.iterations_for(100, 0, 2.0), 100);
        assert_eq!(IterationGrowth::MatchMultiplier.iterations_for(100, 3, 2.0), 800);
        assert_eq!(
            IterationGrowth::Geometric { factor: 1.5 }.iterations_for(100, 2, 2.0),
            225
        );
        assert_eq!(
            IterationGrowth::MatchMultiplier.iterations_for(100, 200, 2.0),
            MAX_ITERATIONS
        );
    }

    #[test]
    fn growth_is_applied_and_undone() {
        let mut vp = ViewportState::with_iterations(50);
        let mut seq =
            CaptureSequencer::new(settings(1.0, 8.0, 2.0), IterationGrowth::MatchMultiplier);
        seq.start(50, &mut vp).unwrap();
        let now = Instant::now();
        let counts: Vec<u32> = (0..3)
            .map(|_| seq.tick(&mut vp, now, ok_save).step.unwrap().iterations)
            .collect();
        assert_eq!(counts, vec![50, 100, 200]);
        assert_eq!(vp.iterations(), 200);
        seq.tick(&mut vp, now, ok_save);
        assert_eq!(vp.iterations(), 50);
    }

    #[test]
    fn progress_estimates_remaining_time() {
        let mut vp = ViewportState::default();
        let mut seq = sequencer(1.0, 16.0, 2.0);
        let start = Instant::now();
        seq.start_at(20, &mut vp, SystemTime::now(), start).unwrap();
        seq.tick(&mut vp, start, ok_save);
        seq.tick(&mut vp, start + Duration::from_secs(1), ok_save);

        let p = seq.progress(start + Duration::from_secs(2)).unwrap();
        assert_eq!(p.frame_index, 2);
        assert_eq!(p.total_frames, 4);
        assert_eq!(p.elapsed, Duration::from_secs(2));
        assert_eq!(p.estimated_remaining, Some(Duration::from_secs(2)));
        assert_eq!(p.last_frame_time, Some(Duration::from_secs(1)));
    }

    #[test]
    fn session_id_has_minute_resolution() {
        let t = UNIX_EPOCH + Duration::from_secs(60 * 1_000 + 59);
        assert_eq!(session_id_at(t), "1000");
        let t2 = UNIX_EPOCH + Duration::from_secs(60 * 1_000);
        assert_eq!(session_id_at(t2), session_id_at(t));
    }

    #[test]
    fn video_duration_at_common_rates() {
        assert_eq!(video_duration(60, 30.0), Duration::from_secs(2));
        assert_eq!(video_duration(60, 60.0), Duration::from_secs(1));
        assert_eq!(video_duration(60, 0.0), Duration::ZERO);
    }

    #[test]
    fn settings_deserialize_with_defaults() {
        let s: CaptureSettings = serde_json::from_str(r#"{"max_magnitude": 1e6}"#).unwrap();
        assert_eq!(s.min_magnitude, 1.0);
        assert_eq!(s.max_magnitude, 1e6);
        assert_eq!(s.multiplier, 2.0);

        let g: IterationGrowth = serde_json::from_str(r#"{"kind":"geometric","factor":1.1}"#).unwrap();
        assert_eq!(g, IterationGrowth::Geometric { factor: 1.1 });
    }
}
