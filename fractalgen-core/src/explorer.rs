//! The application context: one owner for the view, input, capture and
//! dispatch state, driven one frame at a time by the front end.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::capture::{
    CaptureProgress, CaptureSequencer, CaptureSettings, CaptureStep, CaptureSummary,
    IterationGrowth, PendingSave,
};
use crate::dispatch::{ComputeKernel, DispatchHandle, FrameDispatcher, KernelLoader};
use crate::error::{ConfigError, ResourceError};
use crate::frame::FrameSink;
use crate::input::{InputEvent, InputTranslator, DEFAULT_ZOOM_SENSITIVITY};
use crate::precision::{select_precision, single_precision_exhausted, PrecisionMode};
use crate::viewport::{
    ColorMode, FractalVariant, GotoTarget, Resolution, Rgb, ViewportState, DEFAULT_ITERATIONS,
};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Startup configuration for an [`Explorer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplorerConfig {
    #[serde(default)]
    pub resolution: Resolution,
    #[serde(default = "default_zoom_sensitivity")]
    pub zoom_sensitivity: f64,
    #[serde(default = "default_iterations")]
    pub default_iterations: u32,
    #[serde(default)]
    pub iteration_growth: IterationGrowth,
    #[serde(default)]
    pub capture: CaptureSettings,
}

fn default_zoom_sensitivity() -> f64 {
    DEFAULT_ZOOM_SENSITIVITY
}
fn default_iterations() -> u32 {
    DEFAULT_ITERATIONS
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            resolution: Resolution::default(),
            zoom_sensitivity: default_zoom_sensitivity(),
            default_iterations: default_iterations(),
            iteration_growth: IterationGrowth::default(),
            capture: CaptureSettings::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Frame report
// ---------------------------------------------------------------------------

/// What happened during one call to [`Explorer::run_frame`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    /// Present when the kernel ran this frame.
    pub dispatch: Option<DispatchHandle>,
    pub capture_step: Option<CaptureStep>,
    pub capture_finished: Option<CaptureSummary>,
}

impl FrameReport {
    pub fn dispatched(&self) -> bool {
        self.dispatch.is_some()
    }
}

// ---------------------------------------------------------------------------
// UI capability interface
// ---------------------------------------------------------------------------

/// Everything a front end may read or change.
///
/// View mutators are ignored while a capture session owns the viewport.
pub trait ExplorerControls {
    fn viewport(&self) -> &ViewportState;
    fn resolution(&self) -> Resolution;

    fn set_iterations(&mut self, value: i64);
    fn adjust_iterations(&mut self, delta: i64);
    fn set_double_precision(&mut self, enabled: bool);
    fn set_fractal_variant(&mut self, variant: FractalVariant);
    fn set_color_mode(&mut self, mode: ColorMode);
    fn set_single_color(&mut self, color: Rgb);
    fn go_to(&mut self, target: &GotoTarget) -> Result<(), ConfigError>;
    fn current_target(&self) -> GotoTarget;

    fn single_mode(&self) -> bool;
    fn set_single_mode(&mut self, single: bool);
    /// "Run!": one dispatch on the next frame.
    fn request_dispatch(&mut self);

    fn zoom_sensitivity(&self) -> f64;
    fn set_zoom_sensitivity(&mut self, k: f64);

    fn capture_settings(&self) -> CaptureSettings;
    fn set_capture_settings(&mut self, settings: CaptureSettings);
    fn planned_frames(&self) -> Result<u32, ConfigError>;
    fn iteration_growth(&self) -> IterationGrowth;
    fn set_iteration_growth(&mut self, growth: IterationGrowth);
    fn start_capture(&mut self) -> Result<(), ConfigError>;
    fn stop_capture(&mut self) -> Option<CaptureSummary>;
    fn is_capturing(&self) -> bool;
    fn capture_progress(&self) -> Option<CaptureProgress>;
    fn last_capture(&self) -> Option<&CaptureSummary>;

    fn active_precision(&self) -> PrecisionMode;
    /// `true` when the view is too deep for single precision.
    fn precision_hint(&self) -> bool;
    fn average_frame_time(&self) -> Option<Duration>;
}

// ---------------------------------------------------------------------------
// Explorer
// ---------------------------------------------------------------------------

pub struct Explorer<K> {
    viewport: ViewportState,
    input: InputTranslator,
    capture: CaptureSequencer,
    dispatcher: FrameDispatcher<K>,
    user_single_mode: bool,
}

impl<K: ComputeKernel> Explorer<K> {
    pub fn new(kernel: K, config: &ExplorerConfig) -> Self {
        info!(
            width = kernel.resolution().width,
            height = kernel.resolution().height,
            iterations = config.default_iterations,
            "Explorer ready"
        );
        Self {
            viewport: ViewportState::with_iterations(config.default_iterations),
            input: InputTranslator::new(config.zoom_sensitivity),
            capture: CaptureSequencer::new(config.capture, config.iteration_growth),
            dispatcher: FrameDispatcher::new(kernel),
            user_single_mode: false,
        }
    }

    /// Build the kernel through `loader` and wrap it. A loader failure
    /// means there is nothing to render with; the caller should exit.
    pub fn load<L>(loader: &L, config: &ExplorerConfig) -> Result<Self, ResourceError>
    where
        L: KernelLoader<Kernel = K>,
    {
        let kernel = loader.load(config.resolution)?;
        Ok(Self::new(kernel, config))
    }

    pub fn dispatcher(&self) -> &FrameDispatcher<K> {
        &self.dispatcher
    }

    pub fn input(&self) -> &InputTranslator {
        &self.input
    }

    pub fn capture(&self) -> &CaptureSequencer {
        &self.capture
    }

    /// Replace the view wholesale, e.g. when restoring the last session.
    /// Ignored while capturing.
    pub fn restore_viewport(&mut self, viewport: ViewportState) {
        if self.capture.is_running() {
            debug!("Ignoring viewport restore during capture");
            return;
        }
        self.viewport = viewport;
    }

    /// Apply one input event. Ignored (apart from cursor tracking) while a
    /// capture session runs.
    pub fn handle_input(&mut self, event: InputEvent) {
        let suppressed = self.capture.is_running();
        self.input.handle(event, &mut self.viewport, suppressed);
    }

    /// Run one iteration of the render loop: capture tick (save the previous
    /// capture frame, configure the next), then dispatch.
    pub fn run_frame(&mut self, sink: &mut dyn FrameSink) -> FrameReport {
        self.run_frame_at(sink, Instant::now())
    }

    pub fn run_frame_at(&mut self, sink: &mut dyn FrameSink, now: Instant) -> FrameReport {
        let dispatcher = &self.dispatcher;
        let tick = self.capture.tick(&mut self.viewport, now, |pending| {
            save_pending(dispatcher, &mut *sink, pending)
        });

        self.dispatcher
            .set_single_mode(self.user_single_mode || self.capture.is_running());
        if tick.step.is_some() {
            self.dispatcher.request_dispatch();
        }

        let dispatch = self.dispatcher.run_frame(&self.viewport, now);
        if let (Some(_), Some(handle)) = (&tick.step, &dispatch) {
            self.capture.confirm_dispatch(handle.serial);
        }

        FrameReport {
            dispatch,
            capture_step: tick.step,
            capture_finished: tick.finished,
        }
    }

    fn view_locked(&self, what: &str) -> bool {
        let locked = self.capture.is_running();
        if locked {
            debug!(control = what, "View is locked by a running capture");
        }
        locked
    }
}

/// Hand a queued capture frame to the sink, provided the output image
/// still holds the dispatch it was queued for.
fn save_pending<K: ComputeKernel>(
    dispatcher: &FrameDispatcher<K>,
    sink: &mut dyn FrameSink,
    pending: &PendingSave,
) -> Result<(), ResourceError> {
    let found = dispatcher.last_completed();
    match pending.dispatch_serial {
        Some(expected) if found == Some(expected) => {
            sink.save_frame(&pending.request, dispatcher.output())
        }
        expected => Err(ResourceError::StaleFrame {
            frame_index: pending.request.frame_index,
            expected: expected.unwrap_or_default(),
            found,
        }),
    }
}

impl<K: ComputeKernel> ExplorerControls for Explorer<K> {
    fn viewport(&self) -> &ViewportState {
        &self.viewport
    }

    fn resolution(&self) -> Resolution {
        self.dispatcher.resolution()
    }

    fn set_iterations(&mut self, value: i64) {
        if !self.view_locked("iterations") {
            self.viewport.set_iterations(value);
        }
    }

    fn adjust_iterations(&mut self, delta: i64) {
        if !self.view_locked("iterations") {
            self.viewport.adjust_iterations(delta);
        }
    }

    fn set_double_precision(&mut self, enabled: bool) {
        if !self.view_locked("precision") {
            self.viewport.set_double_precision(enabled);
        }
    }

    fn set_fractal_variant(&mut self, variant: FractalVariant) {
        if !self.view_locked("variant") {
            self.viewport.set_fractal_variant(variant);
        }
    }

    fn set_color_mode(&mut self, mode: ColorMode) {
        if !self.view_locked("color mode") {
            self.viewport.set_color_mode(mode);
        }
    }

    fn set_single_color(&mut self, color: Rgb) {
        if !self.view_locked("color") {
            self.viewport.set_single_color(color);
        }
    }

    fn go_to(&mut self, target: &GotoTarget) -> Result<(), ConfigError> {
        if self.view_locked("go to") {
            return Err(ConfigError::CaptureAlreadyRunning);
        }
        let resolution = self.resolution();
        self.viewport.go_to(target, resolution)?;
        info!(
            x = target.x,
            y = target.y,
            radius = target.radius,
            iterations = self.viewport.iterations(),
            "Jumped to coordinates"
        );
        Ok(())
    }

    fn current_target(&self) -> GotoTarget {
        GotoTarget::from_viewport(&self.viewport, self.resolution())
    }

    fn single_mode(&self) -> bool {
        self.user_single_mode
    }

    fn set_single_mode(&mut self, single: bool) {
        self.user_single_mode = single;
    }

    fn request_dispatch(&mut self) {
        self.dispatcher.request_dispatch();
    }

    fn zoom_sensitivity(&self) -> f64 {
        self.input.zoom_sensitivity()
    }

    fn set_zoom_sensitivity(&mut self, k: f64) {
        self.input.set_zoom_sensitivity(k);
    }

    fn capture_settings(&self) -> CaptureSettings {
        self.capture.settings()
    }

    fn set_capture_settings(&mut self, settings: CaptureSettings) {
        self.capture.set_settings(settings);
    }

    fn planned_frames(&self) -> Result<u32, ConfigError> {
        self.capture.planned_frames()
    }

    fn iteration_growth(&self) -> IterationGrowth {
        self.capture.iteration_growth()
    }

    fn set_iteration_growth(&mut self, growth: IterationGrowth) {
        self.capture.set_iteration_growth(growth);
    }

    fn start_capture(&mut self) -> Result<(), ConfigError> {
        let base = self.viewport.iterations();
        self.capture.start(base, &mut self.viewport)
    }

    fn stop_capture(&mut self) -> Option<CaptureSummary> {
        self.capture.stop(&mut self.viewport)
    }

    fn is_capturing(&self) -> bool {
        self.capture.is_running()
    }

    fn capture_progress(&self) -> Option<CaptureProgress> {
        self.capture.progress(Instant::now())
    }

    fn last_capture(&self) -> Option<&CaptureSummary> {
        self.capture.last_summary()
    }

    fn active_precision(&self) -> PrecisionMode {
        select_precision(self.viewport.uses_double_precision())
    }

    fn precision_hint(&self) -> bool {
        !self.viewport.uses_double_precision()
            && single_precision_exhausted(
                self.viewport.scale(),
                self.viewport.pan(),
                self.resolution(),
            )
    }

    fn average_frame_time(&self) -> Option<Duration> {
        self.dispatcher.timer().average_frame_time()
    }
}
