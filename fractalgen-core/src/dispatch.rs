//! Kernel abstraction and the per-frame dispatch step.

use std::time::Instant;

use tracing::{debug, trace};

use crate::error::ResourceError;
use crate::frame::FrameView;
use crate::params::KernelParams;
use crate::precision::{select_precision, PrecisionMode};
use crate::timing::{FrameTimer, FrameTimingSample};
use crate::viewport::{Resolution, ViewportState};

/// A compute kernel that fills one output image per dispatch.
///
/// The contract mirrors a GPU compute pipeline: parameters are uploaded,
/// one invocation runs per pixel of the grid, and the output is only
/// readable after `memory_barrier` returns.
pub trait ComputeKernel {
    /// Size of the output image.
    fn resolution(&self) -> Resolution;

    fn upload_params(&mut self, params: &KernelParams);

    /// Launch one invocation per cell of `grid`.
    fn dispatch(&mut self, grid: Resolution);

    /// Block until every write of the last dispatch is visible.
    fn memory_barrier(&mut self);

    /// The output image as of the last barrier.
    fn output(&self) -> FrameView<'_>;
}

/// Builds a kernel at startup. Any failure is fatal for the application.
pub trait KernelLoader {
    type Kernel: ComputeKernel;

    fn load(&self, resolution: Resolution) -> Result<Self::Kernel, ResourceError>;
}

/// Record of one completed dispatch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispatchHandle {
    /// Increases by one per dispatch, starting at 1.
    pub serial: u64,
    pub precision: PrecisionMode,
    pub params: KernelParams,
    pub timing: FrameTimingSample,
}

/// Decides per frame whether to dispatch, and runs the dispatch.
///
/// In continuous mode every frame dispatches. In single mode a frame
/// dispatches only after `request_dispatch`.
pub struct FrameDispatcher<K> {
    kernel: K,
    single_mode: bool,
    dispatch_requested: bool,
    next_serial: u64,
    last_completed: Option<u64>,
    last_handle: Option<DispatchHandle>,
    timer: FrameTimer,
}

impl<K: ComputeKernel> FrameDispatcher<K> {
    pub fn new(kernel: K) -> Self {
        Self {
            kernel,
            single_mode: false,
            dispatch_requested: false,
            next_serial: 1,
            last_completed: None,
            last_handle: None,
            timer: FrameTimer::new(),
        }
    }

    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    pub fn resolution(&self) -> Resolution {
        self.kernel.resolution()
    }

    pub fn is_single_mode(&self) -> bool {
        self.single_mode
    }

    pub fn set_single_mode(&mut self, single: bool) {
        if single != self.single_mode {
            debug!(single, "Dispatch mode changed");
        }
        self.single_mode = single;
    }

    /// Ask for one dispatch on the next frame (single mode).
    pub fn request_dispatch(&mut self) {
        self.dispatch_requested = true;
    }

    pub fn dispatch_requested(&self) -> bool {
        self.dispatch_requested
    }

    /// Serial of the most recent barrier-confirmed dispatch.
    pub fn last_completed(&self) -> Option<u64> {
        self.last_completed
    }

    pub fn last_handle(&self) -> Option<&DispatchHandle> {
        self.last_handle.as_ref()
    }

    pub fn timer(&self) -> &FrameTimer {
        &self.timer
    }

    /// The output image as of the last barrier.
    pub fn output(&self) -> FrameView<'_> {
        self.kernel.output()
    }

    /// Run one frame: dispatch if the mode allows it, otherwise do nothing.
    pub fn run_frame(&mut self, viewport: &ViewportState, now: Instant) -> Option<DispatchHandle> {
        if self.single_mode && !self.dispatch_requested {
            return None;
        }
        Some(self.dispatch_now(viewport, now))
    }

    /// Upload, dispatch and barrier unconditionally.
    pub fn dispatch_now(&mut self, viewport: &ViewportState, now: Instant) -> DispatchHandle {
        self.dispatch_requested = false;

        let precision = select_precision(viewport.uses_double_precision());
        let resolution = self.kernel.resolution();
        let params = KernelParams::from_viewport(viewport, resolution, precision);

        self.kernel.upload_params(&params);
        self.kernel.dispatch(resolution);
        self.kernel.memory_barrier();

        let serial = self.next_serial;
        self.next_serial += 1;
        self.last_completed = Some(serial);
        let timing = self.timer.record(now);

        trace!(
            serial,
            precision = precision.label(),
            iterations = params.iterations,
            delta_ms = timing.delta_from_previous.as_secs_f64() * 1000.0,
            "Dispatch complete"
        );

        let handle = DispatchHandle {
            serial,
            precision,
            params,
            timing,
        };
        self.last_handle = Some(handle);
        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// Kernel that paints every pixel with the iteration count it was given.
    #[derive(Default)]
    struct FillKernel {
        resolution: Resolution,
        uploaded: Option<KernelParams>,
        staged: Vec<f32>,
        visible: Vec<f32>,
        dispatches: u32,
    }

    impl FillKernel {
        fn new(w: u32, h: u32) -> Self {
            let resolution = Resolution::new(w, h).unwrap();
            Self {
                resolution,
                visible: vec![0.0; resolution.pixel_count() * 4],
                ..Self::default()
            }
        }
    }

    impl ComputeKernel for FillKernel {
        fn resolution(&self) -> Resolution {
            self.resolution
        }
        fn upload_params(&mut self, params: &KernelParams) {
            self.uploaded = Some(*params);
        }
        fn dispatch(&mut self, grid: Resolution) {
            let v = self.uploaded.map_or(0.0, |p| p.iterations as f32);
            self.staged = vec![v; grid.pixel_count() * 4];
            self.dispatches += 1;
        }
        fn memory_barrier(&mut self) {
            self.visible = std::mem::take(&mut self.staged);
        }
        fn output(&self) -> FrameView<'_> {
            FrameView {
                resolution: self.resolution,
                rgba: &self.visible,
            }
        }
    }

    #[test]
    fn continuous_mode_dispatches_every_frame() {
        let mut d = FrameDispatcher::new(FillKernel::new(4, 4));
        let vp = ViewportState::default();
        let now = Instant::now();
        assert!(d.run_frame(&vp, now).is_some());
        assert!(d.run_frame(&vp, now).is_some());
        assert_eq!(d.kernel().dispatches, 2);
        assert_eq!(d.last_completed(), Some(2));
    }

    #[test]
    fn single_mode_waits_for_request() {
        let mut d = FrameDispatcher::new(FillKernel::new(4, 4));
        d.set_single_mode(true);
        let vp = ViewportState::default();
        let now = Instant::now();

        assert!(d.run_frame(&vp, now).is_none());
        d.request_dispatch();
        let h = d.run_frame(&vp, now).unwrap();
        assert_eq!(h.serial, 1);
        assert!(!d.dispatch_requested());
        assert!(d.run_frame(&vp, now).is_none());
        assert_eq!(d.kernel().dispatches, 1);
    }

    #[test]
    fn output_is_visible_after_dispatch() {
        let mut d = FrameDispatcher::new(FillKernel::new(2, 2));
        let vp = ViewportState::with_iterations(42);
        d.dispatch_now(&vp, Instant::now());
        assert!(d.output().rgba.iter().all(|&v| v == 42.0));
    }

    #[test]
    fn handle_reports_precision_and_timing() {
        let mut d = FrameDispatcher::new(FillKernel::new(2, 2));
        let mut vp = ViewportState::default();
        vp.set_double_precision(true);
        let t0 = Instant::now();
        d.dispatch_now(&vp, t0);
        let h = d.dispatch_now(&vp, t0 + Duration::from_millis(20));
        assert_eq!(h.precision, PrecisionMode::Double);
        assert!(h.params.double_precision);
        assert_eq!(h.timing.delta_from_previous, Duration::from_millis(20));
        assert_eq!(d.last_handle(), Some(&h));
    }
}
