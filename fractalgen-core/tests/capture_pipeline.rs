use fractalgen_core::{
    CaptureSettings, CaptureState, ComputeKernel, Explorer, ExplorerConfig, ExplorerControls,
    FrameSink, FrameView, InputEvent, IterationGrowth, Key, KernelLoader, KernelParams,
    Resolution, ResourceError, SaveRequest,
};

/// Kernel that writes its uploaded parameters into every pixel:
/// `[scale, iterations, double_precision, 1]`.
struct ParamEchoKernel {
    resolution: Resolution,
    params: Option<KernelParams>,
    image: Vec<f32>,
}

impl ComputeKernel for ParamEchoKernel {
    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn upload_params(&mut self, params: &KernelParams) {
        self.params = Some(*params);
    }

    fn dispatch(&mut self, grid: Resolution) {
        let Some(p) = self.params else { return };
        let pixel = [
            p.scale_f64 as f32,
            p.iterations as f32,
            if p.double_precision { 1.0 } else { 0.0 },
            1.0,
        ];
        self.image = pixel
            .iter()
            .copied()
            .cycle()
            .take(grid.pixel_count() * 4)
            .collect();
    }

    fn memory_barrier(&mut self) {}

    fn output(&self) -> FrameView<'_> {
        FrameView {
            resolution: self.resolution,
            rgba: &self.image,
        }
    }
}

struct EchoLoader;

impl KernelLoader for EchoLoader {
    type Kernel = ParamEchoKernel;

    fn load(&self, resolution: Resolution) -> Result<ParamEchoKernel, ResourceError> {
        Ok(ParamEchoKernel {
            resolution,
            params: None,
            image: vec![0.0; resolution.pixel_count() * 4],
        })
    }
}

struct BrokenLoader;

impl KernelLoader for BrokenLoader {
    type Kernel = ParamEchoKernel;

    fn load(&self, _: Resolution) -> Result<ParamEchoKernel, ResourceError> {
        Err(ResourceError::KernelBuild {
            reason: "link failed".into(),
        })
    }
}

/// Keeps the first pixel of every saved frame.
#[derive(Default)]
struct RecordingSink {
    frames: Vec<(SaveRequest, [f32; 4])>,
}

impl FrameSink for RecordingSink {
    fn save_frame(&mut self, request: &SaveRequest, frame: FrameView<'_>) -> Result<(), ResourceError> {
        self.frames.push((request.clone(), frame.pixel(0, 0)));
        Ok(())
    }
}

fn small_config() -> ExplorerConfig {
    ExplorerConfig {
        resolution: Resolution::new(8, 4).unwrap(),
        iteration_growth: IterationGrowth::Fixed,
        ..ExplorerConfig::default()
    }
}

fn explorer() -> Explorer<ParamEchoKernel> {
    Explorer::load(&EchoLoader, &small_config()).unwrap()
}

#[test]
fn kernel_build_failure_is_reported() {
    let result = Explorer::load(&BrokenLoader, &small_config());
    assert!(matches!(result, Err(ResourceError::KernelBuild { .. })));
}

#[test]
fn every_frame_is_saved_with_its_own_image() {
    let mut ex = explorer();
    let mut sink = RecordingSink::default();
    ex.set_capture_settings(CaptureSettings {
        min_magnitude: 1.0,
        max_magnitude: 8.0,
        multiplier: 2.0,
    });
    ex.start_capture().unwrap();

    let mut frames_run = 0;
    while ex.is_capturing() {
        ex.run_frame(&mut sink);
        frames_run += 1;
        assert!(frames_run < 10, "capture did not terminate");
    }
    assert_eq!(frames_run, 4);

    let indices: Vec<u32> = sink.frames.iter().map(|(r, _)| r.frame_index).collect();
    let magnitudes: Vec<f64> = sink.frames.iter().map(|(r, _)| r.magnitude).collect();
    assert_eq!(indices, vec![0, 1, 2]);
    assert_eq!(magnitudes, vec![1.0, 2.0, 4.0]);

    // Each saved image was rendered at that frame's scale, in double precision.
    for (req, pixel) in &sink.frames {
        assert_eq!(pixel[0], (1.0 / req.magnitude) as f32);
        assert_eq!(pixel[2], 1.0);
    }

    let summary = ex.last_capture().unwrap();
    assert_eq!(summary.frames_saved, 3);
    assert!(!summary.cancelled);
    assert!(!ex.viewport().uses_double_precision());
}

#[test]
fn frames_share_one_session_directory() {
    let mut ex = explorer();
    let mut sink = RecordingSink::default();
    ex.set_capture_settings(CaptureSettings {
        min_magnitude: 1.0,
        max_magnitude: 100.0,
        multiplier: 10.0,
    });
    ex.start_capture().unwrap();
    while ex.is_capturing() {
        ex.run_frame(&mut sink);
    }
    let first = &sink.frames[0].0.session_id;
    assert!(sink.frames.iter().all(|(r, _)| &r.session_id == first));
    assert!(first.parse::<u64>().is_ok());
}

#[test]
fn input_is_ignored_while_capturing() {
    let mut ex = explorer();
    let mut sink = RecordingSink::default();
    ex.set_capture_settings(CaptureSettings {
        min_magnitude: 1.0,
        max_magnitude: 1e6,
        multiplier: 2.0,
    });
    ex.start_capture().unwrap();
    ex.run_frame(&mut sink);

    let before = ex.viewport().clone();
    ex.handle_input(InputEvent::PointerMove { x: 10.0, y: 10.0 });
    ex.handle_input(InputEvent::PointerDown);
    ex.handle_input(InputEvent::PointerMove { x: 300.0, y: -20.0 });
    ex.handle_input(InputEvent::PointerUp);
    ex.handle_input(InputEvent::Scroll { dy: 5.0 });
    ex.handle_input(InputEvent::KeyRepeat {
        key: Key::IterationsUp,
    });
    assert_eq!(ex.viewport(), &before);
    assert!(!ex.input().drag().active);
}

#[test]
fn input_resumes_after_stop() {
    let mut ex = explorer();
    let mut sink = RecordingSink::default();
    ex.set_capture_settings(CaptureSettings {
        min_magnitude: 1.0,
        max_magnitude: 1e6,
        multiplier: 2.0,
    });
    ex.start_capture().unwrap();
    ex.run_frame(&mut sink);
    ex.run_frame(&mut sink);

    let summary = ex.stop_capture().unwrap();
    assert!(summary.cancelled);
    assert_eq!(ex.capture().state(), CaptureState::Idle);
    // Only frame 0 had been flushed; frame 1 is discarded.
    assert_eq!(sink.frames.len(), 1);

    let iterations = ex.viewport().iterations();
    ex.handle_input(InputEvent::KeyRepeat {
        key: Key::IterationsUp,
    });
    assert_eq!(ex.viewport().iterations(), iterations + 1);
}

#[test]
fn invalid_range_leaves_explorer_idle() {
    let mut ex = explorer();
    ex.set_capture_settings(CaptureSettings {
        min_magnitude: 5.0,
        max_magnitude: 1.0,
        multiplier: 2.0,
    });
    assert!(ex.planned_frames().is_err());
    assert!(ex.start_capture().is_err());
    assert!(!ex.is_capturing());
    assert!(ex.capture().session().is_none());
}
