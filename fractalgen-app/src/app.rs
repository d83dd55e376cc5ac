use std::path::PathBuf;
use std::sync::mpsc;

use eframe::egui;
use thiserror::Error;
use tracing::{debug, info, warn};

use fractalgen_core::{
    Explorer, ExplorerControls, FrameReport, InputEvent, Key, ResourceError,
};
use fractalgen_render::{to_rgba8, CpuKernel, CpuKernelLoader};

use crate::io_worker::{spawn_io_worker, BackgroundFrameSink, IoResponse};
use crate::preferences::{AppPreferences, LastView};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Raw egui scroll points per unit of zoom input.
pub(crate) const SCROLL_POINTS_PER_STEP: f32 = 50.0;
pub(crate) const HUD_MARGIN: f32 = 8.0;
pub(crate) const HUD_CORNER_RADIUS: f32 = 6.0;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Fatal startup and shutdown failures.
#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error(transparent)]
    Kernel(#[from] ResourceError),

    #[error("failed to start I/O worker: {0}")]
    IoWorker(#[source] std::io::Error),

    #[error("window system error: {0}")]
    Ui(#[from] eframe::Error),
}

// ---------------------------------------------------------------------------
// Coordinate input fields
// ---------------------------------------------------------------------------

/// Text buffers behind the "Go!" coordinate inputs. Kept as strings so
/// values such as `1e-12` can be typed directly.
#[derive(Debug, Clone, Default)]
pub(crate) struct GotoFields {
    pub x: String,
    pub y: String,
    pub radius: String,
    pub magnitude: String,
    pub iterations: String,
}

/// Text buffers behind the capture range inputs.
#[derive(Debug, Clone, Default)]
pub(crate) struct CaptureFields {
    pub min_magnitude: String,
    pub max_magnitude: String,
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

pub(crate) struct FractalGenApp {
    pub(crate) explorer: Explorer<CpuKernel>,
    pub(crate) sink: BackgroundFrameSink,
    io_resp_rx: mpsc::Receiver<IoResponse>,
    pub(crate) preferences: AppPreferences,

    texture: Option<egui::TextureHandle>,

    pub(crate) goto_fields: GotoFields,
    pub(crate) capture_fields: CaptureFields,
    pub(crate) capture_dir_buf: String,

    pub(crate) show_hud: bool,
    pub(crate) show_controls: bool,
    pub(crate) show_capture: bool,
    pub(crate) show_settings: bool,

    /// One-line message for the last rejected action or failed save.
    pub(crate) status: Option<String>,
    pub(crate) last_saved: Option<PathBuf>,
    pub(crate) save_failures: u32,
}

impl FractalGenApp {
    pub(crate) fn new(
        explorer: Explorer<CpuKernel>,
        sink: BackgroundFrameSink,
        io_resp_rx: mpsc::Receiver<IoResponse>,
        preferences: AppPreferences,
    ) -> Self {
        let mut app = Self {
            explorer,
            sink,
            io_resp_rx,
            capture_dir_buf: preferences.capture_root().to_string_lossy().to_string(),
            preferences,
            texture: None,
            goto_fields: GotoFields::default(),
            capture_fields: CaptureFields::default(),
            show_hud: true,
            show_controls: true,
            show_capture: false,
            show_settings: false,
            status: None,
            last_saved: None,
            save_failures: 0,
        };

        if app.preferences.restore_last_view {
            if let Some(view) = app.preferences.last_view.clone() {
                app.explorer.restore_viewport(view.to_viewport());
                info!("Restored last view");
            }
        }
        app.fill_goto_from_view();
        app.fill_capture_fields();
        app
    }

    /// "Input To Center": copy the current view into the coordinate fields.
    pub(crate) fn fill_goto_from_view(&mut self) {
        let target = self.explorer.current_target();
        self.goto_fields = GotoFields {
            x: format!("{}", target.x),
            y: format!("{}", target.y),
            radius: format!("{:e}", target.radius),
            magnitude: format!("{:e}", target.magnitude()),
            iterations: target.iterations.to_string(),
        };
    }

    pub(crate) fn fill_capture_fields(&mut self) {
        let settings = self.explorer.capture_settings();
        self.capture_fields = CaptureFields {
            min_magnitude: format!("{}", settings.min_magnitude),
            max_magnitude: format!("{}", settings.max_magnitude),
        };
    }

    pub(crate) fn set_status(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{message}");
        self.status = Some(message);
    }

    fn last_view(&self) -> LastView {
        LastView::from_viewport(self.explorer.viewport())
    }

    /// Copy the live explorer settings back into the preferences.
    pub(crate) fn sync_preferences(&mut self) {
        self.preferences.capture = self.explorer.capture_settings();
        self.preferences.iteration_growth = self.explorer.iteration_growth();
        self.preferences.zoom_sensitivity = self.explorer.zoom_sensitivity();
        self.preferences.capture_dir = self.capture_dir_buf.trim().to_string();
        self.preferences.last_view = Some(self.last_view());
    }
}

// ---------------------------------------------------------------------------
// IO worker polling
// ---------------------------------------------------------------------------

impl FractalGenApp {
    /// Drain results of background frame writes.
    fn poll_io_responses(&mut self) {
        while let Ok(resp) = self.io_resp_rx.try_recv() {
            match resp {
                IoResponse::FrameWritten { frame_index, path } => {
                    debug!(frame_index, path = %path.display(), "Frame saved");
                    self.last_saved = Some(path);
                }
                IoResponse::FrameFailed { frame_index, error } => {
                    self.save_failures += 1;
                    self.set_status(format!("Frame {frame_index} was not saved: {error}"));
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Canvas: input, dispatch, presentation
// ---------------------------------------------------------------------------

impl FractalGenApp {
    fn handle_canvas_input(&mut self, ctx: &egui::Context, response: &egui::Response) {
        let resolution = self.explorer.resolution();
        let rect = response.rect;

        if let Some(pos) = ctx.input(|i| i.pointer.latest_pos()) {
            let x = (pos.x - rect.min.x) as f64 * resolution.width as f64
                / rect.width().max(1.0) as f64;
            let y = (pos.y - rect.min.y) as f64 * resolution.height as f64
                / rect.height().max(1.0) as f64;
            self.explorer.handle_input(InputEvent::PointerMove { x, y });
        }
        if response.drag_started_by(egui::PointerButton::Primary) {
            self.explorer.handle_input(InputEvent::PointerDown);
        }
        if response.drag_stopped_by(egui::PointerButton::Primary) {
            self.explorer.handle_input(InputEvent::PointerUp);
        }

        if response.hovered() {
            let scroll = ctx.input(|i| i.raw_scroll_delta.y);
            if scroll != 0.0 {
                self.explorer.handle_input(InputEvent::Scroll {
                    dy: (scroll / SCROLL_POINTS_PER_STEP) as f64,
                });
            }
        }
    }

    fn handle_keyboard(&mut self, ctx: &egui::Context) {
        let text_editing = ctx.memory(|m| m.focused().is_some());
        if text_editing {
            return;
        }
        let (up, down, escape, toggle_hud) = ctx.input(|i| {
            (
                i.key_down(egui::Key::Plus) || i.key_down(egui::Key::Equals),
                i.key_down(egui::Key::Minus),
                i.key_pressed(egui::Key::Escape),
                i.key_pressed(egui::Key::H),
            )
        });
        if up {
            self.explorer.handle_input(InputEvent::KeyRepeat {
                key: Key::IterationsUp,
            });
        }
        if down {
            self.explorer.handle_input(InputEvent::KeyRepeat {
                key: Key::IterationsDown,
            });
        }
        if escape && self.explorer.is_capturing() {
            self.stop_capture();
        }
        if toggle_hud {
            self.show_hud = !self.show_hud;
        }
    }

    pub(crate) fn stop_capture(&mut self) {
        if let Some(summary) = self.explorer.stop_capture() {
            self.status = Some(format!(
                "Capture cancelled: {} frames dispatched, {} saved",
                summary.frames_dispatched, summary.frames_saved
            ));
        }
    }

    fn apply_report(&mut self, ctx: &egui::Context, report: &FrameReport) {
        if report.dispatched() {
            self.upload_texture(ctx);
        }
        if let Some(summary) = &report.capture_finished {
            info!(
                session = %summary.session_id,
                saved = summary.frames_saved,
                failed = summary.frames_failed,
                "Capture finished"
            );
            self.status = Some(format!(
                "Capture {} finished: {} frames saved, {} failed",
                summary.session_id, summary.frames_saved, summary.frames_failed
            ));
        }
    }

    fn upload_texture(&mut self, ctx: &egui::Context) {
        let frame = self.explorer.dispatcher().output();
        let size = [
            frame.resolution.width as usize,
            frame.resolution.height as usize,
        ];
        let image = egui::ColorImage::from_rgba_unmultiplied(size, &to_rgba8(frame));
        match &mut self.texture {
            Some(tex) => tex.set(image, egui::TextureOptions::LINEAR),
            None => {
                self.texture = Some(ctx.load_texture("fractal", image, egui::TextureOptions::LINEAR));
            }
        }
    }

    fn update_canvas(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                let available = ui.available_size();
                let (response, painter) =
                    ui.allocate_painter(available, egui::Sense::click_and_drag());

                self.handle_canvas_input(ctx, &response);
                let report = self.explorer.run_frame(&mut self.sink);
                self.apply_report(ctx, &report);

                let uv = egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));
                if let Some(ref tex) = self.texture {
                    painter.image(tex.id(), response.rect, uv, egui::Color32::WHITE);
                }
            });
    }
}

// ---------------------------------------------------------------------------
// eframe::App
// ---------------------------------------------------------------------------

impl eframe::App for FractalGenApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.set_visuals(egui::Visuals::dark());
        self.poll_io_responses();

        self.show_controls_window(ctx);
        self.show_capture_window(ctx);
        self.show_settings_window(ctx);
        self.show_hud(ctx);

        self.handle_keyboard(ctx);
        self.update_canvas(ctx);

        if !self.explorer.single_mode() || self.explorer.is_capturing() {
            ctx.request_repaint();
        }
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        if self.explorer.is_capturing() {
            self.stop_capture();
        }
        self.sync_preferences();
        self.preferences.save();
        info!("Saved preferences on exit");
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub(crate) fn run() -> Result<(), AppError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting FractalGenerator");

    let prefs = AppPreferences::load();

    let loader = CpuKernelLoader {
        threads: prefs.kernel_threads,
    };
    let explorer = Explorer::load(&loader, &prefs.explorer_config())?;
    let (io_tx, io_resp_rx) = spawn_io_worker().map_err(AppError::IoWorker)?;
    let sink = BackgroundFrameSink::new(io_tx, prefs.capture_root(), prefs.frame_format);

    let viewport = egui::ViewportBuilder::default()
        .with_title("FractalGenerator")
        .with_inner_size([prefs.window_width, prefs.window_height]);

    let options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };

    eframe::run_native(
        "FractalGenerator",
        options,
        Box::new(move |_cc| {
            Ok(Box::new(FractalGenApp::new(explorer, sink, io_resp_rx, prefs)))
        }),
    )?;
    Ok(())
}
