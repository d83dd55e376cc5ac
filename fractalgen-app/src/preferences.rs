use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use fractalgen_core::input::DEFAULT_ZOOM_SENSITIVITY;
use fractalgen_core::viewport::DEFAULT_ITERATIONS;
use fractalgen_core::{
    CaptureSettings, ColorMode, ExplorerConfig, FractalVariant, IterationGrowth, Resolution, Rgb,
    ViewportState,
};
use fractalgen_render::FrameFormat;

// ---------------------------------------------------------------------------
// Last-view snapshot
// ---------------------------------------------------------------------------

/// The view as it was on exit, restored on the next startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastView {
    pub pan_x: f64,
    pub pan_y: f64,
    pub scale: f64,
    pub iterations: u32,
    #[serde(default)]
    pub double_precision: bool,
    #[serde(default)]
    pub variant: FractalVariant,
    #[serde(default)]
    pub color_mode: ColorMode,
    #[serde(default)]
    pub single_color: Rgb,
}

impl LastView {
    pub fn from_viewport(viewport: &ViewportState) -> Self {
        let (pan_x, pan_y) = viewport.pan();
        Self {
            pan_x,
            pan_y,
            scale: viewport.scale(),
            iterations: viewport.iterations(),
            double_precision: viewport.uses_double_precision(),
            variant: viewport.fractal_variant(),
            color_mode: viewport.color_mode(),
            single_color: viewport.single_color(),
        }
    }

    /// Rebuild a viewport. An unusable stored scale falls back to 1.
    pub fn to_viewport(&self) -> ViewportState {
        let mut vp = ViewportState::with_iterations(self.iterations);
        vp.set_pan(self.pan_x, self.pan_y);
        if let Err(e) = vp.set_scale(self.scale) {
            warn!("Ignoring stored scale: {e}");
        }
        vp.set_double_precision(self.double_precision);
        vp.set_fractal_variant(self.variant);
        vp.set_color_mode(self.color_mode);
        vp.set_single_color(self.single_color);
        vp
    }
}

// ---------------------------------------------------------------------------
// Application preferences
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppPreferences {
    #[serde(default = "default_window_width")]
    pub window_width: f32,
    #[serde(default = "default_window_height")]
    pub window_height: f32,
    /// Output image size. Takes effect on the next start.
    #[serde(default)]
    pub output_resolution: Resolution,
    #[serde(default = "default_iterations")]
    pub default_iterations: u32,
    #[serde(default = "default_zoom_sensitivity")]
    pub zoom_sensitivity: f64,
    /// Kernel worker threads; 0 means one per core.
    #[serde(default)]
    pub kernel_threads: usize,
    #[serde(default)]
    pub capture: CaptureSettings,
    #[serde(default)]
    pub iteration_growth: IterationGrowth,
    #[serde(default)]
    pub frame_format: FrameFormat,
    /// Capture output root. When empty, a `captures/` folder next to the
    /// executable is used.
    #[serde(default)]
    pub capture_dir: String,
    #[serde(default = "default_true")]
    pub restore_last_view: bool,
    #[serde(default)]
    pub last_view: Option<LastView>,
}

fn default_window_width() -> f32 {
    1280.0
}
fn default_window_height() -> f32 {
    800.0
}
fn default_iterations() -> u32 {
    DEFAULT_ITERATIONS
}
fn default_zoom_sensitivity() -> f64 {
    DEFAULT_ZOOM_SENSITIVITY
}
fn default_true() -> bool {
    true
}

impl Default for AppPreferences {
    fn default() -> Self {
        Self {
            window_width: default_window_width(),
            window_height: default_window_height(),
            output_resolution: Resolution::default(),
            default_iterations: default_iterations(),
            zoom_sensitivity: default_zoom_sensitivity(),
            kernel_threads: 0,
            capture: CaptureSettings::default(),
            iteration_growth: IterationGrowth::default(),
            frame_format: FrameFormat::default(),
            capture_dir: String::new(),
            restore_last_view: true,
            last_view: None,
        }
    }
}

impl AppPreferences {
    /// Load preferences from next to the executable, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(&config_path())
    }

    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            debug!("No preferences file at {}", path.display());
            return Self::default();
        }
        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str::<AppPreferences>(&json) {
                Ok(prefs) => {
                    info!("Loaded preferences from {}", path.display());
                    return prefs.sanitized();
                }
                Err(e) => error!("Failed to parse preferences: {e}"),
            },
            Err(e) => error!("Failed to read preferences file: {e}"),
        }
        Self::default()
    }

    /// Persist preferences to disk.
    pub fn save(&self) {
        self.save_to(&config_path());
    }

    pub fn save_to(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                error!("Failed to create config directory: {e}");
                return;
            }
        }
        match serde_json::to_string_pretty(self) {
            Ok(json) => {
                if let Err(e) = fs::write(path, &json) {
                    error!("Failed to write preferences: {e}");
                } else {
                    debug!("Saved preferences");
                }
            }
            Err(e) => error!("Failed to serialize preferences: {e}"),
        }
    }

    pub fn explorer_config(&self) -> ExplorerConfig {
        ExplorerConfig {
            resolution: self.output_resolution,
            zoom_sensitivity: self.zoom_sensitivity,
            default_iterations: self.default_iterations,
            iteration_growth: self.iteration_growth,
            capture: self.capture,
        }
    }

    /// Capture output root, resolving the empty default.
    pub fn capture_root(&self) -> PathBuf {
        let trimmed = self.capture_dir.trim();
        if trimmed.is_empty() {
            crate::app_dir::captures_directory()
        } else {
            PathBuf::from(trimmed)
        }
    }

    /// Replace values a hand-edited file may have broken.
    fn sanitized(mut self) -> Self {
        if Resolution::new(self.output_resolution.width, self.output_resolution.height).is_err() {
            warn!("Invalid output resolution in preferences, using default");
            self.output_resolution = Resolution::default();
        }
        if !(self.zoom_sensitivity > 0.0) || !self.zoom_sensitivity.is_finite() {
            self.zoom_sensitivity = default_zoom_sensitivity();
        }
        self
    }
}

fn config_path() -> PathBuf {
    crate::app_dir::exe_directory().join("preferences.json")
}
