use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ConfigError;

/// Lowest iteration count the kernel accepts.
pub const MIN_ITERATIONS: u32 = 1;
/// Highest iteration count the kernel accepts.
pub const MAX_ITERATIONS: u32 = 1_000_000;
/// Floor for multiplicative zoom updates. Scale is a divisor downstream and
/// must never reach zero.
pub const MIN_SCALE: f64 = 1e-300;
/// Ceiling for multiplicative zoom updates.
pub const MAX_SCALE: f64 = 1e300;

pub const DEFAULT_ITERATIONS: u32 = 20;

// ---------------------------------------------------------------------------
// Fractal variant / color mode
// ---------------------------------------------------------------------------

/// Escape-time formula evaluated by the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FractalVariant {
    /// `z = z² + c`
    #[default]
    Mandelbrot,
    /// `z = (|re z| + i|im z|)² + c`
    BurningShip,
    /// `z = z³ + c`
    Mandelbrot3,
}

impl FractalVariant {
    pub const ALL: [Self; 3] = [Self::Mandelbrot, Self::BurningShip, Self::Mandelbrot3];

    pub fn label(self) -> &'static str {
        match self {
            Self::Mandelbrot => "Mandelbrot",
            Self::BurningShip => "Burning Ship",
            Self::Mandelbrot3 => "Mandelbrot-3",
        }
    }

    /// Selector value the kernel switches on.
    pub fn selector(self) -> u32 {
        match self {
            Self::Mandelbrot => 0,
            Self::BurningShip => 1,
            Self::Mandelbrot3 => 2,
        }
    }

    pub fn from_selector(selector: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.selector() == selector)
    }
}

/// How the kernel shades escaped points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorMode {
    #[default]
    FullHue,
    SingleColor,
}

impl ColorMode {
    pub const ALL: [Self; 2] = [Self::FullHue, Self::SingleColor];

    pub fn label(self) -> &'static str {
        match self {
            Self::FullHue => "Full Hue",
            Self::SingleColor => "Single Color",
        }
    }

    pub fn selector(self) -> i32 {
        match self {
            Self::FullHue => 0,
            Self::SingleColor => 1,
        }
    }

    pub fn from_selector(selector: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.selector() == selector)
    }
}

/// Linear RGB color with channels in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }

    /// Build from an array, clamping each channel into range.
    pub fn from_array(rgb: [f32; 3]) -> Self {
        let c = |v: f32| if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 };
        Self::new(c(rgb[0]), c(rgb[1]), c(rgb[2]))
    }
}

impl Default for Rgb {
    fn default() -> Self {
        Self::WHITE
    }
}

// ---------------------------------------------------------------------------
// Output resolution
// ---------------------------------------------------------------------------

/// Pixel grid of the output image and of each dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const FULL_HD: Self = Self {
        width: 1920,
        height: 1080,
    };

    pub fn new(width: u32, height: u32) -> Result<Self, ConfigError> {
        if width == 0 || height == 0 {
            return Err(ConfigError::InvalidResolution { width, height });
        }
        Ok(Self { width, height })
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Height over width; the kernel scales the imaginary axis by this so
    /// pixels stay square.
    pub fn aspect(&self) -> f64 {
        self.height as f64 / self.width as f64
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::FULL_HD
    }
}

// ---------------------------------------------------------------------------
// Viewport state
// ---------------------------------------------------------------------------

/// Everything the kernel needs to know about the current view.
///
/// `pan` is in pixel-equivalent units: a screen drag of `d` pixels moves it
/// by `d * scale`. `scale` is the reciprocal of the magnification and is
/// kept strictly positive by every mutator.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewportState {
    pan: (f64, f64),
    scale: f64,
    iterations: u32,
    uses_double_precision: bool,
    fractal_variant: FractalVariant,
    color_mode: ColorMode,
    single_color: Rgb,
}

impl Default for ViewportState {
    fn default() -> Self {
        Self::with_iterations(DEFAULT_ITERATIONS)
    }
}

impl ViewportState {
    /// Startup state: unpanned, magnification 1, single precision.
    pub fn with_iterations(iterations: u32) -> Self {
        Self {
            pan: (0.0, 0.0),
            scale: 1.0,
            iterations: iterations.clamp(MIN_ITERATIONS, MAX_ITERATIONS),
            uses_double_precision: false,
            fractal_variant: FractalVariant::default(),
            color_mode: ColorMode::default(),
            single_color: Rgb::default(),
        }
    }

    // -- Pan ---------------------------------------------------------------

    pub fn pan(&self) -> (f64, f64) {
        self.pan
    }

    pub fn set_pan(&mut self, x: f64, y: f64) {
        if x.is_finite() && y.is_finite() {
            self.pan = (x, y);
        } else {
            warn!(x, y, "Ignoring non-finite pan");
        }
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.set_pan(self.pan.0 + dx, self.pan.1 + dy);
    }

    /// Pan expressed in output-image fractions, the form the kernel and the
    /// coordinate read-outs use.
    pub fn normalized_center(&self, resolution: Resolution) -> (f64, f64) {
        (
            self.pan.0 / resolution.width as f64,
            self.pan.1 / resolution.height as f64,
        )
    }

    // -- Scale -------------------------------------------------------------

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn magnitude(&self) -> f64 {
        1.0 / self.scale
    }

    /// Set the scale directly. Zero, negative and non-finite values are
    /// rejected and the current scale is kept.
    pub fn set_scale(&mut self, scale: f64) -> Result<(), ConfigError> {
        if !(scale > 0.0) || !scale.is_finite() {
            return Err(ConfigError::NonPositiveScale(scale));
        }
        self.scale = scale.clamp(MIN_SCALE, MAX_SCALE);
        Ok(())
    }

    pub fn set_magnitude(&mut self, magnitude: f64) -> Result<(), ConfigError> {
        self.set_scale(1.0 / magnitude)
    }

    /// Like [`set_magnitude`](Self::set_magnitude), but a magnitude outside
    /// the representable scale range is pulled to the nearest bound instead
    /// of being rejected. Returns the magnitude now in effect.
    pub fn set_magnitude_clamped(&mut self, magnitude: f64) -> f64 {
        if !(magnitude > 0.0) {
            warn!(magnitude, "Ignoring non-positive magnitude");
            return self.magnitude();
        }
        match self.set_magnitude(magnitude) {
            Ok(()) => magnitude,
            Err(e) => {
                self.scale = if magnitude > 1.0 { MIN_SCALE } else { MAX_SCALE };
                warn!(magnitude, scale = self.scale, "Magnitude out of range, clamping: {e}");
                self.magnitude()
            }
        }
    }

    /// Multiply the scale by `factor`, clamping the result into
    /// `[MIN_SCALE, MAX_SCALE]`.
    pub fn zoom_by(&mut self, factor: f64) {
        if !(factor > 0.0) || !factor.is_finite() {
            warn!(factor, "Ignoring invalid zoom factor");
            return;
        }
        let next = self.scale * factor;
        if !(MIN_SCALE..=MAX_SCALE).contains(&next) {
            warn!(scale = next, "Scale left its valid range, clamping");
        }
        self.scale = next.clamp(MIN_SCALE, MAX_SCALE);
    }

    // -- Iterations --------------------------------------------------------

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn set_iterations(&mut self, value: i64) {
        self.iterations = clamp_iterations(value);
    }

    pub fn adjust_iterations(&mut self, delta: i64) {
        self.set_iterations(self.iterations as i64 + delta);
    }

    // -- Shading / precision ----------------------------------------------

    pub fn uses_double_precision(&self) -> bool {
        self.uses_double_precision
    }

    pub fn set_double_precision(&mut self, enabled: bool) {
        self.uses_double_precision = enabled;
    }

    pub fn fractal_variant(&self) -> FractalVariant {
        self.fractal_variant
    }

    pub fn set_fractal_variant(&mut self, variant: FractalVariant) {
        self.fractal_variant = variant;
    }

    pub fn color_mode(&self) -> ColorMode {
        self.color_mode
    }

    pub fn set_color_mode(&mut self, mode: ColorMode) {
        self.color_mode = mode;
    }

    pub fn single_color(&self) -> Rgb {
        self.single_color
    }

    pub fn set_single_color(&mut self, color: Rgb) {
        self.single_color = Rgb::from_array(color.to_array());
    }

    // -- Coordinate jump ---------------------------------------------------

    /// Jump to a typed-in location. Nothing changes unless the radius is
    /// valid.
    pub fn go_to(&mut self, target: &GotoTarget, resolution: Resolution) -> Result<(), ConfigError> {
        if !(target.radius > 0.0) || !target.radius.is_finite() {
            return Err(ConfigError::NonPositiveScale(target.radius));
        }
        self.set_scale(target.radius)?;
        self.set_pan(
            target.x * resolution.width as f64,
            target.y * resolution.height as f64,
        );
        self.set_iterations(target.iterations);
        Ok(())
    }
}

fn clamp_iterations(value: i64) -> u32 {
    value.clamp(MIN_ITERATIONS as i64, MAX_ITERATIONS as i64) as u32
}

// ---------------------------------------------------------------------------
// Coordinate input
// ---------------------------------------------------------------------------

/// Contents of the coordinate-input fields: a normalized center, a radius
/// (`R`, equal to the scale) and an iteration count.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GotoTarget {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    pub iterations: i64,
}

impl Default for GotoTarget {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            radius: 1.0,
            iterations: 10,
        }
    }
}

impl GotoTarget {
    /// Snapshot the current view into the input fields.
    pub fn from_viewport(viewport: &ViewportState, resolution: Resolution) -> Self {
        let (x, y) = viewport.normalized_center(resolution);
        Self {
            x,
            y,
            radius: viewport.scale(),
            iterations: viewport.iterations() as i64,
        }
    }

    /// Magnification `M = 1 / R`.
    pub fn magnitude(&self) -> f64 {
        1.0 / self.radius
    }

    pub fn set_magnitude(&mut self, magnitude: f64) {
        self.radius = 1.0 / magnitude;
    }
}
