use crate::precision::PrecisionMode;
use crate::viewport::{Resolution, ViewportState};

/// The per-frame parameter block uploaded to the compute kernel.
///
/// Pan and scale are sent in both widths; `double_precision` tells the
/// kernel which set to read. Pan is normalized by the output resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KernelParams {
    pub pan_x: f32,
    pub pan_y: f32,
    pub pan_x_f64: f64,
    pub pan_y_f64: f64,
    pub scale: f32,
    pub scale_f64: f64,
    pub iterations: u32,
    pub double_precision: bool,
    /// 0 = Mandelbrot, 1 = Burning Ship, 2 = Mandelbrot-3.
    pub variant: u32,
    /// 0 = full hue, 1 = single color.
    pub color_mode: i32,
    pub single_color: [f32; 3],
}

impl KernelParams {
    pub fn from_viewport(
        viewport: &ViewportState,
        resolution: Resolution,
        precision: PrecisionMode,
    ) -> Self {
        let (px, py) = viewport.normalized_center(resolution);
        let scale = viewport.scale();
        Self {
            pan_x: px as f32,
            pan_y: py as f32,
            pan_x_f64: px,
            pan_y_f64: py,
            scale: scale as f32,
            scale_f64: scale,
            iterations: viewport.iterations(),
            double_precision: precision.is_double(),
            variant: viewport.fractal_variant().selector(),
            color_mode: viewport.color_mode().selector(),
            single_color: viewport.single_color().to_array(),
        }
    }

    pub fn precision(&self) -> PrecisionMode {
        if self.double_precision {
            PrecisionMode::Double
        } else {
            PrecisionMode::Single
        }
    }
}
