//! Tiled, multithreaded CPU implementation of the compute kernel.
//!
//! Each dispatch renders into a staging image on a dedicated rayon pool;
//! the barrier publishes it as the output image.

use std::ops::{Add, Mul, Sub};
use std::time::Instant;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, info, warn};

use fractalgen_core::{
    ColorMode, ComputeKernel, FractalVariant, FrameView, KernelLoader, KernelParams, Resolution,
    ResourceError,
};

use crate::image::OutputImage;
use crate::shade::{shade, Escape};
use crate::tile::{build_tile_grid, Tile};
use crate::RenderError;

/// Width of the complex plane visible at scale 1.
pub const VIEW_SPAN: f64 = 4.0;

const BAILOUT_SQ: f64 = 4.0;

// ---------------------------------------------------------------------------
// Precision-generic arithmetic
// ---------------------------------------------------------------------------

/// The float width a dispatch computes in.
pub trait KernelFloat:
    Copy + Send + Sync + PartialOrd + Add<Output = Self> + Sub<Output = Self> + Mul<Output = Self>
{
    fn from_f64(v: f64) -> Self;
    fn to_f64(self) -> f64;
    fn abs(self) -> Self;
}

impl KernelFloat for f32 {
    #[inline]
    fn from_f64(v: f64) -> Self {
        v as f32
    }
    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }
    #[inline]
    fn abs(self) -> Self {
        f32::abs(self)
    }
}

impl KernelFloat for f64 {
    #[inline]
    fn from_f64(v: f64) -> Self {
        v
    }
    #[inline]
    fn to_f64(self) -> f64 {
        self
    }
    #[inline]
    fn abs(self) -> Self {
        f64::abs(self)
    }
}

/// Per-dispatch constants, already converted to the working precision.
#[derive(Debug, Clone, Copy)]
struct Frame<F> {
    pan_u: F,
    pan_v: F,
    scale: F,
    span: F,
    span_im: F,
    half: F,
    inv_width: F,
    inv_height: F,
    iterations: u32,
    variant: FractalVariant,
    color_mode: ColorMode,
    single_color: [f32; 3],
}

impl<F: KernelFloat> Frame<F> {
    fn new(params: &KernelParams, grid: Resolution, pan: (F, F), scale: F) -> Self {
        Self {
            pan_u: pan.0,
            pan_v: pan.1,
            scale,
            span: F::from_f64(VIEW_SPAN),
            span_im: F::from_f64(VIEW_SPAN * grid.aspect()),
            half: F::from_f64(0.5),
            inv_width: F::from_f64(1.0 / grid.width as f64),
            inv_height: F::from_f64(1.0 / grid.height as f64),
            iterations: params.iterations,
            variant: FractalVariant::from_selector(params.variant).unwrap_or_default(),
            color_mode: ColorMode::from_selector(params.color_mode).unwrap_or_default(),
            single_color: params.single_color,
        }
    }

    /// Complex-plane point for pixel `(px, py)`. `pan` moves the view
    /// opposite to the image content, so a drag keeps the point under the
    /// cursor fixed.
    #[inline]
    fn point(&self, px: u32, py: u32) -> (F, F) {
        let u = F::from_f64(px as f64) * self.inv_width;
        let v = F::from_f64(py as f64) * self.inv_height;
        let re = self.span * ((u - self.half) * self.scale - self.pan_u);
        let im = self.span_im * (self.pan_v - (v - self.half) * self.scale);
        (re, im)
    }

    fn render_tile(&self, tile: &Tile) -> Vec<f32> {
        let mut data = Vec::with_capacity(tile.pixel_count() * 4);
        for py in tile.y..tile.y + tile.height {
            for px in tile.x..tile.x + tile.width {
                let c = self.point(px, py);
                let escape = escape_time(self.variant, c, self.iterations);
                data.extend_from_slice(&shade(
                    escape,
                    self.iterations,
                    self.color_mode,
                    self.single_color,
                ));
            }
        }
        data
    }
}

/// Iterate `z -> f(z) + c` from `z = 0` until `|z|² > 4` or `max_iterations`.
pub fn escape_time<F: KernelFloat>(variant: FractalVariant, c: (F, F), max_iterations: u32) -> Escape {
    let (cr, ci) = c;
    let bailout = F::from_f64(BAILOUT_SQ);
    let two = F::from_f64(2.0);
    let three = F::from_f64(3.0);
    let (mut zr, mut zi) = (F::from_f64(0.0), F::from_f64(0.0));

    for i in 0..max_iterations {
        let (r2, i2) = (zr * zr, zi * zi);
        let (nr, ni) = match variant {
            FractalVariant::Mandelbrot => (r2 - i2, two * zr * zi),
            FractalVariant::BurningShip => (r2 - i2, two * zr.abs() * zi.abs()),
            FractalVariant::Mandelbrot3 => (zr * (r2 - three * i2), zi * (three * r2 - i2)),
        };
        zr = nr + cr;
        zi = ni + ci;

        let norm_sq = zr * zr + zi * zi;
        if norm_sq > bailout {
            return Escape::Escaped {
                iterations: i + 1,
                norm_sq: norm_sq.to_f64(),
            };
        }
    }
    Escape::Interior
}

// ---------------------------------------------------------------------------
// Kernel
// ---------------------------------------------------------------------------

pub struct CpuKernel {
    resolution: Resolution,
    pool: ThreadPool,
    params: Option<KernelParams>,
    staging: OutputImage,
    output: OutputImage,
    staged: bool,
}

impl CpuKernel {
    /// `threads == 0` lets rayon pick one thread per core.
    pub fn new(resolution: Resolution, threads: usize) -> crate::Result<Self> {
        if resolution.width == 0 || resolution.height == 0 {
            return Err(RenderError::InvalidDimensions {
                width: resolution.width,
                height: resolution.height,
            });
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("fractalgen-kernel-{i}"))
            .build()?;
        info!(
            width = resolution.width,
            height = resolution.height,
            threads = pool.current_num_threads(),
            "CPU kernel ready"
        );
        Ok(Self {
            resolution,
            pool,
            params: None,
            staging: OutputImage::new(resolution),
            output: OutputImage::new(resolution),
            staged: false,
        })
    }

    pub fn thread_count(&self) -> usize {
        self.pool.current_num_threads()
    }

    fn render<F: KernelFloat>(&mut self, frame: Frame<F>, grid: Resolution) {
        let tiles = build_tile_grid(grid);
        let tile_data: Vec<Vec<f32>> = self
            .pool
            .install(|| tiles.par_iter().map(|tile| frame.render_tile(tile)).collect());
        for (tile, data) in tiles.iter().zip(&tile_data) {
            self.staging.blit_tile(tile, data);
        }
    }
}

impl ComputeKernel for CpuKernel {
    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn upload_params(&mut self, params: &KernelParams) {
        self.params = Some(*params);
    }

    fn dispatch(&mut self, grid: Resolution) {
        let Some(params) = self.params else {
            warn!("Dispatch without uploaded parameters, skipping");
            return;
        };
        let grid = if grid == self.resolution {
            grid
        } else {
            warn!(
                grid_w = grid.width,
                grid_h = grid.height,
                "Dispatch grid differs from the output image, clamping"
            );
            Resolution {
                width: grid.width.min(self.resolution.width),
                height: grid.height.min(self.resolution.height),
            }
        };

        let start = Instant::now();
        if params.double_precision {
            let frame = Frame::<f64>::new(
                &params,
                self.resolution,
                (params.pan_x_f64, params.pan_y_f64),
                params.scale_f64,
            );
            self.render(frame, grid);
        } else {
            let frame = Frame::<f32>::new(
                &params,
                self.resolution,
                (params.pan_x, params.pan_y),
                params.scale,
            );
            self.render(frame, grid);
        }
        let elapsed = start.elapsed();
        self.staged = true;
        debug!(
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            iterations = params.iterations,
            double = params.double_precision,
            "Kernel dispatch"
        );
    }

    fn memory_barrier(&mut self) {
        if self.staged {
            std::mem::swap(&mut self.staging, &mut self.output);
            self.staged = false;
        }
    }

    fn output(&self) -> FrameView<'_> {
        self.output.view()
    }
}

/// Builds a [`CpuKernel`] for the requested output size.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuKernelLoader {
    /// Worker threads; 0 means one per core.
    pub threads: usize,
}

impl KernelLoader for CpuKernelLoader {
    type Kernel = CpuKernel;

    fn load(&self, resolution: Resolution) -> Result<CpuKernel, ResourceError> {
        CpuKernel::new(resolution, self.threads).map_err(|e| ResourceError::KernelBuild {
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fractalgen_core::{PrecisionMode, ViewportState};

    fn params_for(vp: &ViewportState, res: Resolution) -> KernelParams {
        let precision = if vp.uses_double_precision() {
            PrecisionMode::Double
        } else {
            PrecisionMode::Single
        };
        KernelParams::from_viewport(vp, res, precision)
    }

    #[test]
    fn origin_is_interior_for_every_variant() {
        for variant in FractalVariant::ALL {
            assert_eq!(escape_time::<f64>(variant, (0.0, 0.0), 500), Escape::Interior);
            assert_eq!(escape_time::<f32>(variant, (0.0, 0.0), 500), Escape::Interior);
        }
    }

    #[test]
    fn far_points_escape_immediately() {
        for variant in FractalVariant::ALL {
            assert!(matches!(
                escape_time::<f64>(variant, (3.0, 3.0), 500),
                Escape::Escaped { iterations: 1, .. }
            ));
        }
    }

    #[test]
    fn variants_disagree_off_axis() {
        let c = (-1.0, -0.3);
        assert!(matches!(
            escape_time::<f64>(FractalVariant::Mandelbrot, c, 1000),
            Escape::Escaped { iterations: 35, .. }
        ));
        assert_eq!(
            escape_time::<f64>(FractalVariant::BurningShip, c, 1000),
            Escape::Interior
        );
        assert!(matches!(
            escape_time::<f64>(FractalVariant::Mandelbrot3, c, 1000),
            Escape::Escaped { iterations: 2, .. }
        ));
    }

    #[test]
    fn pixel_mapping_centres_the_view() {
        let res = Resolution::new(200, 100).unwrap();
        let vp = ViewportState::default();
        let frame = Frame::<f64>::new(&params_for(&vp, res), res, (0.0, 0.0), 1.0);
        assert_eq!(frame.point(100, 50), (0.0, 0.0));
        assert_eq!(frame.point(0, 0), (-2.0, 1.0));
        // Square pixels: one pixel step is the same length on both axes.
        let (r0, i0) = frame.point(10, 10);
        let (r1, _) = frame.point(11, 10);
        let (_, i1) = frame.point(10, 11);
        assert!(((r1 - r0) - (i0 - i1)).abs() < 1e-12);
    }

    #[test]
    fn drag_keeps_content_under_cursor() {
        let res = Resolution::new(200, 100).unwrap();
        let mut vp = ViewportState::default();
        vp.set_scale(0.5).unwrap();
        let before = Frame::<f64>::new(&params_for(&vp, res), res, vp.normalized_center(res), 0.5)
            .point(40, 30);
        // Dragging the cursor by (+10, +4) px.
        vp.pan_by(10.0 * 0.5, 4.0 * 0.5);
        let after = Frame::<f64>::new(&params_for(&vp, res), res, vp.normalized_center(res), 0.5)
            .point(50, 34);
        assert!((before.0 - after.0).abs() < 1e-12);
        assert!((before.1 - after.1).abs() < 1e-12);
    }

    #[test]
    fn output_only_changes_after_barrier() {
        let res = Resolution::new(32, 16).unwrap();
        let mut kernel = CpuKernel::new(res, 2).unwrap();
        let vp = ViewportState::with_iterations(50);
        kernel.upload_params(&params_for(&vp, res));
        kernel.dispatch(res);

        let black = OutputImage::new(res);
        assert_eq!(kernel.output().rgba, black.pixels.as_slice());
        kernel.memory_barrier();
        assert_ne!(kernel.output().rgba, black.pixels.as_slice());
    }

    #[test]
    fn single_and_double_agree_at_shallow_zoom() {
        let res = Resolution::new(48, 32).unwrap();
        let mut vp = ViewportState::with_iterations(64);
        let mut kernel = CpuKernel::new(res, 1).unwrap();

        kernel.upload_params(&params_for(&vp, res));
        kernel.dispatch(res);
        kernel.memory_barrier();
        let single = kernel.output().rgba.to_vec();

        vp.set_double_precision(true);
        kernel.upload_params(&params_for(&vp, res));
        kernel.dispatch(res);
        kernel.memory_barrier();
        let double = kernel.output().rgba.to_vec();

        let interior = |px: &[f32]| px == [0.0, 0.0, 0.0, 1.0];
        let differing = single
            .chunks_exact(4)
            .zip(double.chunks_exact(4))
            .filter(|&(a, b)| interior(a) != interior(b))
            .count();
        assert!(single.chunks_exact(4).any(interior));
        assert!(differing < res.pixel_count() / 20, "{differing} pixels differ");
    }

    #[test]
    fn loader_reports_kernel_build_errors() {
        let err = CpuKernel::new(
            Resolution {
                width: 0,
                height: 10,
            },
            1,
        )
        .err()
        .unwrap();
        assert!(matches!(err, RenderError::InvalidDimensions { .. }));

        let kernel = CpuKernelLoader { threads: 1 }
            .load(Resolution::new(8, 8).unwrap())
            .unwrap();
        assert_eq!(kernel.thread_count(), 1);
    }
}
