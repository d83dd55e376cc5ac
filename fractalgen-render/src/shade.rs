//! Escape-time shading.

use fractalgen_core::ColorMode;

/// Iterations per full trip around the hue circle in full-hue mode.
pub const HUE_PERIOD: f64 = 64.0;

const INTERIOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Outcome of iterating one point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Escape {
    /// Did not escape within the iteration limit.
    Interior,
    Escaped { iterations: u32, norm_sq: f64 },
}

/// Continuous (fractional) iteration count:
/// `n + 1 - log2(ln|z_n|)`.
pub fn smooth_iteration(iterations: u32, norm_sq: f64) -> f64 {
    let log_zn = norm_sq.ln() * 0.5;
    if log_zn <= 0.0 {
        return iterations as f64;
    }
    iterations as f64 + 1.0 - log_zn.ln() / std::f64::consts::LN_2
}

/// HSV → RGB with `h` in turns (`0.0..1.0`).
pub fn hsv_to_rgb(h: f64, s: f64, v: f64) -> [f32; 3] {
    let h6 = h.rem_euclid(1.0) * 6.0;
    let sector = h6.floor();
    let f = h6 - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    let (r, g, b) = match sector as u32 {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };
    [r as f32, g as f32, b as f32]
}

/// Color for one pixel. Interior points are black in every mode.
pub fn shade(escape: Escape, max_iterations: u32, mode: ColorMode, single_color: [f32; 3]) -> [f32; 4] {
    let Escape::Escaped { iterations, norm_sq } = escape else {
        return INTERIOR;
    };
    let mu = smooth_iteration(iterations, norm_sq).max(0.0);
    match mode {
        ColorMode::FullHue => {
            let [r, g, b] = hsv_to_rgb(mu / HUE_PERIOD, 1.0, 1.0);
            [r, g, b, 1.0]
        }
        ColorMode::SingleColor => {
            let t = (mu / max_iterations.max(1) as f64).clamp(0.0, 1.0).sqrt() as f32;
            [
                single_color[0] * t,
                single_color[1] * t,
                single_color[2] * t,
                1.0,
            ]
        }
    }
}
