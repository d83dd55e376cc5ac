use serde::{Deserialize, Serialize};

use crate::viewport::Resolution;

/// Which uniform set the kernel reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrecisionMode {
    Single,
    Double,
}

impl PrecisionMode {
    pub fn label(self) -> &'static str {
        match self {
            Self::Single => "f32",
            Self::Double => "f64",
        }
    }

    pub fn is_double(self) -> bool {
        self == Self::Double
    }
}

/// Double precision when explicitly requested (user toggle, or forced by a
/// running capture), single otherwise. There is no automatic switching.
pub fn select_precision(explicit_flag: bool) -> PrecisionMode {
    if explicit_flag {
        PrecisionMode::Double
    } else {
        PrecisionMode::Single
    }
}

/// `true` when f32 can no longer tell neighbouring pixels apart at this
/// view. Used only for a HUD warning.
pub fn single_precision_exhausted(scale: f64, pan: (f64, f64), resolution: Resolution) -> bool {
    let pixel_step = scale / resolution.width as f64;
    let extent = (pan.0 / resolution.width as f64)
        .abs()
        .max((pan.1 / resolution.height as f64).abs())
        .max(scale)
        .max(1.0);
    pixel_step < extent * f32::EPSILON as f64 * 4.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_flag_selects_double() {
        assert_eq!(select_precision(true), PrecisionMode::Double);
        assert_eq!(select_precision(false), PrecisionMode::Single);
    }

    #[test]
    fn shallow_views_are_fine_in_single() {
        assert!(!single_precision_exhausted(1.0, (0.0, 0.0), Resolution::FULL_HD));
        assert!(!single_precision_exhausted(1e-2, (0.0, 0.0), Resolution::FULL_HD));
    }

    #[test]
    fn deep_views_exhaust_single() {
        assert!(single_precision_exhausted(1e-5, (0.0, 0.0), Resolution::FULL_HD));
        assert!(single_precision_exhausted(1e-9, (1000.0, 0.0), Resolution::FULL_HD));
    }
}
