use std::path::PathBuf;

use thiserror::Error;

/// Rejected configuration or user input. The operation that produced it
/// left all state unchanged.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid capture range: start magnitude {min} must be > 0 and <= stop magnitude {max}")]
    InvalidRange { min: f64, max: f64 },

    #[error("invalid multiplier per frame: {0} (must be > 1.0)")]
    InvalidMultiplier(f32),

    #[error("capture range needs {0} frames, more than a session can hold")]
    TooManyFrames(f64),

    #[error("invalid scale: {0} (must be positive and finite)")]
    NonPositiveScale(f64),

    #[error("invalid output resolution: {width}×{height}")]
    InvalidResolution { width: u32, height: u32 },

    #[error("a capture session is already running")]
    CaptureAlreadyRunning,
}

/// Failures of the collaborators the core drives: kernel construction and
/// frame output.
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("compute kernel could not be built: {reason}")]
    KernelBuild { reason: String },

    #[error("failed to write {}: {source}", path.display())]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("frame {frame_index} was overwritten before it could be saved (expected dispatch {expected}, found {found:?})")]
    StaleFrame {
        frame_index: u32,
        expected: u64,
        found: Option<u64>,
    },

    #[error("frame writer unavailable: {reason}")]
    SinkUnavailable { reason: String },
}

/// Top-level error for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Resource(#[from] ResourceError),
}
