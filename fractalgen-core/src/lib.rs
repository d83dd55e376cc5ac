pub mod capture;
pub mod dispatch;
pub mod error;
pub mod explorer;
pub mod frame;
pub mod input;
pub mod params;
pub mod precision;
pub mod timing;
pub mod viewport;

// Re-export primary types for convenience.
pub use capture::{
    CaptureProgress, CaptureSequencer, CaptureSettings, CaptureState, CaptureSummary,
    IterationGrowth,
};
pub use dispatch::{ComputeKernel, DispatchHandle, FrameDispatcher, KernelLoader};
pub use error::{ConfigError, CoreError, ResourceError};
pub use explorer::{Explorer, ExplorerConfig, ExplorerControls, FrameReport};
pub use frame::{FrameSink, FrameView, SaveRequest};
pub use input::{InputEvent, InputTranslator, Key};
pub use params::KernelParams;
pub use precision::PrecisionMode;
pub use viewport::{ColorMode, FractalVariant, GotoTarget, Resolution, Rgb, ViewportState};

/// Convenience result type for the core crate.
pub type Result<T> = std::result::Result<T, CoreError>;
