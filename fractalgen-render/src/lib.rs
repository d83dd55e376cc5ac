pub mod error;
pub mod export;
pub mod image;
pub mod kernel;
pub mod shade;
pub mod tile;

pub use error::RenderError;
pub use export::{encode_png, encode_ppm, save_frame_file, FileFrameSink, FrameFormat, FrameMetadata};
pub use image::{to_rgb8, to_rgba8, OutputImage};
pub use kernel::{escape_time, CpuKernel, CpuKernelLoader};
pub use shade::{shade, smooth_iteration, Escape};
pub use tile::TILE_SIZE;

/// Convenience result type for the render crate.
pub type Result<T> = std::result::Result<T, RenderError>;
