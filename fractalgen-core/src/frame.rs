use crate::error::ResourceError;
use crate::viewport::Resolution;

/// Borrowed view of a completed output image: RGBA `f32`, row-major, top
/// row first.
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    pub resolution: Resolution,
    pub rgba: &'a [f32],
}

impl<'a> FrameView<'a> {
    /// `None` when the slice does not hold exactly one RGBA pixel per grid
    /// cell.
    pub fn new(resolution: Resolution, rgba: &'a [f32]) -> Option<Self> {
        (rgba.len() == resolution.pixel_count() * 4).then_some(Self { resolution, rgba })
    }

    pub fn pixel(&self, x: u32, y: u32) -> [f32; 4] {
        let i = (y as usize * self.resolution.width as usize + x as usize) * 4;
        [
            self.rgba[i],
            self.rgba[i + 1],
            self.rgba[i + 2],
            self.rgba[i + 3],
        ]
    }

    /// Rows from top to bottom.
    pub fn rows(&self) -> std::slice::ChunksExact<'a, f32> {
        self.rgba.chunks_exact(self.resolution.width as usize * 4)
    }
}

/// Identifies one captured frame on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveRequest {
    /// Output directory name for the session.
    pub session_id: String,
    pub frame_index: u32,
    pub magnitude: f64,
}

impl SaveRequest {
    pub fn file_stem(&self) -> String {
        format!("frame{}", self.frame_index)
    }
}

/// Writes captured frames. Implementations create the session directory on
/// demand (idempotently).
pub trait FrameSink {
    fn save_frame(&mut self, request: &SaveRequest, frame: FrameView<'_>) -> Result<(), ResourceError>;
}

impl<S: FrameSink + ?Sized> FrameSink for &mut S {
    fn save_frame(&mut self, request: &SaveRequest, frame: FrameView<'_>) -> Result<(), ResourceError> {
        (**self).save_frame(request, frame)
    }
}

impl<S: FrameSink + ?Sized> FrameSink for Box<S> {
    fn save_frame(&mut self, request: &SaveRequest, frame: FrameView<'_>) -> Result<(), ResourceError> {
        (**self).save_frame(request, frame)
    }
}
