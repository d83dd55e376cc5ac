use fractalgen_core::{FrameView, Resolution};

use crate::tile::Tile;

/// The kernel's output image: RGBA `f32` in `0.0..=1.0`, row-major, top row
/// first.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputImage {
    pub resolution: Resolution,
    pub pixels: Vec<f32>,
}

impl OutputImage {
    /// Create an image filled with opaque black.
    pub fn new(resolution: Resolution) -> Self {
        let pixels = [0.0, 0.0, 0.0, 1.0].repeat(resolution.pixel_count());
        Self { resolution, pixels }
    }

    pub fn view(&self) -> FrameView<'_> {
        FrameView {
            resolution: self.resolution,
            rgba: &self.pixels,
        }
    }

    /// Copy a tile's RGBA data into place.
    pub fn blit_tile(&mut self, tile: &Tile, tile_pixels: &[f32]) {
        debug_assert_eq!(tile_pixels.len(), tile.pixel_count() * 4);
        let stride = self.resolution.width as usize * 4;
        let row_len = tile.width as usize * 4;
        for (row, src) in tile_pixels.chunks_exact(row_len).enumerate() {
            let dst_start = (tile.y as usize + row) * stride + tile.x as usize * 4;
            self.pixels[dst_start..dst_start + row_len].copy_from_slice(src);
        }
    }
}

/// Quantize one channel to 8 bits.
#[inline]
pub fn channel_to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0) as u8
}

/// Convert a frame to packed RGBA8, e.g. for texture upload.
pub fn to_rgba8(frame: FrameView<'_>) -> Vec<u8> {
    frame.rgba.iter().map(|&v| channel_to_u8(v)).collect()
}

/// Convert a frame to packed RGB8, dropping alpha.
pub fn to_rgb8(frame: FrameView<'_>) -> Vec<u8> {
    frame
        .rgba
        .chunks_exact(4)
        .flat_map(|px| [channel_to_u8(px[0]), channel_to_u8(px[1]), channel_to_u8(px[2])])
        .collect()
}
