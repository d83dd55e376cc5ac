use fractalgen_core::Resolution;

/// Edge length of a work unit. 64×64 RGBA f32 = 64 KB per tile.
pub const TILE_SIZE: u32 = 64;

/// A rectangular block of the output grid, rendered by one rayon task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    /// Pixel x of the top-left corner.
    pub x: u32,
    /// Pixel y of the top-left corner.
    pub y: u32,
    /// May be smaller than `TILE_SIZE` at the right edge.
    pub width: u32,
    /// May be smaller than `TILE_SIZE` at the bottom edge.
    pub height: u32,
}

impl Tile {
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Cover `grid` with non-overlapping tiles, row by row from the top left.
pub fn build_tile_grid(grid: Resolution) -> Vec<Tile> {
    let mut tiles = Vec::new();
    let mut y = 0;
    while y < grid.height {
        let th = TILE_SIZE.min(grid.height - y);
        let mut x = 0;
        while x < grid.width {
            let tw = TILE_SIZE.min(grid.width - x);
            tiles.push(Tile {
                x,
                y,
                width: tw,
                height: th,
            });
            x += tw;
        }
        y += th;
    }
    tiles
}
