use serde::{Deserialize, Serialize};

/// Grid columns (x runs 0..GRID_WIDTH).
pub const GRID_WIDTH: i32 = 9;
/// Grid rows (y runs 0..GRID_HEIGHT); a node's row is its tier.
pub const GRID_HEIGHT: i32 = 10;
/// Edge length of one grid cell in pixels.
pub const CELL_SIZE: f32 = 64.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridPosition {
    pub x: i32,
    pub y: i32,
}

impl GridPosition {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn is_valid(self) -> bool {
        (0..GRID_WIDTH).contains(&self.x) && (0..GRID_HEIGHT).contains(&self.y)
    }

    /// The row doubles as the node's tier for spend gating.
    pub const fn tier(self) -> i32 {
        self.y
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PixelPosition {
    pub x: f32,
    pub y: f32,
}

impl PixelPosition {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Maps a pixel coordinate to the grid cell containing it, clamped into
/// bounds. Total: out-of-range input lands on the nearest edge cell.
pub fn pixel_to_grid(pixel: PixelPosition) -> GridPosition {
    let x = (pixel.x / CELL_SIZE).floor() as i32;
    let y = (pixel.y / CELL_SIZE).floor() as i32;
    GridPosition::new(x.clamp(0, GRID_WIDTH - 1), y.clamp(0, GRID_HEIGHT - 1))
}

/// Maps a grid cell to the pixel coordinate of its center.
pub fn grid_to_pixel(cell: GridPosition) -> PixelPosition {
    PixelPosition::new(
        cell.x as f32 * CELL_SIZE + CELL_SIZE / 2.0,
        cell.y as f32 * CELL_SIZE + CELL_SIZE / 2.0,
    )
}
