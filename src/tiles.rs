use glam::Vec2;

use crate::api::TileSource;
use crate::types::*;

/// A static grid cell as seen by the resolver.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Tile {
    /// User tile index (e.g. tileset frame).
    pub index: u32,
    pub col: i32,
    pub row: i32,
    pub bounds: Aabb,
    /// Faces that stop a body arriving from that side. `up` blocks bodies
    /// moving down onto the tile's top, so `{ up }` alone is a one-way platform.
    pub collide: Faces,
}

impl Tile {
    pub fn collides(&self) -> bool {
        self.collide.any()
    }
}

#[derive(Copy, Clone, Debug)]
struct Cell {
    index: u32,
    collide: Faces,
}

/// Uniform tile grid; the reference [`TileSource`].
///
/// Cells are `tile_size` wide, laid out row-major from `origin`.
#[derive(Clone, Debug)]
pub struct TileGrid {
    origin: Vec2,
    tile_size: Vec2,
    width: u32,
    height: u32,
    cells: Vec<Option<Cell>>,
    cull_internal_faces: bool,
}

impl TileGrid {
    pub fn new(origin: Vec2, tile_size: Vec2, width: u32, height: u32) -> Self {
        let tile_size = tile_size.abs().max(Vec2::splat(MIN_BODY_SIZE));
        Self {
            origin,
            tile_size,
            width,
            height,
            cells: vec![None; (width as usize) * (height as usize)],
            cull_internal_faces: true,
        }
    }

    /// Build from a row-major byte map; non-zero bytes become fully solid tiles
    /// whose index is the byte value.
    pub fn from_solids(origin: Vec2, tile_size: Vec2, width: u32, height: u32, solids: &[u8]) -> Self {
        let mut grid = Self::new(origin, tile_size, width, height);
        for (i, &s) in solids.iter().enumerate().take(grid.cells.len()) {
            if s != 0 {
                grid.cells[i] = Some(Cell { index: s as u32, collide: Faces::ALL });
            }
        }
        grid
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn tile_size(&self) -> Vec2 {
        self.tile_size
    }

    /// Mask faces shared with a colliding neighbour (on by default).
    pub fn set_cull_internal_faces(&mut self, cull: bool) -> &mut Self {
        self.cull_internal_faces = cull;
        self
    }

    /// Place a tile. Out-of-range coordinates are ignored.
    pub fn set_tile(&mut self, col: i32, row: i32, index: u32, collide: Faces) -> &mut Self {
        if let Some(i) = self.slot(col, row) {
            self.cells[i] = Some(Cell { index, collide });
        }
        self
    }

    pub fn set_solid(&mut self, col: i32, row: i32, index: u32) -> &mut Self {
        self.set_tile(col, row, index, Faces::ALL)
    }

    /// Tile that only stops bodies landing on its top face.
    pub fn set_one_way(&mut self, col: i32, row: i32, index: u32) -> &mut Self {
        self.set_tile(col, row, index, Faces::new(true, false, false, false))
    }

    pub fn clear_tile(&mut self, col: i32, row: i32) -> &mut Self {
        if let Some(i) = self.slot(col, row) {
            self.cells[i] = None;
        }
        self
    }

    /// Cell containing `p` (may be outside the grid).
    pub fn world_to_cell(&self, p: Vec2) -> (i32, i32) {
        let local = (p - self.origin) / self.tile_size;
        (local.x.floor() as i32, local.y.floor() as i32)
    }

    pub fn cell_bounds(&self, col: i32, row: i32) -> Aabb {
        let min = self.origin + Vec2::new(col as f32, row as f32) * self.tile_size;
        Aabb::from_pos_size(min, self.tile_size)
    }

    /// Tile at a cell, with internal faces already culled.
    pub fn tile_at(&self, col: i32, row: i32) -> Option<Tile> {
        let cell = self.cell(col, row)?;
        let mut collide = cell.collide;
        if self.cull_internal_faces {
            collide.up &= !self.solid(col, row - 1);
            collide.down &= !self.solid(col, row + 1);
            collide.left &= !self.solid(col - 1, row);
            collide.right &= !self.solid(col + 1, row);
        }
        Some(Tile { index: cell.index, col, row, bounds: self.cell_bounds(col, row), collide })
    }

    fn slot(&self, col: i32, row: i32) -> Option<usize> {
        if col < 0 || row < 0 || col as u32 >= self.width || row as u32 >= self.height {
            return None;
        }
        Some(row as usize * self.width as usize + col as usize)
    }

    fn cell(&self, col: i32, row: i32) -> Option<Cell> {
        self.slot(col, row).and_then(|i| self.cells[i])
    }

    fn solid(&self, col: i32, row: i32) -> bool {
        self.cell(col, row).is_some_and(|c| c.collide.any())
    }
}

impl TileSource for TileGrid {
    fn tiles_in_region(&self, region: Aabb, out: &mut Vec<Tile>) {
        if self.width == 0 || self.height == 0 {
            return;
        }
        let (c0, r0) = self.world_to_cell(region.min);
        let (c1, r1) = self.world_to_cell(region.max);
        let c0 = c0.max(0);
        let r0 = r0.max(0);
        let c1 = c1.min(self.width as i32 - 1);
        let r1 = r1.min(self.height as i32 - 1);
        for row in r0..=r1 {
            for col in c0..=c1 {
                if let Some(tile) = self.tile_at(col, row) {
                    out.push(tile);
                }
            }
        }
    }
}
