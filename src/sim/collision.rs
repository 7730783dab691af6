//! Collision detection on the tile grid
//!
//! Everything is an axis-aligned rectangle. Terrain queries quantize a
//! rectangle to the tiles under its footprint.

use glam::Vec2;

use super::tile::{Tile, TileCoord, TileGrid};
use crate::consts::{ARENA_SIZE, TILE_SIZE};
use crate::world_to_tile;

/// Axis-aligned rectangle (top-left origin, y grows downward)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub min: Vec2,
    pub size: Vec2,
}

impl Rect {
    pub fn new(min: Vec2, size: Vec2) -> Self {
        Self { min, size }
    }

    pub fn square(min: Vec2, side: f32) -> Self {
        Self::new(min, Vec2::splat(side))
    }

    /// Square of side `side` centred on `center`
    pub fn centered(center: Vec2, side: f32) -> Self {
        Self::square(center - Vec2::splat(side / 2.0), side)
    }

    pub fn max(&self) -> Vec2 {
        self.min + self.size
    }

    pub fn center(&self) -> Vec2 {
        self.min + self.size / 2.0
    }

    /// Strict overlap; touching edges do not count
    pub fn overlaps(&self, other: &Rect) -> bool {
        let a_max = self.max();
        let b_max = other.max();
        self.min.x < b_max.x
            && a_max.x > other.min.x
            && self.min.y < b_max.y
            && a_max.y > other.min.y
    }

    pub fn inside_arena(&self) -> bool {
        let max = self.max();
        self.min.x >= 0.0 && self.min.y >= 0.0 && max.x <= ARENA_SIZE && max.y <= ARENA_SIZE
    }

    /// Tiles touched by this rectangle
    pub fn tiles(&self) -> impl Iterator<Item = TileCoord> {
        // Shave a hair off the far edge so a rect flush with a tile
        // boundary does not claim the next tile
        let first = world_to_tile(self.min);
        let last = world_to_tile(self.max() - Vec2::splat(0.001));
        (first.y..=last.y).flat_map(move |y| (first.x..=last.x).map(move |x| TileCoord::new(x, y)))
    }
}

/// Rectangle covering one grid tile
pub fn tile_rect(coord: TileCoord) -> Rect {
    Rect::square(crate::tile_to_world(coord), TILE_SIZE)
}

/// Clamp a top-left position so a body of `size` stays inside the arena
pub fn clamp_to_arena(pos: Vec2, size: f32) -> Vec2 {
    pos.clamp(Vec2::ZERO, Vec2::splat(ARENA_SIZE - size))
}

/// Any wall/water tile under the footprint
pub fn blocked_by_terrain(grid: &TileGrid, rect: &Rect) -> bool {
    rect.tiles()
        .any(|c| grid.get(c).is_none_or(|t| t.blocks_movement()))
}

/// Any box tile under the footprint (enemies treat boxes as solid)
pub fn blocked_by_boxes(grid: &TileGrid, rect: &Rect) -> bool {
    rect.tiles().any(|c| grid.get(c).is_some_and(Tile::is_box))
}

/// First question/knowledge box under the footprint that `ready` accepts,
/// in row-major order
pub fn box_contact(
    grid: &TileGrid,
    rect: &Rect,
    ready: impl Fn(TileCoord) -> bool,
) -> Option<(TileCoord, Tile)> {
    rect.tiles()
        .filter_map(|c| grid.get(c).map(|t| (c, t)))
        .find(|&(c, t)| t.is_box() && ready(c))
}

/// What a bullet ran into this step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulletImpact {
    /// Still flying
    Clear,
    /// Left the arena
    OutOfBounds,
    /// Hit a bullet-blocking tile
    Terrain { coord: TileCoord, tile: Tile },
}

/// Check a bullet rectangle against the arena edge and terrain
pub fn bullet_impact(grid: &TileGrid, rect: &Rect) -> BulletImpact {
    if !rect.inside_arena() {
        return BulletImpact::OutOfBounds;
    }
    rect.tiles()
        .filter_map(|c| grid.get(c).map(|t| (c, t)))
        .find(|(_, t)| t.blocks_bullets())
        .map_or(BulletImpact::Clear, |(coord, tile)| BulletImpact::Terrain { coord, tile })
}
