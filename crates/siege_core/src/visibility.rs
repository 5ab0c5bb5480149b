//! Per-civilization fog of war.
//!
//! Each civilization owns a flat grid of tile knowledge: unexplored,
//! explored (seen at some point), or visible (in sight right now). A
//! recompute cycle first downgrades visible tiles to explored, then
//! reveals around every active entity the civilization owns. Explored
//! tiles never return to unexplored.

use serde::{Deserialize, Serialize};

use crate::entity::CivId;
use crate::terrain::TerrainGrid;

/// Knowledge level for one tile, for one civilization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[repr(u8)]
pub enum VisLevel {
    /// Never seen.
    #[default]
    Unexplored = 0,
    /// Seen before, not currently in sight.
    Explored = 1,
    /// Currently in sight.
    Visible = 2,
}

/// One knowledge grid per civilization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisibilityField {
    width: u32,
    height: u32,
    civ_count: u8,
    /// Civilization-major, then row-major.
    cells: Vec<VisLevel>,
}

impl VisibilityField {
    /// Create a field with every tile unexplored for every civilization.
    ///
    /// # Panics
    ///
    /// Panics if any dimension or the civilization count is zero.
    #[must_use]
    pub fn new(width: u32, height: u32, civ_count: u8) -> Self {
        assert!(width > 0 && height > 0, "VisibilityField must not be empty");
        assert!(civ_count > 0, "VisibilityField needs at least one civ");

        let per_civ = (width as usize) * (height as usize);
        Self {
            width,
            height,
            civ_count,
            cells: vec![VisLevel::Unexplored; per_civ * civ_count as usize],
        }
    }

    /// Number of civilizations tracked.
    #[must_use]
    pub const fn civ_count(&self) -> u8 {
        self.civ_count
    }

    #[inline]
    fn index(&self, civ: CivId, x: u32, y: u32) -> Option<usize> {
        if civ >= self.civ_count || x >= self.width || y >= self.height {
            return None;
        }
        let per_civ = (self.width as usize) * (self.height as usize);
        Some(per_civ * civ as usize + (y as usize) * (self.width as usize) + x as usize)
    }

    /// Knowledge level of a tile. Out-of-range queries read as unexplored.
    #[must_use]
    pub fn level(&self, x: u32, y: u32, civ: CivId) -> VisLevel {
        self.index(civ, x, y)
            .map_or(VisLevel::Unexplored, |i| self.cells[i])
    }

    /// Whether the tile is currently in sight for the civilization.
    #[must_use]
    pub fn is_visible(&self, x: u32, y: u32, civ: CivId) -> bool {
        self.level(x, y, civ) == VisLevel::Visible
    }

    /// Whether the tile has ever been seen by the civilization.
    #[must_use]
    pub fn is_explored(&self, x: u32, y: u32, civ: CivId) -> bool {
        self.level(x, y, civ) >= VisLevel::Explored
    }

    fn set_visible(&mut self, x: u32, y: u32, civ: CivId) {
        if let Some(i) = self.index(civ, x, y) {
            self.cells[i] = VisLevel::Visible;
        }
    }

    /// Start a recompute cycle: downgrade every visible tile to explored
    /// for every civilization. Explored tiles are sticky; nothing ever
    /// drops back to unexplored.
    pub fn begin_cycle(&mut self) {
        for cell in &mut self.cells {
            if *cell == VisLevel::Visible {
                *cell = VisLevel::Explored;
            }
        }
    }

    /// Reveal a circular area around `(cx, cy)` for one civilization.
    ///
    /// Tiles strictly inside `radius - 1` are revealed without a sight
    /// check. Tiles in the outer ring get a Bresenham line-of-sight test
    /// against terrain: any impassable tile strictly between the viewer
    /// and the target blocks it.
    pub fn reveal_area(&mut self, grid: &TerrainGrid, cx: u32, cy: u32, radius: u32, civ: CivId) {
        let r = i64::from(radius);
        let r_sq = r * r;
        let inner = (r - 1).max(0);
        let inner_sq = inner * inner;

        let min_x = i64::from(cx) - r;
        let max_x = i64::from(cx) + r;
        let min_y = i64::from(cy) - r;
        let max_y = i64::from(cy) + r;

        for ty in min_y..=max_y {
            for tx in min_x..=max_x {
                if tx < 0 || ty < 0 || tx >= i64::from(self.width) || ty >= i64::from(self.height)
                {
                    continue;
                }

                let dx = tx - i64::from(cx);
                let dy = ty - i64::from(cy);
                let dist_sq = dx * dx + dy * dy;
                if dist_sq > r_sq {
                    continue;
                }

                let x = tx as u32;
                let y = ty as u32;

                // Cheap inner disk; only the outer ring pays for a sight
                // test.
                if dist_sq < inner_sq || line_of_sight(grid, cx, cy, x, y) {
                    self.set_visible(x, y, civ);
                }
            }
        }
    }

    /// Run one full recompute: downgrade, then reveal around every
    /// supplied viewer as `(civ, tile_x, tile_y, radius)`.
    pub fn recompute<I>(&mut self, grid: &TerrainGrid, viewers: I)
    where
        I: IntoIterator<Item = (CivId, u32, u32, u32)>,
    {
        self.begin_cycle();
        let mut count = 0usize;
        for (civ, x, y, radius) in viewers {
            self.reveal_area(grid, x, y, radius, civ);
            count += 1;
        }
        tracing::debug!(viewers = count, "visibility recompute");
    }

    /// Debug/new-game override: mark the whole map visible for a civ.
    pub fn reveal_map(&mut self, civ: CivId) {
        if civ >= self.civ_count {
            return;
        }
        let per_civ = (self.width as usize) * (self.height as usize);
        let start = per_civ * civ as usize;
        for cell in &mut self.cells[start..start + per_civ] {
            *cell = VisLevel::Visible;
        }
    }

    /// Debug/new-game override: forget everything for a civ.
    pub fn reset(&mut self, civ: CivId) {
        if civ >= self.civ_count {
            return;
        }
        let per_civ = (self.width as usize) * (self.height as usize);
        let start = per_civ * civ as usize;
        for cell in &mut self.cells[start..start + per_civ] {
            *cell = VisLevel::Unexplored;
        }
    }
}

/// Bresenham line walk between two tiles.
///
/// Returns `false` when any impassable tile lies strictly between the
/// endpoints; the endpoints themselves never block.
fn line_of_sight(grid: &TerrainGrid, x0: u32, y0: u32, x1: u32, y1: u32) -> bool {
    let dx = (i64::from(x1) - i64::from(x0)).abs();
    let dy = (i64::from(y1) - i64::from(y0)).abs();
    let sx: i64 = if x0 < x1 { 1 } else { -1 };
    let sy: i64 = if y0 < y1 { 1 } else { -1 };
    let mut err = dx - dy;

    let mut x = i64::from(x0);
    let mut y = i64::from(y0);

    loop {
        if x == i64::from(x1) && y == i64::from(y1) {
            return true;
        }

        // Intermediate tiles only: the viewer's own tile does not block.
        let at_start = x == i64::from(x0) && y == i64::from(y0);
        if !at_start && !grid.is_passable(x as u32, y as u32) {
            return false;
        }

        let e2 = 2 * err;
        if e2 > -dy {
            err -= dy;
            x += sx;
        }
        if e2 < dx {
            err += dx;
            y += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Fixed;
    use crate::terrain::TerrainType;

    fn open_grid(size: u32) -> TerrainGrid {
        TerrainGrid::new(size, size, Fixed::from_num(1))
    }

    #[test]
    fn test_reveal_radius() {
        let grid = open_grid(40);
        let mut field = VisibilityField::new(40, 40, 2);

        field.reveal_area(&grid, 10, 10, 4, 0);

        assert!(field.is_visible(10, 10, 0));
        assert!(field.is_visible(13, 10, 0));
        assert!(field.is_visible(14, 10, 0)); // distance 4 == radius
        assert!(!field.is_visible(16, 10, 0)); // distance 6 > radius
        assert!(!field.is_visible(15, 10, 0)); // distance 5 > radius

        // Other civ saw nothing.
        assert!(!field.is_explored(10, 10, 1));
    }

    #[test]
    fn test_downgrade_keeps_explored() {
        let grid = open_grid(20);
        let mut field = VisibilityField::new(20, 20, 1);

        field.reveal_area(&grid, 5, 5, 3, 0);
        assert!(field.is_visible(5, 5, 0));

        field.begin_cycle();
        assert!(!field.is_visible(5, 5, 0));
        assert!(field.is_explored(5, 5, 0));

        // A second cycle with no viewers must not forget the tile.
        field.begin_cycle();
        assert!(field.is_explored(5, 5, 0));
    }

    #[test]
    fn test_explored_ratchet_across_recomputes() {
        let grid = open_grid(20);
        let mut field = VisibilityField::new(20, 20, 1);

        field.recompute(&grid, vec![(0, 3, 3, 4)]);
        let explored: Vec<(u32, u32)> = (0..20)
            .flat_map(|y| (0..20).map(move |x| (x, y)))
            .filter(|&(x, y)| field.is_explored(x, y, 0))
            .collect();
        assert!(!explored.is_empty());

        // Viewer moved far away; everything previously explored stays
        // explored.
        field.recompute(&grid, vec![(0, 15, 15, 4)]);
        for (x, y) in explored {
            assert!(field.is_explored(x, y, 0));
        }
    }

    #[test]
    fn test_line_of_sight_blocked_by_impassable() {
        let mut grid = open_grid(20);
        // Wall of water between viewer and the far side.
        for y in 0..20 {
            grid.set_terrain(8, y, TerrainType::Water);
        }

        let mut field = VisibilityField::new(20, 20, 1);
        field.reveal_area(&grid, 5, 10, 4, 0);

        // Clear sight up to and including the blocking tile itself.
        assert!(field.is_visible(7, 10, 0));
        assert!(field.is_visible(8, 10, 0));
        // The tile behind the wall is in radius but occluded.
        assert!(!field.is_visible(9, 10, 0));
    }

    #[test]
    fn test_inner_disk_skips_sight_check() {
        let mut grid = open_grid(20);
        grid.set_terrain(6, 10, TerrainType::Water);

        let mut field = VisibilityField::new(20, 20, 1);
        field.reveal_area(&grid, 5, 10, 8, 0);

        // (7,10) sits behind the blocker but strictly inside radius-1,
        // so it is revealed without a sight test.
        assert!(field.is_visible(7, 10, 0));
    }

    #[test]
    fn test_reveal_map_and_reset() {
        let mut field = VisibilityField::new(10, 10, 2);

        field.reveal_map(1);
        assert!(field.is_visible(9, 9, 1));
        assert!(!field.is_visible(9, 9, 0));

        field.reset(1);
        assert!(!field.is_explored(0, 0, 1));
    }

    #[test]
    fn test_out_of_range_queries() {
        let field = VisibilityField::new(10, 10, 1);
        assert!(!field.is_visible(50, 50, 0));
        assert!(!field.is_explored(0, 0, 7));
    }
}
