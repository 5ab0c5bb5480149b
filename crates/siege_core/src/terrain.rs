//! Static terrain grid: per-tile type, movement cost, passability,
//! buildability.
//!
//! The grid is immutable from the simulation's point of view once
//! generated; every other subsystem reads it but never writes it.

use serde::{Deserialize, Serialize};

use crate::math::{fixed_serde, Fixed, Vec2Fixed};

/// Movement cost at or above this value is treated as a second tier of
/// obstruction: the tile is excluded from pathfinding regardless of its
/// `passable` flag.
pub const IMPASSABLE_COST: Fixed = Fixed::const_from_int(10);

/// Terrain classification for a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TerrainType {
    /// Open grassland.
    #[default]
    Grass,
    /// Packed dirt, same cost as grass but not farmable.
    Dirt,
    /// Loose sand, slightly slower.
    Sand,
    /// Forest, slow going and not buildable.
    Forest,
    /// Rocky hills, slow going.
    Hills,
    /// Swamp, very slow but still crossable.
    Swamp,
    /// Open water. Cost places it in the impassable tier.
    Water,
    /// Lava. Cost places it in the impassable tier.
    Lava,
}

impl TerrainType {
    /// Base movement cost for this terrain type.
    #[must_use]
    pub const fn movement_cost(self) -> Fixed {
        match self {
            Self::Grass | Self::Dirt => Fixed::ONE,
            Self::Sand => Fixed::const_from_int(2),
            Self::Forest | Self::Hills => Fixed::const_from_int(3),
            Self::Swamp => Fixed::const_from_int(5),
            Self::Water => Fixed::const_from_int(10),
            Self::Lava => Fixed::const_from_int(12),
        }
    }

    /// Whether units can stand on this terrain at all.
    #[must_use]
    pub const fn passable(self) -> bool {
        !matches!(self, Self::Water | Self::Lava)
    }

    /// Whether buildings may be placed on this terrain.
    #[must_use]
    pub const fn buildable(self) -> bool {
        matches!(self, Self::Grass | Self::Dirt | Self::Sand)
    }
}

/// Immutable per-tile record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    /// Terrain classification.
    pub terrain: TerrainType,
    /// Movement cost for pathfinding.
    #[serde(with = "fixed_serde")]
    pub movement_cost: Fixed,
    /// Whether units can stand here.
    pub passable: bool,
    /// Whether buildings can be placed here.
    pub buildable: bool,
}

impl Tile {
    /// Create a tile from a terrain type with its default properties.
    #[must_use]
    pub const fn of(terrain: TerrainType) -> Self {
        Self {
            terrain,
            movement_cost: terrain.movement_cost(),
            passable: terrain.passable(),
            buildable: terrain.buildable(),
        }
    }
}

impl Default for Tile {
    fn default() -> Self {
        Self::of(TerrainType::Grass)
    }
}

/// The static map grid.
///
/// Tiles are stored row-major. World coordinates map onto the grid via a
/// uniform `tile_size`; tile centers are the canonical waypoint positions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerrainGrid {
    width: u32,
    height: u32,
    #[serde(with = "fixed_serde")]
    tile_size: Fixed,
    tiles: Vec<Tile>,
}

impl TerrainGrid {
    /// Create a grid with every tile set to grass.
    ///
    /// # Panics
    ///
    /// Panics if `width` or `height` is zero, or if `tile_size` is not
    /// positive.
    #[must_use]
    pub fn new(width: u32, height: u32, tile_size: Fixed) -> Self {
        assert!(width > 0, "TerrainGrid width must be positive");
        assert!(height > 0, "TerrainGrid height must be positive");
        assert!(
            tile_size > Fixed::ZERO,
            "TerrainGrid tile_size must be positive"
        );

        let count = (width as usize) * (height as usize);
        Self {
            width,
            height,
            tile_size,
            tiles: vec![Tile::default(); count],
        }
    }

    /// Build a grid by calling `f` for every coordinate pair.
    #[must_use]
    pub fn from_fn(
        width: u32,
        height: u32,
        tile_size: Fixed,
        mut f: impl FnMut(u32, u32) -> TerrainType,
    ) -> Self {
        let mut grid = Self::new(width, height, tile_size);
        for y in 0..height {
            for x in 0..width {
                let index = grid.index(x, y);
                grid.tiles[index] = Tile::of(f(x, y));
            }
        }
        grid
    }

    /// Grid width in tiles.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Grid height in tiles.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Tile edge length in world units.
    #[must_use]
    pub const fn tile_size(&self) -> Fixed {
        self.tile_size
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        (y as usize) * (self.width as usize) + (x as usize)
    }

    /// Check if tile coordinates are within grid bounds.
    #[must_use]
    pub fn in_bounds(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height
    }

    /// Get the tile at coordinates. Returns `None` if out of bounds.
    #[must_use]
    pub fn tile(&self, x: u32, y: u32) -> Option<&Tile> {
        if self.in_bounds(x, y) {
            Some(&self.tiles[self.index(x, y)])
        } else {
            None
        }
    }

    /// Replace the tile at coordinates (map setup only).
    /// Returns `false` if out of bounds.
    pub fn set_tile(&mut self, x: u32, y: u32, tile: Tile) -> bool {
        if self.in_bounds(x, y) {
            let index = self.index(x, y);
            self.tiles[index] = tile;
            true
        } else {
            false
        }
    }

    /// Set a tile by terrain type with default properties.
    pub fn set_terrain(&mut self, x: u32, y: u32, terrain: TerrainType) -> bool {
        self.set_tile(x, y, Tile::of(terrain))
    }

    /// Whether a tile can be walked on: the `passable` flag holds *and*
    /// the cost is below the [`IMPASSABLE_COST`] tier.
    #[must_use]
    pub fn is_walkable(&self, x: u32, y: u32) -> bool {
        self.tile(x, y)
            .is_some_and(|t| t.passable && t.movement_cost < IMPASSABLE_COST)
    }

    /// Whether a tile merely permits standing (ignores the cost tier).
    /// Used by line-of-sight, which cares about sight blockers only.
    #[must_use]
    pub fn is_passable(&self, x: u32, y: u32) -> bool {
        self.tile(x, y).is_some_and(|t| t.passable)
    }

    /// Movement cost for a walkable tile.
    /// Returns `None` for blocked or out-of-bounds tiles.
    #[must_use]
    pub fn movement_cost(&self, x: u32, y: u32) -> Option<Fixed> {
        self.tile(x, y).and_then(|t| {
            if t.passable && t.movement_cost < IMPASSABLE_COST {
                Some(t.movement_cost)
            } else {
                None
            }
        })
    }

    /// Whether an entire `w`×`h` footprint anchored at `(x, y)` is buildable.
    #[must_use]
    pub fn is_buildable_area(&self, x: u32, y: u32, w: u32, h: u32) -> bool {
        if w == 0 || h == 0 {
            return false;
        }
        for dy in 0..h {
            for dx in 0..w {
                let Some(tile) = self.tile(x + dx, y + dy) else {
                    return false;
                };
                if !tile.buildable {
                    return false;
                }
            }
        }
        true
    }

    /// Convert a world position to tile coordinates.
    ///
    /// Returns `None` if the position is outside the grid bounds.
    #[must_use]
    pub fn world_to_grid(&self, pos: Vec2Fixed) -> Option<(u32, u32)> {
        if pos.x < Fixed::ZERO || pos.y < Fixed::ZERO {
            return None;
        }

        let x = (pos.x / self.tile_size).to_num::<i64>();
        let y = (pos.y / self.tile_size).to_num::<i64>();

        if x >= 0 && x < i64::from(self.width) && y >= 0 && y < i64::from(self.height) {
            Some((x as u32, y as u32))
        } else {
            None
        }
    }

    /// Convert tile coordinates to a world position at the tile center.
    #[must_use]
    pub fn grid_to_world(&self, x: u32, y: u32) -> Vec2Fixed {
        let half = self.tile_size / Fixed::from_num(2);
        Vec2Fixed::new(
            Fixed::from_num(x) * self.tile_size + half,
            Fixed::from_num(y) * self.tile_size + half,
        )
    }
}

impl Default for TerrainGrid {
    /// Create a default grid (64x64 tiles, 32-unit tiles).
    fn default() -> Self {
        Self::new(64, 64, Fixed::from_num(32))
    }
}
