//! Test fixtures and helpers.
//!
//! Pre-built worlds and spawning shortcuts for consistent testing.

use siege_core::entity::{CivId, EntityBlueprint, EntityId};
use siege_core::math::{Fixed, Vec2Fixed};
use siege_core::sim::Simulation;
use siege_core::terrain::{TerrainGrid, TerrainType};

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> Fixed {
    Fixed::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: In real simulation code, never use floats.
/// This is only for convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> Fixed {
    Fixed::from_num(n)
}

/// An open grass grid with 1-unit tiles, convenient for tile-level
/// assertions.
#[must_use]
pub fn unit_grid(size: u32) -> TerrainGrid {
    TerrainGrid::new(size, size, Fixed::ONE)
}

/// A two-civilization simulation on open grass with the default 32-unit
/// tiles.
#[must_use]
pub fn battlefield(size: u32) -> Simulation {
    Simulation::new(TerrainGrid::new(size, size, fixed(32)), 2)
}

/// Cut a vertical river through a grid, leaving a single ford.
pub fn river_with_ford(grid: &mut TerrainGrid, river_x: u32, ford_y: u32) {
    for y in 0..grid.height() {
        if y != ford_y {
            grid.set_terrain(river_x, y, TerrainType::Water);
        }
    }
}

/// Spawn one entity per position from a blueprint, panicking on spawn
/// failure. Test-only convenience.
///
/// # Panics
///
/// Panics if any position is outside the terrain grid.
pub fn spawn_company(
    sim: &mut Simulation,
    owner: CivId,
    blueprint: &EntityBlueprint,
    positions: &[(i32, i32)],
) -> Vec<EntityId> {
    positions
        .iter()
        .map(|&(x, y)| {
            sim.spawn(owner, blueprint, Vec2Fixed::new(fixed(x), fixed(y)))
                .expect("fixture spawn inside the grid")
        })
        .collect()
}

/// A standing army for one civilization: a rank of militia with archer
/// support, anchored at a position.
///
/// # Panics
///
/// Panics if the anchor places any unit outside the terrain grid.
pub fn standing_army(sim: &mut Simulation, owner: CivId, anchor: (i32, i32)) -> Vec<EntityId> {
    let (x, y) = anchor;
    let mut ids = spawn_company(
        sim,
        owner,
        &EntityBlueprint::militia(),
        &[(x, y), (x + 30, y), (x + 60, y)],
    );
    ids.extend(spawn_company(
        sim,
        owner,
        &EntityBlueprint::archer(),
        &[(x, y + 30), (x + 60, y + 30)],
    ));
    ids
}
