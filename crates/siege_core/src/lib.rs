//! # Siege Core
//!
//! Deterministic real-time-strategy simulation core: entities with a
//! behavioral state machine, grid pathfinding, dual-layer fog of war,
//! military formations, and typed-damage combat, all advanced from one
//! single-threaded `update(dt)` call.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No IO
//! - No system randomness
//! - No floating-point math (uses fixed-point)
//!
//! This separation enables:
//! - Lockstep multiplayer (identical simulation across clients)
//! - Headless server builds
//! - Replay systems
//! - Determinism testing
//!
//! ## Crate Structure
//!
//! - [`entity`] - Entity records, stats, and the state machine
//! - [`combat`] - Stateless typed-damage resolution
//! - [`formation`] - Formation shapes, bonuses, and movement
//! - [`pathfinding`] - A* over the terrain grid
//! - [`visibility`] - Per-civilization fog of war
//! - [`terrain`] - Tile grid and movement costs
//! - [`events`] - Typed event channel out of the simulation
//! - [`sim`] - The update loop tying it all together
//! - [`math`] - Fixed-point math utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod combat;
pub mod entity;
pub mod error;
pub mod events;
pub mod formation;
pub mod math;
pub mod pathfinding;
pub mod sim;
pub mod terrain;
pub mod visibility;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::combat::{resolve_damage, DamageType};
    pub use crate::entity::{
        BaseStats, BuildingClass, CivId, Entity, EntityBlueprint, EntityId, EntityKind,
        EntitySnapshot, EntityState, GateState, StatModifier, WallState,
    };
    pub use crate::error::{GameError, Result};
    pub use crate::events::{EventQueue, GameEvent};
    pub use crate::formation::{
        Facing, Formation, FormationId, FormationManager, FormationType,
    };
    pub use crate::math::{Fixed, Vec2Fixed};
    pub use crate::pathfinding::find_path;
    pub use crate::sim::{EntityStorage, Simulation};
    pub use crate::terrain::{TerrainGrid, TerrainType, Tile};
    pub use crate::visibility::{VisLevel, VisibilityField};
}
