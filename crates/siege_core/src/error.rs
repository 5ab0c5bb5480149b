//! Error types for the simulation core.
//!
//! Recoverable in-game conditions (no route, invalid target, unknown
//! formation type) are not errors; they surface as empty paths, booleans,
//! or no-ops. [`GameError`] covers misuse of the API surface itself.

use thiserror::Error;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for simulation API misuse.
#[derive(Debug, Error)]
pub enum GameError {
    /// Entity lookup failed.
    #[error("Entity not found: {0}")]
    EntityNotFound(u64),

    /// Formation lookup failed.
    #[error("Formation not found: {0}")]
    FormationNotFound(u32),

    /// A world position fell outside the terrain grid.
    #[error("Position ({x}, {y}) outside the map")]
    OutOfBounds {
        /// World x coordinate.
        x: i64,
        /// World y coordinate.
        y: i64,
    },

    /// A snapshot could not be restored.
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),
}
