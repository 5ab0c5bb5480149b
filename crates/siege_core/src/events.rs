//! Typed event channel for state transitions.
//!
//! Subsystems publish onto one queue owned by the simulation; the
//! embedding layer (renderer, UI, AI, resource ledger) drains it once
//! per frame. This replaces per-entity callback arrays with one message
//! stream.

use crate::combat::DamageType;
use crate::entity::EntityId;
use crate::formation::FormationId;
use crate::math::Fixed;

/// A state transition worth telling collaborators about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEvent {
    /// An entity accepted a move order and started walking.
    MoveStarted {
        /// The moving entity.
        entity: EntityId,
    },
    /// An entity consumed its last waypoint.
    MoveEnded {
        /// The entity that arrived.
        entity: EntityId,
    },
    /// Damage was applied to an entity.
    Damaged {
        /// Attacking entity, when the damage came from combat.
        attacker: Option<EntityId>,
        /// Entity that took the damage.
        target: EntityId,
        /// Amount actually applied after clamping.
        amount: Fixed,
        /// Damage type, if typed.
        damage_type: Option<DamageType>,
    },
    /// An entity dropped to zero hp and deactivated.
    Died {
        /// The dead entity.
        entity: EntityId,
    },
    /// A wall dropped to zero hp; it stays active but is now passable.
    WallBreached {
        /// The breached wall.
        entity: EntityId,
    },
    /// A gathering tick completed; the resource ledger applies the yield.
    ResourceGathered {
        /// Gathering entity.
        entity: EntityId,
        /// Source entity gathered from.
        source: EntityId,
        /// Yield of this tick.
        amount: Fixed,
    },
    /// A construction or repair tick restored hp on the target.
    ConstructionProgressed {
        /// Building or repairing entity.
        builder: EntityId,
        /// Entity whose hp was restored.
        target: EntityId,
        /// Hp restored this tick.
        amount: Fixed,
    },
    /// A formation came into existence.
    FormationCreated {
        /// The new formation.
        formation: FormationId,
    },
    /// A formation emptied or was disbanded; member stats are restored.
    FormationDisbanded {
        /// The removed formation.
        formation: FormationId,
    },
}

/// FIFO queue of [`GameEvent`]s for one update sweep.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: Vec<GameEvent>,
}

impl EventQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish one event.
    pub fn publish(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    /// Number of pending events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether any events are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Iterate pending events without consuming them.
    pub fn iter(&self) -> impl Iterator<Item = &GameEvent> {
        self.events.iter()
    }

    /// Remove and return all pending events in publish order.
    pub fn drain(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_and_drain_in_order() {
        let mut queue = EventQueue::new();
        queue.publish(GameEvent::MoveStarted { entity: 1 });
        queue.publish(GameEvent::MoveEnded { entity: 1 });

        assert_eq!(queue.len(), 2);
        let drained = queue.drain();
        assert_eq!(
            drained,
            vec![
                GameEvent::MoveStarted { entity: 1 },
                GameEvent::MoveEnded { entity: 1 },
            ]
        );
        assert!(queue.is_empty());
    }
}
