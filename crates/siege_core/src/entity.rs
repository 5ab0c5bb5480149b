//! Entities: grid-positioned, owned, statted things.
//!
//! One base record plus a kind discriminant (`villager | unit |
//! building | wall`) instead of an inheritance chain. Wall-only state
//! (breach flag, gate, neighbor links) lives in the wall variant's
//! payload, and the "walls don't deactivate at zero hp" rule is one
//! explicit branch in [`Entity::take_damage`], not an override hidden in
//! a subclass.
//!
//! Stats are layered: immutable [`BaseStats`] plus a set of active
//! [`StatModifier`]s, recomputed on demand. Formations add and remove
//! their modifier by source; nothing snapshots-and-restores raw fields.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::combat::DamageType;
use crate::error::{GameError, Result};
use crate::events::{EventQueue, GameEvent};
use crate::formation::FormationId;
use crate::math::{fixed_serde, option_fixed_serde, Fixed, Vec2Fixed};
use crate::pathfinding;
use crate::terrain::TerrainGrid;

/// Unique identifier for entities.
pub type EntityId = u64;

/// Civilization tag; index into the per-civ visibility grids.
pub type CivId = u8;

/// Seconds a dead entity lingers before the registry reaps it.
pub const DEATH_LINGER: Fixed = Fixed::const_from_int(2);

// ============================================================================
// Stats
// ============================================================================

/// Immutable per-entity stat block, set at spawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseStats {
    /// Maximum hit points.
    #[serde(with = "fixed_serde")]
    pub max_hp: Fixed,
    /// Defense rating.
    #[serde(with = "fixed_serde")]
    pub dp: Fixed,
    /// Attack rating.
    #[serde(with = "fixed_serde")]
    pub ar: Fixed,
    /// Damage type dealt, if this entity can attack.
    pub damage_type: Option<DamageType>,
    /// Attack range in world units.
    #[serde(with = "fixed_serde")]
    pub attack_range: Fixed,
    /// Seconds between attacks.
    #[serde(with = "fixed_serde")]
    pub attack_cooldown: Fixed,
    /// Movement speed in world units per second. Zero for structures.
    #[serde(with = "fixed_serde")]
    pub speed: Fixed,
}

impl BaseStats {
    /// Create a stat block with no attack and no movement.
    #[must_use]
    pub fn new(max_hp: Fixed, dp: Fixed) -> Self {
        Self {
            max_hp,
            dp,
            ar: Fixed::ZERO,
            damage_type: None,
            attack_range: Fixed::ZERO,
            attack_cooldown: Fixed::ONE,
            speed: Fixed::ZERO,
        }
    }

    /// Builder method to set the attack profile.
    #[must_use]
    pub fn with_attack(
        mut self,
        ar: Fixed,
        damage_type: Option<DamageType>,
        range: Fixed,
        cooldown: Fixed,
    ) -> Self {
        self.ar = ar;
        self.damage_type = damage_type;
        self.attack_range = range;
        self.attack_cooldown = cooldown;
        self
    }

    /// Builder method to set movement speed.
    #[must_use]
    pub fn with_speed(mut self, speed: Fixed) -> Self {
        self.speed = speed;
        self
    }
}

/// Where a stat modifier came from; used to retract it later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModifierSource {
    /// Formation bonus, keyed by formation id.
    Formation(FormationId),
    /// Technology or ability effect, keyed by effect id.
    Effect(u32),
}

/// One layer of stat changes. Additive fields default to zero,
/// multiplicative factors to one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatModifier {
    /// Who applied this modifier.
    pub source: ModifierSource,
    /// Added to attack rating.
    #[serde(with = "fixed_serde")]
    pub attack_bonus: Fixed,
    /// Added to defense rating.
    #[serde(with = "fixed_serde")]
    pub armor_bonus: Fixed,
    /// Added to attack range.
    #[serde(with = "fixed_serde")]
    pub range_bonus: Fixed,
    /// Multiplies movement speed.
    #[serde(with = "fixed_serde")]
    pub speed_factor: Fixed,
    /// Multiplies attack rate (values above one attack faster).
    #[serde(with = "fixed_serde")]
    pub attack_rate_factor: Fixed,
}

impl StatModifier {
    /// A modifier that changes nothing.
    #[must_use]
    pub fn neutral(source: ModifierSource) -> Self {
        Self {
            source,
            attack_bonus: Fixed::ZERO,
            armor_bonus: Fixed::ZERO,
            range_bonus: Fixed::ZERO,
            speed_factor: Fixed::ONE,
            attack_rate_factor: Fixed::ONE,
        }
    }
}

/// Stats after folding the active modifier set over the base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectiveStats {
    /// Effective attack rating.
    pub ar: Fixed,
    /// Effective defense rating.
    pub dp: Fixed,
    /// Effective attack range.
    pub attack_range: Fixed,
    /// Effective seconds between attacks.
    pub attack_cooldown: Fixed,
    /// Effective movement speed.
    pub speed: Fixed,
}

// ============================================================================
// Kind discriminant
// ============================================================================

/// Gate fitted into a wall segment, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GateState {
    /// Plain wall, no gate.
    #[default]
    None,
    /// Gate present and shut.
    Closed,
    /// Gate present and open; passes the owner's civilization.
    Open,
}

/// Which neighboring tiles hold connected wall segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct WallLinks {
    /// Connected to the north.
    pub n: bool,
    /// Connected to the east.
    pub e: bool,
    /// Connected to the south.
    pub s: bool,
    /// Connected to the west.
    pub w: bool,
}

/// Wall-only state carried in the wall variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct WallState {
    /// True once hp hit zero. A breached wall stays active and present
    /// but passes everyone, modeling a broken barrier rather than a
    /// removed one.
    pub breached: bool,
    /// Gate fitted into this segment.
    pub gate: GateState,
    /// Adjacent connected segments.
    pub connected: WallLinks,
}

/// Building subcategory; drives the view radius.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BuildingClass {
    /// Ordinary production or economy building.
    #[default]
    Standard,
    /// Watch-tower with extended sight.
    WatchTower,
}

/// Entity kind discriminant with variant payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityKind {
    /// Economic unit; gathers, constructs, repairs. Never joins
    /// formations.
    Villager,
    /// Military unit.
    Unit,
    /// Stationary structure.
    Building(BuildingClass),
    /// Wall segment; the one kind that never deactivates at zero hp.
    Wall(WallState),
}

impl EntityKind {
    /// Whether this kind moves at all.
    #[must_use]
    pub const fn is_mobile(&self) -> bool {
        matches!(self, Self::Villager | Self::Unit)
    }

    /// Whether this kind is eligible for formations.
    #[must_use]
    pub const fn is_military_unit(&self) -> bool {
        matches!(self, Self::Unit)
    }

    /// Whether this kind occupies its footprint for movement purposes.
    #[must_use]
    pub const fn is_structure(&self) -> bool {
        matches!(self, Self::Building(_) | Self::Wall(_))
    }
}

// ============================================================================
// State machine
// ============================================================================

/// Behavioral state of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum EntityState {
    /// Doing nothing.
    #[default]
    Idle,
    /// Walking its cached path.
    Moving,
    /// Pursuing and striking a target; falls back to movement while the
    /// target is out of range.
    Attacking {
        /// Entity under attack.
        target: EntityId,
    },
    /// Harvesting from a resource entity.
    Gathering {
        /// Entity gathered from.
        target: EntityId,
    },
    /// Raising a structure under construction.
    Constructing {
        /// Structure being raised.
        target: EntityId,
    },
    /// Restoring a damaged structure.
    Repairing {
        /// Structure being repaired.
        target: EntityId,
    },
    /// Terminal for everything except walls, which breach instead.
    Dead,
}

/// Flat state discriminant for snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum StateTag {
    /// See [`EntityState::Idle`].
    #[default]
    Idle,
    /// See [`EntityState::Moving`].
    Moving,
    /// See [`EntityState::Attacking`].
    Attacking,
    /// See [`EntityState::Gathering`].
    Gathering,
    /// See [`EntityState::Constructing`].
    Constructing,
    /// See [`EntityState::Repairing`].
    Repairing,
    /// See [`EntityState::Dead`].
    Dead,
}

impl EntityState {
    /// Discriminant without payload.
    #[must_use]
    pub const fn tag(&self) -> StateTag {
        match self {
            Self::Idle => StateTag::Idle,
            Self::Moving => StateTag::Moving,
            Self::Attacking { .. } => StateTag::Attacking,
            Self::Gathering { .. } => StateTag::Gathering,
            Self::Constructing { .. } => StateTag::Constructing,
            Self::Repairing { .. } => StateTag::Repairing,
            Self::Dead => StateTag::Dead,
        }
    }
}

// ============================================================================
// Entity
// ============================================================================

/// One simulated entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Unique, immutable id.
    pub id: EntityId,
    /// Owning civilization.
    pub owner: CivId,
    /// Kind discriminant with variant payload.
    pub kind: EntityKind,
    /// World position (fractional).
    pub position: Vec2Fixed,
    /// Footprint width in tiles.
    pub width: u8,
    /// Footprint height in tiles.
    pub height: u8,
    /// Current hit points, always in `[0, max_hp]`.
    #[serde(with = "fixed_serde")]
    pub hp: Fixed,
    /// Immutable stat block.
    pub base: BaseStats,
    /// Active stat modifier layers.
    modifiers: Vec<StatModifier>,
    /// Behavioral state.
    pub state: EntityState,
    /// Cached path waypoints, if moving.
    pub path: Option<Vec<Vec2Fixed>>,
    /// Index of the next waypoint to consume.
    pub path_index: usize,
    /// Back-reference to the owning formation, if any.
    pub formation: Option<FormationId>,
    /// False once dead (walls excepted; they breach instead).
    pub active: bool,
    /// Seconds until the next attack is allowed.
    #[serde(with = "fixed_serde")]
    pub cooldown: Fixed,
    /// Formation speed cap while speed matching is in force.
    #[serde(with = "option_fixed_serde")]
    pub speed_cap: Option<Fixed>,
    /// Countdown to reaping once dead.
    #[serde(with = "option_fixed_serde")]
    death_timer: Option<Fixed>,
}

impl Entity {
    /// Create an entity at a position with the given stat block.
    ///
    /// Footprint defaults to 1x1; structures set it via
    /// [`with_footprint`](Self::with_footprint).
    #[must_use]
    pub fn new(id: EntityId, owner: CivId, kind: EntityKind, position: Vec2Fixed, base: BaseStats) -> Self {
        Self {
            id,
            owner,
            kind,
            position,
            width: 1,
            height: 1,
            hp: base.max_hp,
            base,
            modifiers: Vec::new(),
            state: EntityState::Idle,
            path: None,
            path_index: 0,
            formation: None,
            active: true,
            cooldown: Fixed::ZERO,
            speed_cap: None,
            death_timer: None,
        }
    }

    /// Builder method to set the tile footprint.
    #[must_use]
    pub fn with_footprint(mut self, width: u8, height: u8) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Maximum hit points.
    #[must_use]
    pub fn max_hp(&self) -> Fixed {
        self.base.max_hp
    }

    /// The tile this entity's anchor stands on.
    #[must_use]
    pub fn tile(&self, grid: &TerrainGrid) -> Option<(u32, u32)> {
        grid.world_to_grid(self.position)
    }

    /// Sight radius in tiles, keyed by entity category.
    #[must_use]
    pub fn view_radius(&self) -> u32 {
        match self.kind {
            EntityKind::Villager | EntityKind::Unit => 4,
            EntityKind::Building(BuildingClass::Standard) => 5,
            EntityKind::Building(BuildingClass::WatchTower) => 8,
            EntityKind::Wall(_) => 3,
        }
    }

    /// Whether the wall variant has been breached.
    #[must_use]
    pub fn is_breached(&self) -> bool {
        matches!(self.kind, EntityKind::Wall(ws) if ws.breached)
    }

    /// Whether a unit of the given civilization may walk through this
    /// entity's tiles.
    ///
    /// Units never block. Buildings block everyone. Walls block unless
    /// breached, or unless an open gate admits the owner's civilization.
    #[must_use]
    pub fn can_pass(&self, civ: CivId) -> bool {
        match self.kind {
            EntityKind::Villager | EntityKind::Unit => true,
            EntityKind::Building(_) => false,
            EntityKind::Wall(ws) => {
                ws.breached || (ws.gate == GateState::Open && civ == self.owner)
            }
        }
    }

    /// Whether this entity's footprint covers the given tile.
    #[must_use]
    pub fn covers_tile(&self, grid: &TerrainGrid, x: u32, y: u32) -> bool {
        let Some((ax, ay)) = self.tile(grid) else {
            return false;
        };
        x >= ax && x < ax + u32::from(self.width) && y >= ay && y < ay + u32::from(self.height)
    }

    // ------------------------------------------------------------------
    // Layered stats
    // ------------------------------------------------------------------

    /// Fold the active modifier set over the base stats.
    #[must_use]
    pub fn effective(&self) -> EffectiveStats {
        let mut ar = self.base.ar;
        let mut dp = self.base.dp;
        let mut range = self.base.attack_range;
        let mut speed_factor = Fixed::ONE;
        let mut rate_factor = Fixed::ONE;

        for modifier in &self.modifiers {
            ar += modifier.attack_bonus;
            dp += modifier.armor_bonus;
            range += modifier.range_bonus;
            speed_factor *= modifier.speed_factor;
            rate_factor *= modifier.attack_rate_factor;
        }

        let cooldown = if rate_factor > Fixed::ZERO {
            self.base.attack_cooldown / rate_factor
        } else {
            self.base.attack_cooldown
        };

        EffectiveStats {
            ar,
            dp,
            attack_range: range,
            attack_cooldown: cooldown,
            speed: self.base.speed * speed_factor,
        }
    }

    /// Movement speed after modifiers and any formation speed cap.
    #[must_use]
    pub fn effective_speed(&self) -> Fixed {
        let speed = self.effective().speed;
        match self.speed_cap {
            Some(cap) => speed.min(cap),
            None => speed,
        }
    }

    /// Add a modifier layer.
    pub fn add_modifier(&mut self, modifier: StatModifier) {
        self.modifiers.push(modifier);
    }

    /// Remove every modifier layer applied by `source`.
    pub fn remove_modifiers(&mut self, source: ModifierSource) {
        self.modifiers.retain(|m| m.source != source);
    }

    /// Whether any modifier from `source` is active.
    #[must_use]
    pub fn has_modifier(&self, source: ModifierSource) -> bool {
        self.modifiers.iter().any(|m| m.source == source)
    }

    // ------------------------------------------------------------------
    // Orders
    // ------------------------------------------------------------------

    /// Compute and cache a path toward a world position without touching
    /// the behavioral state. Returns `false` when no route exists; the
    /// entity keeps its previous path and state.
    pub fn set_path_to(&mut self, grid: &TerrainGrid, target: Vec2Fixed) -> bool {
        if !self.active || !self.kind.is_mobile() {
            return false;
        }

        let path = pathfinding::find_path(grid, self.position, target);
        if path.is_empty() {
            tracing::debug!(entity = self.id, "move order dropped: no route");
            return false;
        }

        // Skip waypoint 0 when it is the tile we already stand on.
        let own_tile = grid.world_to_grid(self.position);
        let first_tile = grid.world_to_grid(path[0]);
        self.path_index = usize::from(own_tile == first_tile && own_tile.is_some());
        self.path = Some(path);
        true
    }

    /// Order a move to a world position.
    ///
    /// On success the entity enters `Moving` with a fresh path,
    /// replacing any route it was already walking. On failure (no route)
    /// it keeps its prior state; this is a recoverable condition, not an
    /// error.
    pub fn move_to(&mut self, grid: &TerrainGrid, target: Vec2Fixed, events: &mut EventQueue) -> bool {
        if !self.set_path_to(grid, target) {
            return false;
        }
        self.state = EntityState::Moving;
        events.publish(GameEvent::MoveStarted { entity: self.id });
        true
    }

    /// Order an attack on another entity. The range check and pursuit
    /// happen tick by tick in the simulation sweep.
    pub fn order_attack(&mut self, target: EntityId) -> bool {
        if !self.active || self.base.ar <= Fixed::ZERO || target == self.id {
            return false;
        }
        self.state = EntityState::Attacking { target };
        true
    }

    /// Order a villager to gather from a source entity.
    pub fn order_gather(&mut self, target: EntityId) -> bool {
        if !self.active || !matches!(self.kind, EntityKind::Villager) {
            return false;
        }
        self.state = EntityState::Gathering { target };
        true
    }

    /// Order a villager to construct a structure.
    pub fn order_construct(&mut self, target: EntityId) -> bool {
        if !self.active || !matches!(self.kind, EntityKind::Villager) {
            return false;
        }
        self.state = EntityState::Constructing { target };
        true
    }

    /// Order a villager to repair a structure.
    pub fn order_repair(&mut self, target: EntityId) -> bool {
        if !self.active || !matches!(self.kind, EntityKind::Villager) {
            return false;
        }
        self.state = EntityState::Repairing { target };
        true
    }

    /// Drop back to idle, clearing any cached path.
    pub fn stop(&mut self) {
        if self.state != EntityState::Dead {
            self.state = EntityState::Idle;
        }
        self.path = None;
        self.path_index = 0;
    }

    // ------------------------------------------------------------------
    // Per-tick pieces (driven by the simulation sweep)
    // ------------------------------------------------------------------

    /// Walk the cached path by `speed * dt`. Within one step of the next
    /// waypoint the entity snaps onto it and the index advances. Returns
    /// `true` once the path is fully consumed.
    pub fn advance_along_path(&mut self, dt: Fixed) -> bool {
        let Some(path) = &self.path else {
            return true;
        };
        if self.path_index >= path.len() {
            return true;
        }

        let waypoint = path[self.path_index];
        let step = self.effective_speed() * dt;
        let to_waypoint = waypoint - self.position;
        let dist = to_waypoint.length();

        if dist <= step {
            self.position = waypoint;
            self.path_index += 1;
        } else if step > Fixed::ZERO {
            self.position = self.position + to_waypoint.normalize().scale(step);
        }

        self.path_index >= path.len()
    }

    /// One tick of the `Moving` state.
    pub fn tick_move(&mut self, dt: Fixed, events: &mut EventQueue) {
        if self.advance_along_path(dt) {
            self.path = None;
            self.path_index = 0;
            self.state = EntityState::Idle;
            events.publish(GameEvent::MoveEnded { entity: self.id });
        }
    }

    /// Count the attack cooldown down.
    pub fn tick_cooldown(&mut self, dt: Fixed) {
        if self.cooldown > Fixed::ZERO {
            self.cooldown = (self.cooldown - dt).max(Fixed::ZERO);
        }
    }

    /// Count the death linger down. Returns `true` when the corpse
    /// should be reaped.
    pub fn tick_death(&mut self, dt: Fixed) -> bool {
        match self.death_timer.as_mut() {
            Some(timer) => {
                *timer -= dt;
                *timer <= Fixed::ZERO
            }
            None => false,
        }
    }

    // ------------------------------------------------------------------
    // Damage
    // ------------------------------------------------------------------

    /// Apply damage, clamping hp to `[0, max_hp]`.
    ///
    /// At zero hp a unit or building deactivates and goes `Dead`; a wall
    /// instead flips its breach flag and stays active and present, now
    /// passable to everyone.
    pub fn take_damage(
        &mut self,
        amount: Fixed,
        attacker: Option<EntityId>,
        damage_type: Option<DamageType>,
        events: &mut EventQueue,
    ) {
        if self.state == EntityState::Dead || self.is_breached() {
            return;
        }

        let amount = amount.max(Fixed::ZERO);
        let applied = amount.min(self.hp);
        self.hp = (self.hp - amount).clamp(Fixed::ZERO, self.base.max_hp);

        events.publish(GameEvent::Damaged {
            attacker,
            target: self.id,
            amount: applied,
            damage_type,
        });

        if self.hp > Fixed::ZERO {
            return;
        }

        match &mut self.kind {
            EntityKind::Wall(wall) => {
                wall.breached = true;
                self.state = EntityState::Idle;
                self.path = None;
                tracing::debug!(entity = self.id, "wall breached");
                events.publish(GameEvent::WallBreached { entity: self.id });
            }
            _ => {
                self.active = false;
                self.state = EntityState::Dead;
                self.path = None;
                self.death_timer = Some(DEATH_LINGER);
                tracing::debug!(entity = self.id, "entity died");
                events.publish(GameEvent::Died { entity: self.id });
            }
        }
    }

    /// Restore hp (construction/repair). Returns the amount actually
    /// applied. Repairing a breached wall above zero hp mends the
    /// breach.
    pub fn heal(&mut self, amount: Fixed) -> Fixed {
        if self.state == EntityState::Dead {
            return Fixed::ZERO;
        }

        let amount = amount.max(Fixed::ZERO);
        let headroom = self.base.max_hp - self.hp;
        let applied = amount.min(headroom);
        self.hp += applied;

        if self.hp > Fixed::ZERO {
            if let EntityKind::Wall(wall) = &mut self.kind {
                wall.breached = false;
            }
        }

        applied
    }

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    /// Produce the flat snapshot record.
    #[must_use]
    pub fn snapshot(&self) -> EntitySnapshot {
        let mut attributes = BTreeMap::new();
        let mut tags = Vec::new();

        match self.kind {
            EntityKind::Villager => tags.push("villager".to_owned()),
            EntityKind::Unit => tags.push("military".to_owned()),
            EntityKind::Building(class) => {
                tags.push("building".to_owned());
                if class == BuildingClass::WatchTower {
                    tags.push("watchtower".to_owned());
                }
            }
            EntityKind::Wall(wall) => {
                tags.push("wall".to_owned());
                if wall.breached {
                    tags.push("breached".to_owned());
                }
                let gate = match wall.gate {
                    GateState::None => "none",
                    GateState::Closed => "closed",
                    GateState::Open => "open",
                };
                attributes.insert("gate".to_owned(), gate.to_owned());
            }
        }

        EntitySnapshot {
            id: self.id,
            kind: self.kind,
            owner: self.owner,
            x: self.position.x,
            y: self.position.y,
            width: self.width,
            height: self.height,
            hp: self.hp,
            max_hp: self.base.max_hp,
            dp: self.base.dp,
            ar: self.base.ar,
            state: self.state.tag(),
            active: self.active,
            attributes,
            tags,
        }
    }

    /// Rebuild an entity from a snapshot.
    ///
    /// Paths, targets, and formation membership are transient and do not
    /// survive a snapshot: live states other than `Dead` restore as
    /// `Idle`.
    pub fn restore(snapshot: &EntitySnapshot, base: BaseStats) -> Result<Self> {
        if snapshot.hp > snapshot.max_hp || snapshot.hp < Fixed::ZERO {
            return Err(GameError::InvalidSnapshot(format!(
                "hp {} outside [0, {}]",
                snapshot.hp, snapshot.max_hp
            )));
        }
        if base.max_hp != snapshot.max_hp {
            return Err(GameError::InvalidSnapshot(
                "stat block does not match snapshot".to_owned(),
            ));
        }

        let mut entity = Self::new(
            snapshot.id,
            snapshot.owner,
            snapshot.kind,
            Vec2Fixed::new(snapshot.x, snapshot.y),
            base,
        )
        .with_footprint(snapshot.width, snapshot.height);

        entity.hp = snapshot.hp;
        entity.active = snapshot.active;
        entity.state = if snapshot.state == StateTag::Dead {
            EntityState::Dead
        } else {
            EntityState::Idle
        };
        if entity.state == EntityState::Dead {
            entity.death_timer = Some(DEATH_LINGER);
        }

        Ok(entity)
    }
}

/// Flat record for in-memory snapshotting, per the external contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    /// Entity id.
    pub id: EntityId,
    /// Kind discriminant (with wall payload).
    pub kind: EntityKind,
    /// Owning civilization.
    pub owner: CivId,
    /// World x.
    #[serde(with = "fixed_serde")]
    pub x: Fixed,
    /// World y.
    #[serde(with = "fixed_serde")]
    pub y: Fixed,
    /// Footprint width in tiles.
    pub width: u8,
    /// Footprint height in tiles.
    pub height: u8,
    /// Current hp.
    #[serde(with = "fixed_serde")]
    pub hp: Fixed,
    /// Maximum hp.
    #[serde(with = "fixed_serde")]
    pub max_hp: Fixed,
    /// Base defense rating.
    #[serde(with = "fixed_serde")]
    pub dp: Fixed,
    /// Base attack rating.
    #[serde(with = "fixed_serde")]
    pub ar: Fixed,
    /// Behavioral state discriminant.
    pub state: StateTag,
    /// Whether the entity is live.
    pub active: bool,
    /// Free-form string attributes (gate state and the like).
    pub attributes: BTreeMap<String, String>,
    /// Classification tags.
    pub tags: Vec<String>,
}

// ============================================================================
// Blueprints
// ============================================================================

/// Named stat bundle for the factory variants. World-unit values assume
/// the default 32-unit tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityBlueprint {
    /// Kind the blueprint spawns.
    pub kind: EntityKind,
    /// Stat block.
    pub base: BaseStats,
    /// Footprint width in tiles.
    pub width: u8,
    /// Footprint height in tiles.
    pub height: u8,
}

impl EntityBlueprint {
    fn fixed(n: i32) -> Fixed {
        Fixed::from_num(n)
    }

    /// Economic unit.
    #[must_use]
    pub fn villager() -> Self {
        Self {
            kind: EntityKind::Villager,
            base: BaseStats::new(Self::fixed(25), Self::fixed(0))
                .with_attack(Self::fixed(3), None, Self::fixed(40), Self::fixed(2))
                .with_speed(Self::fixed(48)),
            width: 1,
            height: 1,
        }
    }

    /// Sword infantry, slashing melee.
    #[must_use]
    pub fn militia() -> Self {
        Self {
            kind: EntityKind::Unit,
            base: BaseStats::new(Self::fixed(60), Self::fixed(10))
                .with_attack(
                    Self::fixed(10),
                    Some(DamageType::Slashing),
                    Self::fixed(40),
                    Fixed::lit("1.5"),
                )
                .with_speed(Self::fixed(56)),
            width: 1,
            height: 1,
        }
    }

    /// Ranged infantry, piercing.
    #[must_use]
    pub fn archer() -> Self {
        Self {
            kind: EntityKind::Unit,
            base: BaseStats::new(Self::fixed(40), Self::fixed(5))
                .with_attack(
                    Self::fixed(8),
                    Some(DamageType::Piercing),
                    Self::fixed(160),
                    Self::fixed(2),
                )
                .with_speed(Self::fixed(52)),
            width: 1,
            height: 1,
        }
    }

    /// Siege ram, blunt, slow, tough.
    #[must_use]
    pub fn ram() -> Self {
        Self {
            kind: EntityKind::Unit,
            base: BaseStats::new(Self::fixed(200), Self::fixed(30))
                .with_attack(
                    Self::fixed(25),
                    Some(DamageType::Blunt),
                    Self::fixed(40),
                    Self::fixed(3),
                )
                .with_speed(Self::fixed(24)),
            width: 1,
            height: 1,
        }
    }

    /// Ordinary 2x2 building.
    #[must_use]
    pub fn house() -> Self {
        Self {
            kind: EntityKind::Building(BuildingClass::Standard),
            base: BaseStats::new(Self::fixed(300), Self::fixed(20)),
            width: 2,
            height: 2,
        }
    }

    /// Watch-tower with extended sight and a piercing attack.
    #[must_use]
    pub fn watchtower() -> Self {
        Self {
            kind: EntityKind::Building(BuildingClass::WatchTower),
            base: BaseStats::new(Self::fixed(250), Self::fixed(25)).with_attack(
                Self::fixed(12),
                Some(DamageType::Piercing),
                Self::fixed(224),
                Self::fixed(2),
            ),
            width: 1,
            height: 1,
        }
    }

    /// Plain wall segment.
    #[must_use]
    pub fn wall() -> Self {
        Self {
            kind: EntityKind::Wall(WallState::default()),
            base: BaseStats::new(Self::fixed(400), Self::fixed(40)),
            width: 1,
            height: 1,
        }
    }

    /// Wall segment fitted with a closed gate.
    #[must_use]
    pub fn gate() -> Self {
        Self {
            kind: EntityKind::Wall(WallState {
                breached: false,
                gate: GateState::Closed,
                connected: WallLinks::default(),
            }),
            base: BaseStats::new(Self::fixed(350), Self::fixed(40)),
            width: 1,
            height: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(n: i32) -> Fixed {
        Fixed::from_num(n)
    }

    fn soldier(id: EntityId) -> Entity {
        let bp = EntityBlueprint::militia();
        Entity::new(id, 0, bp.kind, Vec2Fixed::ZERO, bp.base)
    }

    fn wall(id: EntityId) -> Entity {
        let bp = EntityBlueprint::wall();
        Entity::new(id, 0, bp.kind, Vec2Fixed::ZERO, bp.base)
    }

    #[test]
    fn test_damage_clamps_to_zero() {
        let mut events = EventQueue::new();
        let mut unit = soldier(1);

        unit.take_damage(fixed(1_000_000), Some(2), None, &mut events);

        assert_eq!(unit.hp, Fixed::ZERO);
        assert!(!unit.active);
        assert_eq!(unit.state, EntityState::Dead);
    }

    #[test]
    fn test_heal_clamps_to_max() {
        let mut events = EventQueue::new();
        let mut unit = soldier(1);

        unit.take_damage(fixed(20), None, None, &mut events);
        let applied = unit.heal(fixed(1000));
        assert_eq!(applied, fixed(20));
        assert_eq!(unit.hp, unit.max_hp());
    }

    #[test]
    fn test_wall_breaches_instead_of_dying() {
        let mut events = EventQueue::new();
        let mut segment = wall(7);
        assert!(!segment.can_pass(1));

        segment.take_damage(fixed(9999), Some(2), None, &mut events);

        assert!(segment.active, "breached wall must stay active");
        assert!(segment.is_breached());
        assert_eq!(segment.hp, Fixed::ZERO);
        // Breached walls pass everyone, friend and foe.
        assert!(segment.can_pass(0));
        assert!(segment.can_pass(1));

        let drained = events.drain();
        assert!(drained.contains(&GameEvent::WallBreached { entity: 7 }));
        assert!(!drained.iter().any(|e| matches!(e, GameEvent::Died { .. })));
    }

    #[test]
    fn test_repairing_wall_mends_breach() {
        let mut events = EventQueue::new();
        let mut segment = wall(7);
        segment.take_damage(fixed(9999), None, None, &mut events);
        assert!(segment.is_breached());

        segment.heal(fixed(50));
        assert!(!segment.is_breached());
        assert!(!segment.can_pass(1));
    }

    #[test]
    fn test_open_gate_passes_owner_only() {
        let bp = EntityBlueprint::gate();
        let mut gate = Entity::new(3, 0, bp.kind, Vec2Fixed::ZERO, bp.base);

        assert!(!gate.can_pass(0));
        if let EntityKind::Wall(ws) = &mut gate.kind {
            ws.gate = GateState::Open;
        }
        assert!(gate.can_pass(0));
        assert!(!gate.can_pass(1));
    }

    #[test]
    fn test_modifier_apply_and_revert_is_identity() {
        let mut unit = soldier(1);
        let before = unit.effective();

        let mut modifier = StatModifier::neutral(ModifierSource::Formation(9));
        modifier.attack_bonus = fixed(3);
        modifier.armor_bonus = fixed(2);
        modifier.speed_factor = Fixed::lit("0.9");
        unit.add_modifier(modifier);

        let boosted = unit.effective();
        assert_eq!(boosted.ar, before.ar + fixed(3));
        assert_eq!(boosted.dp, before.dp + fixed(2));
        assert!(boosted.speed < before.speed);

        unit.remove_modifiers(ModifierSource::Formation(9));
        assert_eq!(unit.effective(), before);
    }

    #[test]
    fn test_attack_rate_factor_shortens_cooldown() {
        let mut unit = soldier(1);
        let mut modifier = StatModifier::neutral(ModifierSource::Effect(1));
        modifier.attack_rate_factor = fixed(2);
        unit.add_modifier(modifier);

        assert_eq!(
            unit.effective().attack_cooldown,
            unit.base.attack_cooldown / fixed(2)
        );
    }

    #[test]
    fn test_move_to_failure_keeps_state() {
        let mut events = EventQueue::new();
        let mut grid = TerrainGrid::new(8, 8, fixed(1));
        for y in 0..8 {
            grid.set_terrain(4, y, crate::terrain::TerrainType::Water);
        }

        let mut unit = soldier(1);
        unit.position = Vec2Fixed::new(Fixed::lit("1.5"), Fixed::lit("1.5"));
        unit.state = EntityState::Attacking { target: 42 };

        let ok = unit.move_to(&grid, Vec2Fixed::new(Fixed::lit("6.5"), Fixed::lit("1.5")), &mut events);

        assert!(!ok);
        assert_eq!(unit.state, EntityState::Attacking { target: 42 });
        assert!(unit.path.is_none());
        assert!(events.is_empty());
    }

    #[test]
    fn test_move_skips_own_tile_waypoint() {
        let mut events = EventQueue::new();
        let grid = TerrainGrid::new(8, 8, fixed(1));

        let mut unit = soldier(1);
        unit.position = Vec2Fixed::new(Fixed::lit("1.5"), Fixed::lit("1.5"));

        assert!(unit.move_to(&grid, Vec2Fixed::new(Fixed::lit("4.5"), Fixed::lit("1.5")), &mut events));
        assert_eq!(unit.state, EntityState::Moving);
        assert_eq!(unit.path_index, 1, "own-tile waypoint must be skipped");
    }

    #[test]
    fn test_movement_consumes_waypoints_and_idles() {
        let mut events = EventQueue::new();
        let grid = TerrainGrid::new(8, 8, fixed(1));

        let mut unit = soldier(1);
        unit.base.speed = fixed(1); // one tile per second
        unit.position = grid.grid_to_world(1, 1);

        assert!(unit.move_to(&grid, grid.grid_to_world(3, 1), &mut events));

        // Two one-second ticks cover the two remaining waypoints.
        unit.tick_move(Fixed::ONE, &mut events);
        assert_eq!(unit.state, EntityState::Moving);
        unit.tick_move(Fixed::ONE, &mut events);

        assert_eq!(unit.state, EntityState::Idle);
        assert!(unit.path.is_none());
        assert_eq!(unit.position, grid.grid_to_world(3, 1));

        let drained = events.drain();
        assert!(drained.contains(&GameEvent::MoveEnded { entity: 1 }));
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut unit = soldier(5);
        unit.position = Vec2Fixed::new(Fixed::lit("3.25"), Fixed::lit("7.5"));
        unit.hp = fixed(33);

        let snapshot = unit.snapshot();
        let restored = Entity::restore(&snapshot, unit.base).unwrap();

        assert_eq!(restored.id, 5);
        assert_eq!(restored.position, unit.position);
        assert_eq!(restored.hp, fixed(33));
        assert_eq!(restored.kind, unit.kind);
        assert!(restored.active);
    }

    #[test]
    fn test_snapshot_serializes_exact_bits() {
        let mut unit = soldier(9);
        unit.position = Vec2Fixed::new(Fixed::lit("12.125"), Fixed::lit("0.0625"));
        unit.hp = Fixed::lit("33.5");

        let json = serde_json::to_string(&unit.snapshot()).unwrap();
        let parsed: EntitySnapshot = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed, unit.snapshot());
        assert_eq!(parsed.x, Fixed::lit("12.125"));
        assert_eq!(parsed.hp, Fixed::lit("33.5"));
    }

    #[test]
    fn test_snapshot_rejects_bad_hp() {
        let unit = soldier(5);
        let mut snapshot = unit.snapshot();
        snapshot.hp = snapshot.max_hp + Fixed::ONE;

        assert!(Entity::restore(&snapshot, unit.base).is_err());
    }

    #[test]
    fn test_snapshot_tags_wall_breach() {
        let mut events = EventQueue::new();
        let mut segment = wall(2);
        segment.take_damage(fixed(9999), None, None, &mut events);

        let snapshot = segment.snapshot();
        assert!(snapshot.tags.contains(&"breached".to_owned()));
        assert!(snapshot.active);
    }

    #[test]
    fn test_villager_only_orders() {
        let mut unit = soldier(1);
        assert!(!unit.order_gather(2));
        assert!(!unit.order_construct(2));

        let bp = EntityBlueprint::villager();
        let mut villager = Entity::new(2, 0, bp.kind, Vec2Fixed::ZERO, bp.base);
        assert!(villager.order_gather(3));
        assert_eq!(villager.state, EntityState::Gathering { target: 3 });
    }
}
