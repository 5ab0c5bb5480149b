//! Military formations.
//!
//! A formation is a set of military units with a shape, a facing, and a
//! stat modifier layer. Shapes are computed in a formation-local frame
//! (forward, right) and rotated into the world by the cardinal facing,
//! so layout math stays exact in fixed point. The circle and scatter
//! shapes are the only ones that reach for the trig approximations in
//! [`crate::math`].
//!
//! Joining a formation pushes one [`StatModifier`] layer keyed by the
//! formation id; leaving pops it. Nothing edits unit stats in place.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::entity::{CivId, EntityId, EntityKind, EntityState, ModifierSource, StatModifier};
use crate::events::{EventQueue, GameEvent};
use crate::math::{fixed_cos, fixed_serde, fixed_sin, fixed_sqrt, Fixed, Vec2Fixed, PI, TAU};
use crate::sim::EntityStorage;
use crate::terrain::TerrainGrid;

/// Unique identifier for formations.
pub type FormationId = u32;

/// Base distance between formation slots, in world units.
pub const UNIT_SPACING: Fixed = Fixed::const_from_int(24);

/// A formation counts as arrived when its centroid is within this many
/// world units of the ordered target.
pub const ARRIVAL_TOLERANCE: Fixed = Fixed::const_from_int(10);

/// Skirmish formations watch for enemies inside this radius.
pub const SKIRMISH_SCAN_RANGE: Fixed = Fixed::const_from_int(150);

/// How far a skirmish formation falls back per retreat order.
pub const RETREAT_DISTANCE: Fixed = Fixed::const_from_int(80);

/// Golden angle in radians, used by the scatter spiral.
const GOLDEN_ANGLE: Fixed = Fixed::lit("2.39996322972865");

/// The eight formation shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum FormationType {
    /// One rank abreast. Defensive frontage.
    #[default]
    Line,
    /// Single file. Fast on the march.
    Column,
    /// Arrowhead behind a lead unit. Shock attack.
    Wedge,
    /// Solid block, edges facing outward. All-round defense.
    Square,
    /// Ring facing outward.
    Circle,
    /// Loose spiral spread. Hard to hit with volleys.
    Scatter,
    /// Two staggered ranks that fall back from approaching enemies.
    Skirmish,
    /// Brick-pattern ranks, each offset half a slot.
    Staggered,
}

impl FormationType {
    /// Parse a shape name. Unknown names fall back to [`Self::Line`].
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "line" => Self::Line,
            "column" => Self::Column,
            "wedge" => Self::Wedge,
            "square" => Self::Square,
            "circle" => Self::Circle,
            "scatter" => Self::Scatter,
            "skirmish" => Self::Skirmish,
            "staggered" => Self::Staggered,
            other => {
                tracing::warn!(name = other, "unknown formation type, using line");
                Self::Line
            }
        }
    }

    /// Stat and layout profile for this shape.
    #[must_use]
    pub fn profile(self) -> FormationProfile {
        match self {
            Self::Line => FormationProfile {
                armor_bonus: Fixed::const_from_int(2),
                ..FormationProfile::default()
            },
            Self::Column => FormationProfile {
                speed_factor: Fixed::lit("1.1"),
                default_facing: Facing::North,
                ..FormationProfile::default()
            },
            Self::Wedge => FormationProfile {
                attack_bonus: Fixed::const_from_int(3),
                ..FormationProfile::default()
            },
            Self::Square => FormationProfile {
                armor_bonus: Fixed::const_from_int(4),
                speed_factor: Fixed::lit("0.9"),
                ..FormationProfile::default()
            },
            Self::Circle => FormationProfile {
                armor_bonus: Fixed::const_from_int(3),
                ..FormationProfile::default()
            },
            Self::Scatter => FormationProfile {
                speed_factor: Fixed::lit("1.05"),
                spacing: Fixed::lit("1.5"),
                ..FormationProfile::default()
            },
            Self::Skirmish => FormationProfile {
                attack_rate_factor: Fixed::lit("1.1"),
                spacing: Fixed::lit("1.2"),
                retreat_when_closed: true,
                ..FormationProfile::default()
            },
            Self::Staggered => FormationProfile {
                attack_bonus: Fixed::ONE,
                armor_bonus: Fixed::ONE,
                ..FormationProfile::default()
            },
        }
    }
}

/// Per-shape stat bonuses and layout parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormationProfile {
    /// Added to member attack rating.
    pub attack_bonus: Fixed,
    /// Added to member defense rating.
    pub armor_bonus: Fixed,
    /// Added to member attack range.
    pub range_bonus: Fixed,
    /// Multiplies member movement speed.
    pub speed_factor: Fixed,
    /// Multiplies member attack rate.
    pub attack_rate_factor: Fixed,
    /// Multiplier on [`UNIT_SPACING`].
    pub spacing: Fixed,
    /// Facing a fresh formation forms up with, before any move order.
    pub default_facing: Facing,
    /// Whether the formation marches at its slowest member's pace.
    pub speed_matching: bool,
    /// Whether the formation falls back from approaching enemies.
    pub retreat_when_closed: bool,
}

impl Default for FormationProfile {
    fn default() -> Self {
        Self {
            attack_bonus: Fixed::ZERO,
            armor_bonus: Fixed::ZERO,
            range_bonus: Fixed::ZERO,
            speed_factor: Fixed::ONE,
            attack_rate_factor: Fixed::ONE,
            spacing: Fixed::ONE,
            default_facing: Facing::East,
            speed_matching: true,
            retreat_when_closed: false,
        }
    }
}

impl FormationProfile {
    /// The modifier layer this profile pushes onto members.
    #[must_use]
    pub fn modifier(&self, formation: FormationId) -> StatModifier {
        StatModifier {
            source: ModifierSource::Formation(formation),
            attack_bonus: self.attack_bonus,
            armor_bonus: self.armor_bonus,
            range_bonus: self.range_bonus,
            speed_factor: self.speed_factor,
            attack_rate_factor: self.attack_rate_factor,
        }
    }
}

/// Cardinal facing of a formation. Rotations are exact in fixed point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Facing {
    /// Toward +x.
    #[default]
    East,
    /// Toward -y.
    North,
    /// Toward -x.
    West,
    /// Toward +y.
    South,
}

impl Facing {
    /// Facing toward a movement direction: dominant axis wins, ties go
    /// horizontal.
    #[must_use]
    pub fn from_direction(delta: Vec2Fixed) -> Self {
        if delta.x.abs() >= delta.y.abs() {
            if delta.x >= Fixed::ZERO {
                Self::East
            } else {
                Self::West
            }
        } else if delta.y >= Fixed::ZERO {
            Self::South
        } else {
            Self::North
        }
    }

    /// Rotate a local `(forward, right)` offset into world coordinates.
    #[must_use]
    pub fn rotate(self, local: Vec2Fixed) -> Vec2Fixed {
        let (forward, right) = (local.x, local.y);
        match self {
            Self::East => Vec2Fixed::new(forward, right),
            Self::North => Vec2Fixed::new(right, -forward),
            Self::West => Vec2Fixed::new(-forward, -right),
            Self::South => Vec2Fixed::new(-right, forward),
        }
    }

    /// World angle of the forward axis, with 0 = east and angles growing
    /// toward +y.
    #[must_use]
    pub fn angle(self) -> Fixed {
        match self {
            Self::East => Fixed::ZERO,
            Self::South => PI / 2,
            Self::West => PI,
            Self::North => PI + PI / 2,
        }
    }
}

/// One unit's slot inside a formation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormationMember {
    /// Member entity.
    pub id: EntityId,
    /// World-frame offset from the formation anchor.
    pub offset: Vec2Fixed,
    /// World facing angle of this slot.
    #[serde(with = "fixed_serde")]
    pub facing: Fixed,
}

/// A live formation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Formation {
    /// Unique id.
    pub id: FormationId,
    /// Current shape.
    pub kind: FormationType,
    /// Owning civilization.
    pub owner: CivId,
    /// Members in slot order; index 0 is the leader.
    pub members: Vec<FormationMember>,
    /// Leader entity, promoted from the front on loss.
    pub leader: EntityId,
    /// Centroid of member positions, refreshed each update.
    pub position: Vec2Fixed,
    /// Cardinal facing.
    pub facing: Facing,
    /// Whether a move order is in flight.
    pub moving: bool,
    /// Destination of the move order in flight.
    pub target: Option<Vec2Fixed>,
    /// Matched march speed, the slowest member's pace.
    #[serde(with = "fixed_serde")]
    pub speed: Fixed,
}

impl Formation {
    /// Member count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the formation has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Whether an entity belongs to this formation.
    #[must_use]
    pub fn contains(&self, entity: EntityId) -> bool {
        self.members.iter().any(|m| m.id == entity)
    }
}

/// Owner and driver of every live formation.
#[derive(Debug, Default)]
pub struct FormationManager {
    formations: HashMap<FormationId, Formation>,
    next_id: FormationId,
}

impl FormationManager {
    /// Create an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a formation.
    #[must_use]
    pub fn get(&self, id: FormationId) -> Option<&Formation> {
        self.formations.get(&id)
    }

    /// Number of live formations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.formations.len()
    }

    /// Whether no formations exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.formations.is_empty()
    }

    /// Iterate live formations in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &Formation> {
        self.formations.values()
    }

    /// The formation an entity belongs to, if any.
    #[must_use]
    pub fn formation_of(&self, entity: EntityId) -> Option<FormationId> {
        self.formations
            .values()
            .find(|f| f.contains(entity))
            .map(|f| f.id)
    }

    /// Form up a set of units.
    ///
    /// Candidates that are missing, inactive, foreign-owned, already in
    /// a formation, or not military units are silently skipped. Returns
    /// `None` when nothing qualifies. The first accepted unit leads.
    pub fn create_formation(
        &mut self,
        kind: FormationType,
        owner: CivId,
        candidates: &[EntityId],
        storage: &mut EntityStorage,
        events: &mut EventQueue,
    ) -> Option<FormationId> {
        let mut accepted = Vec::new();
        for &id in candidates {
            let Some(entity) = storage.get(id) else {
                continue;
            };
            if entity.active
                && entity.owner == owner
                && entity.kind.is_military_unit()
                && entity.formation.is_none()
                && !accepted.contains(&id)
            {
                accepted.push(id);
            }
        }
        if accepted.is_empty() {
            return None;
        }

        let id = self.next_id;
        self.next_id += 1;

        let mut position = Vec2Fixed::ZERO;
        for &member in &accepted {
            if let Some(entity) = storage.get(member) {
                position = position + entity.position;
            }
        }
        position = position.scale(Fixed::ONE / Fixed::from_num(accepted.len() as u32));

        let mut formation = Formation {
            id,
            kind,
            owner,
            members: accepted
                .iter()
                .map(|&m| FormationMember {
                    id: m,
                    offset: Vec2Fixed::ZERO,
                    facing: Fixed::ZERO,
                })
                .collect(),
            leader: accepted[0],
            position,
            facing: kind.profile().default_facing,
            moving: false,
            target: None,
            speed: Fixed::ZERO,
        };

        let modifier = kind.profile().modifier(id);
        for &member in &accepted {
            if let Some(entity) = storage.get_mut(member) {
                entity.formation = Some(id);
                entity.add_modifier(modifier);
            }
        }

        assign_offsets(&mut formation, storage);
        apply_speed_matching(&mut formation, storage);

        tracing::debug!(formation = id, units = formation.len(), ?kind, "formation created");
        events.publish(GameEvent::FormationCreated { formation: id });
        self.formations.insert(id, formation);
        Some(id)
    }

    /// Order a formation to a destination. Faces the dominant movement
    /// axis, recomputes slots, and paths every member toward its slot.
    /// Returns `false` when the formation is unknown or no member found
    /// a route.
    pub fn move_formation(
        &mut self,
        id: FormationId,
        target: Vec2Fixed,
        grid: &TerrainGrid,
        storage: &mut EntityStorage,
        events: &mut EventQueue,
    ) -> bool {
        let Some(formation) = self.formations.get_mut(&id) else {
            return false;
        };
        issue_move(formation, target, grid, storage, events)
    }

    /// Swap a formation's shape in place: the old modifier layer pops,
    /// the new one pushes, and slots are recomputed.
    pub fn change_type(
        &mut self,
        id: FormationId,
        kind: FormationType,
        storage: &mut EntityStorage,
    ) -> bool {
        let Some(formation) = self.formations.get_mut(&id) else {
            return false;
        };

        let modifier = kind.profile().modifier(id);
        for member in &formation.members {
            if let Some(entity) = storage.get_mut(member.id) {
                entity.remove_modifiers(ModifierSource::Formation(id));
                entity.add_modifier(modifier);
            }
        }
        formation.kind = kind;
        assign_offsets(formation, storage);
        apply_speed_matching(formation, storage);
        true
    }

    /// Add a unit to an existing formation, applying the modifier layer
    /// and reslotting everyone.
    pub fn add_unit(
        &mut self,
        id: FormationId,
        entity_id: EntityId,
        storage: &mut EntityStorage,
    ) -> bool {
        let Some(formation) = self.formations.get_mut(&id) else {
            return false;
        };
        let Some(entity) = storage.get(entity_id) else {
            return false;
        };
        if !entity.active
            || entity.owner != formation.owner
            || !entity.kind.is_military_unit()
            || entity.formation.is_some()
        {
            return false;
        }

        formation.members.push(FormationMember {
            id: entity_id,
            offset: Vec2Fixed::ZERO,
            facing: Fixed::ZERO,
        });
        let modifier = formation.kind.profile().modifier(id);
        if let Some(entity) = storage.get_mut(entity_id) {
            entity.formation = Some(id);
            entity.add_modifier(modifier);
        }
        assign_offsets(formation, storage);
        apply_speed_matching(formation, storage);
        true
    }

    /// Remove a unit from its formation, restoring its stats. Promotes
    /// a new leader when the leader leaves and disbands on empty.
    pub fn remove_unit(
        &mut self,
        id: FormationId,
        entity_id: EntityId,
        storage: &mut EntityStorage,
        events: &mut EventQueue,
    ) -> bool {
        let Some(formation) = self.formations.get_mut(&id) else {
            return false;
        };
        let before = formation.members.len();
        formation.members.retain(|m| m.id != entity_id);
        if formation.members.len() == before {
            return false;
        }

        if let Some(entity) = storage.get_mut(entity_id) {
            entity.formation = None;
            entity.speed_cap = None;
            entity.remove_modifiers(ModifierSource::Formation(id));
        }

        if formation.is_empty() {
            self.formations.remove(&id);
            tracing::debug!(formation = id, "formation emptied");
            events.publish(GameEvent::FormationDisbanded { formation: id });
            return true;
        }

        if formation.leader == entity_id {
            formation.leader = formation.members[0].id;
        }
        assign_offsets(formation, storage);
        apply_speed_matching(formation, storage);
        true
    }

    /// Disband a formation outright, restoring every member.
    pub fn disband(
        &mut self,
        id: FormationId,
        storage: &mut EntityStorage,
        events: &mut EventQueue,
    ) -> bool {
        let Some(formation) = self.formations.remove(&id) else {
            return false;
        };
        for member in &formation.members {
            if let Some(entity) = storage.get_mut(member.id) {
                entity.formation = None;
                entity.speed_cap = None;
                entity.remove_modifiers(ModifierSource::Formation(id));
            }
        }
        tracing::debug!(formation = id, "formation disbanded");
        events.publish(GameEvent::FormationDisbanded { formation: id });
        true
    }

    /// React to an entity dying: drop it from its formation, if any.
    pub fn handle_entity_death(
        &mut self,
        entity_id: EntityId,
        storage: &mut EntityStorage,
        events: &mut EventQueue,
    ) {
        if let Some(id) = self.formation_of(entity_id) {
            self.remove_unit(id, entity_id, storage, events);
        }
    }

    /// Per-tick formation upkeep: refresh centroids, finish arrived
    /// moves, and issue skirmish retreats.
    pub fn update(
        &mut self,
        grid: &TerrainGrid,
        storage: &mut EntityStorage,
        events: &mut EventQueue,
    ) {
        let ids: Vec<FormationId> = self.formations.keys().copied().collect();
        for id in ids {
            let Some(formation) = self.formations.get_mut(&id) else {
                continue;
            };

            // Centroid of live members.
            let mut sum = Vec2Fixed::ZERO;
            let mut count = 0u32;
            for member in &formation.members {
                if let Some(entity) = storage.get(member.id) {
                    sum = sum + entity.position;
                    count += 1;
                }
            }
            if count > 0 {
                formation.position = sum.scale(Fixed::ONE / Fixed::from_num(count));
            }

            if formation.moving {
                let arrived = formation
                    .target
                    .is_some_and(|t| formation.position.distance(t) <= ARRIVAL_TOLERANCE);
                let all_idle = formation.members.iter().all(|m| {
                    storage
                        .get(m.id)
                        .map_or(true, |e| !matches!(e.state, EntityState::Moving))
                });
                if arrived || all_idle {
                    formation.moving = false;
                    formation.target = None;
                    // Arrival halts the whole body; stragglers do not
                    // walk out the rest of their slot paths.
                    for member in &formation.members {
                        if let Some(entity) = storage.get_mut(member.id) {
                            if entity.state == EntityState::Moving {
                                entity.stop();
                            }
                        }
                    }
                }
            }

            if formation.kind.profile().retreat_when_closed && !formation.moving {
                if let Some(threat) = nearest_enemy(formation, storage) {
                    let away = formation.position - threat;
                    if away.length() > Fixed::ZERO {
                        let retreat = formation.position + away.normalize().scale(RETREAT_DISTANCE);
                        tracing::debug!(formation = id, "skirmish retreat");
                        issue_move(formation, retreat, grid, storage, events);
                    }
                }
            }
        }
    }
}

/// Position of the closest enemy unit or building within scan range of a
/// skirmishing formation. Walls are barriers, not threats.
fn nearest_enemy(formation: &Formation, storage: &EntityStorage) -> Option<Vec2Fixed> {
    let mut best: Option<(Fixed, Vec2Fixed)> = None;
    for entity in storage.iter() {
        if !entity.active
            || entity.owner == formation.owner
            || matches!(entity.kind, EntityKind::Wall(_))
        {
            continue;
        }
        let dist = formation.position.distance(entity.position);
        if dist > SKIRMISH_SCAN_RANGE {
            continue;
        }
        if best.map_or(true, |(d, _)| dist < d) {
            best = Some((dist, entity.position));
        }
    }
    best.map(|(_, pos)| pos)
}

fn issue_move(
    formation: &mut Formation,
    target: Vec2Fixed,
    grid: &TerrainGrid,
    storage: &mut EntityStorage,
    events: &mut EventQueue,
) -> bool {
    formation.facing = Facing::from_direction(target - formation.position);
    assign_offsets(formation, storage);
    apply_speed_matching(formation, storage);

    let mut any_moving = false;
    for member in &formation.members {
        if let Some(entity) = storage.get_mut(member.id) {
            if entity.move_to(grid, target + member.offset, events) {
                any_moving = true;
            }
        }
    }

    if any_moving {
        formation.moving = true;
        formation.target = Some(target);
    }
    any_moving
}

/// March speed is the slowest member's effective speed; every member is
/// capped to it so the formation stays together.
fn apply_speed_matching(formation: &mut Formation, storage: &mut EntityStorage) {
    if !formation.kind.profile().speed_matching {
        formation.speed = Fixed::ZERO;
        return;
    }

    let mut slowest: Option<Fixed> = None;
    for member in &formation.members {
        if let Some(entity) = storage.get(member.id) {
            let speed = entity.effective().speed;
            if slowest.map_or(true, |s| speed < s) {
                slowest = Some(speed);
            }
        }
    }

    let Some(speed) = slowest else {
        return;
    };
    formation.speed = speed;
    for member in &formation.members {
        if let Some(entity) = storage.get_mut(member.id) {
            entity.speed_cap = Some(speed);
        }
    }
}

/// Recompute member offsets and slot facings for the current shape,
/// member order, and formation facing.
fn assign_offsets(formation: &mut Formation, storage: &EntityStorage) {
    // Skirmish puts its longest-range members in the rear rank.
    if formation.kind == FormationType::Skirmish {
        formation.members.sort_by_key(|m| {
            storage
                .get(m.id)
                .map_or(Fixed::ZERO, |e| e.effective().attack_range)
        });
    }

    let spacing = UNIT_SPACING * formation.kind.profile().spacing;
    let slots = local_slots(formation.kind, formation.members.len(), spacing);

    for (member, (local, local_facing)) in formation.members.iter_mut().zip(slots) {
        member.offset = formation.facing.rotate(local);
        member.facing = (formation.facing.angle() + local_facing) % TAU;
    }
}

/// Slot layout in the formation-local frame: `(forward, right)` offsets
/// plus a local facing angle (0 = forward).
fn local_slots(kind: FormationType, count: usize, spacing: Fixed) -> Vec<(Vec2Fixed, Fixed)> {
    let n = count as u32;
    if n == 0 {
        return Vec::new();
    }
    let half = |total: u32| Fixed::from_num(total.saturating_sub(1)) / 2;

    match kind {
        FormationType::Line => (0..n)
            .map(|i| {
                let right = (Fixed::from_num(i) - half(n)) * spacing;
                (Vec2Fixed::new(Fixed::ZERO, right), Fixed::ZERO)
            })
            .collect(),

        FormationType::Column => (0..n)
            .map(|i| {
                let forward = (half(n) - Fixed::from_num(i)) * spacing;
                (Vec2Fixed::new(forward, Fixed::ZERO), Fixed::ZERO)
            })
            .collect(),

        FormationType::Wedge => {
            // Row r holds r+1 slots; the leader is the tip.
            let mut slots = Vec::with_capacity(count);
            let mut row = 0u32;
            let mut index_in_row = 0u32;
            for _ in 0..n {
                let forward = -Fixed::from_num(row) * spacing;
                let right = (Fixed::from_num(index_in_row) - half(row + 1)) * spacing;
                slots.push((Vec2Fixed::new(forward, right), Fixed::ZERO));
                index_in_row += 1;
                if index_in_row > row {
                    row += 1;
                    index_in_row = 0;
                }
            }
            slots
        }

        FormationType::Square => {
            let mut side = 1u32;
            while side * side < n {
                side += 1;
            }
            (0..n)
                .map(|i| {
                    let row = i / side;
                    let col = i % side;
                    let forward = (half(side) - Fixed::from_num(row)) * spacing;
                    let right = (Fixed::from_num(col) - half(side)) * spacing;
                    // Edge slots face outward, interior slots forward.
                    let facing = if row == 0 {
                        Fixed::ZERO
                    } else if row == side - 1 {
                        PI
                    } else if col == 0 {
                        PI + PI / 2
                    } else if col == side - 1 {
                        PI / 2
                    } else {
                        Fixed::ZERO
                    };
                    (Vec2Fixed::new(forward, right), facing)
                })
                .collect()
        }

        FormationType::Circle => {
            let radius = spacing * Fixed::from_num(n) / TAU;
            (0..n)
                .map(|i| {
                    let theta = TAU * Fixed::from_num(i) / Fixed::from_num(n);
                    let local =
                        Vec2Fixed::new(fixed_cos(theta), fixed_sin(theta)).scale(radius);
                    (local, theta)
                })
                .collect()
        }

        FormationType::Scatter => (0..n)
            .map(|i| {
                let radius = spacing * fixed_sqrt(Fixed::from_num(i + 1));
                let theta = (Fixed::from_num(i) * GOLDEN_ANGLE) % TAU;
                let local = Vec2Fixed::new(fixed_cos(theta), fixed_sin(theta)).scale(radius);
                (local, Fixed::ZERO)
            })
            .collect(),

        FormationType::Skirmish => {
            // Two ranks; callers sort members so the rear rank holds the
            // longest-range units.
            let front = n.div_ceil(2);
            let rear = n - front;
            (0..n)
                .map(|i| {
                    let (row_width, index, forward) = if i < front {
                        (front, i, spacing / 2)
                    } else {
                        (rear, i - front, -(spacing / 2))
                    };
                    let right = (Fixed::from_num(index) - half(row_width)) * spacing;
                    (Vec2Fixed::new(forward, right), Fixed::ZERO)
                })
                .collect()
        }

        FormationType::Staggered => {
            let mut width = 1u32;
            while width * width < n {
                width += 1;
            }
            let rows = n.div_ceil(width);
            (0..n)
                .map(|i| {
                    let row = i / width;
                    let col = i % width;
                    let forward = (half(rows) - Fixed::from_num(row)) * spacing;
                    let mut right = (Fixed::from_num(col) - half(width)) * spacing;
                    if row % 2 == 1 {
                        right += spacing / 2;
                    }
                    (Vec2Fixed::new(forward, right), Fixed::ZERO)
                })
                .collect()
        }
    }
}
