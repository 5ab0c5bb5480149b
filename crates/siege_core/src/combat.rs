//! Stateless combat resolution.
//!
//! Damage is a pure function of the attacker's attack rating, the
//! target's defense rating, and the damage type. The state machine is
//! the only caller and applies the result through `take_damage`; nothing
//! here holds state between invocations.

use serde::{Deserialize, Serialize};

use crate::math::Fixed;

/// Damage type classification for weapons.
///
/// Each type has a defense band it is strong against and one it is weak
/// against, giving a rock-paper-scissors spread across armor tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DamageType {
    /// Swords and axes. Strong vs light armor, weak vs heavy.
    #[default]
    Slashing,
    /// Arrows and spears. Strong vs medium armor, weak vs very heavy.
    Piercing,
    /// Maces and siege. Strong vs heavy armor, weak vs unarmored.
    Blunt,
}

const BONUS: Fixed = Fixed::lit("1.25");
const PENALTY: Fixed = Fixed::lit("0.75");

const LIGHT_DP: Fixed = Fixed::const_from_int(15);
const HEAVY_DP: Fixed = Fixed::const_from_int(25);
const VERY_HEAVY_DP: Fixed = Fixed::const_from_int(35);

impl DamageType {
    /// Damage multiplier against a defense rating.
    ///
    /// Defense bands with no listed bonus or penalty multiply by one.
    #[must_use]
    pub fn modifier_vs(self, dp: Fixed) -> Fixed {
        match self {
            Self::Slashing => {
                if dp < LIGHT_DP {
                    BONUS
                } else if dp > HEAVY_DP {
                    PENALTY
                } else {
                    Fixed::ONE
                }
            }
            Self::Piercing => {
                if dp >= LIGHT_DP && dp <= HEAVY_DP {
                    BONUS
                } else if dp > VERY_HEAVY_DP {
                    PENALTY
                } else {
                    Fixed::ONE
                }
            }
            Self::Blunt => {
                if dp > HEAVY_DP {
                    BONUS
                } else if dp < LIGHT_DP {
                    PENALTY
                } else {
                    Fixed::ONE
                }
            }
        }
    }
}

/// Resolve an attack into a damage amount.
///
/// Pure function: attack rating times the damage-type modifier for the
/// target's defense band. An attacker with no damage type applies its
/// base attack rating unmodified. The result is clamped to be
/// non-negative; the caller applies it via `take_damage`.
#[must_use]
pub fn resolve_damage(ar: Fixed, dp: Fixed, damage_type: Option<DamageType>) -> Fixed {
    let amount = match damage_type {
        Some(damage_type) => ar * damage_type.modifier_vs(dp),
        None => ar,
    };
    amount.max(Fixed::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fixed(n: i32) -> Fixed {
        Fixed::from_num(n)
    }

    #[test]
    fn test_slashing_bands() {
        // dp < 15: bonus
        assert_eq!(
            resolve_damage(fixed(10), fixed(10), Some(DamageType::Slashing)),
            Fixed::from_num(12.5)
        );
        // 15..=25: neutral
        assert_eq!(
            resolve_damage(fixed(10), fixed(20), Some(DamageType::Slashing)),
            fixed(10)
        );
        // dp > 25: penalty
        assert_eq!(
            resolve_damage(fixed(10), fixed(30), Some(DamageType::Slashing)),
            Fixed::from_num(7.5)
        );
    }

    #[test]
    fn test_piercing_bands() {
        assert_eq!(
            resolve_damage(fixed(8), fixed(20), Some(DamageType::Piercing)),
            fixed(10)
        );
        assert_eq!(
            resolve_damage(fixed(8), fixed(10), Some(DamageType::Piercing)),
            fixed(8)
        );
        // 25 < dp <= 35 has no listed modifier
        assert_eq!(
            resolve_damage(fixed(8), fixed(30), Some(DamageType::Piercing)),
            fixed(8)
        );
        assert_eq!(
            resolve_damage(fixed(8), fixed(40), Some(DamageType::Piercing)),
            fixed(6)
        );
    }

    #[test]
    fn test_blunt_bands() {
        assert_eq!(
            resolve_damage(fixed(12), fixed(30), Some(DamageType::Blunt)),
            fixed(15)
        );
        assert_eq!(
            resolve_damage(fixed(12), fixed(20), Some(DamageType::Blunt)),
            fixed(12)
        );
        assert_eq!(
            resolve_damage(fixed(12), fixed(10), Some(DamageType::Blunt)),
            fixed(9)
        );
    }

    #[test]
    fn test_untyped_damage_is_unmodified() {
        assert_eq!(resolve_damage(fixed(7), fixed(50), None), fixed(7));
        assert_eq!(resolve_damage(fixed(7), fixed(0), None), fixed(7));
    }

    #[test]
    fn test_band_edges() {
        // Piercing bonus band is inclusive on both edges.
        assert_eq!(
            resolve_damage(fixed(4), fixed(15), Some(DamageType::Piercing)),
            fixed(5)
        );
        assert_eq!(
            resolve_damage(fixed(4), fixed(25), Some(DamageType::Piercing)),
            fixed(5)
        );
        // Slashing treats exactly 15 and 25 as neutral.
        assert_eq!(
            resolve_damage(fixed(4), fixed(15), Some(DamageType::Slashing)),
            fixed(4)
        );
        assert_eq!(
            resolve_damage(fixed(4), fixed(25), Some(DamageType::Slashing)),
            fixed(4)
        );
    }

    proptest! {
        #[test]
        fn prop_damage_never_negative(
            ar in -100i32..1000,
            dp in -50i32..200,
            kind in 0u8..4,
        ) {
            let damage_type = match kind {
                0 => Some(DamageType::Slashing),
                1 => Some(DamageType::Piercing),
                2 => Some(DamageType::Blunt),
                _ => None,
            };
            let damage = resolve_damage(fixed(ar), fixed(dp), damage_type);
            prop_assert!(damage >= Fixed::ZERO);
        }

        #[test]
        fn prop_damage_deterministic(ar in 0i32..1000, dp in 0i32..100) {
            let a = resolve_damage(fixed(ar), fixed(dp), Some(DamageType::Piercing));
            let b = resolve_damage(fixed(ar), fixed(dp), Some(DamageType::Piercing));
            prop_assert_eq!(a, b);
        }
    }
}
