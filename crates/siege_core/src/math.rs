//! Fixed-point math utilities for deterministic simulation.
//!
//! All game simulation uses fixed-point arithmetic so that the same
//! sequence of orders produces the same state on every platform.
//! Floating-point operations can round differently on different CPUs.

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

/// Fixed-point number type for all simulation math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
pub type Fixed = I32F32;

/// π as a fixed-point constant.
pub const PI: Fixed = Fixed::lit("3.14159265358979");

/// 2π as a fixed-point constant.
pub const TAU: Fixed = Fixed::lit("6.28318530717958");

/// √2, the diagonal step multiplier for grid movement.
pub const SQRT_2: Fixed = Fixed::lit("1.41421356237309");

/// Fixed-point 2D vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Vec2Fixed {
    /// X coordinate.
    #[serde(with = "fixed_serde")]
    pub x: Fixed,
    /// Y coordinate.
    #[serde(with = "fixed_serde")]
    pub y: Fixed,
}

/// Serde support for fixed-point numbers.
///
/// Serializes fixed-point numbers as their raw bit representation (i64)
/// to preserve exact precision across serialization boundaries.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as its raw bit representation.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Deserialize a fixed-point number from its raw bit representation.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = i64::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
    }
}

/// Serde support for `Option<Fixed>`.
pub mod option_fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize an optional fixed-point number.
    pub fn serialize<S>(value: &Option<Fixed>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(v) => v.to_bits().serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    /// Deserialize an optional fixed-point number.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Fixed>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt = Option::<i64>::deserialize(deserializer)?;
        Ok(opt.map(Fixed::from_bits))
    }
}

impl Vec2Fixed {
    /// Create a new fixed-point vector.
    #[must_use]
    pub const fn new(x: Fixed, y: Fixed) -> Self {
        Self { x, y }
    }

    /// Zero vector.
    pub const ZERO: Self = Self {
        x: Fixed::ZERO,
        y: Fixed::ZERO,
    };

    /// Calculate squared distance (avoids sqrt for comparisons).
    #[must_use]
    pub fn distance_squared(self, other: Self) -> Fixed {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Calculate Euclidean distance.
    #[must_use]
    pub fn distance(self, other: Self) -> Fixed {
        fixed_sqrt(self.distance_squared(other))
    }

    /// Calculate Manhattan distance.
    #[must_use]
    pub fn manhattan_distance(self, other: Self) -> Fixed {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    /// Dot product of two vectors.
    #[must_use]
    pub fn dot(self, other: Self) -> Fixed {
        self.x * other.x + self.y * other.y
    }

    /// Vector length.
    #[must_use]
    pub fn length(self) -> Fixed {
        fixed_sqrt(self.dot(self))
    }

    /// Scale both components by a factor.
    #[must_use]
    pub fn scale(self, factor: Fixed) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }

    /// Normalize vector using fixed-point math.
    ///
    /// Returns the zero vector unchanged.
    #[must_use]
    pub fn normalize(self) -> Self {
        let len_sq = self.dot(self);

        if len_sq == Fixed::ZERO {
            return Self::ZERO;
        }

        let len = fixed_sqrt(len_sq);
        if len == Fixed::ZERO {
            return Self::ZERO;
        }

        Self::new(self.x / len, self.y / len)
    }

    /// Rotate counter-clockwise by an angle in radians.
    #[must_use]
    pub fn rotate(self, angle: Fixed) -> Self {
        let cos = fixed_cos(angle);
        let sin = fixed_sin(angle);
        Self::new(self.x * cos - self.y * sin, self.x * sin + self.y * cos)
    }
}

/// Computes the square root of a fixed-point number using binary search.
#[must_use]
pub fn fixed_sqrt(value: Fixed) -> Fixed {
    if value <= Fixed::ZERO {
        return Fixed::ZERO;
    }

    let mut low = Fixed::ZERO;
    let mut high = if value > Fixed::from_num(1) {
        value
    } else {
        Fixed::from_num(1)
    };

    for _ in 0..32 {
        let mid = (low + high) / Fixed::from_num(2);
        let mid_sq = mid.saturating_mul(mid);

        if mid_sq <= value {
            low = mid;
        } else {
            high = mid;
        }
    }

    low
}

/// Fixed-point sine using Bhaskara's rational approximation.
///
/// Accurate to roughly 0.002 over the full range, which is plenty for
/// formation layout geometry. The input is range-reduced to `[0, 2π)`.
#[must_use]
pub fn fixed_sin(angle: Fixed) -> Fixed {
    let mut a = angle % TAU;
    if a < Fixed::ZERO {
        a += TAU;
    }

    let (a, negate) = if a > PI { (a - PI, true) } else { (a, false) };

    // sin(a) ≈ 16a(π−a) / (5π² − 4a(π−a)) for a in [0, π]
    let p = a * (PI - a);
    let num = Fixed::from_num(16) * p;
    let den = Fixed::from_num(5) * PI * PI - Fixed::from_num(4) * p;
    let result = if den == Fixed::ZERO {
        Fixed::ZERO
    } else {
        num / den
    };

    if negate {
        -result
    } else {
        result
    }
}

/// Fixed-point cosine, phase-shifted from [`fixed_sin`].
#[must_use]
pub fn fixed_cos(angle: Fixed) -> Fixed {
    fixed_sin(angle + PI / Fixed::from_num(2))
}

impl std::ops::Add for Vec2Fixed {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl std::ops::Sub for Vec2Fixed {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec2_distance_squared() {
        let a = Vec2Fixed::new(Fixed::from_num(3), Fixed::from_num(0));
        let b = Vec2Fixed::new(Fixed::from_num(0), Fixed::from_num(4));
        // 3² + 4² = 25
        assert_eq!(a.distance_squared(b), Fixed::from_num(25));

        // The binary-search sqrt converges from below; compare with an
        // epsilon rather than exact equality.
        let epsilon = Fixed::from_num(1) / Fixed::from_num(10000);
        assert!(
            (a.distance(b) - Fixed::from_num(5)).abs() < epsilon,
            "distance should be ~5, got {:?}",
            a.distance(b)
        );
    }

    #[test]
    fn test_fixed_determinism() {
        let a = Fixed::from_num(1) / Fixed::from_num(3);
        let b = Fixed::from_num(1) / Fixed::from_num(3);
        assert_eq!(a, b);

        let result1 = a * Fixed::from_num(7);
        let result2 = b * Fixed::from_num(7);
        assert_eq!(result1, result2);
    }

    #[test]
    fn test_vec2_normalize() {
        let v = Vec2Fixed::new(Fixed::from_num(3), Fixed::from_num(4));
        let norm = v.normalize();

        let len_sq = norm.dot(norm);
        let one = Fixed::from_num(1);
        let epsilon = one / Fixed::from_num(10000);
        assert!(
            (len_sq - one).abs() < epsilon,
            "normalized vector length² should be ~1, got {len_sq:?}"
        );
    }

    #[test]
    fn test_sqrt_two_constant() {
        let computed = fixed_sqrt(Fixed::from_num(2));
        let epsilon = Fixed::from_num(1) / Fixed::from_num(100_000);
        assert!((computed - SQRT_2).abs() < epsilon);
    }

    #[test]
    fn test_fixed_sin_key_angles() {
        let epsilon = Fixed::from_num(1) / Fixed::from_num(100);

        assert!(fixed_sin(Fixed::ZERO).abs() < epsilon);
        assert!((fixed_sin(PI / Fixed::from_num(2)) - Fixed::ONE).abs() < epsilon);
        assert!(fixed_sin(PI).abs() < epsilon);
        assert!((fixed_sin(-PI / Fixed::from_num(2)) + Fixed::ONE).abs() < epsilon);

        assert!((fixed_cos(Fixed::ZERO) - Fixed::ONE).abs() < epsilon);
        assert!(fixed_cos(PI / Fixed::from_num(2)).abs() < epsilon);
    }

    #[test]
    fn test_rotate_quarter_turn() {
        let v = Vec2Fixed::new(Fixed::from_num(1), Fixed::ZERO);
        let rotated = v.rotate(PI / Fixed::from_num(2));

        let epsilon = Fixed::from_num(1) / Fixed::from_num(100);
        assert!(rotated.x.abs() < epsilon);
        assert!((rotated.y - Fixed::ONE).abs() < epsilon);
    }
}
