//! Planar vector helpers shared by the motion and contact code.

use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

use serde::{Deserialize, Serialize};

/// Vectors shorter than this are treated as having no direction.
const MIN_LENGTH: f64 = 1.0e-12;

/// Two-component vector in world units.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

/// Location in the world plane.
pub type Position = Vec2;
/// Rate of change of a [`Position`] per second.
pub type Velocity = Vec2;

impl Vec2 {
    pub const ZERO: Self = Self::new(0.0, 0.0);

    /// Construct a new vector.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub fn dot(self, other: Self) -> f64 {
        self.x * other.x + self.y * other.y
    }

    #[must_use]
    pub fn length_squared(self) -> f64 {
        self.dot(self)
    }

    #[must_use]
    pub fn length(self) -> f64 {
        self.length_squared().sqrt()
    }

    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// `(x, y)` tuple form consumed by the spatial index.
    #[must_use]
    pub const fn as_tuple(self) -> (f64, f64) {
        (self.x, self.y)
    }
}

impl From<(f64, f64)> for Vec2 {
    fn from((x, y): (f64, f64)) -> Self {
        Self::new(x, y)
    }
}

impl Add for Vec2 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Vec2 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl SubAssign for Vec2 {
    fn sub_assign(&mut self, rhs: Self) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

impl Mul<f64> for Vec2 {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

impl Neg for Vec2 {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.x, -self.y)
    }
}

/// Euclidean distance between two points.
#[must_use]
pub fn distance(a: Position, b: Position) -> f64 {
    (b - a).length()
}

/// Rescale `v` to length `scale` (which may be negative). The zero vector stays zero.
#[must_use]
pub fn normalize(v: Vec2, scale: f64) -> Vec2 {
    let length = v.length();
    if length <= MIN_LENGTH {
        return Vec2::ZERO;
    }
    v * (scale / length)
}

/// Sum of absolute component differences between two unit vectors; zero when they agree.
#[must_use]
pub fn alignment_error(a: Vec2, b: Vec2) -> f64 {
    (a.x - b.x).abs() + (a.y - b.y).abs()
}

/// Returns true when two unit vectors point the same way within `tolerance`.
#[must_use]
pub fn is_aligned(a: Vec2, b: Vec2, tolerance: f64) -> bool {
    alignment_error(a, b) < tolerance
}
