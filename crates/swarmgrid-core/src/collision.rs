//! Equal-mass elastic contact between two agents.

use thiserror::Error;

use crate::geometry::{Position, Vec2, Velocity};

/// Errors raised while resolving a contact.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum CollisionError {
    /// The two centres coincide, so no contact normal exists.
    #[error("coincident centres at ({x}, {y})")]
    CoincidentCentres { x: f64, y: f64 },
}

/// Post-contact velocities, in the argument order of [`resolve_elastic`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactVelocities {
    pub first: Velocity,
    pub second: Velocity,
}

/// Exchange the normal components of two equal-mass velocities.
///
/// The tangential components are untouched, so kinetic energy is conserved up to rounding.
pub fn resolve_elastic(
    p1: Position,
    v1: Velocity,
    p2: Position,
    v2: Velocity,
) -> Result<ContactVelocities, CollisionError> {
    let normal = p1 - p2;
    let distance_sq = normal.length_squared();
    if distance_sq <= f64::EPSILON {
        return Err(CollisionError::CoincidentCentres { x: p1.x, y: p1.y });
    }
    let relative = v1 - v2;
    let impulse = relative.dot(normal) / distance_sq;
    Ok(ContactVelocities {
        first: v1 - normal * impulse,
        // <v2 - v1, p2 - p1> equals <v1 - v2, p1 - p2>.
        second: v2 + normal * impulse,
    })
}

/// Offset that moves `mover` out of contact with `other`, plus `epsilon` clearance.
///
/// Returns `None` when the centres coincide or are more than `contact_distance` apart. Touching
/// agents still get the `epsilon` push.
#[must_use]
pub fn separation_offset(
    mover: Position,
    other: Position,
    contact_distance: f64,
    epsilon: f64,
) -> Option<Vec2> {
    let away = mover - other;
    let distance = away.length();
    if distance <= f64::EPSILON || distance > contact_distance {
        return None;
    }
    let push = contact_distance - distance + epsilon;
    Some(away * (push / distance))
}

/// Total kinetic energy `0.5 * sum |v|^2` of unit-mass agents.
pub fn kinetic_energy<I>(velocities: I) -> f64
where
    I: IntoIterator<Item = Velocity>,
{
    0.5 * velocities
        .into_iter()
        .map(Vec2::length_squared)
        .sum::<f64>()
}
