//! Point masses and the springs connecting them

use crate::error::Result;
use crate::physics::math::{self, Scalar, Vector};
use nalgebra::allocator::Allocator;
use nalgebra::{DefaultAllocator, Dim, DimName};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Caller-chosen identifier of a body. The core never interprets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BodyId(pub u64);

/// Caller-chosen identifier of a spring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SpringId(pub u64);

impl From<u64> for BodyId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<u64> for SpringId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for BodyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for SpringId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A point mass in D-dimensional space.
///
/// `spring_count` and `spring_length` are filled by the spring force during
/// a step and read by the integrator's adaptive timestep; both are cleared
/// by [`Body::reset`] before forces accumulate.
#[derive(Debug, Clone, PartialEq)]
pub struct Body<D: Dim>
where
    DefaultAllocator: Allocator<D>,
{
    pub pos: Vector<D>,
    pub force: Vector<D>,
    pub velocity: Vector<D>,
    pub mass: Scalar,
    pub is_pinned: bool,
    pub spring_count: u32,
    pub spring_length: Scalar,
}

impl<D: DimName> Default for Body<D>
where
    DefaultAllocator: Allocator<D>,
{
    fn default() -> Self {
        Self::new(math::zeros(D::name()))
    }
}

impl<D: Dim> Body<D>
where
    DefaultAllocator: Allocator<D>,
{
    pub fn new(pos: Vector<D>) -> Self {
        let dim = math::dim_of(&pos);
        Self {
            pos,
            force: math::zeros(dim),
            velocity: math::zeros(dim),
            mass: 1.0,
            is_pinned: false,
            spring_count: 0,
            spring_length: 0.0,
        }
    }

    /// Body at the given coordinates; omitted axes are 0.
    pub fn at(dim: D, coords: &[Scalar]) -> Self {
        Self::new(math::from_components(dim, coords))
    }

    #[inline]
    pub fn dim(&self) -> D {
        math::dim_of(&self.pos)
    }

    pub fn with_mass(mut self, mass: Scalar) -> Self {
        self.mass = mass;
        self
    }

    pub fn with_velocity(mut self, velocity: Vector<D>) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn pinned(mut self) -> Self {
        self.is_pinned = true;
        self
    }

    /// Clears the accumulated force and the spring bookkeeping.
    #[inline]
    pub fn reset(&mut self) {
        self.force.fill(0.0);
        self.spring_count = 0;
        self.spring_length = 0.0;
    }

    /// Assigns the given coordinates; omitted axes become 0.
    pub fn set_position(&mut self, coords: &[Scalar]) {
        self.pos = math::from_components(self.dim(), coords);
    }

    /// Checked variant of [`Body::set_position`]. The position is left
    /// untouched when any provided coordinate is not finite.
    pub fn try_set_position(&mut self, coords: &[Scalar]) -> Result<()> {
        self.pos = math::try_from_components(self.dim(), coords)?;
        Ok(())
    }
}

/// Borrowed, dimension-erased view of one body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyView<'a> {
    pub id: BodyId,
    pub position: &'a [Scalar],
    pub velocity: &'a [Scalar],
    pub force: &'a [Scalar],
    pub mass: Scalar,
    pub is_pinned: bool,
}

impl<'a> BodyView<'a> {
    pub fn new<D: Dim>(id: BodyId, body: &'a Body<D>) -> Self
    where
        DefaultAllocator: Allocator<D>,
    {
        Self {
            id,
            position: body.pos.as_slice(),
            velocity: body.velocity.as_slice(),
            force: body.force.as_slice(),
            mass: body.mass,
            is_pinned: body.is_pinned,
        }
    }
}

/// Marker stored in a spring's length or coefficient meaning "use the
/// simulator's global setting".
pub const USE_GLOBAL: Scalar = -1.0;

/// Hooke's-law constraint between two bodies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Spring {
    pub from: BodyId,
    pub to: BodyId,
    length: Scalar,
    coefficient: Scalar,
}

impl Spring {
    /// Spring with its own rest length and stiffness. Negative values are
    /// stored as [`USE_GLOBAL`].
    pub fn new(from: BodyId, to: BodyId, length: Scalar, coefficient: Scalar) -> Self {
        Self {
            from,
            to,
            length: normalize(length),
            coefficient: normalize(coefficient),
        }
    }

    /// Spring that takes both its rest length and stiffness from the
    /// simulator settings.
    pub fn between(from: BodyId, to: BodyId) -> Self {
        Self::new(from, to, USE_GLOBAL, USE_GLOBAL)
    }

    pub fn with_length(mut self, length: Scalar) -> Self {
        self.length = normalize(length);
        self
    }

    pub fn with_coefficient(mut self, coefficient: Scalar) -> Self {
        self.coefficient = normalize(coefficient);
        self
    }

    /// Raw stored length, [`USE_GLOBAL`] when unset.
    pub fn length(&self) -> Scalar {
        self.length
    }

    /// Raw stored coefficient, [`USE_GLOBAL`] when unset.
    pub fn coefficient(&self) -> Scalar {
        self.coefficient
    }

    pub fn rest_length_or(&self, global: Scalar) -> Scalar {
        if self.length < 0.0 { global } else { self.length }
    }

    pub fn coefficient_or(&self, global: Scalar) -> Scalar {
        if self.coefficient < 0.0 {
            global
        } else {
            self.coefficient
        }
    }
}

fn normalize(value: Scalar) -> Scalar {
    // NaN falls through to the sentinel as well
    if value >= 0.0 { value } else { USE_GLOBAL }
}
