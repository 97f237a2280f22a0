//! Scalar and vector types plus the small numeric helpers the kernels share

use crate::error::{Result, SimulationError};
use crate::resources::SharedRng;
use nalgebra::allocator::Allocator;
use nalgebra::{DefaultAllocator, Dim, U1};
use rand::Rng;

/// Scalar type for physics calculations (f64 for precision)
pub type Scalar = f64;

/// Position, velocity or force of a body.
///
/// `D` is a type-level dimension: `U1` through `U6` give stack-allocated
/// vectors whose per-axis loops are bounded at compile time, `Dyn` covers
/// every other dimension count at the cost of a heap buffer per vector.
pub type Vector<D> = nalgebra::OVector<Scalar, D>;

/// Bodies whose coordinates differ by less than this on every axis are
/// considered to share a position.
pub const SAME_POSITION_EPSILON: Scalar = 1e-8;

const MAX_DIRECTION_SAMPLES: usize = 8;

/// Human-readable axis name: `x`, `y`, `z`, then `c4`, `c5`, ...
pub fn axis_name(axis: usize) -> String {
    match axis {
        0 => "x".to_string(),
        1 => "y".to_string(),
        2 => "z".to_string(),
        _ => format!("c{}", axis + 1),
    }
}

/// Dimension of a vector as a type-level value.
#[inline]
pub fn dim_of<D: Dim>(v: &Vector<D>) -> D
where
    DefaultAllocator: Allocator<D>,
{
    v.shape_generic().0
}

#[inline]
pub fn zeros<D: Dim>(dim: D) -> Vector<D>
where
    DefaultAllocator: Allocator<D>,
{
    Vector::zeros_generic(dim, U1)
}

/// Builds a vector from raw components. Missing components are 0, surplus
/// components are ignored.
pub fn from_components<D: Dim>(dim: D, coords: &[Scalar]) -> Vector<D>
where
    DefaultAllocator: Allocator<D>,
{
    padded(dim, coords, 0.0)
}

/// Like [`from_components`], but rejects non-finite components.
pub fn try_from_components<D: Dim>(dim: D, coords: &[Scalar]) -> Result<Vector<D>>
where
    DefaultAllocator: Allocator<D>,
{
    ensure_finite(&coords[..coords.len().min(dim.value())])?;
    Ok(from_components(dim, coords))
}

/// Builds a vector from raw components, filling missing axes with `fill`.
pub fn padded<D: Dim>(dim: D, coords: &[Scalar], fill: Scalar) -> Vector<D>
where
    DefaultAllocator: Allocator<D>,
{
    Vector::from_fn_generic(dim, U1, |axis, _| {
        coords.get(axis).copied().unwrap_or(fill)
    })
}

/// Fails with the name of the first axis holding a non-finite value.
pub fn ensure_finite(coords: &[Scalar]) -> Result<()> {
    match coords.iter().position(|value| !value.is_finite()) {
        Some(axis) => Err(SimulationError::NonFiniteCoordinate {
            axis: axis_name(axis),
            value: coords[axis],
        }),
        None => Ok(()),
    }
}

#[inline]
pub fn is_same_position<D: Dim>(a: &Vector<D>, b: &Vector<D>) -> bool
where
    DefaultAllocator: Allocator<D>,
{
    a.iter()
        .zip(b.iter())
        .all(|(a, b)| (a - b).abs() < SAME_POSITION_EPSILON)
}

/// Small random displacement used in place of a zero-length distance vector.
#[inline]
pub fn zero_distance_jitter<D: Dim>(dim: D, rng: &mut SharedRng) -> Vector<D>
where
    DefaultAllocator: Allocator<D>,
{
    Vector::from_fn_generic(dim, U1, |_, _| (rng.random::<Scalar>() - 0.5) / 50.0)
}

fn standard_normal(rng: &mut SharedRng) -> Scalar {
    let u1: Scalar = rng.random_range(Scalar::EPSILON..1.0);
    let u2: Scalar = rng.random();
    libm::sqrt(-2.0 * libm::log(u1)) * libm::cos(2.0 * std::f64::consts::PI * u2)
}

/// Uniformly distributed direction on the unit (D-1)-sphere.
pub fn random_unit_vector<D: Dim>(dim: D, rng: &mut SharedRng) -> Vector<D>
where
    DefaultAllocator: Allocator<D>,
{
    for _ in 0..MAX_DIRECTION_SAMPLES {
        let sample = Vector::from_fn_generic(dim, U1, |_, _| standard_normal(rng));
        let length = sample.norm();
        if length > Scalar::EPSILON {
            return sample / length;
        }
    }

    let mut fallback = zeros(dim);
    fallback[0] = 1.0;
    fallback
}
