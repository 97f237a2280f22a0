//! Numerical integration of accumulated forces

use crate::physics::body::Body;
use crate::physics::math::Scalar;
use nalgebra::allocator::Allocator;
use nalgebra::{DefaultAllocator, Dim};

pub mod symplectic_euler;

pub use symplectic_euler::SymplecticEuler;

/// Timestep parameters handed to an integrator each step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeStep {
    /// Base timestep for every body.
    pub dt: Scalar,
    /// When positive, a body with springs uses
    /// `weight * average spring length` as its own timestep instead. Zero or
    /// negative weights leave every body on `dt`.
    pub adaptive_weight: Scalar,
}

impl Default for TimeStep {
    fn default() -> Self {
        Self {
            dt: 0.5,
            adaptive_weight: 0.0,
        }
    }
}

impl TimeStep {
    /// Timestep for one body.
    #[inline]
    pub fn for_body<D: Dim>(&self, body: &Body<D>) -> Scalar
    where
        DefaultAllocator: Allocator<D>,
    {
        if self.adaptive_weight > 0.0 && body.spring_count > 0 {
            self.adaptive_weight * body.spring_length / body.spring_count as Scalar
        } else {
            self.dt
        }
    }
}

/// Base trait for all integrators
pub trait Integrator<D: Dim>: Send + Sync + std::fmt::Debug
where
    DefaultAllocator: Allocator<D>,
{
    /// Advances every non-pinned body by one timestep using its accumulated
    /// force and returns the movement metric of the step.
    fn integrate(&self, bodies: &mut [Body<D>], time_step: TimeStep) -> Scalar;

    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::U2;

    #[test]
    fn test_adaptive_timestep_uses_average_spring_length() {
        let mut body = Body::<U2>::default();
        body.spring_count = 2;
        body.spring_length = 30.0;

        let step = TimeStep {
            dt: 0.5,
            adaptive_weight: 0.1,
        };
        assert!((step.for_body(&body) - 1.5).abs() < 1e-12);

        // Bodies without springs keep the base timestep
        assert_eq!(step.for_body(&Body::<U2>::default()), 0.5);
        // Weight 0 disables the heuristic
        assert_eq!(TimeStep::default().for_body(&body), 0.5);
        // So does a negative weight, which would otherwise turn into a
        // negative timestep
        let negative = TimeStep {
            dt: 0.5,
            adaptive_weight: -0.1,
        };
        assert_eq!(negative.for_body(&body), 0.5);
    }
}
