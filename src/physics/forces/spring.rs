//! Hooke's-law attraction along springs

use crate::physics::body::{Body, Spring};
use crate::physics::math::{self, Scalar};
use crate::resources::SharedRng;
use nalgebra::allocator::Allocator;
use nalgebra::{DefaultAllocator, Dim};

/// Applies spring forces, falling back to global rest length and stiffness
/// for springs that do not carry their own.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpringForce {
    pub spring_length: Scalar,
    pub spring_coefficient: Scalar,
}

impl Default for SpringForce {
    fn default() -> Self {
        Self {
            spring_length: 10.0,
            spring_coefficient: 0.8,
        }
    }
}

impl SpringForce {
    pub fn new(spring_length: Scalar, spring_coefficient: Scalar) -> Self {
        Self {
            spring_length,
            spring_coefficient,
        }
    }

    /// Pulls `bodies[from]` and `bodies[to]` towards the spring's rest
    /// length and records the spring on both endpoints.
    pub fn update<D: Dim>(
        &self,
        spring: &Spring,
        from: usize,
        to: usize,
        bodies: &mut [Body<D>],
        rng: &mut SharedRng,
    ) where
        DefaultAllocator: Allocator<D>,
    {
        let rest_length = spring.rest_length_or(self.spring_length);
        let coefficient = spring.coefficient_or(self.spring_coefficient);

        let mut displacement = &bodies[to].pos - &bodies[from].pos;
        let mut r = displacement.norm();
        if r == 0.0 {
            displacement = math::zero_distance_jitter(math::dim_of(&displacement), rng);
            r = displacement.norm();
        }

        let force = displacement * (coefficient * (r - rest_length) / r);

        let body = &mut bodies[from];
        body.force += &force;
        body.spring_count += 1;
        body.spring_length += r;

        let body = &mut bodies[to];
        body.force -= &force;
        body.spring_count += 1;
        body.spring_length += r;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::body::BodyId;
    use nalgebra::{Dyn, U2};

    fn pair(separation: Scalar) -> Vec<Body<U2>> {
        vec![Body::at(U2, &[0.0, 0.0]), Body::at(U2, &[separation, 0.0])]
    }

    fn spring(length: Scalar) -> Spring {
        Spring::between(BodyId(0), BodyId(1)).with_length(length)
    }

    #[test]
    fn test_stretched_spring_contracts() {
        let mut rng = SharedRng::from_seed(0);
        let mut bodies = pair(10.0);

        SpringForce::default().update(&spring(5.0), 0, 1, &mut bodies, &mut rng);

        assert!(bodies[0].force.x > 0.0);
        assert!(bodies[1].force.x < 0.0);
        // 0.8 * (10 - 5) / 10 * 10
        assert!((bodies[0].force.x - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_compressed_spring_expands() {
        let mut rng = SharedRng::from_seed(0);
        let mut bodies = pair(2.0);

        SpringForce::default().update(&spring(5.0), 0, 1, &mut bodies, &mut rng);

        assert!(bodies[0].force.x < 0.0);
        assert!(bodies[1].force.x > 0.0);
    }

    #[test]
    fn test_spring_at_rest_is_neutral() {
        let mut rng = SharedRng::from_seed(0);
        let mut bodies = pair(5.0);

        SpringForce::default().update(&spring(5.0), 0, 1, &mut bodies, &mut rng);

        assert_eq!(bodies[0].force.x, 0.0);
        assert_eq!(bodies[1].force.x, 0.0);
    }

    #[test]
    fn test_spring_bookkeeping_and_global_fallback() {
        let mut rng = SharedRng::from_seed(0);
        let mut bodies = pair(4.0);
        let force = SpringForce::new(4.0, 2.0);

        // No own length: global 4.0 matches the separation
        force.update(&Spring::between(BodyId(0), BodyId(1)), 0, 1, &mut bodies, &mut rng);
        assert_eq!(bodies[0].force.x, 0.0);

        // Own length 2.0 with global coefficient 2.0: 2 * (4 - 2) / 4 * 4
        force.update(&spring(2.0), 0, 1, &mut bodies, &mut rng);
        assert!((bodies[0].force.x - 4.0).abs() < 1e-12);

        for body in &bodies {
            assert_eq!(body.spring_count, 2);
            assert_eq!(body.spring_length, 8.0);
        }
    }

    #[test]
    fn test_zero_length_spring_stays_finite() {
        let mut rng = SharedRng::from_seed(0);
        let mut bodies = pair(0.0);

        SpringForce::default().update(&spring(5.0), 0, 1, &mut bodies, &mut rng);

        assert!(bodies[0].force.iter().all(|c| c.is_finite()));
        assert!(bodies[0].force.norm() > 0.0);
        assert_eq!(bodies[0].force, -bodies[1].force);
    }

    #[test]
    fn test_spring_in_dynamic_dimensions() {
        let mut rng = SharedRng::from_seed(0);
        let dim = Dyn(8);
        let mut far = vec![0.0; 8];
        far[7] = 10.0;
        let mut bodies = vec![Body::at(dim, &[]), Body::at(dim, &far)];

        SpringForce::default().update(&spring(5.0), 0, 1, &mut bodies, &mut rng);

        assert!((bodies[0].force[7] - 4.0).abs() < 1e-12);
        assert_eq!(bodies[1].force[7], -bodies[0].force[7]);
        assert!(bodies[0].force.iter().take(7).all(|c| *c == 0.0));
    }
}
