//! Symplectic Euler integration with a speed cap
//!
//! Velocity is updated from the accumulated force first and the position
//! then moves with the new velocity. Layouts do not need accuracy, they need
//! to settle, so every body's speed is clamped to 1 after the velocity
//! update.

use super::{Integrator, TimeStep};
use crate::physics::body::Body;
use crate::physics::math::{self, Scalar};
use nalgebra::allocator::Allocator;
use nalgebra::{DefaultAllocator, Dim};

/// Upper bound on a body's speed after integration.
pub const MAX_SPEED: Scalar = 1.0;

/// Symplectic Euler integrator (also known as semi-implicit Euler)
///
/// ```text
/// v(t+dt) = v(t) + F/m * dt        clamped to |v| <= 1
/// x(t+dt) = x(t) + v(t+dt) * dt
/// ```
///
/// The returned movement metric sums `|dx|` per axis over all moved bodies
/// and reports `Σ_axis total² / body_count`. Pinned bodies count towards the
/// body count but never move.
#[derive(Debug, Copy, Clone, Default)]
pub struct SymplecticEuler;

impl<D: Dim> Integrator<D> for SymplecticEuler
where
    DefaultAllocator: Allocator<D>,
{
    fn integrate(&self, bodies: &mut [Body<D>], time_step: TimeStep) -> Scalar {
        let Some(first) = bodies.first() else {
            return 0.0;
        };

        let mut total = math::zeros(first.dim());

        for body in bodies.iter_mut().filter(|body| !body.is_pinned) {
            let dt = time_step.for_body(body);

            body.velocity.axpy(dt / body.mass, &body.force, 1.0);

            let speed = body.velocity.norm();
            if speed > MAX_SPEED {
                body.velocity /= speed;
            }

            body.pos.axpy(dt, &body.velocity, 1.0);
            for (sum, v) in total.iter_mut().zip(body.velocity.iter()) {
                *sum += (v * dt).abs();
            }
        }

        total.norm_squared() / bodies.len() as Scalar
    }

    fn name(&self) -> &'static str {
        "symplectic_euler"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{DVector, Dyn, U1, U2, U3, Vector1, Vector2, Vector3};

    fn integrate<D: Dim>(bodies: &mut [Body<D>], dt: Scalar) -> Scalar
    where
        DefaultAllocator: Allocator<D>,
    {
        Integrator::<D>::integrate(
            &SymplecticEuler,
            bodies,
            TimeStep {
                dt,
                adaptive_weight: 0.0,
            },
        )
    }

    #[test]
    fn test_pure_inertia() {
        let mut bodies = vec![Body::<U2>::default().with_velocity(Vector2::new(1.0, 0.0))];

        integrate(&mut bodies, 1.0);
        assert_eq!(bodies[0].pos.x, 1.0);

        integrate(&mut bodies, 2.0);
        assert_eq!(bodies[0].pos.x, 3.0);
        assert_eq!(bodies[0].pos.y, 0.0);
    }

    #[test]
    fn test_speed_is_capped() {
        let mut bodies = vec![
            Body::<U3>::default(),
            Body::at(U3, &[5.0, 0.0, 0.0]).with_mass(0.01),
        ];
        bodies[0].force = Vector3::new(100.0, -50.0, 20.0);
        bodies[1].force = Vector3::new(0.0, 1e6, 0.0);

        integrate(&mut bodies, 0.5);

        for body in &bodies {
            assert!(body.velocity.norm() <= 1.0 + 1e-12);
        }
        // Capping keeps the direction
        assert!(bodies[0].velocity.x > 0.0 && bodies[0].velocity.y < 0.0);
    }

    #[test]
    fn test_pinned_bodies_never_move() {
        let mut bodies = vec![Body::at(U2, &[1.0, 2.0]).pinned()];
        bodies[0].force = Vector2::new(10.0, 10.0);
        bodies[0].velocity = Vector2::new(0.3, 0.3);

        let movement = integrate(&mut bodies, 1.0);

        assert_eq!(movement, 0.0);
        assert_eq!(bodies[0].pos, Vector2::new(1.0, 2.0));
        assert_eq!(bodies[0].velocity, Vector2::new(0.3, 0.3));
    }

    #[test]
    fn test_movement_metric() {
        let mut bodies = vec![
            Body::<U2>::default().with_velocity(Vector2::new(0.5, 0.0)),
            Body::<U2>::default().with_velocity(Vector2::new(-0.5, 0.0)),
            Body::<U2>::default().pinned(),
        ];

        let movement = integrate(&mut bodies, 1.0);

        // |dx| sums to 1 on x, 0 on y; divided by all three bodies
        assert!((movement - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(integrate::<U2>(&mut [], 1.0), 0.0);
    }

    #[test]
    fn test_adaptive_timestep_applies_per_body() {
        let mut bodies = vec![
            Body::<U1>::default().with_velocity(Vector1::new(1.0)),
            Body::<U1>::default().with_velocity(Vector1::new(1.0)),
        ];
        bodies[0].spring_count = 1;
        bodies[0].spring_length = 20.0;

        Integrator::<U1>::integrate(
            &SymplecticEuler,
            &mut bodies,
            TimeStep {
                dt: 0.5,
                adaptive_weight: 0.1,
            },
        );

        assert!((bodies[0].pos.x - 2.0).abs() < 1e-12);
        // The second body keeps the base timestep
        assert!((bodies[1].pos.x - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_negative_adaptive_weight_falls_back_to_base_timestep() {
        // A body with one spring of length 10 and unit speed along x
        let mut bodies = vec![Body::<U2>::default().with_velocity(Vector2::new(1.0, 0.0))];
        bodies[0].spring_count = 1;
        bodies[0].spring_length = 10.0;

        let movement = Integrator::<U2>::integrate(
            &SymplecticEuler,
            &mut bodies,
            TimeStep {
                dt: 0.5,
                adaptive_weight: -0.1,
            },
        );

        // -0.1 * 10 would step backwards by 1.0
        assert_eq!(bodies[0].pos.x, 0.5);
        assert_eq!(movement, 0.25);
    }

    #[test]
    fn test_dynamic_dimensions_integrate_every_axis() {
        let mut bodies =
            vec![Body::new(DVector::zeros(9)).with_velocity(DVector::from_element(9, 0.25))];
        assert_eq!(bodies[0].dim(), Dyn(9));

        let movement = integrate(&mut bodies, 1.0);

        assert!(bodies[0].pos.iter().all(|c| *c == 0.25));
        // 9 axes of 0.25 each, squared
        assert!((movement - 9.0 * 0.0625).abs() < 1e-12);
        assert_eq!(Integrator::<Dyn>::name(&SymplecticEuler), "symplectic_euler");
    }
}
