use crate::physics::body::Body;
use crate::physics::math::Scalar;
use nalgebra::allocator::Allocator;
use nalgebra::{DefaultAllocator, Dim};

/// Velocity-proportional damping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragForce {
    pub drag_coefficient: Scalar,
}

impl Default for DragForce {
    fn default() -> Self {
        Self::new(0.9)
    }
}

impl DragForce {
    pub fn new(drag_coefficient: Scalar) -> Self {
        Self { drag_coefficient }
    }

    #[inline]
    pub fn update<D: Dim>(&self, body: &mut Body<D>)
    where
        DefaultAllocator: Allocator<D>,
    {
        body.force.axpy(-self.drag_coefficient, &body.velocity, 1.0);
    }
}
