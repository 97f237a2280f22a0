//! Force models and the ordered registry the simulator runs each step
//!
//! Two forces ship with the crate: `nbody` (tree rebuild, per-body repulsion
//! and drag) and `spring`. Callers can add their own as [`CustomForce`]s,
//! which see the bodies through the dimension-erased [`BodySet`] view.

use crate::config::PhysicsSettings;
use crate::error::{Result, SimulationError};
use crate::physics::body::BodyView;
use crate::physics::math::Scalar;
use tracing::debug;

pub mod drag;
pub mod spring;

pub use drag::DragForce;
pub use spring::SpringForce;

pub const NBODY_FORCE: &str = "nbody";
pub const SPRING_FORCE: &str = "spring";

/// Mutable access to the bodies of a simulator without naming its
/// dimension count.
pub trait BodySet {
    fn dimensions(&self) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// View of the body at `index`, `None` past the end.
    fn body(&self, index: usize) -> Option<BodyView<'_>>;

    /// Adds `force` to the accumulated force of the body at `index`.
    /// Components beyond the dimension count are ignored, missing ones are 0.
    /// Returns `false` and changes nothing when `index` is out of range.
    fn add_force(&mut self, index: usize, force: &[Scalar]) -> bool;
}

/// A caller-supplied force, run once per step in registration order.
pub trait CustomForce: Send {
    fn apply(&mut self, bodies: &mut dyn BodySet, settings: &PhysicsSettings);
}

impl<F> CustomForce for F
where
    F: FnMut(&mut dyn BodySet, &PhysicsSettings) + Send,
{
    fn apply(&mut self, bodies: &mut dyn BodySet, settings: &PhysicsSettings) {
        self(bodies, settings)
    }
}

pub enum ForceKind {
    /// Rebuilds the tree, then adds repulsion and drag to every non-pinned
    /// body.
    NBody,
    /// Walks every spring.
    Spring,
    Custom(Box<dyn CustomForce>),
}

impl std::fmt::Debug for ForceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NBody => f.write_str("NBody"),
            Self::Spring => f.write_str("Spring"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Named forces in the order they run.
#[derive(Debug, Default)]
pub struct ForceRegistry {
    forces: Vec<(String, ForceKind)>,
}

impl ForceRegistry {
    /// Create an empty registry without any pre-registered forces.
    pub fn new() -> Self {
        Self { forces: Vec::new() }
    }

    /// Registers `nbody` followed by `spring`.
    pub fn with_standard_forces(mut self) -> Self {
        self.forces.push((NBODY_FORCE.to_string(), ForceKind::NBody));
        self.forces.push((SPRING_FORCE.to_string(), ForceKind::Spring));
        self
    }

    pub fn register(&mut self, name: &str, force: ForceKind) -> Result<()> {
        if self.contains(name) {
            return Err(SimulationError::DuplicateForce(name.to_string()));
        }

        debug!(force = name, "registering force");
        self.forces.push((name.to_string(), force));
        Ok(())
    }

    /// Removes the force called `name`. Unknown names are ignored.
    pub fn remove(&mut self, name: &str) -> bool {
        let Some(position) = self.forces.iter().position(|(entry, _)| entry == name) else {
            return false;
        };

        debug!(force = name, "removing force");
        self.forces.remove(position);
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.forces.iter().any(|(entry, _)| entry == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.forces.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.forces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forces.is_empty()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut ForceKind)> {
        self.forces
            .iter_mut()
            .map(|(name, force)| (name.as_str(), force))
    }
}
