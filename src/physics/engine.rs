//! Per-dimension simulation kernel
//!
//! An [`Engine<D>`] owns everything whose layout depends on the dimension
//! count: the bodies, the tree, the spring and drag forces, the integrator
//! and the random source. The simulator swaps one engine for another when
//! the dimension count changes.

use crate::config::PhysicsSettings;
use crate::error::{Result, SimulationError};
use crate::physics::aabb::Aabb;
use crate::physics::barnes_hut::{BarnesHutTree, TreeOptions};
use crate::physics::body::{Body, BodyId, BodyView, Spring};
use crate::physics::forces::{BodySet, DragForce, ForceKind, ForceRegistry, SpringForce};
use crate::physics::integrators::{Integrator, SymplecticEuler, TimeStep};
use crate::physics::math::{self, Scalar, Vector};
use crate::resources::SharedRng;
use nalgebra::allocator::Allocator;
use nalgebra::{DefaultAllocator, Dim, U1};
use rand::Rng;
use std::collections::HashMap;
use tracing::{debug, trace};

/// Dimension-independent copy of a body, used to move bodies between
/// engines of different arity.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyRecord {
    pub id: BodyId,
    pub pos: Vec<Scalar>,
    pub force: Vec<Scalar>,
    pub velocity: Vec<Scalar>,
    pub mass: Scalar,
    pub is_pinned: bool,
}

#[derive(Debug)]
pub struct Engine<D: Dim>
where
    DefaultAllocator: Allocator<D>,
{
    dim: D,
    bodies: Vec<Body<D>>,
    ids: Vec<BodyId>,
    index: HashMap<BodyId, usize>,
    tree: BarnesHutTree<D>,
    spring_force: SpringForce,
    drag_force: DragForce,
    integrator: Box<dyn Integrator<D>>,
    time_step: TimeStep,
    rng: SharedRng,
}

impl<D: Dim> Engine<D>
where
    DefaultAllocator: Allocator<D>,
{
    pub fn new(dim: D, settings: &PhysicsSettings, rng: SharedRng) -> Self {
        let mut engine = Self {
            dim,
            bodies: Vec::new(),
            ids: Vec::new(),
            index: HashMap::new(),
            tree: BarnesHutTree::new(dim, TreeOptions::default()),
            spring_force: SpringForce::default(),
            drag_force: DragForce::default(),
            integrator: Box::new(SymplecticEuler),
            time_step: TimeStep::default(),
            rng,
        };
        engine.configure(settings);
        debug!(
            dimensions = dim.value(),
            integrator = engine.integrator.name(),
            "engine created"
        );
        engine
    }

    /// Rebuilds an engine from records of another engine. Axes this engine
    /// has but the records lack are set to `fill`.
    pub fn from_records(
        dim: D,
        records: Vec<BodyRecord>,
        fill: Scalar,
        settings: &PhysicsSettings,
        rng: SharedRng,
    ) -> Self {
        let mut engine = Self::new(dim, settings, rng);
        engine.bodies.reserve(records.len());
        engine.ids.reserve(records.len());

        for record in records {
            let body = Body {
                pos: math::padded(dim, &record.pos, fill),
                force: math::padded(dim, &record.force, fill),
                velocity: math::padded(dim, &record.velocity, fill),
                mass: record.mass,
                is_pinned: record.is_pinned,
                spring_count: 0,
                spring_length: 0.0,
            };
            engine.push(record.id, body);
        }
        engine
    }

    /// Tears the engine down into records plus its random source.
    pub fn into_records(self) -> (Vec<BodyRecord>, SharedRng) {
        let records = self
            .ids
            .iter()
            .zip(&self.bodies)
            .map(|(&id, body)| BodyRecord {
                id,
                pos: body.pos.as_slice().to_vec(),
                force: body.force.as_slice().to_vec(),
                velocity: body.velocity.as_slice().to_vec(),
                mass: body.mass,
                is_pinned: body.is_pinned,
            })
            .collect();
        (records, self.rng)
    }

    /// Pushes the current settings into the tree, forces and integrator.
    pub fn configure(&mut self, settings: &PhysicsSettings) {
        self.tree.set_options(TreeOptions {
            gravity: settings.gravity,
            theta: settings.theta,
        });
        self.spring_force = SpringForce::new(settings.spring_length, settings.spring_coefficient);
        self.drag_force = DragForce::new(settings.drag_coefficient);
        self.time_step = TimeStep {
            dt: settings.time_step,
            adaptive_weight: settings.adaptive_time_step_weight,
        };
    }

    pub fn dim(&self) -> D {
        self.dim
    }

    pub fn tree(&self) -> &BarnesHutTree<D> {
        &self.tree
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    pub fn ids(&self) -> &[BodyId] {
        &self.ids
    }

    pub fn bodies(&self) -> &[Body<D>] {
        &self.bodies
    }

    pub fn contains(&self, id: BodyId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn body(&self, id: BodyId) -> Option<&Body<D>> {
        self.index.get(&id).map(|&i| &self.bodies[i])
    }

    pub fn body_mut(&mut self, id: BodyId) -> Option<&mut Body<D>> {
        self.index.get(&id).map(|&i| &mut self.bodies[i])
    }

    pub fn view(&self, id: BodyId) -> Option<BodyView<'_>> {
        self.body(id).map(|body| BodyView::new(id, body))
    }

    fn push(&mut self, id: BodyId, body: Body<D>) {
        self.index.insert(id, self.bodies.len());
        self.ids.push(id);
        self.bodies.push(body);
    }

    pub fn add_body(&mut self, id: BodyId, body: Body<D>) -> Result<()> {
        if self.contains(id) {
            return Err(SimulationError::DuplicateBody(id));
        }
        self.push(id, body);
        Ok(())
    }

    /// Removes a body in O(1); the last body takes its slot.
    pub fn remove_body(&mut self, id: BodyId) -> Option<Body<D>> {
        let slot = self.index.remove(&id)?;
        let body = self.bodies.swap_remove(slot);
        self.ids.swap_remove(slot);

        if let Some(&moved) = self.ids.get(slot) {
            self.index.insert(moved, slot);
        }
        Some(body)
    }

    /// Runs every registered force, then integrates. Returns the movement
    /// metric of the step.
    pub fn step(
        &mut self,
        forces: &mut ForceRegistry,
        springs: &[Spring],
        settings: &PhysicsSettings,
    ) -> Scalar {
        for body in &mut self.bodies {
            body.reset();
        }

        for (name, force) in forces.iter_mut() {
            trace!(force = name, "applying force");
            match force {
                ForceKind::NBody => self.apply_nbody(),
                ForceKind::Spring => self.apply_springs(springs),
                ForceKind::Custom(force) => force.apply(self, settings),
            }
        }

        self.integrator.integrate(&mut self.bodies, self.time_step)
    }

    /// Rebuilds the tree and adds repulsion and drag to every body that is
    /// free to move.
    pub fn apply_nbody(&mut self) {
        if self.bodies.is_empty() {
            return;
        }

        self.tree.insert_bodies(&mut self.bodies, &mut self.rng);
        for i in (0..self.bodies.len()).rev() {
            if self.bodies[i].is_pinned {
                continue;
            }
            self.tree.update_body_force(i, &mut self.bodies, &mut self.rng);
            self.drag_force.update(&mut self.bodies[i]);
        }
    }

    /// Applies every spring whose endpoints are both registered.
    pub fn apply_springs(&mut self, springs: &[Spring]) {
        for spring in springs {
            let (Some(&from), Some(&to)) = (self.index.get(&spring.from), self.index.get(&spring.to))
            else {
                continue;
            };
            self.spring_force
                .update(spring, from, to, &mut self.bodies, &mut self.rng);
        }
    }

    /// Tight box around all bodies, all zeros when there are none.
    pub fn bounding_box(&self) -> Aabb<D> {
        Aabb::from_points(self.bodies.iter().map(|body| &body.pos))
            .unwrap_or_else(|| Aabb::zeros(self.dim))
    }

    /// Suggested position for a new body.
    ///
    /// Next to known neighbours: their centroid moved `spring_length` in a
    /// random direction. Without any: the middle of the layout, jittered by
    /// up to half a spring length per axis.
    pub fn best_new_body_position(
        &mut self,
        neighbors: &[BodyId],
        spring_length: Scalar,
    ) -> Vector<D> {
        let mut centroid = math::zeros(self.dim);
        let mut known = 0;
        for body in neighbors.iter().filter_map(|&id| self.body(id)) {
            centroid += &body.pos;
            known += 1;
        }

        if known == 0 {
            let center = self.bounding_box().center();
            let rng = &mut self.rng;
            return center
                + Vector::from_fn_generic(self.dim, U1, |_, _| {
                    (rng.random::<Scalar>() - 0.5) * spring_length
                });
        }

        centroid /= known as Scalar;
        centroid + math::random_unit_vector(self.dim, &mut self.rng) * spring_length
    }

    /// Fails on the first body holding a non-finite position, velocity or
    /// force component.
    pub fn validate(&self) -> Result<()> {
        for (&id, body) in self.ids.iter().zip(&self.bodies) {
            for (vector, values) in [
                ("position", &body.pos),
                ("velocity", &body.velocity),
                ("force", &body.force),
            ] {
                if let Some(axis) = values.iter().position(|value| !value.is_finite()) {
                    return Err(SimulationError::NonFiniteBodyState {
                        body: id,
                        vector,
                        axis: math::axis_name(axis),
                        value: values[axis],
                    });
                }
            }
        }
        Ok(())
    }
}

impl<D: Dim> BodySet for Engine<D>
where
    DefaultAllocator: Allocator<D>,
{
    fn dimensions(&self) -> usize {
        self.dim.value()
    }

    fn len(&self) -> usize {
        self.bodies.len()
    }

    fn body(&self, index: usize) -> Option<BodyView<'_>> {
        let body = self.bodies.get(index)?;
        Some(BodyView::new(self.ids[index], body))
    }

    fn add_force(&mut self, index: usize, force: &[Scalar]) -> bool {
        let Some(body) = self.bodies.get_mut(index) else {
            return false;
        };
        for (sum, &component) in body.force.iter_mut().zip(force) {
            *sum += component;
        }
        true
    }
}
