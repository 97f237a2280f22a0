//! The physics simulator
//!
//! [`PhysicsSimulator`] is the public face of the crate. It owns the
//! springs, the force registry and the settings, and one [`Engine`] for the
//! configured dimension count. Engines for 1 to
//! [`MAX_STATIC_DIMENSIONS`](crate::physics::MAX_STATIC_DIMENSIONS) axes
//! are monomorphized with stack-allocated vectors; any higher count runs on
//! a single heap-backed engine. The simulator moves every body into a new
//! engine when the dimension count changes.

use crate::config::{self, PhysicsSettings, Setting, SettingValue};
use crate::error::{Result, SimulationError};
use crate::physics::aabb::Aabb;
use crate::physics::body::{Body, BodyId, BodyView, Spring, SpringId};
use crate::physics::engine::{BodyRecord, Engine};
use crate::physics::forces::{CustomForce, ForceKind, ForceRegistry};
use crate::physics::math::{self, Scalar};
use crate::resources::SharedRng;
use nalgebra::allocator::Allocator;
use nalgebra::{DefaultAllocator, Dim, Dyn, U1, U2, U3, U4, U5, U6};
use std::collections::HashMap;
use tracing::{debug, info, trace};

/// Value given to axes that a dimension increase adds to existing bodies.
pub const MIGRATION_FILL: Scalar = 1.0;

/// Runs `$body` with `$engine` bound to the active engine, whatever its
/// dimension count.
macro_rules! with_engine {
    ($kernel:expr, $engine:ident => $body:expr) => {
        match $kernel {
            Kernel::D1($engine) => $body,
            Kernel::D2($engine) => $body,
            Kernel::D3($engine) => $body,
            Kernel::D4($engine) => $body,
            Kernel::D5($engine) => $body,
            Kernel::D6($engine) => $body,
            Kernel::Dynamic($engine) => $body,
        }
    };
}

macro_rules! numeric_accessors {
    ($($(#[$meta:meta])* $field:ident, $setter:ident => $setting:ident;)*) => {
        $(
            $(#[$meta])*
            pub fn $field(&self) -> Scalar {
                self.settings.$field
            }

            pub fn $setter(&mut self, value: Scalar) -> Result<&mut Self> {
                self.set_number(Setting::$setting, value)?;
                Ok(self)
            }
        )*
    };
}

#[derive(Debug)]
enum Kernel {
    D1(Engine<U1>),
    D2(Engine<U2>),
    D3(Engine<U3>),
    D4(Engine<U4>),
    D5(Engine<U5>),
    D6(Engine<U6>),
    Dynamic(Engine<Dyn>),
}

impl Kernel {
    fn from_records(
        dimensions: usize,
        records: Vec<BodyRecord>,
        settings: &PhysicsSettings,
        rng: SharedRng,
    ) -> Result<Self> {
        let fill = MIGRATION_FILL;
        Ok(match config::check_dimensions(dimensions)? {
            1 => Kernel::D1(Engine::from_records(U1, records, fill, settings, rng)),
            2 => Kernel::D2(Engine::from_records(U2, records, fill, settings, rng)),
            3 => Kernel::D3(Engine::from_records(U3, records, fill, settings, rng)),
            4 => Kernel::D4(Engine::from_records(U4, records, fill, settings, rng)),
            5 => Kernel::D5(Engine::from_records(U5, records, fill, settings, rng)),
            6 => Kernel::D6(Engine::from_records(U6, records, fill, settings, rng)),
            n => Kernel::Dynamic(Engine::from_records(Dyn(n), records, fill, settings, rng)),
        })
    }

    fn into_records(self) -> (Vec<BodyRecord>, SharedRng) {
        with_engine!(self, engine => engine.into_records())
    }

    fn is_dynamic(&self) -> bool {
        matches!(self, Kernel::Dynamic(_))
    }
}

/// Initial state of a body handed to [`PhysicsSimulator::add_body`].
///
/// Components are given as plain slices so callers need not know the
/// dimension count; missing components are 0 and surplus ones are dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyState {
    pub position: Vec<Scalar>,
    pub velocity: Vec<Scalar>,
    pub mass: Scalar,
    pub is_pinned: bool,
}

impl Default for BodyState {
    fn default() -> Self {
        Self {
            position: Vec::new(),
            velocity: Vec::new(),
            mass: 1.0,
            is_pinned: false,
        }
    }
}

impl BodyState {
    pub fn at(position: &[Scalar]) -> Self {
        Self {
            position: position.to_vec(),
            ..Default::default()
        }
    }

    pub fn with_velocity(mut self, velocity: &[Scalar]) -> Self {
        self.velocity = velocity.to_vec();
        self
    }

    pub fn with_mass(mut self, mass: Scalar) -> Self {
        self.mass = mass;
        self
    }

    pub fn pinned(mut self) -> Self {
        self.is_pinned = true;
        self
    }

    fn to_body<D: Dim>(&self, dim: D) -> Body<D>
    where
        DefaultAllocator: Allocator<D>,
    {
        let mut body = Body::at(dim, &self.position)
            .with_velocity(math::from_components(dim, &self.velocity))
            .with_mass(self.mass);
        body.is_pinned = self.is_pinned;
        body
    }
}

/// Axis-aligned box with one entry per dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundingBox {
    pub min: Vec<Scalar>,
    pub max: Vec<Scalar>,
}

impl BoundingBox {
    pub fn center(&self) -> Vec<Scalar> {
        self.min
            .iter()
            .zip(&self.max)
            .map(|(min, max)| (min + max) * 0.5)
            .collect()
    }
}

impl<D: Dim> From<Aabb<D>> for BoundingBox
where
    DefaultAllocator: Allocator<D>,
{
    fn from(bounds: Aabb<D>) -> Self {
        Self {
            min: bounds.min.as_slice().to_vec(),
            max: bounds.max.as_slice().to_vec(),
        }
    }
}

#[derive(Debug)]
pub struct PhysicsSimulator {
    settings: PhysicsSettings,
    kernel: Kernel,
    springs: Vec<Spring>,
    spring_ids: Vec<SpringId>,
    spring_index: HashMap<SpringId, usize>,
    forces: ForceRegistry,
    last_movement: Scalar,
    iteration: u64,
}

impl Default for PhysicsSimulator {
    fn default() -> Self {
        let settings = PhysicsSettings::default();
        let kernel = Kernel::D2(Engine::new(
            U2,
            &settings,
            SharedRng::from_optional_seed(settings.seed),
        ));
        Self::assemble(settings, kernel)
    }
}

impl PhysicsSimulator {
    /// Creates a simulator with the standard `nbody` and `spring` forces.
    pub fn new(settings: PhysicsSettings) -> Result<Self> {
        settings.validate()?;

        let rng = SharedRng::from_optional_seed(settings.seed);
        let kernel = Kernel::from_records(settings.dimensions, Vec::new(), &settings, rng)?;
        Ok(Self::assemble(settings, kernel))
    }

    fn assemble(settings: PhysicsSettings, kernel: Kernel) -> Self {
        Self {
            settings,
            kernel,
            springs: Vec::new(),
            spring_ids: Vec::new(),
            spring_index: HashMap::new(),
            forces: ForceRegistry::new().with_standard_forces(),
            last_movement: 0.0,
            iteration: 0,
        }
    }

    pub fn settings(&self) -> &PhysicsSettings {
        &self.settings
    }

    /// Performs one step: every registered force in order, then the
    /// integrator. Returns the movement metric of the step.
    ///
    /// In debug mode the step fails if any body ends up with a non-finite
    /// position, velocity or force.
    pub fn step(&mut self) -> Result<Scalar> {
        let movement = with_engine!(&mut self.kernel, engine => {
            engine.step(&mut self.forces, &self.springs, &self.settings)
        });

        self.last_movement = movement;
        self.iteration += 1;
        trace!(iteration = self.iteration, movement, "step complete");

        if self.settings.debug {
            with_engine!(&self.kernel, engine => engine.validate())?;
        }
        Ok(movement)
    }

    /// Movement metric of the last step, 0 before the first one.
    pub fn last_movement(&self) -> Scalar {
        self.last_movement
    }

    /// Number of completed steps.
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// Whether the average movement per body in the last step fell to
    /// `stable_threshold` or below. An empty simulator is always stable.
    pub fn is_stable(&self) -> bool {
        match self.body_count() {
            0 => true,
            count => self.last_movement / count as Scalar <= self.settings.stable_threshold,
        }
    }

    pub fn add_body(&mut self, id: BodyId, state: BodyState) -> Result<()> {
        if self.settings.debug {
            math::ensure_finite(&state.position)?;
            math::ensure_finite(&state.velocity)?;
        }

        with_engine!(&mut self.kernel, engine => {
            let body = state.to_body(engine.dim());
            engine.add_body(id, body)
        })?;
        debug!(body = %id, "added body");
        Ok(())
    }

    pub fn add_body_at(&mut self, id: BodyId, position: &[Scalar]) -> Result<()> {
        if position.is_empty() {
            return Err(SimulationError::MissingPosition);
        }
        self.add_body(id, BodyState::at(position))
    }

    /// Removes a body. Springs attached to it stay registered and are
    /// skipped until their endpoint comes back or they are removed.
    pub fn remove_body(&mut self, id: BodyId) -> bool {
        let removed = with_engine!(&mut self.kernel, engine => engine.remove_body(id).is_some());
        if removed {
            debug!(body = %id, "removed body");
        }
        removed
    }

    pub fn contains_body(&self, id: BodyId) -> bool {
        with_engine!(&self.kernel, engine => engine.contains(id))
    }

    pub fn body(&self, id: BodyId) -> Option<BodyView<'_>> {
        with_engine!(&self.kernel, engine => engine.view(id))
    }

    pub fn position(&self, id: BodyId) -> Option<&[Scalar]> {
        with_engine!(&self.kernel, engine => engine.body(id).map(|body| body.pos.as_slice()))
    }

    /// Every body in storage order.
    pub fn bodies(&self) -> Vec<BodyView<'_>> {
        with_engine!(&self.kernel, engine => {
            engine
                .ids()
                .iter()
                .zip(engine.bodies())
                .map(|(&id, body)| BodyView::new(id, body))
                .collect()
        })
    }

    pub fn body_ids(&self) -> &[BodyId] {
        with_engine!(&self.kernel, engine => engine.ids())
    }

    pub fn body_count(&self) -> usize {
        with_engine!(&self.kernel, engine => engine.len())
    }

    /// Moves a body; omitted coordinates become 0.
    pub fn set_body_position(&mut self, id: BodyId, position: &[Scalar]) -> Result<()> {
        let debug = self.settings.debug;
        with_engine!(&mut self.kernel, engine => {
            let body = engine.body_mut(id).ok_or(SimulationError::UnknownBody(id))?;
            if debug {
                body.try_set_position(position)
            } else {
                body.set_position(position);
                Ok(())
            }
        })
    }

    pub fn set_body_velocity(&mut self, id: BodyId, velocity: &[Scalar]) -> Result<()> {
        if self.settings.debug {
            math::ensure_finite(velocity)?;
        }
        with_engine!(&mut self.kernel, engine => {
            let body = engine.body_mut(id).ok_or(SimulationError::UnknownBody(id))?;
            body.velocity = math::from_components(body.dim(), velocity);
            Ok(())
        })
    }

    pub fn set_body_mass(&mut self, id: BodyId, mass: Scalar) -> Result<()> {
        with_engine!(&mut self.kernel, engine => {
            let body = engine.body_mut(id).ok_or(SimulationError::UnknownBody(id))?;
            body.mass = mass;
            Ok(())
        })
    }

    /// Pinned bodies keep their position and velocity; forces still act on
    /// their neighbours.
    pub fn pin_body(&mut self, id: BodyId, pinned: bool) -> Result<()> {
        with_engine!(&mut self.kernel, engine => {
            let body = engine.body_mut(id).ok_or(SimulationError::UnknownBody(id))?;
            body.is_pinned = pinned;
            Ok(())
        })
    }

    pub fn is_body_pinned(&self, id: BodyId) -> Option<bool> {
        with_engine!(&self.kernel, engine => engine.body(id).map(|body| body.is_pinned))
    }

    /// Registers a spring under `id`. Both endpoints must already exist.
    pub fn add_spring(&mut self, id: SpringId, spring: Spring) -> Result<()> {
        if self.spring_index.contains_key(&id) {
            return Err(SimulationError::DuplicateSpring(id));
        }
        for endpoint in [spring.from, spring.to] {
            if !self.contains_body(endpoint) {
                return Err(SimulationError::UnknownBody(endpoint));
            }
        }

        self.spring_index.insert(id, self.springs.len());
        self.spring_ids.push(id);
        self.springs.push(spring);
        debug!(spring = %id, from = %spring.from, to = %spring.to, "added spring");
        Ok(())
    }

    pub fn remove_spring(&mut self, id: SpringId) -> bool {
        let Some(slot) = self.spring_index.remove(&id) else {
            return false;
        };

        self.springs.swap_remove(slot);
        self.spring_ids.swap_remove(slot);
        if let Some(&moved) = self.spring_ids.get(slot) {
            self.spring_index.insert(moved, slot);
        }
        debug!(spring = %id, "removed spring");
        true
    }

    pub fn spring(&self, id: SpringId) -> Option<&Spring> {
        self.spring_index.get(&id).map(|&slot| &self.springs[slot])
    }

    /// Current positions of both ends of a spring.
    pub fn spring_endpoints(&self, id: SpringId) -> Option<(&[Scalar], &[Scalar])> {
        let spring = self.spring(id)?;
        Some((self.position(spring.from)?, self.position(spring.to)?))
    }

    pub fn springs(&self) -> impl Iterator<Item = (SpringId, &Spring)> {
        self.spring_ids.iter().copied().zip(&self.springs)
    }

    pub fn spring_count(&self) -> usize {
        self.springs.len()
    }

    /// Box around all bodies, recomputed on every call. All zeros when the
    /// simulator is empty.
    pub fn bounding_box(&self) -> BoundingBox {
        with_engine!(&self.kernel, engine => engine.bounding_box().into())
    }

    /// Suggested position for a new body connected to `neighbors`.
    /// Unknown ids are ignored.
    pub fn best_new_body_position(&mut self, neighbors: &[BodyId]) -> Vec<Scalar> {
        let spring_length = self.settings.spring_length;
        with_engine!(&mut self.kernel, engine => {
            engine
                .best_new_body_position(neighbors, spring_length)
                .as_slice()
                .to_vec()
        })
    }

    /// Adds a force that runs after every force registered so far.
    pub fn add_force(&mut self, name: &str, force: impl CustomForce + 'static) -> Result<()> {
        self.forces.register(name, ForceKind::Custom(Box::new(force)))
    }

    /// Registers any force kind, e.g. to put a removed standard force back.
    pub fn add_force_kind(&mut self, name: &str, force: ForceKind) -> Result<()> {
        self.forces.register(name, force)
    }

    pub fn remove_force(&mut self, name: &str) -> bool {
        self.forces.remove(name)
    }

    pub fn has_force(&self, name: &str) -> bool {
        self.forces.contains(name)
    }

    /// Force names in the order they run.
    pub fn force_names(&self) -> Vec<&str> {
        self.forces.names()
    }

    /// Nodes used by the last tree rebuild and nodes allocated in total.
    pub fn tree_pool_stats(&self) -> (usize, usize) {
        with_engine!(&self.kernel, engine => engine.tree().pool_stats())
    }

    numeric_accessors! {
        /// Rest length of springs without their own length.
        spring_length, set_spring_length => SpringLength;
        /// Stiffness of springs without their own coefficient.
        spring_coefficient, set_spring_coefficient => SpringCoefficient;
        /// Pairwise coupling; negative values repel.
        gravity, set_gravity => Gravity;
        /// Barnes-Hut opening criterion.
        theta, set_theta => Theta;
        drag_coefficient, set_drag_coefficient => DragCoefficient;
        time_step, set_time_step => TimeStep;
        adaptive_time_step_weight, set_adaptive_time_step_weight => AdaptiveTimeStepWeight;
        stable_threshold, set_stable_threshold => StableThreshold;
    }

    fn set_number(&mut self, setting: Setting, value: Scalar) -> Result<()> {
        self.settings.set_number(setting, value)?;
        with_engine!(&mut self.kernel, engine => engine.configure(&self.settings));
        Ok(())
    }

    pub fn debug(&self) -> bool {
        self.settings.debug
    }

    pub fn set_debug(&mut self, debug: bool) -> &mut Self {
        self.settings.debug = debug;
        self
    }

    pub fn dimensions(&self) -> usize {
        self.settings.dimensions
    }

    /// Switches to `dimensions` axes. Every body keeps its existing
    /// coordinates; axes that are added start at 1 and axes that are
    /// removed are dropped.
    pub fn set_dimensions(&mut self, dimensions: usize) -> Result<&mut Self> {
        config::check_dimensions(dimensions)?;
        if dimensions == self.settings.dimensions {
            return Ok(self);
        }

        let placeholder = Kernel::D1(Engine::new(U1, &self.settings, SharedRng::from_seed(0)));
        let (records, rng) = std::mem::replace(&mut self.kernel, placeholder).into_records();
        self.kernel = Kernel::from_records(dimensions, records, &self.settings, rng)?;

        info!(
            from = self.settings.dimensions,
            to = dimensions,
            bodies = self.body_count(),
            heap_vectors = self.kernel.is_dynamic(),
            "changed simulation dimensions"
        );
        self.settings.dimensions = dimensions;
        Ok(self)
    }

    /// Reads any setting by key.
    pub fn setting(&self, setting: Setting) -> SettingValue {
        self.settings.get(setting)
    }

    /// Writes any setting by key, with the same checks as the dedicated
    /// setters. Dimensions also accept a whole [`SettingValue::Number`].
    pub fn set_setting(&mut self, setting: Setting, value: impl Into<SettingValue>) -> Result<()> {
        match (setting, value.into()) {
            (Setting::Dimensions, SettingValue::Count(dimensions)) => {
                self.set_dimensions(dimensions)?;
            }
            (Setting::Dimensions, SettingValue::Number(value)) => {
                self.set_dimensions(config::dimensions_from(value)?)?;
            }
            (Setting::Debug, SettingValue::Flag(debug)) => {
                self.set_debug(debug);
            }
            (setting, SettingValue::Number(value)) if setting.numeric().is_some() => {
                self.set_number(setting, value)?;
            }
            (setting, _) => {
                return Err(SimulationError::SettingType {
                    setting: setting.name(),
                    expected: setting.value_type(),
                });
            }
        }
        Ok(())
    }

    /// Reads a setting by its snake_case or camelCase name.
    pub fn setting_by_name(&self, name: &str) -> Result<SettingValue> {
        Ok(self.setting(name.parse()?))
    }

    /// Writes a setting by its snake_case or camelCase name.
    pub fn set_setting_by_name(&mut self, name: &str, value: impl Into<SettingValue>) -> Result<()> {
        self.set_setting(name.parse()?, value)
    }
}
