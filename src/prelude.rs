//! Forcelayout prelude module
//!
//! Re-exports the types most callers of the simulator need.

pub use rand::Rng;

pub use crate::config::{PhysicsSettings, Setting, SettingValue};
pub use crate::error::{Result, SimulationError};
pub use crate::physics::MAX_STATIC_DIMENSIONS;
pub use crate::physics::body::{BodyId, BodyView, Spring, SpringId, USE_GLOBAL};
pub use crate::physics::forces::{BodySet, CustomForce, ForceKind};
pub use crate::physics::math::{Scalar, Vector};
pub use crate::resources::SharedRng;
pub use crate::simulator::{BodyState, BoundingBox, PhysicsSimulator};
