//! Error type shared by the simulator, its kernels and the settings loader

use crate::physics::body::{BodyId, SpringId};
use crate::physics::math::Scalar;
use thiserror::Error;

/// Everything that can go wrong at the public surface of the crate.
///
/// Numerical trouble inside a step (coincident bodies, zero-length springs)
/// is resolved internally and never shows up here; these variants are
/// configuration and programmer errors, reported at the offending call.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("{old} was renamed to {new}")]
    RenamedSetting { old: String, new: &'static str },

    #[error("unknown setting '{0}'")]
    UnknownSetting(String),

    #[error("value of {setting} should be a valid number, got {value}")]
    NonFiniteSetting { setting: &'static str, value: Scalar },

    #[error("setting {setting} expects a {expected} value")]
    SettingType {
        setting: &'static str,
        expected: &'static str,
    },

    #[error("dimensions must be set to integer greater than zero, got {0}")]
    InvalidDimensions(Scalar),

    #[error("force {0} is already added")]
    DuplicateForce(String),

    #[error("body {0} already exists")]
    DuplicateBody(BodyId),

    #[error("spring key {0} already exists")]
    DuplicateSpring(SpringId),

    #[error("body {0} is not registered with the simulator")]
    UnknownBody(BodyId),

    #[error("body position is required")]
    MissingPosition,

    #[error("cannot set non-finite value {value} to {axis}")]
    NonFiniteCoordinate { axis: String, value: Scalar },

    #[error("body {body} has a non-finite {vector} at {axis}: {value}")]
    NonFiniteBodyState {
        body: BodyId,
        vector: &'static str,
        axis: String,
        value: Scalar,
    },

    #[error("failed to load configuration: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("failed to parse configuration: {0}")]
    Deserialize(#[from] toml::de::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = SimulationError> = std::result::Result<T, E>;
