//! Tunable physics settings and their persistence

use crate::error::{Result, SimulationError};
use crate::physics::math::Scalar;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

const ENV_PREFIX: &str = "FORCELAYOUT";
const CONFIG_FILE_NAME: &str = "forcelayout.toml";

/// Setting names that were renamed, mapped to their replacement.
const RENAMED_SETTINGS: [(&str, Setting); 4] = [
    ("springCoeff", Setting::SpringCoefficient),
    ("spring_coeff", Setting::SpringCoefficient),
    ("dragCoeff", Setting::DragCoefficient),
    ("drag_coeff", Setting::DragCoefficient),
];

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct PhysicsSettings {
    /// Rest length of springs without their own length.
    #[serde(alias = "springLength")]
    pub spring_length: Scalar,
    /// Hooke's-law stiffness of springs without their own coefficient.
    #[serde(alias = "springCoefficient")]
    pub spring_coefficient: Scalar,
    /// Coulomb-like coupling between all bodies; negative values repel.
    pub gravity: Scalar,
    /// Barnes-Hut opening criterion. Smaller is more accurate and slower.
    pub theta: Scalar,
    #[serde(alias = "dragCoefficient")]
    pub drag_coefficient: Scalar,
    #[serde(alias = "timeStep")]
    pub time_step: Scalar,
    /// Enables the per-body adaptive timestep when non-zero.
    #[serde(alias = "adaptiveTimeStepWeight")]
    pub adaptive_time_step_weight: Scalar,
    /// Average movement per body below which the layout counts as stable.
    #[serde(alias = "stableThreshold")]
    pub stable_threshold: Scalar,
    pub dimensions: usize,
    /// Validates every body after each step and rejects non-finite writes.
    pub debug: bool,
    /// Seed for jitter and placement. `None` draws one from the OS.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for PhysicsSettings {
    fn default() -> Self {
        Self {
            spring_length: 10.0,
            spring_coefficient: 0.8,
            gravity: -12.0,
            theta: 0.8,
            drag_coefficient: 0.9,
            time_step: 0.5,
            adaptive_time_step_weight: 0.0,
            stable_threshold: 0.01,
            dimensions: 2,
            debug: false,
            seed: Some(42),
        }
    }
}

/// Every setting of [`PhysicsSettings`] that can be read and written by key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Setting {
    SpringLength,
    SpringCoefficient,
    Gravity,
    Theta,
    DragCoefficient,
    TimeStep,
    AdaptiveTimeStepWeight,
    StableThreshold,
    Dimensions,
    Debug,
}

impl Setting {
    pub const ALL: [Setting; 10] = [
        Setting::SpringLength,
        Setting::SpringCoefficient,
        Setting::Gravity,
        Setting::Theta,
        Setting::DragCoefficient,
        Setting::TimeStep,
        Setting::AdaptiveTimeStepWeight,
        Setting::StableThreshold,
        Setting::Dimensions,
        Setting::Debug,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Setting::SpringLength => "spring_length",
            Setting::SpringCoefficient => "spring_coefficient",
            Setting::Gravity => "gravity",
            Setting::Theta => "theta",
            Setting::DragCoefficient => "drag_coefficient",
            Setting::TimeStep => "time_step",
            Setting::AdaptiveTimeStepWeight => "adaptive_time_step_weight",
            Setting::StableThreshold => "stable_threshold",
            Setting::Dimensions => "dimensions",
            Setting::Debug => "debug",
        }
    }

    pub fn camel_case_name(self) -> &'static str {
        match self {
            Setting::SpringLength => "springLength",
            Setting::SpringCoefficient => "springCoefficient",
            Setting::DragCoefficient => "dragCoefficient",
            Setting::TimeStep => "timeStep",
            Setting::AdaptiveTimeStepWeight => "adaptiveTimeStepWeight",
            Setting::StableThreshold => "stableThreshold",
            other => other.name(),
        }
    }

    /// Kind of value the setting holds, as named in type errors.
    pub fn value_type(self) -> &'static str {
        match self {
            Setting::Dimensions => "integer",
            Setting::Debug => "boolean",
            _ => "number",
        }
    }

    /// Accessor row for plain numeric settings, `None` for `dimensions`
    /// and `debug`.
    pub fn numeric(self) -> Option<&'static NumericSetting> {
        NUMERIC_SETTINGS.iter().find(|row| row.setting == self)
    }
}

impl fmt::Display for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Setting {
    type Err = SimulationError;

    fn from_str(key: &str) -> Result<Self> {
        if let Some((old, renamed)) = RENAMED_SETTINGS.iter().find(|(old, _)| *old == key) {
            return Err(SimulationError::RenamedSetting {
                old: (*old).to_string(),
                new: renamed.camel_case_name(),
            });
        }

        Setting::ALL
            .into_iter()
            .find(|setting| setting.name() == key || setting.camel_case_name() == key)
            .ok_or_else(|| SimulationError::UnknownSetting(key.to_string()))
    }
}

/// Value of any setting, used by the keyed accessors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SettingValue {
    Number(Scalar),
    Count(usize),
    Flag(bool),
}

impl From<Scalar> for SettingValue {
    fn from(value: Scalar) -> Self {
        SettingValue::Number(value)
    }
}

impl From<usize> for SettingValue {
    fn from(value: usize) -> Self {
        SettingValue::Count(value)
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        SettingValue::Flag(value)
    }
}

/// One row of the numeric accessor table.
pub struct NumericSetting {
    pub setting: Setting,
    pub get: fn(&PhysicsSettings) -> Scalar,
    pub set: fn(&mut PhysicsSettings, Scalar),
}

impl fmt::Debug for NumericSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NumericSetting")
            .field("setting", &self.setting)
            .finish_non_exhaustive()
    }
}

pub static NUMERIC_SETTINGS: [NumericSetting; 8] = [
    NumericSetting {
        setting: Setting::SpringLength,
        get: |s| s.spring_length,
        set: |s, v| s.spring_length = v,
    },
    NumericSetting {
        setting: Setting::SpringCoefficient,
        get: |s| s.spring_coefficient,
        set: |s, v| s.spring_coefficient = v,
    },
    NumericSetting {
        setting: Setting::Gravity,
        get: |s| s.gravity,
        set: |s, v| s.gravity = v,
    },
    NumericSetting {
        setting: Setting::Theta,
        get: |s| s.theta,
        set: |s, v| s.theta = v,
    },
    NumericSetting {
        setting: Setting::DragCoefficient,
        get: |s| s.drag_coefficient,
        set: |s, v| s.drag_coefficient = v,
    },
    NumericSetting {
        setting: Setting::TimeStep,
        get: |s| s.time_step,
        set: |s, v| s.time_step = v,
    },
    NumericSetting {
        setting: Setting::AdaptiveTimeStepWeight,
        get: |s| s.adaptive_time_step_weight,
        set: |s, v| s.adaptive_time_step_weight = v,
    },
    NumericSetting {
        setting: Setting::StableThreshold,
        get: |s| s.stable_threshold,
        set: |s, v| s.stable_threshold = v,
    },
];

/// Parses a dimension count, accepting only positive whole numbers.
pub fn dimensions_from(value: Scalar) -> Result<usize> {
    if value.is_finite() && value >= 1.0 && value.fract() == 0.0 {
        Ok(value as usize)
    } else {
        Err(SimulationError::InvalidDimensions(value))
    }
}

/// Any positive dimension count is accepted.
pub fn check_dimensions(dimensions: usize) -> Result<usize> {
    match dimensions {
        0 => Err(SimulationError::InvalidDimensions(0.0)),
        n => Ok(n),
    }
}

impl PhysicsSettings {
    pub fn get(&self, setting: Setting) -> SettingValue {
        match (setting, setting.numeric()) {
            (_, Some(row)) => SettingValue::Number((row.get)(self)),
            (Setting::Dimensions, None) => SettingValue::Count(self.dimensions),
            (_, None) => SettingValue::Flag(self.debug),
        }
    }

    /// Writes a numeric setting after checking that the value is finite.
    pub fn set_number(&mut self, setting: Setting, value: Scalar) -> Result<()> {
        let Some(row) = setting.numeric() else {
            return Err(SimulationError::SettingType {
                setting: setting.name(),
                expected: setting.value_type(),
            });
        };

        if !value.is_finite() {
            return Err(SimulationError::NonFiniteSetting {
                setting: setting.camel_case_name(),
                value,
            });
        }

        (row.set)(self, value);
        Ok(())
    }

    /// Checks every field the way the individual setters do.
    pub fn validate(&self) -> Result<()> {
        for row in &NUMERIC_SETTINGS {
            let value = (row.get)(self);
            if !value.is_finite() {
                return Err(SimulationError::NonFiniteSetting {
                    setting: row.setting.camel_case_name(),
                    value,
                });
            }
        }
        check_dimensions(self.dimensions)?;
        Ok(())
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let settings: Self = toml::Value::Table(normalized_table(content)?).try_into()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Loads settings from a TOML file, overlaid with `FORCELAYOUT_*`
    /// environment variables.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let normalized = toml::to_string(&normalized_table(&content)?)?;

        let settings: Self = ::config::Config::builder()
            .add_source(::config::File::from_str(&normalized, ::config::FileFormat::Toml))
            .add_source(::config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;
        settings.validate()?;

        info!("Loaded physics settings from {}", path.display());
        Ok(settings)
    }

    /// Load settings from a file, falling back to defaults if the file doesn't exist
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            info!("Config file {} not found. Using defaults.", path.display());
            return Self::default();
        }

        match Self::load(path) {
            Ok(settings) => settings,
            Err(e) => {
                warn!(
                    "Failed to load config file {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save settings to a file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn load_user_config() -> Self {
        match default_config_path() {
            Some(path) => Self::load_or_default(path),
            None => {
                warn!("No user configuration directory available. Using defaults.");
                Self::default()
            }
        }
    }

    pub fn save_to_user_config(&self) -> Result<PathBuf> {
        let path = default_config_path().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no user configuration directory available",
            )
        })?;
        self.save(&path)?;
        Ok(path)
    }
}

/// Platform configuration path, e.g. `~/.config/forcelayout/forcelayout.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "forcelayout")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

/// Parses TOML settings, failing on renamed keys and rewriting camelCase
/// keys to their snake_case field names.
fn normalized_table(content: &str) -> Result<toml::Table> {
    let table: toml::Table = toml::from_str(content)?;

    let mut normalized = toml::Table::new();
    for (key, value) in table {
        let key = match key.parse::<Setting>() {
            Ok(setting) => setting.name().to_string(),
            Err(e @ SimulationError::RenamedSetting { .. }) => return Err(e),
            Err(_) => key,
        };
        normalized.insert(key, value);
    }
    Ok(normalized)
}
