use log::info;
use serde::Deserialize;
use std::fmt;
use std::path::Path;

/// Level configuration consumed when priming an engine. A value object: the
/// engine copies what it needs at construction and never mutates it.
#[derive(Debug, Clone, Deserialize)]
pub struct LevelConfig {
    /// Pose names the sequence draws from, in ramp order (first name is the
    /// introductory pose).
    pub pose_names: Vec<String>,
    /// Base interval between consecutive target spawns, before the external
    /// speed multiplier is applied.
    pub base_spawn_interval_ms: f32,
    /// Time a target spends approaching: nominal hit time = spawn + approach.
    pub approach_duration_ms: f32,
    /// Base acceptance window half-width before difficulty/consistency scaling.
    pub base_window_ms: f32,
    /// Total number of targets the level schedules. Zero is legal; the level
    /// is complete immediately.
    pub sequence_length: usize,
}

impl LevelConfig {
    /// Rejects configurations the engine must never start with. Steady-state
    /// code relies on these fields being finite and positive.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pose_names.is_empty() {
            return Err(ConfigError::EmptyPoseList);
        }
        for (field, value) in [
            ("base_spawn_interval_ms", self.base_spawn_interval_ms),
            ("approach_duration_ms", self.approach_duration_ms),
            ("base_window_ms", self.base_window_ms),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::OutOfDomain { field, value });
            }
        }
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(&path).map_err(ConfigError::Io)?;
        let config: LevelConfig =
            serde_json::from_str(&content).map_err(ConfigError::Parse)?;
        config.validate()?;
        info!(
            "Loaded level config: {} poses, {} entries, interval {:.0}ms, approach {:.0}ms",
            config.pose_names.len(),
            config.sequence_length,
            config.base_spawn_interval_ms,
            config.approach_duration_ms
        );
        Ok(config)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    EmptyPoseList,
    OutOfDomain { field: &'static str, value: f32 },
    /// A sequence entry references a pose name with no loaded template.
    MissingTemplate(String),
    /// A template failed structural validation (no joints, or a joint with a
    /// non-positive weight).
    InvalidTemplate { name: String, reason: &'static str },
    Io(std::io::Error),
    Parse(serde_json::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyPoseList => write!(f, "level config has an empty pose list"),
            Self::OutOfDomain { field, value } => {
                write!(f, "config field {field} out of domain: {value}")
            }
            Self::MissingTemplate(name) => {
                write!(f, "no pose template loaded for \"{name}\"")
            }
            Self::InvalidTemplate { name, reason } => {
                write!(f, "pose template \"{name}\" is invalid: {reason}")
            }
            Self::Io(e) => write!(f, "failed to read config: {e}"),
            Self::Parse(e) => write!(f, "failed to parse config: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Parse(e) => Some(e),
            _ => None,
        }
    }
}
