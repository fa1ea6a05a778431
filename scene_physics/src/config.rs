//! Configuration types for the physics layer

use crate::error::ConfigError;
use crate::physics::solver::TimestepPolicy;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Simulation settings shared by the step driver and the solver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Gravity applied to every dynamic body
    pub gravity: Vec3,
    /// Fixed step frequency in Hz
    pub step_frequency: f32,
    /// Maximum number of fixed steps used to catch up with the wall clock.
    /// Zero selects a variable timestep, which is not deterministic across frame rates.
    pub max_sub_steps: u32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -10.0, 0.0),
            step_frequency: 60.0,
            max_sub_steps: 10,
        }
    }
}

impl PhysicsConfig {
    /// Parse and validate a configuration from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&text)?;
        debug!(path = ?path, config = ?config, "Loaded physics configuration");
        Ok(config)
    }

    /// Check that the settings describe a usable simulation
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.step_frequency.is_finite() || self.step_frequency <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "step_frequency must be positive, got {}",
                self.step_frequency
            )));
        }

        if !self.gravity.is_finite() {
            return Err(ConfigError::Invalid(format!(
                "gravity must be finite, got {:?}",
                self.gravity
            )));
        }

        Ok(())
    }

    /// Length of one fixed step in seconds
    pub fn fixed_timestep(&self) -> f32 {
        1.0 / self.step_frequency
    }

    /// The stepping policy these settings select
    pub fn timestep_policy(&self) -> TimestepPolicy {
        if self.max_sub_steps > 0 {
            TimestepPolicy::Fixed {
                timestep: self.fixed_timestep(),
                max_sub_steps: self.max_sub_steps,
            }
        } else {
            TimestepPolicy::Variable
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = PhysicsConfig::default();
        assert_eq!(config.gravity, Vec3::new(0.0, -10.0, 0.0));
        assert_eq!(config.step_frequency, 60.0);
        assert_eq!(config.max_sub_steps, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_timestep_policy() {
        let fixed = PhysicsConfig::default();
        match fixed.timestep_policy() {
            TimestepPolicy::Fixed {
                timestep,
                max_sub_steps,
            } => {
                assert!((timestep - 1.0 / 60.0).abs() < 1e-6);
                assert_eq!(max_sub_steps, 10);
            }
            TimestepPolicy::Variable => panic!("expected fixed policy"),
        }

        let variable = PhysicsConfig {
            max_sub_steps: 0,
            ..Default::default()
        };
        assert_eq!(variable.timestep_policy(), TimestepPolicy::Variable);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = PhysicsConfig::from_json_str(r#"{ "step_frequency": 120.0 }"#).unwrap();
        assert_eq!(config.step_frequency, 120.0);
        assert_eq!(config.max_sub_steps, 10);
        assert_eq!(config.gravity, Vec3::new(0.0, -10.0, 0.0));
    }

    #[test]
    fn test_rejects_non_positive_frequency() {
        let result = PhysicsConfig::from_json_str(r#"{ "step_frequency": 0.0 }"#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_malformed_json() {
        let result = PhysicsConfig::from_json_str("{ not json");
        assert!(matches!(result, Err(ConfigError::Json(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "gravity": [0.0, -1.62, 0.0], "max_sub_steps": 0 }}"#
        )
        .unwrap();

        let config = PhysicsConfig::load(file.path()).unwrap();
        assert_eq!(config.gravity, Vec3::new(0.0, -1.62, 0.0));
        assert_eq!(config.timestep_policy(), TimestepPolicy::Variable);
    }

    #[test]
    fn test_load_missing_file() {
        let result = PhysicsConfig::load("definitely/not/here.json");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
