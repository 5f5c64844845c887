//! Configuration system
//!
//! The lighting capacities are specialization constants: they are fixed when the
//! shading pipeline is built, and changing them means rebuilding that pipeline.
//! [`LightingConfig`] is the build-time surface that carries them, loadable from
//! TOML or RON like every other configuration file.

pub use serde::{Serialize, Deserialize};

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(ConfigError::Io)?;

        // Try different formats
        if path.ends_with(".toml") {
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else if path.ends_with(".ron") {
            ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            Err(ConfigError::UnsupportedFormat(path.to_string()))
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = if path.ends_with(".toml") {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else if path.ends_with(".ron") {
            ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.to_string()));
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A capacity value the shading stage cannot be specialized with
    #[error("Invalid capacity for {field}: {value}")]
    InvalidCapacity {
        /// Name of the offending field
        field: &'static str,
        /// Rejected value
        value: usize,
    },
}

/// Default capacity for each light type, matching the shader's fallback value
pub const DEFAULT_MAX_LIGHTS_PER_TYPE: usize = 32;

/// Default number of shadow map slots
pub const DEFAULT_MAX_SHADOW_MAPS: usize = 16;

/// # Lighting Configuration
///
/// Per-type light capacities and the shadow map table size. Each field maps to
/// one specialization constant of the lighting shader:
///
/// | field                    | `constant_id` |
/// |--------------------------|---------------|
/// | `max_point_lights`       | 0             |
/// | `max_spot_lights`        | 1             |
/// | `max_directional_lights` | 2             |
/// | `max_shadow_maps`        | 3             |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingConfig {
    /// Capacity of the point light array
    pub max_point_lights: usize,
    /// Capacity of the spot light array
    pub max_spot_lights: usize,
    /// Capacity of the directional light array
    pub max_directional_lights: usize,
    /// Number of shadow map slots
    pub max_shadow_maps: usize,
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            max_point_lights: DEFAULT_MAX_LIGHTS_PER_TYPE,
            max_spot_lights: DEFAULT_MAX_LIGHTS_PER_TYPE,
            max_directional_lights: DEFAULT_MAX_LIGHTS_PER_TYPE,
            max_shadow_maps: DEFAULT_MAX_SHADOW_MAPS,
        }
    }
}

impl Config for LightingConfig {}

impl LightingConfig {
    /// Create a configuration with explicit capacities
    pub fn new(
        max_point_lights: usize,
        max_spot_lights: usize,
        max_directional_lights: usize,
        max_shadow_maps: usize,
    ) -> Self {
        Self {
            max_point_lights,
            max_spot_lights,
            max_directional_lights,
            max_shadow_maps,
        }
    }

    /// Validate that every capacity can be expressed as a GLSL `int` constant
    ///
    /// Zero-sized arrays are not valid GLSL, so every capacity must be at least one.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("max_point_lights", self.max_point_lights),
            ("max_spot_lights", self.max_spot_lights),
            ("max_directional_lights", self.max_directional_lights),
            ("max_shadow_maps", self.max_shadow_maps),
        ];

        for (field, value) in fields {
            if value == 0 || i32::try_from(value).is_err() {
                return Err(ConfigError::InvalidCapacity { field, value });
            }
        }
        Ok(())
    }

    /// Load and validate a configuration file
    pub fn load_validated(path: &str) -> Result<Self, ConfigError> {
        let config = Self::load_from_file(path)?;
        config.validate()?;
        log::debug!("Loaded lighting config from {}: {:?}", path, config);
        Ok(config)
    }

    /// Specialization constant values in `constant_id` order
    pub fn specialization_values(&self) -> [i32; 4] {
        [
            self.max_point_lights as i32,
            self.max_spot_lights as i32,
            self.max_directional_lights as i32,
            self.max_shadow_maps as i32,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> String {
        let mut path = std::env::temp_dir();
        path.push(format!("rust_lighting_{}_{}", std::process::id(), name));
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_default_capacities_match_shader_fallbacks() {
        let config = LightingConfig::default();
        assert_eq!(config.specialization_values(), [32, 32, 32, 16]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = LightingConfig::new(8, 0, 4, 4);
        match config.validate() {
            Err(ConfigError::InvalidCapacity { field, value }) => {
                assert_eq!(field, "max_spot_lights");
                assert_eq!(value, 0);
            }
            other => panic!("expected InvalidCapacity, got {:?}", other),
        }
    }

    #[test]
    fn test_toml_partial_file_uses_defaults() {
        let config: LightingConfig = toml::from_str("max_point_lights = 8\n").unwrap();
        assert_eq!(config.max_point_lights, 8);
        assert_eq!(config.max_shadow_maps, DEFAULT_MAX_SHADOW_MAPS);
    }

    #[test]
    fn test_save_and_load_ron() {
        let path = temp_path("lighting.ron");
        let config = LightingConfig::new(4, 2, 1, 8);
        config.save_to_file(&path).unwrap();

        let loaded = LightingConfig::load_validated(&path).unwrap();
        assert_eq!(loaded, config);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_save_and_load_toml() {
        let path = temp_path("lighting.toml");
        let config = LightingConfig::new(16, 8, 2, 4);
        config.save_to_file(&path).unwrap();

        let loaded = LightingConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_unsupported_extension() {
        let result = LightingConfig::default().save_to_file("lighting.json");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }
}
