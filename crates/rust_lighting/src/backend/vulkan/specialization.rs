//! Specialization constants for the lighting shader
//!
//! The light array capacities and the shadow map count are fixed when the
//! pipeline is built:
//!
//! ```glsl
//! layout(constant_id = 0) const int MAX_POINT_LIGHTS = 32;
//! layout(constant_id = 1) const int MAX_SPOT_LIGHTS = 32;
//! layout(constant_id = 2) const int MAX_DIRECTIONAL_LIGHTS = 32;
//! layout(constant_id = 3) const int MAX_SHADOW_MAPS = 16;
//! ```

use ash::vk;

use crate::config::{ConfigError, LightingConfig};

/// `constant_id` of `MAX_POINT_LIGHTS`
pub const MAX_POINT_LIGHTS_ID: u32 = 0;
/// `constant_id` of `MAX_SPOT_LIGHTS`
pub const MAX_SPOT_LIGHTS_ID: u32 = 1;
/// `constant_id` of `MAX_DIRECTIONAL_LIGHTS`
pub const MAX_DIRECTIONAL_LIGHTS_ID: u32 = 2;
/// `constant_id` of `MAX_SHADOW_MAPS`
pub const MAX_SHADOW_MAPS_ID: u32 = 3;

const CONSTANT_IDS: [u32; 4] = [
    MAX_POINT_LIGHTS_ID,
    MAX_SPOT_LIGHTS_ID,
    MAX_DIRECTIONAL_LIGHTS_ID,
    MAX_SHADOW_MAPS_ID,
];

/// Specialization data for every shader stage that declares the lighting block
#[derive(Debug, Clone)]
pub struct LightingSpecialization {
    entries: [vk::SpecializationMapEntry; 4],
    data: [i32; 4],
}

impl LightingSpecialization {
    /// Build specialization data from a validated configuration
    pub fn new(config: &LightingConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let size = std::mem::size_of::<i32>();
        let entries = CONSTANT_IDS.map(|constant_id| vk::SpecializationMapEntry {
            constant_id,
            offset: constant_id * size as u32,
            size,
        });

        Ok(Self {
            entries,
            data: config.specialization_values(),
        })
    }

    /// Map entries in `constant_id` order
    pub fn entries(&self) -> &[vk::SpecializationMapEntry] {
        &self.entries
    }

    /// Raw constant data
    pub fn data(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }

    /// Specialization info borrowing this data
    pub fn info(&self) -> vk::SpecializationInfoBuilder<'_> {
        vk::SpecializationInfo::builder()
            .map_entries(&self.entries)
            .data(self.data())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_follow_constant_ids() {
        let specialization = LightingSpecialization::new(&LightingConfig::new(8, 4, 2, 6)).unwrap();

        for (i, entry) in specialization.entries().iter().enumerate() {
            assert_eq!(entry.constant_id, i as u32);
            assert_eq!(entry.offset, 4 * i as u32);
            assert_eq!(entry.size, 4);
        }

        let values: Vec<i32> = specialization
            .data()
            .chunks_exact(4)
            .map(|chunk| i32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        assert_eq!(values, vec![8, 4, 2, 6]);
    }

    #[test]
    fn test_info_counts() {
        let specialization = LightingSpecialization::new(&LightingConfig::default()).unwrap();
        let info = specialization.info();
        assert_eq!(info.map_entry_count, 4);
        assert_eq!(info.data_size, 16);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = LightingSpecialization::new(&LightingConfig::new(1, 1, 1, 0));
        assert!(matches!(result, Err(ConfigError::InvalidCapacity { field: "max_shadow_maps", .. })));
    }
}
