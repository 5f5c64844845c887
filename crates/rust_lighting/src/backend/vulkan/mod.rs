//! Vulkan backend
//!
//! Uniform buffers, specialization constants and descriptor layouts for the
//! lighting bindings. Device creation and pipeline assembly stay with the
//! caller; this module only needs a `Device` and an `Instance`.

mod error;

pub mod buffer;
pub mod descriptors;
pub mod specialization;
pub mod uploader;

pub use buffer::Buffer;
pub use descriptors::{
    lighting_bindings, shadow_matrix_bindings, write_lighting_descriptors, DescriptorSetLayout,
    DescriptorSetLayoutBuilder, LIGHTING_SET, LIGHT_BUFFER_BINDING, SHADOW_MAP_BINDING,
    SHADOW_MATRIX_BINDING, SHADOW_MATRIX_SET,
};
pub use error::{VulkanError, VulkanResult};
pub use specialization::LightingSpecialization;
pub use uploader::VulkanUploadBackend;

/// Shader side of the lighting contract, for inclusion in fragment shaders
pub const LIGHTING_GLSL: &str = include_str!("../../../shaders/lighting.glsl");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glsl_declares_specialization_constants() {
        for declaration in [
            "layout(constant_id = 0) const int MAX_POINT_LIGHTS = 32;",
            "layout(constant_id = 1) const int MAX_SPOT_LIGHTS = 32;",
            "layout(constant_id = 2) const int MAX_DIRECTIONAL_LIGHTS = 32;",
            "layout(constant_id = 3) const int MAX_SHADOW_MAPS = 16;",
        ] {
            assert!(LIGHTING_GLSL.contains(declaration), "missing `{}`", declaration);
        }
    }

    #[test]
    fn test_glsl_bindings_match_layouts() {
        assert!(LIGHTING_GLSL.contains(&format!("layout(set = {}, binding = {}) uniform LightBuffer", LIGHTING_SET, LIGHT_BUFFER_BINDING)));
        assert!(LIGHTING_GLSL.contains(&format!(
            "layout(set = {}, binding = {}) uniform sampler2D shadowMaps[MAX_SHADOW_MAPS];",
            LIGHTING_SET, SHADOW_MAP_BINDING
        )));
        assert!(LIGHTING_GLSL.contains(&format!(
            "layout(set = {}, binding = {}) uniform ShadowMappingMatrices",
            SHADOW_MATRIX_SET, SHADOW_MATRIX_BINDING
        )));
    }

    #[test]
    fn test_glsl_type_tags_match_light_kinds() {
        use crate::lighting::LightKind;
        assert!(LIGHTING_GLSL.contains(&format!("const int TYPE_POINT = {};", LightKind::Point.tag())));
        assert!(LIGHTING_GLSL.contains(&format!("const int TYPE_DIRECTIONAL = {};", LightKind::Directional.tag())));
        assert!(LIGHTING_GLSL.contains(&format!("const int TYPE_SPOT = {};", LightKind::Spot.tag())));
    }

    #[test]
    fn test_glsl_treats_every_negative_index_as_unshadowed() {
        use crate::lighting::ShadowMapIndex;
        assert!(ShadowMapIndex::NONE.raw() < 0);
        assert!(LIGHTING_GLSL.contains("if (shadowMapIndex < 0) {"));
        assert!(!LIGHTING_GLSL.contains("shadowMapIndex == "));
    }
}
