//! Descriptor set layouts for the lighting bindings
//!
//! | set | binding | contents                                   |
//! |-----|---------|--------------------------------------------|
//! | 0   | 3       | `LightBuffer` uniform block                |
//! | 0   | 5       | `shadowMaps[MAX_SHADOW_MAPS]` samplers     |
//! | 1   | 0       | `ShadowMappingMatrices` uniform block      |
//!
//! Bindings 0-2 and 4 of set 0 belong to the surrounding renderer.

use ash::{vk, Device};

use super::{Buffer, VulkanError, VulkanResult};
use crate::config::LightingConfig;

/// Descriptor set holding the light buffer and shadow samplers
pub const LIGHTING_SET: u32 = 0;
/// Binding of the light buffer uniform block
pub const LIGHT_BUFFER_BINDING: u32 = 3;
/// Binding of the shadow map sampler array
pub const SHADOW_MAP_BINDING: u32 = 5;
/// Descriptor set holding the shadow transforms
pub const SHADOW_MATRIX_SET: u32 = 1;
/// Binding of the shadow transform uniform block
pub const SHADOW_MATRIX_BINDING: u32 = 0;

/// Descriptor set layout builder for creating reusable layouts
#[derive(Debug, Clone, Default)]
pub struct DescriptorSetLayoutBuilder {
    bindings: Vec<vk::DescriptorSetLayoutBinding>,
}

impl DescriptorSetLayoutBuilder {
    /// Create a new descriptor set layout builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a uniform buffer binding
    pub fn add_uniform_buffer(mut self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.bindings.push(
            vk::DescriptorSetLayoutBinding::builder()
                .binding(binding)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .descriptor_count(1)
                .stage_flags(stage_flags)
                .build(),
        );
        self
    }

    /// Add an array of combined image samplers
    pub fn add_combined_image_sampler_array(
        mut self,
        binding: u32,
        count: u32,
        stage_flags: vk::ShaderStageFlags,
    ) -> Self {
        self.bindings.push(
            vk::DescriptorSetLayoutBinding::builder()
                .binding(binding)
                .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .descriptor_count(count)
                .stage_flags(stage_flags)
                .build(),
        );
        self
    }

    /// Bindings collected so far
    pub fn bindings(&self) -> &[vk::DescriptorSetLayoutBinding] {
        &self.bindings
    }

    /// Build the descriptor set layout
    pub fn build(self, device: &Device) -> VulkanResult<DescriptorSetLayout> {
        let layout_info = vk::DescriptorSetLayoutCreateInfo::builder()
            .bindings(&self.bindings);

        let layout = unsafe { device.create_descriptor_set_layout(&layout_info, None) }
            .map_err(VulkanError::Api)?;

        Ok(DescriptorSetLayout {
            layout,
            device: device.clone(),
            bindings: self.bindings,
        })
    }
}

/// Descriptor set layout wrapper with automatic cleanup
pub struct DescriptorSetLayout {
    layout: vk::DescriptorSetLayout,
    device: Device,
    bindings: Vec<vk::DescriptorSetLayoutBinding>,
}

impl DescriptorSetLayout {
    /// Get the Vulkan descriptor set layout handle
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }

    /// Get the bindings used in this layout
    pub fn bindings(&self) -> &[vk::DescriptorSetLayoutBinding] {
        &self.bindings
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

/// Lighting bindings of set 0, read by the fragment stage
pub fn lighting_bindings(config: &LightingConfig) -> DescriptorSetLayoutBuilder {
    DescriptorSetLayoutBuilder::new()
        .add_uniform_buffer(LIGHT_BUFFER_BINDING, vk::ShaderStageFlags::FRAGMENT)
        .add_combined_image_sampler_array(
            SHADOW_MAP_BINDING,
            config.max_shadow_maps as u32,
            vk::ShaderStageFlags::FRAGMENT,
        )
}

/// Shadow transform binding of set 1
///
/// Visible to the vertex stage of the shadow pass and the fragment stage of
/// the lighting pass.
pub fn shadow_matrix_bindings() -> DescriptorSetLayoutBuilder {
    DescriptorSetLayoutBuilder::new().add_uniform_buffer(
        SHADOW_MATRIX_BINDING,
        vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
    )
}

/// Point the lighting descriptors at this frame's buffers and shadow maps
///
/// `shadow_maps` must hold exactly `MAX_SHADOW_MAPS` entries, as returned by
/// [`ShadowMapTable::image_infos`](crate::lighting::ShadowMapTable::image_infos).
pub fn write_lighting_descriptors(
    device: &Device,
    lighting_set: vk::DescriptorSet,
    shadow_matrix_set: vk::DescriptorSet,
    light_buffer: &Buffer,
    shadow_transforms: &Buffer,
    shadow_maps: &[vk::DescriptorImageInfo],
) {
    let light_info = [light_buffer.descriptor_info()];
    let matrix_info = [shadow_transforms.descriptor_info()];

    let writes = [
        vk::WriteDescriptorSet::builder()
            .dst_set(lighting_set)
            .dst_binding(LIGHT_BUFFER_BINDING)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .buffer_info(&light_info)
            .build(),
        vk::WriteDescriptorSet::builder()
            .dst_set(lighting_set)
            .dst_binding(SHADOW_MAP_BINDING)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .image_info(shadow_maps)
            .build(),
        vk::WriteDescriptorSet::builder()
            .dst_set(shadow_matrix_set)
            .dst_binding(SHADOW_MATRIX_BINDING)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .buffer_info(&matrix_info)
            .build(),
    ];

    unsafe { device.update_descriptor_sets(&writes, &[]) };
}
