//! Vulkan upload backend
//!
//! One light buffer and one shadow transform buffer per frame in flight, both
//! host-visible and host-coherent, rewritten wholesale every frame.

use ash::{vk, Device, Instance};

use super::Buffer;
use crate::config::LightingConfig;
use crate::lighting::collection::{LightBufferLayout, LightCollection};
use crate::lighting::shadow::ShadowTransform;
use crate::lighting::upload::{
    check_layout, encode_shadow_transforms_into, shadow_transform_block_size, LightUploadBackend,
    UploadHandle, UploadTarget,
};
use crate::LightingResult;

/// Per-frame uniform buffers backing the lighting descriptors
pub struct VulkanUploadBackend {
    layout: LightBufferLayout,
    max_shadow_maps: usize,
    light_buffers: Vec<Buffer>,
    shadow_buffers: Vec<Buffer>,
    staging: Vec<u8>,
    frame_index: usize,
    generation: u64,
}

impl VulkanUploadBackend {
    /// Allocate buffers for `frames_in_flight` frames
    pub fn new(
        device: &Device,
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
        config: &LightingConfig,
        frames_in_flight: usize,
    ) -> LightingResult<Self> {
        config.validate()?;
        let frames = frames_in_flight.max(1);
        let layout = LightBufferLayout::for_config(config);
        let shadow_size = shadow_transform_block_size(config.max_shadow_maps);

        let mut light_buffers = Vec::with_capacity(frames);
        let mut shadow_buffers = Vec::with_capacity(frames);
        for _ in 0..frames {
            light_buffers.push(Buffer::uniform(
                device.clone(),
                instance,
                physical_device,
                layout.size as vk::DeviceSize,
            )?);
            shadow_buffers.push(Buffer::uniform(
                device.clone(),
                instance,
                physical_device,
                shadow_size as vk::DeviceSize,
            )?);
        }

        log::info!(
            "Created lighting uniform buffers: {} frames, {} + {} bytes each",
            frames, layout.size, shadow_size
        );

        Ok(Self {
            layout,
            max_shadow_maps: config.max_shadow_maps,
            light_buffers,
            shadow_buffers,
            staging: Vec::with_capacity(layout.size.max(shadow_size)),
            frame_index: 0,
            generation: 0,
        })
    }

    /// Frame-in-flight slot currently written
    pub const fn frame_index(&self) -> usize {
        self.frame_index
    }

    /// Light buffer of one frame slot
    pub fn light_buffer(&self, frame_index: usize) -> Option<&Buffer> {
        self.light_buffers.get(frame_index)
    }

    /// Shadow transform buffer of one frame slot
    pub fn shadow_buffer(&self, frame_index: usize) -> Option<&Buffer> {
        self.shadow_buffers.get(frame_index)
    }

    fn handle(&mut self, target: UploadTarget) -> UploadHandle {
        self.generation += 1;
        UploadHandle {
            target,
            frame_index: self.frame_index,
            generation: self.generation,
        }
    }
}

impl LightUploadBackend for VulkanUploadBackend {
    fn upload_light_collection(&mut self, lights: &LightCollection) -> LightingResult<UploadHandle> {
        check_layout(&self.layout, lights)?;
        lights.write_std140(&mut self.staging);
        self.light_buffers[self.frame_index].write_bytes(0, &self.staging)?;
        Ok(self.handle(UploadTarget::LightCollection))
    }

    fn upload_shadow_transforms(&mut self, transforms: &[ShadowTransform]) -> LightingResult<UploadHandle> {
        encode_shadow_transforms_into(transforms, self.max_shadow_maps, &mut self.staging)?;
        self.shadow_buffers[self.frame_index].write_bytes(0, &self.staging)?;
        Ok(self.handle(UploadTarget::ShadowTransforms))
    }

    fn advance_frame(&mut self) {
        self.frame_index = (self.frame_index + 1) % self.light_buffers.len();
    }
}
