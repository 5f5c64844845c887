//! Upload interface for per-frame lighting data
//!
//! The light buffer and the shadow transform buffer are rewritten wholesale
//! every frame. Backends keep one copy per frame in flight and rotate through
//! them, so the GPU never reads a buffer the CPU is writing.

use crate::config::LightingConfig;
use crate::lighting::collection::{LightBufferLayout, LightCollection};
use crate::lighting::shadow::{GpuShadowTransform, ShadowTransform};
use crate::{LightingError, LightingResult};

/// Which buffer an upload went to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UploadTarget {
    /// Light collection uniform buffer
    LightCollection,
    /// Shadow transform uniform buffer
    ShadowTransforms,
}

/// Receipt for a completed upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UploadHandle {
    /// Buffer that was written
    pub target: UploadTarget,
    /// Frame-in-flight slot the data landed in
    pub frame_index: usize,
    /// Monotonic upload counter of the backend
    pub generation: u64,
}

/// GPU-side destination for lighting data
pub trait LightUploadBackend {
    /// Write a packed light collection to the current frame's light buffer
    fn upload_light_collection(&mut self, lights: &LightCollection) -> LightingResult<UploadHandle>;

    /// Write shadow transforms to the current frame's transform buffer
    ///
    /// Entry `i` must belong to shadow slot `i`. Shorter inputs are padded with
    /// identity matrices; longer inputs fail with
    /// [`LightingError::ShadowTransformOverflow`].
    fn upload_shadow_transforms(&mut self, transforms: &[ShadowTransform]) -> LightingResult<UploadHandle>;

    /// Move on to the next frame-in-flight slot
    fn advance_frame(&mut self);
}

/// Serialize shadow transforms into a `capacity`-entry std140 block
pub fn encode_shadow_transforms(transforms: &[ShadowTransform], capacity: usize) -> LightingResult<Vec<u8>> {
    let mut out = Vec::new();
    encode_shadow_transforms_into(transforms, capacity, &mut out)?;
    Ok(out)
}

/// [`encode_shadow_transforms`] into a reused vector
pub fn encode_shadow_transforms_into(
    transforms: &[ShadowTransform],
    capacity: usize,
    out: &mut Vec<u8>,
) -> LightingResult<()> {
    if transforms.len() > capacity {
        log::warn!("Shadow transform upload of {} entries exceeds capacity {}", transforms.len(), capacity);
        return Err(LightingError::ShadowTransformOverflow {
            requested: transforms.len(),
            capacity,
        });
    }

    out.clear();
    out.reserve(shadow_transform_block_size(capacity));
    for transform in transforms {
        out.extend_from_slice(bytemuck::bytes_of(&transform.to_gpu()));
    }
    let padding = ShadowTransform::identity().to_gpu();
    for _ in transforms.len()..capacity {
        out.extend_from_slice(bytemuck::bytes_of(&padding));
    }
    Ok(())
}

/// Size in bytes of the shadow transform block for `capacity` slots
pub const fn shadow_transform_block_size(capacity: usize) -> usize {
    capacity * std::mem::size_of::<GpuShadowTransform>()
}

/// Check a collection matches the layout a backend was built for
pub(crate) fn check_layout(expected: &LightBufferLayout, lights: &LightCollection) -> LightingResult<()> {
    let actual = lights.layout();
    if actual == *expected {
        Ok(())
    } else {
        Err(LightingError::invalid_parameter(
            "lights",
            actual,
            "collection was packed for a different lighting configuration",
        ))
    }
}

/// Upload backend that keeps the serialized buffers in host memory
///
/// Useful for tests and for renderers that copy the bytes into their own
/// staging buffers.
#[derive(Debug, Clone)]
pub struct HostUploadBackend {
    layout: LightBufferLayout,
    max_shadow_maps: usize,
    light_buffers: Vec<Vec<u8>>,
    shadow_buffers: Vec<Vec<u8>>,
    frame_index: usize,
    generation: u64,
}

impl HostUploadBackend {
    /// Create a backend for `config` with `frames_in_flight` buffer copies
    pub fn new(config: &LightingConfig, frames_in_flight: usize) -> LightingResult<Self> {
        config.validate()?;
        let frames = frames_in_flight.max(1);
        let layout = LightBufferLayout::for_config(config);
        log::debug!(
            "Created HostUploadBackend: {} frames, {} byte light buffer, {} shadow slots",
            frames, layout.size, config.max_shadow_maps
        );
        Ok(Self {
            layout,
            max_shadow_maps: config.max_shadow_maps,
            light_buffers: vec![vec![0; layout.size]; frames],
            shadow_buffers: vec![vec![0; shadow_transform_block_size(config.max_shadow_maps)]; frames],
            frame_index: 0,
            generation: 0,
        })
    }

    /// Frame-in-flight slot currently written
    pub const fn frame_index(&self) -> usize {
        self.frame_index
    }

    /// Number of buffer copies
    pub fn frames_in_flight(&self) -> usize {
        self.light_buffers.len()
    }

    /// Light buffer bytes of one frame slot
    pub fn light_bytes(&self, frame_index: usize) -> Option<&[u8]> {
        self.light_buffers.get(frame_index).map(Vec::as_slice)
    }

    /// Shadow transform bytes of one frame slot
    pub fn shadow_bytes(&self, frame_index: usize) -> Option<&[u8]> {
        self.shadow_buffers.get(frame_index).map(Vec::as_slice)
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

impl LightUploadBackend for HostUploadBackend {
    fn upload_light_collection(&mut self, lights: &LightCollection) -> LightingResult<UploadHandle> {
        check_layout(&self.layout, lights)?;
        lights.write_std140(&mut self.light_buffers[self.frame_index]);
        Ok(self.handle(UploadTarget::LightCollection))
    }

    fn upload_shadow_transforms(&mut self, transforms: &[ShadowTransform]) -> LightingResult<UploadHandle> {
        encode_shadow_transforms_into(transforms, self.max_shadow_maps, &mut self.shadow_buffers[self.frame_index])?;
        Ok(self.handle(UploadTarget::ShadowTransforms))
    }

    fn advance_frame(&mut self) {
        self.frame_index = (self.frame_index + 1) % self.light_buffers.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use crate::foundation::math::{Mat4, Vec3};
    use crate::lighting::collection::LightPacker;
    use crate::lighting::light::{AmbientLight, LightRecord, PointLight};

    fn config() -> LightingConfig {
        LightingConfig::new(2, 2, 2, 3)
    }

    fn read_mat(bytes: &[u8], offset: usize) -> [[f32; 4]; 4] {
        bytemuck::pod_read_unaligned(&bytes[offset..offset + 64])
    }

    #[test]
    fn test_encode_pads_to_capacity() {
        let marker = ShadowTransform::new(Mat4::new_scaling(2.0), Mat4::identity());
        let bytes = encode_shadow_transforms(&[marker], 3).unwrap();

        assert_eq!(bytes.len(), 3 * 128);
        assert_eq!(read_mat(&bytes, 0)[0][0], 2.0);
        assert_eq!(read_mat(&bytes, 128)[0][0], 1.0);
        assert_eq!(read_mat(&bytes, 256 + 64)[3][3], 1.0);
    }

    #[test]
    fn test_encode_overflow() {
        let transforms = vec![ShadowTransform::identity(); 4];
        match encode_shadow_transforms(&transforms, 3) {
            Err(LightingError::ShadowTransformOverflow { requested, capacity }) => {
                assert_eq!((requested, capacity), (4, 3));
            }
            other => panic!("expected ShadowTransformOverflow, got {:?}", other),
        }
    }

    #[test]
    fn test_host_backend_rotates_frames() {
        let config = config();
        let mut backend = HostUploadBackend::new(&config, 2).unwrap();
        let packer = LightPacker::new(config).unwrap();

        let light: LightRecord = PointLight::new(Vec3::new(1.0, 2.0, 3.0), Vec3::new(1.0, 1.0, 1.0), 1.0)
            .unwrap()
            .into();
        let collection = packer.pack(&[light], AmbientLight::default(), Mat4::identity()).unwrap();

        let first = backend.upload_light_collection(&collection).unwrap();
        backend.advance_frame();
        let second = backend.upload_shadow_transforms(&[]).unwrap();
        backend.advance_frame();

        assert_eq!(first.frame_index, 0);
        assert_eq!(first.target, UploadTarget::LightCollection);
        assert_eq!(second.frame_index, 1);
        assert!(second.generation > first.generation);
        assert_eq!(backend.frame_index(), 0);

        let bytes = backend.light_bytes(0).unwrap();
        assert_eq!(bytes, collection.to_std140_bytes().as_slice());
        assert!(backend.light_bytes(1).unwrap().iter().all(|b| *b == 0));
        assert_eq!(backend.shadow_bytes(1).unwrap().len(), 3 * 128);
    }

    #[test]
    fn test_host_backend_rejects_foreign_layout() {
        let mut backend = HostUploadBackend::new(&config(), 1).unwrap();
        let other = LightPacker::new(LightingConfig::new(4, 2, 2, 3))
            .unwrap()
            .pack(&[], AmbientLight::default(), Mat4::identity())
            .unwrap();

        assert!(matches!(
            backend.upload_light_collection(&other),
            Err(LightingError::InvalidLightParameter { parameter: "lights", .. })
        ));
    }

    #[test]
    fn test_zero_frames_clamped() {
        let backend = HostUploadBackend::new(&config(), 0).unwrap();
        assert_eq!(backend.frames_in_flight(), 1);
    }

    #[test]
    fn test_host_backend_rejects_invalid_config() {
        assert!(matches!(
            HostUploadBackend::new(&LightingConfig::new(2, 2, 2, 0), 2),
            Err(LightingError::Config(ConfigError::InvalidCapacity { field: "max_shadow_maps", value: 0 }))
        ));
        assert!(HostUploadBackend::new(&LightingConfig::new(0, 2, 2, 3), 2).is_err());
    }

    #[test]
    fn test_encode_into_reuses_storage() {
        let mut out = Vec::new();
        let marker = ShadowTransform::new(Mat4::new_scaling(2.0), Mat4::identity());

        encode_shadow_transforms_into(&[marker], 3, &mut out).unwrap();
        let storage = out.as_ptr();
        let reserved = out.capacity();
        assert_eq!(out.len(), shadow_transform_block_size(3));

        encode_shadow_transforms_into(&[ShadowTransform::identity(), marker], 3, &mut out).unwrap();
        assert_eq!(out.as_ptr(), storage);
        assert_eq!(out.capacity(), reserved);
        assert_eq!(out.len(), shadow_transform_block_size(3));
        assert_eq!(read_mat(&out, 0)[0][0], 1.0);
        assert_eq!(read_mat(&out, 128)[0][0], 2.0);
        assert_eq!(read_mat(&out, 256)[0][0], 1.0);
    }
}
