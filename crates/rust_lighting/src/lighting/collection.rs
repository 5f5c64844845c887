//! Light collection buffer
//!
//! Packs a mixed list of lights into the fixed-capacity uniform block the
//! lighting shader reads:
//!
//! ```glsl
//! layout(binding = 3) uniform LightBuffer {
//!     mat4 invertedView;
//!     AmbientLight ambientLight;
//!     PointLight pointLights[MAX_POINT_LIGHTS];
//!     SpotLight spotLights[MAX_SPOT_LIGHTS];
//!     DirectionalLight directionalLights[MAX_DIRECTIONAL_LIGHTS];
//!     int pointLightCount;
//!     int spotLightCount;
//!     int directionalLightCount;
//! } lights;
//! ```
//!
//! Array sizes are specialization constants, so storage is sized once from
//! [`LightingConfig`] and never grows. Only the leading `count` entries of each
//! array are meaningful; trailing slots keep whatever a previous frame left
//! there and must not be read.

use bytemuck::{Pod, Zeroable};

use crate::config::{ConfigError, LightingConfig};
use crate::foundation::math::{utils, Mat4};
use crate::lighting::light::{
    AmbientLight, Attenuation, DirectionalLight, LightKind, LightRecord, PointLight,
    ShadowMapIndex, SpotLight,
};
use crate::{LightingError, LightingResult};

/// std140 ambient light, 16 bytes
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuAmbientLight {
    /// Linear-light radiance
    pub color: [f32; 3],
    /// Padding for std140 alignment
    pub _padding: f32,
}

/// std140 point light, 48 bytes
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuPointLight {
    /// View-space position
    pub view_position: [f32; 3],
    /// Padding for std140 alignment
    pub _padding0: f32,
    /// Linear-light color
    pub color: [f32; 3],
    /// Scalar multiplier on `color`
    pub intensity: f32,
    /// Constant, linear, quadratic
    pub attenuation: [f32; 3],
    /// Shadow slot or -1
    pub shadow_map_index: i32,
}

/// std140 spot light, 64 bytes
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuSpotLight {
    /// View-space position
    pub view_position: [f32; 3],
    /// Cosine of the cone half-angle, packed into the position's padding
    pub cos_cutoff: f32,
    /// View-space cone axis
    pub view_direction: [f32; 3],
    /// Padding for std140 alignment
    pub _padding0: f32,
    /// Linear-light color
    pub color: [f32; 3],
    /// Scalar multiplier on `color`
    pub intensity: f32,
    /// Constant, linear, quadratic
    pub attenuation: [f32; 3],
    /// Shadow slot or -1
    pub shadow_map_index: i32,
}

/// std140 directional light, 48 bytes
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuDirectionalLight {
    /// View-space direction
    pub view_direction: [f32; 3],
    /// Padding for std140 alignment
    pub _padding0: f32,
    /// Linear-light color
    pub color: [f32; 3],
    /// Scalar multiplier on `color`
    pub intensity: f32,
    /// Shadow slot or -1
    pub shadow_map_index: i32,
    /// Pads the struct to a multiple of 16 bytes
    pub _padding1: [i32; 3],
}

impl From<&PointLight> for GpuPointLight {
    fn from(light: &PointLight) -> Self {
        Self {
            view_position: light.view_position.into(),
            _padding0: 0.0,
            color: light.color.into(),
            intensity: light.intensity,
            attenuation: light.attenuation.to_array(),
            shadow_map_index: light.shadow_map_index.raw(),
        }
    }
}

impl From<&SpotLight> for GpuSpotLight {
    fn from(light: &SpotLight) -> Self {
        Self {
            view_position: light.view_position.into(),
            cos_cutoff: light.cos_cutoff,
            view_direction: light.view_direction.into(),
            _padding0: 0.0,
            color: light.color.into(),
            intensity: light.intensity,
            attenuation: light.attenuation.to_array(),
            shadow_map_index: light.shadow_map_index.raw(),
        }
    }
}

impl From<&DirectionalLight> for GpuDirectionalLight {
    fn from(light: &DirectionalLight) -> Self {
        Self {
            view_direction: light.view_direction.into(),
            _padding0: 0.0,
            color: light.color.into(),
            intensity: light.intensity,
            shadow_map_index: light.shadow_map_index.raw(),
            _padding1: [0; 3],
        }
    }
}

impl From<&GpuPointLight> for PointLight {
    fn from(light: &GpuPointLight) -> Self {
        Self {
            view_position: light.view_position.into(),
            color: light.color.into(),
            intensity: light.intensity,
            attenuation: Attenuation::from_array(light.attenuation),
            shadow_map_index: shadow_index(light.shadow_map_index),
        }
    }
}

impl From<&GpuSpotLight> for SpotLight {
    fn from(light: &GpuSpotLight) -> Self {
        Self {
            view_position: light.view_position.into(),
            cos_cutoff: light.cos_cutoff,
            view_direction: light.view_direction.into(),
            color: light.color.into(),
            intensity: light.intensity,
            attenuation: Attenuation::from_array(light.attenuation),
            shadow_map_index: shadow_index(light.shadow_map_index),
        }
    }
}

impl From<&GpuDirectionalLight> for DirectionalLight {
    fn from(light: &GpuDirectionalLight) -> Self {
        Self {
            view_direction: light.view_direction.into(),
            color: light.color.into(),
            intensity: light.intensity,
            shadow_map_index: shadow_index(light.shadow_map_index),
        }
    }
}

fn shadow_index(raw: i32) -> ShadowMapIndex {
    u32::try_from(raw)
        .ok()
        .and_then(crate::lighting::ShadowSlot::new)
        .into()
}

/// Byte offsets of the light buffer for one set of capacities
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightBufferLayout {
    /// Offset of `invertedView`
    pub inverted_view: usize,
    /// Offset of `ambientLight`
    pub ambient: usize,
    /// Offset of `pointLights[0]`
    pub point_lights: usize,
    /// Offset of `spotLights[0]`
    pub spot_lights: usize,
    /// Offset of `directionalLights[0]`
    pub directional_lights: usize,
    /// Offset of `pointLightCount`; spot and directional counts follow
    pub counts: usize,
    /// Total block size, rounded to 16 bytes
    pub size: usize,
}

impl LightBufferLayout {
    /// Compute the std140 layout for the given capacities
    pub const fn new(max_point_lights: usize, max_spot_lights: usize, max_directional_lights: usize) -> Self {
        let inverted_view = 0;
        let ambient = inverted_view + std::mem::size_of::<[[f32; 4]; 4]>();
        let point_lights = ambient + std::mem::size_of::<GpuAmbientLight>();
        let spot_lights = point_lights + max_point_lights * std::mem::size_of::<GpuPointLight>();
        let directional_lights = spot_lights + max_spot_lights * std::mem::size_of::<GpuSpotLight>();
        let counts = directional_lights + max_directional_lights * std::mem::size_of::<GpuDirectionalLight>();
        // Three ints plus one int of padding
        let size = counts + 4 * std::mem::size_of::<i32>();
        Self {
            inverted_view,
            ambient,
            point_lights,
            spot_lights,
            directional_lights,
            counts,
            size,
        }
    }

    /// Layout for a lighting configuration
    pub const fn for_config(config: &LightingConfig) -> Self {
        Self::new(config.max_point_lights, config.max_spot_lights, config.max_directional_lights)
    }
}

/// One frame's worth of lights in GPU layout
#[derive(Debug, Clone)]
pub struct LightCollection {
    inverted_view: Mat4,
    ambient: AmbientLight,
    point_lights: Box<[GpuPointLight]>,
    spot_lights: Box<[GpuSpotLight]>,
    directional_lights: Box<[GpuDirectionalLight]>,
    point_light_count: usize,
    spot_light_count: usize,
    directional_light_count: usize,
    max_shadow_maps: usize,
}

impl LightCollection {
    /// Reserve storage for the capacities in `config`; every count starts at zero
    pub fn with_capacity(config: &LightingConfig) -> Self {
        Self {
            inverted_view: Mat4::identity(),
            ambient: AmbientLight::default(),
            point_lights: vec![GpuPointLight::zeroed(); config.max_point_lights].into_boxed_slice(),
            spot_lights: vec![GpuSpotLight::zeroed(); config.max_spot_lights].into_boxed_slice(),
            directional_lights: vec![GpuDirectionalLight::zeroed(); config.max_directional_lights]
                .into_boxed_slice(),
            point_light_count: 0,
            spot_light_count: 0,
            directional_light_count: 0,
            max_shadow_maps: config.max_shadow_maps,
        }
    }

    /// Refill this collection in place
    ///
    /// Per-type order of `lights` is preserved. If any type exceeds its capacity
    /// the call fails with [`LightingError::CapacityExceeded`] and the collection
    /// is left exactly as it was. The same holds for a shadow map index outside
    /// `0..max_shadow_maps`, which the shader would read out of bounds.
    pub fn repack(
        &mut self,
        lights: &[LightRecord],
        ambient: AmbientLight,
        inverted_view: Mat4,
    ) -> LightingResult<()> {
        self.repack_mapped(lights, ambient, inverted_view, |light| *light)
    }

    fn repack_mapped(
        &mut self,
        lights: &[LightRecord],
        ambient: AmbientLight,
        inverted_view: Mat4,
        map: impl Fn(&LightRecord) -> LightRecord,
    ) -> LightingResult<()> {
        let (mut points, mut spots, mut directionals) = (0usize, 0usize, 0usize);
        for light in lights {
            match light {
                LightRecord::Point(_) => points += 1,
                LightRecord::Spot(_) => spots += 1,
                LightRecord::Directional(_) => directionals += 1,
                LightRecord::Ambient(_) => {
                    return Err(LightingError::invalid_parameter(
                        "lights",
                        light,
                        "the ambient light is passed separately, not in the light list",
                    ));
                }
            }

            let index = light.shadow_map_index();
            if index.slot().map_or(false, |slot| slot.index() as usize >= self.max_shadow_maps) {
                log::warn!(
                    "Shadow map index {} out of range for {:?} light: {} shadow maps",
                    index.raw(), light.kind(), self.max_shadow_maps
                );
                return Err(LightingError::invalid_parameter(
                    "shadow_map_index",
                    index.raw(),
                    "shadow map index outside the shadow map table",
                ));
            }
        }

        for (kind, requested) in [
            (LightKind::Point, points),
            (LightKind::Spot, spots),
            (LightKind::Directional, directionals),
        ] {
            let capacity = self.capacity(kind);
            if requested > capacity {
                log::warn!(
                    "Light collection capacity exceeded for {:?}: {} requested, {} available",
                    kind, requested, capacity
                );
                return Err(LightingError::CapacityExceeded { kind, requested, capacity });
            }
        }

        self.inverted_view = inverted_view;
        self.ambient = ambient;
        self.point_light_count = 0;
        self.spot_light_count = 0;
        self.directional_light_count = 0;

        for light in lights {
            match map(light) {
                LightRecord::Point(point) => {
                    self.point_lights[self.point_light_count] = GpuPointLight::from(&point);
                    self.point_light_count += 1;
                }
                LightRecord::Spot(spot) => {
                    self.spot_lights[self.spot_light_count] = GpuSpotLight::from(&spot);
                    self.spot_light_count += 1;
                }
                LightRecord::Directional(directional) => {
                    self.directional_lights[self.directional_light_count] =
                        GpuDirectionalLight::from(&directional);
                    self.directional_light_count += 1;
                }
                LightRecord::Ambient(_) => unreachable!("ambient lights rejected above"),
            }
            log::trace!("Packed {:?}", light.kind());
        }

        log::debug!(
            "Packed light collection - Point: {}, Spot: {}, Directional: {}",
            self.point_light_count, self.spot_light_count, self.directional_light_count
        );
        Ok(())
    }

    /// View-to-world matrix for the frame
    pub const fn inverted_view(&self) -> &Mat4 {
        &self.inverted_view
    }

    /// Ambient term
    pub const fn ambient(&self) -> &AmbientLight {
        &self.ambient
    }

    /// Valid point lights
    pub fn point_lights(&self) -> &[GpuPointLight] {
        &self.point_lights[..self.point_light_count]
    }

    /// Valid spot lights
    pub fn spot_lights(&self) -> &[GpuSpotLight] {
        &self.spot_lights[..self.spot_light_count]
    }

    /// Valid directional lights
    pub fn directional_lights(&self) -> &[GpuDirectionalLight] {
        &self.directional_lights[..self.directional_light_count]
    }

    /// Number of valid entries of one kind
    pub const fn count(&self, kind: LightKind) -> usize {
        match kind {
            LightKind::Point => self.point_light_count,
            LightKind::Directional => self.directional_light_count,
            LightKind::Spot => self.spot_light_count,
        }
    }

    /// Array capacity of one kind
    pub fn capacity(&self, kind: LightKind) -> usize {
        match kind {
            LightKind::Point => self.point_lights.len(),
            LightKind::Directional => self.directional_lights.len(),
            LightKind::Spot => self.spot_lights.len(),
        }
    }

    /// Number of shadow maps the light indices may address
    pub const fn shadow_map_capacity(&self) -> usize {
        self.max_shadow_maps
    }

    /// std140 layout of this collection's buffer
    pub fn layout(&self) -> LightBufferLayout {
        LightBufferLayout::new(self.point_lights.len(), self.spot_lights.len(), self.directional_lights.len())
    }

    /// Serialize into `out` using the std140 layout
    ///
    /// `out` is resized to [`LightBufferLayout::size`]; reusing the same vector
    /// every frame keeps this allocation-free after the first call.
    pub fn write_std140(&self, out: &mut Vec<u8>) {
        let layout = self.layout();
        out.clear();
        out.resize(layout.size, 0);

        let inverted_view = utils::mat4_to_cols(&self.inverted_view);
        write_pod(out, layout.inverted_view, &inverted_view);

        let ambient = GpuAmbientLight {
            color: self.ambient.color.into(),
            _padding: 0.0,
        };
        write_pod(out, layout.ambient, &ambient);

        // Full arrays go up, trailing slots included; the counts bound what the shader reads
        out[layout.point_lights..layout.spot_lights].copy_from_slice(bytemuck::cast_slice(&self.point_lights));
        out[layout.spot_lights..layout.directional_lights].copy_from_slice(bytemuck::cast_slice(&self.spot_lights));
        out[layout.directional_lights..layout.counts]
            .copy_from_slice(bytemuck::cast_slice(&self.directional_lights));

        let counts: [i32; 4] = [
            self.point_light_count as i32,
            self.spot_light_count as i32,
            self.directional_light_count as i32,
            0,
        ];
        write_pod(out, layout.counts, &counts);
    }

    /// Serialize into a fresh vector
    pub fn to_std140_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.layout().size);
        self.write_std140(&mut bytes);
        bytes
    }
}

fn write_pod<T: Pod>(out: &mut [u8], offset: usize, value: &T) {
    let bytes = bytemuck::bytes_of(value);
    out[offset..offset + bytes.len()].copy_from_slice(bytes);
}

/// Builds light collections for one lighting configuration
#[derive(Debug, Clone, Default)]
pub struct LightPacker {
    config: LightingConfig,
}

impl LightPacker {
    /// Create a packer for the given capacities
    ///
    /// Capacities are validated here so packing never builds storage the
    /// shader could not be specialized for.
    pub fn new(config: LightingConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Capacities this packer enforces
    pub const fn config(&self) -> &LightingConfig {
        &self.config
    }

    /// Pack view-space lights into a new collection
    pub fn pack(
        &self,
        lights: &[LightRecord],
        ambient: AmbientLight,
        inverted_view: Mat4,
    ) -> LightingResult<LightCollection> {
        let mut collection = LightCollection::with_capacity(&self.config);
        collection.repack(lights, ambient, inverted_view)?;
        Ok(collection)
    }

    /// Pack view-space lights into existing storage
    ///
    /// Storage built for a different configuration is replaced first.
    pub fn pack_into(
        &self,
        target: &mut LightCollection,
        lights: &[LightRecord],
        ambient: AmbientLight,
        inverted_view: Mat4,
    ) -> LightingResult<()> {
        self.ensure_storage(target);
        target.repack(lights, ambient, inverted_view)
    }

    /// Pack world-space lights, converting them to view space with `view`
    ///
    /// `invertedView` is derived from the same matrix, which keeps every
    /// view-space field and the inverse consistent for the frame.
    pub fn pack_world(
        &self,
        lights: &[LightRecord],
        ambient: AmbientLight,
        view: &Mat4,
    ) -> LightingResult<LightCollection> {
        let mut collection = LightCollection::with_capacity(&self.config);
        self.pack_world_into(&mut collection, lights, ambient, view)?;
        Ok(collection)
    }

    /// [`LightPacker::pack_world`] into existing storage
    pub fn pack_world_into(
        &self,
        target: &mut LightCollection,
        lights: &[LightRecord],
        ambient: AmbientLight,
        view: &Mat4,
    ) -> LightingResult<()> {
        let inverted_view = view
            .try_inverse()
            .ok_or_else(|| LightingError::invalid_parameter("view", view, "view matrix is not invertible"))?;
        self.ensure_storage(target);
        target.repack_mapped(lights, ambient, inverted_view, |light| light.to_view_space(view))
    }

    fn ensure_storage(&self, target: &mut LightCollection) {
        let matches = target.capacity(LightKind::Point) == self.config.max_point_lights
            && target.capacity(LightKind::Spot) == self.config.max_spot_lights
            && target.capacity(LightKind::Directional) == self.config.max_directional_lights
            && target.shadow_map_capacity() == self.config.max_shadow_maps;
        if !matches {
            log::debug!("Reallocating light collection storage for {:?}", self.config);
            *target = LightCollection::with_capacity(&self.config);
        }
    }
}
