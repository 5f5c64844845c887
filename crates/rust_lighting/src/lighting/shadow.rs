//! Shadow map table
//!
//! Arena of shadow map slots shared by the shadow pass and the lighting pass.
//! Each slot pairs a sampled render target with the light-space transform used
//! to render into it; both live in the same slot record so the texture array and
//! the matrix array handed to the GPU stay co-indexed.
//!
//! Slot ownership is explicit: [`ShadowMapTable::allocate`] hands out a slot,
//! [`ShadowMapTable::release`] returns it. Released slots go onto a LIFO free
//! list and are reused before the table grows, so a light that is removed and
//! re-added between frames gets its old slot back.
//!
//! Transforms are frame-scoped. [`ShadowMapTable::begin_frame`] marks every
//! transform stale; each allocated slot must get a fresh
//! [`ShadowMapTable::set_transform`] before the lighting pass reads it.

use ash::vk;
use bytemuck::{Pod, Zeroable};

use crate::foundation::math::{utils, Mat4};
use crate::lighting::light::{LightKind, LightRecord, ShadowMapIndex};
use crate::{LightingError, LightingResult};

/// Index of an allocated shadow map slot
///
/// Always within `0..=i32::MAX`, so it survives the trip through the signed
/// `shadowMapIndex` field without turning into the sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShadowSlot(u32);

impl ShadowSlot {
    /// Largest slot index the shader can address
    pub const MAX_INDEX: u32 = i32::MAX as u32;

    /// Wrap a raw slot index, `None` above [`ShadowSlot::MAX_INDEX`]
    pub const fn new(index: u32) -> Option<Self> {
        if index <= Self::MAX_INDEX {
            Some(Self(index))
        } else {
            None
        }
    }

    /// Raw slot index
    pub const fn index(self) -> u32 {
        self.0
    }
}

/// Projection and view matrices a shadow map was rendered with
///
/// `projection` includes the Vulkan axis flip, so
/// `projection * view * world_position` lands directly in shadow clip space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowTransform {
    /// Light-space projection
    pub projection: Mat4,
    /// World-to-light view matrix
    pub view: Mat4,
}

impl ShadowTransform {
    /// Create a transform pair
    pub const fn new(projection: Mat4, view: Mat4) -> Self {
        Self { projection, view }
    }

    /// Identity pair, used to pad unused entries
    pub fn identity() -> Self {
        Self::new(Mat4::identity(), Mat4::identity())
    }

    /// Combined world-to-clip matrix
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }

    /// GPU layout of this pair
    pub fn to_gpu(&self) -> GpuShadowTransform {
        GpuShadowTransform {
            projection: utils::mat4_to_cols(&self.projection),
            view: utils::mat4_to_cols(&self.view),
        }
    }
}

impl Default for ShadowTransform {
    fn default() -> Self {
        Self::identity()
    }
}

/// std140 `CameraInfo { mat4 projection; mat4 view; }`, 128 bytes
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuShadowTransform {
    /// Column-major projection
    pub projection: [[f32; 4]; 4],
    /// Column-major view
    pub view: [[f32; 4]; 4],
}

/// Sampled render target of one shadow map slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShadowMapTexture {
    /// Depth image view
    pub image_view: vk::ImageView,
    /// Comparison or plain depth sampler
    pub sampler: vk::Sampler,
}

impl ShadowMapTexture {
    /// Create a texture reference
    pub const fn new(image_view: vk::ImageView, sampler: vk::Sampler) -> Self {
        Self { image_view, sampler }
    }

    /// Descriptor info for the `shadowMaps[]` sampler array
    pub fn descriptor_image_info(&self) -> vk::DescriptorImageInfo {
        vk::DescriptorImageInfo {
            sampler: self.sampler,
            image_view: self.image_view,
            image_layout: vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
        }
    }
}

#[derive(Debug, Clone)]
struct SlotEntry {
    owner: Option<LightKind>,
    texture: Option<ShadowMapTexture>,
    transform: ShadowTransform,
    written_frame: Option<u64>,
}

impl SlotEntry {
    fn new(owner: LightKind) -> Self {
        Self {
            owner: Some(owner),
            texture: None,
            transform: ShadowTransform::identity(),
            written_frame: None,
        }
    }
}

/// Shadow map slot arena
#[derive(Debug, Clone)]
pub struct ShadowMapTable {
    slots: Vec<SlotEntry>,
    free_list: Vec<u32>,
    capacity: usize,
    frame: u64,
}

impl ShadowMapTable {
    /// Create a table with `capacity` slots (`MAX_SHADOW_MAPS`)
    ///
    /// Capacities beyond what the shader can index are clamped.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.min(ShadowSlot::MAX_INDEX as usize + 1);
        log::debug!("Created ShadowMapTable with {} slots", capacity);
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            capacity,
            frame: 0,
        }
    }

    /// Total number of slots
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of currently allocated slots
    pub fn allocated_count(&self) -> usize {
        self.slots.len() - self.free_list.len()
    }

    /// Number of slots still available
    pub fn available(&self) -> usize {
        self.capacity - self.allocated_count()
    }

    /// Current frame counter
    pub const fn frame(&self) -> u64 {
        self.frame
    }

    /// Assign a slot to a shadow-casting light
    ///
    /// Freed slots are reused most-recently-freed first; the table grows only
    /// when the free list is empty. The caller stores the returned slot in the
    /// light's `shadow_map_index`.
    pub fn allocate(&mut self, light: &LightRecord) -> LightingResult<ShadowSlot> {
        let kind = light.kind().ok_or_else(|| {
            LightingError::invalid_parameter("light", light, "ambient lights do not cast shadows")
        })?;

        if let Some(index) = self.free_list.pop() {
            let entry = &mut self.slots[index as usize];
            entry.owner = Some(kind);
            entry.written_frame = None;
            log::debug!("Reused shadow slot {} for {:?} light", index, kind);
            return Ok(ShadowSlot(index));
        }

        if self.slots.len() < self.capacity {
            let index = self.slots.len() as u32;
            self.slots.push(SlotEntry::new(kind));
            log::debug!("Allocated shadow slot {} for {:?} light", index, kind);
            return Ok(ShadowSlot(index));
        }

        let requested = self.allocated_count() + 1;
        log::warn!(
            "Shadow map table full for {:?} light: {} slots requested, {} available",
            kind, requested, self.capacity
        );
        Err(LightingError::ShadowMapTableFull {
            kind,
            requested,
            capacity: self.capacity,
        })
    }

    /// Return a slot to the free pool
    ///
    /// Any light still referencing the slot must have its `shadow_map_index`
    /// cleared or reassigned before the next frame is packed.
    pub fn release(&mut self, slot: ShadowSlot) -> LightingResult<()> {
        let entry = self.entry_mut(slot)?;
        entry.owner = None;
        entry.written_frame = None;
        self.free_list.push(slot.0);
        log::debug!("Released shadow slot {}", slot.0);
        Ok(())
    }

    /// Start a new frame; every transform becomes stale
    pub fn begin_frame(&mut self) {
        self.frame += 1;
    }

    /// Record the transform a slot is rendered with this frame
    pub fn set_transform(&mut self, slot: ShadowSlot, projection: Mat4, view: Mat4) -> LightingResult<()> {
        let frame = self.frame;
        let entry = self.entry_mut(slot)?;
        entry.transform = ShadowTransform::new(projection, view);
        entry.written_frame = Some(frame);
        Ok(())
    }

    /// Attach the render target sampled for a slot
    pub fn set_texture(&mut self, slot: ShadowSlot, texture: ShadowMapTexture) -> LightingResult<()> {
        self.entry_mut(slot)?.texture = Some(texture);
        Ok(())
    }

    /// Texture attached to a slot, if any
    pub fn texture(&self, slot: ShadowSlot) -> LightingResult<Option<ShadowMapTexture>> {
        Ok(self.entry(slot)?.texture)
    }

    /// Light kind owning a slot
    pub fn owner(&self, slot: ShadowSlot) -> Option<LightKind> {
        self.slots.get(slot.0 as usize).and_then(|entry| entry.owner)
    }

    /// Transform of a slot for the current frame
    ///
    /// Fails with [`LightingError::StaleShadowTransform`] when the slot has not
    /// been given a transform since the last [`ShadowMapTable::begin_frame`].
    pub fn transform(&self, slot: ShadowSlot) -> LightingResult<&ShadowTransform> {
        let entry = self.entry(slot)?;
        if entry.written_frame == Some(self.frame) {
            Ok(&entry.transform)
        } else {
            Err(LightingError::StaleShadowTransform { slot: slot.0 })
        }
    }

    /// Resolve a light's shadow reference
    pub fn transform_for(&self, index: ShadowMapIndex) -> LightingResult<Option<&ShadowTransform>> {
        index.slot().map(|slot| self.transform(slot)).transpose()
    }

    /// Allocated slots, in index order
    pub fn allocated_slots(&self) -> impl Iterator<Item = ShadowSlot> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.owner.is_some())
            .map(|(index, _)| ShadowSlot(index as u32))
    }

    /// Allocated slots the shadow pass still has to render this frame
    pub fn slots_needing_render(&self) -> impl Iterator<Item = ShadowSlot> + '_ {
        let frame = self.frame;
        self.slots
            .iter()
            .enumerate()
            .filter(move |(_, entry)| entry.owner.is_some() && entry.written_frame != Some(frame))
            .map(|(index, _)| ShadowSlot(index as u32))
    }

    /// Check every allocated slot has a transform for this frame
    ///
    /// The returned view is what the lighting evaluator reads; holding it
    /// borrows the table, so no slot can change until shading is done.
    pub fn resolve(&self) -> LightingResult<ResolvedShadows<'_>> {
        if let Some(stale) = self.slots_needing_render().next() {
            return Err(LightingError::StaleShadowTransform { slot: stale.0 });
        }
        Ok(ResolvedShadows { table: Some(self) })
    }

    /// Transforms for the whole `matrices[MAX_SHADOW_MAPS]` array, co-indexed with the textures
    ///
    /// Entries that are free or not yet rendered hold identity matrices; no
    /// light references them.
    pub fn transform_block(&self) -> Vec<ShadowTransform> {
        let mut block = Vec::with_capacity(self.capacity);
        self.transform_block_into(&mut block);
        block
    }

    /// [`ShadowMapTable::transform_block`] into a reused vector
    pub fn transform_block_into(&self, out: &mut Vec<ShadowTransform>) {
        out.clear();
        out.extend((0..self.capacity).map(|index| match self.slots.get(index) {
            Some(entry) if entry.owner.is_some() && entry.written_frame == Some(self.frame) => entry.transform,
            _ => ShadowTransform::identity(),
        }));
    }

    /// Descriptor infos for the whole `shadowMaps[MAX_SHADOW_MAPS]` array
    ///
    /// Every array element must be valid when the pipeline binds it, so
    /// entries without a texture use `fallback`.
    pub fn image_infos(&self, fallback: ShadowMapTexture) -> Vec<vk::DescriptorImageInfo> {
        let mut infos = Vec::with_capacity(self.capacity);
        self.image_infos_into(fallback, &mut infos);
        infos
    }

    /// [`ShadowMapTable::image_infos`] into a reused vector
    pub fn image_infos_into(&self, fallback: ShadowMapTexture, out: &mut Vec<vk::DescriptorImageInfo>) {
        out.clear();
        out.extend((0..self.capacity).map(|index| {
            self.slots
                .get(index)
                .and_then(|entry| entry.owner.and(entry.texture))
                .unwrap_or(fallback)
                .descriptor_image_info()
        }));
    }

    fn entry(&self, slot: ShadowSlot) -> LightingResult<&SlotEntry> {
        self.slots
            .get(slot.0 as usize)
            .filter(|entry| entry.owner.is_some())
            .ok_or(LightingError::UnknownShadowSlot { slot: slot.0 })
    }

    fn entry_mut(&mut self, slot: ShadowSlot) -> LightingResult<&mut SlotEntry> {
        self.slots
            .get_mut(slot.0 as usize)
            .filter(|entry| entry.owner.is_some())
            .ok_or(LightingError::UnknownShadowSlot { slot: slot.0 })
    }
}

/// Frame-validated, read-only view of the shadow map table
///
/// Every allocated slot in the underlying table has a transform for the current
/// frame, so lookups during shading cannot fail.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedShadows<'a> {
    table: Option<&'a ShadowMapTable>,
}

impl<'a> ResolvedShadows<'a> {
    /// A view with no shadow maps; every shadow reference is a contract violation
    pub const fn none() -> Self {
        Self { table: None }
    }

    /// Transform for a light's shadow reference
    ///
    /// Returns `None` for the sentinel. A reference to a slot that is not
    /// allocated is a caller bug: it asserts in debug builds and reads as
    /// unshadowed in release builds.
    pub fn get(&self, index: ShadowMapIndex) -> Option<&'a ShadowTransform> {
        let slot = index.slot()?;
        let transform = self.table.and_then(|table| table.transform(slot).ok());
        debug_assert!(
            transform.is_some(),
            "light references shadow slot {} which is not allocated",
            slot.0
        );
        transform
    }
}
