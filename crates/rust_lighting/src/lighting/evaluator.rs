//! CPU lighting evaluator
//!
//! Mirrors `evaluateLighting` in `shaders/lighting.glsl`: start from the
//! ambient color, walk each per-type array up to its count, and scale every
//! contribution by its shadow visibility. Used for reference rendering and to
//! check the packed data without a GPU.

use crate::foundation::math::{utils, Vec2, Vec3};
use crate::lighting::collection::{GpuDirectionalLight, GpuPointLight, GpuSpotLight, LightCollection};
use crate::lighting::light::{Attenuation, LightKind, ShadowMapIndex};
use crate::lighting::shadow::{ResolvedShadows, ShadowSlot};
use crate::{LightingError, LightingResult};

/// Angles this close to the cone cutoff count as outside the cone
pub const CONE_EPSILON: f32 = 1.0e-6;

/// Default offset along the normal before the shadow lookup
pub const DEFAULT_SHADOW_NORMAL_OFFSET: f32 = 0.01;

/// Default depth bias of [`DepthMapSampler`]
pub const DEFAULT_DEPTH_BIAS: f32 = 0.005;

/// View-space surface point being shaded
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadingPoint {
    /// Position in view space
    pub view_position: Vec3,
    /// Unit normal in view space, or zero
    pub view_normal: Vec3,
}

impl ShadingPoint {
    /// Create a shading point; the normal is normalized, degenerate normals become zero
    pub fn new(view_position: Vec3, view_normal: Vec3) -> Self {
        Self {
            view_position,
            view_normal: view_normal.try_normalize(f32::EPSILON).unwrap_or_else(Vec3::zeros),
        }
    }
}

/// Source of shadow visibility for one shadow map slot
pub trait ShadowSampler {
    /// Visibility in [0, 1] of a point at `uv` with light-space `depth`
    fn visibility(&self, slot: ShadowSlot, uv: Vec2, depth: f32) -> f32;
}

/// Sampler that never occludes
#[derive(Debug, Clone, Copy, Default)]
pub struct Unshadowed;

impl ShadowSampler for Unshadowed {
    fn visibility(&self, _slot: ShadowSlot, _uv: Vec2, _depth: f32) -> f32 {
        1.0
    }
}

/// Row-major depth image on the CPU
#[derive(Debug, Clone, PartialEq)]
pub struct DepthMap {
    width: u32,
    height: u32,
    depths: Vec<f32>,
}

impl DepthMap {
    /// Wrap `width * height` depth values, row 0 at `v = 0`
    pub fn new(width: u32, height: u32, depths: Vec<f32>) -> LightingResult<Self> {
        let expected = width as usize * height as usize;
        if expected == 0 || depths.len() != expected {
            return Err(LightingError::invalid_parameter(
                "depths",
                depths.len(),
                "depth map must be non-empty and hold width * height values",
            ));
        }
        Ok(Self { width, height, depths })
    }

    /// Depth map of a single constant value
    pub fn filled(width: u32, height: u32, depth: f32) -> LightingResult<Self> {
        Self::new(width, height, vec![depth; width as usize * height as usize])
    }

    /// Nearest-texel depth, `None` outside [0, 1]²
    pub fn sample(&self, uv: Vec2) -> Option<f32> {
        if !(0.0..=1.0).contains(&uv.x) || !(0.0..=1.0).contains(&uv.y) {
            return None;
        }
        let x = ((uv.x * self.width as f32) as u32).min(self.width - 1);
        let y = ((uv.y * self.height as f32) as u32).min(self.height - 1);
        self.depths.get((y * self.width + x) as usize).copied()
    }
}

/// Hard depth comparison against CPU depth maps
///
/// Slots without a map, and lookups outside the map, are lit.
#[derive(Debug, Clone)]
pub struct DepthMapSampler {
    maps: Vec<Option<DepthMap>>,
    bias: f32,
}

impl DepthMapSampler {
    /// Create a sampler with the given depth bias
    pub fn new(bias: f32) -> Self {
        Self { maps: Vec::new(), bias }
    }

    /// Attach a depth map to a slot
    pub fn insert(&mut self, slot: ShadowSlot, map: DepthMap) {
        let index = slot.index() as usize;
        if self.maps.len() <= index {
            self.maps.resize(index + 1, None);
        }
        self.maps[index] = Some(map);
    }

    /// Depth map attached to a slot
    pub fn get(&self, slot: ShadowSlot) -> Option<&DepthMap> {
        self.maps.get(slot.index() as usize).and_then(Option::as_ref)
    }
}

impl Default for DepthMapSampler {
    fn default() -> Self {
        Self::new(DEFAULT_DEPTH_BIAS)
    }
}

impl ShadowSampler for DepthMapSampler {
    fn visibility(&self, slot: ShadowSlot, uv: Vec2, depth: f32) -> f32 {
        if !(0.0..=1.0).contains(&depth) {
            return 1.0;
        }
        match self.get(slot).and_then(|map| map.sample(uv)) {
            Some(occluder) if depth - self.bias > occluder => 0.0,
            _ => 1.0,
        }
    }
}

/// Accumulates radiance at a shading point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightingEvaluator {
    /// Distance the shading point is pushed along its normal before the shadow lookup
    pub shadow_normal_offset: f32,
}

impl Default for LightingEvaluator {
    fn default() -> Self {
        Self { shadow_normal_offset: DEFAULT_SHADOW_NORMAL_OFFSET }
    }
}

impl LightingEvaluator {
    /// Create an evaluator with a custom normal offset
    pub const fn new(shadow_normal_offset: f32) -> Self {
        Self { shadow_normal_offset }
    }

    /// Total incoming radiance at `point`
    ///
    /// `shadows` must come from [`ShadowMapTable::resolve`](crate::lighting::ShadowMapTable::resolve)
    /// for the frame `lights` was packed in.
    pub fn evaluate<S>(
        &self,
        point: &ShadingPoint,
        lights: &LightCollection,
        shadows: &ResolvedShadows<'_>,
        sampler: &S,
    ) -> Vec3
    where
        S: ShadowSampler + ?Sized,
    {
        let mut radiance = lights.ambient().color;

        for kind in LightKind::ALL {
            match kind {
                LightKind::Point => {
                    for light in lights.point_lights() {
                        radiance += self.point(point, light, lights, shadows, sampler);
                    }
                }
                LightKind::Directional => {
                    for light in lights.directional_lights() {
                        radiance += self.directional(point, light, lights, shadows, sampler);
                    }
                }
                LightKind::Spot => {
                    for light in lights.spot_lights() {
                        radiance += self.spot(point, light, lights, shadows, sampler);
                    }
                }
            }
        }

        radiance
    }

    fn point<S: ShadowSampler + ?Sized>(
        &self,
        point: &ShadingPoint,
        light: &GpuPointLight,
        lights: &LightCollection,
        shadows: &ResolvedShadows<'_>,
        sampler: &S,
    ) -> Vec3 {
        let distance = (Vec3::from(light.view_position) - point.view_position).norm();
        let scale = light.intensity * Attenuation::from_array(light.attenuation).factor(distance);
        if scale <= 0.0 {
            return Vec3::zeros();
        }
        Vec3::from(light.color) * scale * self.visibility(point, light.shadow_map_index, lights, shadows, sampler)
    }

    fn directional<S: ShadowSampler + ?Sized>(
        &self,
        point: &ShadingPoint,
        light: &GpuDirectionalLight,
        lights: &LightCollection,
        shadows: &ResolvedShadows<'_>,
        sampler: &S,
    ) -> Vec3 {
        Vec3::from(light.color)
            * light.intensity
            * self.visibility(point, light.shadow_map_index, lights, shadows, sampler)
    }

    fn spot<S: ShadowSampler + ?Sized>(
        &self,
        point: &ShadingPoint,
        light: &GpuSpotLight,
        lights: &LightCollection,
        shadows: &ResolvedShadows<'_>,
        sampler: &S,
    ) -> Vec3 {
        let to_point = point.view_position - Vec3::from(light.view_position);
        let distance = to_point.norm();

        let cone = if distance > 0.0 {
            let cos_theta = (to_point / distance).dot(&Vec3::from(light.view_direction));
            cone_falloff(light.cos_cutoff, cos_theta)
        } else {
            1.0
        };

        let scale = light.intensity * Attenuation::from_array(light.attenuation).factor(distance) * cone;
        if scale <= 0.0 {
            return Vec3::zeros();
        }
        Vec3::from(light.color) * scale * self.visibility(point, light.shadow_map_index, lights, shadows, sampler)
    }

    fn visibility<S: ShadowSampler + ?Sized>(
        &self,
        point: &ShadingPoint,
        raw_index: i32,
        lights: &LightCollection,
        shadows: &ResolvedShadows<'_>,
        sampler: &S,
    ) -> f32 {
        debug_assert!(raw_index >= ShadowMapIndex::NONE.raw(), "invalid shadow map index {}", raw_index);
        let Some(slot) = u32::try_from(raw_index).ok().and_then(ShadowSlot::new) else {
            return 1.0;
        };
        let Some(transform) = shadows.get(slot.into()) else {
            return 1.0;
        };

        let offset_position = point.view_position + point.view_normal * self.shadow_normal_offset;
        let world = lights.inverted_view() * offset_position.push(1.0);
        let clip = transform.view_projection() * world;
        if clip.w <= 0.0 {
            return 1.0;
        }

        let ndc = clip.xyz() / clip.w;
        let uv = Vec2::new(ndc.x * 0.5 + 0.5, ndc.y * 0.5 + 0.5);
        sampler.visibility(slot, uv, ndc.z).clamp(0.0, 1.0)
    }
}

fn cone_falloff(cos_cutoff: f32, cos_theta: f32) -> f32 {
    if cos_theta <= cos_cutoff + CONE_EPSILON {
        0.0
    } else {
        utils::smoothstep(cos_cutoff, 1.0, cos_theta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LightingConfig;
    use crate::foundation::math::Mat4;
    use crate::lighting::collection::LightPacker;
    use crate::lighting::light::{AmbientLight, Attenuation, DirectionalLight, LightRecord, PointLight, SpotLight};
    use crate::lighting::shadow::ShadowMapTable;
    use approx::assert_relative_eq;

    fn pack(lights: &[LightRecord], ambient: Vec3) -> LightCollection {
        LightPacker::new(LightingConfig::new(4, 4, 4, 4))
            .unwrap()
            .pack(lights, AmbientLight::new(ambient), Mat4::identity())
            .unwrap()
    }

    fn origin() -> ShadingPoint {
        ShadingPoint::new(Vec3::zeros(), Vec3::z())
    }

    fn spot_at_angle(degrees: f32) -> Vec3 {
        let angle = utils::deg_to_rad(degrees);
        Vec3::new(angle.sin(), 0.0, -angle.cos()) * 2.0
    }

    #[test]
    fn test_ambient_only_is_exact() {
        let lights = pack(&[], Vec3::new(0.2, 0.2, 0.2));
        let result = LightingEvaluator::default().evaluate(&origin(), &lights, &ResolvedShadows::none(), &Unshadowed);
        assert_eq!(result, Vec3::new(0.2, 0.2, 0.2));
    }

    #[test]
    fn test_point_light_at_zero_distance_contributes_color() {
        let color = Vec3::new(0.7, 0.3, 0.1);
        let point = PointLight::new(Vec3::zeros(), color, 1.0)
            .unwrap()
            .with_attenuation(Attenuation::none())
            .unwrap();
        let lights = pack(&[point.into()], Vec3::zeros());

        let result = LightingEvaluator::default().evaluate(&origin(), &lights, &ResolvedShadows::none(), &Unshadowed);
        assert_eq!(result, color);
    }

    #[test]
    fn test_point_light_falloff() {
        let point = PointLight::new(Vec3::new(0.0, 0.0, -2.0), Vec3::new(1.0, 1.0, 1.0), 2.0)
            .unwrap()
            .with_attenuation(Attenuation::new(1.0, 0.5, 0.25).unwrap())
            .unwrap();
        let lights = pack(&[point.into()], Vec3::zeros());

        // 1 / (1 + 1 + 1) * 2
        let result = LightingEvaluator::default().evaluate(&origin(), &lights, &ResolvedShadows::none(), &Unshadowed);
        assert_relative_eq!(result.x, 2.0 / 3.0, epsilon = 1e-6);
    }

    #[test]
    fn test_point_light_at_shading_point_stays_finite() {
        let point = PointLight::new(Vec3::zeros(), Vec3::new(1.0, 1.0, 1.0), 1.0)
            .unwrap()
            .with_attenuation(Attenuation::new(0.0, 1.0, 0.0).unwrap())
            .unwrap();
        let lights = pack(&[point.into()], Vec3::new(0.1, 0.1, 0.1));

        let result = LightingEvaluator::default().evaluate(&origin(), &lights, &ResolvedShadows::none(), &Unshadowed);
        assert!(result.iter().all(|c| c.is_finite()));
        assert_relative_eq!(result, Vec3::new(0.1, 0.1, 0.1));
        assert_eq!(point.attenuation.factor(0.0), 0.0);
    }

    #[test]
    fn test_spot_cone_boundary() {
        let spot = SpotLight::new(
            Vec3::zeros(),
            -Vec3::z(),
            utils::deg_to_rad(30.0).cos(),
            Vec3::new(1.0, 1.0, 1.0),
            1.0,
        )
        .unwrap();
        let lights = pack(&[spot.into()], Vec3::zeros());
        let evaluator = LightingEvaluator::default();

        let at_cutoff = ShadingPoint::new(spot_at_angle(30.0), Vec3::z());
        let inside = ShadingPoint::new(spot_at_angle(29.0), Vec3::z());
        let outside = ShadingPoint::new(spot_at_angle(45.0), Vec3::z());

        assert_eq!(evaluator.evaluate(&at_cutoff, &lights, &ResolvedShadows::none(), &Unshadowed), Vec3::zeros());
        assert_eq!(evaluator.evaluate(&outside, &lights, &ResolvedShadows::none(), &Unshadowed), Vec3::zeros());
        assert!(evaluator.evaluate(&inside, &lights, &ResolvedShadows::none(), &Unshadowed).x > 0.0);
    }

    #[test]
    fn test_spot_on_axis_is_full_strength() {
        let spot = SpotLight::new(Vec3::zeros(), -Vec3::z(), 0.5, Vec3::new(1.0, 0.0, 0.0), 1.0)
            .unwrap()
            .with_attenuation(Attenuation::none())
            .unwrap();
        let lights = pack(&[spot.into()], Vec3::zeros());

        let on_axis = ShadingPoint::new(Vec3::new(0.0, 0.0, -3.0), Vec3::z());
        let result = LightingEvaluator::default().evaluate(&on_axis, &lights, &ResolvedShadows::none(), &Unshadowed);
        assert_relative_eq!(result.x, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_directional_ignores_distance() {
        let sun = DirectionalLight::new(-Vec3::y(), Vec3::new(0.5, 0.5, 0.5), 2.0).unwrap();
        let lights = pack(&[sun.into()], Vec3::new(0.1, 0.1, 0.1));
        let evaluator = LightingEvaluator::default();

        let near = evaluator.evaluate(&origin(), &lights, &ResolvedShadows::none(), &Unshadowed);
        let far = evaluator.evaluate(
            &ShadingPoint::new(Vec3::new(100.0, -40.0, -900.0), Vec3::y()),
            &lights,
            &ResolvedShadows::none(),
            &Unshadowed,
        );
        assert_eq!(near, far);
        assert_relative_eq!(near.x, 1.1, epsilon = 1e-6);
    }

    #[test]
    fn test_contributions_sum() {
        let records: Vec<LightRecord> = vec![
            DirectionalLight::new(-Vec3::y(), Vec3::new(0.25, 0.0, 0.0), 1.0).unwrap().into(),
            DirectionalLight::new(-Vec3::x(), Vec3::new(0.25, 0.0, 0.0), 1.0).unwrap().into(),
            PointLight::new(Vec3::zeros(), Vec3::new(0.0, 0.5, 0.0), 1.0)
                .unwrap()
                .with_attenuation(Attenuation::none())
                .unwrap()
                .into(),
        ];
        let lights = pack(&records, Vec3::new(0.0, 0.0, 0.125));
        let result = LightingEvaluator::default().evaluate(&origin(), &lights, &ResolvedShadows::none(), &Unshadowed);
        assert_eq!(result, Vec3::new(0.5, 0.5, 0.125));
    }

    fn shadowed_scene(occluder_depth: f32) -> Vec3 {
        let mut table = ShadowMapTable::new(2);
        let sun = DirectionalLight::new(-Vec3::z(), Vec3::new(1.0, 1.0, 1.0), 1.0).unwrap();
        let slot = table.allocate(&sun.into()).unwrap();
        table.begin_frame();
        table.set_transform(slot, Mat4::identity(), Mat4::identity()).unwrap();

        let lights = pack(&[sun.with_shadow(slot).into()], Vec3::zeros());
        let mut sampler = DepthMapSampler::new(0.01);
        sampler.insert(slot, DepthMap::filled(4, 4, occluder_depth).unwrap());

        // Identity transforms put the point at uv (0.5, 0.5), depth 0.5
        let point = ShadingPoint::new(Vec3::new(0.0, 0.0, 0.5), Vec3::zeros());
        let shadows = table.resolve().unwrap();
        LightingEvaluator::default().evaluate(&point, &lights, &shadows, &sampler)
    }

    #[test]
    fn test_occluded_light_contributes_nothing() {
        assert_eq!(shadowed_scene(0.2), Vec3::zeros());
    }

    #[test]
    fn test_unoccluded_light_is_lit() {
        assert_eq!(shadowed_scene(0.9), Vec3::new(1.0, 1.0, 1.0));
    }

    #[test]
    fn test_sampler_outside_map_is_lit() {
        let mut sampler = DepthMapSampler::default();
        let slot = ShadowSlot::new(1).unwrap();
        sampler.insert(slot, DepthMap::filled(2, 2, 0.0).unwrap());

        assert_eq!(sampler.visibility(slot, Vec2::new(1.5, 0.5), 0.5), 1.0);
        assert_eq!(sampler.visibility(slot, Vec2::new(0.5, 0.5), 1.5), 1.0);
        assert_eq!(sampler.visibility(ShadowSlot::new(0).unwrap(), Vec2::new(0.5, 0.5), 0.5), 1.0);
        assert_eq!(sampler.visibility(slot, Vec2::new(0.5, 0.5), 0.5), 0.0);
    }

    #[test]
    fn test_depth_map_size_checked() {
        assert!(DepthMap::new(2, 2, vec![0.0; 3]).is_err());
        assert!(DepthMap::new(0, 2, Vec::new()).is_err());
        let map = DepthMap::new(2, 1, vec![0.1, 0.9]).unwrap();
        assert_eq!(map.sample(Vec2::new(0.9, 0.0)), Some(0.9));
        assert_eq!(map.sample(Vec2::new(1.0, 1.0)), Some(0.9));
    }

    #[test]
    fn test_shading_point_normalizes() {
        let point = ShadingPoint::new(Vec3::zeros(), Vec3::new(0.0, 3.0, 0.0));
        assert_eq!(point.view_normal, Vec3::y());
        assert_eq!(ShadingPoint::new(Vec3::zeros(), Vec3::zeros()).view_normal, Vec3::zeros());
    }
}
