//! Light-space cameras for shadow map rendering
//!
//! Produces the `{projection, view}` pairs stored in the shadow map table.
//! Inputs are world-space lights, i.e. records before
//! [`LightRecord::to_view_space`](crate::lighting::LightRecord::to_view_space);
//! the resulting transforms map world positions to shadow clip space.

use crate::foundation::math::{Mat4, Mat4Ext, Vec3};
use crate::lighting::light::{DirectionalLight, SpotLight};
use crate::lighting::shadow::ShadowTransform;
use crate::{LightingError, LightingResult};

/// Near plane of spot light shadow cameras
pub const SPOT_SHADOW_NEAR: f32 = 0.1;

/// Far plane used when a spot light has no distance falloff
pub const SPOT_SHADOW_FALLBACK_FAR: f32 = 1000.0;

/// Attenuation denominator at which a light no longer casts visible shadows
pub const SHADOW_CUTOFF_DENOMINATOR: f32 = 256.0;

/// Extra depth in front of the fitted frustum, so off-screen casters still land in the map
pub const DIRECTIONAL_CASTER_MARGIN: f32 = 100.0;

/// Largest cone a perspective shadow camera can cover
const MAX_SPOT_SHADOW_ANGLE: f32 = std::f32::consts::PI - 1.0e-3;

/// Main camera frustum, as used to fit directional shadow cameras
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    /// Vertical field of view in radians
    pub fov_y: f32,
    /// Width over height
    pub aspect: f32,
    /// Near plane distance
    pub near: f32,
    /// Far plane distance
    pub far: f32,
}

impl Frustum {
    /// Create a frustum, rejecting degenerate planes and angles
    pub fn new(fov_y: f32, aspect: f32, near: f32, far: f32) -> LightingResult<Self> {
        if !(fov_y > 0.0 && fov_y < std::f32::consts::PI) {
            return Err(LightingError::invalid_parameter("fov_y", fov_y, "field of view must be within (0, pi)"));
        }
        if !(aspect.is_finite() && aspect > 0.0) {
            return Err(LightingError::invalid_parameter("aspect", aspect, "aspect ratio must be positive"));
        }
        if !(near > 0.0 && far > near && far.is_finite()) {
            return Err(LightingError::invalid_parameter(
                "near/far",
                (near, far),
                "planes must satisfy 0 < near < far",
            ));
        }
        Ok(Self { fov_y, aspect, near, far })
    }

    /// The eight corners in view space, near plane first
    pub fn view_space_corners(&self) -> [Vec3; 8] {
        let tan_half = (self.fov_y * 0.5).tan();
        let mut corners = [Vec3::zeros(); 8];
        for (plane, depth) in [self.near, self.far].into_iter().enumerate() {
            let half_height = depth * tan_half;
            let half_width = half_height * self.aspect;
            for (i, (sx, sy)) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)].into_iter().enumerate() {
                corners[plane * 4 + i] = Vec3::new(sx * half_width, sy * half_height, -depth);
            }
        }
        corners
    }
}

/// Distance at which a spot light's falloff reaches the shadow cutoff
///
/// Solves `c + l·d + q·d² = 256 · intensity` for `d`. Lights without any
/// distance-dependent term fall back to [`SPOT_SHADOW_FALLBACK_FAR`].
pub fn spot_shadow_range(light: &SpotLight) -> f32 {
    let att = light.attenuation;
    let target = SHADOW_CUTOFF_DENOMINATOR * light.intensity - att.constant;

    let range = if att.quadratic > 0.0 {
        let discriminant = att.linear * att.linear + 4.0 * att.quadratic * target;
        (-att.linear + discriminant.max(0.0).sqrt()) / (2.0 * att.quadratic)
    } else if att.linear > 0.0 {
        target / att.linear
    } else {
        SPOT_SHADOW_FALLBACK_FAR
    };

    range.clamp(SPOT_SHADOW_NEAR * 2.0, SPOT_SHADOW_FALLBACK_FAR)
}

/// Perspective shadow camera covering a spot light's cone
pub fn spot_light_transform(light: &SpotLight) -> LightingResult<ShadowTransform> {
    let cone_angle = light.cone_angle();
    if cone_angle >= MAX_SPOT_SHADOW_ANGLE {
        return Err(LightingError::invalid_parameter(
            "cos_cutoff",
            light.cos_cutoff,
            "shadowed spot lights need a cone narrower than 180 degrees",
        ));
    }

    let far = spot_shadow_range(light);
    let projection = Mat4::perspective(cone_angle, 1.0, SPOT_SHADOW_NEAR, far) * Mat4::vulkan_coordinate_transform();
    let view = Mat4::look_at(
        light.view_position,
        light.view_position + light.view_direction,
        stable_up(&light.view_direction),
    );

    log::trace!("Spot shadow camera: cone {:.3} rad, far {:.2}", cone_angle, far);
    Ok(ShadowTransform::new(projection, view))
}

/// Orthographic shadow camera enclosing the main camera's view frustum
///
/// `camera_view` is the main camera's world-to-view matrix. The box is fitted
/// around the frustum corners in light space and pushed back toward the light
/// by [`DIRECTIONAL_CASTER_MARGIN`].
pub fn directional_light_transform(
    light: &DirectionalLight,
    camera_view: &Mat4,
    frustum: &Frustum,
) -> LightingResult<ShadowTransform> {
    let camera_to_world = camera_view
        .try_inverse()
        .ok_or_else(|| LightingError::invalid_parameter("camera_view", camera_view, "view matrix is not invertible"))?;

    let corners = frustum
        .view_space_corners()
        .map(|corner| camera_to_world.transform_point(&corner.into()).coords);
    let center = corners.iter().sum::<Vec3>() / corners.len() as f32;

    let direction = light.view_direction;
    let view = Mat4::look_at(center - direction, center, stable_up(&direction));
    let to_light_space = Mat4::vulkan_coordinate_transform() * view;

    let mut min = Vec3::repeat(f32::MAX);
    let mut max = Vec3::repeat(f32::MIN);
    for corner in &corners {
        let p = to_light_space.transform_point(&(*corner).into()).coords;
        min = min.inf(&p);
        max = max.sup(&p);
    }

    let projection = Mat4::orthographic(min.x, max.x, min.y, max.y, min.z - DIRECTIONAL_CASTER_MARGIN, max.z)
        * Mat4::vulkan_coordinate_transform();

    log::trace!("Directional shadow camera: extent {:?} .. {:?}", min, max);
    Ok(ShadowTransform::new(projection, view))
}

fn stable_up(direction: &Vec3) -> Vec3 {
    if direction.normalize().y.abs() > 0.99 {
        Vec3::z()
    } else {
        Vec3::y()
    }
}
