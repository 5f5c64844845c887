//! Light records
//!
//! Pure data describing one light each. Positions and directions are in view
//! space so the shading stage needs no further transform; world-space records
//! are converted with [`LightRecord::to_view_space`] before packing.
//!
//! The validating constructors (`new`, `with_attenuation`, ...) reject
//! out-of-range values with [`LightingError::InvalidLightParameter`]. Struct
//! literals bypass validation and malformed values then flow into rendering
//! unchecked, which is what the GPU path does as well.

use bitflags::bitflags;

use crate::foundation::math::{Mat4, Vec3};
use crate::lighting::shadow::ShadowSlot;
use crate::{LightingError, LightingResult};

/// Light type discriminant shared with the shader
///
/// The numeric tags match the shader constants `TYPE_POINT`, `TYPE_DIRECTIONAL`
/// and `TYPE_SPOT`. They select which per-type array is iterated; they are never
/// used to index a combined array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum LightKind {
    /// Point light radiating in all directions
    Point = 0,
    /// Infinitely distant light with parallel rays
    Directional = 1,
    /// Cone of light from a position
    Spot = 2,
}

impl LightKind {
    /// Every kind, in dispatch order
    pub const ALL: [LightKind; 3] = [LightKind::Point, LightKind::Directional, LightKind::Spot];

    /// Numeric tag as seen by the shader
    pub const fn tag(self) -> i32 {
        self as i32
    }

    /// Capabilities shared by every light of this kind
    pub const fn capabilities(self) -> LightCapabilities {
        match self {
            LightKind::Point => LightCapabilities::POSITION
                .union(LightCapabilities::ATTENUATION)
                .union(LightCapabilities::SHADOW),
            LightKind::Directional => LightCapabilities::DIRECTION
                .union(LightCapabilities::SHADOW),
            LightKind::Spot => LightCapabilities::POSITION
                .union(LightCapabilities::DIRECTION)
                .union(LightCapabilities::CONE)
                .union(LightCapabilities::ATTENUATION)
                .union(LightCapabilities::SHADOW),
        }
    }
}

impl TryFrom<i32> for LightKind {
    type Error = LightingError;

    fn try_from(tag: i32) -> Result<Self, Self::Error> {
        match tag {
            0 => Ok(LightKind::Point),
            1 => Ok(LightKind::Directional),
            2 => Ok(LightKind::Spot),
            _ => Err(LightingError::invalid_parameter("light type tag", tag, "expected 0, 1 or 2")),
        }
    }
}

bitflags! {
    /// Which optional fields a light record carries
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct LightCapabilities: u8 {
        /// Has a view-space position
        const POSITION = 1 << 0;
        /// Has a view-space direction
        const DIRECTION = 1 << 1;
        /// Has a cone cutoff
        const CONE = 1 << 2;
        /// Has distance attenuation coefficients
        const ATTENUATION = 1 << 3;
        /// Can reference a shadow map slot
        const SHADOW = 1 << 4;
    }
}

/// Index into the shadow map table, or the explicit "no shadow" sentinel
///
/// Stored as a signed integer because that is what the shader reads. The
/// default is [`ShadowMapIndex::NONE`], never slot zero, since zero is a valid
/// slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShadowMapIndex(i32);

impl ShadowMapIndex {
    /// No shadow map for this light
    pub const NONE: Self = Self(-1);

    /// Raw value written into the light buffer
    pub const fn raw(self) -> i32 {
        self.0
    }

    /// Whether this is the "no shadow" sentinel
    pub const fn is_none(self) -> bool {
        self.0 < 0
    }

    /// Slot this index refers to, if any
    pub fn slot(self) -> Option<ShadowSlot> {
        u32::try_from(self.0).ok().and_then(ShadowSlot::new)
    }
}

impl Default for ShadowMapIndex {
    fn default() -> Self {
        Self::NONE
    }
}

impl From<ShadowSlot> for ShadowMapIndex {
    fn from(slot: ShadowSlot) -> Self {
        // Slot indices never exceed i32::MAX
        Self(slot.index() as i32)
    }
}

impl From<Option<ShadowSlot>> for ShadowMapIndex {
    fn from(slot: Option<ShadowSlot>) -> Self {
        slot.map_or(Self::NONE, Self::from)
    }
}

/// Distance falloff `1 / (constant + linear·d + quadratic·d²)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attenuation {
    /// Constant term
    pub constant: f32,
    /// Linear term
    pub linear: f32,
    /// Quadratic term
    pub quadratic: f32,
}

impl Attenuation {
    /// Create an attenuation model, rejecting negative or all-zero coefficients
    pub fn new(constant: f32, linear: f32, quadratic: f32) -> LightingResult<Self> {
        let attenuation = Self { constant, linear, quadratic };
        attenuation.validate()?;
        Ok(attenuation)
    }

    /// No falloff at all
    pub const fn none() -> Self {
        Self { constant: 1.0, linear: 0.0, quadratic: 0.0 }
    }

    /// Coefficients in buffer order, unvalidated
    pub const fn from_array([constant, linear, quadratic]: [f32; 3]) -> Self {
        Self { constant, linear, quadratic }
    }

    /// Attenuation factor at distance `d`
    ///
    /// Zero when the denominator is not positive, same as the shader.
    pub fn factor(&self, d: f32) -> f32 {
        let denominator = self.constant + self.linear * d + self.quadratic * d * d;
        if denominator > 0.0 {
            1.0 / denominator
        } else {
            0.0
        }
    }

    /// Coefficients in buffer order
    pub const fn to_array(self) -> [f32; 3] {
        [self.constant, self.linear, self.quadratic]
    }

    fn validate(&self) -> LightingResult<()> {
        let coefficients = self.to_array();
        if coefficients.iter().any(|c| !c.is_finite() || *c < 0.0) {
            return Err(LightingError::invalid_parameter(
                "attenuation",
                coefficients,
                "coefficients must be finite and non-negative",
            ));
        }
        if coefficients.iter().all(|c| *c == 0.0) {
            return Err(LightingError::invalid_parameter(
                "attenuation",
                coefficients,
                "at least one coefficient must be positive",
            ));
        }
        Ok(())
    }
}

impl Default for Attenuation {
    fn default() -> Self {
        Self { constant: 1.0, linear: 0.09, quadratic: 0.032 }
    }
}

/// Ambient term added to every shading point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmbientLight {
    /// Linear-light radiance
    pub color: Vec3,
}

impl AmbientLight {
    /// Create an ambient light
    pub const fn new(color: Vec3) -> Self {
        Self { color }
    }
}

impl From<[f32; 3]> for AmbientLight {
    fn from(color: [f32; 3]) -> Self {
        Self::new(Vec3::from(color))
    }
}

impl Default for AmbientLight {
    fn default() -> Self {
        Self::new(Vec3::zeros())
    }
}

/// Point light
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    /// Position in view space
    pub view_position: Vec3,
    /// Linear-light color
    pub color: Vec3,
    /// Scalar multiplier on `color`
    pub intensity: f32,
    /// Distance falloff
    pub attenuation: Attenuation,
    /// Shadow map slot, or [`ShadowMapIndex::NONE`]
    pub shadow_map_index: ShadowMapIndex,
}

impl PointLight {
    /// Create a point light with default attenuation and no shadow
    pub fn new(view_position: Vec3, color: Vec3, intensity: f32) -> LightingResult<Self> {
        check_finite("view_position", view_position)?;
        check_finite("color", color)?;
        check_intensity(intensity)?;
        Ok(Self {
            view_position,
            color,
            intensity,
            attenuation: Attenuation::default(),
            shadow_map_index: ShadowMapIndex::NONE,
        })
    }

    /// Replace the attenuation model
    pub fn with_attenuation(mut self, attenuation: Attenuation) -> LightingResult<Self> {
        attenuation.validate()?;
        self.attenuation = attenuation;
        Ok(self)
    }

    /// Reference a shadow map slot
    pub fn with_shadow(mut self, index: impl Into<ShadowMapIndex>) -> Self {
        self.shadow_map_index = index.into();
        self
    }
}

/// Directional light
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    /// Normalized direction the light travels, in view space
    pub view_direction: Vec3,
    /// Linear-light color
    pub color: Vec3,
    /// Scalar multiplier on `color`
    pub intensity: f32,
    /// Shadow map slot, or [`ShadowMapIndex::NONE`]
    pub shadow_map_index: ShadowMapIndex,
}

impl DirectionalLight {
    /// Create a directional light; the direction is normalized
    pub fn new(view_direction: Vec3, color: Vec3, intensity: f32) -> LightingResult<Self> {
        let view_direction = normalized_direction("view_direction", view_direction)?;
        check_finite("color", color)?;
        check_intensity(intensity)?;
        Ok(Self {
            view_direction,
            color,
            intensity,
            shadow_map_index: ShadowMapIndex::NONE,
        })
    }

    /// Reference a shadow map slot
    pub fn with_shadow(mut self, index: impl Into<ShadowMapIndex>) -> Self {
        self.shadow_map_index = index.into();
        self
    }
}

/// Spot light
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpotLight {
    /// Position in view space
    pub view_position: Vec3,
    /// Cosine of the cone half-angle
    pub cos_cutoff: f32,
    /// Normalized cone axis in view space
    pub view_direction: Vec3,
    /// Linear-light color
    pub color: Vec3,
    /// Scalar multiplier on `color`
    pub intensity: f32,
    /// Distance falloff
    pub attenuation: Attenuation,
    /// Shadow map slot, or [`ShadowMapIndex::NONE`]
    pub shadow_map_index: ShadowMapIndex,
}

impl SpotLight {
    /// Create a spot light from the cosine of its half-angle
    pub fn new(
        view_position: Vec3,
        view_direction: Vec3,
        cos_cutoff: f32,
        color: Vec3,
        intensity: f32,
    ) -> LightingResult<Self> {
        check_finite("view_position", view_position)?;
        let view_direction = normalized_direction("view_direction", view_direction)?;
        if !(-1.0..=1.0).contains(&cos_cutoff) {
            return Err(LightingError::invalid_parameter(
                "cos_cutoff",
                cos_cutoff,
                "cosine cutoff must be within [-1, 1]",
            ));
        }
        check_finite("color", color)?;
        check_intensity(intensity)?;
        Ok(Self {
            view_position,
            cos_cutoff,
            view_direction,
            color,
            intensity,
            attenuation: Attenuation::default(),
            shadow_map_index: ShadowMapIndex::NONE,
        })
    }

    /// Create a spot light from its full cone angle in radians
    pub fn from_cone_angle(
        view_position: Vec3,
        view_direction: Vec3,
        cone_angle: f32,
        color: Vec3,
        intensity: f32,
    ) -> LightingResult<Self> {
        if !cone_angle.is_finite() || cone_angle < 0.0 {
            return Err(LightingError::invalid_parameter(
                "cone_angle",
                cone_angle,
                "cone angle must be finite and non-negative",
            ));
        }
        Self::new(view_position, view_direction, (cone_angle * 0.5).cos(), color, intensity)
    }

    /// Full cone angle in radians
    pub fn cone_angle(&self) -> f32 {
        self.cos_cutoff.clamp(-1.0, 1.0).acos() * 2.0
    }

    /// Replace the attenuation model
    pub fn with_attenuation(mut self, attenuation: Attenuation) -> LightingResult<Self> {
        attenuation.validate()?;
        self.attenuation = attenuation;
        Ok(self)
    }

    /// Reference a shadow map slot
    pub fn with_shadow(mut self, index: impl Into<ShadowMapIndex>) -> Self {
        self.shadow_map_index = index.into();
        self
    }
}

/// Any light, as handed over by the light manager
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightRecord {
    /// Ambient term
    Ambient(AmbientLight),
    /// Point light
    Point(PointLight),
    /// Directional light
    Directional(DirectionalLight),
    /// Spot light
    Spot(SpotLight),
}

impl LightRecord {
    /// Dispatch kind; `None` for the ambient term, which has no array
    pub const fn kind(&self) -> Option<LightKind> {
        match self {
            LightRecord::Ambient(_) => None,
            LightRecord::Point(_) => Some(LightKind::Point),
            LightRecord::Directional(_) => Some(LightKind::Directional),
            LightRecord::Spot(_) => Some(LightKind::Spot),
        }
    }

    /// Fields this record carries
    pub const fn capabilities(&self) -> LightCapabilities {
        match self.kind() {
            Some(kind) => kind.capabilities(),
            None => LightCapabilities::empty(),
        }
    }

    /// Shadow map reference, [`ShadowMapIndex::NONE`] for ambient lights
    pub const fn shadow_map_index(&self) -> ShadowMapIndex {
        match self {
            LightRecord::Ambient(_) => ShadowMapIndex::NONE,
            LightRecord::Point(light) => light.shadow_map_index,
            LightRecord::Directional(light) => light.shadow_map_index,
            LightRecord::Spot(light) => light.shadow_map_index,
        }
    }

    /// Point this light at a shadow slot, or clear it with [`ShadowMapIndex::NONE`]
    pub fn set_shadow_map_index(&mut self, index: impl Into<ShadowMapIndex>) -> LightingResult<()> {
        let index = index.into();
        match self {
            LightRecord::Ambient(_) => {
                return Err(LightingError::invalid_parameter(
                    "shadow_map_index",
                    index.raw(),
                    "ambient lights cannot reference a shadow map",
                ));
            }
            LightRecord::Point(light) => light.shadow_map_index = index,
            LightRecord::Directional(light) => light.shadow_map_index = index,
            LightRecord::Spot(light) => light.shadow_map_index = index,
        }
        Ok(())
    }

    /// Re-run constructor validation on a record built from a struct literal
    pub fn validate(&self) -> LightingResult<()> {
        match self {
            LightRecord::Ambient(light) => check_finite("color", light.color),
            LightRecord::Point(light) => {
                check_finite("view_position", light.view_position)?;
                check_finite("color", light.color)?;
                check_intensity(light.intensity)?;
                light.attenuation.validate()
            }
            LightRecord::Directional(light) => {
                normalized_direction("view_direction", light.view_direction)?;
                check_finite("color", light.color)?;
                check_intensity(light.intensity)
            }
            LightRecord::Spot(light) => {
                SpotLight::new(
                    light.view_position,
                    light.view_direction,
                    light.cos_cutoff,
                    light.color,
                    light.intensity,
                )?;
                light.attenuation.validate()
            }
        }
    }

    /// Transform a world-space record into view space
    ///
    /// Positions are transformed as points, directions as vectors and then
    /// renormalized. Doing this once per light on the CPU saves the shading stage
    /// from doing it per fragment.
    pub fn to_view_space(&self, view: &Mat4) -> Self {
        let point = |p: Vec3| view.transform_point(&p.into()).coords;
        let direction = |d: Vec3| {
            let v = view.transform_vector(&d);
            v.try_normalize(f32::EPSILON).unwrap_or(v)
        };

        match *self {
            LightRecord::Ambient(light) => LightRecord::Ambient(light),
            LightRecord::Point(light) => LightRecord::Point(PointLight {
                view_position: point(light.view_position),
                ..light
            }),
            LightRecord::Directional(light) => LightRecord::Directional(DirectionalLight {
                view_direction: direction(light.view_direction),
                ..light
            }),
            LightRecord::Spot(light) => LightRecord::Spot(SpotLight {
                view_position: point(light.view_position),
                view_direction: direction(light.view_direction),
                ..light
            }),
        }
    }
}

impl From<AmbientLight> for LightRecord {
    fn from(light: AmbientLight) -> Self {
        LightRecord::Ambient(light)
    }
}

impl From<PointLight> for LightRecord {
    fn from(light: PointLight) -> Self {
        LightRecord::Point(light)
    }
}

impl From<DirectionalLight> for LightRecord {
    fn from(light: DirectionalLight) -> Self {
        LightRecord::Directional(light)
    }
}

impl From<SpotLight> for LightRecord {
    fn from(light: SpotLight) -> Self {
        LightRecord::Spot(light)
    }
}

fn check_finite(parameter: &'static str, v: Vec3) -> LightingResult<()> {
    if v.iter().all(|c| c.is_finite()) {
        Ok(())
    } else {
        Err(LightingError::invalid_parameter(parameter, [v.x, v.y, v.z], "components must be finite"))
    }
}

fn check_intensity(intensity: f32) -> LightingResult<()> {
    if intensity.is_finite() && intensity >= 0.0 {
        Ok(())
    } else {
        Err(LightingError::invalid_parameter("intensity", intensity, "intensity must be finite and >= 0"))
    }
}

fn normalized_direction(parameter: &'static str, v: Vec3) -> LightingResult<Vec3> {
    check_finite(parameter, v)?;
    v.try_normalize(f32::EPSILON)
        .ok_or_else(|| LightingError::invalid_parameter(parameter, [v.x, v.y, v.z], "direction must be non-zero"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Mat4Ext;
    use approx::assert_relative_eq;

    #[test]
    fn test_kind_tags_match_shader_constants() {
        assert_eq!(LightKind::Point.tag(), 0);
        assert_eq!(LightKind::Directional.tag(), 1);
        assert_eq!(LightKind::Spot.tag(), 2);
        assert_eq!(LightKind::try_from(2).unwrap(), LightKind::Spot);
        assert!(LightKind::try_from(3).is_err());
    }

    #[test]
    fn test_capabilities_per_kind() {
        let spot = LightKind::Spot.capabilities();
        assert!(spot.contains(LightCapabilities::CONE | LightCapabilities::ATTENUATION));

        let directional = LightKind::Directional.capabilities();
        assert!(!directional.contains(LightCapabilities::ATTENUATION));
        assert!(!directional.contains(LightCapabilities::POSITION));

        let ambient = LightRecord::Ambient(AmbientLight::default());
        assert!(ambient.capabilities().is_empty());
    }

    #[test]
    fn test_shadow_index_defaults_to_sentinel() {
        let light = PointLight::new(Vec3::zeros(), Vec3::new(1.0, 1.0, 1.0), 1.0).unwrap();
        assert!(light.shadow_map_index.is_none());
        assert_eq!(light.shadow_map_index.raw(), -1);
        assert_eq!(ShadowMapIndex::default(), ShadowMapIndex::NONE);

        let shadowed = light.with_shadow(ShadowSlot::new(0).unwrap());
        assert_eq!(shadowed.shadow_map_index.raw(), 0);
        assert_eq!(shadowed.shadow_map_index.slot(), Some(ShadowSlot::new(0).unwrap()));
    }

    #[test]
    fn test_negative_intensity_rejected() {
        let result = PointLight::new(Vec3::zeros(), Vec3::new(1.0, 1.0, 1.0), -0.5);
        assert!(matches!(
            result,
            Err(LightingError::InvalidLightParameter { parameter: "intensity", .. })
        ));
    }

    #[test]
    fn test_cutoff_out_of_range_rejected() {
        let result = SpotLight::new(Vec3::zeros(), -Vec3::z(), 1.5, Vec3::new(1.0, 1.0, 1.0), 1.0);
        assert!(matches!(
            result,
            Err(LightingError::InvalidLightParameter { parameter: "cos_cutoff", .. })
        ));
    }

    #[test]
    fn test_zero_direction_rejected() {
        let result = DirectionalLight::new(Vec3::zeros(), Vec3::new(1.0, 1.0, 1.0), 1.0);
        assert!(result.is_err());
    }

    #[test]
    fn test_attenuation_validation() {
        assert!(Attenuation::new(0.0, 0.0, 0.0).is_err());
        assert!(Attenuation::new(1.0, -0.1, 0.0).is_err());
        let att = Attenuation::new(1.0, 0.5, 0.25).unwrap();
        assert_relative_eq!(att.factor(2.0), 1.0 / 3.0);
    }

    #[test]
    fn test_attenuation_never_infinite() {
        let degenerate = Attenuation { constant: 0.0, linear: 0.0, quadratic: 0.0 };
        assert_eq!(degenerate.factor(1.0), 0.0);
        assert_eq!(degenerate.factor(0.0), 0.0);
        assert_eq!(Attenuation::from_array([0.0, 1.0, 0.0]).factor(0.0), 0.0);
        assert_eq!(Attenuation::from_array([1.0, 0.0, 0.0]).factor(5.0), 1.0);
    }

    #[test]
    fn test_max_slot_keeps_shadow_index() {
        let light = DirectionalLight::new(-Vec3::y(), Vec3::new(1.0, 1.0, 1.0), 1.0).unwrap();
        let shadowed = light.with_shadow(ShadowSlot::new(ShadowSlot::MAX_INDEX).unwrap());
        assert_eq!(shadowed.shadow_map_index.raw(), i32::MAX);
        assert!(!shadowed.shadow_map_index.is_none());
        assert!(ShadowSlot::new(u32::MAX).is_none());
    }

    #[test]
    fn test_spot_from_cone_angle() {
        let spot = SpotLight::from_cone_angle(
            Vec3::zeros(),
            Vec3::new(0.0, 0.0, -2.0),
            std::f32::consts::FRAC_PI_2,
            Vec3::new(1.0, 1.0, 1.0),
            1.0,
        )
        .unwrap();
        assert_relative_eq!(spot.cos_cutoff, std::f32::consts::FRAC_PI_4.cos());
        assert_relative_eq!(spot.view_direction, -Vec3::z());
        assert_relative_eq!(spot.cone_angle(), std::f32::consts::FRAC_PI_2, epsilon = 1e-5);
    }

    #[test]
    fn test_ambient_cannot_hold_shadow_index() {
        let mut record = LightRecord::Ambient(AmbientLight::new(Vec3::new(0.1, 0.1, 0.1)));
        assert!(record.set_shadow_map_index(ShadowSlot::new(1).unwrap()).is_err());
        assert!(record.shadow_map_index().is_none());
    }

    #[test]
    fn test_validate_catches_struct_literal() {
        let record = LightRecord::Directional(DirectionalLight {
            view_direction: Vec3::new(0.0, -1.0, 0.0),
            color: Vec3::new(1.0, 1.0, 1.0),
            intensity: f32::NAN,
            shadow_map_index: ShadowMapIndex::NONE,
        });
        assert!(record.validate().is_err());
    }

    #[test]
    fn test_to_view_space() {
        let view = Mat4::look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::zeros(), Vec3::y());

        let point = LightRecord::from(
            PointLight::new(Vec3::new(1.0, 0.0, 0.0), Vec3::new(1.0, 1.0, 1.0), 1.0).unwrap(),
        );
        match point.to_view_space(&view) {
            LightRecord::Point(p) => assert_relative_eq!(p.view_position, Vec3::new(1.0, 0.0, -5.0), epsilon = 1e-5),
            other => panic!("unexpected record {:?}", other),
        }

        let sun = LightRecord::from(
            DirectionalLight::new(Vec3::new(0.0, 0.0, -3.0), Vec3::new(1.0, 1.0, 1.0), 1.0).unwrap(),
        );
        match sun.to_view_space(&view) {
            // Translation does not affect directions
            LightRecord::Directional(d) => assert_relative_eq!(d.view_direction, -Vec3::z(), epsilon = 1e-5),
            other => panic!("unexpected record {:?}", other),
        }
    }
}
