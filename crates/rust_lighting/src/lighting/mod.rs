//! Lighting data model
//!
//! Light records, the packed light collection, the shadow map table shared
//! with the shadow pass, and a CPU evaluator of the shading loop.

pub mod collection;
pub mod evaluator;
pub mod light;
pub mod shadow;
pub mod shadow_camera;
pub mod upload;

pub use collection::{
    GpuAmbientLight, GpuDirectionalLight, GpuPointLight, GpuSpotLight, LightBufferLayout,
    LightCollection, LightPacker,
};
pub use evaluator::{
    DepthMap, DepthMapSampler, LightingEvaluator, ShadingPoint, ShadowSampler, Unshadowed,
};
pub use light::{
    AmbientLight, Attenuation, DirectionalLight, LightCapabilities, LightKind, LightRecord,
    PointLight, ShadowMapIndex, SpotLight,
};
pub use shadow::{
    GpuShadowTransform, ResolvedShadows, ShadowMapTable, ShadowMapTexture, ShadowSlot,
    ShadowTransform,
};
pub use shadow_camera::{directional_light_transform, spot_light_transform, Frustum};
pub use upload::{
    encode_shadow_transforms, HostUploadBackend, LightUploadBackend, UploadHandle, UploadTarget,
};
