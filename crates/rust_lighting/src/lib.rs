//! # Rust Lighting
//!
//! The lighting data contract between a CPU-side light manager and a Vulkan
//! shading stage with shadow mapping.
//!
//! ## Features
//!
//! - **Light Records**: Ambient, point, directional and spot lights in view space
//! - **Light Collection**: Fixed-capacity, std140-packed light buffer sized by
//!   specialization constants
//! - **Shadow Map Table**: Slot arena shared by the shadow pass and the lighting pass
//! - **Lighting Evaluator**: CPU reference of the per-fragment accumulation
//! - **Upload Backends**: Host-memory and Vulkan uniform buffer uploads
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rust_lighting::prelude::*;
//!
//! fn main() -> Result<(), LightingError> {
//!     let config = LightingConfig::default();
//!     let packer = LightPacker::new(config.clone())?;
//!     let mut shadows = ShadowMapTable::new(config.max_shadow_maps);
//!
//!     let mut sun = DirectionalLight::new(Vec3::new(0.0, -1.0, 0.0), Vec3::new(1.0, 1.0, 1.0), 1.0)?;
//!     let slot = shadows.allocate(&LightRecord::Directional(sun))?;
//!     sun.shadow_map_index = slot.into();
//!
//!     shadows.begin_frame();
//!     shadows.set_transform(slot, Mat4::identity(), Mat4::identity())?;
//!
//!     let lights = vec![LightRecord::Directional(sun)];
//!     let collection = packer.pack(&lights, AmbientLight::new(Vec3::new(0.1, 0.1, 0.1)), Mat4::identity())?;
//!
//!     let mut backend = HostUploadBackend::new(&config, 2)?;
//!     let _lights_handle = backend.upload_light_collection(&collection)?;
//!     let _shadow_handle = backend.upload_shadow_transforms(&shadows.transform_block())?;
//!
//!     let resolved = shadows.resolve()?;
//!     let evaluator = LightingEvaluator::default();
//!     let radiance = evaluator.evaluate(
//!         &ShadingPoint::new(Vec3::new(0.0, 0.0, -5.0), Vec3::new(0.0, 0.0, 1.0)),
//!         &collection,
//!         &resolved,
//!         &Unshadowed,
//!     );
//!     println!("radiance: {radiance:?}");
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod backend;
pub mod config;
pub mod foundation;
pub mod lighting;

mod error;

pub use error::{LightingError, LightingResult};

/// Common imports for lighting users
pub mod prelude {
    pub use crate::{
        LightingError, LightingResult,
        config::{Config, ConfigError, LightingConfig},
        foundation::math::{Mat4, Mat4Ext, Point3, Vec3},
        lighting::{
            AmbientLight, DirectionalLight, LightCapabilities, LightCollection, LightKind,
            LightPacker, LightRecord, PointLight, ShadowMapIndex, ShadowSlot, SpotLight,
            ShadowMapTable, ShadowTransform, ShadowMapTexture, ResolvedShadows,
            LightingEvaluator, ShadingPoint, ShadowSampler, Unshadowed, DepthMapSampler,
            LightUploadBackend, HostUploadBackend, UploadHandle,
        },
    };
}
