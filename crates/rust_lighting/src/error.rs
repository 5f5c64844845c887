//! Error types for the lighting contract

use thiserror::Error;

use crate::backend::vulkan::VulkanError;
use crate::config::ConfigError;
use crate::lighting::LightKind;

/// Errors surfaced by packing, shadow slot management and uploads
///
/// None of these are retried internally: repeating the same call with the same
/// input cannot succeed, so the caller decides whether to drop lights, batch them
/// across frames, or rebuild the pipeline with larger capacities.
#[derive(Error, Debug)]
pub enum LightingError {
    /// More lights of one type than the pipeline was specialized for
    #[error("Capacity exceeded for {kind:?} lights: requested {requested}, capacity {capacity}")]
    CapacityExceeded {
        /// Light type that overflowed
        kind: LightKind,
        /// Number of lights of that type in the input
        requested: usize,
        /// Capacity of that type's array
        capacity: usize,
    },

    /// Every shadow map slot is in use
    #[error("Shadow map table full for {kind:?} light: requested {requested} slots, capacity {capacity}")]
    ShadowMapTableFull {
        /// Light type that asked for a slot
        kind: LightKind,
        /// Slots in use once this request is counted
        requested: usize,
        /// Total number of slots
        capacity: usize,
    },

    /// A shadow slot was read before its transform was written this frame
    #[error("Stale shadow transform: slot {slot} has no transform for the current frame")]
    StaleShadowTransform {
        /// Offending slot
        slot: u32,
    },

    /// A light parameter outside its valid range
    #[error("Invalid light parameter {parameter} = {value}: {reason}")]
    InvalidLightParameter {
        /// Name of the parameter
        parameter: &'static str,
        /// Rejected value, formatted for display
        value: String,
        /// Why the value was rejected
        reason: &'static str,
    },

    /// A slot index that is not currently allocated in the shadow map table
    #[error("Unknown shadow slot {slot}")]
    UnknownShadowSlot {
        /// Offending slot
        slot: u32,
    },

    /// More shadow transforms than the transform buffer can hold
    #[error("Shadow transform overflow: {requested} transforms, capacity {capacity}")]
    ShadowTransformOverflow {
        /// Number of transforms passed to the upload
        requested: usize,
        /// Number of transforms the buffer holds
        capacity: usize,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Vulkan backend error
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] VulkanError),
}

impl LightingError {
    /// Build a [`LightingError::InvalidLightParameter`] from any debug-printable value
    pub fn invalid_parameter(
        parameter: &'static str,
        value: impl std::fmt::Debug,
        reason: &'static str,
    ) -> Self {
        Self::InvalidLightParameter {
            parameter,
            value: format!("{:?}", value),
            reason,
        }
    }
}

/// Result type for lighting operations
pub type LightingResult<T> = Result<T, LightingError>;
