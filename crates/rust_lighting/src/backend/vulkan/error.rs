//! Vulkan error types

use ash::vk;
use thiserror::Error;

/// Vulkan-specific error types
#[derive(Error, Debug)]
pub enum VulkanError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// No suitable memory type found for allocation
    #[error("No suitable memory type found")]
    NoSuitableMemoryType,

    /// Write past the end of a buffer
    #[error("Buffer too small: {required} bytes required, {available} available")]
    BufferTooSmall {
        /// End offset of the attempted write
        required: vk::DeviceSize,
        /// Size of the buffer
        available: vk::DeviceSize,
    },
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;
