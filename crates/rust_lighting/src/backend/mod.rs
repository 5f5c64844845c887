//! Rendering backends
//!
//! Only Vulkan is supported; the backend owns everything that touches `ash`.

pub mod vulkan;
