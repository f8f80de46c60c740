//! Vulkan abstraction layer (Render Hardware Interface).
//!
//! Safe RAII wrappers over the Vulkan objects the renderer needs, built on
//! `ash` and `gpu-allocator`:
//! - Instance, validation messenger and presentation surface
//! - Physical device selection and logical device creation
//! - Swapchain negotiation
//! - Buffers, memory-type lookup and staged uploads
//! - Render pass, framebuffers, descriptors and the graphics pipeline
//! - Command pools/buffers and synchronization primitives

mod error;

pub mod buffer;
pub mod command;
pub mod descriptor;
pub mod device;
pub mod framebuffer;
pub mod instance;
pub mod memory;
pub mod physical_device;
pub mod pipeline;
pub mod render_pass;
pub mod shader;
pub mod surface;
pub mod swapchain;
pub mod sync;
pub mod vertex;

pub use error::{RhiError, RhiResult};

// Re-export ash types that users might need
pub use ash::vk;
