//! RHI-specific error types.

use thiserror::Error;

/// RHI-specific error type.
///
/// Every variant is fatal: callers propagate it to the nearest public entry
/// point instead of retrying.
#[derive(Error, Debug)]
pub enum RhiError {
    /// Vulkan API error
    #[error("Vulkan error: {0}")]
    VulkanError(#[from] ash::vk::Result),

    /// Failed to load Vulkan
    #[error("Failed to load Vulkan: {0}")]
    LoadingError(#[from] ash::LoadingError),

    /// GPU allocator error
    #[error("Allocator error: {0}")]
    AllocatorError(#[from] gpu_allocator::AllocationError),

    /// The allocator mutex was poisoned by a panicking thread
    #[error("Allocator lock poisoned")]
    AllocatorPoisoned,

    /// No physical device satisfied the requirements
    #[error("No suitable GPU found")]
    NoSuitableGpu,

    /// A required instance or device extension is not available
    #[error("Missing required extension: {0}")]
    MissingExtension(String),

    /// No memory type matches both the resource and the requested properties
    #[error("No memory type matches filter {type_filter:#b} with properties {properties:?}")]
    NoSuitableMemoryType {
        type_filter: u32,
        properties: ash::vk::MemoryPropertyFlags,
    },

    /// Shader loading error
    #[error("Shader error: {0}")]
    ShaderError(String),

    /// Pipeline creation error
    #[error("Pipeline error: {0}")]
    PipelineError(String),

    /// Surface creation error
    #[error("Surface error: {0}")]
    SurfaceError(String),

    /// Swapchain error
    #[error("Swapchain error: {0}")]
    SwapchainError(String),

    /// Caller passed something the wrapper cannot accept
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for RHI operations.
pub type RhiResult<T> = std::result::Result<T, RhiError>;
