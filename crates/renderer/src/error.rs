//! Renderer error types.

use mini_vk_rhi::RhiError;
use thiserror::Error;

/// Error returned by the public renderer API.
#[derive(Error, Debug)]
pub enum RendererError {
    /// A Vulkan wrapper failed
    #[error(transparent)]
    Rhi(#[from] RhiError),

    /// Configuration, window or I/O failure
    #[error(transparent)]
    Core(#[from] mini_vk_core::Error),

    /// `draw` after `clean_up`
    #[error("Renderer has already been cleaned up")]
    AlreadyCleanedUp,
}

/// Result type alias for renderer operations.
pub type RendererResult<T> = std::result::Result<T, RendererError>;
