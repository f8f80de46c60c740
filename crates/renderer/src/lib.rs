//! Minimal forward renderer.
//!
//! This crate ties the RHI wrappers together:
//! - Device-local meshes and the built-in demo scene
//! - Command buffers pre-recorded once per swapchain image
//! - Frame pacing with two frames in flight
//! - The [`Renderer`] context: `init`, `update_model`, `draw`, `clean_up`

pub mod commands;
mod error;
pub mod frame_sync;
pub mod mesh;
mod renderer;
pub mod scene;
pub mod ubo;

pub use commands::DrawRecord;
pub use error::{RendererError, RendererResult};
pub use frame_sync::{FrameCounter, FrameSynchronizer, SlotFences};
pub use mesh::Mesh;
pub use renderer::{Renderer, ResourceCounts};
pub use scene::MeshData;
pub use ubo::UboViewProjection;

pub use mini_vk_rhi::device::MemoryUsage;
pub use mini_vk_rhi::sync::MAX_FRAMES_IN_FLIGHT;
pub use mini_vk_rhi::vertex::Vertex;
