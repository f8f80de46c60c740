//! Device-local geometry.

use std::sync::Arc;

use ash::vk;
use mini_vk_rhi::buffer::{Buffer, BufferUsage};
use mini_vk_rhi::command::CommandPool;
use mini_vk_rhi::device::Device;
use mini_vk_rhi::vertex::Vertex;
use mini_vk_rhi::{RhiError, RhiResult};
use tracing::debug;

/// A vertex buffer and an optional 32-bit index buffer in device-local memory.
///
/// An index count of zero means the mesh has no index buffer and is drawn
/// non-indexed. Buffers are released by [`Mesh::destroy_buffers`], which the
/// owner calls before the device goes away.
pub struct Mesh {
    vertex_buffer: Option<Buffer>,
    index_buffer: Option<Buffer>,
    vertex_count: u32,
    index_count: u32,
}

impl Mesh {
    /// Uploads `vertices` and `indices` through staging copies on `queue`.
    /// Pass an empty `indices` slice for a non-indexed mesh.
    ///
    /// # Errors
    ///
    /// Returns an error if `vertices` is empty, or buffer creation or a
    /// transfer fails.
    pub fn new(
        device: Arc<Device>,
        queue: vk::Queue,
        pool: &CommandPool,
        vertices: &[Vertex],
        indices: &[u32],
    ) -> RhiResult<Self> {
        if vertices.is_empty() {
            return Err(RhiError::InvalidArgument(
                "Mesh needs at least one vertex".to_string(),
            ));
        }

        let vertex_buffer = Buffer::new_device_local(
            device.clone(),
            BufferUsage::Vertex,
            bytemuck::cast_slice(vertices),
            queue,
            pool,
        )?;

        let index_buffer = if indices.is_empty() {
            None
        } else {
            Some(Buffer::new_device_local(
                device,
                BufferUsage::Index,
                bytemuck::cast_slice(indices),
                queue,
                pool,
            )?)
        };

        debug!(
            "Mesh uploaded: {} vertices, {} indices",
            vertices.len(),
            indices.len()
        );

        Ok(Self {
            vertex_buffer: Some(vertex_buffer),
            index_buffer,
            vertex_count: vertices.len() as u32,
            index_count: indices.len() as u32,
        })
    }

    /// Vertex buffer handle, null once destroyed.
    pub fn vertex_buffer(&self) -> vk::Buffer {
        self.vertex_buffer
            .as_ref()
            .map_or(vk::Buffer::null(), Buffer::handle)
    }

    /// Index buffer handle, `None` for a non-indexed or destroyed mesh.
    pub fn index_buffer(&self) -> Option<vk::Buffer> {
        self.index_buffer.as_ref().map(Buffer::handle)
    }

    #[inline]
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    #[inline]
    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    /// Number of live GPU buffers held by this mesh.
    pub fn buffer_count(&self) -> usize {
        usize::from(self.vertex_buffer.is_some()) + usize::from(self.index_buffer.is_some())
    }

    /// Releases both buffers and their memory. Calling it again is a no-op.
    ///
    /// The GPU must no longer be reading the buffers.
    pub fn destroy_buffers(&mut self) {
        if self.index_buffer.take().is_some() {
            debug!("Mesh index buffer released");
        }
        if self.vertex_buffer.take().is_some() {
            debug!("Mesh vertex buffer released");
        }
    }
}
