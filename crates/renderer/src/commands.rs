//! Pre-recorded draw command buffers.
//!
//! One primary command buffer per swapchain image, recorded once after the
//! pipeline exists and replayed every frame. Nothing here is re-recorded in
//! the steady-state loop.

use std::sync::Arc;

use ash::vk;
use mini_vk_rhi::command::{CommandBuffer, CommandPool};
use mini_vk_rhi::device::Device;
use mini_vk_rhi::framebuffer::Framebuffer;
use mini_vk_rhi::pipeline::{Pipeline, PipelineLayout};
use mini_vk_rhi::render_pass::RenderPass;
use mini_vk_rhi::{RhiError, RhiResult};
use tracing::{debug, info};

use crate::mesh::Mesh;

/// One draw captured while recording.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawRecord {
    pub mesh_index: usize,
    pub index_count: u32,
    pub vertex_count: u32,
}

impl DrawRecord {
    /// True if the draw went through the index buffer.
    #[inline]
    pub fn is_indexed(&self) -> bool {
        self.index_count > 0
    }
}

/// What a recording pass binds for every image.
pub struct RecordTargets<'a> {
    pub render_pass: &'a RenderPass,
    pub framebuffers: &'a [Framebuffer],
    pub pipeline: &'a Pipeline,
    pub layout: &'a PipelineLayout,
    pub descriptor_sets: &'a [vk::DescriptorSet],
    pub extent: vk::Extent2D,
    pub clear_color: [f32; 4],
}

/// Command buffers allocated from a pool, indexed by swapchain image.
pub struct CommandRecorder {
    device: Arc<Device>,
    command_buffers: Vec<vk::CommandBuffer>,
    // One list per command buffer
    draws: Vec<Vec<DrawRecord>>,
}

impl CommandRecorder {
    /// Allocates `image_count` primary command buffers from `pool`.
    ///
    /// The buffers are recorded once, so `pool` needs no reset flag.
    ///
    /// # Errors
    ///
    /// Returns an error if allocation fails.
    pub fn new(device: Arc<Device>, pool: &CommandPool, image_count: usize) -> RhiResult<Self> {
        let command_buffers = pool.allocate_command_buffers(image_count as u32)?;

        debug!("Allocated {} draw command buffers", command_buffers.len());

        Ok(Self {
            device,
            command_buffers,
            draws: Vec::new(),
        })
    }

    /// Records every image's command buffer with all `meshes`.
    ///
    /// Image `i` renders into `framebuffers[i]` and binds
    /// `descriptor_sets[i]`. Returns the draws issued, one list per image.
    ///
    /// # Errors
    ///
    /// Returns an error if the framebuffer or descriptor set count does not
    /// match the command buffer count, or recording fails.
    pub fn record(
        &mut self,
        targets: &RecordTargets<'_>,
        meshes: &[Mesh],
    ) -> RhiResult<&[Vec<DrawRecord>]> {
        let image_count = self.command_buffers.len();
        if targets.framebuffers.len() != image_count || targets.descriptor_sets.len() != image_count {
            return Err(RhiError::InvalidArgument(format!(
                "{} command buffers but {} framebuffers and {} descriptor sets",
                image_count,
                targets.framebuffers.len(),
                targets.descriptor_sets.len()
            )));
        }

        let mut draws = Vec::with_capacity(image_count);
        for (image_index, &handle) in self.command_buffers.iter().enumerate() {
            let cmd = CommandBuffer::from_handle(self.device.clone(), handle);
            draws.push(record_image(&cmd, targets, image_index, meshes)?);
        }
        self.draws = draws;

        info!(
            "Recorded {} command buffers with {} draws each",
            image_count,
            meshes.len()
        );

        Ok(&self.draws)
    }

    /// Command buffer for swapchain image `image_index`.
    pub fn command_buffer(&self, image_index: u32) -> RhiResult<vk::CommandBuffer> {
        self.command_buffers
            .get(image_index as usize)
            .copied()
            .ok_or_else(|| {
                RhiError::InvalidArgument(format!(
                    "No command buffer for image {} ({} recorded)",
                    image_index,
                    self.command_buffers.len()
                ))
            })
    }

    /// Draws recorded per command buffer, indexed by swapchain image, each
    /// list in mesh order.
    #[inline]
    pub fn draws(&self) -> &[Vec<DrawRecord>] {
        &self.draws
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.command_buffers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.command_buffers.is_empty()
    }

    /// Returns the buffers to `pool`. They must not be pending execution.
    pub fn free(&mut self, pool: &CommandPool) {
        pool.free_command_buffers(&self.command_buffers);
        self.command_buffers.clear();
        self.draws.clear();
    }
}

fn record_image(
    cmd: &CommandBuffer,
    targets: &RecordTargets<'_>,
    image_index: usize,
    meshes: &[Mesh],
) -> RhiResult<Vec<DrawRecord>> {
    let bind_point = targets.pipeline.bind_point();
    let descriptor_sets = [targets.descriptor_sets[image_index]];
    let mut draws = Vec::with_capacity(meshes.len());

    cmd.begin_reusable()?;
    cmd.begin_render_pass(
        targets.render_pass.handle(),
        targets.framebuffers[image_index].handle(),
        targets.extent,
        targets.clear_color,
    );
    cmd.bind_pipeline(bind_point, targets.pipeline.handle());

    for (mesh_index, mesh) in meshes.iter().enumerate() {
        cmd.bind_vertex_buffers(0, &[mesh.vertex_buffer()], &[0]);
        cmd.bind_descriptor_sets(
            bind_point,
            targets.layout.handle(),
            0,
            &descriptor_sets,
            &[],
        );

        match mesh.index_buffer() {
            Some(index_buffer) => {
                cmd.bind_index_buffer(index_buffer, 0, vk::IndexType::UINT32);
                cmd.draw_indexed(mesh.index_count(), 1, 0, 0, 0);
            }
            None => cmd.draw(mesh.vertex_count(), 1, 0, 0),
        }

        draws.push(DrawRecord {
            mesh_index,
            index_count: mesh.index_count(),
            vertex_count: mesh.vertex_count(),
        });
    }

    cmd.end_render_pass();
    cmd.end()?;

    Ok(draws)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draw_record_indexed() {
        let indexed = DrawRecord {
            mesh_index: 0,
            index_count: 6,
            vertex_count: 4,
        };
        let plain = DrawRecord {
            mesh_index: 1,
            index_count: 0,
            vertex_count: 3,
        };
        assert!(indexed.is_indexed());
        assert!(!plain.is_indexed());
    }
}
