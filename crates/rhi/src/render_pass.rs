//! Render pass with a single presentable color attachment.
//!
//! The attachment is cleared on load, stored, and moves from `UNDEFINED` to
//! `PRESENT_SRC_KHR`. Two external dependencies bracket that implicit layout
//! transition:
//!
//! ```text
//! EXTERNAL -> 0 : BOTTOM_OF_PIPE / MEMORY_READ
//!              -> COLOR_ATTACHMENT_OUTPUT / COLOR_ATTACHMENT_READ | WRITE
//! 0 -> EXTERNAL : COLOR_ATTACHMENT_OUTPUT / COLOR_ATTACHMENT_READ | WRITE
//!              -> BOTTOM_OF_PIPE / MEMORY_READ
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::RhiResult;

/// Description of the single color attachment for `format`.
pub fn color_attachment_description(format: vk::Format) -> vk::AttachmentDescription {
    vk::AttachmentDescription::default()
        .format(format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)
}

/// The two dependencies around subpass 0.
pub fn subpass_dependencies() -> [vk::SubpassDependency; 2] {
    let color_rw =
        vk::AccessFlags::COLOR_ATTACHMENT_READ | vk::AccessFlags::COLOR_ATTACHMENT_WRITE;

    [
        vk::SubpassDependency::default()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(vk::PipelineStageFlags::BOTTOM_OF_PIPE)
            .src_access_mask(vk::AccessFlags::MEMORY_READ)
            .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .dst_access_mask(color_rw),
        vk::SubpassDependency::default()
            .src_subpass(0)
            .dst_subpass(vk::SUBPASS_EXTERNAL)
            .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .src_access_mask(color_rw)
            .dst_stage_mask(vk::PipelineStageFlags::BOTTOM_OF_PIPE)
            .dst_access_mask(vk::AccessFlags::MEMORY_READ),
    ]
}

/// Vulkan render pass wrapper.
pub struct RenderPass {
    device: Arc<Device>,
    render_pass: vk::RenderPass,
    color_format: vk::Format,
}

impl RenderPass {
    /// Creates the render pass for swapchain images of `color_format`.
    ///
    /// # Errors
    ///
    /// Returns an error if render pass creation fails.
    pub fn new(device: Arc<Device>, color_format: vk::Format) -> RhiResult<Self> {
        let attachments = [color_attachment_description(color_format)];

        let color_refs = [vk::AttachmentReference::default()
            .attachment(0)
            .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)];

        let subpasses = [vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs)];

        let dependencies = subpass_dependencies();

        let create_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        let render_pass = unsafe { device.handle().create_render_pass(&create_info, None)? };

        debug!("Created render pass for {:?}", color_format);

        Ok(Self {
            device,
            render_pass,
            color_format,
        })
    }

    /// Returns the Vulkan render pass handle.
    #[inline]
    pub fn handle(&self) -> vk::RenderPass {
        self.render_pass
    }

    #[inline]
    pub fn color_format(&self) -> vk::Format {
        self.color_format
    }
}

impl Drop for RenderPass {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_render_pass(self.render_pass, None);
        }
        debug!("Render pass destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_attachment_layouts() {
        let attachment = color_attachment_description(vk::Format::B8G8R8A8_UNORM);
        assert_eq!(attachment.format, vk::Format::B8G8R8A8_UNORM);
        assert_eq!(attachment.samples, vk::SampleCountFlags::TYPE_1);
        assert_eq!(attachment.load_op, vk::AttachmentLoadOp::CLEAR);
        assert_eq!(attachment.store_op, vk::AttachmentStoreOp::STORE);
        assert_eq!(attachment.initial_layout, vk::ImageLayout::UNDEFINED);
        assert_eq!(attachment.final_layout, vk::ImageLayout::PRESENT_SRC_KHR);
    }

    #[test]
    fn test_entry_dependency() {
        let [entry, _] = subpass_dependencies();
        assert_eq!(entry.src_subpass, vk::SUBPASS_EXTERNAL);
        assert_eq!(entry.dst_subpass, 0);
        assert_eq!(entry.src_stage_mask, vk::PipelineStageFlags::BOTTOM_OF_PIPE);
        assert_eq!(entry.src_access_mask, vk::AccessFlags::MEMORY_READ);
        assert_eq!(
            entry.dst_stage_mask,
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
        );
        assert!(
            entry
                .dst_access_mask
                .contains(vk::AccessFlags::COLOR_ATTACHMENT_READ)
        );
        assert!(
            entry
                .dst_access_mask
                .contains(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
        );
    }

    #[test]
    fn test_exit_dependency() {
        let [_, exit] = subpass_dependencies();
        assert_eq!(exit.src_subpass, 0);
        assert_eq!(exit.dst_subpass, vk::SUBPASS_EXTERNAL);
        assert_eq!(
            exit.src_stage_mask,
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
        );
        assert_eq!(
            exit.src_access_mask,
            vk::AccessFlags::COLOR_ATTACHMENT_READ | vk::AccessFlags::COLOR_ATTACHMENT_WRITE
        );
        assert_eq!(exit.dst_stage_mask, vk::PipelineStageFlags::BOTTOM_OF_PIPE);
        assert_eq!(exit.dst_access_mask, vk::AccessFlags::MEMORY_READ);
    }
}
