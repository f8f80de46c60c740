//! The renderer context: initialization, per-frame drawing and teardown.

use std::sync::Arc;

use ash::vk;
use glam::Mat4;
use mini_vk_core::RendererConfig;
use mini_vk_rhi::buffer::{Buffer, BufferUsage};
use mini_vk_rhi::command::CommandPool;
use mini_vk_rhi::descriptor::{
    DescriptorBindingBuilder, DescriptorPool, DescriptorSetLayout, write_uniform_buffer,
};
use mini_vk_rhi::device::{Device, MemoryUsage};
use mini_vk_rhi::framebuffer::Framebuffer;
use mini_vk_rhi::instance::Instance;
use mini_vk_rhi::physical_device::select_physical_device;
use mini_vk_rhi::pipeline::{GraphicsPipelineBuilder, Pipeline, PipelineLayout};
use mini_vk_rhi::render_pass::RenderPass;
use mini_vk_rhi::shader::{Shader, ShaderStage};
use mini_vk_rhi::surface::{Surface, SurfaceProvider};
use mini_vk_rhi::swapchain::Swapchain;
use mini_vk_rhi::vertex::Vertex;
use mini_vk_rhi::{RhiError, RhiResult};
use tracing::{debug, error, info, warn};

use crate::commands::{CommandRecorder, DrawRecord, RecordTargets};
use crate::error::{RendererError, RendererResult};
use crate::frame_sync::FrameSynchronizer;
use crate::mesh::Mesh;
use crate::scene::MeshData;
use crate::ubo::UboViewProjection;

const SHADER_ENTRY_POINT: &str = "main";

/// Live GPU object counts, for checking that drawing allocates nothing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResourceCounts {
    pub buffers: usize,
    pub command_buffers: usize,
    pub semaphores: usize,
    pub fences: usize,
    pub descriptor_sets: usize,
    pub framebuffers: usize,
}

/// Every Vulkan object the renderer owns.
///
/// Fields are listed in creation order; [`GpuResources::destroy`] releases
/// them in reverse.
struct GpuResources {
    instance: Instance,
    surface: Surface,
    device: Arc<Device>,
    swapchain: Swapchain,
    render_pass: RenderPass,
    descriptor_set_layout: DescriptorSetLayout,
    pipeline_layout: PipelineLayout,
    pipeline: Pipeline,
    framebuffers: Vec<Framebuffer>,
    graphics_pool: CommandPool,
    transfer_pool: CommandPool,
    meshes: Vec<Mesh>,
    uniform_buffers: Vec<Buffer>,
    descriptor_pool: DescriptorPool,
    descriptor_sets: Vec<vk::DescriptorSet>,
    recorder: CommandRecorder,
    frame_sync: FrameSynchronizer,
}

impl GpuResources {
    /// Tears everything down in reverse creation order. The device must be
    /// idle.
    fn destroy(self) {
        let Self {
            instance,
            surface,
            device,
            swapchain,
            render_pass,
            descriptor_set_layout,
            pipeline_layout,
            pipeline,
            framebuffers,
            graphics_pool,
            transfer_pool,
            mut meshes,
            uniform_buffers,
            descriptor_pool,
            // Freed together with the pool
            descriptor_sets: _,
            mut recorder,
            frame_sync,
        } = self;

        drop(frame_sync);
        recorder.free(&graphics_pool);
        drop(descriptor_pool);
        drop(uniform_buffers);
        for mesh in &mut meshes {
            mesh.destroy_buffers();
        }
        drop(meshes);
        drop(transfer_pool);
        drop(graphics_pool);
        drop(framebuffers);
        drop(pipeline);
        drop(pipeline_layout);
        drop(descriptor_set_layout);
        drop(render_pass);
        drop(swapchain);

        let extra_refs = Arc::strong_count(&device) - 1;
        if extra_refs > 0 {
            warn!("{} device reference(s) outlive the renderer", extra_refs);
        }
        drop(device);
        drop(surface);
        drop(instance);
    }
}

/// A minimal forward renderer.
///
/// Built once by [`Renderer::init`] for a surface and a fixed list of meshes.
/// Every [`Renderer::draw`] replays the command buffer of the acquired
/// swapchain image after refreshing that image's uniform buffer.
///
/// [`Renderer::clean_up`] must run before the surface provider is destroyed.
/// Dropping the renderer without it cleans up anyway and logs a warning.
pub struct Renderer {
    resources: Option<GpuResources>,
    ubo: UboViewProjection,
    frames_drawn: u64,
}

impl Renderer {
    /// Creates every GPU object needed to draw `meshes` onto `provider`'s
    /// surface and records the command buffers.
    ///
    /// # Errors
    ///
    /// Any failure is fatal: a missing capability, an unreadable shader or a
    /// driver rejecting object creation. Objects created before the failure
    /// are released on return.
    pub fn init(
        provider: &dyn SurfaceProvider,
        config: &RendererConfig,
        meshes: &[MeshData],
    ) -> RendererResult<Self> {
        config.validate()?;

        let (width, height) = provider.framebuffer_size();
        info!("Initializing renderer ({}x{})", width, height);

        let instance = Instance::new(
            &provider.required_instance_extensions()?,
            config.enable_validation,
        )?;
        let surface = Surface::new(&instance, provider)?;

        let physical_device_info = select_physical_device(&instance, &surface)?;
        let device = Device::new(&instance, &physical_device_info)?;

        let swapchain = Swapchain::new(&instance, device.clone(), &surface, (width, height))?;
        let extent = swapchain.extent();
        let image_count = swapchain.image_count();

        let render_pass = RenderPass::new(device.clone(), swapchain.format())?;

        let ubo_binding = DescriptorBindingBuilder::uniform_buffer(0, vk::ShaderStageFlags::VERTEX);
        let descriptor_set_layout = DescriptorSetLayout::new(device.clone(), &[ubo_binding])?;
        let pipeline_layout =
            PipelineLayout::new(device.clone(), &[descriptor_set_layout.handle()], &[])?;

        let pipeline = Self::create_pipeline(&device, config, &render_pass, &pipeline_layout, extent)?;

        let framebuffers =
            Framebuffer::for_views(device.clone(), &render_pass, swapchain.image_views(), extent)?;

        let graphics_family = graphics_family(&device)?;
        let graphics_pool = CommandPool::new(device.clone(), graphics_family)?;
        let transfer_pool = CommandPool::new_transient(device.clone(), graphics_family)?;

        let meshes = meshes
            .iter()
            .map(|data| {
                Mesh::new(
                    device.clone(),
                    device.transfer_queue(),
                    &transfer_pool,
                    &data.vertices,
                    &data.indices,
                )
            })
            .collect::<RhiResult<Vec<_>>>()?;

        let ubo = UboViewProjection::new(extent.width as f32 / extent.height.max(1) as f32);

        let uniform_buffers = (0..image_count)
            .map(|_| {
                Buffer::new_with_data(device.clone(), BufferUsage::Uniform, ubo.as_bytes())
            })
            .collect::<RhiResult<Vec<_>>>()?;

        let descriptor_pool = DescriptorPool::for_uniform_buffers(device.clone(), image_count as u32)?;
        let layouts = vec![descriptor_set_layout.handle(); image_count];
        let descriptor_sets = descriptor_pool.allocate(&layouts)?;
        for (&set, buffer) in descriptor_sets.iter().zip(&uniform_buffers) {
            write_uniform_buffer(&device, set, 0, buffer.handle(), UboViewProjection::SIZE as u64);
        }

        let mut recorder = CommandRecorder::new(device.clone(), &graphics_pool, image_count)?;
        recorder.record(
            &RecordTargets {
                render_pass: &render_pass,
                framebuffers: &framebuffers,
                pipeline: &pipeline,
                layout: &pipeline_layout,
                descriptor_sets: &descriptor_sets,
                extent,
                clear_color: config.clear_color,
            },
            &meshes,
        )?;

        let frame_sync = FrameSynchronizer::new(device.clone())?;

        info!(
            "Renderer initialized: {} swapchain images, {} frames in flight, {} meshes",
            image_count,
            frame_sync.frames_in_flight(),
            meshes.len()
        );

        Ok(Self {
            resources: Some(GpuResources {
                instance,
                surface,
                device,
                swapchain,
                render_pass,
                descriptor_set_layout,
                pipeline_layout,
                pipeline,
                framebuffers,
                graphics_pool,
                transfer_pool,
                meshes,
                uniform_buffers,
                descriptor_pool,
                descriptor_sets,
                recorder,
                frame_sync,
            }),
            ubo,
            frames_drawn: 0,
        })
    }

    /// Loads both shader stages, builds the pipeline and drops the modules.
    fn create_pipeline(
        device: &Arc<Device>,
        config: &RendererConfig,
        render_pass: &RenderPass,
        layout: &PipelineLayout,
        extent: vk::Extent2D,
    ) -> RhiResult<Pipeline> {
        let vertex_shader = Shader::from_spirv_file(
            device.clone(),
            &config.vertex_shader,
            ShaderStage::Vertex,
            SHADER_ENTRY_POINT,
        )?;
        let fragment_shader = Shader::from_spirv_file(
            device.clone(),
            &config.fragment_shader,
            ShaderStage::Fragment,
            SHADER_ENTRY_POINT,
        )?;

        let pipeline = GraphicsPipelineBuilder::new()
            .vertex_shader(&vertex_shader)
            .fragment_shader(&fragment_shader)
            .vertex_binding(Vertex::binding_description())
            .vertex_attributes(&Vertex::attribute_descriptions())
            .render_pass(render_pass.handle(), 0)
            .extent(extent)
            .build(device.clone(), layout)?;

        debug!("Graphics pipeline built, releasing shader modules");
        Ok(pipeline)
    }

    /// Sets the model matrix used from the next [`Renderer::draw`] on.
    pub fn update_model(&mut self, model: Mat4) {
        self.ubo.model = model;
    }

    /// Renders and presents one frame.
    ///
    /// # Errors
    ///
    /// Returns [`RendererError::AlreadyCleanedUp`] after [`Renderer::clean_up`].
    /// Any driver error from the fence wait, acquisition, submission or
    /// presentation is fatal and ends the frame loop.
    pub fn draw(&mut self) -> RendererResult<()> {
        let resources = self
            .resources
            .as_mut()
            .ok_or(RendererError::AlreadyCleanedUp)?;

        let image_index = resources.frame_sync.begin_frame(&resources.swapchain)?;

        let uniform_buffer = resources
            .uniform_buffers
            .get(image_index as usize)
            .ok_or_else(|| {
                RhiError::InvalidArgument(format!("No uniform buffer for image {}", image_index))
            })?;
        uniform_buffer.upload_direct(self.ubo.as_bytes())?;

        let command_buffer = resources.recorder.command_buffer(image_index)?;
        resources.frame_sync.submit(command_buffer)?;
        resources
            .frame_sync
            .present(&resources.swapchain, image_index)?;

        self.frames_drawn += 1;
        Ok(())
    }

    /// Waits for the device to go idle and destroys every GPU object in
    /// reverse creation order. A second call does nothing.
    pub fn clean_up(&mut self) {
        let Some(resources) = self.resources.take() else {
            return;
        };

        if let Err(e) = resources.frame_sync.wait_for_all_frames() {
            error!("Failed to wait for in-flight frames: {}", e);
        }
        if let Err(e) = resources.device.wait_idle() {
            error!("Failed to wait for device idle during clean up: {}", e);
        }

        resources.destroy();
        info!("Renderer cleaned up after {} frames", self.frames_drawn);
    }

    /// True until [`Renderer::clean_up`] has run.
    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.resources.is_some()
    }

    /// Frame slot the next [`Renderer::draw`] will use.
    pub fn current_frame(&self) -> usize {
        self.resources
            .as_ref()
            .map_or(0, |r| r.frame_sync.current_frame())
    }

    #[inline]
    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }

    /// Draws recorded per swapchain image command buffer, indexed by image.
    /// Empty after clean up.
    pub fn draw_records(&self) -> &[Vec<DrawRecord>] {
        self.resources.as_ref().map_or(&[][..], |r| r.recorder.draws())
    }

    /// The uploaded meshes, in draw order. Empty after clean up.
    pub fn meshes(&self) -> &[Mesh] {
        self.resources.as_ref().map_or(&[][..], |r| r.meshes.as_slice())
    }

    /// Current uniform contents.
    #[inline]
    pub fn ubo(&self) -> &UboViewProjection {
        &self.ubo
    }

    pub fn extent(&self) -> Option<vk::Extent2D> {
        self.resources.as_ref().map(|r| r.swapchain.extent())
    }

    /// Live GPU memory allocations.
    ///
    /// # Errors
    ///
    /// Returns [`RendererError::AlreadyCleanedUp`] after clean up, or an error
    /// if the allocator lock is poisoned.
    pub fn memory_usage(&self) -> RendererResult<MemoryUsage> {
        let resources = self
            .resources
            .as_ref()
            .ok_or(RendererError::AlreadyCleanedUp)?;
        Ok(resources.device.memory_usage()?)
    }

    /// Counts of the objects owned by the renderer. All zero after clean up.
    pub fn resource_counts(&self) -> ResourceCounts {
        let Some(r) = self.resources.as_ref() else {
            return ResourceCounts::default();
        };

        ResourceCounts {
            buffers: r.uniform_buffers.len()
                + r.meshes.iter().map(Mesh::buffer_count).sum::<usize>(),
            command_buffers: r.recorder.len(),
            semaphores: r.frame_sync.semaphore_count(),
            fences: r.frame_sync.fence_count(),
            descriptor_sets: r.descriptor_sets.len(),
            framebuffers: r.framebuffers.len(),
        }
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if self.resources.is_some() {
            warn!("Renderer dropped without clean_up; cleaning up now");
            self.clean_up();
        }
    }
}

fn graphics_family(device: &Device) -> RhiResult<u32> {
    device
        .queue_families()
        .graphics_family
        .ok_or(RhiError::NoSuitableGpu)
}
