//! Frame pacing and mesh lifetime against a real device on a headless
//! surface. Skips when no loader, device or `VK_EXT_headless_surface` is
//! available.

use std::sync::Arc;

use mini_vk_platform::HeadlessSurface;
use mini_vk_renderer::{FrameSynchronizer, MAX_FRAMES_IN_FLIGHT, Mesh, scene};
use mini_vk_rhi::command::CommandPool;
use mini_vk_rhi::device::Device;
use mini_vk_rhi::instance::Instance;
use mini_vk_rhi::physical_device::select_physical_device;
use mini_vk_rhi::surface::{Surface, SurfaceProvider};
use mini_vk_rhi::swapchain::Swapchain;
use mini_vk_rhi::RhiError;

struct Gpu {
    // Drop order: pool, swapchain, device, surface, instance
    pool: CommandPool,
    swapchain: Swapchain,
    device: Arc<Device>,
    _surface: Surface,
    _instance: Instance,
}

fn gpu() -> Option<Gpu> {
    if !HeadlessSurface::is_supported() {
        eprintln!("skipping: no Vulkan loader with VK_EXT_headless_surface");
        return None;
    }

    let provider = HeadlessSurface::new(64, 64);
    let instance = Instance::new(&provider.required_instance_extensions().ok()?, false).ok()?;
    let surface = Surface::new(&instance, &provider).ok()?;
    let info = match select_physical_device(&instance, &surface) {
        Ok(info) => info,
        Err(RhiError::NoSuitableGpu) => {
            eprintln!("skipping: no device can present to a headless surface");
            return None;
        }
        Err(e) => panic!("device selection failed: {e}"),
    };
    let device = Device::new(&instance, &info).expect("logical device");
    let swapchain = Swapchain::new(&instance, device.clone(), &surface, provider.framebuffer_size())
        .expect("swapchain");
    let family = device.queue_families().graphics_family.expect("graphics family");
    let pool = CommandPool::new_transient(device.clone(), family).expect("transfer pool");

    Some(Gpu {
        pool,
        swapchain,
        device,
        _surface: surface,
        _instance: instance,
    })
}

#[test]
fn interrupted_frame_does_not_block_teardown() {
    let Some(gpu) = gpu() else { return };
    let mut frames = FrameSynchronizer::new(gpu.device.clone()).expect("frame sync");

    // Fence reset and image acquired, then the frame stops before submitting
    frames.begin_frame(&gpu.swapchain).expect("begin frame");
    let slot = frames.current_frame();
    assert!(!frames.slot_fences().is_armed(slot));
    assert_eq!(frames.slot_fences().armed_slots().count(), MAX_FRAMES_IN_FLIGHT - 1);

    frames.wait_for_all_frames().expect("wait returns");
    gpu.device.wait_idle().expect("device idle");
}

#[test]
fn destroy_buffers_twice_releases_everything_once() {
    let Some(gpu) = gpu() else { return };
    let before = gpu.device.memory_usage().expect("memory usage");

    let quad = scene::quad();
    let mut mesh = Mesh::new(
        gpu.device.clone(),
        gpu.device.transfer_queue(),
        &gpu.pool,
        &quad.vertices,
        &quad.indices,
    )
    .expect("mesh upload");
    assert_eq!(mesh.buffer_count(), 2);
    assert_eq!(
        gpu.device.memory_usage().expect("memory usage").allocations,
        before.allocations + 2
    );

    mesh.destroy_buffers();
    assert_eq!(mesh.buffer_count(), 0);
    assert_eq!(mesh.index_buffer(), None);
    assert_eq!(mesh.vertex_buffer(), mini_vk_rhi::vk::Buffer::null());

    mesh.destroy_buffers();
    assert_eq!(mesh.buffer_count(), 0);
    assert_eq!(gpu.device.memory_usage().expect("memory usage"), before);
}

#[test]
fn mesh_without_indices_has_no_index_buffer() {
    let Some(gpu) = gpu() else { return };

    let fan = scene::fan();
    let mut mesh = Mesh::new(
        gpu.device.clone(),
        gpu.device.transfer_queue(),
        &gpu.pool,
        &fan.vertices,
        &[],
    )
    .expect("mesh upload");

    assert_eq!(mesh.index_buffer(), None);
    assert_eq!(mesh.index_count(), 0);
    assert_eq!(mesh.vertex_count(), 5);
    assert_eq!(mesh.buffer_count(), 1);

    mesh.destroy_buffers();
}

#[test]
fn mesh_rejects_empty_vertices() {
    let Some(gpu) = gpu() else { return };

    let result = Mesh::new(
        gpu.device.clone(),
        gpu.device.transfer_queue(),
        &gpu.pool,
        &[],
        &[0, 1, 2],
    );
    assert!(matches!(result, Err(RhiError::InvalidArgument(_))));
}
