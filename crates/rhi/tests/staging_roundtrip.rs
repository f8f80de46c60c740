//! Staged uploads into device-local memory read back byte-for-byte.
//!
//! Needs a Vulkan loader with `VK_EXT_headless_surface` and a device that can
//! present to it (lavapipe works). Skips otherwise.

use std::ffi::{CStr, c_char};
use std::sync::Arc;

use ash::{Entry, vk};
use mini_vk_rhi::buffer::{Buffer, BufferUsage};
use mini_vk_rhi::command::CommandPool;
use mini_vk_rhi::device::Device;
use mini_vk_rhi::instance::Instance;
use mini_vk_rhi::physical_device::select_physical_device;
use mini_vk_rhi::surface::{Surface, SurfaceProvider};
use mini_vk_rhi::vertex::Vertex;
use mini_vk_rhi::{RhiError, RhiResult};

struct Headless;

impl SurfaceProvider for Headless {
    fn required_instance_extensions(&self) -> RhiResult<Vec<*const c_char>> {
        Ok(vec![
            ash::khr::surface::NAME.as_ptr(),
            ash::ext::headless_surface::NAME.as_ptr(),
        ])
    }

    fn create_surface(&self, entry: &Entry, instance: &ash::Instance) -> RhiResult<vk::SurfaceKHR> {
        let loader = ash::ext::headless_surface::Instance::new(entry, instance);
        let surface =
            unsafe { loader.create_headless_surface(&vk::HeadlessSurfaceCreateInfoEXT::default(), None)? };
        Ok(surface)
    }

    fn framebuffer_size(&self) -> (u32, u32) {
        (64, 64)
    }
}

struct Gpu {
    // Drop order: pool, device, surface, instance
    pool: CommandPool,
    device: Arc<Device>,
    _surface: Surface,
    _instance: Instance,
}

fn headless_supported() -> bool {
    let Ok(entry) = (unsafe { Entry::load() }) else {
        return false;
    };
    let Ok(extensions) = (unsafe { entry.enumerate_instance_extension_properties(None) }) else {
        return false;
    };
    let names: Vec<&CStr> = extensions
        .iter()
        .filter_map(|ext| ext.extension_name_as_c_str().ok())
        .collect();
    names.contains(&ash::khr::surface::NAME) && names.contains(&ash::ext::headless_surface::NAME)
}

fn gpu() -> Option<Gpu> {
    if !headless_supported() {
        eprintln!("skipping: no Vulkan loader with VK_EXT_headless_surface");
        return None;
    }

    let provider = Headless;
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
    let family = device.queue_families().graphics_family.expect("graphics family");
    let pool = CommandPool::new_transient(device.clone(), family).expect("transfer pool");

    Some(Gpu {
        pool,
        device,
        _surface: surface,
        _instance: instance,
    })
}

fn vertices(count: usize) -> Vec<Vertex> {
    (0..count)
        .map(|i| {
            let t = i as f32;
            Vertex::from_arrays([t, -t * 0.5, t * 0.25], [(i % 7) as f32 / 7.0, 0.5, 1.0 - t / count as f32])
        })
        .collect()
}

#[test]
fn staged_vertex_upload_round_trips() {
    let Some(gpu) = gpu() else { return };

    for count in [1, 3, 1_000, 10_000] {
        let data = vertices(count);
        let bytes: &[u8] = bytemuck::cast_slice(&data);

        let buffer = Buffer::new_device_local(
            gpu.device.clone(),
            BufferUsage::Vertex,
            bytes,
            gpu.device.transfer_queue(),
            &gpu.pool,
        )
        .expect("device-local upload");

        assert_eq!(buffer.size(), bytes.len() as u64);
        let read_back = buffer
            .download_via_staging(gpu.device.transfer_queue(), &gpu.pool)
            .expect("readback");
        assert_eq!(read_back, bytes, "{count} vertices differ after round trip");
    }
}

#[test]
fn staged_index_upload_round_trips() {
    let Some(gpu) = gpu() else { return };

    let indices: Vec<u32> = (0..30_000).rev().collect();
    let bytes: &[u8] = bytemuck::cast_slice(&indices);

    let buffer = Buffer::new_device_local(
        gpu.device.clone(),
        BufferUsage::Index,
        bytes,
        gpu.device.transfer_queue(),
        &gpu.pool,
    )
    .expect("device-local upload");

    let read_back = buffer
        .download_via_staging(gpu.device.transfer_queue(), &gpu.pool)
        .expect("readback");
    assert_eq!(bytemuck::pod_collect_to_vec::<u8, u32>(&read_back), indices);
}

#[test]
fn direct_upload_is_visible_through_mapping() {
    let Some(gpu) = gpu() else { return };

    let payload: Vec<u8> = (0..=255).collect();
    let buffer = Buffer::new(gpu.device.clone(), BufferUsage::Uniform, payload.len() as u64)
        .expect("uniform buffer");
    buffer.upload_direct(&payload).expect("direct upload");

    assert_eq!(buffer.read_data(payload.len()).expect("read"), payload);
}

#[test]
fn oversized_staging_upload_is_rejected() {
    let Some(gpu) = gpu() else { return };

    let buffer = Buffer::new(gpu.device.clone(), BufferUsage::Vertex, 16).expect("vertex buffer");
    let err = buffer
        .upload_via_staging(&[0u8; 32], gpu.device.transfer_queue(), &gpu.pool)
        .unwrap_err();
    assert!(matches!(err, RhiError::InvalidArgument(_)));
}

#[test]
fn staging_buffer_is_released_after_upload() {
    let Some(gpu) = gpu() else { return };
    let before = gpu.device.memory_usage().expect("memory usage");

    let data = vertices(64);
    let buffer = Buffer::new_device_local(
        gpu.device.clone(),
        BufferUsage::Vertex,
        bytemuck::cast_slice(&data),
        gpu.device.transfer_queue(),
        &gpu.pool,
    )
    .expect("device-local upload");

    // Only the destination buffer stays allocated
    let during = gpu.device.memory_usage().expect("memory usage");
    assert_eq!(during.allocations, before.allocations + 1);

    drop(buffer);
    assert_eq!(gpu.device.memory_usage().expect("memory usage"), before);
}
