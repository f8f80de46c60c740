//! Full renderer lifecycle on a headless surface.
//!
//! Needs `VK_EXT_headless_surface`, a device that presents to it and the
//! compiled shaders in `shaders/`. Skips otherwise.

use std::path::PathBuf;

use glam::Mat4;
use mini_vk_core::RendererConfig;
use mini_vk_platform::HeadlessSurface;
use mini_vk_renderer::{MAX_FRAMES_IN_FLIGHT, MeshData, Renderer, RendererError, ResourceCounts, scene};
use mini_vk_rhi::{RhiError, vk};

const WIDTH: u32 = 320;
const HEIGHT: u32 = 240;

fn config() -> Option<RendererConfig> {
    let shader_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../shaders");
    let config = RendererConfig {
        width: WIDTH,
        height: HEIGHT,
        enable_validation: false,
        ..RendererConfig::default()
    }
    .with_shader_dir(shader_dir);

    if !config.vertex_shader.exists() || !config.fragment_shader.exists() {
        eprintln!("skipping: compiled shaders not found next to {:?}", config.vertex_shader);
        return None;
    }
    Some(config)
}

/// No usable driver or device, as opposed to a renderer bug.
fn gpu_unavailable(err: &RendererError) -> bool {
    matches!(
        err,
        RendererError::Rhi(
            RhiError::NoSuitableGpu
                | RhiError::VulkanError(
                    vk::Result::ERROR_INCOMPATIBLE_DRIVER | vk::Result::ERROR_INITIALIZATION_FAILED
                )
        )
    )
}

fn renderer(surface: &HeadlessSurface) -> Option<Renderer> {
    renderer_with(surface, &scene::demo_scene())
}

fn renderer_with(surface: &HeadlessSurface, meshes: &[MeshData]) -> Option<Renderer> {
    if !HeadlessSurface::is_supported() {
        eprintln!("skipping: no Vulkan loader with VK_EXT_headless_surface");
        return None;
    }
    let config = config()?;

    match Renderer::init(surface, &config, meshes) {
        Ok(renderer) => Some(renderer),
        Err(e) if gpu_unavailable(&e) => {
            eprintln!("skipping: no device can present to a headless surface");
            None
        }
        Err(e) => panic!("renderer init failed: {e}"),
    }
}

#[test]
fn records_quad_and_fan() {
    let surface = HeadlessSurface::new(WIDTH, HEIGHT);
    let Some(mut renderer) = renderer(&surface) else { return };

    let records = renderer.draw_records();
    assert_eq!(records.len(), renderer.resource_counts().command_buffers);
    for draws in records {
        let index_counts: Vec<u32> = draws.iter().map(|d| d.index_count).collect();
        assert_eq!(index_counts, vec![6, 9]);
        assert!(draws.iter().all(|d| d.is_indexed()));
    }

    renderer.clean_up();
}

#[test]
fn thousand_frames_allocate_nothing() {
    let surface = HeadlessSurface::new(WIDTH, HEIGHT);
    let Some(mut renderer) = renderer(&surface) else { return };

    let before = renderer.resource_counts();
    let memory_before = renderer.memory_usage().expect("memory usage");
    assert_eq!(before.semaphores, 2 * MAX_FRAMES_IN_FLIGHT);
    assert_eq!(before.fences, MAX_FRAMES_IN_FLIGHT);
    assert_eq!(before.command_buffers, before.framebuffers);
    assert_eq!(before.descriptor_sets, before.framebuffers);
    // 2 uniform buffers at least, plus vertex + index buffer per mesh
    assert!(before.buffers >= before.framebuffers + 4);

    for i in 0..1000 {
        renderer.update_model(Mat4::from_rotation_z((i as f32).to_radians()));
        renderer.draw().expect("draw");
    }

    assert_eq!(renderer.resource_counts(), before);
    assert_eq!(renderer.memory_usage().expect("memory usage"), memory_before);
    assert_eq!(renderer.frames_drawn(), 1000);
    assert!(renderer.draw_records().iter().all(|draws| draws.len() == 2));

    renderer.clean_up();
}

#[test]
fn frame_slot_returns_after_full_cycle() {
    let surface = HeadlessSurface::new(WIDTH, HEIGHT);
    let Some(mut renderer) = renderer(&surface) else { return };

    let start = renderer.current_frame();
    let mut visited = vec![start];
    for _ in 0..MAX_FRAMES_IN_FLIGHT - 1 {
        renderer.draw().expect("draw");
        visited.push(renderer.current_frame());
    }
    visited.sort_unstable();
    assert_eq!(visited, (0..MAX_FRAMES_IN_FLIGHT).collect::<Vec<_>>());

    renderer.draw().expect("draw");
    assert_eq!(renderer.current_frame(), start);

    renderer.clean_up();
}

#[test]
fn clean_up_is_idempotent_and_stops_drawing() {
    let surface = HeadlessSurface::new(WIDTH, HEIGHT);
    let Some(mut renderer) = renderer(&surface) else { return };

    renderer.draw().expect("draw");
    renderer.clean_up();
    renderer.clean_up();

    assert!(!renderer.is_initialized());
    assert_eq!(renderer.resource_counts(), ResourceCounts::default());
    assert!(renderer.draw_records().is_empty());
    assert!(renderer.meshes().is_empty());
    assert!(matches!(renderer.draw(), Err(RendererError::AlreadyCleanedUp)));
    assert!(matches!(renderer.memory_usage(), Err(RendererError::AlreadyCleanedUp)));
}

#[test]
fn mesh_without_indices_draws_non_indexed() {
    let surface = HeadlessSurface::new(WIDTH, HEIGHT);
    let triangle = MeshData::new(scene::fan().vertices[..3].to_vec(), Vec::new());
    let Some(mut renderer) = renderer_with(&surface, &[scene::quad(), triangle]) else {
        return;
    };

    let mesh = &renderer.meshes()[1];
    assert_eq!(mesh.index_buffer(), None);
    assert_eq!(mesh.index_count(), 0);
    assert_eq!(mesh.vertex_count(), 3);

    for draws in renderer.draw_records() {
        assert!(draws[0].is_indexed());
        assert!(!draws[1].is_indexed());
        assert_eq!(draws[1].vertex_count, 3);
    }

    for _ in 0..MAX_FRAMES_IN_FLIGHT + 1 {
        renderer.draw().expect("draw");
    }
    renderer.clean_up();
}

#[test]
fn missing_shader_fails_init() {
    let surface = HeadlessSurface::new(WIDTH, HEIGHT);
    if !HeadlessSurface::is_supported() {
        eprintln!("skipping: no Vulkan loader with VK_EXT_headless_surface");
        return;
    }

    let config = RendererConfig {
        enable_validation: false,
        ..RendererConfig::default()
    }
    .with_shader_dir("/nonexistent/shader/dir");

    match Renderer::init(&surface, &config, &scene::demo_scene()) {
        Err(RendererError::Rhi(RhiError::ShaderError(_))) => {}
        Err(e) if gpu_unavailable(&e) => {
            eprintln!("skipping: no device can present to a headless surface");
        }
        Err(e) => panic!("unexpected error: {e}"),
        Ok(_) => panic!("init succeeded without shaders"),
    }
}
