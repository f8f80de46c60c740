//! Window management using winit.
//!
//! [`Window`] is a fixed-size, non-resizable winit window that hands out a
//! Vulkan surface through [`SurfaceProvider`].

use std::ffi::{CStr, c_char};
use std::sync::Arc;

use ash::vk;
use mini_vk_core::{Error, Result};
use mini_vk_rhi::surface::SurfaceProvider;
use mini_vk_rhi::{RhiError, RhiResult};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::dpi::PhysicalSize;
use winit::event_loop::ActiveEventLoop;
use winit::window::{Window as WinitWindow, WindowAttributes};

/// A window wrapper that provides the raw handles for Vulkan surface creation.
pub struct Window {
    window: Arc<WinitWindow>,
}

impl Window {
    /// Create a new window with the given dimensions and title.
    ///
    /// The swapchain is never recreated, so the window cannot be resized.
    pub fn new(event_loop: &ActiveEventLoop, width: u32, height: u32, title: &str) -> Result<Self> {
        let attrs = WindowAttributes::default()
            .with_title(title)
            .with_inner_size(PhysicalSize::new(width, height))
            .with_resizable(false);

        let window = event_loop
            .create_window(attrs)
            .map_err(|e| Error::Window(e.to_string()))?;

        tracing::info!("Window created: {}x{} '{}'", width, height, title);

        Ok(Self {
            window: Arc::new(window),
        })
    }

    /// Request a redraw of the window.
    pub fn request_redraw(&self) {
        self.window.request_redraw();
    }
}

impl SurfaceProvider for Window {
    fn required_instance_extensions(&self) -> RhiResult<Vec<*const c_char>> {
        let display_handle = self
            .window
            .display_handle()
            .map_err(|e| RhiError::SurfaceError(format!("Failed to get display handle: {}", e)))?;

        let extensions = ash_window::enumerate_required_extensions(display_handle.as_raw())?;

        tracing::debug!(
            "Required Vulkan extensions for surface: {:?}",
            extensions
                .iter()
                // SAFETY: ash_window returns pointers to static, null-terminated names
                .map(|&ext| unsafe { CStr::from_ptr(ext) })
                .collect::<Vec<_>>()
        );

        Ok(extensions.to_vec())
    }

    fn create_surface(&self, entry: &ash::Entry, instance: &ash::Instance) -> RhiResult<vk::SurfaceKHR> {
        let display_handle = self
            .window
            .display_handle()
            .map_err(|e| RhiError::SurfaceError(format!("Failed to get display handle: {}", e)))?;

        let window_handle = self
            .window
            .window_handle()
            .map_err(|e| RhiError::SurfaceError(format!("Failed to get window handle: {}", e)))?;

        // SAFETY: the handles come from a live winit window that outlives the
        // surface; the surface is destroyed by mini_vk_rhi::surface::Surface.
        let surface = unsafe {
            ash_window::create_surface(
                entry,
                instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )?
        };

        Ok(surface)
    }

    fn framebuffer_size(&self) -> (u32, u32) {
        let size = self.window.inner_size();
        (size.width, size.height)
    }
}
