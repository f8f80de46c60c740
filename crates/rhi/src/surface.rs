//! Presentation surface ownership.
//!
//! The renderer never talks to a windowing system directly. Anything that can
//! hand out a `VkSurfaceKHR` implements [`SurfaceProvider`]; the resulting
//! handle is owned by a [`Surface`], which destroys it on drop.

use std::ffi::c_char;

use ash::{Entry, vk};
use tracing::{debug, info};

use crate::error::RhiResult;
use crate::instance::Instance;

/// Source of a presentation surface and its framebuffer size.
pub trait SurfaceProvider {
    /// Instance extensions needed before [`SurfaceProvider::create_surface`] can
    /// succeed. The pointers must reference static, null-terminated names.
    fn required_instance_extensions(&self) -> RhiResult<Vec<*const c_char>>;

    /// Creates a raw surface. Ownership passes to the caller.
    fn create_surface(&self, entry: &Entry, instance: &ash::Instance) -> RhiResult<vk::SurfaceKHR>;

    /// Current framebuffer size in pixels.
    fn framebuffer_size(&self) -> (u32, u32);
}

/// RAII wrapper for a Vulkan surface.
///
/// The instance that created the surface must outlive this value.
pub struct Surface {
    handle: vk::SurfaceKHR,
    surface_loader: ash::khr::surface::Instance,
}

impl Surface {
    /// Asks `provider` for a surface on `instance` and takes ownership of it.
    pub fn new(instance: &Instance, provider: &dyn SurfaceProvider) -> RhiResult<Self> {
        let handle = provider.create_surface(instance.entry(), instance.handle())?;
        let surface_loader = ash::khr::surface::Instance::new(instance.entry(), instance.handle());

        info!("Vulkan surface created");

        Ok(Self {
            handle,
            surface_loader,
        })
    }

    /// Get the raw Vulkan surface handle.
    #[inline]
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }

    /// Get the surface extension loader, used for capability queries.
    #[inline]
    pub fn loader(&self) -> &ash::khr::surface::Instance {
        &self.surface_loader
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        // SAFETY: the handle came from the provider for this loader's instance
        // and is destroyed only here.
        unsafe {
            self.surface_loader.destroy_surface(self.handle, None);
        }
        debug!("Vulkan surface destroyed");
    }
}
