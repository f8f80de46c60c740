//! Off-screen surface provider backed by `VK_EXT_headless_surface`.
//!
//! Lets the full renderer run without a window system, e.g. in integration
//! tests and CI. Drivers that lack the extension are detected up front with
//! [`HeadlessSurface::is_supported`].

use std::ffi::c_char;

use ash::vk;
use mini_vk_rhi::surface::SurfaceProvider;
use mini_vk_rhi::{RhiError, RhiResult};

/// Fixed-size surface with no window behind it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeadlessSurface {
    width: u32,
    height: u32,
}

impl HeadlessSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns true if the loader exposes both `VK_KHR_surface` and
    /// `VK_EXT_headless_surface`. False also when no loader is installed.
    pub fn is_supported() -> bool {
        // SAFETY: the entry is dropped before returning, nothing derived from it escapes
        let Ok(entry) = (unsafe { ash::Entry::load() }) else {
            return false;
        };
        let Ok(extensions) = (unsafe { entry.enumerate_instance_extension_properties(None) })
        else {
            return false;
        };

        let has = |name: &std::ffi::CStr| {
            extensions
                .iter()
                .any(|ext| ext.extension_name_as_c_str().is_ok_and(|n| n == name))
        };
        has(ash::khr::surface::NAME) && has(ash::ext::headless_surface::NAME)
    }
}

impl SurfaceProvider for HeadlessSurface {
    fn required_instance_extensions(&self) -> RhiResult<Vec<*const c_char>> {
        Ok(vec![
            ash::khr::surface::NAME.as_ptr(),
            ash::ext::headless_surface::NAME.as_ptr(),
        ])
    }

    fn create_surface(&self, entry: &ash::Entry, instance: &ash::Instance) -> RhiResult<vk::SurfaceKHR> {
        let loader = ash::ext::headless_surface::Instance::new(entry, instance);
        let create_info = vk::HeadlessSurfaceCreateInfoEXT::default();

        let surface = unsafe { loader.create_headless_surface(&create_info, None) }
            .map_err(|e| RhiError::SurfaceError(format!("Headless surface creation failed: {}", e)))?;

        tracing::debug!("Headless surface created ({}x{})", self.width, self.height);
        Ok(surface)
    }

    fn framebuffer_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use std::ffi::CStr;

    use super::*;

    #[test]
    fn test_required_extensions() {
        let surface = HeadlessSurface::new(64, 32);
        let names: Vec<&CStr> = surface
            .required_instance_extensions()
            .unwrap()
            .into_iter()
            .map(|ptr| unsafe { CStr::from_ptr(ptr) })
            .collect();
        assert_eq!(
            names,
            vec![ash::khr::surface::NAME, ash::ext::headless_surface::NAME]
        );
    }

    #[test]
    fn test_framebuffer_size() {
        assert_eq!(HeadlessSurface::new(640, 480).framebuffer_size(), (640, 480));
    }
}
