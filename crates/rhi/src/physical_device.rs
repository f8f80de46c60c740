//! Physical device (GPU) selection.
//!
//! A device is eligible when it has a graphics queue family, a family that can
//! present to the surface, supports every entry of [`DEVICE_EXTENSIONS`] and
//! reports at least one surface format and one present mode. The first
//! eligible device in enumeration order wins.
//!
//! # Example
//!
//! ```no_run
//! use mini_vk_rhi::instance::Instance;
//! use mini_vk_rhi::physical_device::select_physical_device;
//! # fn surface(_: &Instance) -> mini_vk_rhi::surface::Surface { unimplemented!() }
//!
//! let instance = Instance::new(&[], false).expect("Failed to create instance");
//! let surface = surface(&instance);
//! let device_info = select_physical_device(&instance, &surface).expect("No suitable GPU found");
//! println!("Selected GPU: {:?}", device_info.device_name());
//! ```

use std::collections::BTreeSet;
use std::ffi::CStr;

use ash::vk;
use tracing::{debug, info, warn};

use crate::error::{RhiError, RhiResult};
use crate::instance::Instance;
use crate::surface::Surface;
use crate::swapchain::SwapchainSupportDetails;

/// Device extensions every selected GPU must support.
pub const DEVICE_EXTENSIONS: [&CStr; 1] = [ash::khr::swapchain::NAME];

/// Queue family indices for graphics and presentation.
///
/// The two may refer to the same family.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    /// Index of the queue family that supports graphics operations.
    pub graphics_family: Option<u32>,
    /// Index of the queue family that supports presentation to a surface.
    pub present_family: Option<u32>,
}

impl QueueFamilyIndices {
    /// Finds the first graphics family and the first family that can present.
    ///
    /// `can_present` is queried per family index, in order, until one answers
    /// true. Families with zero queues are skipped.
    pub fn find(
        families: &[vk::QueueFamilyProperties],
        mut can_present: impl FnMut(u32) -> bool,
    ) -> Self {
        let mut indices = Self::default();

        for (i, family) in families.iter().enumerate() {
            let i = i as u32;
            if family.queue_count == 0 {
                continue;
            }

            if indices.graphics_family.is_none()
                && family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
            {
                indices.graphics_family = Some(i);
            }

            if indices.present_family.is_none() && can_present(i) {
                indices.present_family = Some(i);
            }

            if indices.is_complete() {
                break;
            }
        }

        indices
    }

    /// Checks if both graphics and present families were found.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.graphics_family.is_some() && self.present_family.is_some()
    }

    /// Returns true when graphics and presentation use different families.
    #[inline]
    pub fn is_split(&self) -> bool {
        self.graphics_family != self.present_family
    }

    /// Returns the distinct family indices, ascending.
    ///
    /// Logical device creation requests exactly one queue per entry.
    pub fn unique_families(&self) -> Vec<u32> {
        [self.graphics_family, self.present_family]
            .into_iter()
            .flatten()
            .collect::<BTreeSet<u32>>()
            .into_iter()
            .collect()
    }
}

/// Snapshot of a physical device taken at selection time.
#[derive(Clone)]
pub struct PhysicalDeviceInfo {
    /// Vulkan physical device handle.
    pub device: vk::PhysicalDevice,
    /// Device properties (name, limits, API version, etc.).
    pub properties: vk::PhysicalDeviceProperties,
    /// Memory heaps and types, used by the memory type finder.
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// Queue family indices for graphics and presentation.
    pub queue_families: QueueFamilyIndices,
    /// Surface capabilities at selection time.
    pub swapchain_support: SwapchainSupportDetails,
}

impl PhysicalDeviceInfo {
    /// Returns the device name as a string.
    pub fn device_name(&self) -> &str {
        self.properties
            .device_name_as_c_str()
            .ok()
            .and_then(|name| name.to_str().ok())
            .unwrap_or("Unknown Device")
    }

    /// Returns a human-readable string for the device type.
    pub fn device_type_name(&self) -> &'static str {
        match self.properties.device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => "Discrete GPU",
            vk::PhysicalDeviceType::INTEGRATED_GPU => "Integrated GPU",
            vk::PhysicalDeviceType::VIRTUAL_GPU => "Virtual GPU",
            vk::PhysicalDeviceType::CPU => "CPU",
            _ => "Other",
        }
    }

    /// Returns the Vulkan API version supported by the device.
    pub fn api_version(&self) -> (u32, u32, u32) {
        let version = self.properties.api_version;
        (
            vk::api_version_major(version),
            vk::api_version_minor(version),
            vk::api_version_patch(version),
        )
    }
}

impl std::fmt::Debug for PhysicalDeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (major, minor, patch) = self.api_version();
        f.debug_struct("PhysicalDeviceInfo")
            .field("name", &self.device_name())
            .field("type", &self.device_type_name())
            .field("api_version", &format!("{}.{}.{}", major, minor, patch))
            .field("queue_families", &self.queue_families)
            .finish()
    }
}

/// Selects the first physical device that can render to `surface`.
///
/// # Errors
///
/// Returns [`RhiError::NoSuitableGpu`] if no devices exist or none qualify.
pub fn select_physical_device(instance: &Instance, surface: &Surface) -> RhiResult<PhysicalDeviceInfo> {
    let devices = unsafe { instance.handle().enumerate_physical_devices()? };

    if devices.is_empty() {
        warn!("No Vulkan-capable GPUs found");
        return Err(RhiError::NoSuitableGpu);
    }

    info!("Found {} GPU(s)", devices.len());

    for device in devices {
        if let Some(selected) = check_device_suitability(instance.handle(), device, surface)? {
            let (major, minor, patch) = selected.api_version();
            info!(
                "Selected GPU: '{}' ({}) - Vulkan {}.{}.{}",
                selected.device_name(),
                selected.device_type_name(),
                major,
                minor,
                patch
            );
            return Ok(selected);
        }
    }

    warn!("No suitable GPU found with required capabilities");
    Err(RhiError::NoSuitableGpu)
}

/// Returns `Some` if the device meets every requirement.
fn check_device_suitability(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: &Surface,
) -> RhiResult<Option<PhysicalDeviceInfo>> {
    let properties = unsafe { instance.get_physical_device_properties(device) };
    let device_name = properties
        .device_name_as_c_str()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "Unknown".to_owned());

    let families = unsafe { instance.get_physical_device_queue_family_properties(device) };
    let queue_families = QueueFamilyIndices::find(&families, |i| unsafe {
        surface
            .loader()
            .get_physical_device_surface_support(device, i, surface.handle())
            .unwrap_or(false)
    });

    if !queue_families.is_complete() {
        debug!(
            "GPU '{}' skipped: missing required queue families (graphics={}, present={})",
            device_name,
            queue_families.graphics_family.is_some(),
            queue_families.present_family.is_some()
        );
        return Ok(None);
    }

    let extensions = unsafe { instance.enumerate_device_extension_properties(device)? };
    let extension_names: Vec<&CStr> = extensions
        .iter()
        .filter_map(|ext| ext.extension_name_as_c_str().ok())
        .collect();
    if let Some(missing) = DEVICE_EXTENSIONS
        .iter()
        .find(|name| !extension_names.contains(name))
    {
        debug!("GPU '{}' skipped: missing extension {:?}", device_name, missing);
        return Ok(None);
    }

    let swapchain_support =
        SwapchainSupportDetails::query(device, surface.handle(), surface.loader())?;
    if !swapchain_support.is_adequate() {
        debug!(
            "GPU '{}' skipped: surface reports no formats or present modes",
            device_name
        );
        return Ok(None);
    }

    let memory_properties = unsafe { instance.get_physical_device_memory_properties(device) };

    Ok(Some(PhysicalDeviceInfo {
        device,
        properties,
        memory_properties,
        queue_families,
        swapchain_support,
    }))
}
