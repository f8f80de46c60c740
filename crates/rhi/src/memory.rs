//! Memory type selection.
//!
//! Buffers come in two residencies. Host-visible memory can be mapped and
//! written by the CPU directly; device-local memory is only reachable through
//! a transfer. Allocation itself goes through gpu-allocator, but the memory
//! type scan here runs first so a device that cannot satisfy a request fails
//! with [`crate::RhiError::NoSuitableMemoryType`] instead of a generic
//! allocation error.

use ash::vk;
use gpu_allocator::MemoryLocation;

/// Where a buffer's backing memory lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemoryResidency {
    /// CPU-mappable and coherent. Staging, readback and uniform buffers.
    HostVisible,
    /// GPU-only. Filled through a staged copy.
    DeviceLocal,
}

impl MemoryResidency {
    /// Property flags every candidate memory type must contain.
    pub fn required_flags(self) -> vk::MemoryPropertyFlags {
        match self {
            MemoryResidency::HostVisible => {
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT
            }
            MemoryResidency::DeviceLocal => vk::MemoryPropertyFlags::DEVICE_LOCAL,
        }
    }

    /// gpu-allocator location whose preferred and fallback types both
    /// satisfy [`MemoryResidency::required_flags`].
    pub fn location(self) -> MemoryLocation {
        match self {
            MemoryResidency::HostVisible => MemoryLocation::CpuToGpu,
            MemoryResidency::DeviceLocal => MemoryLocation::GpuOnly,
        }
    }
}

/// Returns the index of the first memory type allowed by `type_filter`
/// whose property flags contain all of `required`.
///
/// `type_filter` is the `memory_type_bits` mask from
/// `vkGetBufferMemoryRequirements`: bit `i` set means type `i` is usable.
pub fn find_memory_type_index(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_filter: u32,
    required: vk::MemoryPropertyFlags,
) -> Option<u32> {
    let count = (memory_properties.memory_type_count as usize).min(vk::MAX_MEMORY_TYPES);

    memory_properties.memory_types[..count]
        .iter()
        .enumerate()
        .find(|&(i, memory_type)| {
            type_filter & (1u32 << i) != 0 && memory_type.property_flags.contains(required)
        })
        .map(|(i, _)| i as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEVICE_LOCAL: vk::MemoryPropertyFlags = vk::MemoryPropertyFlags::DEVICE_LOCAL;
    const HOST_VISIBLE: vk::MemoryPropertyFlags = vk::MemoryPropertyFlags::HOST_VISIBLE;
    const HOST_COHERENT: vk::MemoryPropertyFlags = vk::MemoryPropertyFlags::HOST_COHERENT;
    const HOST_CACHED: vk::MemoryPropertyFlags = vk::MemoryPropertyFlags::HOST_CACHED;

    fn properties(types: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut props = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: types.len() as u32,
            ..Default::default()
        };
        for (slot, flags) in props.memory_types.iter_mut().zip(types) {
            slot.property_flags = *flags;
        }
        props
    }

    /// Discrete GPU layout: VRAM, system RAM, cached RAM, BAR.
    fn discrete() -> vk::PhysicalDeviceMemoryProperties {
        properties(&[
            DEVICE_LOCAL,
            HOST_VISIBLE | HOST_COHERENT,
            HOST_VISIBLE | HOST_COHERENT | HOST_CACHED,
            DEVICE_LOCAL | HOST_VISIBLE | HOST_COHERENT,
        ])
    }

    #[test]
    fn test_finds_first_superset() {
        let props = discrete();
        let host = MemoryResidency::HostVisible.required_flags();

        assert_eq!(find_memory_type_index(&props, u32::MAX, DEVICE_LOCAL), Some(0));
        assert_eq!(find_memory_type_index(&props, u32::MAX, host), Some(1));
        assert_eq!(
            find_memory_type_index(&props, u32::MAX, host | HOST_CACHED),
            Some(2)
        );
        assert_eq!(
            find_memory_type_index(&props, u32::MAX, host | DEVICE_LOCAL),
            Some(3)
        );
    }

    #[test]
    fn test_result_is_superset_of_request() {
        let props = discrete();
        let requests = [
            vk::MemoryPropertyFlags::empty(),
            DEVICE_LOCAL,
            HOST_VISIBLE,
            HOST_VISIBLE | HOST_COHERENT,
            HOST_VISIBLE | HOST_CACHED,
            DEVICE_LOCAL | HOST_VISIBLE,
        ];

        for required in requests {
            let index = find_memory_type_index(&props, u32::MAX, required)
                .unwrap_or_else(|| panic!("{:?} should be satisfiable", required));
            assert!(props.memory_types[index as usize]
                .property_flags
                .contains(required));
        }
    }

    #[test]
    fn test_respects_type_filter() {
        let props = discrete();

        // Type 0 masked out, only the BAR heap is device local and allowed
        assert_eq!(find_memory_type_index(&props, 0b1110, DEVICE_LOCAL), Some(3));
        // Only type 2 allowed
        assert_eq!(
            find_memory_type_index(&props, 0b0100, HOST_VISIBLE | HOST_COHERENT),
            Some(2)
        );
        assert_eq!(find_memory_type_index(&props, 0, DEVICE_LOCAL), None);
    }

    #[test]
    fn test_unsatisfiable_request() {
        let props = properties(&[DEVICE_LOCAL, HOST_VISIBLE]);

        // Host-visible but not coherent is not enough
        assert_eq!(
            find_memory_type_index(
                &props,
                u32::MAX,
                MemoryResidency::HostVisible.required_flags()
            ),
            None
        );
        assert_eq!(
            find_memory_type_index(&props, u32::MAX, vk::MemoryPropertyFlags::PROTECTED),
            None
        );
    }

    #[test]
    fn test_ignores_types_past_count() {
        let mut props = properties(&[DEVICE_LOCAL]);
        props.memory_types[1].property_flags = HOST_VISIBLE | HOST_COHERENT;

        assert_eq!(
            find_memory_type_index(&props, u32::MAX, HOST_VISIBLE | HOST_COHERENT),
            None
        );
    }

    #[test]
    fn test_residency_locations() {
        assert_eq!(
            MemoryResidency::HostVisible.location(),
            MemoryLocation::CpuToGpu
        );
        assert_eq!(
            MemoryResidency::DeviceLocal.location(),
            MemoryLocation::GpuOnly
        );
    }
}
