//! GPU buffer management.
//!
//! [`Buffer`] pairs a VkBuffer with a gpu-allocator allocation. Host-visible
//! buffers (staging, readback, uniform) are persistently mapped and written
//! with [`Buffer::upload_direct`]. Device-local buffers (vertex, index) are
//! filled with [`Buffer::upload_via_staging`], which goes through a transient
//! staging buffer and a one-shot transfer.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use mini_vk_rhi::buffer::{Buffer, BufferUsage};
//! use mini_vk_rhi::command::CommandPool;
//! use mini_vk_rhi::device::Device;
//!
//! # fn example(device: Arc<Device>, pool: &CommandPool) -> Result<(), mini_vk_rhi::RhiError> {
//! let vertices: [f32; 6] = [0.0, 0.5, -0.5, -0.5, 0.5, -0.5];
//! let vertex_buffer = Buffer::new_device_local(
//!     device.clone(),
//!     BufferUsage::Vertex,
//!     bytemuck::cast_slice(&vertices),
//!     device.transfer_queue(),
//!     pool,
//! )?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::{debug, error, trace};

use crate::command::CommandPool;
use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::memory::{MemoryResidency, find_memory_type_index};

/// Buffer usage type.
///
/// Decides the Vulkan usage flags and the memory residency.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferUsage {
    /// Device-local vertex data
    Vertex,
    /// Device-local 32-bit index data
    Index,
    /// Host-visible uniform data, rewritten every frame
    Uniform,
    /// Host-visible transfer source
    Staging,
    /// Host-visible transfer destination for reading results back
    Readback,
}

impl BufferUsage {
    /// Converts to Vulkan buffer usage flags.
    pub fn to_vk_usage(self) -> vk::BufferUsageFlags {
        match self {
            BufferUsage::Vertex => {
                vk::BufferUsageFlags::VERTEX_BUFFER
                    | vk::BufferUsageFlags::TRANSFER_DST
                    | vk::BufferUsageFlags::TRANSFER_SRC
            }
            BufferUsage::Index => {
                vk::BufferUsageFlags::INDEX_BUFFER
                    | vk::BufferUsageFlags::TRANSFER_DST
                    | vk::BufferUsageFlags::TRANSFER_SRC
            }
            BufferUsage::Uniform => vk::BufferUsageFlags::UNIFORM_BUFFER,
            BufferUsage::Staging => vk::BufferUsageFlags::TRANSFER_SRC,
            BufferUsage::Readback => vk::BufferUsageFlags::TRANSFER_DST,
        }
    }

    /// Returns where the backing memory lives.
    pub fn residency(self) -> MemoryResidency {
        match self {
            BufferUsage::Vertex | BufferUsage::Index => MemoryResidency::DeviceLocal,
            BufferUsage::Uniform | BufferUsage::Staging | BufferUsage::Readback => {
                MemoryResidency::HostVisible
            }
        }
    }

    /// Returns the gpu-allocator location for this buffer type.
    pub fn memory_location(self) -> MemoryLocation {
        match self {
            // Prefers cached memory, falls back to plain host-visible coherent
            BufferUsage::Readback => MemoryLocation::GpuToCpu,
            other => other.residency().location(),
        }
    }

    /// Returns a human-readable name for the buffer type.
    pub fn name(self) -> &'static str {
        match self {
            BufferUsage::Vertex => "vertex",
            BufferUsage::Index => "index",
            BufferUsage::Uniform => "uniform",
            BufferUsage::Staging => "staging",
            BufferUsage::Readback => "readback",
        }
    }
}

/// GPU buffer wrapper with managed memory.
///
/// The allocation is returned to the allocator and the buffer destroyed on
/// drop. The owning [`Device`] must still be alive at that point, which the
/// shared `Arc` guarantees.
pub struct Buffer {
    device: Arc<Device>,
    buffer: vk::Buffer,
    allocation: Option<Allocation>,
    size: vk::DeviceSize,
    usage: BufferUsage,
}

impl Buffer {
    /// Creates a buffer of `size` bytes and binds freshly allocated memory.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `size` is zero
    /// - Buffer creation or memory binding is rejected by the driver
    /// - No memory type satisfies the usage's residency
    ///   ([`RhiError::NoSuitableMemoryType`])
    /// - The allocator fails
    pub fn new(device: Arc<Device>, usage: BufferUsage, size: vk::DeviceSize) -> RhiResult<Self> {
        if size == 0 {
            return Err(RhiError::InvalidArgument(
                "Buffer size must be greater than 0".to_string(),
            ));
        }

        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage.to_vk_usage())
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.handle().create_buffer(&buffer_info, None)? };

        match Self::allocate_and_bind(&device, buffer, usage) {
            Ok(allocation) => {
                debug!("Created {} buffer: {} bytes", usage.name(), size);
                Ok(Self {
                    device,
                    buffer,
                    allocation: Some(allocation),
                    size,
                    usage,
                })
            }
            Err(e) => {
                unsafe { device.handle().destroy_buffer(buffer, None) };
                Err(e)
            }
        }
    }

    fn allocate_and_bind(
        device: &Device,
        buffer: vk::Buffer,
        usage: BufferUsage,
    ) -> RhiResult<Allocation> {
        let requirements = unsafe { device.handle().get_buffer_memory_requirements(buffer) };
        let required = usage.residency().required_flags();

        let type_index = find_memory_type_index(
            device.memory_properties(),
            requirements.memory_type_bits,
            required,
        )
        .ok_or(RhiError::NoSuitableMemoryType {
            type_filter: requirements.memory_type_bits,
            properties: required,
        })?;

        let mut allocator = device.allocator()?;
        let allocation = allocator.allocate(&AllocationCreateDesc {
            name: usage.name(),
            requirements,
            location: usage.memory_location(),
            linear: true,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        })?;

        trace!(
            "{} buffer: first matching memory type {}, allocator chose {:?}",
            usage.name(),
            type_index,
            allocation.memory_properties()
        );
        debug_assert!(allocation.memory_properties().contains(required));

        let bound = unsafe {
            device
                .handle()
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
        };
        if let Err(e) = bound {
            if let Err(free_err) = allocator.free(allocation) {
                error!("Failed to free allocation after bind failure: {:?}", free_err);
            }
            return Err(e.into());
        }

        Ok(allocation)
    }

    /// Creates a host-visible buffer holding `data`.
    ///
    /// # Errors
    ///
    /// Returns an error if `usage` is not host-visible or creation fails.
    pub fn new_with_data(device: Arc<Device>, usage: BufferUsage, data: &[u8]) -> RhiResult<Self> {
        let buffer = Self::new(device, usage, data.len() as vk::DeviceSize)?;
        buffer.upload_direct(data)?;
        Ok(buffer)
    }

    /// Creates a device-local buffer holding `data`, filled through a staged
    /// copy on `queue`.
    ///
    /// # Errors
    ///
    /// Returns an error if buffer creation or the transfer fails.
    pub fn new_device_local(
        device: Arc<Device>,
        usage: BufferUsage,
        data: &[u8],
        queue: vk::Queue,
        pool: &CommandPool,
    ) -> RhiResult<Self> {
        let buffer = Self::new(device, usage, data.len() as vk::DeviceSize)?;
        buffer.upload_via_staging(data, queue, pool)?;
        Ok(buffer)
    }

    /// Writes `data` to the start of a host-visible buffer through its
    /// persistent mapping. No staging and no synchronization; the caller
    /// ensures the GPU is not reading the range.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is not mapped or `data` is too large.
    pub fn upload_direct(&self, data: &[u8]) -> RhiResult<()> {
        self.write_data(0, data)
    }

    /// Writes data to a host-visible buffer at the specified offset.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The buffer memory is not mapped
    /// - The write would exceed the buffer size
    pub fn write_data(&self, offset: vk::DeviceSize, data: &[u8]) -> RhiResult<()> {
        if data.is_empty() {
            return Ok(());
        }

        self.check_range(offset, data.len() as vk::DeviceSize)?;
        let mapped_ptr = self.mapped_ptr()?;

        // SAFETY: range checked above, mapping covers the whole allocation
        unsafe {
            let dst = mapped_ptr.add(offset as usize);
            std::ptr::copy_nonoverlapping(data.as_ptr(), dst, data.len());
        }

        Ok(())
    }

    /// Copies `len` bytes from the start of a host-visible buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is not mapped or `len` is too large.
    pub fn read_data(&self, len: usize) -> RhiResult<Vec<u8>> {
        self.check_range(0, len as vk::DeviceSize)?;
        if len == 0 {
            return Ok(Vec::new());
        }
        let mapped_ptr = self.mapped_ptr()?;

        let mut out = vec![0u8; len];
        // SAFETY: range checked above
        unsafe {
            std::ptr::copy_nonoverlapping(mapped_ptr, out.as_mut_ptr(), len);
        }
        Ok(out)
    }

    /// Fills this buffer with `data` through a transient staging buffer.
    ///
    /// Records a one-shot copy from `pool`, submits it to `queue` and blocks
    /// until the queue is idle. The staging buffer and command buffer are
    /// released before returning.
    ///
    /// # Errors
    ///
    /// Returns an error if `data` is larger than the buffer, or staging
    /// allocation, submission or the idle wait fails.
    pub fn upload_via_staging(
        &self,
        data: &[u8],
        queue: vk::Queue,
        pool: &CommandPool,
    ) -> RhiResult<()> {
        if data.is_empty() {
            return Ok(());
        }
        let size = data.len() as vk::DeviceSize;
        self.check_range(0, size)?;

        let staging = Buffer::new_with_data(self.device.clone(), BufferUsage::Staging, data)?;

        pool.execute_one_time(queue, |cmd| {
            cmd.copy_buffer(
                staging.handle(),
                self.buffer,
                &[vk::BufferCopy {
                    src_offset: 0,
                    dst_offset: 0,
                    size,
                }],
            );
            Ok(())
        })?;

        debug!(
            "Staged {} bytes into {} buffer",
            size,
            self.usage.name()
        );
        Ok(())
    }

    /// Reads the whole buffer back through a transient readback buffer.
    ///
    /// Blocks until `queue` is idle.
    ///
    /// # Errors
    ///
    /// Returns an error if readback allocation or the transfer fails.
    pub fn download_via_staging(&self, queue: vk::Queue, pool: &CommandPool) -> RhiResult<Vec<u8>> {
        let readback = Buffer::new(self.device.clone(), BufferUsage::Readback, self.size)?;

        pool.execute_one_time(queue, |cmd| {
            cmd.copy_buffer(
                self.buffer,
                readback.handle(),
                &[vk::BufferCopy {
                    src_offset: 0,
                    dst_offset: 0,
                    size: self.size,
                }],
            );
            Ok(())
        })?;

        readback.read_data(self.size as usize)
    }

    fn check_range(&self, offset: vk::DeviceSize, len: vk::DeviceSize) -> RhiResult<()> {
        match offset.checked_add(len) {
            Some(end) if end <= self.size => Ok(()),
            _ => Err(RhiError::InvalidArgument(format!(
                "Access exceeds buffer size: offset {} + len {} > buffer {}",
                offset, len, self.size
            ))),
        }
    }

    fn mapped_ptr(&self) -> RhiResult<*mut u8> {
        self.allocation
            .as_ref()
            .and_then(|allocation| allocation.mapped_ptr())
            .map(|ptr| ptr.as_ptr().cast::<u8>())
            .ok_or_else(|| {
                RhiError::InvalidArgument(format!("{} buffer is not host-visible", self.usage.name()))
            })
    }

    /// Returns the Vulkan buffer handle.
    #[inline]
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Returns the buffer size in bytes.
    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    /// Returns the buffer usage type.
    #[inline]
    pub fn usage(&self) -> BufferUsage {
        self.usage
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        // Free allocation first, then destroy buffer
        if let Some(allocation) = self.allocation.take() {
            match self.device.allocator() {
                Ok(mut allocator) => {
                    if let Err(e) = allocator.free(allocation) {
                        error!("Failed to free buffer allocation: {:?}", e);
                    }
                }
                Err(e) => error!("Leaking {} buffer allocation: {}", self.usage.name(), e),
            }
        }

        unsafe {
            self.device.handle().destroy_buffer(self.buffer, None);
        }

        debug!("Destroyed {} buffer", self.usage.name());
    }
}
