//! GPU memory management.
//!
//! Every allocation picks its memory type explicitly from the physical
//! device's memory properties. There is no sub-allocation: one buffer or
//! image owns one `VkDeviceMemory`.

use crate::error::{GpuError, Result, VkResultExt};
use ash::vk;
use std::ffi::c_void;

/// Lowest memory type index allowed by `type_bits` that has all `required` flags.
pub fn find_memory_type(
    properties: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    required: vk::MemoryPropertyFlags,
) -> Option<u32> {
    properties
        .memory_types
        .iter()
        .take(properties.memory_type_count as usize)
        .enumerate()
        .find(|(index, memory_type)| {
            type_bits & (1 << index) != 0 && memory_type.property_flags.contains(required)
        })
        .map(|(index, _)| index as u32)
}

/// Allocate and bind memory for a resource with the given requirements.
///
/// # Safety
/// The device must be valid.
pub(crate) unsafe fn allocate_memory(
    device: &ash::Device,
    properties: &vk::PhysicalDeviceMemoryProperties,
    requirements: vk::MemoryRequirements,
    flags: vk::MemoryPropertyFlags,
) -> Result<vk::DeviceMemory> {
    let type_index = find_memory_type(properties, requirements.memory_type_bits, flags).ok_or(
        GpuError::NoSuitableMemoryType {
            type_bits: requirements.memory_type_bits,
            flags,
        },
    )?;

    let alloc_info = vk::MemoryAllocateInfo::default()
        .allocation_size(requirements.size)
        .memory_type_index(type_index);

    device
        .allocate_memory(&alloc_info, None)
        .during("allocate memory")
}

/// A host-visible, host-coherent buffer that stays mapped until unmapped or destroyed.
pub struct HostBuffer {
    pub buffer: vk::Buffer,
    pub memory: vk::DeviceMemory,
    pub size: u64,
    mapped: Option<*mut c_void>,
}

impl HostBuffer {
    /// Create a buffer and map it persistently.
    ///
    /// # Safety
    /// The device must be valid and `properties` must belong to its physical device.
    pub unsafe fn new(
        device: &ash::Device,
        properties: &vk::PhysicalDeviceMemoryProperties,
        size: u64,
        usage: vk::BufferUsageFlags,
    ) -> Result<Self> {
        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = device
            .create_buffer(&buffer_info, None)
            .during("create buffer")?;

        let requirements = device.get_buffer_memory_requirements(buffer);
        let memory = match allocate_memory(
            device,
            properties,
            requirements,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        ) {
            Ok(memory) => memory,
            Err(e) => {
                device.destroy_buffer(buffer, None);
                return Err(e);
            }
        };

        let bound = device
            .bind_buffer_memory(buffer, memory, 0)
            .during("bind buffer memory")
            .and_then(|()| {
                device
                    .map_memory(memory, 0, size, vk::MemoryMapFlags::empty())
                    .during("map buffer memory")
            });

        let mapped = match bound {
            Ok(ptr) => ptr,
            Err(e) => {
                device.destroy_buffer(buffer, None);
                device.free_memory(memory, None);
                return Err(e);
            }
        };

        Ok(Self {
            buffer,
            memory,
            size,
            mapped: Some(mapped),
        })
    }

    /// Write raw bytes at the given offset.
    pub fn write_bytes(&self, offset: u64, data: &[u8]) -> Result<()> {
        let ptr = self
            .mapped
            .ok_or_else(|| GpuError::InvalidState("Buffer not mapped".to_string()))?;

        let end = offset
            .checked_add(data.len() as u64)
            .ok_or_else(|| GpuError::InvalidState("Offset overflow".to_string()))?;
        if end > self.size {
            return Err(GpuError::InvalidState(format!(
                "Write of {} bytes at {offset} exceeds buffer size {}",
                data.len(),
                self.size
            )));
        }

        // SAFETY: the range was checked against the mapped size
        unsafe {
            std::ptr::copy_nonoverlapping(
                data.as_ptr(),
                ptr.cast::<u8>().add(offset as usize),
                data.len(),
            );
        }

        Ok(())
    }

    /// Write a slice of plain-old-data values at offset zero.
    pub fn write<T: bytemuck::Pod>(&self, data: &[T]) -> Result<()> {
        self.write_bytes(0, bytemuck::cast_slice(data))
    }

    /// Unmap the buffer. Later writes fail.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn unmap(&mut self, device: &ash::Device) {
        if self.mapped.take().is_some() {
            device.unmap_memory(self.memory);
        }
    }

    /// Destroy the buffer and free its memory.
    ///
    /// # Safety
    /// The device must be valid and the buffer must not be in use.
    pub unsafe fn destroy(&mut self, device: &ash::Device) {
        self.unmap(device);
        device.destroy_buffer(self.buffer, None);
        device.free_memory(self.memory, None);
        self.buffer = vk::Buffer::null();
        self.memory = vk::DeviceMemory::null();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn properties(flags: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut props = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: flags.len() as u32,
            ..Default::default()
        };
        for (slot, &property_flags) in props.memory_types.iter_mut().zip(flags) {
            slot.property_flags = property_flags;
        }
        props
    }

    #[test]
    fn picks_lowest_matching_type() {
        let host = vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;
        let props = properties(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            host,
            host | vk::MemoryPropertyFlags::HOST_CACHED,
        ]);

        assert_eq!(find_memory_type(&props, 0b111, host), Some(1));
        assert_eq!(
            find_memory_type(&props, 0b111, vk::MemoryPropertyFlags::DEVICE_LOCAL),
            Some(0)
        );
    }

    #[test]
    fn respects_type_mask() {
        let host = vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;
        let props = properties(&[host, host]);

        assert_eq!(find_memory_type(&props, 0b10, host), Some(1));
        assert_eq!(find_memory_type(&props, 0b00, host), None);
    }

    #[test]
    fn ignores_types_past_count() {
        let mut props = properties(&[vk::MemoryPropertyFlags::DEVICE_LOCAL]);
        props.memory_types[1].property_flags = vk::MemoryPropertyFlags::HOST_VISIBLE;

        assert_eq!(
            find_memory_type(&props, u32::MAX, vk::MemoryPropertyFlags::HOST_VISIBLE),
            None
        );
    }
}
