//! Buffer allocation for the Vulkan backend
//!
//! Each buffer owns one `vkAllocateMemory` allocation. Host-visible buffers are
//! mapped once at creation and stay mapped until destroyed.

use ash::vk;

use crate::backend::{BackendError, BackendResult, BufferAllocInfo};
use crate::resources::buffer::{BufferUsage, MemoryLocation};

/// Vulkan buffer and its memory
#[derive(Debug)]
pub struct VulkanBuffer {
    pub(crate) buffer: vk::Buffer,
    pub(crate) memory: vk::DeviceMemory,
    pub(crate) size: vk::DeviceSize,
    pub(crate) mapped: *mut u8,
    pub(crate) coherent: bool,
}

impl VulkanBuffer {
    /// Native buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Size of the memory allocation
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    /// Whether the buffer is persistently mapped
    pub fn is_mapped(&self) -> bool {
        !self.mapped.is_null()
    }
}

fn usage_flags(usage: BufferUsage) -> vk::BufferUsageFlags {
    match usage {
        BufferUsage::Index => vk::BufferUsageFlags::INDEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST,
        BufferUsage::Vertex => vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST,
        BufferUsage::Uniform => vk::BufferUsageFlags::UNIFORM_BUFFER | vk::BufferUsageFlags::TRANSFER_DST,
        BufferUsage::Storage => vk::BufferUsageFlags::STORAGE_BUFFER | vk::BufferUsageFlags::TRANSFER_DST,
        BufferUsage::Staging => vk::BufferUsageFlags::TRANSFER_SRC,
    }
}

/// Create a buffer, allocate and bind its memory, and map it if host visible
pub(crate) fn create_buffer(
    device: &ash::Device,
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    info: &BufferAllocInfo<'_>,
) -> BackendResult<VulkanBuffer> {
    let buffer_info = vk::BufferCreateInfo::builder()
        .size(info.size.max(1))
        .usage(usage_flags(info.usage))
        .sharing_mode(vk::SharingMode::EXCLUSIVE);

    let buffer = unsafe { device.create_buffer(&buffer_info, None)? };
    let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };

    let found = match info.memory {
        MemoryLocation::DeviceLocal => find_memory_type(
            memory_properties,
            requirements.memory_type_bits,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )
        .map(|index| (index, true)),
        MemoryLocation::HostVisible => find_memory_type(
            memory_properties,
            requirements.memory_type_bits,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )
        .map(|index| (index, true))
        .or_else(|_| {
            find_memory_type(
                memory_properties,
                requirements.memory_type_bits,
                vk::MemoryPropertyFlags::HOST_VISIBLE,
            )
            .map(|index| (index, false))
        }),
    };
    let (memory_type_index, coherent) = match found {
        Ok(found) => found,
        Err(e) => {
            unsafe { device.destroy_buffer(buffer, None) };
            return Err(e);
        }
    };

    let alloc_info = vk::MemoryAllocateInfo::builder()
        .allocation_size(requirements.size)
        .memory_type_index(memory_type_index);

    let memory = match unsafe { device.allocate_memory(&alloc_info, None) } {
        Ok(memory) => memory,
        Err(e) => {
            unsafe { device.destroy_buffer(buffer, None) };
            return Err(allocation_error(e, requirements.size));
        }
    };

    let bound = unsafe { device.bind_buffer_memory(buffer, memory, 0) }.and_then(|()| {
        if info.memory == MemoryLocation::HostVisible {
            unsafe { device.map_memory(memory, 0, vk::WHOLE_SIZE, vk::MemoryMapFlags::empty()) }
                .map(|ptr| ptr.cast::<u8>())
        } else {
            Ok(std::ptr::null_mut())
        }
    });

    let mapped = match bound {
        Ok(mapped) => mapped,
        Err(e) => {
            unsafe {
                device.destroy_buffer(buffer, None);
                device.free_memory(memory, None);
            }
            return Err(e.into());
        }
    };

    log::trace!(
        "Allocated {} byte buffer '{}' ({:?}, memory type {})",
        requirements.size,
        info.name,
        info.memory,
        memory_type_index
    );

    Ok(VulkanBuffer {
        buffer,
        memory,
        size: requirements.size,
        mapped,
        coherent: coherent || info.memory == MemoryLocation::DeviceLocal,
    })
}

/// Unmap, destroy and free a buffer
pub(crate) fn destroy_buffer(device: &ash::Device, buffer: VulkanBuffer) {
    unsafe {
        if buffer.is_mapped() {
            device.unmap_memory(buffer.memory);
        }
        device.destroy_buffer(buffer.buffer, None);
        device.free_memory(buffer.memory, None);
    }
}

/// Flush a mapped range of non-coherent memory
pub(crate) fn flush_range(
    device: &ash::Device,
    buffer: &VulkanBuffer,
    atom_size: vk::DeviceSize,
    offset: u64,
    size: u64,
) -> BackendResult<()> {
    if buffer.coherent || !buffer.is_mapped() || size == 0 {
        return Ok(());
    }

    let atom = atom_size.max(1);
    let start = offset / atom * atom;
    let end = (offset + size).div_ceil(atom) * atom;
    let range_size = if end >= buffer.size { vk::WHOLE_SIZE } else { end - start };

    let range = vk::MappedMemoryRange::builder()
        .memory(buffer.memory)
        .offset(start)
        .size(range_size);

    unsafe { device.flush_mapped_memory_ranges(&[range.build()])? };
    Ok(())
}

/// Find memory type with required properties
pub(crate) fn find_memory_type(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_filter: u32,
    properties: vk::MemoryPropertyFlags,
) -> BackendResult<u32> {
    for i in 0..memory_properties.memory_type_count {
        if (type_filter & (1 << i)) != 0
            && memory_properties.memory_types[i as usize].property_flags.contains(properties)
        {
            return Ok(i);
        }
    }

    Err(BackendError::NoSuitableMemoryType)
}

pub(crate) fn allocation_error(result: vk::Result, requested: u64) -> BackendError {
    match result {
        vk::Result::ERROR_OUT_OF_DEVICE_MEMORY | vk::Result::ERROR_OUT_OF_HOST_MEMORY => {
            BackendError::OutOfMemory { requested }
        }
        other => BackendError::Vulkan(other),
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
        for (i, f) in flags.iter().enumerate() {
            props.memory_types[i].property_flags = *f;
        }
        props
    }

    #[test]
    fn test_find_memory_type_respects_filter() {
        let props = properties(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            vk::MemoryPropertyFlags::DEVICE_LOCAL | vk::MemoryPropertyFlags::HOST_VISIBLE,
        ]);

        assert_eq!(
            find_memory_type(&props, 0b111, vk::MemoryPropertyFlags::DEVICE_LOCAL).unwrap(),
            0
        );
        assert_eq!(
            find_memory_type(&props, 0b100, vk::MemoryPropertyFlags::DEVICE_LOCAL).unwrap(),
            2
        );
        assert!(matches!(
            find_memory_type(&props, 0b001, vk::MemoryPropertyFlags::HOST_VISIBLE),
            Err(BackendError::NoSuitableMemoryType)
        ));
    }

    #[test]
    fn test_allocation_error_mapping() {
        assert!(matches!(
            allocation_error(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY, 64),
            BackendError::OutOfMemory { requested: 64 }
        ));
        assert!(matches!(
            allocation_error(vk::Result::ERROR_DEVICE_LOST, 64),
            BackendError::Vulkan(vk::Result::ERROR_DEVICE_LOST)
        ));
    }
}
