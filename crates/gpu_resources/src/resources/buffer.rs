//! Buffer descriptors and table records

use serde::{Deserialize, Serialize};

/// How a buffer is bound by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BufferUsage {
    /// Index data
    Index,
    /// Vertex data
    Vertex,
    /// Uniform (constant) data
    Uniform,
    /// Read/write storage data
    Storage,
    /// Transfer source owned by the staging pipeline
    Staging,
}

impl BufferUsage {
    /// Memory a buffer of this usage gets when the descriptor does not say
    ///
    /// Uniform data is rewritten every frame so it lives in persistently
    /// mapped memory; everything else is device-local and filled by staging.
    pub fn default_memory(self) -> MemoryLocation {
        match self {
            Self::Uniform | Self::Staging => MemoryLocation::HostVisible,
            Self::Index | Self::Vertex | Self::Storage => MemoryLocation::DeviceLocal,
        }
    }
}

/// Where a buffer's memory lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemoryLocation {
    /// Fast GPU memory, written through the staging buffer
    DeviceLocal,
    /// CPU-visible memory, persistently mapped for the buffer's lifetime
    HostVisible,
}

/// Parameters for [`crate::ResourceManager::create_buffer`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferDesc {
    /// Binding usage
    pub usage: BufferUsage,
    /// Size in bytes
    pub size: u64,
    /// Element stride for structured buffers, 0 otherwise
    pub stride: u32,
    /// Memory placement override
    pub memory: Option<MemoryLocation>,
    /// Debug label
    pub name: String,
}

impl BufferDesc {
    /// Create a buffer descriptor
    pub fn new(usage: BufferUsage, size: u64) -> Self {
        Self {
            usage,
            size,
            stride: 0,
            memory: None,
            name: String::new(),
        }
    }

    /// Set the element stride
    pub fn with_stride(mut self, stride: u32) -> Self {
        self.stride = stride;
        self
    }

    /// Force a memory placement
    pub fn with_memory(mut self, memory: MemoryLocation) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Set the debug label
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Placement after applying the usage default
    pub fn resolved_memory(&self) -> MemoryLocation {
        self.memory.unwrap_or_else(|| self.usage.default_memory())
    }

    /// Number of `stride`-sized items, 0 for unstructured buffers
    pub fn item_count(&self) -> u64 {
        if self.stride == 0 {
            0
        } else {
            self.size / u64::from(self.stride)
        }
    }
}

/// A live buffer in the resource table
#[derive(Debug)]
pub struct BufferResource<B> {
    /// Binding usage
    pub usage: BufferUsage,
    /// Size the caller asked for
    pub size: u64,
    /// Size of the native allocation after alignment
    pub backing_size: u64,
    /// Element stride, 0 for unstructured buffers
    pub stride: u32,
    /// Number of elements
    pub item_count: u64,
    /// Memory placement
    pub memory: MemoryLocation,
    /// Debug label
    pub name: String,
    pub(crate) native: B,
}

impl<B> BufferResource<B> {
    /// Native buffer object
    pub fn native(&self) -> &B {
        &self.native
    }

    /// Whether the buffer has a persistent host mapping
    pub fn is_host_visible(&self) -> bool {
        self.memory == MemoryLocation::HostVisible
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_defaults_to_host_visible() {
        let desc = BufferDesc::new(BufferUsage::Uniform, 64);
        assert_eq!(desc.resolved_memory(), MemoryLocation::HostVisible);
        let desc = BufferDesc::new(BufferUsage::Vertex, 64);
        assert_eq!(desc.resolved_memory(), MemoryLocation::DeviceLocal);
    }

    #[test]
    fn test_memory_override() {
        let desc = BufferDesc::new(BufferUsage::Storage, 64).with_memory(MemoryLocation::HostVisible);
        assert_eq!(desc.resolved_memory(), MemoryLocation::HostVisible);
    }

    #[test]
    fn test_item_count() {
        assert_eq!(BufferDesc::new(BufferUsage::Vertex, 120).with_stride(12).item_count(), 10);
        assert_eq!(BufferDesc::new(BufferUsage::Index, 120).item_count(), 0);
    }
}
