//! Bind group (descriptor set) layout descriptors

/// Kind of resource occupying a binding slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingKind {
    /// Uniform buffer
    UniformBuffer,
    /// Storage buffer
    StorageBuffer,
    /// Sampled texture with its sampler
    SampledTexture,
    /// Storage image
    StorageTexture,
}

bitflags::bitflags! {
    /// Shader stages a binding is visible to
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStages: u32 {
        /// Vertex stage
        const VERTEX = 1 << 0;
        /// Pixel (fragment) stage
        const PIXEL = 1 << 1;
        /// Compute stage
        const COMPUTE = 1 << 2;
    }
}

/// One binding slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayoutBinding {
    /// Binding slot number
    pub slot: u32,
    /// Resource kind
    pub kind: BindingKind,
    /// Array size
    pub count: u32,
    /// Stage visibility
    pub visibility: ShaderStages,
}

/// Shape of one bind group
///
/// Equality and hashing are structural over the ordered binding list, which
/// is what the layout cache deduplicates on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct BindGroupLayoutDesc {
    /// Bindings in declaration order
    pub bindings: Vec<LayoutBinding>,
}

impl BindGroupLayoutDesc {
    /// Create an empty layout
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a binding of any kind
    pub fn with_binding(mut self, slot: u32, kind: BindingKind, visibility: ShaderStages) -> Self {
        self.bindings.push(LayoutBinding { slot, kind, count: 1, visibility });
        self
    }

    /// Add a uniform buffer binding
    pub fn add_uniform_buffer(self, slot: u32, visibility: ShaderStages) -> Self {
        self.with_binding(slot, BindingKind::UniformBuffer, visibility)
    }

    /// Add a storage buffer binding
    pub fn add_storage_buffer(self, slot: u32, visibility: ShaderStages) -> Self {
        self.with_binding(slot, BindingKind::StorageBuffer, visibility)
    }

    /// Add a sampled texture binding
    pub fn add_sampled_texture(self, slot: u32, visibility: ShaderStages) -> Self {
        self.with_binding(slot, BindingKind::SampledTexture, visibility)
    }

    /// Add a storage texture binding
    pub fn add_storage_texture(self, slot: u32, visibility: ShaderStages) -> Self {
        self.with_binding(slot, BindingKind::StorageTexture, visibility)
    }

    /// Add an array binding
    pub fn add_array(mut self, slot: u32, kind: BindingKind, count: u32, visibility: ShaderStages) -> Self {
        self.bindings.push(LayoutBinding { slot, kind, count, visibility });
        self
    }
}
