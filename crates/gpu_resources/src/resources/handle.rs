//! Opaque resource handles
//!
//! A handle is an index into one of the manager's resource tables. Handles
//! are `Copy` and carry no native objects, so holding one never keeps GPU
//! memory alive and never exposes a raw native pointer.

use std::fmt;

/// Kind of resource a handle refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// GPU buffer
    Buffer,
    /// GPU texture
    Texture,
    /// View + sampler over a texture
    TextureView,
    /// Shader program
    Shader,
    /// Compiled pipeline variant of a shader
    ShaderVariant,
    /// Compute program and its pipeline
    ComputeShader,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Buffer => "buffer",
            Self::Texture => "texture",
            Self::TextureView => "texture view",
            Self::Shader => "shader",
            Self::ShaderVariant => "shader variant",
            Self::ComputeShader => "compute shader",
        };
        f.write_str(name)
    }
}

macro_rules! define_handle {
    ($(#[$meta:meta])* $name:ident => $kind:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub(crate) u32);

        impl $name {
            /// Kind of resource this handle refers to
            pub const KIND: ResourceKind = ResourceKind::$kind;

            /// Table index of the resource
            pub fn index(self) -> u32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{} #{}", Self::KIND, self.0)
            }
        }
    };
}

define_handle!(
    /// Handle to a buffer
    BufferHandle => Buffer
);
define_handle!(
    /// Handle to a texture
    TextureHandle => Texture
);
define_handle!(
    /// Handle to a texture view
    TextureViewHandle => TextureView
);
define_handle!(
    /// Handle to a shader
    ShaderHandle => Shader
);
define_handle!(
    /// Handle to a compiled shader variant
    VariantHandle => ShaderVariant
);
define_handle!(
    /// Handle to a compute shader
    ComputeShaderHandle => ComputeShader
);

/// Any handle that can be submitted for deletion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceHandle {
    /// A buffer
    Buffer(BufferHandle),
    /// A texture
    Texture(TextureHandle),
    /// A texture view
    TextureView(TextureViewHandle),
    /// A shader and all of its variants
    Shader(ShaderHandle),
    /// A compute shader
    ComputeShader(ComputeShaderHandle),
}

impl ResourceHandle {
    /// Resource kind
    pub fn kind(self) -> ResourceKind {
        match self {
            Self::Buffer(_) => ResourceKind::Buffer,
            Self::Texture(_) => ResourceKind::Texture,
            Self::TextureView(_) => ResourceKind::TextureView,
            Self::Shader(_) => ResourceKind::Shader,
            Self::ComputeShader(_) => ResourceKind::ComputeShader,
        }
    }

    /// Table index
    pub fn index(self) -> u32 {
        match self {
            Self::Buffer(h) => h.index(),
            Self::Texture(h) => h.index(),
            Self::TextureView(h) => h.index(),
            Self::Shader(h) => h.index(),
            Self::ComputeShader(h) => h.index(),
        }
    }
}

impl From<BufferHandle> for ResourceHandle {
    fn from(handle: BufferHandle) -> Self {
        Self::Buffer(handle)
    }
}

impl From<TextureHandle> for ResourceHandle {
    fn from(handle: TextureHandle) -> Self {
        Self::Texture(handle)
    }
}

impl From<TextureViewHandle> for ResourceHandle {
    fn from(handle: TextureViewHandle) -> Self {
        Self::TextureView(handle)
    }
}

impl From<ShaderHandle> for ResourceHandle {
    fn from(handle: ShaderHandle) -> Self {
        Self::Shader(handle)
    }
}

impl From<ComputeShaderHandle> for ResourceHandle {
    fn from(handle: ComputeShaderHandle) -> Self {
        Self::ComputeShader(handle)
    }
}

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} #{}", self.kind(), self.index())
    }
}
