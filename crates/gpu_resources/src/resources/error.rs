//! Resource manager errors

use crate::backend::BackendError;
use crate::config::ConfigError;
use crate::resources::handle::ResourceKind;
use crate::resources::texture::TextureFormat;

/// Errors returned by [`crate::ResourceManager`]
#[derive(thiserror::Error, Debug)]
pub enum ResourceError {
    /// Handle does not refer to a live resource
    #[error("Invalid {kind} handle: {index}")]
    InvalidHandle {
        /// Kind of the handle
        kind: ResourceKind,
        /// Table index of the handle
        index: u32,
    },

    /// Resource was already submitted for deletion
    #[error("{kind} #{index} is already pending deletion")]
    AlreadyPendingDeletion {
        /// Kind of the resource
        kind: ResourceKind,
        /// Table index of the resource
        index: u32,
    },

    /// Mip generation needs linear blits the format cannot do
    #[error("Format {format} does not support linear filtering for mip generation")]
    UnsupportedMipFormat {
        /// Format of the texture
        format: TextureFormat,
    },

    /// Data does not fit into the destination
    #[error("Data too large: {requested} bytes into {capacity}")]
    DataTooLarge {
        /// Bytes available
        capacity: u64,
        /// Bytes supplied
        requested: u64,
    },

    /// Initial texture data does not cover mip level 0
    #[error("Insufficient data: {provided} bytes, at least {required} needed")]
    InsufficientData {
        /// Bytes needed for the base level
        required: u64,
        /// Bytes supplied
        provided: u64,
    },

    /// Direct access to a buffer that has no host mapping
    #[error("Buffer #{index} is not host visible")]
    NotHostVisible {
        /// Table index of the buffer
        index: u32,
    },

    /// A shader declared more bind groups than supported
    #[error("Too many bind groups: {count} (max 4)")]
    TooManyBindGroups {
        /// Number declared
        count: usize,
    },

    /// Texture view range is outside its texture
    #[error("Invalid texture view: {reason}")]
    InvalidTextureView {
        /// Description of the problem
        reason: String,
    },

    /// Configuration rejected
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Backend failure
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Result type for resource manager operations
pub type ResourceResult<T> = Result<T, ResourceError>;
