//! # Resources Module
//!
//! Handle-based storage and lifetime management for GPU resources.
//!
//! ## Organization
//!
//! - **[`manager`]**: the [`ResourceManager`] tying everything together
//! - **[`table`]**: slot arena with a free-index stack
//! - **[`deletion`]**: frame-delayed destruction queue
//! - **[`staging`]**: growable upload buffer and transfer op lists
//! - **[`buffer`]**, **[`texture`]**: resource descriptions and records
//! - **[`dynamic`]**: recycled per-frame uniform blocks
//! - **[`handle`]**: opaque handles handed to callers

pub mod buffer;
pub mod deletion;
pub mod dynamic;
pub mod error;
pub mod handle;
pub mod manager;
pub mod staging;
pub mod table;
pub mod texture;

pub use buffer::{BufferDesc, BufferResource, BufferUsage, MemoryLocation};
pub use dynamic::DynamicBlock;
pub use error::{ResourceError, ResourceResult};
pub use handle::{
    BufferHandle, ComputeShaderHandle, ResourceHandle, ResourceKind, ShaderHandle, TextureHandle,
    TextureViewHandle, VariantHandle,
};
pub use manager::{ResourceManager, ResourceStats, TableStats};
pub use table::SlotState;
pub use texture::{
    AddressMode, Extent3D, FilterMode, SamplerDesc, TextureDesc, TextureFormat, TextureKind,
    TextureUsage, TextureViewDesc,
};
