//! # GPU Resources
//!
//! Handle-based GPU resource manager for a real-time renderer.
//!
//! ## Features
//!
//! - **Resource Tables**: opaque handles over slot arenas with free-index reuse
//! - **Deferred Deletion**: resources are destroyed only after the frames in flight have retired
//! - **Staging Uploads**: one growable staging buffer, synchronous transfers, mip blit chains
//! - **Layout Cache**: structurally identical bind group layouts share one native layout
//! - **Variant Cache**: pipelines compiled once per `(state, render pass, sample count)`
//! - **Backends**: Vulkan through `ash`, plus a headless device for tests and tools
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gpu_resources::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut resources = ResourceManager::new(HeadlessDevice::new(2), ResourceManagerConfig::default())?;
//!
//!     let vertices = resources.create_buffer(
//!         &BufferDesc::new(BufferUsage::Vertex, 1024).with_name("quad"),
//!         Some(&[0u8; 1024]),
//!     )?;
//!
//!     // ... record frames using the buffer ...
//!
//!     resources.submit_for_deletion(vertices)?;
//!     resources.tick_deletion_queue(1);
//!     resources.tick_deletion_queue(1);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

// Core configuration
pub mod config;
pub mod core;

pub mod backend;
pub mod foundation;
pub mod resources;
pub mod shader;

pub use backend::{BackendError, BackendResult, HeadlessDevice, RenderDevice, VulkanDevice};
pub use core::ResourceManagerConfig;
pub use resources::{ResourceError, ResourceManager, ResourceResult};

/// Common imports for resource manager users
pub mod prelude {
    pub use crate::{
        backend::{HeadlessDevice, RenderDevice, VulkanDevice},
        config::Config,
        core::ResourceManagerConfig,
        resources::{
            BufferDesc, BufferHandle, BufferUsage, ComputeShaderHandle, DynamicBlock, MemoryLocation,
            ResourceError,
            ResourceHandle, ResourceManager, ResourceResult, SamplerDesc, ShaderHandle, SlotState,
            TextureDesc, TextureFormat, TextureHandle, TextureUsage, TextureViewDesc,
            TextureViewHandle, VariantHandle,
        },
        shader::{
            layout::{BindGroupLayoutDesc, ShaderStages},
            state::{BlendMode, CompareMode, CullMode, GraphicsState, MeshFormatFlags, StencilOp},
            variant::SampleCount,
            vertex::{VertexFormat, VertexLayout},
            ComputeShaderDesc, ShaderDesc,
        },
    };
}
