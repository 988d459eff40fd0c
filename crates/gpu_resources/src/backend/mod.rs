//! # Backend Module
//!
//! The device seam the resource manager is written against. A backend
//! allocates native memory, builds native layouts and pipelines, and accepts
//! one-shot transfer command lists that it executes before returning.
//!
//! ## Organization
//!
//! - **[`RenderDevice`]**: trait every backend implements
//! - **[`headless`]**: in-memory device with observable counters, no GPU needed
//! - **[`vulkan`]**: ash implementation over an externally created device
//!
//! Transfers are expressed as a list of [`TransferOp`]s. The staging pipeline
//! builds the list (copies, layout transitions, the mip blit chain) and the
//! backend only translates each op into native commands.

pub mod headless;
pub mod vulkan;

pub use headless::HeadlessDevice;
pub use vulkan::VulkanDevice;

use crate::resources::buffer::{BufferUsage, MemoryLocation};
use crate::resources::texture::{
    Extent3D, SamplerDesc, TextureDesc, TextureFormat, TextureViewDesc,
};
use crate::shader::layout::BindGroupLayoutDesc;
use crate::shader::state::GraphicsState;
use crate::shader::variant::{SampleCount, SpecializationConstants};
use crate::shader::vertex::VertexLayout;

/// Errors raised by a backend
#[derive(thiserror::Error, Debug)]
pub enum BackendError {
    /// Native API call failed
    #[error("Vulkan API error: {0:?}")]
    Vulkan(#[from] ash::vk::Result),

    /// No memory type satisfies the requested properties
    #[error("No suitable memory type found")]
    NoSuitableMemoryType,

    /// Device memory allocation failed
    #[error("Out of memory: {requested} bytes")]
    OutOfMemory {
        /// Number of bytes that were requested
        requested: u64,
    },

    /// Shader bytecode could not be turned into a module
    #[error("Invalid shader code: {0}")]
    InvalidShaderCode(String),

    /// Pipeline compilation failed
    #[error("Pipeline creation failed: {0}")]
    PipelineCreation(String),

    /// Transfer op list is inconsistent with the target
    #[error("Invalid transfer: {0}")]
    InvalidTransfer(String),
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Image layouts the transfer pipeline moves textures through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageLayout {
    /// Contents undefined, only valid as a source layout
    Undefined,
    /// Destination of copies and blits
    TransferDst,
    /// Source of blits
    TransferSrc,
    /// Sampled from shaders
    ShaderReadOnly,
    /// Bound as a color attachment
    ColorAttachment,
    /// Bound as a depth/stencil attachment
    DepthStencilAttachment,
    /// Storage image access
    General,
}

/// One command in a transfer submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOp {
    /// Copy bytes from the staging buffer into a buffer
    CopyBuffer {
        /// Offset into the staging buffer
        src_offset: u64,
        /// Offset into the destination buffer
        dst_offset: u64,
        /// Number of bytes
        size: u64,
    },
    /// Copy tightly packed texels from the staging buffer into one mip level
    CopyBufferToImage {
        /// Offset into the staging buffer
        buffer_offset: u64,
        /// Destination mip level
        mip_level: u32,
        /// First destination layer
        base_layer: u32,
        /// Number of layers copied
        layer_count: u32,
        /// Extent of the mip level
        extent: Extent3D,
    },
    /// Layout transition over a mip range (all layers)
    Transition {
        /// First mip level
        base_mip: u32,
        /// Number of mip levels
        mip_count: u32,
        /// Current layout
        old: ImageLayout,
        /// Layout after the barrier
        new: ImageLayout,
    },
    /// Linear-filtered blit from one mip level into the next
    Blit {
        /// Source mip level (must be in `TransferSrc`)
        src_mip: u32,
        /// Source extent
        src_extent: Extent3D,
        /// Destination mip level (must be in `TransferDst`)
        dst_mip: u32,
        /// Destination extent
        dst_extent: Extent3D,
        /// Number of layers blitted
        layer_count: u32,
    },
}

/// Destination of a transfer submission
#[derive(Debug)]
pub enum TransferTarget<'a, B, T> {
    /// Buffer destination
    Buffer(&'a B),
    /// Texture destination
    Texture(&'a T),
}

/// Parameters for a native buffer allocation
#[derive(Debug, Clone, Copy)]
pub struct BufferAllocInfo<'a> {
    /// Requested size in bytes
    pub size: u64,
    /// How the buffer is bound
    pub usage: BufferUsage,
    /// Where the memory lives; host-visible memory is persistently mapped
    pub memory: MemoryLocation,
    /// Debug label
    pub name: &'a str,
}

/// Everything a backend needs to compile one pipeline variant
#[derive(Debug)]
pub struct PipelineDesc<'a, L, P> {
    /// Vertex stage SPIR-V words
    pub vertex_code: &'a [u32],
    /// Pixel stage SPIR-V words
    pub pixel_code: Option<&'a [u32]>,
    /// Pipeline layout built from the shader's bind groups
    pub layout: &'a L,
    /// Vertex input description
    pub vertex_layout: &'a VertexLayout,
    /// Fixed-function state
    pub state: GraphicsState,
    /// Render pass the pipeline will be used in
    pub render_pass: P,
    /// Rasterization sample count
    pub sample_count: SampleCount,
    /// Specialization constants derived from `state`
    pub specialization: SpecializationConstants,
    /// Debug label
    pub name: &'a str,
}

/// Everything a backend needs to compile a compute pipeline
#[derive(Debug)]
pub struct ComputePipelineDesc<'a, L> {
    /// Compute stage SPIR-V words
    pub code: &'a [u32],
    /// Pipeline layout built from the shader's bind groups
    pub layout: &'a L,
    /// Debug label
    pub name: &'a str,
}

/// # Render Device
///
/// Device/context provider and command submission surface for the resource
/// manager. Native objects are returned by value and handed back for
/// destruction; the manager never destroys anything it was not given.
pub trait RenderDevice {
    /// Native buffer plus its memory
    type Buffer;
    /// Native image plus its memory
    type Texture;
    /// Native image view plus sampler
    type TextureView;
    /// Native bind group (descriptor set) layout
    type BindGroupLayout: Copy + Eq + std::fmt::Debug;
    /// Native pipeline layout
    type PipelineLayout;
    /// Native compiled pipeline
    type Pipeline;
    /// Identity of a render pass, part of a variant key
    type RenderPass: Copy + Eq + std::fmt::Debug;

    /// Number of frames the GPU may lag behind the CPU
    fn frames_in_flight(&self) -> u32;

    /// Allocate a buffer; host-visible buffers come back mapped
    fn create_buffer(&mut self, info: &BufferAllocInfo<'_>) -> BackendResult<Self::Buffer>;

    /// Size of the backing allocation after alignment
    fn buffer_size(&self, buffer: &Self::Buffer) -> u64;

    /// Host mapping of a buffer, `None` for device-local memory
    fn mapped<'a>(&'a self, buffer: &Self::Buffer) -> Option<&'a [u8]>;

    /// Mutable host mapping of a buffer
    fn mapped_mut<'a>(&'a mut self, buffer: &Self::Buffer) -> Option<&'a mut [u8]>;

    /// Make host writes in `offset..offset + size` visible to the device
    fn flush_mapped(&self, buffer: &Self::Buffer, offset: u64, size: u64) -> BackendResult<()>;

    /// Destroy a buffer, unmapping it first if needed
    fn destroy_buffer(&mut self, buffer: Self::Buffer);

    /// Create an image with `mip_levels` levels (already resolved, never 0)
    fn create_texture(&mut self, desc: &TextureDesc, mip_levels: u32) -> BackendResult<Self::Texture>;

    /// Whether `format` can be the source of a linear-filtered blit
    fn supports_linear_blit(&self, format: TextureFormat) -> bool;

    /// Create a view and sampler over part of a texture
    fn create_texture_view(
        &mut self,
        texture: &Self::Texture,
        desc: &TextureViewDesc,
        sampler: &SamplerDesc,
    ) -> BackendResult<Self::TextureView>;

    /// Destroy a texture
    fn destroy_texture(&mut self, texture: Self::Texture);

    /// Destroy a view and its sampler
    fn destroy_texture_view(&mut self, view: Self::TextureView);

    /// Build a native bind group layout
    fn create_bind_group_layout(
        &mut self,
        desc: &BindGroupLayoutDesc,
    ) -> BackendResult<Self::BindGroupLayout>;

    /// Destroy a bind group layout
    fn destroy_bind_group_layout(&mut self, layout: Self::BindGroupLayout);

    /// Build a pipeline layout from bind group layouts in set order
    fn create_pipeline_layout(
        &mut self,
        bind_groups: &[Self::BindGroupLayout],
    ) -> BackendResult<Self::PipelineLayout>;

    /// Destroy a pipeline layout
    fn destroy_pipeline_layout(&mut self, layout: Self::PipelineLayout);

    /// Compile a graphics pipeline
    fn create_pipeline(
        &mut self,
        desc: &PipelineDesc<'_, Self::PipelineLayout, Self::RenderPass>,
    ) -> BackendResult<Self::Pipeline>;

    /// Compile a compute pipeline
    fn create_compute_pipeline(
        &mut self,
        desc: &ComputePipelineDesc<'_, Self::PipelineLayout>,
    ) -> BackendResult<Self::Pipeline>;

    /// Destroy a graphics or compute pipeline
    fn destroy_pipeline(&mut self, pipeline: Self::Pipeline);

    /// Record `ops` reading from `staging` into `target`, submit, and block
    /// until the device has finished executing them
    ///
    /// `staging` may be `None` when the list holds only layout transitions.
    fn submit_transfer(
        &mut self,
        staging: Option<&Self::Buffer>,
        target: TransferTarget<'_, Self::Buffer, Self::Texture>,
        ops: &[TransferOp],
    ) -> BackendResult<()>;

    /// Block until the device is idle
    fn wait_idle(&mut self) -> BackendResult<()>;
}
