//! Resource Manager
//!
//! Owns every buffer, texture, view, shader, shader variant and compute
//! shader created through it. Callers only ever see opaque handles; the native objects stay
//! in the resource tables until the deletion queue says the GPU is done with
//! them.
//!
//! ## Frame protocol
//!
//! ```text
//! frame loop:   create / submit_for_deletion ... tick_deletion_queue(1)
//! deletion:     Live -> PendingDeletion(N) -> ... -> destroyed, slot freed
//! ```
//!
//! Everything runs on the thread that owns the manager. Uploads block until
//! the device has finished the transfer.

use crate::backend::{
    BackendError, BackendResult, BufferAllocInfo, ComputePipelineDesc, ImageLayout, PipelineDesc,
    RenderDevice, TransferTarget,
};
use crate::core::ResourceManagerConfig;
use crate::resources::buffer::{BufferDesc, BufferResource, BufferUsage, MemoryLocation};
use crate::resources::deletion::DeletionQueue;
use crate::resources::dynamic::{DynamicBlock, DynamicBufferPool};
use crate::resources::error::{ResourceError, ResourceResult};
use crate::resources::handle::{
    BufferHandle, ComputeShaderHandle, ResourceHandle, ResourceKind, ShaderHandle, TextureHandle,
    TextureViewHandle, VariantHandle,
};
use crate::resources::staging::{self, StagingBuffer};
use crate::resources::table::{ResourceTable, SlotState};
use crate::resources::texture::{
    SamplerDesc, TextureDesc, TextureFormat, TextureResource, TextureUsage, TextureViewDesc,
    TextureViewResource,
};
use crate::shader::layout_cache::DescriptorLayoutCache;
use crate::shader::state::GraphicsState;
use crate::shader::variant::{SampleCount, ShaderVariant, SpecializationConstants, VariantKey};
use crate::shader::layout::BindGroupLayoutDesc;
use crate::shader::{
    spirv_words, ComputeShaderDesc, ComputeShaderResource, ShaderDesc, ShaderResource, MAX_BIND_GROUPS,
};

/// Slot counts of one resource table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TableStats {
    /// Slots holding a live resource
    pub live: usize,
    /// Slots waiting in the deletion queue
    pub pending: usize,
    /// Slots on the free stack
    pub free: usize,
}

impl TableStats {
    fn of<T>(table: &ResourceTable<T>) -> Self {
        Self {
            live: table.live_count(),
            pending: table.pending_count(),
            free: table.free_count(),
        }
    }
}

/// Snapshot returned by [`ResourceManager::stats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResourceStats {
    /// Buffer table
    pub buffers: TableStats,
    /// Texture table
    pub textures: TableStats,
    /// Texture view table
    pub texture_views: TableStats,
    /// Shader table
    pub shaders: TableStats,
    /// Compute shader table
    pub compute_shaders: TableStats,
    /// Compiled variants alive
    pub variants: usize,
    /// Entries in the deletion queue
    pub pending_deletions: usize,
    /// Distinct native bind group layouts
    pub cached_layouts: usize,
    /// Pipelines compiled since creation
    pub pipeline_compilations: u64,
    /// Staging buffer capacity in bytes
    pub staging_capacity: u64,
    /// Number of staging reallocations
    pub staging_resizes: u32,
    /// Frames ticked so far
    pub frame: u64,
}

/// Shader record stored for device `D`
pub type Shader<D> = ShaderResource<<D as RenderDevice>::BindGroupLayout, <D as RenderDevice>::PipelineLayout>;
/// Variant record stored for device `D`
pub type Variant<D> = ShaderVariant<<D as RenderDevice>::Pipeline, <D as RenderDevice>::RenderPass>;
/// Compute shader record stored for device `D`
pub type ComputeShader<D> = ComputeShaderResource<
    <D as RenderDevice>::BindGroupLayout,
    <D as RenderDevice>::PipelineLayout,
    <D as RenderDevice>::Pipeline,
>;

/// # Resource Manager
///
/// Handle-based owner of GPU resources over a [`RenderDevice`].
pub struct ResourceManager<D: RenderDevice> {
    device: D,
    config: ResourceManagerConfig,
    frames_in_flight: u32,
    frame: u64,

    buffers: ResourceTable<BufferResource<D::Buffer>>,
    textures: ResourceTable<TextureResource<D::Texture>>,
    texture_views: ResourceTable<TextureViewResource<D::TextureView>>,
    shaders: ResourceTable<Shader<D>>,
    variants: ResourceTable<Variant<D>>,
    compute_shaders: ResourceTable<ComputeShader<D>>,

    staging: StagingBuffer<D::Buffer>,
    layout_cache: DescriptorLayoutCache<D::BindGroupLayout>,
    deletion_queue: DeletionQueue,
    dynamic_pool: DynamicBufferPool,
    compilations: u64,
    shut_down: bool,
}

impl<D: RenderDevice> ResourceManager<D> {
    /// Create a manager over `device`
    ///
    /// The deletion delay is the larger of the configured frames in flight
    /// and the count the device reports.
    pub fn new(mut device: D, config: ResourceManagerConfig) -> ResourceResult<Self> {
        config.validate()?;

        let device_frames = device.frames_in_flight();
        let frames_in_flight = if device_frames > config.frames_in_flight {
            log::warn!(
                "Device keeps {} frames in flight, config asked for {}; using {}",
                device_frames,
                config.frames_in_flight,
                device_frames
            );
            device_frames
        } else {
            config.frames_in_flight
        };

        let staging = StagingBuffer::with_capacity(&mut device, config.initial_staging_size)?;

        log::info!(
            "Creating ResourceManager ({} frames in flight, {} byte staging buffer)",
            frames_in_flight,
            staging.capacity()
        );

        Ok(Self {
            buffers: ResourceTable::with_capacity(config.buffer_capacity),
            textures: ResourceTable::with_capacity(config.texture_capacity),
            texture_views: ResourceTable::with_capacity(config.texture_capacity),
            shaders: ResourceTable::with_capacity(config.shader_capacity),
            variants: ResourceTable::new(),
            compute_shaders: ResourceTable::new(),
            staging,
            layout_cache: DescriptorLayoutCache::new(),
            deletion_queue: DeletionQueue::new(),
            dynamic_pool: DynamicBufferPool::new(config.dynamic_buffer_size),
            compilations: 0,
            shut_down: false,
            frames_in_flight,
            frame: 0,
            device,
            config,
        })
    }

    /// Underlying device
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Mutable access to the underlying device
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Active configuration
    pub fn config(&self) -> &ResourceManagerConfig {
        &self.config
    }

    /// Frames a deleted resource waits before it is destroyed
    pub fn frames_in_flight(&self) -> u32 {
        self.frames_in_flight
    }

    /// Frames ticked since creation
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Current staging buffer capacity in bytes
    pub fn staging_capacity(&self) -> u64 {
        self.staging.capacity()
    }

    // ------------------------------------------------------------------
    // Buffers
    // ------------------------------------------------------------------

    /// Create a buffer, optionally filled with `data`
    ///
    /// Host-visible buffers are written through their mapping; device-local
    /// buffers go through the staging buffer and block until the copy is done.
    pub fn create_buffer(&mut self, desc: &BufferDesc, data: Option<&[u8]>) -> ResourceResult<BufferHandle> {
        if let Some(data) = data {
            if data.len() as u64 > desc.size {
                log::error!(
                    "Buffer '{}': {} bytes of initial data for a {} byte buffer",
                    desc.name,
                    data.len(),
                    desc.size
                );
                return Err(ResourceError::DataTooLarge {
                    capacity: desc.size,
                    requested: data.len() as u64,
                });
            }
        }

        let memory = desc.resolved_memory();
        let native = self.device.create_buffer(&BufferAllocInfo {
            size: desc.size,
            usage: desc.usage,
            memory,
            name: &desc.name,
        })?;

        if let Some(data) = data.filter(|data| !data.is_empty()) {
            if let Err(e) = fill_buffer(&mut self.device, &mut self.staging, &native, memory, 0, data) {
                self.device.destroy_buffer(native);
                return Err(e.into());
            }
        }

        let backing_size = self.device.buffer_size(&native);
        let index = self.buffers.allocate(BufferResource {
            usage: desc.usage,
            size: desc.size,
            backing_size,
            stride: desc.stride,
            item_count: desc.item_count(),
            memory,
            name: desc.name.clone(),
            native,
        });

        log::debug!(
            "Created buffer #{} '{}' ({:?}, {} bytes, {:?})",
            index,
            desc.name,
            desc.usage,
            desc.size,
            memory
        );
        Ok(BufferHandle(index))
    }

    /// Write into a host-visible buffer through its mapping
    pub fn write_buffer(&mut self, handle: BufferHandle, offset: u64, data: &[u8]) -> ResourceResult<()> {
        let buffer = self.buffers.get(handle.0).ok_or_else(|| invalid(ResourceKind::Buffer, handle.0))?;
        if !buffer.is_host_visible() {
            log::error!("Direct write to device-local buffer #{}", handle.0);
            return Err(ResourceError::NotHostVisible { index: handle.0 });
        }
        self.upload_buffer(handle, offset, data)
    }

    /// Replace `data.len()` bytes at `offset`, staging them if the buffer is
    /// device-local
    pub fn upload_buffer(&mut self, handle: BufferHandle, offset: u64, data: &[u8]) -> ResourceResult<()> {
        let buffer = self.buffers.get(handle.0).ok_or_else(|| invalid(ResourceKind::Buffer, handle.0))?;

        let end = offset.saturating_add(data.len() as u64);
        if end > buffer.size {
            return Err(ResourceError::DataTooLarge {
                capacity: buffer.size,
                requested: end,
            });
        }
        if data.is_empty() {
            return Ok(());
        }

        fill_buffer(
            &mut self.device,
            &mut self.staging,
            &buffer.native,
            buffer.memory,
            offset,
            data,
        )?;
        Ok(())
    }

    /// Host mapping of a buffer
    pub fn buffer_mapped(&self, handle: BufferHandle) -> ResourceResult<&[u8]> {
        let buffer = self.buffers.get(handle.0).ok_or_else(|| invalid(ResourceKind::Buffer, handle.0))?;
        let mapping = self
            .device
            .mapped(&buffer.native)
            .ok_or(ResourceError::NotHostVisible { index: handle.0 })?;
        let len = (buffer.size as usize).min(mapping.len());
        Ok(&mapping[..len])
    }

    /// Buffer record, live or pending deletion
    pub fn buffer(&self, handle: BufferHandle) -> Option<&BufferResource<D::Buffer>> {
        self.buffers.get(handle.0)
    }

    // ------------------------------------------------------------------
    // Textures
    // ------------------------------------------------------------------

    /// Create a texture, optionally filled with `data`
    ///
    /// `data` holds tightly packed mip levels starting at level 0, every layer
    /// of a level before the next level. Levels the data does not cover are
    /// generated with a linear blit chain.
    pub fn create_texture(&mut self, desc: &TextureDesc, data: Option<&[u8]>) -> ResourceResult<TextureHandle> {
        let resolved = TextureDesc {
            mip_levels: desc.resolved_mip_levels(),
            ..desc.clone()
        };
        let resting = resolved.usage.resting_layout();

        let plan = match data {
            Some(data) => Some(self.plan_texture_upload(&resolved, data)?),
            None => None,
        };

        let native = self.device.create_texture(&resolved, resolved.mip_levels)?;

        let uploaded = match plan {
            Some(supplied) => {
                let bytes = resolved.chain_size(supplied) as usize;
                let data = data.unwrap_or_default();
                upload_texture_levels(
                    &mut self.device,
                    &mut self.staging,
                    &native,
                    &resolved,
                    &data[..bytes],
                    supplied,
                    resting,
                )
            }
            None => self.device.submit_transfer(
                None,
                TransferTarget::Texture(&native),
                &staging::texture_init_ops(&resolved, resting),
            ),
        };
        if let Err(e) = uploaded {
            self.device.destroy_texture(native);
            return Err(e.into());
        }

        log::debug!(
            "Created texture '{}' {}x{}x{} {} ({} mips, {} layers)",
            resolved.name,
            resolved.extent.width,
            resolved.extent.height,
            resolved.extent.depth,
            resolved.format,
            resolved.mip_levels,
            resolved.layers
        );

        let index = self.textures.allocate(TextureResource {
            desc: resolved,
            layout: resting,
            native,
        });
        Ok(TextureHandle(index))
    }

    /// Create a sampled RGBA8 texture with a full mip chain from an image
    pub fn create_texture_from_image(
        &mut self,
        image: &image::RgbaImage,
        name: &str,
    ) -> ResourceResult<TextureHandle> {
        let desc = TextureDesc::new_2d(image.width(), image.height(), TextureFormat::Rgba8Unorm)
            .with_mip_levels(0)
            .with_usage(TextureUsage::SAMPLED)
            .with_name(name);
        self.create_texture(&desc, Some(image.as_raw().as_slice()))
    }

    /// Re-upload a texture's contents, regenerating levels `data` does not cover
    pub fn upload_texture(&mut self, handle: TextureHandle, data: &[u8]) -> ResourceResult<()> {
        let texture = self
            .textures
            .get(handle.0)
            .ok_or_else(|| invalid(ResourceKind::Texture, handle.0))?;
        let supplied = self.plan_texture_upload(&texture.desc, data)?;
        let bytes = texture.desc.chain_size(supplied) as usize;

        upload_texture_levels(
            &mut self.device,
            &mut self.staging,
            &texture.native,
            &texture.desc,
            &data[..bytes],
            supplied,
            texture.layout,
        )?;
        Ok(())
    }

    /// Number of levels `data` supplies, checking that the rest can be generated
    fn plan_texture_upload(&self, desc: &TextureDesc, data: &[u8]) -> ResourceResult<u32> {
        let provided = data.len() as u64;
        let full_size = desc.chain_size(desc.mip_levels);
        if provided > full_size {
            log::error!(
                "Texture '{}': {} bytes of data for a {} byte mip chain",
                desc.name,
                provided,
                full_size
            );
            return Err(ResourceError::DataTooLarge {
                capacity: full_size,
                requested: provided,
            });
        }

        let supplied = staging::supplied_levels(desc, provided);
        if supplied == 0 {
            return Err(ResourceError::InsufficientData {
                required: desc.level_size(0),
                provided,
            });
        }
        if desc.chain_size(supplied) != provided {
            log::warn!(
                "Texture '{}': ignoring {} bytes past mip {}",
                desc.name,
                provided - desc.chain_size(supplied),
                supplied - 1
            );
        }

        if supplied < desc.mip_levels && !self.device.supports_linear_blit(desc.format) {
            log::error!(
                "Texture '{}': format {} cannot generate {} mip levels by linear blit",
                desc.name,
                desc.format,
                desc.mip_levels - supplied
            );
            return Err(ResourceError::UnsupportedMipFormat { format: desc.format });
        }
        Ok(supplied)
    }

    /// Texture record, live or pending deletion
    pub fn texture(&self, handle: TextureHandle) -> Option<&TextureResource<D::Texture>> {
        self.textures.get(handle.0)
    }

    /// Create a view and sampler over part of a live texture
    pub fn create_texture_view(
        &mut self,
        texture: TextureHandle,
        desc: &TextureViewDesc,
        sampler: &SamplerDesc,
    ) -> ResourceResult<TextureViewHandle> {
        expect_live(self.textures.state(texture.0), ResourceKind::Texture, texture.0)?;
        let source = self
            .textures
            .get(texture.0)
            .ok_or_else(|| invalid(ResourceKind::Texture, texture.0))?;

        let resolved = desc
            .resolve(&source.desc)
            .map_err(|reason| ResourceError::InvalidTextureView { reason })?;
        let native = self.device.create_texture_view(&source.native, &resolved, sampler)?;

        let index = self.texture_views.allocate(TextureViewResource {
            texture,
            desc: resolved,
            sampler: sampler.clone(),
            native,
        });
        log::debug!("Created texture view #{} over texture #{}", index, texture.0);
        Ok(TextureViewHandle(index))
    }

    /// Texture view record, live or pending deletion
    pub fn texture_view(&self, handle: TextureViewHandle) -> Option<&TextureViewResource<D::TextureView>> {
        self.texture_views.get(handle.0)
    }

    // ------------------------------------------------------------------
    // Shaders
    // ------------------------------------------------------------------

    /// Create a shader: bytecode, cached bind group layouts and a pipeline
    /// layout. No pipeline is compiled until a variant is requested.
    pub fn create_shader(&mut self, desc: &ShaderDesc) -> ResourceResult<ShaderHandle> {
        check_bind_group_count(&desc.name, &desc.bind_groups)?;
        let vertex_code = spirv_words(&desc.vertex_code)?;
        let pixel_code = desc.pixel_code.as_deref().map(spirv_words).transpose()?;
        let bind_group_layouts = self.cached_layouts(&desc.bind_groups)?;

        let pipeline_layout = self.device.create_pipeline_layout(&bind_group_layouts)?;

        let index = self.shaders.allocate(ShaderResource {
            name: desc.name.clone(),
            vertex_code,
            pixel_code,
            bind_group_descs: desc.bind_groups.clone(),
            bind_group_layouts,
            vertex_layout: desc.vertex_layout.clone(),
            pipeline_layout,
            variants: Vec::new(),
        });

        log::debug!(
            "Created shader #{} '{}' ({} bind groups, {} cached layouts)",
            index,
            desc.name,
            desc.bind_groups.len(),
            self.layout_cache.len()
        );
        Ok(ShaderHandle(index))
    }

    /// Create a compute shader and compile its pipeline
    ///
    /// Bind group layouts come from the same cache graphics shaders use.
    pub fn create_compute_shader(&mut self, desc: &ComputeShaderDesc) -> ResourceResult<ComputeShaderHandle> {
        check_bind_group_count(&desc.name, &desc.bind_groups)?;
        let code = spirv_words(&desc.code)?;
        let bind_group_layouts = self.cached_layouts(&desc.bind_groups)?;

        let pipeline_layout = self.device.create_pipeline_layout(&bind_group_layouts)?;
        let compiled = self.device.create_compute_pipeline(&ComputePipelineDesc {
            code: &code,
            layout: &pipeline_layout,
            name: &desc.name,
        });
        let pipeline = match compiled {
            Ok(pipeline) => pipeline,
            Err(e) => {
                log::error!("Compute shader '{}' failed to compile: {}", desc.name, e);
                self.device.destroy_pipeline_layout(pipeline_layout);
                return Err(e.into());
            }
        };
        self.compilations += 1;

        let index = self.compute_shaders.allocate(ComputeShaderResource {
            name: desc.name.clone(),
            bind_group_descs: desc.bind_groups.clone(),
            bind_group_layouts,
            pipeline_layout,
            pipeline,
        });
        log::debug!(
            "Created compute shader #{} '{}' ({} bind groups)",
            index,
            desc.name,
            desc.bind_groups.len()
        );
        Ok(ComputeShaderHandle(index))
    }

    /// Compute shader record, live or pending deletion
    pub fn compute_shader(&self, handle: ComputeShaderHandle) -> Option<&ComputeShader<D>> {
        self.compute_shaders.get(handle.0)
    }

    fn cached_layouts(&mut self, groups: &[BindGroupLayoutDesc]) -> BackendResult<Vec<D::BindGroupLayout>> {
        let mut layouts = Vec::with_capacity(groups.len());
        for group in groups {
            let device = &mut self.device;
            let layout = self
                .layout_cache
                .get_or_create(group, |group| device.create_bind_group_layout(group))?;
            layouts.push(layout);
        }
        Ok(layouts)
    }

    /// Shader record, live or pending deletion
    pub fn shader(&self, handle: ShaderHandle) -> Option<&Shader<D>> {
        self.shaders.get(handle.0)
    }

    /// Native layout of bind group `index` of a shader
    pub fn bind_group_layout(&self, shader: ShaderHandle, index: usize) -> Option<D::BindGroupLayout> {
        self.shaders.get(shader.0)?.bind_group_layout(index)
    }

    fn find_variant(&self, shader: &Shader<D>, key: &VariantKey<D::RenderPass>) -> Option<VariantHandle> {
        shader
            .variants
            .iter()
            .copied()
            .find(|handle| self.variants.get(handle.0).is_some_and(|variant| variant.key == *key))
    }

    /// Return the variant of `shader` for this key, compiling it on first use
    ///
    /// A shader pending deletion still returns its compiled variants; only a
    /// new compilation is refused.
    pub fn get_or_create_variant(
        &mut self,
        shader: ShaderHandle,
        state: GraphicsState,
        render_pass: D::RenderPass,
        sample_count: SampleCount,
    ) -> ResourceResult<VariantHandle> {
        let resource = self
            .shaders
            .get(shader.0)
            .ok_or_else(|| invalid(ResourceKind::Shader, shader.0))?;

        let key = VariantKey {
            state,
            render_pass,
            sample_count,
        };
        if let Some(existing) = self.find_variant(resource, &key) {
            log::trace!("Variant hit for shader #{}: {:?}", shader.0, state);
            return Ok(existing);
        }

        // Pending shaders keep serving compiled variants but never gain new ones
        if let Err(e) = expect_live(self.shaders.state(shader.0), ResourceKind::Shader, shader.0) {
            log::error!("Variant compilation requested for {} which is pending deletion", shader);
            return Err(e);
        }

        let pipeline = self.device.create_pipeline(&PipelineDesc {
            vertex_code: &resource.vertex_code,
            pixel_code: resource.pixel_code.as_deref(),
            layout: &resource.pipeline_layout,
            vertex_layout: &resource.vertex_layout,
            state,
            render_pass,
            sample_count,
            specialization: SpecializationConstants::from_state(state),
            name: &resource.name,
        })?;
        self.compilations += 1;

        let handle = VariantHandle(self.variants.allocate(ShaderVariant {
            shader,
            key,
            pipeline,
        }));
        if let Some(resource) = self.shaders.get_mut(shader.0) {
            resource.variants.push(handle);
            log::debug!(
                "Compiled variant {} of shader #{} '{}' ({:?}, {} samples)",
                resource.variants.len(),
                shader.0,
                resource.name,
                state,
                sample_count.count()
            );
        }
        Ok(handle)
    }

    /// Whether `shader` already has a compiled variant for this key
    pub fn variant_exists(
        &self,
        shader: ShaderHandle,
        state: GraphicsState,
        render_pass: D::RenderPass,
        sample_count: SampleCount,
    ) -> bool {
        let key = VariantKey {
            state,
            render_pass,
            sample_count,
        };
        self.shaders
            .get(shader.0)
            .is_some_and(|resource| self.find_variant(resource, &key).is_some())
    }

    /// Compiled variant record
    pub fn variant(&self, handle: VariantHandle) -> Option<&Variant<D>> {
        self.variants.get(handle.0)
    }

    /// Variants of a shader in compilation order
    pub fn shader_variants(&self, shader: ShaderHandle) -> ResourceResult<&[VariantHandle]> {
        self.shaders
            .get(shader.0)
            .map(|resource| resource.variants())
            .ok_or_else(|| invalid(ResourceKind::Shader, shader.0))
    }

    // ------------------------------------------------------------------
    // Dynamic buffers
    // ------------------------------------------------------------------

    /// Hand out a mapped uniform block of `dynamic_buffer_size` bytes
    pub fn request_dynamic_buffer(&mut self) -> ResourceResult<DynamicBlock> {
        self.dynamic_pool.recycle(self.frame, self.frames_in_flight);
        let size = self.dynamic_pool.block_size();

        if let Some(buffer) = self.dynamic_pool.take() {
            log::trace!("Reusing dynamic block {}", buffer);
            return Ok(DynamicBlock { buffer, size });
        }

        let desc = BufferDesc::new(BufferUsage::Uniform, size)
            .with_memory(MemoryLocation::HostVisible)
            .with_name("dynamic block");
        let buffer = self.create_buffer(&desc, None)?;
        self.dynamic_pool.adopt(buffer);
        Ok(DynamicBlock { buffer, size })
    }

    /// Give a block back; it is reused once the current frame leaves flight
    pub fn return_dynamic_buffer(&mut self, block: DynamicBlock) -> ResourceResult<()> {
        if !self.dynamic_pool.is_outstanding(block.buffer) {
            log::error!("Returned {} that is not an outstanding dynamic block", block.buffer);
            return Err(invalid(ResourceKind::Buffer, block.buffer.0));
        }
        self.dynamic_pool.give_back(block.buffer, self.frame);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Deletion
    // ------------------------------------------------------------------

    /// Queue a resource for destruction after `frames_in_flight` ticks
    ///
    /// The resource stays readable until then. Deleting a shader also
    /// destroys all of its variants.
    pub fn submit_for_deletion(&mut self, handle: impl Into<ResourceHandle>) -> ResourceResult<()> {
        let handle = handle.into();
        let index = handle.index();
        let marked = match handle {
            ResourceHandle::Buffer(_) => self.buffers.mark_pending(index),
            ResourceHandle::Texture(_) => self.textures.mark_pending(index),
            ResourceHandle::TextureView(_) => self.texture_views.mark_pending(index),
            ResourceHandle::Shader(_) => self.shaders.mark_pending(index),
            ResourceHandle::ComputeShader(_) => self.compute_shaders.mark_pending(index),
        };

        match marked {
            Ok(()) => {}
            Err(SlotState::PendingDeletion) => {
                log::error!("{} submitted for deletion twice", handle);
                return Err(ResourceError::AlreadyPendingDeletion {
                    kind: handle.kind(),
                    index,
                });
            }
            Err(_) => {
                log::error!("Deletion of {} which is not live", handle);
                return Err(invalid(handle.kind(), index));
            }
        }

        if let ResourceHandle::Buffer(buffer) = handle {
            if self.dynamic_pool.forget(buffer) {
                log::warn!("{} deleted directly while owned by the dynamic pool", buffer);
            }
        }

        self.deletion_queue.push(handle, self.frames_in_flight);
        log::debug!(
            "Queued {} for deletion in {} frames",
            handle,
            self.frames_in_flight
        );
        Ok(())
    }

    /// State of a handle's slot
    pub fn resource_state(&self, handle: impl Into<ResourceHandle>) -> SlotState {
        let handle = handle.into();
        match handle {
            ResourceHandle::Buffer(h) => self.buffers.state(h.0),
            ResourceHandle::Texture(h) => self.textures.state(h.0),
            ResourceHandle::TextureView(h) => self.texture_views.state(h.0),
            ResourceHandle::Shader(h) => self.shaders.state(h.0),
            ResourceHandle::ComputeShader(h) => self.compute_shaders.state(h.0),
        }
    }

    /// Frames left before a pending resource is destroyed
    pub fn deletion_countdown(&self, handle: impl Into<ResourceHandle>) -> Option<u32> {
        self.deletion_queue.remaining(handle.into())
    }

    /// Advance the deletion queue by `frames_elapsed` frames
    ///
    /// Called once per frame boundary. Returns the number of resources
    /// destroyed.
    pub fn tick_deletion_queue(&mut self, frames_elapsed: u32) -> usize {
        self.frame += u64::from(frames_elapsed);

        let expired = self.deletion_queue.process(frames_elapsed);
        let destroyed = expired.len();
        for handle in expired {
            self.destroy(handle);
        }

        self.dynamic_pool.recycle(self.frame, self.frames_in_flight);
        if destroyed > 0 {
            log::debug!("Frame {}: destroyed {} resources", self.frame, destroyed);
        }
        destroyed
    }

    fn destroy(&mut self, handle: ResourceHandle) {
        let index = handle.index();
        match handle {
            ResourceHandle::Buffer(_) => {
                if let Some(buffer) = self.buffers.release(index) {
                    self.device.destroy_buffer(buffer.native);
                }
            }
            ResourceHandle::Texture(texture) => {
                let views_alive = self
                    .texture_views
                    .iter()
                    .filter(|(view_index, view)| {
                        view.texture == texture && self.texture_views.state(*view_index) == SlotState::Live
                    })
                    .count();
                if views_alive > 0 {
                    log::warn!("Destroying {} with {} live views", texture, views_alive);
                }
                if let Some(resource) = self.textures.release(index) {
                    self.device.destroy_texture(resource.native);
                }
            }
            ResourceHandle::TextureView(_) => {
                if let Some(view) = self.texture_views.release(index) {
                    self.device.destroy_texture_view(view.native);
                }
            }
            ResourceHandle::Shader(_) => {
                if let Some(shader) = self.shaders.release(index) {
                    for variant in &shader.variants {
                        if self.variants.mark_pending(variant.0).is_ok() {
                            if let Some(variant) = self.variants.release(variant.0) {
                                self.device.destroy_pipeline(variant.pipeline);
                            }
                        }
                    }
                    self.device.destroy_pipeline_layout(shader.pipeline_layout);
                }
            }
            ResourceHandle::ComputeShader(_) => {
                if let Some(shader) = self.compute_shaders.release(index) {
                    self.device.destroy_pipeline(shader.pipeline);
                    self.device.destroy_pipeline_layout(shader.pipeline_layout);
                }
            }
        }
        log::debug!("Destroyed {}", handle);
    }

    /// Snapshot of table occupancy and cache sizes
    pub fn stats(&self) -> ResourceStats {
        ResourceStats {
            buffers: TableStats::of(&self.buffers),
            textures: TableStats::of(&self.textures),
            texture_views: TableStats::of(&self.texture_views),
            shaders: TableStats::of(&self.shaders),
            compute_shaders: TableStats::of(&self.compute_shaders),
            variants: self.variants.live_count(),
            pending_deletions: self.deletion_queue.len(),
            cached_layouts: self.layout_cache.len(),
            pipeline_compilations: self.compilations,
            staging_capacity: self.staging.capacity(),
            staging_resizes: self.staging.resize_count(),
            frame: self.frame,
        }
    }

    /// Wait for the device and destroy everything the manager owns
    ///
    /// Pending deletions are flushed immediately. Runs from `Drop` as well;
    /// calling it again is a no-op.
    pub fn shutdown(&mut self) -> ResourceResult<()> {
        if self.shut_down {
            return Ok(());
        }
        self.shut_down = true;

        let idle = self.device.wait_idle();
        if let Err(e) = &idle {
            log::error!("wait_idle failed during shutdown: {}", e);
        }

        let pending = self.deletion_queue.drain_all().len();
        let blocks = self.dynamic_pool.drain();
        let block_count = blocks.len();
        for block in blocks {
            if self.buffers.mark_pending(block.0).is_err() {
                continue;
            }
            if let Some(buffer) = self.buffers.release(block.0) {
                self.device.destroy_buffer(buffer.native);
            }
        }

        for (_, variant) in self.variants.drain() {
            self.device.destroy_pipeline(variant.pipeline);
        }
        for (_, shader) in self.shaders.drain() {
            self.device.destroy_pipeline_layout(shader.pipeline_layout);
        }
        for (_, shader) in self.compute_shaders.drain() {
            self.device.destroy_pipeline(shader.pipeline);
            self.device.destroy_pipeline_layout(shader.pipeline_layout);
        }
        for (_, view) in self.texture_views.drain() {
            self.device.destroy_texture_view(view.native);
        }
        for (_, texture) in self.textures.drain() {
            self.device.destroy_texture(texture.native);
        }
        for (_, buffer) in self.buffers.drain() {
            self.device.destroy_buffer(buffer.native);
        }
        for layout in self.layout_cache.drain() {
            self.device.destroy_bind_group_layout(layout);
        }
        self.staging.destroy(&mut self.device);

        log::info!(
            "ResourceManager shut down at frame {} ({} deletions flushed, {} dynamic blocks, {} pipelines compiled)",
            self.frame,
            pending,
            block_count,
            self.compilations
        );
        idle.map_err(ResourceError::from)
    }
}

impl<D: RenderDevice> Drop for ResourceManager<D> {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::error!("ResourceManager shutdown failed: {}", e);
        }
    }
}

fn check_bind_group_count(name: &str, groups: &[BindGroupLayoutDesc]) -> ResourceResult<()> {
    if groups.len() > MAX_BIND_GROUPS {
        log::error!("Shader '{}' declares {} bind groups", name, groups.len());
        return Err(ResourceError::TooManyBindGroups { count: groups.len() });
    }
    Ok(())
}

fn invalid(kind: ResourceKind, index: u32) -> ResourceError {
    ResourceError::InvalidHandle { kind, index }
}

fn expect_live(state: SlotState, kind: ResourceKind, index: u32) -> ResourceResult<()> {
    match state {
        SlotState::Live => Ok(()),
        SlotState::PendingDeletion => Err(ResourceError::AlreadyPendingDeletion { kind, index }),
        SlotState::Free => Err(invalid(kind, index)),
    }
}

/// Write `data` at `offset`, directly for mapped memory, staged otherwise
fn fill_buffer<D: RenderDevice>(
    device: &mut D,
    staging: &mut StagingBuffer<D::Buffer>,
    native: &D::Buffer,
    memory: MemoryLocation,
    offset: u64,
    data: &[u8],
) -> BackendResult<()> {
    let size = data.len() as u64;
    match memory {
        MemoryLocation::HostVisible => {
            let mapping = device
                .mapped_mut(native)
                .ok_or_else(|| BackendError::InvalidTransfer("host-visible buffer is not mapped".to_string()))?;
            let start = offset as usize;
            mapping[start..start + data.len()].copy_from_slice(data);
            device.flush_mapped(native, offset, size)
        }
        MemoryLocation::DeviceLocal => {
            staging.write(device, data)?;
            device.submit_transfer(
                staging.buffer(),
                TransferTarget::Buffer(native),
                &staging::buffer_upload_ops(offset, size),
            )
        }
    }
}

/// Stage `supplied` levels of `desc` and generate the rest
fn upload_texture_levels<D: RenderDevice>(
    device: &mut D,
    staging: &mut StagingBuffer<D::Buffer>,
    native: &D::Texture,
    desc: &TextureDesc,
    data: &[u8],
    supplied: u32,
    resting: ImageLayout,
) -> BackendResult<()> {
    staging.write(device, data)?;
    device.submit_transfer(
        staging.buffer(),
        TransferTarget::Texture(native),
        &staging::texture_upload_ops(desc, supplied, resting),
    )
}
