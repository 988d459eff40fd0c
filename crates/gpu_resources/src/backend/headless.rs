//! Headless backend
//!
//! A [`RenderDevice`] that keeps all memory on the CPU. Transfers execute
//! immediately and are validated against the layouts each mip level is in,
//! so a malformed op list fails the same way a validation layer would flag
//! it. Every native object creation and destruction is counted.

use std::collections::{HashMap, HashSet};

use crate::backend::{
    BackendError, BackendResult, BufferAllocInfo, ComputePipelineDesc, ImageLayout, PipelineDesc,
    RenderDevice, TransferOp, TransferTarget,
};
use crate::resources::buffer::MemoryLocation;
use crate::resources::texture::{Extent3D, SamplerDesc, TextureDesc, TextureFormat, TextureViewDesc};
use crate::shader::layout::BindGroupLayoutDesc;
use crate::shader::state::GraphicsState;
use crate::shader::variant::{SampleCount, SpecializationConstants};

const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Allocation granularity of headless buffers
pub const BUFFER_ALIGNMENT: u64 = 256;

/// Native object counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeadlessCounters {
    /// Buffers allocated
    pub buffers_created: u32,
    /// Buffers destroyed
    pub buffers_destroyed: u32,
    /// Textures allocated
    pub textures_created: u32,
    /// Textures destroyed
    pub textures_destroyed: u32,
    /// Views allocated
    pub views_created: u32,
    /// Views destroyed
    pub views_destroyed: u32,
    /// Bind group layouts built
    pub bind_group_layouts_created: u32,
    /// Bind group layouts destroyed
    pub bind_group_layouts_destroyed: u32,
    /// Pipeline layouts built
    pub pipeline_layouts_created: u32,
    /// Pipeline layouts destroyed
    pub pipeline_layouts_destroyed: u32,
    /// Pipelines compiled
    pub pipelines_compiled: u32,
    /// Pipelines destroyed
    pub pipelines_destroyed: u32,
    /// Compute pipelines compiled
    pub compute_pipelines_compiled: u32,
    /// Compute pipelines destroyed
    pub compute_pipelines_destroyed: u32,
    /// Transfer submissions executed
    pub transfers_submitted: u32,
}

/// Headless buffer
#[derive(Debug, PartialEq, Eq)]
pub struct HeadlessBuffer {
    id: u64,
    size: u64,
    host_visible: bool,
}

impl HeadlessBuffer {
    /// Unique object id
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Headless texture
#[derive(Debug, PartialEq, Eq)]
pub struct HeadlessTexture {
    id: u64,
}

impl HeadlessTexture {
    /// Unique object id
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Headless texture view
#[derive(Debug, PartialEq, Eq)]
pub struct HeadlessTextureView {
    id: u64,
    texture: u64,
}

impl HeadlessTextureView {
    /// Unique object id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Id of the texture the view was created over
    pub fn texture_id(&self) -> u64 {
        self.texture
    }
}

/// Headless bind group layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeadlessBindGroupLayout(u64);

/// Headless pipeline layout
#[derive(Debug, PartialEq, Eq)]
pub struct HeadlessPipelineLayout {
    id: u64,
    bind_groups: Vec<HeadlessBindGroupLayout>,
}

impl HeadlessPipelineLayout {
    /// Unique object id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Bind group layouts in set order
    pub fn bind_groups(&self) -> &[HeadlessBindGroupLayout] {
        &self.bind_groups
    }
}

/// Headless pipeline, remembers what it was compiled with
#[derive(Debug, PartialEq, Eq)]
pub struct HeadlessPipeline {
    /// Unique pipeline id
    pub id: u64,
    /// State compiled in
    pub state: GraphicsState,
    /// Render pass compiled against
    pub render_pass: u64,
    /// Sample count compiled with
    pub sample_count: SampleCount,
    /// Specialization payload compiled with
    pub specialization: SpecializationConstants,
    /// Compute pipeline; the graphics fields hold their defaults
    pub compute: bool,
}

/// One executed transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRecord {
    /// Id of the destination object
    pub target: u64,
    /// Ops in submission order
    pub ops: Vec<TransferOp>,
}

#[derive(Debug)]
struct ImageState {
    desc: TextureDesc,
    layouts: Vec<ImageLayout>,
    levels: Vec<Option<Vec<u8>>>,
}

/// In-memory render device
#[derive(Debug)]
pub struct HeadlessDevice {
    frames_in_flight: u32,
    next_id: u64,
    memory: HashMap<u64, Vec<u8>>,
    images: HashMap<u64, ImageState>,
    live_pipelines: HashSet<u64>,
    no_linear_blit: HashSet<TextureFormat>,
    transfers: Vec<TransferRecord>,
    counters: HeadlessCounters,
}

impl HeadlessDevice {
    /// Create a device with `frames_in_flight` frames of latency
    pub fn new(frames_in_flight: u32) -> Self {
        let no_linear_blit = [
            TextureFormat::R32Uint,
            TextureFormat::R32Float,
            TextureFormat::Rg32Float,
            TextureFormat::Rgba32Float,
            TextureFormat::D16Unorm,
            TextureFormat::D32Float,
            TextureFormat::D24UnormS8Uint,
            TextureFormat::D32FloatS8Uint,
        ]
        .into_iter()
        .collect();

        Self {
            frames_in_flight,
            next_id: 1,
            memory: HashMap::new(),
            images: HashMap::new(),
            live_pipelines: HashSet::new(),
            no_linear_blit,
            transfers: Vec::new(),
            counters: HeadlessCounters::default(),
        }
    }

    /// Mark `format` as unable to do linear blits
    pub fn disable_linear_blit(&mut self, format: TextureFormat) {
        self.no_linear_blit.insert(format);
    }

    /// Creation/destruction counters
    pub fn counters(&self) -> HeadlessCounters {
        self.counters
    }

    /// Every transfer executed so far
    pub fn transfers(&self) -> &[TransferRecord] {
        &self.transfers
    }

    /// Contents of any buffer, mapped or not
    pub fn buffer_contents(&self, buffer: &HeadlessBuffer) -> Option<&[u8]> {
        self.memory.get(&buffer.id).map(Vec::as_slice)
    }

    /// Layout of each mip level of a texture
    pub fn texture_layouts(&self, texture: &HeadlessTexture) -> Option<&[ImageLayout]> {
        self.images.get(&texture.id).map(|image| image.layouts.as_slice())
    }

    /// Bytes copied into a mip level, `None` if the level was never copied to
    pub fn texture_level(&self, texture: &HeadlessTexture, level: u32) -> Option<&[u8]> {
        self.images.get(&texture.id)?.levels.get(level as usize)?.as_deref()
    }

    /// Number of pipelines not yet destroyed
    pub fn live_pipeline_count(&self) -> usize {
        self.live_pipelines.len()
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn check_code(code: &[u32], stage: &str) -> BackendResult<()> {
        match code.first() {
            Some(&SPIRV_MAGIC) => Ok(()),
            Some(word) => Err(BackendError::InvalidShaderCode(format!(
                "{} stage starts with {:#010x}, not the SPIR-V magic",
                stage, word
            ))),
            None => Err(BackendError::InvalidShaderCode(format!("{} stage is empty", stage))),
        }
    }

    fn execute(
        &mut self,
        staging: Option<&HeadlessBuffer>,
        target: &TransferTarget<'_, HeadlessBuffer, HeadlessTexture>,
        op: &TransferOp,
    ) -> BackendResult<()> {
        match (op, target) {
            (TransferOp::CopyBuffer { src_offset, dst_offset, size }, TransferTarget::Buffer(dst)) => {
                let src = self.staged(staging, *src_offset, *size)?;
                if dst_offset + size > dst.size {
                    return Err(invalid(format!(
                        "copy of {} bytes at {} overruns buffer of {}",
                        size, dst_offset, dst.size
                    )));
                }
                let memory = self
                    .memory
                    .get_mut(&dst.id)
                    .ok_or_else(|| invalid("destination buffer was destroyed".to_string()))?;
                memory[*dst_offset as usize..(dst_offset + size) as usize].copy_from_slice(&src);
                Ok(())
            }
            (
                TransferOp::CopyBufferToImage { buffer_offset, mip_level, base_layer, layer_count, extent },
                TransferTarget::Texture(dst),
            ) => {
                let image = self.image(dst.id)?;
                if image.desc.format.has_stencil() {
                    return Err(invalid(format!(
                        "copy into combined depth/stencil format {}",
                        image.desc.format
                    )));
                }
                let expected = image.desc.extent.mip(*mip_level);
                if *extent != expected {
                    return Err(invalid(format!(
                        "copy extent {:?} does not match mip {} extent {:?}",
                        extent, mip_level, expected
                    )));
                }
                if base_layer + layer_count > image.desc.layers.max(1) {
                    return Err(invalid("copy layers out of range".to_string()));
                }
                Self::expect_layout(image, *mip_level, ImageLayout::TransferDst)?;
                let size = extent.texel_count()
                    * u64::from(*layer_count)
                    * u64::from(image.desc.format.bytes_per_texel());
                let bytes = self.staged(staging, *buffer_offset, size)?;
                let image = self.image_mut(dst.id)?;
                image.levels[*mip_level as usize] = Some(bytes);
                Ok(())
            }
            (TransferOp::Transition { base_mip, mip_count, old, new }, TransferTarget::Texture(dst)) => {
                let image = self.image_mut(dst.id)?;
                if base_mip + mip_count > image.layouts.len() as u32 {
                    return Err(invalid("transition mip range out of bounds".to_string()));
                }
                for level in *base_mip..base_mip + mip_count {
                    let current = image.layouts[level as usize];
                    if *old != ImageLayout::Undefined && current != *old {
                        return Err(invalid(format!(
                            "mip {} is in {:?}, barrier expected {:?}",
                            level, current, old
                        )));
                    }
                    image.layouts[level as usize] = *new;
                }
                Ok(())
            }
            (
                TransferOp::Blit { src_mip, src_extent, dst_mip, dst_extent, .. },
                TransferTarget::Texture(dst),
            ) => {
                let image = self.image(dst.id)?;
                if self.no_linear_blit.contains(&image.desc.format) {
                    return Err(invalid(format!("{} cannot be linearly blitted", image.desc.format)));
                }
                Self::expect_layout(image, *src_mip, ImageLayout::TransferSrc)?;
                Self::expect_layout(image, *dst_mip, ImageLayout::TransferDst)?;
                if *src_extent != image.desc.extent.mip(*src_mip)
                    || *dst_extent != image.desc.extent.mip(*dst_mip)
                {
                    return Err(invalid("blit extents do not match mip levels".to_string()));
                }
                let src = image.levels[*src_mip as usize]
                    .as_deref()
                    .ok_or_else(|| invalid(format!("blit from uninitialized mip {}", src_mip)))?;
                let generated = downsample(
                    src,
                    *src_extent,
                    *dst_extent,
                    image.desc.layers.max(1),
                    image.desc.format.bytes_per_texel(),
                );
                let image = self.image_mut(dst.id)?;
                image.levels[*dst_mip as usize] = Some(generated);
                Ok(())
            }
            (op, _) => Err(invalid(format!("{:?} does not apply to this target", op))),
        }
    }

    fn staged(&self, staging: Option<&HeadlessBuffer>, offset: u64, size: u64) -> BackendResult<Vec<u8>> {
        let staging = staging.ok_or_else(|| invalid("copy without a staging buffer".to_string()))?;
        let memory = self
            .memory
            .get(&staging.id)
            .ok_or_else(|| invalid("staging buffer was destroyed".to_string()))?;
        if offset + size > memory.len() as u64 {
            return Err(invalid(format!(
                "staging read {}..{} overruns {} bytes",
                offset,
                offset + size,
                memory.len()
            )));
        }
        Ok(memory[offset as usize..(offset + size) as usize].to_vec())
    }

    fn image(&self, id: u64) -> BackendResult<&ImageState> {
        self.images
            .get(&id)
            .ok_or_else(|| invalid("texture was destroyed".to_string()))
    }

    fn image_mut(&mut self, id: u64) -> BackendResult<&mut ImageState> {
        self.images
            .get_mut(&id)
            .ok_or_else(|| invalid("texture was destroyed".to_string()))
    }

    fn expect_layout(image: &ImageState, level: u32, expected: ImageLayout) -> BackendResult<()> {
        match image.layouts.get(level as usize) {
            Some(layout) if *layout == expected => Ok(()),
            Some(layout) => Err(invalid(format!(
                "mip {} is in {:?}, expected {:?}",
                level, layout, expected
            ))),
            None => Err(invalid(format!("mip {} out of range", level))),
        }
    }
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new(2)
    }
}

fn invalid(reason: String) -> BackendError {
    BackendError::InvalidTransfer(reason)
}

/// Point-sampled 2:1 reduction, standing in for the linear blit
fn downsample(src: &[u8], src_extent: Extent3D, dst_extent: Extent3D, layers: u32, bpp: u32) -> Vec<u8> {
    let bpp = bpp as usize;
    let src_layer = src_extent.texel_count() as usize * bpp;
    let mut out = Vec::with_capacity(dst_extent.texel_count() as usize * bpp * layers as usize);
    for layer in 0..layers as usize {
        for z in 0..dst_extent.depth {
            for y in 0..dst_extent.height {
                for x in 0..dst_extent.width {
                    let sx = (x * 2).min(src_extent.width - 1) as usize;
                    let sy = (y * 2).min(src_extent.height - 1) as usize;
                    let sz = (z * 2).min(src_extent.depth - 1) as usize;
                    let texel = (sz * src_extent.height as usize + sy) * src_extent.width as usize + sx;
                    let start = layer * src_layer + texel * bpp;
                    out.extend_from_slice(&src[start..start + bpp]);
                }
            }
        }
    }
    out
}

fn align_up(size: u64, alignment: u64) -> u64 {
    size.div_ceil(alignment).max(1) * alignment
}

impl RenderDevice for HeadlessDevice {
    type Buffer = HeadlessBuffer;
    type Texture = HeadlessTexture;
    type TextureView = HeadlessTextureView;
    type BindGroupLayout = HeadlessBindGroupLayout;
    type PipelineLayout = HeadlessPipelineLayout;
    type Pipeline = HeadlessPipeline;
    type RenderPass = u64;

    fn frames_in_flight(&self) -> u32 {
        self.frames_in_flight
    }

    fn create_buffer(&mut self, info: &BufferAllocInfo<'_>) -> BackendResult<HeadlessBuffer> {
        let id = self.allocate_id();
        let size = align_up(info.size, BUFFER_ALIGNMENT);
        self.memory.insert(id, vec![0; size as usize]);
        self.counters.buffers_created += 1;
        Ok(HeadlessBuffer {
            id,
            size,
            host_visible: info.memory == MemoryLocation::HostVisible,
        })
    }

    fn buffer_size(&self, buffer: &HeadlessBuffer) -> u64 {
        buffer.size
    }

    fn mapped<'a>(&'a self, buffer: &HeadlessBuffer) -> Option<&'a [u8]> {
        if !buffer.host_visible {
            return None;
        }
        self.memory.get(&buffer.id).map(Vec::as_slice)
    }

    fn mapped_mut<'a>(&'a mut self, buffer: &HeadlessBuffer) -> Option<&'a mut [u8]> {
        if !buffer.host_visible {
            return None;
        }
        self.memory.get_mut(&buffer.id).map(Vec::as_mut_slice)
    }

    fn flush_mapped(&self, buffer: &HeadlessBuffer, offset: u64, size: u64) -> BackendResult<()> {
        if offset + size > buffer.size {
            return Err(invalid(format!(
                "flush {}..{} overruns buffer of {}",
                offset,
                offset + size,
                buffer.size
            )));
        }
        Ok(())
    }

    fn destroy_buffer(&mut self, buffer: HeadlessBuffer) {
        self.memory.remove(&buffer.id);
        self.counters.buffers_destroyed += 1;
    }

    fn create_texture(&mut self, desc: &TextureDesc, mip_levels: u32) -> BackendResult<HeadlessTexture> {
        let id = self.allocate_id();
        let mip_levels = mip_levels.max(1) as usize;
        self.images.insert(
            id,
            ImageState {
                desc: TextureDesc { mip_levels: mip_levels as u32, ..desc.clone() },
                layouts: vec![ImageLayout::Undefined; mip_levels],
                levels: vec![None; mip_levels],
            },
        );
        self.counters.textures_created += 1;
        Ok(HeadlessTexture { id })
    }

    fn supports_linear_blit(&self, format: TextureFormat) -> bool {
        !self.no_linear_blit.contains(&format)
    }

    fn create_texture_view(
        &mut self,
        texture: &HeadlessTexture,
        _desc: &TextureViewDesc,
        _sampler: &SamplerDesc,
    ) -> BackendResult<HeadlessTextureView> {
        if !self.images.contains_key(&texture.id) {
            return Err(invalid("view over a destroyed texture".to_string()));
        }
        let id = self.allocate_id();
        self.counters.views_created += 1;
        Ok(HeadlessTextureView { id, texture: texture.id })
    }

    fn destroy_texture(&mut self, texture: HeadlessTexture) {
        self.images.remove(&texture.id);
        self.counters.textures_destroyed += 1;
    }

    fn destroy_texture_view(&mut self, _view: HeadlessTextureView) {
        self.counters.views_destroyed += 1;
    }

    fn create_bind_group_layout(
        &mut self,
        _desc: &BindGroupLayoutDesc,
    ) -> BackendResult<HeadlessBindGroupLayout> {
        self.counters.bind_group_layouts_created += 1;
        Ok(HeadlessBindGroupLayout(self.allocate_id()))
    }

    fn destroy_bind_group_layout(&mut self, _layout: HeadlessBindGroupLayout) {
        self.counters.bind_group_layouts_destroyed += 1;
    }

    fn create_pipeline_layout(
        &mut self,
        bind_groups: &[HeadlessBindGroupLayout],
    ) -> BackendResult<HeadlessPipelineLayout> {
        self.counters.pipeline_layouts_created += 1;
        Ok(HeadlessPipelineLayout {
            id: self.allocate_id(),
            bind_groups: bind_groups.to_vec(),
        })
    }

    fn destroy_pipeline_layout(&mut self, _layout: HeadlessPipelineLayout) {
        self.counters.pipeline_layouts_destroyed += 1;
    }

    fn create_pipeline(
        &mut self,
        desc: &PipelineDesc<'_, HeadlessPipelineLayout, u64>,
    ) -> BackendResult<HeadlessPipeline> {
        Self::check_code(desc.vertex_code, "vertex")?;
        if let Some(pixel) = desc.pixel_code {
            Self::check_code(pixel, "pixel")?;
        }
        let id = self.allocate_id();
        self.live_pipelines.insert(id);
        self.counters.pipelines_compiled += 1;
        log::trace!("Headless pipeline {} compiled for {}", id, desc.name);
        Ok(HeadlessPipeline {
            id,
            state: desc.state,
            render_pass: desc.render_pass,
            sample_count: desc.sample_count,
            specialization: desc.specialization,
            compute: false,
        })
    }

    fn create_compute_pipeline(
        &mut self,
        desc: &ComputePipelineDesc<'_, HeadlessPipelineLayout>,
    ) -> BackendResult<HeadlessPipeline> {
        Self::check_code(desc.code, "compute")?;
        let id = self.allocate_id();
        self.live_pipelines.insert(id);
        self.counters.compute_pipelines_compiled += 1;
        log::trace!("Headless compute pipeline {} compiled for {}", id, desc.name);
        Ok(HeadlessPipeline {
            id,
            state: GraphicsState::default(),
            render_pass: 0,
            sample_count: SampleCount::X1,
            specialization: SpecializationConstants::from_state(GraphicsState::default()),
            compute: true,
        })
    }

    fn destroy_pipeline(&mut self, pipeline: HeadlessPipeline) {
        self.live_pipelines.remove(&pipeline.id);
        if pipeline.compute {
            self.counters.compute_pipelines_destroyed += 1;
        } else {
            self.counters.pipelines_destroyed += 1;
        }
    }

    fn submit_transfer(
        &mut self,
        staging: Option<&HeadlessBuffer>,
        target: TransferTarget<'_, HeadlessBuffer, HeadlessTexture>,
        ops: &[TransferOp],
    ) -> BackendResult<()> {
        for op in ops {
            self.execute(staging, &target, op)?;
        }
        let target_id = match target {
            TransferTarget::Buffer(buffer) => buffer.id,
            TransferTarget::Texture(texture) => texture.id,
        };
        self.transfers.push(TransferRecord { target: target_id, ops: ops.to_vec() });
        self.counters.transfers_submitted += 1;
        Ok(())
    }

    fn wait_idle(&mut self) -> BackendResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::buffer::BufferUsage;

    fn alloc(device: &mut HeadlessDevice, size: u64, memory: MemoryLocation) -> HeadlessBuffer {
        device
            .create_buffer(&BufferAllocInfo { size, usage: BufferUsage::Vertex, memory, name: "test" })
            .unwrap()
    }

    #[test]
    fn test_buffers_are_aligned() {
        let mut device = HeadlessDevice::new(2);
        let buffer = alloc(&mut device, 10, MemoryLocation::DeviceLocal);
        assert_eq!(device.buffer_size(&buffer), 256);
        assert!(device.mapped(&buffer).is_none());
    }

    #[test]
    fn test_copy_buffer() {
        let mut device = HeadlessDevice::new(2);
        let staging = alloc(&mut device, 16, MemoryLocation::HostVisible);
        let target = alloc(&mut device, 16, MemoryLocation::DeviceLocal);
        device.mapped_mut(&staging).unwrap()[..4].copy_from_slice(&[1, 2, 3, 4]);

        device
            .submit_transfer(
                Some(&staging),
                TransferTarget::Buffer(&target),
                &[TransferOp::CopyBuffer { src_offset: 0, dst_offset: 8, size: 4 }],
            )
            .unwrap();
        assert_eq!(&device.buffer_contents(&target).unwrap()[8..12], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_copy_requires_transfer_dst_layout() {
        let mut device = HeadlessDevice::new(2);
        let staging = alloc(&mut device, 64, MemoryLocation::HostVisible);
        let desc = TextureDesc::new_2d(4, 4, TextureFormat::Rgba8Unorm);
        let texture = device.create_texture(&desc, 1).unwrap();

        let result = device.submit_transfer(
            Some(&staging),
            TransferTarget::Texture(&texture),
            &[TransferOp::CopyBufferToImage {
                buffer_offset: 0,
                mip_level: 0,
                base_layer: 0,
                layer_count: 1,
                extent: Extent3D::new_2d(4, 4),
            }],
        );
        assert!(matches!(result, Err(BackendError::InvalidTransfer(_))));
    }

    #[test]
    fn test_transition_checks_old_layout() {
        let mut device = HeadlessDevice::new(2);
        let desc = TextureDesc::new_2d(4, 4, TextureFormat::Rgba8Unorm);
        let texture = device.create_texture(&desc, 3).unwrap();

        let result = device.submit_transfer(
            None,
            TransferTarget::Texture(&texture),
            &[TransferOp::Transition {
                base_mip: 0,
                mip_count: 3,
                old: ImageLayout::TransferSrc,
                new: ImageLayout::ShaderReadOnly,
            }],
        );
        assert!(result.is_err());

        device
            .submit_transfer(
                None,
                TransferTarget::Texture(&texture),
                &[TransferOp::Transition {
                    base_mip: 0,
                    mip_count: 3,
                    old: ImageLayout::Undefined,
                    new: ImageLayout::ShaderReadOnly,
                }],
            )
            .unwrap();
        assert_eq!(
            device.texture_layouts(&texture).unwrap(),
            &[ImageLayout::ShaderReadOnly; 3]
        );
    }

    #[test]
    fn test_pipeline_rejects_bad_code() {
        let mut device = HeadlessDevice::new(2);
        let layout = device.create_pipeline_layout(&[]).unwrap();
        let vertex_layout = crate::shader::vertex::VertexLayout::default();
        let code = [0xdead_beef_u32];
        let desc = PipelineDesc {
            vertex_code: &code,
            pixel_code: None,
            layout: &layout,
            vertex_layout: &vertex_layout,
            state: GraphicsState::default(),
            render_pass: 0,
            sample_count: SampleCount::X1,
            specialization: SpecializationConstants::from_state(GraphicsState::default()),
            name: "bad",
        };
        assert!(matches!(device.create_pipeline(&desc), Err(BackendError::InvalidShaderCode(_))));
        assert_eq!(device.counters().pipelines_compiled, 0);
    }

    #[test]
    fn test_compute_pipelines_are_counted_apart() {
        let mut device = HeadlessDevice::new(2);
        let layout = device.create_pipeline_layout(&[]).unwrap();
        let code = [SPIRV_MAGIC, 0x0001_0000, 0, 1, 0];
        let desc = ComputePipelineDesc { code: &code, layout: &layout, name: "cull" };

        let pipeline = device.create_compute_pipeline(&desc).unwrap();
        assert!(pipeline.compute);
        assert_eq!(device.live_pipeline_count(), 1);
        device.destroy_pipeline(pipeline);

        let counters = device.counters();
        assert_eq!(counters.compute_pipelines_compiled, 1);
        assert_eq!(counters.compute_pipelines_destroyed, 1);
        assert_eq!(counters.pipelines_destroyed, 0);
        assert_eq!(device.live_pipeline_count(), 0);

        let bad = [0u32; 4];
        let desc = ComputePipelineDesc { code: &bad, layout: &layout, name: "bad" };
        assert!(matches!(device.create_compute_pipeline(&desc), Err(BackendError::InvalidShaderCode(_))));
    }
}
