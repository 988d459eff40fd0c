//! # Vulkan Backend
//!
//! [`RenderDevice`] implementation over an `ash` device created by the
//! application. The backend owns one transient command pool and one fence
//! for transfer submissions; it never destroys the device itself.
//!
//! ## Submission
//!
//! Every transfer is recorded into a fresh one-time command buffer,
//! submitted with the fence and waited on before returning. The staging
//! buffer can be overwritten as soon as `submit_transfer` returns.

pub mod buffer;
mod commands;
mod convert;
mod pipeline;
pub mod texture;

use ash::vk;

pub use buffer::VulkanBuffer;
pub use texture::{VulkanTexture, VulkanTextureView};

use crate::backend::{
    BackendError, BackendResult, BufferAllocInfo, ComputePipelineDesc, PipelineDesc, RenderDevice,
    TransferOp, TransferTarget,
};
use crate::resources::texture::{SamplerDesc, TextureDesc, TextureFormat, TextureViewDesc};
use crate::shader::layout::BindGroupLayoutDesc;

/// Vulkan device used by the resource manager
pub struct VulkanDevice {
    instance: ash::Instance,
    device: ash::Device,
    physical_device: vk::PhysicalDevice,
    queue: vk::Queue,
    command_pool: vk::CommandPool,
    fence: vk::Fence,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    non_coherent_atom_size: vk::DeviceSize,
    frames_in_flight: u32,
}

impl VulkanDevice {
    /// Wrap an existing device
    ///
    /// `queue` must belong to `queue_family_index` and support transfer and
    /// graphics operations. The instance and device must outlive the
    /// returned value.
    pub fn new(
        instance: ash::Instance,
        device: ash::Device,
        physical_device: vk::PhysicalDevice,
        queue: vk::Queue,
        queue_family_index: u32,
        frames_in_flight: u32,
    ) -> BackendResult<Self> {
        let pool_create_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::TRANSIENT)
            .queue_family_index(queue_family_index);

        let command_pool = unsafe { device.create_command_pool(&pool_create_info, None)? };

        let fence_info = vk::FenceCreateInfo::builder();
        let fence = match unsafe { device.create_fence(&fence_info, None) } {
            Ok(fence) => fence,
            Err(e) => {
                unsafe { device.destroy_command_pool(command_pool, None) };
                return Err(e.into());
            }
        };

        let memory_properties =
            unsafe { instance.get_physical_device_memory_properties(physical_device) };
        let properties = unsafe { instance.get_physical_device_properties(physical_device) };

        log::info!(
            "Vulkan resource device on '{}' ({} memory types, {} frames in flight)",
            device_name(&properties),
            memory_properties.memory_type_count,
            frames_in_flight
        );

        Ok(Self {
            instance,
            device,
            physical_device,
            queue,
            command_pool,
            fence,
            memory_properties,
            non_coherent_atom_size: properties.limits.non_coherent_atom_size,
            frames_in_flight,
        })
    }

    /// Underlying `ash` device
    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    fn submit_and_wait(&self, command_buffer: vk::CommandBuffer) -> BackendResult<()> {
        let command_buffers = [command_buffer];
        let submit_info = vk::SubmitInfo::builder().command_buffers(&command_buffers);

        unsafe {
            self.device.reset_fences(&[self.fence])?;
            self.device
                .queue_submit(self.queue, &[submit_info.build()], self.fence)?;
            self.device.wait_for_fences(&[self.fence], true, u64::MAX)?;
        }
        Ok(())
    }
}

fn device_name(properties: &vk::PhysicalDeviceProperties) -> String {
    let bytes: Vec<u8> = properties
        .device_name
        .iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c as u8)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

impl RenderDevice for VulkanDevice {
    type Buffer = VulkanBuffer;
    type Texture = VulkanTexture;
    type TextureView = VulkanTextureView;
    type BindGroupLayout = vk::DescriptorSetLayout;
    type PipelineLayout = vk::PipelineLayout;
    type Pipeline = vk::Pipeline;
    type RenderPass = vk::RenderPass;

    fn frames_in_flight(&self) -> u32 {
        self.frames_in_flight
    }

    fn create_buffer(&mut self, info: &BufferAllocInfo<'_>) -> BackendResult<VulkanBuffer> {
        buffer::create_buffer(&self.device, &self.memory_properties, info)
    }

    fn buffer_size(&self, buffer: &VulkanBuffer) -> u64 {
        buffer.size
    }

    fn mapped<'a>(&'a self, buffer: &VulkanBuffer) -> Option<&'a [u8]> {
        if !buffer.is_mapped() {
            return None;
        }
        // SAFETY: the mapping covers the whole allocation and lives until the buffer is destroyed
        Some(unsafe { std::slice::from_raw_parts(buffer.mapped, buffer.size as usize) })
    }

    fn mapped_mut<'a>(&'a mut self, buffer: &VulkanBuffer) -> Option<&'a mut [u8]> {
        if !buffer.is_mapped() {
            return None;
        }
        // SAFETY: as above; `&mut self` keeps other mapping borrows out
        Some(unsafe { std::slice::from_raw_parts_mut(buffer.mapped, buffer.size as usize) })
    }

    fn flush_mapped(&self, buffer: &VulkanBuffer, offset: u64, size: u64) -> BackendResult<()> {
        buffer::flush_range(&self.device, buffer, self.non_coherent_atom_size, offset, size)
    }

    fn destroy_buffer(&mut self, buffer: VulkanBuffer) {
        buffer::destroy_buffer(&self.device, buffer);
    }

    fn create_texture(&mut self, desc: &TextureDesc, mip_levels: u32) -> BackendResult<VulkanTexture> {
        texture::create_texture(&self.device, &self.memory_properties, desc, mip_levels)
    }

    fn supports_linear_blit(&self, format: TextureFormat) -> bool {
        texture::supports_linear_blit(&self.instance, self.physical_device, convert::format(format))
    }

    fn create_texture_view(
        &mut self,
        texture: &VulkanTexture,
        desc: &TextureViewDesc,
        sampler: &SamplerDesc,
    ) -> BackendResult<VulkanTextureView> {
        texture::create_view(&self.device, texture, desc, sampler)
    }

    fn destroy_texture(&mut self, texture: VulkanTexture) {
        texture::destroy_texture(&self.device, texture);
    }

    fn destroy_texture_view(&mut self, view: VulkanTextureView) {
        texture::destroy_view(&self.device, view);
    }

    fn create_bind_group_layout(
        &mut self,
        desc: &BindGroupLayoutDesc,
    ) -> BackendResult<vk::DescriptorSetLayout> {
        pipeline::create_descriptor_set_layout(&self.device, desc)
    }

    fn destroy_bind_group_layout(&mut self, layout: vk::DescriptorSetLayout) {
        unsafe { self.device.destroy_descriptor_set_layout(layout, None) };
    }

    fn create_pipeline_layout(
        &mut self,
        bind_groups: &[vk::DescriptorSetLayout],
    ) -> BackendResult<vk::PipelineLayout> {
        pipeline::create_pipeline_layout(&self.device, bind_groups)
    }

    fn destroy_pipeline_layout(&mut self, layout: vk::PipelineLayout) {
        unsafe { self.device.destroy_pipeline_layout(layout, None) };
    }

    fn create_pipeline(
        &mut self,
        desc: &PipelineDesc<'_, vk::PipelineLayout, vk::RenderPass>,
    ) -> BackendResult<vk::Pipeline> {
        pipeline::create_graphics_pipeline(&self.device, desc)
    }

    fn create_compute_pipeline(
        &mut self,
        desc: &ComputePipelineDesc<'_, vk::PipelineLayout>,
    ) -> BackendResult<vk::Pipeline> {
        pipeline::create_compute_pipeline(&self.device, desc)
    }

    fn destroy_pipeline(&mut self, pipeline: vk::Pipeline) {
        unsafe { self.device.destroy_pipeline(pipeline, None) };
    }

    fn submit_transfer(
        &mut self,
        staging: Option<&VulkanBuffer>,
        target: TransferTarget<'_, VulkanBuffer, VulkanTexture>,
        ops: &[TransferOp],
    ) -> BackendResult<()> {
        if ops.is_empty() {
            return Ok(());
        }

        let command_buffer_allocate_info = vk::CommandBufferAllocateInfo::builder()
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_pool(self.command_pool)
            .command_buffer_count(1);

        let command_buffer =
            unsafe { self.device.allocate_command_buffers(&command_buffer_allocate_info)? }[0];

        let begin_info =
            vk::CommandBufferBeginInfo::builder().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

        let result = unsafe { self.device.begin_command_buffer(command_buffer, &begin_info) }
            .map_err(BackendError::from)
            .and_then(|()| commands::record(&self.device, command_buffer, staging, target, ops))
            .and_then(|()| {
                unsafe { self.device.end_command_buffer(command_buffer) }.map_err(BackendError::from)
            })
            .and_then(|()| self.submit_and_wait(command_buffer));

        unsafe {
            self.device
                .free_command_buffers(self.command_pool, &[command_buffer]);
        }

        result
    }

    fn wait_idle(&mut self) -> BackendResult<()> {
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        unsafe {
            // Errors here are not recoverable during drop
            let _ = self.device.device_wait_idle();
            self.device.destroy_fence(self.fence, None);
            self.device.destroy_command_pool(self.command_pool, None);
        }
    }
}
