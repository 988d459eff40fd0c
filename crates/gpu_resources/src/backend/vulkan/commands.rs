//! One-shot transfer command recording
//!
//! Translates a [`TransferOp`] list into barriers, copies and blits on a
//! single primary command buffer.

use ash::vk;

use crate::backend::vulkan::buffer::VulkanBuffer;
use crate::backend::vulkan::convert;
use crate::backend::vulkan::texture::VulkanTexture;
use crate::backend::{BackendError, BackendResult, TransferOp, TransferTarget};
use crate::resources::texture::Extent3D;

fn offset3d(extent: Extent3D) -> vk::Offset3D {
    vk::Offset3D {
        x: extent.width as i32,
        y: extent.height as i32,
        z: extent.depth.max(1) as i32,
    }
}

fn missing_staging() -> BackendError {
    BackendError::InvalidTransfer("copy recorded without a staging buffer".to_string())
}

/// Record `ops` into `command_buffer`
pub(crate) fn record(
    device: &ash::Device,
    command_buffer: vk::CommandBuffer,
    staging: Option<&VulkanBuffer>,
    target: TransferTarget<'_, VulkanBuffer, VulkanTexture>,
    ops: &[TransferOp],
) -> BackendResult<()> {
    match target {
        TransferTarget::Buffer(dst) => record_buffer(device, command_buffer, staging, dst, ops),
        TransferTarget::Texture(dst) => record_texture(device, command_buffer, staging, dst, ops),
    }
}

fn record_buffer(
    device: &ash::Device,
    command_buffer: vk::CommandBuffer,
    staging: Option<&VulkanBuffer>,
    dst: &VulkanBuffer,
    ops: &[TransferOp],
) -> BackendResult<()> {
    let mut regions = Vec::with_capacity(ops.len());
    for op in ops {
        match op {
            TransferOp::CopyBuffer {
                src_offset,
                dst_offset,
                size,
            } => regions.push(vk::BufferCopy {
                src_offset: *src_offset,
                dst_offset: *dst_offset,
                size: *size,
            }),
            other => {
                return Err(BackendError::InvalidTransfer(format!(
                    "{:?} cannot target a buffer",
                    other
                )))
            }
        }
    }
    if regions.is_empty() {
        return Ok(());
    }

    let src = staging.ok_or_else(missing_staging)?;

    // Make the copy visible to every later use of the buffer
    let barrier = vk::MemoryBarrier::builder()
        .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
        .dst_access_mask(vk::AccessFlags::MEMORY_READ);

    unsafe {
        device.cmd_copy_buffer(command_buffer, src.buffer, dst.buffer, &regions);
        device.cmd_pipeline_barrier(
            command_buffer,
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::ALL_COMMANDS,
            vk::DependencyFlags::empty(),
            &[barrier.build()],
            &[],
            &[],
        );
    }
    Ok(())
}

fn record_texture(
    device: &ash::Device,
    command_buffer: vk::CommandBuffer,
    staging: Option<&VulkanBuffer>,
    dst: &VulkanTexture,
    ops: &[TransferOp],
) -> BackendResult<()> {
    for op in ops {
        match *op {
            TransferOp::Transition {
                base_mip,
                mip_count,
                old,
                new,
            } => {
                let (src_access, src_stage) = convert::layout_access(old);
                let (dst_access, dst_stage) = convert::layout_access(new);

                let barrier = vk::ImageMemoryBarrier::builder()
                    .old_layout(convert::image_layout(old))
                    .new_layout(convert::image_layout(new))
                    .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .image(dst.image)
                    .subresource_range(vk::ImageSubresourceRange {
                        aspect_mask: dst.aspect,
                        base_mip_level: base_mip,
                        level_count: mip_count,
                        base_array_layer: 0,
                        layer_count: dst.layers,
                    })
                    .src_access_mask(src_access)
                    .dst_access_mask(dst_access);

                unsafe {
                    device.cmd_pipeline_barrier(
                        command_buffer,
                        src_stage,
                        dst_stage,
                        vk::DependencyFlags::empty(),
                        &[],
                        &[],
                        &[barrier.build()],
                    );
                }
            }
            TransferOp::CopyBufferToImage {
                buffer_offset,
                mip_level,
                base_layer,
                layer_count,
                extent,
            } => {
                let src = staging.ok_or_else(missing_staging)?;
                let aspect_mask = convert::copy_aspect(dst.aspect)?;

                let region = vk::BufferImageCopy::builder()
                    .buffer_offset(buffer_offset)
                    .buffer_row_length(0)
                    .buffer_image_height(0)
                    .image_subresource(vk::ImageSubresourceLayers {
                        aspect_mask,
                        mip_level,
                        base_array_layer: base_layer,
                        layer_count,
                    })
                    .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
                    .image_extent(vk::Extent3D {
                        width: extent.width,
                        height: extent.height,
                        depth: extent.depth.max(1),
                    });

                unsafe {
                    device.cmd_copy_buffer_to_image(
                        command_buffer,
                        src.buffer,
                        dst.image,
                        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                        &[region.build()],
                    );
                }
            }
            TransferOp::Blit {
                src_mip,
                src_extent,
                dst_mip,
                dst_extent,
                layer_count,
            } => {
                let aspect_mask = convert::copy_aspect(dst.aspect)?;
                let blit = vk::ImageBlit::builder()
                    .src_offsets([vk::Offset3D { x: 0, y: 0, z: 0 }, offset3d(src_extent)])
                    .src_subresource(vk::ImageSubresourceLayers {
                        aspect_mask,
                        mip_level: src_mip,
                        base_array_layer: 0,
                        layer_count,
                    })
                    .dst_offsets([vk::Offset3D { x: 0, y: 0, z: 0 }, offset3d(dst_extent)])
                    .dst_subresource(vk::ImageSubresourceLayers {
                        aspect_mask,
                        mip_level: dst_mip,
                        base_array_layer: 0,
                        layer_count,
                    });

                unsafe {
                    device.cmd_blit_image(
                        command_buffer,
                        dst.image,
                        vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                        dst.image,
                        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                        &[blit.build()],
                        vk::Filter::LINEAR,
                    );
                }
            }
            TransferOp::CopyBuffer { .. } => {
                return Err(BackendError::InvalidTransfer(
                    "buffer copy cannot target a texture".to_string(),
                ))
            }
        }
    }
    Ok(())
}
