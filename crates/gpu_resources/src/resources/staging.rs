//! Staging Transfer Pipeline
//!
//! One growable, persistently mapped buffer that every upload goes through.
//! Uploads are synchronous: the data is copied into the mapping, the transfer
//! command list is submitted, and the call blocks until the device is done.
//! That also makes every resize a synchronization point, since no transfer
//! can still be reading the old allocation.
//!
//! ## Texture uploads
//!
//! ```text
//! all mips:          Undefined   -> TransferDst
//! supplied mips:     copy staging -> mip
//! for i in S..M:     mip i-1 TransferDst -> TransferSrc
//!                    blit mip i-1 -> mip i (half size, min 1)
//!                    mip i-1 TransferSrc -> resting layout
//! last mip:          TransferDst -> resting layout
//! ```

use crate::backend::{BackendResult, BufferAllocInfo, ImageLayout, RenderDevice, TransferOp};
use crate::resources::buffer::{BufferUsage, MemoryLocation};
use crate::resources::texture::TextureDesc;

/// The manager's staging buffer
#[derive(Debug)]
pub struct StagingBuffer<B> {
    buffer: Option<B>,
    capacity: u64,
    resize_count: u32,
}

impl<B> Default for StagingBuffer<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B> StagingBuffer<B> {
    /// Staging buffer with no allocation yet
    pub fn new() -> Self {
        Self {
            buffer: None,
            capacity: 0,
            resize_count: 0,
        }
    }

    /// Staging buffer with `capacity` bytes allocated up front (0 stays lazy)
    pub fn with_capacity<D>(device: &mut D, capacity: u64) -> BackendResult<Self>
    where
        D: RenderDevice<Buffer = B>,
    {
        let mut staging = Self::new();
        if capacity > 0 {
            staging.buffer = Some(allocate(device, capacity)?);
            staging.capacity = capacity;
        }
        Ok(staging)
    }

    /// Current capacity in bytes
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Number of times the buffer was reallocated to grow
    pub fn resize_count(&self) -> u32 {
        self.resize_count
    }

    /// Native buffer, if allocated
    pub fn buffer(&self) -> Option<&B> {
        self.buffer.as_ref()
    }

    /// Grow to `2 * size` if `size` does not fit; never shrinks
    pub fn ensure_capacity<D>(&mut self, device: &mut D, size: u64) -> BackendResult<()>
    where
        D: RenderDevice<Buffer = B>,
    {
        if size <= self.capacity && self.buffer.is_some() {
            return Ok(());
        }

        let new_capacity = size.saturating_mul(2).max(self.capacity);
        let replacement = allocate(device, new_capacity)?;
        if let Some(old) = self.buffer.replace(replacement) {
            device.destroy_buffer(old);
        }
        log::info!(
            "Staging buffer grown {} -> {} bytes for a {} byte upload",
            self.capacity,
            new_capacity,
            size
        );
        self.capacity = new_capacity;
        self.resize_count += 1;
        Ok(())
    }

    /// Copy `data` to the start of the staging buffer, growing it if needed
    pub fn write<D>(&mut self, device: &mut D, data: &[u8]) -> BackendResult<()>
    where
        D: RenderDevice<Buffer = B>,
    {
        if data.is_empty() {
            return Ok(());
        }
        let size = data.len() as u64;
        self.ensure_capacity(device, size)?;

        let Some(buffer) = self.buffer.as_ref() else {
            return Ok(());
        };
        match device.mapped_mut(buffer) {
            Some(mapping) => mapping[..data.len()].copy_from_slice(data),
            None => {
                return Err(crate::backend::BackendError::InvalidTransfer(
                    "staging buffer is not mapped".to_string(),
                ))
            }
        }
        device.flush_mapped(buffer, 0, size)
    }

    /// Release the native allocation
    pub fn destroy<D>(&mut self, device: &mut D)
    where
        D: RenderDevice<Buffer = B>,
    {
        if let Some(buffer) = self.buffer.take() {
            device.destroy_buffer(buffer);
        }
        self.capacity = 0;
    }
}

fn allocate<D: RenderDevice>(device: &mut D, size: u64) -> BackendResult<D::Buffer> {
    device.create_buffer(&BufferAllocInfo {
        size,
        usage: BufferUsage::Staging,
        memory: MemoryLocation::HostVisible,
        name: "staging",
    })
}

/// Ops copying `size` staged bytes into a buffer at `dst_offset`
pub fn buffer_upload_ops(dst_offset: u64, size: u64) -> Vec<TransferOp> {
    vec![TransferOp::CopyBuffer {
        src_offset: 0,
        dst_offset,
        size,
    }]
}

/// Ops uploading `supplied` staged mip levels of `desc` and generating the rest
///
/// `desc.mip_levels` must already be resolved. `supplied` is clamped to
/// `1..=desc.mip_levels`.
pub fn texture_upload_ops(desc: &TextureDesc, supplied: u32, resting: ImageLayout) -> Vec<TransferOp> {
    let mips = desc.mip_levels.max(1);
    let supplied = supplied.clamp(1, mips);
    let layers = desc.layers.max(1);
    let mut ops = Vec::with_capacity(2 + supplied as usize + 3 * (mips - supplied) as usize);

    ops.push(TransferOp::Transition {
        base_mip: 0,
        mip_count: mips,
        old: ImageLayout::Undefined,
        new: ImageLayout::TransferDst,
    });

    let mut offset = 0;
    for level in 0..supplied {
        ops.push(TransferOp::CopyBufferToImage {
            buffer_offset: offset,
            mip_level: level,
            base_layer: 0,
            layer_count: layers,
            extent: desc.extent.mip(level),
        });
        offset += desc.level_size(level);
    }

    if supplied == mips {
        ops.push(TransferOp::Transition {
            base_mip: 0,
            mip_count: mips,
            old: ImageLayout::TransferDst,
            new: resting,
        });
        return ops;
    }

    // only the last supplied level feeds the blit chain
    if supplied > 1 {
        ops.push(TransferOp::Transition {
            base_mip: 0,
            mip_count: supplied - 1,
            old: ImageLayout::TransferDst,
            new: resting,
        });
    }

    for level in supplied..mips {
        let src_mip = level - 1;
        ops.push(TransferOp::Transition {
            base_mip: src_mip,
            mip_count: 1,
            old: ImageLayout::TransferDst,
            new: ImageLayout::TransferSrc,
        });
        ops.push(TransferOp::Blit {
            src_mip,
            src_extent: desc.extent.mip(src_mip),
            dst_mip: level,
            dst_extent: desc.extent.mip(level),
            layer_count: layers,
        });
        ops.push(TransferOp::Transition {
            base_mip: src_mip,
            mip_count: 1,
            old: ImageLayout::TransferSrc,
            new: resting,
        });
    }

    ops.push(TransferOp::Transition {
        base_mip: mips - 1,
        mip_count: 1,
        old: ImageLayout::TransferDst,
        new: resting,
    });
    ops
}

/// Ops moving a texture without initial data into its resting layout
pub fn texture_init_ops(desc: &TextureDesc, resting: ImageLayout) -> Vec<TransferOp> {
    vec![TransferOp::Transition {
        base_mip: 0,
        mip_count: desc.mip_levels.max(1),
        old: ImageLayout::Undefined,
        new: resting,
    }]
}

/// Number of whole mip levels covered by `len` bytes of data
pub fn supplied_levels(desc: &TextureDesc, len: u64) -> u32 {
    let mut covered = 0;
    let mut total = 0;
    for level in 0..desc.mip_levels.max(1) {
        total += desc.level_size(level);
        if total > len {
            break;
        }
        covered = level + 1;
    }
    covered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessDevice;
    use crate::resources::texture::{Extent3D, TextureFormat};

    fn resolved(desc: TextureDesc) -> TextureDesc {
        let mip_levels = desc.resolved_mip_levels();
        TextureDesc { mip_levels, ..desc }
    }

    #[test]
    fn test_lazy_staging_grows_to_twice_request() {
        let mut device = HeadlessDevice::new(2);
        let mut staging = StagingBuffer::with_capacity(&mut device, 0).unwrap();
        assert_eq!(staging.capacity(), 0);
        assert!(staging.buffer().is_none());

        staging.write(&mut device, &[7u8; 64]).unwrap();
        assert_eq!(staging.capacity(), 128);
        staging.write(&mut device, &[1u8; 100]).unwrap();
        assert_eq!(staging.capacity(), 128);
        assert_eq!(staging.resize_count(), 1);
    }

    #[test]
    fn test_growth_destroys_old_allocation() {
        let mut device = HeadlessDevice::new(2);
        let mut staging = StagingBuffer::with_capacity(&mut device, 16).unwrap();
        staging.write(&mut device, &[0u8; 32]).unwrap();
        assert_eq!(staging.capacity(), 64);
        assert_eq!(device.counters().buffers_created, 2);
        assert_eq!(device.counters().buffers_destroyed, 1);

        let mapped = device.mapped(staging.buffer().unwrap()).unwrap();
        assert_eq!(&mapped[..32], &[0u8; 32]);
    }

    #[test]
    fn test_single_level_chain() {
        let desc = resolved(TextureDesc::new_2d(8, 8, TextureFormat::Rgba8Unorm));
        assert_eq!(desc.mip_levels, 4);
        let ops = texture_upload_ops(&desc, 1, ImageLayout::ShaderReadOnly);

        // initial transition, copy, three (to-src, blit, to-rest) rounds, last mip
        assert_eq!(ops.len(), 1 + 1 + 3 * 3 + 1);
        assert_eq!(
            ops[3],
            TransferOp::Blit {
                src_mip: 0,
                src_extent: Extent3D::new_2d(8, 8),
                dst_mip: 1,
                dst_extent: Extent3D::new_2d(4, 4),
                layer_count: 1,
            }
        );
        assert_eq!(
            ops.last(),
            Some(&TransferOp::Transition {
                base_mip: 3,
                mip_count: 1,
                old: ImageLayout::TransferDst,
                new: ImageLayout::ShaderReadOnly,
            })
        );
    }

    #[test]
    fn test_full_chain_supplied_skips_blits() {
        let desc = resolved(TextureDesc::new_2d(4, 4, TextureFormat::R8Unorm));
        let ops = texture_upload_ops(&desc, desc.mip_levels, ImageLayout::ShaderReadOnly);
        assert!(!ops.iter().any(|op| matches!(op, TransferOp::Blit { .. })));
        let offsets: Vec<u64> = ops
            .iter()
            .filter_map(|op| match op {
                TransferOp::CopyBufferToImage { buffer_offset, .. } => Some(*buffer_offset),
                _ => None,
            })
            .collect();
        assert_eq!(offsets, vec![0, 16, 20]);
    }

    #[test]
    fn test_supplied_levels() {
        let desc = resolved(TextureDesc::new_2d(4, 4, TextureFormat::R8Unorm));
        assert_eq!(supplied_levels(&desc, 15), 0);
        assert_eq!(supplied_levels(&desc, 16), 1);
        assert_eq!(supplied_levels(&desc, 20), 2);
        assert_eq!(supplied_levels(&desc, 21), 3);
    }
}
