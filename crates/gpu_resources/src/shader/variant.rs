//! Shader variants
//!
//! A variant is one compiled pipeline of a shader for a specific
//! `(graphics state, render pass, sample count)` key. Variants are compiled on
//! first request and live until their shader is destroyed.

use bytemuck::{Pod, Zeroable};

use crate::resources::handle::ShaderHandle;
use crate::shader::state::GraphicsState;

/// Rasterization sample count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SampleCount {
    /// No multisampling
    #[default]
    X1,
    /// 2x MSAA
    X2,
    /// 4x MSAA
    X4,
    /// 8x MSAA
    X8,
    /// 16x MSAA
    X16,
}

impl SampleCount {
    /// Number of samples
    pub fn count(self) -> u32 {
        match self {
            Self::X1 => 1,
            Self::X2 => 2,
            Self::X4 => 4,
            Self::X8 => 8,
            Self::X16 => 16,
        }
    }
}

/// Specialization constant payload handed to every variant pipeline
///
/// Constant id `n` lives at byte offset `4 * n`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct SpecializationConstants {
    /// Vertex stream mask (constant 0)
    pub vertex_stream_mask: u32,
    /// Number of vertex streams present (constant 1)
    pub vertex_stream_count: u32,
    /// Material texture mask (constant 2)
    pub texture_flags: u32,
}

impl SpecializationConstants {
    /// Number of constants in the payload
    pub const COUNT: u32 = 3;

    /// Derive the payload from a graphics state
    pub fn from_state(state: GraphicsState) -> Self {
        let streams = state.vertex_streams().bits();
        Self {
            vertex_stream_mask: streams,
            vertex_stream_count: streams.count_ones(),
            texture_flags: state.texture_flags().bits(),
        }
    }

    /// Raw bytes of the payload
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }

    /// `(constant id, byte offset, byte size)` of every constant
    pub fn entries() -> impl Iterator<Item = (u32, u32, usize)> {
        (0..Self::COUNT).map(|id| (id, id * 4, std::mem::size_of::<u32>()))
    }
}

/// Lookup key of a variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VariantKey<P> {
    /// Fixed-function state
    pub state: GraphicsState,
    /// Render pass identity
    pub render_pass: P,
    /// Sample count
    pub sample_count: SampleCount,
}

/// A compiled variant
#[derive(Debug)]
pub struct ShaderVariant<L, P> {
    /// Shader the variant belongs to
    pub shader: ShaderHandle,
    /// Lookup key
    pub key: VariantKey<P>,
    pub(crate) pipeline: L,
}

impl<L, P> ShaderVariant<L, P> {
    /// Native pipeline
    pub fn pipeline(&self) -> &L {
        &self.pipeline
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::state::{MeshFormatFlags, ShaderTextureFlags};

    #[test]
    fn test_specialization_from_state() {
        let state = GraphicsState::default()
            .with_vertex_streams(
                MeshFormatFlags::HAS_POSITION | MeshFormatFlags::HAS_NORMAL | MeshFormatFlags::HAS_TEXCOORD_0,
            )
            .with_texture_flags(ShaderTextureFlags::BASE_COLOR);
        let constants = SpecializationConstants::from_state(state);
        assert_eq!(constants.vertex_stream_mask, 0b1011);
        assert_eq!(constants.vertex_stream_count, 3);
        assert_eq!(constants.texture_flags, 1);
    }

    #[test]
    fn test_payload_layout() {
        let constants = SpecializationConstants {
            vertex_stream_mask: 1,
            vertex_stream_count: 2,
            texture_flags: 3,
        };
        let bytes = constants.as_bytes();
        assert_eq!(bytes.len(), 12);
        let entries: Vec<_> = SpecializationConstants::entries().collect();
        assert_eq!(entries, vec![(0, 0, 4), (1, 4, 4), (2, 8, 4)]);
        assert_eq!(&bytes[4..8], &2u32.to_ne_bytes());
    }
}
