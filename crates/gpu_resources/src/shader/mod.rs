//! # Shader Module
//!
//! Shader programs, their bind group layouts and their lazily compiled
//! pipeline variants.
//!
//! ## Organization
//!
//! - **[`layout`]**: bind group layout descriptions
//! - **[`layout_cache`]**: structural deduplication of native layouts
//! - **[`state`]**: packed fixed-function state
//! - **[`variant`]**: variant keys and specialization constants
//! - **[`vertex`]**: vertex input layout
//!
//! A shader stores its bytecode; no pipeline exists until a variant is
//! requested for a concrete `(state, render pass, sample count)` key.
//! Compute shaders have no variants and compile their pipeline up front.

pub mod layout;
pub mod layout_cache;
pub mod state;
pub mod variant;
pub mod vertex;

use std::io::Cursor;

use crate::backend::BackendError;
use crate::resources::handle::VariantHandle;
use crate::shader::layout::BindGroupLayoutDesc;
use crate::shader::vertex::VertexLayout;

/// Maximum number of bind groups per shader
pub const MAX_BIND_GROUPS: usize = 4;

/// Description of a shader program
#[derive(Debug, Clone, Default)]
pub struct ShaderDesc {
    /// Debug label
    pub name: String,
    /// Vertex stage SPIR-V
    pub vertex_code: Vec<u8>,
    /// Pixel stage SPIR-V, `None` for depth-only programs
    pub pixel_code: Option<Vec<u8>>,
    /// Bind group layouts in set order
    pub bind_groups: Vec<BindGroupLayoutDesc>,
    /// Vertex input
    pub vertex_layout: VertexLayout,
}

impl ShaderDesc {
    /// Shader with a vertex and a pixel stage
    pub fn new(name: impl Into<String>, vertex_code: Vec<u8>, pixel_code: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            vertex_code,
            pixel_code: Some(pixel_code),
            ..Self::default()
        }
    }

    /// Shader with only a vertex stage
    pub fn vertex_only(name: impl Into<String>, vertex_code: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            vertex_code,
            ..Self::default()
        }
    }

    /// Append a bind group
    pub fn with_bind_group(mut self, layout: BindGroupLayoutDesc) -> Self {
        self.bind_groups.push(layout);
        self
    }

    /// Set the vertex input layout
    pub fn with_vertex_layout(mut self, vertex_layout: VertexLayout) -> Self {
        self.vertex_layout = vertex_layout;
        self
    }
}

/// Description of a compute program
#[derive(Debug, Clone, Default)]
pub struct ComputeShaderDesc {
    /// Debug label
    pub name: String,
    /// Compute stage SPIR-V
    pub code: Vec<u8>,
    /// Bind group layouts in set order
    pub bind_groups: Vec<BindGroupLayoutDesc>,
}

impl ComputeShaderDesc {
    /// Compute program without bind groups
    pub fn new(name: impl Into<String>, code: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            code,
            bind_groups: Vec::new(),
        }
    }

    /// Append a bind group
    pub fn with_bind_group(mut self, layout: BindGroupLayoutDesc) -> Self {
        self.bind_groups.push(layout);
        self
    }
}

/// A created compute shader with its compiled pipeline
#[derive(Debug)]
pub struct ComputeShaderResource<BL, PL, P> {
    /// Debug label
    pub name: String,
    /// Bind group descriptions in set order
    pub bind_group_descs: Vec<BindGroupLayoutDesc>,
    pub(crate) bind_group_layouts: Vec<BL>,
    pub(crate) pipeline_layout: PL,
    pub(crate) pipeline: P,
}

impl<BL: Copy, PL, P> ComputeShaderResource<BL, PL, P> {
    /// Native pipeline layout
    pub fn pipeline_layout(&self) -> &PL {
        &self.pipeline_layout
    }

    /// Native compute pipeline
    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    /// Native layout of bind group `index`
    pub fn bind_group_layout(&self, index: usize) -> Option<BL> {
        self.bind_group_layouts.get(index).copied()
    }
}

/// A created shader
#[derive(Debug)]
pub struct ShaderResource<BL, PL> {
    /// Debug label
    pub name: String,
    pub(crate) vertex_code: Vec<u32>,
    pub(crate) pixel_code: Option<Vec<u32>>,
    /// Bind group descriptions in set order
    pub bind_group_descs: Vec<BindGroupLayoutDesc>,
    pub(crate) bind_group_layouts: Vec<BL>,
    /// Vertex input
    pub vertex_layout: VertexLayout,
    pub(crate) pipeline_layout: PL,
    pub(crate) variants: Vec<VariantHandle>,
}

impl<BL: Copy, PL> ShaderResource<BL, PL> {
    /// Native pipeline layout
    pub fn pipeline_layout(&self) -> &PL {
        &self.pipeline_layout
    }

    /// Native layout of bind group `index`
    pub fn bind_group_layout(&self, index: usize) -> Option<BL> {
        self.bind_group_layouts.get(index).copied()
    }

    /// Variants compiled so far, in creation order
    pub fn variants(&self) -> &[VariantHandle] {
        &self.variants
    }
}

/// Reinterpret SPIR-V bytes as words, fixing up byte order from the magic number
pub fn spirv_words(bytes: &[u8]) -> Result<Vec<u32>, BackendError> {
    let words = ash::util::read_spv(&mut Cursor::new(bytes))
        .map_err(|e| BackendError::InvalidShaderCode(e.to_string()))?;
    if words.is_empty() {
        return Err(BackendError::InvalidShaderCode("empty bytecode".to_string()));
    }
    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spirv_bytes(words: &[u32]) -> Vec<u8> {
        words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    #[test]
    fn test_spirv_words() {
        let bytes = spirv_bytes(&[0x0723_0203, 0x0001_0000, 0, 1, 0]);
        let words = spirv_words(&bytes).unwrap();
        assert_eq!(words.len(), 5);
        assert_eq!(words[0], 0x0723_0203);
    }

    #[test]
    fn test_spirv_rejects_partial_word() {
        let mut bytes = spirv_bytes(&[0x0723_0203]);
        bytes.push(0);
        assert!(matches!(spirv_words(&bytes), Err(BackendError::InvalidShaderCode(_))));
        assert!(spirv_words(&[]).is_err());
    }
}
