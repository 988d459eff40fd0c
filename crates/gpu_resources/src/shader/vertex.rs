//! Vertex input layout
//!
//! Shaders read one interleaved vertex stream at binding 0. Optional streams
//! (normals, UVs, colors) are selected per variant through the vertex stream
//! mask in [`crate::shader::state::GraphicsState`], not through extra bindings.

/// Attribute component format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    /// One `f32`
    Float,
    /// Two `f32`
    Float2,
    /// Three `f32`
    Float3,
    /// Four `f32`
    Float4,
    /// Four normalized `u8`
    Unorm8x4,
    /// One `u32`
    Uint,
}

impl VertexFormat {
    /// Size in bytes
    pub fn size(self) -> u32 {
        match self {
            Self::Float | Self::Unorm8x4 | Self::Uint => 4,
            Self::Float2 => 8,
            Self::Float3 => 12,
            Self::Float4 => 16,
        }
    }
}

/// One attribute in the vertex stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    /// Shader input location
    pub location: u32,
    /// Component format
    pub format: VertexFormat,
    /// Byte offset inside a vertex
    pub offset: u32,
}

/// Layout of the interleaved vertex stream
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexLayout {
    /// Bytes between consecutive vertices
    pub stride: u32,
    /// Attributes in location order
    pub attributes: Vec<VertexAttribute>,
}

impl VertexLayout {
    /// Layout with no vertex input (full-screen passes, vertex pulling)
    pub fn empty() -> Self {
        Self { stride: 0, attributes: Vec::new() }
    }

    /// Positions only, `vec3` at location 0
    pub fn position_only() -> Self {
        Self::empty().with_attribute(VertexFormat::Float3)
    }

    /// Append an attribute at the next location and offset
    pub fn with_attribute(mut self, format: VertexFormat) -> Self {
        let location = self.attributes.len() as u32;
        self.attributes.push(VertexAttribute { location, format, offset: self.stride });
        self.stride += format.size();
        self
    }
}

impl Default for VertexLayout {
    fn default() -> Self {
        Self::position_only()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attributes_are_packed() {
        let layout = VertexLayout::position_only()
            .with_attribute(VertexFormat::Float2)
            .with_attribute(VertexFormat::Unorm8x4);
        assert_eq!(layout.stride, 24);
        assert_eq!(layout.attributes[1].offset, 12);
        assert_eq!(layout.attributes[2].location, 2);
        assert_eq!(layout.attributes[2].offset, 20);
    }
}
