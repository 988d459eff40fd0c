//! Texture, texture view and sampler descriptors
//!
//! Texel data handed to the manager is tightly packed, mip-major: every layer
//! of mip 0, then every layer of mip 1, and so on.

use crate::backend::ImageLayout;
use crate::resources::handle::TextureHandle;

/// Texture dimensions in texels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Extent3D {
    /// Width
    pub width: u32,
    /// Height
    pub height: u32,
    /// Depth (1 for 2D textures)
    pub depth: u32,
}

impl Extent3D {
    /// Create an extent
    pub const fn new(width: u32, height: u32, depth: u32) -> Self {
        Self { width, height, depth }
    }

    /// Create a 2D extent
    pub const fn new_2d(width: u32, height: u32) -> Self {
        Self::new(width, height, 1)
    }

    /// Extent of mip `level`: every dimension halved per level, never below 1
    pub fn mip(self, level: u32) -> Self {
        let shrink = |v: u32| v.checked_shr(level).unwrap_or(0).max(1);
        Self::new(shrink(self.width), shrink(self.height), shrink(self.depth))
    }

    /// Number of texels
    pub fn texel_count(self) -> u64 {
        u64::from(self.width) * u64::from(self.height) * u64::from(self.depth)
    }
}

/// Number of levels in a full mip chain: `floor(log2(max(w, h, d))) + 1`
pub fn full_mip_count(extent: Extent3D) -> u32 {
    let largest = extent.width.max(extent.height).max(extent.depth).max(1);
    u32::BITS - largest.leading_zeros()
}

/// Pixel formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// 8-bit single channel
    R8Unorm,
    /// 8-bit two channels
    Rg8Unorm,
    /// 8-bit RGBA
    Rgba8Unorm,
    /// 8-bit RGBA, sRGB encoded
    Rgba8Srgb,
    /// 8-bit BGRA
    Bgra8Unorm,
    /// 8-bit BGRA, sRGB encoded
    Bgra8Srgb,
    /// 16-bit float single channel
    R16Float,
    /// 16-bit float RGBA
    Rgba16Float,
    /// 32-bit float single channel
    R32Float,
    /// 32-bit float two channels
    Rg32Float,
    /// 32-bit float RGBA
    Rgba32Float,
    /// 32-bit unsigned integer
    R32Uint,
    /// 16-bit depth
    D16Unorm,
    /// 32-bit float depth
    D32Float,
    /// 24-bit depth with 8-bit stencil
    D24UnormS8Uint,
    /// 32-bit float depth with 8-bit stencil
    D32FloatS8Uint,
}

impl TextureFormat {
    /// Size in bytes of one texel when tightly packed
    pub fn bytes_per_texel(self) -> u32 {
        match self {
            Self::R8Unorm => 1,
            Self::Rg8Unorm | Self::R16Float | Self::D16Unorm => 2,
            Self::Rgba8Unorm
            | Self::Rgba8Srgb
            | Self::Bgra8Unorm
            | Self::Bgra8Srgb
            | Self::R32Float
            | Self::R32Uint
            | Self::D32Float
            | Self::D24UnormS8Uint => 4,
            Self::Rgba16Float | Self::Rg32Float | Self::D32FloatS8Uint => 8,
            Self::Rgba32Float => 16,
        }
    }

    /// Whether the format has a depth aspect
    pub fn is_depth(self) -> bool {
        matches!(
            self,
            Self::D16Unorm | Self::D32Float | Self::D24UnormS8Uint | Self::D32FloatS8Uint
        )
    }

    /// Whether the format has a stencil aspect
    pub fn has_stencil(self) -> bool {
        matches!(self, Self::D24UnormS8Uint | Self::D32FloatS8Uint)
    }
}

impl std::fmt::Display for TextureFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

bitflags::bitflags! {
    /// How a texture is used after creation
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        /// Sampled from shaders
        const SAMPLED = 1 << 0;
        /// Written as a storage image
        const STORAGE = 1 << 1;
        /// Rendered to as a color attachment
        const COLOR_ATTACHMENT = 1 << 2;
        /// Rendered to as a depth/stencil attachment
        const DEPTH_STENCIL_ATTACHMENT = 1 << 3;
        /// Read as an input attachment
        const INPUT_ATTACHMENT = 1 << 4;
    }
}

impl TextureUsage {
    /// Layout a texture rests in once its upload has finished
    pub fn resting_layout(self) -> ImageLayout {
        if self.contains(Self::SAMPLED) || self.contains(Self::INPUT_ATTACHMENT) {
            ImageLayout::ShaderReadOnly
        } else if self.contains(Self::COLOR_ATTACHMENT) {
            ImageLayout::ColorAttachment
        } else if self.contains(Self::DEPTH_STENCIL_ATTACHMENT) {
            ImageLayout::DepthStencilAttachment
        } else if self.contains(Self::STORAGE) {
            ImageLayout::General
        } else {
            ImageLayout::ShaderReadOnly
        }
    }
}

/// Texture shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKind {
    /// Plain 2D texture
    Texture2D,
    /// Array of 2D layers
    Texture2DArray,
    /// Six-layer cube map
    Cube,
    /// Volume texture
    Texture3D,
}

/// Parameters for [`crate::ResourceManager::create_texture`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureDesc {
    /// Dimensions of mip 0
    pub extent: Extent3D,
    /// Mip level count, 0 computes the full chain
    pub mip_levels: u32,
    /// Array layers (6 for cube maps)
    pub layers: u32,
    /// Pixel format
    pub format: TextureFormat,
    /// Usage flags
    pub usage: TextureUsage,
    /// Shape
    pub kind: TextureKind,
    /// Debug label
    pub name: String,
}

impl TextureDesc {
    /// Sampled 2D texture with a full mip chain
    pub fn new_2d(width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            extent: Extent3D::new_2d(width, height),
            mip_levels: 0,
            layers: 1,
            format,
            usage: TextureUsage::SAMPLED,
            kind: TextureKind::Texture2D,
            name: String::new(),
        }
    }

    /// Sampled cube map with a full mip chain
    pub fn new_cube(size: u32, format: TextureFormat) -> Self {
        Self {
            layers: 6,
            kind: TextureKind::Cube,
            ..Self::new_2d(size, size, format)
        }
    }

    /// Set the mip level count (0 = full chain)
    pub fn with_mip_levels(mut self, mip_levels: u32) -> Self {
        self.mip_levels = mip_levels;
        self
    }

    /// Set usage flags
    pub fn with_usage(mut self, usage: TextureUsage) -> Self {
        self.usage = usage;
        self
    }

    /// Set array layer count
    pub fn with_layers(mut self, layers: u32) -> Self {
        self.layers = layers;
        self
    }

    /// Set the debug label
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Mip count after resolving 0 and clamping to the full chain
    pub fn resolved_mip_levels(&self) -> u32 {
        let full = full_mip_count(self.extent);
        if self.mip_levels == 0 {
            full
        } else {
            self.mip_levels.min(full)
        }
    }

    /// Bytes of tightly packed data for one mip level, all layers
    pub fn level_size(&self, level: u32) -> u64 {
        self.extent.mip(level).texel_count()
            * u64::from(self.layers.max(1))
            * u64::from(self.format.bytes_per_texel())
    }

    /// Bytes needed to supply the first `mip_levels` levels
    pub fn chain_size(&self, mip_levels: u32) -> u64 {
        (0..mip_levels).map(|level| self.level_size(level)).sum()
    }
}

/// A live texture in the resource table
#[derive(Debug)]
pub struct TextureResource<T> {
    /// Descriptor with `mip_levels` resolved
    pub desc: TextureDesc,
    /// Layout the texture rests in between uses
    pub layout: ImageLayout,
    pub(crate) native: T,
}

impl<T> TextureResource<T> {
    /// Native texture object
    pub fn native(&self) -> &T {
        &self.native
    }

    /// Resolved mip count
    pub fn mip_levels(&self) -> u32 {
        self.desc.mip_levels
    }
}

/// Texel filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterMode {
    /// Nearest texel
    Nearest,
    /// Linear interpolation
    Linear,
}

/// Behavior outside the [0, 1] coordinate range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressMode {
    /// Repeat
    Wrap,
    /// Clamp to the edge texel
    Clamp,
    /// Repeat mirrored
    Mirror,
}

/// Sampler parameters for a texture view
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerDesc {
    /// Magnification and minification filter
    pub filter: FilterMode,
    /// Filter between mip levels
    pub mip_filter: FilterMode,
    /// Address mode for all axes
    pub address_mode: AddressMode,
    /// Smallest mip level used
    pub min_lod: f32,
    /// Largest mip level used
    pub max_lod: f32,
    /// Anisotropic filtering level, `None` disables it
    pub max_anisotropy: Option<f32>,
}

impl Default for SamplerDesc {
    fn default() -> Self {
        Self {
            filter: FilterMode::Linear,
            mip_filter: FilterMode::Linear,
            address_mode: AddressMode::Wrap,
            min_lod: 0.0,
            max_lod: 64.0,
            max_anisotropy: None,
        }
    }
}

/// Parameters for [`crate::ResourceManager::create_texture_view`]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TextureViewDesc {
    /// View format; must equal the texture's format when set
    pub format: Option<TextureFormat>,
    /// First visible mip
    pub base_mip: u32,
    /// Visible mip count, 0 means every level from `base_mip`
    pub mip_count: u32,
    /// First visible layer
    pub base_layer: u32,
    /// Visible layer count, 0 means every layer from `base_layer`
    pub layer_count: u32,
    /// Debug label
    pub name: String,
}

impl TextureViewDesc {
    /// Resolve zero counts against a texture, rejecting out-of-range views
    pub fn resolve(&self, texture: &TextureDesc) -> Result<Self, String> {
        if let Some(format) = self.format.filter(|format| *format != texture.format) {
            return Err(format!(
                "view format {} does not match texture format {}",
                format, texture.format
            ));
        }
        let mips = texture.mip_levels;
        let layers = texture.layers.max(1);
        if self.base_mip >= mips {
            return Err(format!("base mip {} out of {} levels", self.base_mip, mips));
        }
        if self.base_layer >= layers {
            return Err(format!("base layer {} out of {} layers", self.base_layer, layers));
        }
        let mip_count = if self.mip_count == 0 { mips - self.base_mip } else { self.mip_count };
        let layer_count = if self.layer_count == 0 {
            layers - self.base_layer
        } else {
            self.layer_count
        };
        if self.base_mip + mip_count > mips {
            return Err(format!(
                "mips {}..{} exceed {} levels",
                self.base_mip,
                self.base_mip + mip_count,
                mips
            ));
        }
        if self.base_layer + layer_count > layers {
            return Err(format!(
                "layers {}..{} exceed {} layers",
                self.base_layer,
                self.base_layer + layer_count,
                layers
            ));
        }
        Ok(Self {
            format: Some(self.format.unwrap_or(texture.format)),
            base_mip: self.base_mip,
            mip_count,
            base_layer: self.base_layer,
            layer_count,
            name: self.name.clone(),
        })
    }
}

/// A live texture view in the resource table
#[derive(Debug)]
pub struct TextureViewResource<V> {
    /// Texture the view was created over
    pub texture: TextureHandle,
    /// Resolved view range
    pub desc: TextureViewDesc,
    /// Sampler parameters
    pub sampler: SamplerDesc,
    pub(crate) native: V,
}

impl<V> TextureViewResource<V> {
    /// Native view object
    pub fn native(&self) -> &V {
        &self.native
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_mip_count() {
        assert_eq!(full_mip_count(Extent3D::new_2d(64, 64)), 7);
        assert_eq!(full_mip_count(Extent3D::new_2d(1, 1)), 1);
        assert_eq!(full_mip_count(Extent3D::new_2d(100, 3)), 7);
        assert_eq!(full_mip_count(Extent3D::new(4, 4, 32)), 6);
    }

    #[test]
    fn test_mip_extent_never_below_one() {
        let extent = Extent3D::new_2d(64, 4);
        assert_eq!(extent.mip(1), Extent3D::new_2d(32, 2));
        assert_eq!(extent.mip(3), Extent3D::new_2d(8, 1));
        assert_eq!(extent.mip(6), Extent3D::new_2d(1, 1));
        assert_eq!(extent.mip(40), Extent3D::new_2d(1, 1));
    }

    #[test]
    fn test_resolved_mip_levels() {
        let desc = TextureDesc::new_2d(64, 64, TextureFormat::Rgba8Unorm);
        assert_eq!(desc.resolved_mip_levels(), 7);
        assert_eq!(desc.clone().with_mip_levels(3).resolved_mip_levels(), 3);
        assert_eq!(desc.with_mip_levels(20).resolved_mip_levels(), 7);
    }

    #[test]
    fn test_chain_size() {
        let desc = TextureDesc::new_2d(4, 4, TextureFormat::Rgba8Unorm);
        // 16 + 4 + 1 texels
        assert_eq!(desc.chain_size(3), 21 * 4);
        let cube = TextureDesc::new_cube(2, TextureFormat::R8Unorm);
        assert_eq!(cube.level_size(0), 4 * 6);
    }

    #[test]
    fn test_resting_layout() {
        assert_eq!(TextureUsage::SAMPLED.resting_layout(), ImageLayout::ShaderReadOnly);
        assert_eq!(
            TextureUsage::COLOR_ATTACHMENT.resting_layout(),
            ImageLayout::ColorAttachment
        );
        assert_eq!(
            TextureUsage::DEPTH_STENCIL_ATTACHMENT.resting_layout(),
            ImageLayout::DepthStencilAttachment
        );
        assert_eq!(TextureUsage::STORAGE.resting_layout(), ImageLayout::General);
    }

    #[test]
    fn test_view_resolve() {
        let mut texture = TextureDesc::new_2d(16, 16, TextureFormat::Rgba8Unorm);
        texture.mip_levels = texture.resolved_mip_levels();

        let view = TextureViewDesc { base_mip: 2, ..Default::default() }
            .resolve(&texture)
            .unwrap();
        assert_eq!(view.mip_count, 3);
        assert_eq!(view.layer_count, 1);
        assert_eq!(view.format, Some(TextureFormat::Rgba8Unorm));

        let bad = TextureViewDesc { base_mip: 1, mip_count: 5, ..Default::default() };
        assert!(bad.resolve(&texture).is_err());
        let bad = TextureViewDesc { base_layer: 1, ..Default::default() };
        assert!(bad.resolve(&texture).is_err());
    }

    #[test]
    fn test_view_format_must_match_texture() {
        let texture = TextureDesc::new_2d(4, 4, TextureFormat::Rgba8Unorm).with_mip_levels(1);

        let same = TextureViewDesc { format: Some(TextureFormat::Rgba8Unorm), ..Default::default() };
        assert!(same.resolve(&texture).is_ok());

        let depth = TextureViewDesc { format: Some(TextureFormat::D32Float), ..Default::default() };
        assert!(depth.resolve(&texture).is_err());
    }
}
