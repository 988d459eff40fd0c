//! Graphics state bitmask
//!
//! The fixed-function state of a pipeline variant packed into one `u64` so a
//! variant key compares with a single integer comparison.
//!
//! ```text
//! bits  0..11  vertex stream mask       (MeshFormatFlags)
//! bits 11..14  depth compare            (CompareMode)
//! bit  14      depth write
//! bits 15..17  cull mode                (CullMode)
//! bits 17..20  blend mode               (BlendMode)
//! bits 20..24  shader texture flags     (ShaderTextureFlags)
//! bits 24..27  stencil compare          (CompareMode)
//! bits 27..35  stencil reference
//! bits 35..43  stencil mask
//! bits 43..46  stencil fail op          (StencilOp)
//! bits 46..49  stencil depth-fail op    (StencilOp)
//! bits 49..52  stencil pass op          (StencilOp)
//! bits 52..64  unused
//! ```

use std::fmt;

const VERTEX_STREAM: Field = Field::new(0, 11);
const DEPTH_MODE: Field = Field::new(11, 3);
const DEPTH_WRITE: Field = Field::new(14, 1);
const CULL_MODE: Field = Field::new(15, 2);
const BLEND_MODE: Field = Field::new(17, 3);
const TEXTURE_FLAGS: Field = Field::new(20, 4);
const STENCIL_MODE: Field = Field::new(24, 3);
const STENCIL_REF: Field = Field::new(27, 8);
const STENCIL_MASK: Field = Field::new(35, 8);
const STENCIL_OP_FAIL: Field = Field::new(43, 3);
const STENCIL_OP_DEPTH_FAIL: Field = Field::new(46, 3);
const STENCIL_OP_PASS: Field = Field::new(49, 3);

#[derive(Clone, Copy)]
struct Field {
    shift: u32,
    mask: u64,
}

impl Field {
    const fn new(shift: u32, width: u32) -> Self {
        Self { shift, mask: (1 << width) - 1 }
    }

    const fn get(self, bits: u64) -> u64 {
        (bits >> self.shift) & self.mask
    }

    const fn set(self, bits: u64, value: u64) -> u64 {
        (bits & !(self.mask << self.shift)) | ((value & self.mask) << self.shift)
    }
}

bitflags::bitflags! {
    /// Vertex streams present in a mesh
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MeshFormatFlags: u32 {
        /// Positions
        const HAS_POSITION = 1 << 0;
        /// Normals
        const HAS_NORMAL = 1 << 1;
        /// Tangents
        const HAS_TANGENT = 1 << 2;
        /// First UV set
        const HAS_TEXCOORD_0 = 1 << 3;
        /// Second UV set
        const HAS_TEXCOORD_1 = 1 << 4;
        /// First vertex color
        const HAS_COLOR_0 = 1 << 5;
        /// Second vertex color
        const HAS_COLOR_1 = 1 << 6;
        /// First joint indices
        const HAS_JOINTS_0 = 1 << 7;
        /// Second joint indices
        const HAS_JOINTS_1 = 1 << 8;
        /// First joint weights
        const HAS_WEIGHTS_0 = 1 << 9;
        /// Second joint weights
        const HAS_WEIGHTS_1 = 1 << 10;
    }
}

bitflags::bitflags! {
    /// Material textures bound for a draw
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderTextureFlags: u32 {
        /// Base color map
        const BASE_COLOR = 1 << 0;
        /// Normal map
        const NORMAL = 1 << 1;
        /// Emissive map
        const EMISSIVE = 1 << 2;
        /// Metallic/roughness map
        const METALLIC_ROUGHNESS = 1 << 3;
    }
}

macro_rules! packed_enum {
    ($(#[$meta:meta])* $name:ident { $($(#[$vmeta:meta])* $variant:ident = $value:expr),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        #[repr(u8)]
        pub enum $name {
            $($(#[$vmeta])* $variant = $value),+
        }

        impl $name {
            fn from_bits(bits: u64) -> Self {
                $(if bits == $value { return Self::$variant; })+
                Self::default()
            }
        }
    };
}

packed_enum!(
    /// Comparison used by depth and stencil tests
    CompareMode {
        /// Never passes
        Never = 0,
        /// Passes when less
        Less = 1,
        /// Passes when equal
        Equal = 2,
        /// Passes when less or equal
        LessOrEqual = 3,
        /// Passes when greater
        Greater = 4,
        /// Passes when not equal
        NotEqual = 5,
        /// Passes when greater or equal
        GreaterOrEqual = 6,
        /// Always passes
        #[default]
        Always = 7,
    }
);

packed_enum!(
    /// Face culling
    CullMode {
        /// Draw both faces
        #[default]
        None = 0,
        /// Cull front faces
        Front = 1,
        /// Cull back faces
        Back = 2,
        /// Cull everything
        FrontAndBack = 3,
    }
);

packed_enum!(
    /// Color blending preset
    BlendMode {
        /// Opaque
        #[default]
        None = 0,
        /// Straight alpha
        Alpha = 1,
        /// Additive
        Additive = 2,
        /// Premultiplied alpha
        Premultiply = 3,
        /// Multiplicative
        Multiply = 4,
        /// Writes alpha only, used for clip masks
        ClipMask = 5,
    }
);

packed_enum!(
    /// Stencil buffer update
    StencilOp {
        /// Keep the current value
        #[default]
        Keep = 0,
        /// Set to zero
        Zero = 1,
        /// Set to the reference
        Replace = 2,
        /// Increment, clamping at max
        IncrementAndClamp = 3,
        /// Decrement, clamping at zero
        DecrementAndClamp = 4,
        /// Bitwise invert
        Invert = 5,
        /// Increment with wrap-around
        IncrementAndWrap = 6,
        /// Decrement with wrap-around
        DecrementAndWrap = 7,
    }
);

/// Packed pipeline state, part of every variant key
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct GraphicsState(u64);

impl GraphicsState {
    /// State from raw bits
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Raw bits
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Vertex streams the variant reads
    pub fn vertex_streams(self) -> MeshFormatFlags {
        MeshFormatFlags::from_bits_truncate(VERTEX_STREAM.get(self.0) as u32)
    }

    /// Set vertex streams
    pub fn with_vertex_streams(self, streams: MeshFormatFlags) -> Self {
        Self(VERTEX_STREAM.set(self.0, u64::from(streams.bits())))
    }

    /// Depth comparison
    pub fn depth_mode(self) -> CompareMode {
        CompareMode::from_bits(DEPTH_MODE.get(self.0))
    }

    /// Set depth comparison
    pub fn with_depth_mode(self, mode: CompareMode) -> Self {
        Self(DEPTH_MODE.set(self.0, mode as u64))
    }

    /// Whether depth writes are enabled
    pub fn depth_write(self) -> bool {
        DEPTH_WRITE.get(self.0) != 0
    }

    /// Enable or disable depth writes
    pub fn with_depth_write(self, enabled: bool) -> Self {
        Self(DEPTH_WRITE.set(self.0, u64::from(enabled)))
    }

    /// Face culling
    pub fn cull_mode(self) -> CullMode {
        CullMode::from_bits(CULL_MODE.get(self.0))
    }

    /// Set face culling
    pub fn with_cull_mode(self, mode: CullMode) -> Self {
        Self(CULL_MODE.set(self.0, mode as u64))
    }

    /// Blend preset
    pub fn blend_mode(self) -> BlendMode {
        BlendMode::from_bits(BLEND_MODE.get(self.0))
    }

    /// Set blend preset
    pub fn with_blend_mode(self, mode: BlendMode) -> Self {
        Self(BLEND_MODE.set(self.0, mode as u64))
    }

    /// Material textures present
    pub fn texture_flags(self) -> ShaderTextureFlags {
        ShaderTextureFlags::from_bits_truncate(TEXTURE_FLAGS.get(self.0) as u32)
    }

    /// Set material textures present
    pub fn with_texture_flags(self, flags: ShaderTextureFlags) -> Self {
        Self(TEXTURE_FLAGS.set(self.0, u64::from(flags.bits())))
    }

    /// Stencil comparison
    pub fn stencil_mode(self) -> CompareMode {
        CompareMode::from_bits(STENCIL_MODE.get(self.0))
    }

    /// Set stencil comparison
    pub fn with_stencil_mode(self, mode: CompareMode) -> Self {
        Self(STENCIL_MODE.set(self.0, mode as u64))
    }

    /// Stencil reference value
    pub fn stencil_ref(self) -> u8 {
        STENCIL_REF.get(self.0) as u8
    }

    /// Set stencil reference value
    pub fn with_stencil_ref(self, value: u8) -> Self {
        Self(STENCIL_REF.set(self.0, u64::from(value)))
    }

    /// Stencil compare/write mask
    pub fn stencil_mask(self) -> u8 {
        STENCIL_MASK.get(self.0) as u8
    }

    /// Set stencil compare/write mask
    pub fn with_stencil_mask(self, mask: u8) -> Self {
        Self(STENCIL_MASK.set(self.0, u64::from(mask)))
    }

    /// Stencil ops as (fail, depth fail, pass)
    pub fn stencil_ops(self) -> (StencilOp, StencilOp, StencilOp) {
        (
            StencilOp::from_bits(STENCIL_OP_FAIL.get(self.0)),
            StencilOp::from_bits(STENCIL_OP_DEPTH_FAIL.get(self.0)),
            StencilOp::from_bits(STENCIL_OP_PASS.get(self.0)),
        )
    }

    /// Set stencil ops
    pub fn with_stencil_ops(self, fail: StencilOp, depth_fail: StencilOp, pass: StencilOp) -> Self {
        let bits = STENCIL_OP_FAIL.set(self.0, fail as u64);
        let bits = STENCIL_OP_DEPTH_FAIL.set(bits, depth_fail as u64);
        Self(STENCIL_OP_PASS.set(bits, pass as u64))
    }

    /// Whether stencil testing has any effect
    pub fn stencil_enabled(self) -> bool {
        let (fail, depth_fail, pass) = self.stencil_ops();
        self.stencil_mode() != CompareMode::Always
            || fail != StencilOp::Keep
            || depth_fail != StencilOp::Keep
            || pass != StencilOp::Keep
    }

    /// Opaque, depth-tested, back-face culled geometry with positions
    pub fn opaque() -> Self {
        Self::default()
            .with_vertex_streams(MeshFormatFlags::HAS_POSITION)
            .with_depth_mode(CompareMode::LessOrEqual)
            .with_depth_write(true)
            .with_cull_mode(CullMode::Back)
            .with_stencil_mode(CompareMode::Always)
            .with_stencil_mask(0xff)
    }
}

impl fmt::Debug for GraphicsState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphicsState")
            .field("vertex_streams", &self.vertex_streams())
            .field("depth_mode", &self.depth_mode())
            .field("depth_write", &self.depth_write())
            .field("cull_mode", &self.cull_mode())
            .field("blend_mode", &self.blend_mode())
            .field("texture_flags", &self.texture_flags())
            .field("stencil_mode", &self.stencil_mode())
            .field("stencil_ref", &self.stencil_ref())
            .field("stencil_mask", &self.stencil_mask())
            .field("stencil_ops", &self.stencil_ops())
            .finish()
    }
}
