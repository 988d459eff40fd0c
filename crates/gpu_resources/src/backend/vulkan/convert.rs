//! Conversions from resource descriptions to Vulkan enums

use ash::vk;

use crate::backend::{BackendError, BackendResult, ImageLayout};
use crate::resources::texture::{AddressMode, FilterMode, TextureFormat, TextureUsage};
use crate::shader::layout::{BindingKind, ShaderStages};
use crate::shader::state::{BlendMode, CompareMode, CullMode, StencilOp};
use crate::shader::variant::SampleCount;
use crate::shader::vertex::VertexFormat;

pub(crate) fn format(format: TextureFormat) -> vk::Format {
    match format {
        TextureFormat::R8Unorm => vk::Format::R8_UNORM,
        TextureFormat::Rg8Unorm => vk::Format::R8G8_UNORM,
        TextureFormat::Rgba8Unorm => vk::Format::R8G8B8A8_UNORM,
        TextureFormat::Rgba8Srgb => vk::Format::R8G8B8A8_SRGB,
        TextureFormat::Bgra8Unorm => vk::Format::B8G8R8A8_UNORM,
        TextureFormat::Bgra8Srgb => vk::Format::B8G8R8A8_SRGB,
        TextureFormat::R16Float => vk::Format::R16_SFLOAT,
        TextureFormat::Rgba16Float => vk::Format::R16G16B16A16_SFLOAT,
        TextureFormat::R32Float => vk::Format::R32_SFLOAT,
        TextureFormat::Rg32Float => vk::Format::R32G32_SFLOAT,
        TextureFormat::Rgba32Float => vk::Format::R32G32B32A32_SFLOAT,
        TextureFormat::R32Uint => vk::Format::R32_UINT,
        TextureFormat::D16Unorm => vk::Format::D16_UNORM,
        TextureFormat::D32Float => vk::Format::D32_SFLOAT,
        TextureFormat::D24UnormS8Uint => vk::Format::D24_UNORM_S8_UINT,
        TextureFormat::D32FloatS8Uint => vk::Format::D32_SFLOAT_S8_UINT,
    }
}

pub(crate) fn aspect(format: TextureFormat) -> vk::ImageAspectFlags {
    if format.has_stencil() {
        vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
    } else if format.is_depth() {
        vk::ImageAspectFlags::DEPTH
    } else {
        vk::ImageAspectFlags::COLOR
    }
}

/// Aspect of a single-aspect copy or blit; combined depth/stencil images
/// cannot be addressed as one region
pub(crate) fn copy_aspect(aspect: vk::ImageAspectFlags) -> BackendResult<vk::ImageAspectFlags> {
    if aspect.contains(vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL) {
        return Err(BackendError::InvalidTransfer(
            "copies into combined depth/stencil images are not supported".to_string(),
        ));
    }
    Ok(aspect)
}

pub(crate) fn image_usage(usage: TextureUsage) -> vk::ImageUsageFlags {
    // every texture can be uploaded to and take part in the blit chain
    let mut flags = vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::TRANSFER_SRC;
    if usage.contains(TextureUsage::SAMPLED) {
        flags |= vk::ImageUsageFlags::SAMPLED;
    }
    if usage.contains(TextureUsage::STORAGE) {
        flags |= vk::ImageUsageFlags::STORAGE;
    }
    if usage.contains(TextureUsage::COLOR_ATTACHMENT) {
        flags |= vk::ImageUsageFlags::COLOR_ATTACHMENT;
    }
    if usage.contains(TextureUsage::DEPTH_STENCIL_ATTACHMENT) {
        flags |= vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT;
    }
    if usage.contains(TextureUsage::INPUT_ATTACHMENT) {
        flags |= vk::ImageUsageFlags::INPUT_ATTACHMENT;
    }
    flags
}

pub(crate) fn image_layout(layout: ImageLayout) -> vk::ImageLayout {
    match layout {
        ImageLayout::Undefined => vk::ImageLayout::UNDEFINED,
        ImageLayout::TransferDst => vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        ImageLayout::TransferSrc => vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        ImageLayout::ShaderReadOnly => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        ImageLayout::ColorAttachment => vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        ImageLayout::DepthStencilAttachment => vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        ImageLayout::General => vk::ImageLayout::GENERAL,
    }
}

/// Access mask and pipeline stage that use an image in `layout`
pub(crate) fn layout_access(layout: ImageLayout) -> (vk::AccessFlags, vk::PipelineStageFlags) {
    match layout {
        ImageLayout::Undefined => (vk::AccessFlags::empty(), vk::PipelineStageFlags::TOP_OF_PIPE),
        ImageLayout::TransferDst => (vk::AccessFlags::TRANSFER_WRITE, vk::PipelineStageFlags::TRANSFER),
        ImageLayout::TransferSrc => (vk::AccessFlags::TRANSFER_READ, vk::PipelineStageFlags::TRANSFER),
        ImageLayout::ShaderReadOnly => (
            vk::AccessFlags::SHADER_READ,
            vk::PipelineStageFlags::VERTEX_SHADER | vk::PipelineStageFlags::FRAGMENT_SHADER,
        ),
        ImageLayout::ColorAttachment => (
            vk::AccessFlags::COLOR_ATTACHMENT_READ | vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
        ),
        ImageLayout::DepthStencilAttachment => (
            vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
        ),
        ImageLayout::General => (
            vk::AccessFlags::SHADER_READ | vk::AccessFlags::SHADER_WRITE,
            vk::PipelineStageFlags::COMPUTE_SHADER | vk::PipelineStageFlags::FRAGMENT_SHADER,
        ),
    }
}

pub(crate) fn filter(mode: FilterMode) -> vk::Filter {
    match mode {
        FilterMode::Nearest => vk::Filter::NEAREST,
        FilterMode::Linear => vk::Filter::LINEAR,
    }
}

pub(crate) fn mipmap_mode(mode: FilterMode) -> vk::SamplerMipmapMode {
    match mode {
        FilterMode::Nearest => vk::SamplerMipmapMode::NEAREST,
        FilterMode::Linear => vk::SamplerMipmapMode::LINEAR,
    }
}

pub(crate) fn address_mode(mode: AddressMode) -> vk::SamplerAddressMode {
    match mode {
        AddressMode::Wrap => vk::SamplerAddressMode::REPEAT,
        AddressMode::Clamp => vk::SamplerAddressMode::CLAMP_TO_EDGE,
        AddressMode::Mirror => vk::SamplerAddressMode::MIRRORED_REPEAT,
    }
}

pub(crate) fn descriptor_type(kind: BindingKind) -> vk::DescriptorType {
    match kind {
        BindingKind::UniformBuffer => vk::DescriptorType::UNIFORM_BUFFER,
        BindingKind::StorageBuffer => vk::DescriptorType::STORAGE_BUFFER,
        BindingKind::SampledTexture => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
        BindingKind::StorageTexture => vk::DescriptorType::STORAGE_IMAGE,
    }
}

pub(crate) fn shader_stages(stages: ShaderStages) -> vk::ShaderStageFlags {
    let mut flags = vk::ShaderStageFlags::empty();
    if stages.contains(ShaderStages::VERTEX) {
        flags |= vk::ShaderStageFlags::VERTEX;
    }
    if stages.contains(ShaderStages::PIXEL) {
        flags |= vk::ShaderStageFlags::FRAGMENT;
    }
    if stages.contains(ShaderStages::COMPUTE) {
        flags |= vk::ShaderStageFlags::COMPUTE;
    }
    flags
}

pub(crate) fn sample_count(count: SampleCount) -> vk::SampleCountFlags {
    match count {
        SampleCount::X1 => vk::SampleCountFlags::TYPE_1,
        SampleCount::X2 => vk::SampleCountFlags::TYPE_2,
        SampleCount::X4 => vk::SampleCountFlags::TYPE_4,
        SampleCount::X8 => vk::SampleCountFlags::TYPE_8,
        SampleCount::X16 => vk::SampleCountFlags::TYPE_16,
    }
}

pub(crate) fn compare_op(mode: CompareMode) -> vk::CompareOp {
    match mode {
        CompareMode::Never => vk::CompareOp::NEVER,
        CompareMode::Less => vk::CompareOp::LESS,
        CompareMode::Equal => vk::CompareOp::EQUAL,
        CompareMode::LessOrEqual => vk::CompareOp::LESS_OR_EQUAL,
        CompareMode::Greater => vk::CompareOp::GREATER,
        CompareMode::NotEqual => vk::CompareOp::NOT_EQUAL,
        CompareMode::GreaterOrEqual => vk::CompareOp::GREATER_OR_EQUAL,
        CompareMode::Always => vk::CompareOp::ALWAYS,
    }
}

pub(crate) fn stencil_op(op: StencilOp) -> vk::StencilOp {
    match op {
        StencilOp::Keep => vk::StencilOp::KEEP,
        StencilOp::Zero => vk::StencilOp::ZERO,
        StencilOp::Replace => vk::StencilOp::REPLACE,
        StencilOp::IncrementAndClamp => vk::StencilOp::INCREMENT_AND_CLAMP,
        StencilOp::DecrementAndClamp => vk::StencilOp::DECREMENT_AND_CLAMP,
        StencilOp::Invert => vk::StencilOp::INVERT,
        StencilOp::IncrementAndWrap => vk::StencilOp::INCREMENT_AND_WRAP,
        StencilOp::DecrementAndWrap => vk::StencilOp::DECREMENT_AND_WRAP,
    }
}

pub(crate) fn cull_mode(mode: CullMode) -> vk::CullModeFlags {
    match mode {
        CullMode::None => vk::CullModeFlags::NONE,
        CullMode::Front => vk::CullModeFlags::FRONT,
        CullMode::Back => vk::CullModeFlags::BACK,
        CullMode::FrontAndBack => vk::CullModeFlags::FRONT_AND_BACK,
    }
}

pub(crate) fn blend_attachment(mode: BlendMode) -> vk::PipelineColorBlendAttachmentState {
    use vk::BlendFactor as F;

    let (src_color, dst_color, src_alpha, dst_alpha) = match mode {
        BlendMode::None => (F::ONE, F::ZERO, F::ONE, F::ZERO),
        BlendMode::Alpha => (F::SRC_ALPHA, F::ONE_MINUS_SRC_ALPHA, F::ONE, F::ONE_MINUS_SRC_ALPHA),
        BlendMode::Additive => (F::SRC_ALPHA, F::ONE, F::ONE, F::ONE),
        BlendMode::Premultiply => (F::ONE, F::ONE_MINUS_SRC_ALPHA, F::ONE, F::ONE_MINUS_SRC_ALPHA),
        BlendMode::Multiply => (F::DST_COLOR, F::ONE_MINUS_SRC_ALPHA, F::DST_ALPHA, F::ONE_MINUS_SRC_ALPHA),
        BlendMode::ClipMask => (F::ZERO, F::ONE, F::ONE_MINUS_DST_ALPHA, F::ZERO),
    };

    vk::PipelineColorBlendAttachmentState {
        blend_enable: vk::Bool32::from(mode != BlendMode::None),
        src_color_blend_factor: src_color,
        dst_color_blend_factor: dst_color,
        color_blend_op: vk::BlendOp::ADD,
        src_alpha_blend_factor: src_alpha,
        dst_alpha_blend_factor: dst_alpha,
        alpha_blend_op: vk::BlendOp::ADD,
        color_write_mask: vk::ColorComponentFlags::RGBA,
    }
}

pub(crate) fn vertex_format(format: VertexFormat) -> vk::Format {
    match format {
        VertexFormat::Float => vk::Format::R32_SFLOAT,
        VertexFormat::Float2 => vk::Format::R32G32_SFLOAT,
        VertexFormat::Float3 => vk::Format::R32G32B32_SFLOAT,
        VertexFormat::Float4 => vk::Format::R32G32B32A32_SFLOAT,
        VertexFormat::Unorm8x4 => vk::Format::R8G8B8A8_UNORM,
        VertexFormat::Uint => vk::Format::R32_UINT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_stencil_aspect() {
        assert_eq!(aspect(TextureFormat::Rgba8Unorm), vk::ImageAspectFlags::COLOR);
        assert_eq!(aspect(TextureFormat::D32Float), vk::ImageAspectFlags::DEPTH);
        assert_eq!(
            aspect(TextureFormat::D24UnormS8Uint),
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        );
    }

    #[test]
    fn test_copy_aspect_rejects_combined_depth_stencil() {
        assert_eq!(
            copy_aspect(aspect(TextureFormat::D32Float)).unwrap(),
            vk::ImageAspectFlags::DEPTH
        );
        assert!(copy_aspect(aspect(TextureFormat::D24UnormS8Uint)).is_err());
    }

    #[test]
    fn test_textures_always_transferable() {
        let flags = image_usage(TextureUsage::SAMPLED);
        assert!(flags.contains(vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::TRANSFER_SRC));
        assert!(!flags.contains(vk::ImageUsageFlags::STORAGE));
    }

    #[test]
    fn test_opaque_blend_disabled() {
        assert_eq!(blend_attachment(BlendMode::None).blend_enable, vk::FALSE);
        assert_eq!(blend_attachment(BlendMode::Alpha).blend_enable, vk::TRUE);
    }
}
