//! Images, image views and samplers

use ash::vk;

use crate::backend::vulkan::{buffer, convert};
use crate::backend::BackendResult;
use crate::resources::texture::{SamplerDesc, TextureDesc, TextureKind, TextureViewDesc};

/// Vulkan image and its memory
#[derive(Debug)]
pub struct VulkanTexture {
    pub(crate) image: vk::Image,
    pub(crate) memory: vk::DeviceMemory,
    pub(crate) format: vk::Format,
    pub(crate) aspect: vk::ImageAspectFlags,
    pub(crate) kind: TextureKind,
    pub(crate) mip_levels: u32,
    pub(crate) layers: u32,
}

impl VulkanTexture {
    /// Native image handle
    pub fn handle(&self) -> vk::Image {
        self.image
    }

    /// Native format
    pub fn format(&self) -> vk::Format {
        self.format
    }
}

/// Image view plus the sampler bound alongside it
#[derive(Debug)]
pub struct VulkanTextureView {
    pub(crate) view: vk::ImageView,
    pub(crate) sampler: vk::Sampler,
}

impl VulkanTextureView {
    /// Native image view
    pub fn image_view(&self) -> vk::ImageView {
        self.view
    }

    /// Native sampler
    pub fn sampler(&self) -> vk::Sampler {
        self.sampler
    }
}

pub(crate) fn create_texture(
    device: &ash::Device,
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    desc: &TextureDesc,
    mip_levels: u32,
) -> BackendResult<VulkanTexture> {
    let format = convert::format(desc.format);
    let (image_type, flags) = match desc.kind {
        TextureKind::Texture3D => (vk::ImageType::TYPE_3D, vk::ImageCreateFlags::empty()),
        TextureKind::Cube => (vk::ImageType::TYPE_2D, vk::ImageCreateFlags::CUBE_COMPATIBLE),
        TextureKind::Texture2D | TextureKind::Texture2DArray => {
            (vk::ImageType::TYPE_2D, vk::ImageCreateFlags::empty())
        }
    };
    let layers = desc.layers.max(1);

    let image_create_info = vk::ImageCreateInfo::builder()
        .flags(flags)
        .image_type(image_type)
        .extent(vk::Extent3D {
            width: desc.extent.width,
            height: desc.extent.height,
            depth: desc.extent.depth.max(1),
        })
        .mip_levels(mip_levels)
        .array_layers(layers)
        .format(format)
        .tiling(vk::ImageTiling::OPTIMAL)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .usage(convert::image_usage(desc.usage))
        .sharing_mode(vk::SharingMode::EXCLUSIVE)
        .samples(vk::SampleCountFlags::TYPE_1);

    let image = unsafe { device.create_image(&image_create_info, None)? };

    let memory_requirements = unsafe { device.get_image_memory_requirements(image) };
    let memory_type_index = match buffer::find_memory_type(
        memory_properties,
        memory_requirements.memory_type_bits,
        vk::MemoryPropertyFlags::DEVICE_LOCAL,
    ) {
        Ok(index) => index,
        Err(e) => {
            unsafe { device.destroy_image(image, None) };
            return Err(e);
        }
    };

    let memory_allocate_info = vk::MemoryAllocateInfo::builder()
        .allocation_size(memory_requirements.size)
        .memory_type_index(memory_type_index);

    let memory = match unsafe { device.allocate_memory(&memory_allocate_info, None) } {
        Ok(memory) => memory,
        Err(e) => {
            unsafe { device.destroy_image(image, None) };
            return Err(buffer::allocation_error(e, memory_requirements.size));
        }
    };

    if let Err(e) = unsafe { device.bind_image_memory(image, memory, 0) } {
        unsafe {
            device.destroy_image(image, None);
            device.free_memory(memory, None);
        }
        return Err(e.into());
    }

    log::trace!(
        "Created {}x{}x{} image '{}' ({:?}, {} mips, {} layers)",
        desc.extent.width,
        desc.extent.height,
        desc.extent.depth,
        desc.name,
        format,
        mip_levels,
        layers
    );

    Ok(VulkanTexture {
        image,
        memory,
        format,
        aspect: convert::aspect(desc.format),
        kind: desc.kind,
        mip_levels,
        layers,
    })
}

pub(crate) fn destroy_texture(device: &ash::Device, texture: VulkanTexture) {
    unsafe {
        device.destroy_image(texture.image, None);
        device.free_memory(texture.memory, None);
    }
}

fn view_type(kind: TextureKind, layer_count: u32) -> vk::ImageViewType {
    match kind {
        TextureKind::Texture2D if layer_count == 1 => vk::ImageViewType::TYPE_2D,
        TextureKind::Texture2D | TextureKind::Texture2DArray => vk::ImageViewType::TYPE_2D_ARRAY,
        TextureKind::Cube if layer_count == 6 => vk::ImageViewType::CUBE,
        TextureKind::Cube if layer_count % 6 == 0 => vk::ImageViewType::CUBE_ARRAY,
        TextureKind::Cube => vk::ImageViewType::TYPE_2D_ARRAY,
        TextureKind::Texture3D => vk::ImageViewType::TYPE_3D,
    }
}

pub(crate) fn create_view(
    device: &ash::Device,
    texture: &VulkanTexture,
    desc: &TextureViewDesc,
    sampler: &SamplerDesc,
) -> BackendResult<VulkanTextureView> {
    let format = desc.format.map(convert::format).unwrap_or(texture.format);

    let image_view_create_info = vk::ImageViewCreateInfo::builder()
        .image(texture.image)
        .view_type(view_type(texture.kind, desc.layer_count))
        .format(format)
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: texture.aspect,
            base_mip_level: desc.base_mip,
            level_count: desc.mip_count,
            base_array_layer: desc.base_layer,
            layer_count: desc.layer_count,
        });

    let view = unsafe { device.create_image_view(&image_view_create_info, None)? };

    let address_mode = convert::address_mode(sampler.address_mode);
    let sampler_create_info = vk::SamplerCreateInfo::builder()
        .mag_filter(convert::filter(sampler.filter))
        .min_filter(convert::filter(sampler.filter))
        .address_mode_u(address_mode)
        .address_mode_v(address_mode)
        .address_mode_w(address_mode)
        .anisotropy_enable(sampler.max_anisotropy.is_some())
        .max_anisotropy(sampler.max_anisotropy.unwrap_or(1.0))
        .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
        .unnormalized_coordinates(false)
        .compare_enable(false)
        .compare_op(vk::CompareOp::ALWAYS)
        .mipmap_mode(convert::mipmap_mode(sampler.mip_filter))
        .min_lod(sampler.min_lod)
        .max_lod(sampler.max_lod);

    let sampler = match unsafe { device.create_sampler(&sampler_create_info, None) } {
        Ok(sampler) => sampler,
        Err(e) => {
            unsafe { device.destroy_image_view(view, None) };
            return Err(e.into());
        }
    };

    Ok(VulkanTextureView { view, sampler })
}

pub(crate) fn destroy_view(device: &ash::Device, view: VulkanTextureView) {
    unsafe {
        device.destroy_sampler(view.sampler, None);
        device.destroy_image_view(view.view, None);
    }
}

/// Whether optimal-tiling images of `format` support linear blits both ways
pub(crate) fn supports_linear_blit(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    format: vk::Format,
) -> bool {
    let properties = unsafe { instance.get_physical_device_format_properties(physical_device, format) };
    properties.optimal_tiling_features.contains(
        vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR
            | vk::FormatFeatureFlags::BLIT_SRC
            | vk::FormatFeatureFlags::BLIT_DST,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_type_selection() {
        assert_eq!(view_type(TextureKind::Texture2D, 1), vk::ImageViewType::TYPE_2D);
        assert_eq!(view_type(TextureKind::Texture2DArray, 1), vk::ImageViewType::TYPE_2D_ARRAY);
        assert_eq!(view_type(TextureKind::Cube, 6), vk::ImageViewType::CUBE);
        assert_eq!(view_type(TextureKind::Cube, 12), vk::ImageViewType::CUBE_ARRAY);
        assert_eq!(view_type(TextureKind::Cube, 1), vk::ImageViewType::TYPE_2D_ARRAY);
    }
}
