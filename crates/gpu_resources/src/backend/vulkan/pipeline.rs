//! Descriptor set layouts, pipeline layouts, graphics and compute pipelines

use std::ffi::CStr;

use ash::vk;

use crate::backend::vulkan::convert;
use crate::backend::{BackendError, BackendResult, ComputePipelineDesc, PipelineDesc};
use crate::shader::layout::BindGroupLayoutDesc;
use crate::shader::state::CompareMode;
use crate::shader::variant::SpecializationConstants;

const ENTRY_POINT: &CStr = match CStr::from_bytes_with_nul(b"main\0") {
    Ok(name) => name,
    Err(_) => panic!("entry point name is not nul terminated"),
};

pub(crate) fn create_descriptor_set_layout(
    device: &ash::Device,
    desc: &BindGroupLayoutDesc,
) -> BackendResult<vk::DescriptorSetLayout> {
    let bindings: Vec<vk::DescriptorSetLayoutBinding> = desc
        .bindings
        .iter()
        .map(|binding| {
            vk::DescriptorSetLayoutBinding::builder()
                .binding(binding.slot)
                .descriptor_type(convert::descriptor_type(binding.kind))
                .descriptor_count(binding.count)
                .stage_flags(convert::shader_stages(binding.visibility))
                .build()
        })
        .collect();

    let layout_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&bindings);
    let layout = unsafe { device.create_descriptor_set_layout(&layout_info, None)? };
    Ok(layout)
}

pub(crate) fn create_pipeline_layout(
    device: &ash::Device,
    set_layouts: &[vk::DescriptorSetLayout],
) -> BackendResult<vk::PipelineLayout> {
    let layout_info = vk::PipelineLayoutCreateInfo::builder().set_layouts(set_layouts);
    let layout = unsafe { device.create_pipeline_layout(&layout_info, None)? };
    Ok(layout)
}

fn create_shader_module(device: &ash::Device, code: &[u32]) -> BackendResult<vk::ShaderModule> {
    let create_info = vk::ShaderModuleCreateInfo::builder().code(code);
    unsafe { device.create_shader_module(&create_info, None) }
        .map_err(|e| BackendError::InvalidShaderCode(format!("{:?}", e)))
}

/// Compile one pipeline variant
///
/// Viewport and scissor are dynamic so a variant does not depend on the
/// framebuffer size. Shader modules only live for the duration of the call.
pub(crate) fn create_graphics_pipeline(
    device: &ash::Device,
    desc: &PipelineDesc<'_, vk::PipelineLayout, vk::RenderPass>,
) -> BackendResult<vk::Pipeline> {
    let vertex_module = create_shader_module(device, desc.vertex_code)?;
    let pixel_module = match desc.pixel_code.map(|code| create_shader_module(device, code)).transpose() {
        Ok(module) => module,
        Err(e) => {
            unsafe { device.destroy_shader_module(vertex_module, None) };
            return Err(e);
        }
    };

    let result = build_pipeline(device, desc, vertex_module, pixel_module);

    unsafe {
        device.destroy_shader_module(vertex_module, None);
        if let Some(module) = pixel_module {
            device.destroy_shader_module(module, None);
        }
    }

    result
}

pub(crate) fn create_compute_pipeline(
    device: &ash::Device,
    desc: &ComputePipelineDesc<'_, vk::PipelineLayout>,
) -> BackendResult<vk::Pipeline> {
    let module = create_shader_module(device, desc.code)?;
    let stage = vk::PipelineShaderStageCreateInfo::builder()
        .stage(vk::ShaderStageFlags::COMPUTE)
        .module(module)
        .name(ENTRY_POINT);
    let pipeline_info = vk::ComputePipelineCreateInfo::builder()
        .stage(stage.build())
        .layout(*desc.layout);

    let result = unsafe {
        device.create_compute_pipelines(vk::PipelineCache::null(), &[pipeline_info.build()], None)
    };
    unsafe { device.destroy_shader_module(module, None) };

    let pipelines = result.map_err(|(_, err)| {
        BackendError::PipelineCreation(format!("compute '{}': {:?}", desc.name, err))
    })?;
    pipelines
        .into_iter()
        .next()
        .ok_or_else(|| BackendError::PipelineCreation(format!("'{}' returned no pipeline", desc.name)))
}

fn build_pipeline(
    device: &ash::Device,
    desc: &PipelineDesc<'_, vk::PipelineLayout, vk::RenderPass>,
    vertex_module: vk::ShaderModule,
    pixel_module: Option<vk::ShaderModule>,
) -> BackendResult<vk::Pipeline> {
    let state = desc.state;

    // Specialization constants shared by both stages
    let map_entries: Vec<vk::SpecializationMapEntry> = SpecializationConstants::entries()
        .map(|(constant_id, offset, size)| vk::SpecializationMapEntry {
            constant_id,
            offset,
            size,
        })
        .collect();
    let specialization_info = vk::SpecializationInfo::builder()
        .map_entries(&map_entries)
        .data(desc.specialization.as_bytes());

    let mut shader_stages = vec![vk::PipelineShaderStageCreateInfo::builder()
        .stage(vk::ShaderStageFlags::VERTEX)
        .module(vertex_module)
        .name(ENTRY_POINT)
        .specialization_info(&specialization_info)
        .build()];
    if let Some(module) = pixel_module {
        shader_stages.push(
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(module)
                .name(ENTRY_POINT)
                .specialization_info(&specialization_info)
                .build(),
        );
    }

    // Vertex input
    let vertex_bindings = [vk::VertexInputBindingDescription {
        binding: 0,
        stride: desc.vertex_layout.stride,
        input_rate: vk::VertexInputRate::VERTEX,
    }];
    let vertex_attributes: Vec<vk::VertexInputAttributeDescription> = desc
        .vertex_layout
        .attributes
        .iter()
        .map(|attribute| vk::VertexInputAttributeDescription {
            location: attribute.location,
            binding: 0,
            format: convert::vertex_format(attribute.format),
            offset: attribute.offset,
        })
        .collect();
    let bindings: &[vk::VertexInputBindingDescription] = if desc.vertex_layout.attributes.is_empty() {
        &[]
    } else {
        &vertex_bindings
    };
    let vertex_input_info = vk::PipelineVertexInputStateCreateInfo::builder()
        .vertex_binding_descriptions(bindings)
        .vertex_attribute_descriptions(&vertex_attributes);

    let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
        .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
        .primitive_restart_enable(false);

    let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
        .viewport_count(1)
        .scissor_count(1);

    let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
        .depth_clamp_enable(false)
        .rasterizer_discard_enable(false)
        .polygon_mode(vk::PolygonMode::FILL)
        .line_width(1.0)
        .cull_mode(convert::cull_mode(state.cull_mode()))
        .front_face(vk::FrontFace::CLOCKWISE)
        .depth_bias_enable(false);

    let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
        .sample_shading_enable(false)
        .rasterization_samples(convert::sample_count(desc.sample_count));

    // Depth and stencil testing
    let (fail, depth_fail, pass) = state.stencil_ops();
    let stencil = vk::StencilOpState {
        fail_op: convert::stencil_op(fail),
        pass_op: convert::stencil_op(pass),
        depth_fail_op: convert::stencil_op(depth_fail),
        compare_op: convert::compare_op(state.stencil_mode()),
        compare_mask: u32::from(state.stencil_mask()),
        write_mask: u32::from(state.stencil_mask()),
        reference: u32::from(state.stencil_ref()),
    };
    let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::builder()
        .depth_test_enable(state.depth_mode() != CompareMode::Always || state.depth_write())
        .depth_write_enable(state.depth_write())
        .depth_compare_op(convert::compare_op(state.depth_mode()))
        .depth_bounds_test_enable(false)
        .stencil_test_enable(state.stencil_enabled())
        .front(stencil)
        .back(stencil);

    // Depth-only variants have no pixel stage and no color attachment
    let color_blend_attachments = [convert::blend_attachment(state.blend_mode())];
    let attachments: &[vk::PipelineColorBlendAttachmentState] = if pixel_module.is_some() {
        &color_blend_attachments
    } else {
        &[]
    };
    let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
        .logic_op_enable(false)
        .attachments(attachments);

    let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
    let dynamic_state = vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);

    let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
        .stages(&shader_stages)
        .vertex_input_state(&vertex_input_info)
        .input_assembly_state(&input_assembly)
        .viewport_state(&viewport_state)
        .rasterization_state(&rasterizer)
        .multisample_state(&multisampling)
        .depth_stencil_state(&depth_stencil)
        .color_blend_state(&color_blending)
        .dynamic_state(&dynamic_state)
        .layout(*desc.layout)
        .render_pass(desc.render_pass)
        .subpass(0);

    let pipelines = unsafe {
        device
            .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info.build()], None)
            .map_err(|(_, err)| {
                BackendError::PipelineCreation(format!("'{}' ({:?}): {:?}", desc.name, state, err))
            })?
    };

    pipelines
        .into_iter()
        .next()
        .ok_or_else(|| BackendError::PipelineCreation(format!("'{}' returned no pipeline", desc.name)))
}
