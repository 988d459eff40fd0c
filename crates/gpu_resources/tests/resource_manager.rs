//! Resource manager integration tests
//!
//! Everything runs against the headless device, which validates transfer
//! layouts and counts every native object it creates and destroys.

use std::collections::HashSet;

use gpu_resources::backend::ImageLayout;
use gpu_resources::foundation::logging;
use gpu_resources::prelude::*;

fn init() {
    logging::init_for_tests();
}

fn manager() -> ResourceManager<HeadlessDevice> {
    init();
    ResourceManager::new(HeadlessDevice::new(2), ResourceManagerConfig::default()).unwrap()
}

/// Smallest module header the headless device accepts
fn spirv_stub() -> Vec<u8> {
    [0x0723_0203_u32, 0x0001_0000, 0, 1, 0]
        .iter()
        .flat_map(|word| word.to_le_bytes())
        .collect()
}

fn material_layout() -> BindGroupLayoutDesc {
    BindGroupLayoutDesc::new()
        .add_uniform_buffer(0, ShaderStages::VERTEX | ShaderStages::PIXEL)
        .add_sampled_texture(1, ShaderStages::PIXEL)
}

fn shader_desc(name: &str) -> ShaderDesc {
    ShaderDesc::new(name, spirv_stub(), spirv_stub())
        .with_bind_group(material_layout())
        .with_vertex_layout(VertexLayout::position_only())
}

#[test]
fn test_handles_are_unique_while_live() {
    let mut resources = manager();
    let handles: Vec<BufferHandle> = (0..16)
        .map(|_| {
            resources
                .create_buffer(&BufferDesc::new(BufferUsage::Vertex, 64), None)
                .unwrap()
        })
        .collect();

    let indices: HashSet<u32> = handles.iter().map(|h| h.index()).collect();
    assert_eq!(indices.len(), 16);
    assert_eq!(resources.stats().buffers.live, 16);
}

fn assert_live_set_unique(resources: &ResourceManager<HeadlessDevice>, tracked: &[BufferHandle]) {
    let indices: HashSet<u32> = tracked.iter().map(|h| h.index()).collect();
    assert_eq!(indices.len(), tracked.len(), "duplicate live index");
    for handle in tracked {
        assert_eq!(resources.resource_state(*handle), SlotState::Live);
    }
    assert_eq!(resources.stats().buffers.live, tracked.len());
}

#[test]
fn test_handles_stay_unique_across_deletion_and_reuse() {
    let mut resources = manager();
    let desc = BufferDesc::new(BufferUsage::Uniform, 32);
    let mut tracked: Vec<BufferHandle> = Vec::new();

    for round in 0..12 {
        for _ in 0..2 {
            tracked.push(resources.create_buffer(&desc, None).unwrap());
            assert_live_set_unique(&resources, &tracked);
        }
        if round % 3 != 2 {
            let victim = tracked.remove(round % tracked.len());
            resources.submit_for_deletion(victim).unwrap();
            assert_live_set_unique(&resources, &tracked);
        }
        resources.tick_deletion_queue(1);
        assert_live_set_unique(&resources, &tracked);
        tracked.push(resources.create_buffer(&desc, None).unwrap());
        assert_live_set_unique(&resources, &tracked);
    }

    // 36 creations; freed slots were handed out again
    let stats = resources.stats().buffers;
    assert!(stats.live + stats.pending + stats.free < 36);
}

#[test]
fn test_deletion_waits_for_frames_in_flight() {
    let mut resources = manager();
    assert_eq!(resources.frames_in_flight(), 2);

    let buffer = resources
        .create_buffer(&BufferDesc::new(BufferUsage::Vertex, 128), Some(&[3u8; 128]))
        .unwrap();
    resources.submit_for_deletion(buffer).unwrap();
    assert_eq!(resources.resource_state(buffer), SlotState::PendingDeletion);
    assert_eq!(resources.deletion_countdown(buffer), Some(2));

    assert_eq!(resources.tick_deletion_queue(1), 0);
    assert_eq!(resources.resource_state(buffer), SlotState::PendingDeletion);
    assert_eq!(resources.deletion_countdown(buffer), Some(1));
    // Still readable while the GPU may be using it
    assert!(resources.buffer(buffer).is_some());

    assert_eq!(resources.tick_deletion_queue(1), 1);
    assert_eq!(resources.resource_state(buffer), SlotState::Free);
    assert_eq!(resources.deletion_countdown(buffer), None);
    assert!(resources.buffer(buffer).is_none());
}

#[test]
fn test_zero_tick_does_not_advance() {
    let mut resources = manager();
    let buffer = resources
        .create_buffer(&BufferDesc::new(BufferUsage::Index, 32), None)
        .unwrap();
    resources.submit_for_deletion(buffer).unwrap();

    assert_eq!(resources.tick_deletion_queue(0), 0);
    assert_eq!(resources.deletion_countdown(buffer), Some(2));
    assert_eq!(resources.tick_deletion_queue(5), 1);
}

#[test]
fn test_freed_index_is_reused_with_fresh_contents() {
    let mut resources = manager();
    let first = resources
        .create_buffer(&BufferDesc::new(BufferUsage::Vertex, 64), Some(&[0xAB; 64]))
        .unwrap();
    resources.submit_for_deletion(first).unwrap();
    resources.tick_deletion_queue(2);
    assert_eq!(resources.stats().buffers.free, 1);

    let second = resources
        .create_buffer(&BufferDesc::new(BufferUsage::Vertex, 64).with_name("second"), None)
        .unwrap();
    assert_eq!(second.index(), first.index());
    assert_eq!(resources.stats().buffers.free, 0);

    let record = resources.buffer(second).unwrap();
    assert_eq!(record.name, "second");
    let contents = resources.device().buffer_contents(record.native()).unwrap();
    assert!(contents[..64].iter().all(|&b| b == 0));
}

#[test]
fn test_double_deletion_is_rejected() {
    let mut resources = manager();
    let buffer = resources
        .create_buffer(&BufferDesc::new(BufferUsage::Storage, 64), None)
        .unwrap();
    resources.submit_for_deletion(buffer).unwrap();

    let err = resources.submit_for_deletion(buffer).unwrap_err();
    assert!(matches!(err, ResourceError::AlreadyPendingDeletion { index, .. } if index == buffer.index()));
    assert_eq!(resources.stats().pending_deletions, 1);

    resources.tick_deletion_queue(2);
    let err = resources.submit_for_deletion(buffer).unwrap_err();
    assert!(matches!(err, ResourceError::InvalidHandle { .. }));
}

#[test]
fn test_host_visible_buffer_reads_back() {
    let mut resources = manager();
    let data: Vec<u8> = (0..=255).collect();
    let uniforms = resources
        .create_buffer(&BufferDesc::new(BufferUsage::Uniform, 256), Some(&data))
        .unwrap();
    assert_eq!(resources.buffer_mapped(uniforms).unwrap(), data.as_slice());

    resources.write_buffer(uniforms, 16, &[9; 4]).unwrap();
    assert_eq!(&resources.buffer_mapped(uniforms).unwrap()[16..20], &[9; 4]);
    assert_eq!(resources.buffer_mapped(uniforms).unwrap()[20], 20);
}

#[test]
fn test_device_local_buffer_goes_through_staging() {
    let mut resources = manager();
    let data: Vec<u8> = (0..=255).rev().collect();
    let transfers_before = resources.device().counters().transfers_submitted;

    let vertices = resources
        .create_buffer(&BufferDesc::new(BufferUsage::Vertex, 256), Some(&data))
        .unwrap();
    assert_eq!(resources.device().counters().transfers_submitted, transfers_before + 1);

    let native = resources.buffer(vertices).unwrap().native();
    assert_eq!(&resources.device().buffer_contents(native).unwrap()[..256], data.as_slice());

    assert!(matches!(
        resources.buffer_mapped(vertices),
        Err(ResourceError::NotHostVisible { .. })
    ));
    assert!(matches!(
        resources.write_buffer(vertices, 0, &[1]),
        Err(ResourceError::NotHostVisible { .. })
    ));

    resources.upload_buffer(vertices, 4, &[7; 4]).unwrap();
    let native = resources.buffer(vertices).unwrap().native();
    assert_eq!(&resources.device().buffer_contents(native).unwrap()[..8], &[255, 254, 253, 252, 7, 7, 7, 7]);
}

#[test]
fn test_initial_data_larger_than_buffer() {
    let mut resources = manager();
    let result = resources.create_buffer(&BufferDesc::new(BufferUsage::Vertex, 16), Some(&[0; 32]));
    assert!(matches!(
        result,
        Err(ResourceError::DataTooLarge { capacity: 16, requested: 32 })
    ));
    assert_eq!(resources.stats().buffers.live, 0);
}

#[test]
fn test_staging_grows_to_twice_the_request() {
    init();
    let config = ResourceManagerConfig::default().with_initial_staging_size(0);
    let mut resources = ResourceManager::new(HeadlessDevice::new(2), config).unwrap();
    assert_eq!(resources.staging_capacity(), 0);

    let mut previous = 0;
    for (size, expected) in [(64u64, 128u64), (4096, 8192), (1 << 20, 2 << 20)] {
        let data = vec![1u8; size as usize];
        resources
            .create_buffer(&BufferDesc::new(BufferUsage::Vertex, size), Some(&data))
            .unwrap();
        let capacity = resources.staging_capacity();
        assert_eq!(capacity, expected);
        assert!(capacity >= size);
        assert!(capacity >= previous);
        previous = capacity;
    }

    // Smaller uploads reuse the existing allocation
    resources
        .create_buffer(&BufferDesc::new(BufferUsage::Vertex, 64), Some(&[2u8; 64]))
        .unwrap();
    assert_eq!(resources.staging_capacity(), 2 << 20);
    assert_eq!(resources.stats().staging_resizes, 3);
}

#[test]
fn test_texture_full_mip_chain_is_generated() {
    let mut resources = manager();
    let desc = TextureDesc::new_2d(64, 64, TextureFormat::Rgba8Unorm)
        .with_mip_levels(0)
        .with_name("albedo");
    let data = vec![200u8; 64 * 64 * 4];

    let texture = resources.create_texture(&desc, Some(&data)).unwrap();
    let record = resources.texture(texture).unwrap();
    assert_eq!(record.mip_levels(), 7);

    let device = resources.device();
    let layouts = device.texture_layouts(record.native()).unwrap();
    assert_eq!(layouts, &[ImageLayout::ShaderReadOnly; 7]);
    assert_eq!(device.texture_level(record.native(), 0).unwrap().len(), 64 * 64 * 4);
    assert_eq!(device.texture_level(record.native(), 6).unwrap(), &[200, 200, 200, 200]);
}

#[test]
fn test_texture_without_data_rests_in_its_layout() {
    let mut resources = manager();
    let desc = TextureDesc::new_2d(32, 32, TextureFormat::Rgba8Unorm)
        .with_mip_levels(1)
        .with_usage(TextureUsage::COLOR_ATTACHMENT);

    let texture = resources.create_texture(&desc, None).unwrap();
    let native = resources.texture(texture).unwrap().native();
    assert_eq!(
        resources.device().texture_layouts(native).unwrap(),
        &[ImageLayout::ColorAttachment]
    );
}

#[test]
fn test_float_format_cannot_generate_mips() {
    let mut resources = manager();
    let desc = TextureDesc::new_2d(16, 16, TextureFormat::R32Float).with_mip_levels(0);
    let data = vec![0u8; 16 * 16 * 4];

    let result = resources.create_texture(&desc, Some(&data));
    assert!(matches!(
        result,
        Err(ResourceError::UnsupportedMipFormat { format: TextureFormat::R32Float })
    ));
    assert_eq!(resources.device().counters().textures_created, 0);

    // A single level needs no blits
    let single = desc.with_mip_levels(1);
    assert!(resources.create_texture(&single, Some(&data)).is_ok());
}

#[test]
fn test_texture_data_must_cover_base_level() {
    let mut resources = manager();
    let desc = TextureDesc::new_2d(8, 8, TextureFormat::Rgba8Unorm);
    let result = resources.create_texture(&desc, Some(&[0u8; 16]));
    assert!(matches!(
        result,
        Err(ResourceError::InsufficientData { required: 256, provided: 16 })
    ));
}

#[test]
fn test_combined_depth_stencil_upload_is_rejected() {
    let mut resources = manager();
    let desc = TextureDesc::new_2d(4, 4, TextureFormat::D24UnormS8Uint)
        .with_mip_levels(1)
        .with_usage(TextureUsage::DEPTH_STENCIL_ATTACHMENT);

    let result = resources.create_texture(&desc, Some(&[0u8; 4 * 4 * 4]));
    assert!(matches!(result, Err(ResourceError::Backend(_))));
    let counters = resources.device().counters();
    assert_eq!(counters.textures_created, counters.textures_destroyed);

    // Without data the texture only needs a layout transition
    assert!(resources.create_texture(&desc, None).is_ok());
}

#[test]
fn test_texture_view_outside_texture_is_rejected() {
    let mut resources = manager();
    let desc = TextureDesc::new_2d(8, 8, TextureFormat::Rgba8Unorm).with_mip_levels(2);
    let texture = resources.create_texture(&desc, None).unwrap();

    let view = resources
        .create_texture_view(texture, &TextureViewDesc::default(), &SamplerDesc::default())
        .unwrap();
    let resolved = &resources.texture_view(view).unwrap().desc;
    assert_eq!(resolved.mip_count, 2);
    assert_eq!(resolved.layer_count, 1);

    let out_of_range = TextureViewDesc {
        base_mip: 2,
        ..TextureViewDesc::default()
    };
    assert!(matches!(
        resources.create_texture_view(texture, &out_of_range, &SamplerDesc::default()),
        Err(ResourceError::InvalidTextureView { .. })
    ));

    let reinterpreted = TextureViewDesc {
        format: Some(TextureFormat::D32Float),
        ..TextureViewDesc::default()
    };
    assert!(matches!(
        resources.create_texture_view(texture, &reinterpreted, &SamplerDesc::default()),
        Err(ResourceError::InvalidTextureView { .. })
    ));
    assert_eq!(resources.device().counters().views_created, 1);
}

#[test]
fn test_identical_layouts_are_shared_across_shaders() {
    let mut resources = manager();
    let first = resources.create_shader(&shader_desc("lit")).unwrap();
    let second = resources.create_shader(&shader_desc("unlit")).unwrap();

    assert_eq!(resources.stats().cached_layouts, 1);
    assert_eq!(resources.device().counters().bind_group_layouts_created, 1);
    assert_eq!(
        resources.bind_group_layout(first, 0),
        resources.bind_group_layout(second, 0)
    );

    let other = ShaderDesc::new("shadow", spirv_stub(), spirv_stub())
        .with_bind_group(BindGroupLayoutDesc::new().add_uniform_buffer(0, ShaderStages::VERTEX));
    let third = resources.create_shader(&other).unwrap();
    assert_eq!(resources.stats().cached_layouts, 2);
    assert_ne!(
        resources.bind_group_layout(first, 0),
        resources.bind_group_layout(third, 0)
    );
}

#[test]
fn test_too_many_bind_groups() {
    let mut resources = manager();
    let mut desc = shader_desc("wide");
    for _ in 0..4 {
        desc = desc.with_bind_group(material_layout());
    }
    assert!(matches!(
        resources.create_shader(&desc),
        Err(ResourceError::TooManyBindGroups { count: 5 })
    ));
}

#[test]
fn test_invalid_bytecode_is_rejected() {
    let mut resources = manager();
    let desc = ShaderDesc::vertex_only("broken", vec![1, 2, 3]);
    assert!(matches!(resources.create_shader(&desc), Err(ResourceError::Backend(_))));
    assert_eq!(resources.stats().shaders.live, 0);
}

#[test]
fn test_variants_compile_once_per_key() {
    let mut resources = manager();
    let shader = resources.create_shader(&shader_desc("lit")).unwrap();
    let state = GraphicsState::opaque();
    assert!(!resources.variant_exists(shader, state, 1, SampleCount::X1));

    let first = resources.get_or_create_variant(shader, state, 1, SampleCount::X1).unwrap();
    let again = resources.get_or_create_variant(shader, state, 1, SampleCount::X1).unwrap();
    assert_eq!(first, again);
    assert_eq!(resources.device().counters().pipelines_compiled, 1);
    assert_eq!(resources.stats().pipeline_compilations, 1);
    assert!(resources.variant_exists(shader, state, 1, SampleCount::X1));

    let msaa = resources.get_or_create_variant(shader, state, 1, SampleCount::X4).unwrap();
    let other_pass = resources.get_or_create_variant(shader, state, 2, SampleCount::X1).unwrap();
    let blended = resources
        .get_or_create_variant(shader, state.with_blend_mode(BlendMode::Alpha), 1, SampleCount::X1)
        .unwrap();

    let distinct: HashSet<_> = [first, msaa, other_pass, blended].into_iter().collect();
    assert_eq!(distinct.len(), 4);
    assert_eq!(resources.device().counters().pipelines_compiled, 4);
    assert_eq!(resources.shader_variants(shader).unwrap().len(), 4);

    let variant = resources.variant(blended).unwrap();
    assert_eq!(variant.pipeline().state.blend_mode(), BlendMode::Alpha);
}

#[test]
fn test_deleting_shader_destroys_its_variants() {
    let mut resources = manager();
    let shader = resources.create_shader(&shader_desc("lit")).unwrap();
    for samples in [SampleCount::X1, SampleCount::X2] {
        resources
            .get_or_create_variant(shader, GraphicsState::opaque(), 0, samples)
            .unwrap();
    }
    assert_eq!(resources.device().live_pipeline_count(), 2);

    let compiled = resources.shader_variants(shader).unwrap()[0];
    resources.submit_for_deletion(shader).unwrap();

    // Compiled variants stay bindable until the countdown runs out
    assert_eq!(
        resources
            .get_or_create_variant(shader, GraphicsState::opaque(), 0, SampleCount::X1)
            .unwrap(),
        compiled
    );
    assert!(matches!(
        resources.get_or_create_variant(shader, GraphicsState::opaque(), 0, SampleCount::X4),
        Err(ResourceError::AlreadyPendingDeletion { .. })
    ));
    assert_eq!(resources.device().counters().pipelines_compiled, 2);

    resources.tick_deletion_queue(2);
    assert_eq!(resources.device().live_pipeline_count(), 0);
    assert_eq!(resources.stats().variants, 0);
    assert_eq!(resources.device().counters().pipeline_layouts_destroyed, 1);
    // Layouts stay cached for the next shader
    assert_eq!(resources.stats().cached_layouts, 1);
}

#[test]
fn test_compute_shader_shares_layouts_and_is_deleted() {
    let mut resources = manager();
    let graphics = resources.create_shader(&shader_desc("lit")).unwrap();
    let compute = resources
        .create_compute_shader(&ComputeShaderDesc::new("cull", spirv_stub()).with_bind_group(material_layout()))
        .unwrap();

    // Structurally equal bind group reuses the graphics shader's native layout
    assert_eq!(resources.stats().cached_layouts, 1);
    assert_eq!(
        resources.compute_shader(compute).unwrap().bind_group_layout(0),
        resources.bind_group_layout(graphics, 0)
    );
    let counters = resources.device().counters();
    assert_eq!(counters.compute_pipelines_compiled, 1);
    assert_eq!(counters.pipelines_compiled, 0);
    assert_eq!(resources.stats().compute_shaders.live, 1);

    resources.submit_for_deletion(compute).unwrap();
    assert!(matches!(
        resources.submit_for_deletion(compute),
        Err(ResourceError::AlreadyPendingDeletion { .. })
    ));
    assert_eq!(resources.tick_deletion_queue(1), 0);
    assert!(resources.compute_shader(compute).is_some());
    assert_eq!(resources.tick_deletion_queue(1), 1);

    assert_eq!(resources.resource_state(compute), SlotState::Free);
    let counters = resources.device().counters();
    assert_eq!(counters.compute_pipelines_destroyed, 1);
    assert_eq!(counters.pipeline_layouts_destroyed, 1);
    assert_eq!(resources.stats().cached_layouts, 1);
}

#[test]
fn test_compute_shader_with_bad_code_leaks_nothing() {
    let mut resources = manager();
    let result = resources.create_compute_shader(&ComputeShaderDesc::new("broken", vec![0u8; 16]));
    assert!(matches!(result, Err(ResourceError::Backend(_))));

    let counters = resources.device().counters();
    assert_eq!(counters.pipeline_layouts_created, counters.pipeline_layouts_destroyed);
    assert_eq!(counters.compute_pipelines_compiled, 0);
    assert_eq!(resources.stats().compute_shaders.live, 0);
}

#[test]
fn test_dynamic_blocks_recycle_after_frames_in_flight() {
    let mut resources = manager();
    let first = resources.request_dynamic_buffer().unwrap();
    assert!(resources.buffer_mapped(first.buffer).is_ok());
    resources.return_dynamic_buffer(first).unwrap();

    let second = resources.request_dynamic_buffer().unwrap();
    assert_ne!(second.buffer, first.buffer);

    resources.tick_deletion_queue(1);
    let third = resources.request_dynamic_buffer().unwrap();
    assert_ne!(third.buffer, first.buffer);

    resources.tick_deletion_queue(1);
    let fourth = resources.request_dynamic_buffer().unwrap();
    assert_eq!(fourth.buffer, first.buffer);

    assert!(resources.return_dynamic_buffer(fourth).is_ok());
    assert!(resources.return_dynamic_buffer(fourth).is_err());
}

#[test]
fn test_shutdown_destroys_dynamic_blocks() {
    let mut resources = manager();
    let baseline = resources.device().counters().buffers_created;
    let outstanding = resources.request_dynamic_buffer().unwrap();
    let returned = resources.request_dynamic_buffer().unwrap();
    resources.return_dynamic_buffer(returned).unwrap();
    assert_eq!(resources.stats().buffers.live, 2);

    resources.shutdown().unwrap();
    let counters = resources.device().counters();
    assert_eq!(counters.buffers_created, baseline + 2);
    assert_eq!(counters.buffers_destroyed, counters.buffers_created);
    assert_eq!(resources.resource_state(outstanding.buffer), SlotState::Free);
    assert_eq!(resources.resource_state(returned.buffer), SlotState::Free);
}

#[test]
fn test_shutdown_destroys_everything() {
    let mut resources = manager();
    let buffer = resources
        .create_buffer(&BufferDesc::new(BufferUsage::Vertex, 64), Some(&[1; 64]))
        .unwrap();
    let texture = resources
        .create_texture(&TextureDesc::new_2d(4, 4, TextureFormat::Rgba8Unorm), None)
        .unwrap();
    resources
        .create_texture_view(texture, &TextureViewDesc::default(), &SamplerDesc::default())
        .unwrap();
    let shader = resources.create_shader(&shader_desc("lit")).unwrap();
    resources
        .get_or_create_variant(shader, GraphicsState::opaque(), 0, SampleCount::X1)
        .unwrap();
    resources
        .create_compute_shader(&ComputeShaderDesc::new("cull", spirv_stub()))
        .unwrap();
    resources.request_dynamic_buffer().unwrap();
    resources.submit_for_deletion(buffer).unwrap();

    resources.shutdown().unwrap();
    resources.shutdown().unwrap();

    let counters = resources.device().counters();
    assert_eq!(counters.buffers_created, counters.buffers_destroyed);
    assert_eq!(counters.textures_created, counters.textures_destroyed);
    assert_eq!(counters.views_created, counters.views_destroyed);
    assert_eq!(counters.bind_group_layouts_created, counters.bind_group_layouts_destroyed);
    assert_eq!(counters.pipeline_layouts_created, counters.pipeline_layouts_destroyed);
    assert_eq!(counters.pipelines_compiled, counters.pipelines_destroyed);
    assert_eq!(counters.compute_pipelines_compiled, counters.compute_pipelines_destroyed);
    assert_eq!(resources.stats().pending_deletions, 0);
    assert_eq!(resources.staging_capacity(), 0);
}
