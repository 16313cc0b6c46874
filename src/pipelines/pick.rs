use wgpu::{PipelineLayout, ShaderModule};

use crate::data_structures::{
    model::{CombinedVertex, Vertex},
    texture::Texture,
};

use super::combined::CombinedLayouts;

fn pick_render_pipeline_layout(device: &wgpu::Device, layouts: &CombinedLayouts) -> PipelineLayout {
    device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Render Pipeline Layout (For picking)"),
        bind_group_layouts: &[Some(&layouts.scene), Some(&layouts.data)],
        immediate_size: 0,
    })
}

fn pick_shader(device: &wgpu::Device, wgsl: &str) -> ShaderModule {
    let shader = wgpu::ShaderModuleDescriptor {
        label: Some("Pick Shader"),
        source: wgpu::ShaderSource::Wgsl(wgsl.into()),
    };
    device.create_shader_module(shader)
}

fn pick_target() -> Option<wgpu::ColorTargetState> {
    Some(wgpu::ColorTargetState {
        format: Texture::FLOAT_FORMAT,
        // float32 targets are not blendable
        blend: None,
        write_mask: wgpu::ColorWrites::ALL,
    })
}

/// Pick pipeline shared by all material groups. Writes position and instance
/// index to target 0 and the normal to target 1.
pub fn mk_pick_pipeline(
    device: &wgpu::Device,
    layouts: &CombinedLayouts,
    wgsl: &str,
) -> wgpu::RenderPipeline {
    let render_pipeline_layout = pick_render_pipeline_layout(device, layouts);

    let shader = pick_shader(device, wgsl);

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        cache: None,
        label: Some("Pick Pipeline"),
        layout: Some(&render_pipeline_layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: &[CombinedVertex::desc()],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &[pick_target(), pick_target()],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: Some(wgpu::Face::Back),
            // Setting this to anything other than Fill requires Features::NON_FILL_POLYGON_MODE
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: Texture::DEPTH_FORMAT,
            depth_write_enabled: Some(true),
            depth_compare: Some(wgpu::CompareFunction::Less),
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview_mask: None,
    })
}
