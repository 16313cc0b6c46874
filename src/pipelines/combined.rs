use crate::{
    data_structures::{
        material::TransparencyMode,
        model::{CombinedVertex, Vertex},
        texture::Texture,
    },
    material::CombinedProgram,
    resources::data_texture::data_texture_layout,
};

use super::light;

/// Layouts shared by every combined pipeline of a scene.
pub struct CombinedLayouts {
    pub scene: wgpu::BindGroupLayout,
    pub data: wgpu::BindGroupLayout,
}

impl CombinedLayouts {
    pub fn new(device: &wgpu::Device) -> Self {
        Self {
            scene: light::mk_bind_group_layout(device),
            data: data_texture_layout(device),
        }
    }
}

/// Render pipeline of one material group. `maps` is the layout of its texture
/// maps. Blending groups draw without depth writes.
pub fn mk_combined_pipeline(
    device: &wgpu::Device,
    color_format: wgpu::TextureFormat,
    layouts: &CombinedLayouts,
    maps: &wgpu::BindGroupLayout,
    program: &CombinedProgram,
) -> wgpu::RenderPipeline {
    let render_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Combined Pipeline Layout"),
        bind_group_layouts: &[Some(&layouts.scene), Some(&layouts.data), Some(maps)],
        immediate_size: 0,
    });

    let label = format!("Combined Shader (group {})", program.group_index);
    let shader = wgpu::ShaderModuleDescriptor {
        label: Some(&label),
        source: wgpu::ShaderSource::Wgsl(program.wgsl.as_str().into()),
    };

    let blends = program.transparency.blends();
    mk_render_pipeline(
        device,
        &render_pipeline_layout,
        color_format,
        Some(blend_state(program.transparency)),
        Some(Texture::DEPTH_FORMAT),
        !blends,
        &[CombinedVertex::desc()],
        shader,
    )
}

pub fn blend_state(transparency: TransparencyMode) -> wgpu::BlendState {
    if transparency.blends() {
        wgpu::BlendState::ALPHA_BLENDING
    } else {
        wgpu::BlendState::REPLACE
    }
}

pub fn mk_render_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    color_format: wgpu::TextureFormat,
    blend: Option<wgpu::BlendState>,
    depth_format: Option<wgpu::TextureFormat>,
    depth_write: bool,
    vertex_layouts: &[wgpu::VertexBufferLayout],
    shader: wgpu::ShaderModuleDescriptor,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(shader);

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        cache: None,
        label: Some("Combined Pipeline"),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: vertex_layouts,
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: color_format,
                blend,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: Some(wgpu::Face::Back),
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: depth_format.map(|format| wgpu::DepthStencilState {
            format,
            depth_write_enabled: Some(depth_write),
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
