use wgpu::util::DeviceExt;

/// One directional and one hemispheric light, as the combined program shades.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SceneLighting {
    /// Direction the light travels in.
    pub direction: cgmath::Vector3<f32>,
    pub diffuse: [f32; 3],
    pub intensity: f32,
    /// Up direction of the hemisphere (towards the sky color).
    pub hemisphere_up: cgmath::Vector3<f32>,
    pub sky: [f32; 3],
    pub ground: [f32; 3],
    pub hemisphere_intensity: f32,
}

impl Default for SceneLighting {
    fn default() -> Self {
        Self {
            direction: cgmath::Vector3::new(-0.5, -1.0, -0.5),
            diffuse: [1.0, 1.0, 1.0],
            intensity: 0.7,
            hemisphere_up: cgmath::Vector3::new(0.0, 1.0, 0.0),
            sky: [1.0, 1.0, 1.0],
            ground: [0.2, 0.2, 0.2],
            hemisphere_intensity: 0.6,
        }
    }
}

fn scaled(color: [f32; 3], intensity: f32) -> [f32; 4] {
    [color[0] * intensity, color[1] * intensity, color[2] * intensity, 1.0]
}

/// Per-frame uniform of the combined and pick programs (bind group 0).
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SceneUniform {
    pub view_proj: [[f32; 4]; 4],
    pub camera_position: [f32; 4],
    pub light_direction: [f32; 4],
    pub light_diffuse: [f32; 4],
    pub hemisphere_up: [f32; 4],
    pub sky_color: [f32; 4],
    pub ground_color: [f32; 4],
}

impl SceneUniform {
    pub fn new(
        view_proj: cgmath::Matrix4<f32>,
        camera_position: cgmath::Vector3<f32>,
        lighting: &SceneLighting,
    ) -> Self {
        let d = lighting.direction;
        let up = lighting.hemisphere_up;
        Self {
            view_proj: view_proj.into(),
            camera_position: [camera_position.x, camera_position.y, camera_position.z, 1.0],
            light_direction: [d.x, d.y, d.z, 0.0],
            light_diffuse: scaled(lighting.diffuse, lighting.intensity),
            hemisphere_up: [up.x, up.y, up.z, 0.0],
            sky_color: scaled(lighting.sky, lighting.hemisphere_intensity),
            ground_color: scaled(lighting.ground, lighting.hemisphere_intensity),
        }
    }

    /// WGSL declaration matching this layout, bound at `@group(0) @binding(0)`.
    pub fn wgsl() -> &'static str {
        "struct SceneUniform {
    view_proj: mat4x4<f32>,
    camera_position: vec4<f32>,
    light_direction: vec4<f32>,
    light_diffuse: vec4<f32>,
    hemisphere_up: vec4<f32>,
    sky_color: vec4<f32>,
    ground_color: vec4<f32>,
}

@group(0) @binding(0)
var<uniform> scene: SceneUniform;
"
    }
}

pub fn mk_buffer(device: &wgpu::Device, uniform: SceneUniform) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Scene Uniform Buffer"),
        contents: bytemuck::cast_slice(&[uniform]),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    })
}

pub fn mk_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
        label: Some("scene_bind_group_layout"),
    })
}

pub fn mk_bind_group(
    device: &wgpu::Device,
    bind_group_layout: &wgpu::BindGroupLayout,
    buffer: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout: bind_group_layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: buffer.as_entire_binding(),
        }],
        label: Some("scene_bind_group"),
    })
}
