use crate::{data_structures::texture::Texture, data_texture::TexelSink};

/// Bindings 0, 1 and 2: transform, instance and material data textures.
pub fn data_texture_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let entry = |binding| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            multisampled: false,
            view_dimension: wgpu::TextureViewDimension::D2,
            // read with textureLoad only
            sample_type: wgpu::TextureSampleType::Float { filterable: false },
        },
        count: None,
    };
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[entry(0), entry(1), entry(2)],
        label: Some("data_texture_bind_group_layout"),
    })
}

/// GPU side of a data texture. Its size is fixed when created.
pub struct GpuDataTexture {
    pub texture: Texture,
    side: u32,
    queue: wgpu::Queue,
}

impl GpuDataTexture {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, side: u32, label: &str) -> Self {
        Self {
            texture: Texture::create_data_texture(device, side, label),
            side: side.max(1),
            queue: queue.clone(),
        }
    }

    pub fn side(&self) -> u32 {
        self.side
    }
}

impl TexelSink for GpuDataTexture {
    fn upload(&mut self, side: u32, texels: &[f32]) {
        if side != self.side {
            log::error!(
                "data texture upload of side {} does not fit a texture of side {}",
                side,
                self.side
            );
            return;
        }
        let size = wgpu::Extent3d {
            width: side,
            height: side,
            depth_or_array_layers: 1,
        };
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture: &self.texture.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            bytemuck::cast_slice(texels),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(16 * side),
                rows_per_image: Some(side),
            },
            size,
        );
    }
}

/// The three data textures of a scene, in binding order.
pub struct GpuDataTextures {
    pub transforms: GpuDataTexture,
    pub instances: GpuDataTexture,
    pub materials: GpuDataTexture,
    pub bind_group: wgpu::BindGroup,
}

impl GpuDataTextures {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
        sides: [u32; 3],
    ) -> Self {
        let transforms = GpuDataTexture::new(device, queue, sides[0], "transform_data_texture");
        let instances = GpuDataTexture::new(device, queue, sides[1], "instance_data_texture");
        let materials = GpuDataTexture::new(device, queue, sides[2], "material_data_texture");
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&transforms.texture.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&instances.texture.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&materials.texture.view),
                },
            ],
            label: Some("data_texture_bind_group"),
        });
        Self {
            transforms,
            instances,
            materials,
            bind_group,
        }
    }

    pub fn targets(&mut self) -> crate::material::FlushTargets<'_> {
        crate::material::FlushTargets {
            transforms: &mut self.transforms,
            instances: &mut self.instances,
            materials: &mut self.materials,
        }
    }
}
