use anyhow::Context as _;

use crate::{
    data_structures::{
        material::{MaterialTextures, TextureRef},
        texture::Texture,
    },
    material::MapKind,
};

/// Texture/sampler pairs of the maps a group declares, in declaration order.
pub fn map_layout(device: &wgpu::Device, maps: &[MapKind]) -> wgpu::BindGroupLayout {
    let entries: Vec<wgpu::BindGroupLayoutEntry> = (0..maps.len() as u32)
        .flat_map(|i| {
            [
                wgpu::BindGroupLayoutEntry {
                    binding: i * 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: i * 2 + 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ]
        })
        .collect();
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &entries,
        label: Some("material_map_bind_group_layout"),
    })
}

pub fn texture_for(textures: &MaterialTextures, kind: MapKind) -> Option<&TextureRef> {
    match kind {
        MapKind::Albedo => textures.albedo.as_ref(),
        MapKind::Bump => textures.bump.as_ref(),
        MapKind::Emissive => textures.emissive.as_ref(),
        MapKind::AmbientOcclusion => textures.ambient.as_ref(),
        MapKind::Opacity => textures.opacity.as_ref(),
    }
}

#[cfg(target_arch = "wasm32")]
fn format_url(file_name: &str) -> anyhow::Result<reqwest::Url> {
    let window = web_sys::window().context("no window")?;
    let origin = window
        .location()
        .origin()
        .map_err(|_| anyhow::anyhow!("window has no origin"))?;
    let base = reqwest::Url::parse(&format!("{}/assets/", origin))?;
    Ok(base.join(file_name)?)
}

pub async fn load_binary(file_name: &str) -> anyhow::Result<Vec<u8>> {
    #[cfg(target_arch = "wasm32")]
    let data = {
        let url = format_url(file_name)?;
        reqwest::get(url).await?.bytes().await?.to_vec()
    };
    #[cfg(not(target_arch = "wasm32"))]
    let data = {
        let path = std::path::Path::new("./").join("assets").join(file_name);
        std::fs::read(&path).with_context(|| format!("reading {}", path.display()))?
    };

    Ok(data)
}

/// Decode the image behind `texture` for a map of `kind`.
pub async fn load_map(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &TextureRef,
    kind: MapKind,
) -> anyhow::Result<Texture> {
    match texture {
        TextureRef::Url(url) => {
            let data = load_binary(url).await?;
            Texture::from_bytes(device, queue, &data, url, None, kind.is_linear())
        }
        TextureRef::Buffer(bytes) => {
            Texture::from_bytes(device, queue, bytes, kind.wgsl_name(), None, kind.is_linear())
        }
    }
}

/// Load every map in `maps` from `textures` and bind them against `layout`.
pub async fn load_map_bind_group(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    layout: &wgpu::BindGroupLayout,
    textures: &MaterialTextures,
    maps: &[MapKind],
) -> anyhow::Result<wgpu::BindGroup> {
    let mut loaded = Vec::with_capacity(maps.len());
    for kind in maps {
        let source = texture_for(textures, *kind)
            .with_context(|| format!("material declares a {} map without a texture", kind.wgsl_name()))?;
        loaded.push(load_map(device, queue, source, *kind).await?);
    }
    let fallback = crate::data_structures::texture::create_default_sampler(device);
    let entries: Vec<wgpu::BindGroupEntry> = loaded
        .iter()
        .enumerate()
        .flat_map(|(i, texture)| {
            let i = i as u32;
            [
                wgpu::BindGroupEntry {
                    binding: i * 2,
                    resource: wgpu::BindingResource::TextureView(&texture.view),
                },
                wgpu::BindGroupEntry {
                    binding: i * 2 + 1,
                    resource: wgpu::BindingResource::Sampler(
                        texture.sampler.as_ref().unwrap_or(&fallback),
                    ),
                },
            ]
        })
        .collect();
    Ok(device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout,
        entries: &entries,
        label: Some("material_map_bind_group"),
    }))
}
