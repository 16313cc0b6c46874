use wgpu::util::DeviceExt;

use crate::{combine::CombinedMesh, data_structures::model::GpuMesh};

/// Upload the vertex and index buffers of a combined mesh.
pub fn upload_combined_mesh(device: &wgpu::Device, mesh: &CombinedMesh, name: &str) -> GpuMesh {
    let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(&format!("{:?} Vertex Buffer", name)),
        contents: bytemuck::cast_slice(&mesh.vertices),
        usage: wgpu::BufferUsages::VERTEX,
    });
    let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(&format!("{:?} Index Buffer", name)),
        contents: bytemuck::cast_slice(&mesh.indices),
        usage: wgpu::BufferUsages::INDEX,
    });
    log::debug!(
        "uploaded {} with {} vertices and {} indices",
        name,
        mesh.vertex_count(),
        mesh.indices.len()
    );

    GpuMesh {
        name: name.to_string(),
        vertex_buffer,
        index_buffer,
        num_elements: mesh.indices.len() as u32,
    }
}
