//! Raw per-piece vertex data as handed over by the scene layer.

use std::sync::Arc;

use cgmath::InnerSpace;

use crate::data_structures::{material::MaterialId, model::GpuMesh, scene_graph::NodeId};

/// Vertex attribute arrays of one geometry piece.
///
/// Only positions are mandatory. Missing normals are computed, missing UV
/// channels are zero-filled and missing indices are treated as a plain
/// triangle list. `uvs2` and `uvs3` are secondary sets such as lightmap
/// coordinates.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VertexData {
    pub positions: Vec<[f32; 3]>,
    pub normals: Option<Vec<[f32; 3]>>,
    pub uvs: Option<Vec<[f32; 2]>>,
    pub uvs2: Option<Vec<[f32; 2]>>,
    pub uvs3: Option<Vec<[f32; 2]>>,
    pub indices: Option<Vec<u32>>,
}

impl VertexData {
    pub fn new(positions: Vec<[f32; 3]>) -> Self {
        Self {
            positions,
            ..Default::default()
        }
    }

    pub fn with_indices(mut self, indices: Vec<u32>) -> Self {
        self.indices = Some(indices);
        self
    }

    pub fn with_normals(mut self, normals: Vec<[f32; 3]>) -> Self {
        self.normals = Some(normals);
        self
    }

    pub fn with_uvs(mut self, uvs: Vec<[f32; 2]>) -> Self {
        self.uvs = Some(uvs);
        self
    }

    pub fn with_uvs2(mut self, uvs: Vec<[f32; 2]>) -> Self {
        self.uvs2 = Some(uvs);
        self
    }

    pub fn with_uvs3(mut self, uvs: Vec<[f32; 2]>) -> Self {
        self.uvs3 = Some(uvs);
        self
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Whole triangles of the piece, generating `0..vertex_count` when no
    /// indices are stored.
    ///
    /// A trailing partial triangle and triangles referencing a vertex past
    /// the position count are dropped with a warning.
    pub fn triangle_indices(&self) -> Vec<u32> {
        let generated;
        let indices = match &self.indices {
            Some(indices) => indices.as_slice(),
            None => {
                generated = (0..self.positions.len() as u32).collect::<Vec<_>>();
                generated.as_slice()
            }
        };
        let count = self.positions.len() as u32;
        let triangles = indices.chunks_exact(3);
        if !triangles.remainder().is_empty() {
            log::warn!(
                "dropping {} trailing indices that do not form a triangle",
                triangles.remainder().len()
            );
        }
        let mut valid = Vec::with_capacity(indices.len() - triangles.remainder().len());
        for triangle in triangles {
            if triangle.iter().any(|&i| i >= count) {
                log::warn!(
                    "dropping triangle {:?}, the piece has {} vertices",
                    triangle,
                    count
                );
                continue;
            }
            valid.extend_from_slice(triangle);
        }
        valid
    }

    /// Normals of the piece. Stored normals win if their count matches the
    /// positions, otherwise they are recomputed from the faces.
    pub fn resolved_normals(&self, indices: &[u32]) -> Vec<[f32; 3]> {
        match &self.normals {
            Some(normals) if normals.len() == self.positions.len() => normals.clone(),
            Some(normals) => {
                log::warn!(
                    "ignoring {} normals for {} positions, recomputing",
                    normals.len(),
                    self.positions.len()
                );
                compute_normals(&self.positions, indices)
            }
            None => compute_normals(&self.positions, indices),
        }
    }

    /// The three UV channels of the piece, each zero-filled to the vertex
    /// count when absent.
    pub fn resolved_uvs(&self) -> [Vec<[f32; 2]>; 3] {
        [&self.uvs, &self.uvs2, &self.uvs3].map(|channel| {
            let mut uvs = channel.clone().unwrap_or_default();
            uvs.resize(self.positions.len(), [0.0, 0.0]);
            uvs
        })
    }
}

/// Area weighted vertex normals.
///
/// The unnormalised face normal (cross product of two edges) is proportional to
/// the triangle's area, so accumulating it per corner weighs large faces more.
pub fn compute_normals(positions: &[[f32; 3]], indices: &[u32]) -> Vec<[f32; 3]> {
    let mut accumulated = vec![cgmath::Vector3::new(0.0f32, 0.0, 0.0); positions.len()];
    for c in indices.chunks_exact(3) {
        let (a, b, d) = (c[0] as usize, c[1] as usize, c[2] as usize);
        if a >= positions.len() || b >= positions.len() || d >= positions.len() {
            log::warn!("triangle ({}, {}, {}) references a missing vertex", a, b, d);
            continue;
        }
        let pos0: cgmath::Vector3<f32> = positions[a].into();
        let pos1: cgmath::Vector3<f32> = positions[b].into();
        let pos2: cgmath::Vector3<f32> = positions[d].into();
        let face = (pos1 - pos0).cross(pos2 - pos0);
        accumulated[a] += face;
        accumulated[b] += face;
        accumulated[d] += face;
    }
    accumulated
        .into_iter()
        .map(|n| {
            if n.magnitude2() > 0.0 {
                n.normalize().into()
            } else {
                [0.0, 0.0, 0.0]
            }
        })
        .collect()
}

/// Where a piece gets its vertices from.
#[derive(Clone, Debug)]
pub enum GeometrySource {
    Owned(Arc<VertexData>),
    /// Render-instancing proxy drawing the geometry of another piece.
    InstanceOf(NodeId),
}

/// One original drawable geometry unit before combining.
#[derive(Debug)]
pub struct GeometryPiece {
    pub geometry: GeometrySource,
    pub material: Option<MaterialId>,
    /// Thin (per-draw) instances drawn with this piece's geometry.
    pub thin_instances: u32,
    /// GPU buffers of the unmerged piece, released when the piece is disposed.
    pub gpu: Option<GpuMesh>,
}

impl GeometryPiece {
    pub fn new(data: VertexData, material: Option<MaterialId>) -> Self {
        Self {
            geometry: GeometrySource::Owned(Arc::new(data)),
            material,
            thin_instances: 0,
            gpu: None,
        }
    }

    pub fn instance_of(source: NodeId, material: Option<MaterialId>) -> Self {
        Self {
            geometry: GeometrySource::InstanceOf(source),
            material,
            thin_instances: 0,
            gpu: None,
        }
    }

    pub fn vertex_data(&self) -> Option<&VertexData> {
        match &self.geometry {
            GeometrySource::Owned(data) => Some(data),
            GeometrySource::InstanceOf(_) => None,
        }
    }

    /// Release the GPU resources of the piece.
    pub fn dispose(self) {
        if let Some(gpu) = self.gpu {
            gpu.destroy();
        }
    }
}
