//! Geometry combining: many small pieces in, a few large buffers out.
//!
//! [`GeometryCombiner::combine`] walks the subtree below a root in preorder.
//! Every plain geometry piece is turned into a transform-only instance node,
//! its vertices are appended to the open buffer of its material group and each
//! appended vertex is tagged with `(instance_index, material_slot)`. A buffer
//! is sealed when the next piece would push it over the vertex ceiling; pieces
//! are never split.
//!
//! Root and anchor nodes, render-instancing proxies, the pieces they share
//! geometry with and pieces drawing thin instances are left untouched.

use std::collections::HashSet;

use log::{debug, info, warn};

use crate::{
    data_structures::{
        geometry::{GeometryPiece, GeometrySource},
        instance::InstanceNode,
        material::{Material, MaterialId, MaterialLibrary},
        model::CombinedVertex,
        scene_graph::{NodeId, NodeKind, SceneGraph},
    },
    metadata::{self, METADATA_VERSION},
};

pub mod groups;

pub use groups::{MaterialGroup, MaterialGrouping, MaterialSlot};

pub const MESH_ROOT: &str = "MeshRoot";
pub const MATERIAL_ROOT: &str = "MaterialRoot";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CombineConfig {
    /// Maximum number of vertices per combined buffer.
    pub vertex_ceiling: usize,
}

impl Default for CombineConfig {
    fn default() -> Self {
        Self {
            vertex_ceiling: 8_000_000,
        }
    }
}

/// One merged vertex/index buffer. All of its vertices belong to one group.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CombinedMesh {
    pub group_index: u32,
    pub vertices: Vec<CombinedVertex>,
    pub indices: Vec<u32>,
    /// Instance indices whose vertices ended up in this buffer.
    pub instances: Vec<u32>,
}

impl CombinedMesh {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    fn append(&mut self, instance_index: u32, slot: u32, piece: &PieceVertices) {
        let base = self.vertices.len() as u32;
        let [uvs, uvs2, uvs3] = &piece.uvs;
        self.vertices.extend(
            piece
                .positions
                .iter()
                .zip(&piece.normals)
                .zip(uvs.iter().zip(uvs2).zip(uvs3))
                .map(|((position, normal), ((uv, uv2), uv3))| CombinedVertex {
                    position: *position,
                    normal: *normal,
                    uv: *uv,
                    tag: [instance_index, slot],
                    uv2: *uv2,
                    uv3: *uv3,
                }),
        );
        self.indices.extend(piece.indices.iter().map(|i| i + base));
        self.instances.push(instance_index);
    }
}

/// Result of one combine run.
#[derive(Debug, Default)]
pub struct CombineOutput {
    pub meshes: Vec<CombinedMesh>,
    /// Indexed by instance index.
    pub instances: Vec<InstanceNode>,
    pub groups: Vec<MaterialGroup>,
    /// Indexed by material slot.
    pub slots: Vec<MaterialSlot>,
    /// Batch node standing for each mesh, parallel to `meshes`.
    pub mesh_nodes: Vec<NodeId>,
    /// Placeholder node per material slot, parallel to `slots`.
    pub material_nodes: Vec<NodeId>,
    /// Shared material given to pieces without one, if any needed it.
    pub default_material: Option<MaterialId>,
    pub mesh_root: Option<NodeId>,
    pub material_root: Option<NodeId>,
    /// Number of original pieces released after merging.
    pub disposed: usize,
}

impl CombineOutput {
    pub fn instance(&self, index: u32) -> Option<&InstanceNode> {
        self.instances.get(index as usize)
    }
}

/// Vertex attributes of a piece with every optional channel filled in.
struct PieceVertices {
    positions: Vec<[f32; 3]>,
    normals: Vec<[f32; 3]>,
    uvs: [Vec<[f32; 2]>; 3],
    indices: Vec<u32>,
}

impl PieceVertices {
    fn extract(piece: &GeometryPiece) -> Option<Self> {
        let data = piece.vertex_data()?;
        let indices = data.triangle_indices();
        Some(Self {
            positions: data.positions.clone(),
            normals: data.resolved_normals(&indices),
            uvs: data.resolved_uvs(),
            indices,
        })
    }
}

pub struct GeometryCombiner {
    config: CombineConfig,
}

impl GeometryCombiner {
    pub fn new(config: CombineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CombineConfig {
        &self.config
    }

    /// Combine every eligible piece below `root`.
    ///
    /// A default material is added to `library` the first time a piece without
    /// a (known) material is met.
    pub fn combine(
        &self,
        graph: &mut SceneGraph,
        root: NodeId,
        library: &mut MaterialLibrary,
    ) -> CombineOutput {
        let order = graph.descendants(root);
        let shared = shared_geometry(graph, &order);

        let mut out = CombineOutput::default();
        let mut grouping = MaterialGrouping::new();
        // open buffer per group index
        let mut open: Vec<Option<CombinedMesh>> = Vec::new();

        for id in order {
            if id == root || !self.eligible(graph, id, &shared) {
                continue;
            }
            let Some(vertices) = graph
                .get(id)
                .and_then(|n| n.piece())
                .and_then(PieceVertices::extract)
            else {
                continue;
            };
            if vertices.positions.is_empty() {
                warn!("piece {:?} has no positions, skipping it", node_name(graph, id));
                continue;
            }
            let Some(piece) = graph.take_piece(id) else {
                continue;
            };

            let material = match piece.material.filter(|m| library.get(*m).is_some()) {
                Some(material) => material,
                None => {
                    if piece.material.is_some() {
                        warn!("piece {:?} references an unknown material", node_name(graph, id));
                    }
                    *out.default_material
                        .get_or_insert_with(|| library.add(Material::fallback()))
                }
            };
            let (slot, group_index) = grouping.resolve(library, material);
            let instance_index = out.instances.len() as u32;

            if open.len() <= group_index as usize {
                open.resize_with(group_index as usize + 1, || None);
            }
            let buffer = &mut open[group_index as usize];
            let count = buffer.as_ref().map_or(0, CombinedMesh::vertex_count);
            if count > 0 && count + vertices.positions.len() > self.config.vertex_ceiling {
                debug!("sealing buffer of group {} at {} vertices", group_index, count);
                if let Some(sealed) = buffer.take() {
                    out.meshes.push(sealed);
                }
            }
            buffer
                .get_or_insert_with(|| CombinedMesh {
                    group_index,
                    ..Default::default()
                })
                .append(instance_index, slot, &vertices);

            if let Some(node) = graph.get_mut(id) {
                node.metadata.mesh_index = Some(instance_index);
                node.metadata.material_index = Some(slot);
            }
            out.instances.push(InstanceNode {
                node: id,
                instance_index,
                material_index: slot,
                group_index,
            });
            piece.dispose();
            out.disposed += 1;
        }
        out.meshes.extend(open.into_iter().flatten());

        let (groups, slots) = grouping.into_parts();
        out.groups = groups;
        out.slots = slots;
        self.add_bookkeeping(graph, root, library, &mut out);

        info!(
            "combined {} pieces into {} buffers over {} groups ({} material slots)",
            out.instances.len(),
            out.meshes.len(),
            out.groups.len(),
            out.slots.len()
        );
        out
    }

    fn eligible(&self, graph: &SceneGraph, id: NodeId, shared: &HashSet<NodeId>) -> bool {
        let Some(node) = graph.get(id) else {
            return false;
        };
        match &node.kind {
            NodeKind::Piece(piece) => {
                matches!(piece.geometry, GeometrySource::Owned(_))
                    && piece.thin_instances == 0
                    && !shared.contains(&id)
            }
            _ => false,
        }
    }

    fn add_bookkeeping(
        &self,
        graph: &mut SceneGraph,
        root: NodeId,
        library: &MaterialLibrary,
        out: &mut CombineOutput,
    ) {
        let mesh_root = graph.add_anchor(MESH_ROOT, Some(root));
        if let Some(node) = graph.get_mut(mesh_root) {
            node.metadata.hide_in_inspector = Some(true);
        }
        for (i, _) in out.meshes.iter().enumerate() {
            let batch = graph.add_batch(format!("combined_{i}"), i, mesh_root);
            if let Some(node) = graph.get_mut(batch) {
                node.metadata.combine_mesh = Some(true);
            }
            out.mesh_nodes.push(batch);
        }

        let material_root = graph.add_anchor(MATERIAL_ROOT, Some(root));
        if let Some(node) = graph.get_mut(material_root) {
            node.metadata.hide_in_inspector = Some(true);
        }
        for (slot, entry) in out.slots.iter().enumerate() {
            let name = library
                .get(entry.material)
                .map(|m| format!("{}_placeholder", m.name))
                .unwrap_or_else(|| format!("material_{slot}_placeholder"));
            let placeholder = graph.add_material_slot(name, entry.material, material_root);
            if let Some(node) = graph.get_mut(placeholder) {
                node.metadata.material_mesh = Some(slot as u32);
            }
            out.material_nodes.push(placeholder);
        }

        if let Some(node) = graph.get_mut(root) {
            node.metadata.version = Some(METADATA_VERSION);
            node.metadata.mesh_count = Some(out.instances.len() as u32);
            node.metadata.material_count = Some(out.slots.len() as u32);
        }
        metadata::stamp_flags(graph, root);
        out.mesh_root = Some(mesh_root);
        out.material_root = Some(material_root);
    }
}

impl Default for GeometryCombiner {
    fn default() -> Self {
        Self::new(CombineConfig::default())
    }
}

/// Pieces whose geometry is drawn by a render-instancing proxy.
fn shared_geometry(graph: &SceneGraph, order: &[NodeId]) -> HashSet<NodeId> {
    order
        .iter()
        .filter_map(|id| graph.get(*id)?.piece())
        .filter_map(|piece| match piece.geometry {
            GeometrySource::InstanceOf(source) => Some(source),
            GeometrySource::Owned(_) => None,
        })
        .collect()
}

fn node_name(graph: &SceneGraph, id: NodeId) -> String {
    graph
        .get(id)
        .map(|n| n.name.clone())
        .unwrap_or_else(|| id.to_string())
}
