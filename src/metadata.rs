//! Tagged-key metadata that lets a combined scene survive export and import.
//!
//! Combining stamps every node it touches with a [`CombineMetadata`] block.
//! Exporters write the block into the node's extras (see
//! [`CombineMetadata::to_extras`]); on import [`recombine`] reads it back,
//! rebuilds the index maps and re-applies enable and visibility flags.
//!
//! The key names are part of the interchange format and must not change.

use serde::{Deserialize, Serialize};

use crate::{
    data_structures::scene_graph::{NodeId, SceneGraph},
    error::{CombineError, Result},
};

/// Layout version written on the combine root.
pub const METADATA_VERSION: u32 = 1;

/// Typed view on the metadata keys. Every key is optional; which ones are
/// present depends on the role of the node.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombineMetadata {
    #[serde(rename = "meshMerge_Version", skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    /// Instance index of a node that replaced a merged piece.
    #[serde(rename = "meshMerge_MeshIndex", skip_serializing_if = "Option::is_none")]
    pub mesh_index: Option<u32>,
    /// Material slot used by that instance.
    #[serde(rename = "meshMerge_MaterialIndex", skip_serializing_if = "Option::is_none")]
    pub material_index: Option<u32>,
    #[serde(rename = "meshMerge_HideInInspector", skip_serializing_if = "Option::is_none")]
    pub hide_in_inspector: Option<bool>,
    /// Set on the nodes standing for combined meshes.
    #[serde(rename = "meshMerge_CombineMesh", skip_serializing_if = "Option::is_none")]
    pub combine_mesh: Option<bool>,
    /// Material slot kept alive by a placeholder node.
    #[serde(rename = "meshMerge_MaterialMesh", skip_serializing_if = "Option::is_none")]
    pub material_mesh: Option<u32>,
    #[serde(rename = "meshMerge_MeshCount", skip_serializing_if = "Option::is_none")]
    pub mesh_count: Option<u32>,
    #[serde(rename = "meshMerge_MaterialCount", skip_serializing_if = "Option::is_none")]
    pub material_count: Option<u32>,
    #[serde(rename = "meshMerge_Enable", skip_serializing_if = "Option::is_none")]
    pub enable: Option<bool>,
    #[serde(rename = "meshMerge_Visible", skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
}

impl CombineMetadata {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// JSON object of the present keys, ready to be written as node extras.
    pub fn to_extras(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Read the block back. Accepts the extras object itself or a node
    /// metadata object that nests it under `gltf.extras`. Unknown keys are
    /// ignored.
    pub fn from_extras(value: &serde_json::Value) -> Result<Self> {
        let extras = value
            .get("gltf")
            .and_then(|gltf| gltf.get("extras"))
            .unwrap_or(value);
        Ok(Self::deserialize(extras)?)
    }
}

/// Everything recombination recovers from the metadata of a combined scene.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecoveredLayout {
    /// Instance node per instance index.
    pub instances: Vec<NodeId>,
    /// Material slot per instance index.
    pub instance_materials: Vec<u32>,
    /// Placeholder node per material slot, if one survived.
    pub material_nodes: Vec<Option<NodeId>>,
    /// Nodes standing for combined meshes, in graph order.
    pub combined_meshes: Vec<NodeId>,
}

fn missing(graph: &SceneGraph, node: NodeId, key: &'static str) -> CombineError {
    let name = graph
        .get(node)
        .map(|n| n.name.clone())
        .unwrap_or_else(|| node.to_string());
    CombineError::MissingMetadata { node: name, key }
}

fn check_range(key: &'static str, index: u32, count: u32) -> Result<()> {
    if index >= count {
        return Err(CombineError::IndexOutOfRange { key, index, count });
    }
    Ok(())
}

/// Rebuild the combine layout below `root` from node metadata.
///
/// All checks run before the graph is touched: on any error the scene is left
/// exactly as imported, i.e. unmerged.
pub fn recombine(graph: &mut SceneGraph, root: NodeId) -> Result<RecoveredLayout> {
    let result = read_layout(graph, root);
    match &result {
        Ok(layout) => {
            apply_flags(graph, root);
            log::info!(
                "recombined {} instances, {} material slots, {} combined meshes",
                layout.instances.len(),
                layout.material_nodes.len(),
                layout.combined_meshes.len()
            );
        }
        Err(e) => log::warn!("scene below {} is not a combined scene: {}", root, e),
    }
    result
}

fn read_layout(graph: &SceneGraph, root: NodeId) -> Result<RecoveredLayout> {
    let root_meta = &graph
        .get(root)
        .ok_or(CombineError::UnknownNode(root.index()))?
        .metadata;
    match root_meta.version {
        Some(METADATA_VERSION) => {}
        Some(other) => return Err(CombineError::UnsupportedVersion(other)),
        None => log::debug!("no metadata version on {}, assuming {}", root, METADATA_VERSION),
    }
    let mesh_count = root_meta
        .mesh_count
        .ok_or_else(|| missing(graph, root, "meshMerge_MeshCount"))?;
    let material_count = root_meta
        .material_count
        .ok_or_else(|| missing(graph, root, "meshMerge_MaterialCount"))?;

    // every instance and placeholder is a distinct node below the root
    let nodes = graph.descendants(root);
    for (key, count) in [
        ("meshMerge_MeshCount", mesh_count),
        ("meshMerge_MaterialCount", material_count),
    ] {
        if count as usize > nodes.len() {
            return Err(CombineError::CountExceedsNodes {
                key,
                count,
                nodes: nodes.len(),
            });
        }
    }

    let mut instances: Vec<Option<(NodeId, u32)>> = vec![None; mesh_count as usize];
    let mut material_nodes = vec![None; material_count as usize];
    let mut combined_meshes = Vec::new();

    for id in nodes {
        let Some(meta) = graph.get(id).map(|n| &n.metadata) else {
            continue;
        };
        if let Some(index) = meta.mesh_index {
            check_range("meshMerge_MeshIndex", index, mesh_count)?;
            let material = meta
                .material_index
                .ok_or_else(|| missing(graph, id, "meshMerge_MaterialIndex"))?;
            check_range("meshMerge_MaterialIndex", material, material_count)?;
            let slot = &mut instances[index as usize];
            if slot.is_some() {
                return Err(CombineError::DuplicateIndex {
                    key: "meshMerge_MeshIndex",
                    index,
                });
            }
            *slot = Some((id, material));
        }
        if let Some(material) = meta.material_mesh {
            check_range("meshMerge_MaterialMesh", material, material_count)?;
            let slot = &mut material_nodes[material as usize];
            if slot.is_some() {
                return Err(CombineError::DuplicateIndex {
                    key: "meshMerge_MaterialMesh",
                    index: material,
                });
            }
            *slot = Some(id);
        }
        if meta.combine_mesh == Some(true) {
            combined_meshes.push(id);
        }
    }

    let mut layout = RecoveredLayout {
        instances: Vec::with_capacity(instances.len()),
        instance_materials: Vec::with_capacity(instances.len()),
        material_nodes,
        combined_meshes,
    };
    for (index, entry) in instances.into_iter().enumerate() {
        let (node, material) = entry.ok_or(CombineError::InstanceIndexGap(index as u32))?;
        layout.instances.push(node);
        layout.instance_materials.push(material);
    }
    Ok(layout)
}

fn apply_flags(graph: &mut SceneGraph, root: NodeId) {
    for id in graph.descendants(root) {
        let Some(node) = graph.get_mut(id) else {
            continue;
        };
        if let Some(enable) = node.metadata.enable {
            node.enabled = enable;
        }
        if let Some(visible) = node.metadata.visible {
            node.visible = Some(visible);
        }
    }
}

/// Record the current enable and visibility state of `root` and everything
/// below it in the metadata.
pub fn stamp_flags(graph: &mut SceneGraph, root: NodeId) {
    for id in graph.descendants(root) {
        if let Some(node) = graph.get_mut(id) {
            node.metadata.enable = Some(node.enabled);
            node.metadata.visible = node.visible;
        }
    }
}
