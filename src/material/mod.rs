//! The material manager: per-instance and per-material state for combined
//! meshes.
//!
//! It owns three data textures:
//! - `transform`: world matrix and normal matrix per instance
//! - `instance`: tint color and visibility per instance
//! - `material`: the parameter record of every material slot
//!
//! and builds one [`CombinedProgram`] per material group. Instance nodes are
//! bound once at construction: the manager records which node writes which
//! transform record, and [`MaterialManager::sync_transforms`] rewrites those
//! records for the nodes the scene graph reports as moved. Nodes created later
//! are not tracked.

use std::collections::HashMap;

use log::{debug, warn};

use crate::{
    combine::{CombineOutput, MaterialGroup, MaterialSlot},
    data_structures::{
        instance::InstanceNode,
        material::{
            MATERIAL_RECORD_LEN, MATERIAL_RECORD_SLOTS, Material, MaterialId, MaterialLibrary,
            TransparencyMode,
        },
        scene_graph::{NodeId, SceneGraph},
    },
    data_texture::{DataTexture, MatrixAndInvTexture, SlotWidth, TexelSink},
    pipelines::light::{SceneLighting, SceneUniform},
};

pub mod shader;

pub use shader::{DataTextureLayout, MapKind, MaterialFeatures};

pub const TRANSFORM_TEXTURE: &str = "transform";
pub const INSTANCE_TEXTURE: &str = "instance";
pub const MATERIAL_TEXTURE: &str = "material";

/// Slots of an instance appearance record.
pub const INSTANCE_RECORD_SLOTS: u32 = 2;

/// Appearance of one instance, kept in the manager's side table.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InstanceRecord {
    pub instance_index: u32,
    pub color: [f32; 3],
    pub visible: bool,
}

impl InstanceRecord {
    pub fn to_record(&self) -> [f32; 6] {
        let [r, g, b] = self.color;
        [r, g, b, if self.visible { 1.0 } else { 0.0 }, 0.0, 0.0]
    }
}

/// Render program of one material group.
#[derive(Clone, Debug)]
pub struct CombinedProgram {
    pub group_index: u32,
    pub representative: MaterialId,
    pub features: MaterialFeatures,
    pub transparency: TransparencyMode,
    pub wgsl: String,
}

/// Data textures that need a GPU upload, handed out by
/// [`MaterialManager::flush`].
pub struct FlushTargets<'a> {
    pub transforms: &'a mut dyn TexelSink,
    pub instances: &'a mut dyn TexelSink,
    pub materials: &'a mut dyn TexelSink,
}

pub struct MaterialManager {
    transforms: MatrixAndInvTexture,
    instances: DataTexture,
    materials: DataTexture,
    records: HashMap<NodeId, InstanceRecord>,
    /// Index -> node, bound once.
    bindings: Vec<NodeId>,
    programs: Vec<CombinedProgram>,
    pick_wgsl: String,
    camera_position: cgmath::Vector3<f32>,
    lighting: SceneLighting,
}

impl MaterialManager {
    /// Build the manager for a finished combine run.
    ///
    /// World matrices are read from `graph` as they are; update them first.
    pub fn new(graph: &SceneGraph, output: &CombineOutput, library: &MaterialLibrary) -> Self {
        Self::from_parts(graph, &output.instances, &output.slots, &output.groups, library)
    }

    pub fn from_parts(
        graph: &SceneGraph,
        instances: &[InstanceNode],
        slots: &[MaterialSlot],
        groups: &[MaterialGroup],
        library: &MaterialLibrary,
    ) -> Self {
        let count = instances.len() as u32;
        let mut manager = Self {
            transforms: MatrixAndInvTexture::new(TRANSFORM_TEXTURE, count),
            instances: DataTexture::new(INSTANCE_TEXTURE, count, INSTANCE_RECORD_SLOTS, SlotWidth::Vec3),
            materials: DataTexture::new(
                MATERIAL_TEXTURE,
                slots.len() as u32,
                MATERIAL_RECORD_SLOTS,
                SlotWidth::Vec3,
            ),
            records: HashMap::with_capacity(instances.len()),
            bindings: Vec::with_capacity(instances.len()),
            programs: Vec::with_capacity(groups.len()),
            pick_wgsl: String::new(),
            camera_position: cgmath::Vector3::new(0.0, 0.0, 0.0),
            lighting: SceneLighting::default(),
        };

        let mut sorted: Vec<&InstanceNode> = instances.iter().collect();
        sorted.sort_by_key(|i| i.instance_index);
        for instance in sorted {
            let index = instance.instance_index;
            if index as usize != manager.bindings.len() {
                warn!("instance indices are not dense at {}, skipping {}", index, instance.node);
                continue;
            }
            manager.bindings.push(instance.node);
            let world = graph
                .world_matrix(instance.node)
                .unwrap_or_else(|| cgmath::SquareMatrix::identity());
            manager.transforms.set_matrix(index, &world);
            let record = InstanceRecord {
                instance_index: index,
                color: [1.0, 1.0, 1.0],
                visible: true,
            };
            manager.instances.set_record(index, &record.to_record());
            manager.records.insert(instance.node, record);
        }

        let fallback = Material::fallback();
        for (slot, entry) in slots.iter().enumerate() {
            let material = library.get(entry.material).unwrap_or_else(|| {
                warn!("material slot {} has no material, using the default", slot);
                &fallback
            });
            manager.materials.set_record(slot as u32, &material.parameter_record());
        }

        for group in groups {
            let Some(material) = library.get(group.representative) else {
                warn!("group {} has no representative material", group.group_index);
                continue;
            };
            let features = MaterialFeatures::from_textures(&material.textures);
            let wgsl = shader::combined_program(&manager.layout(), features, material.transparency);
            manager.programs.push(CombinedProgram {
                group_index: group.group_index,
                representative: group.representative,
                features,
                transparency: material.transparency,
                wgsl,
            });
        }
        manager.pick_wgsl = shader::pick_program(&manager.layout());
        debug!(
            "material manager bound {} instances, {} slots, {} programs",
            manager.bindings.len(),
            slots.len(),
            manager.programs.len()
        );
        manager
    }

    pub fn layout(&self) -> DataTextureLayout<'_> {
        DataTextureLayout {
            transforms: &self.transforms,
            instances: &self.instances,
            materials: &self.materials,
        }
    }

    pub fn programs(&self) -> &[CombinedProgram] {
        &self.programs
    }

    pub fn program(&self, group_index: u32) -> Option<&CombinedProgram> {
        self.programs.iter().find(|p| p.group_index == group_index)
    }

    pub fn pick_wgsl(&self) -> &str {
        &self.pick_wgsl
    }

    pub fn transforms(&self) -> &MatrixAndInvTexture {
        &self.transforms
    }

    pub fn instance_data(&self) -> &DataTexture {
        &self.instances
    }

    pub fn material_data(&self) -> &DataTexture {
        &self.materials
    }

    /// Instance node bound to `index`.
    pub fn node(&self, index: u32) -> Option<NodeId> {
        self.bindings.get(index as usize).copied()
    }

    pub fn instance_record(&self, node: NodeId) -> Option<&InstanceRecord> {
        self.records.get(&node)
    }

    pub fn is_tracked(&self, node: NodeId) -> bool {
        self.records.contains_key(&node)
    }

    /// Rewrite the transform record of every bound node in `changed`.
    /// Returns the number of records written.
    pub fn sync_transforms(&mut self, graph: &SceneGraph, changed: &[NodeId]) -> usize {
        let mut written = 0;
        for node in changed {
            let Some(record) = self.records.get(node) else {
                continue;
            };
            if let Some(world) = graph.world_matrix(*node) {
                self.transforms.set_matrix(record.instance_index, &world);
                written += 1;
            }
        }
        written
    }

    fn update_record(&mut self, node: NodeId, update: impl FnOnce(&mut InstanceRecord)) -> bool {
        let Some(record) = self.records.get_mut(&node) else {
            warn!("node {} is not a bound instance", node);
            return false;
        };
        update(record);
        let record = *record;
        self.instances.set_record(record.instance_index, &record.to_record())
    }

    pub fn set_color(&mut self, node: NodeId, color: [f32; 3]) -> bool {
        self.update_record(node, |r| r.color = color)
    }

    pub fn set_visible(&mut self, node: NodeId, visible: bool) -> bool {
        self.update_record(node, |r| r.visible = visible)
    }

    /// Rewrite the parameter record of a material slot.
    pub fn set_material_params(&mut self, slot: u32, material: &Material) -> bool {
        if slot >= self.materials.record_count() {
            warn!("material slot {} out of range", slot);
            return false;
        }
        let record: [f32; MATERIAL_RECORD_LEN] = material.parameter_record();
        self.materials.set_record(slot, &record)
    }

    pub fn camera_position(&self) -> cgmath::Vector3<f32> {
        self.camera_position
    }

    pub fn set_camera_position(&mut self, position: cgmath::Vector3<f32>) {
        self.camera_position = position;
    }

    pub fn lighting(&self) -> &SceneLighting {
        &self.lighting
    }

    pub fn set_lighting(&mut self, lighting: SceneLighting) {
        self.lighting = lighting;
    }

    pub fn scene_uniform(&self, view_proj: cgmath::Matrix4<f32>) -> SceneUniform {
        SceneUniform::new(view_proj, self.camera_position, &self.lighting)
    }

    pub fn is_dirty(&self) -> bool {
        self.transforms.is_dirty() || self.instances.is_dirty() || self.materials.is_dirty()
    }

    /// Upload every dirty data texture. Returns how many were uploaded.
    pub fn flush(&mut self, targets: FlushTargets<'_>) -> usize {
        [
            self.transforms.flush(targets.transforms),
            self.instances.flush(targets.instances),
            self.materials.flush(targets.materials),
        ]
        .into_iter()
        .filter(|uploaded| *uploaded)
        .count()
    }
}
