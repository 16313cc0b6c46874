//! Frame driving and drawing of combined scenes.
//!
//! [`CombinedScene`] owns the CPU side of a combined scene: scene graph,
//! materials, combine output, material manager and picker. Once per frame
//! [`CombinedScene::prepare_frame`] propagates world matrices, syncs moved
//! instances into the transform texture, flushes every dirty data texture
//! once and then advances the picker.
//!
//! [`CombinedRenderer`] owns the GPU side: combined meshes, data textures,
//! the scene uniform and one pipeline per material group.

use std::sync::Arc;

use log::debug;

use crate::{
    combine::{CombineConfig, CombineOutput, GeometryCombiner},
    data_structures::{
        material::MaterialLibrary,
        model::{DrawMesh, GpuMesh},
        scene_graph::{NodeId, SceneGraph},
    },
    material::{FlushTargets, MaterialManager},
    pick::{GpuPicker, PickBackend, PickTicket, Viewport},
    pipelines::{
        combined::{CombinedLayouts, mk_combined_pipeline},
        light::{self, SceneUniform},
    },
    resources::{
        data_texture::GpuDataTextures,
        mesh::upload_combined_mesh,
        pick::WgpuPickBackend,
        texture::{load_map_bind_group, map_layout},
    },
};

/// What one call of [`CombinedScene::prepare_frame`] did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// Transform records rewritten for moved instances.
    pub moved: usize,
    /// Data textures uploaded.
    pub uploaded: usize,
}

/// A combined scene before a pick backend is attached.
pub struct CombinedParts {
    pub graph: SceneGraph,
    pub library: MaterialLibrary,
    pub output: CombineOutput,
    pub manager: MaterialManager,
    pub root: NodeId,
}

impl CombinedParts {
    /// Combine everything below `root` and bind the material manager.
    pub fn combine(
        mut graph: SceneGraph,
        root: NodeId,
        mut library: MaterialLibrary,
        config: CombineConfig,
    ) -> Self {
        let output = GeometryCombiner::new(config).combine(&mut graph, root, &mut library);
        graph.update_world_matrices();
        // the manager reads the fresh matrices directly
        graph.drain_world_matrix_changes();
        let manager = MaterialManager::new(&graph, &output, &library);
        Self {
            graph,
            library,
            output,
            manager,
            root,
        }
    }
}

pub struct CombinedScene<B> {
    pub graph: SceneGraph,
    pub library: MaterialLibrary,
    pub output: CombineOutput,
    pub manager: MaterialManager,
    pub picker: GpuPicker<B>,
    root: NodeId,
}

impl<B: PickBackend> CombinedScene<B> {
    pub fn new(parts: CombinedParts, backend: B) -> Self {
        let picker = GpuPicker::new(backend, parts.output.instances.clone());
        Self {
            graph: parts.graph,
            library: parts.library,
            output: parts.output,
            manager: parts.manager,
            picker,
            root: parts.root,
        }
    }

    /// Combine everything below `root` and set up the manager and picker.
    ///
    /// `backend` receives the combine output and the manager, so it can
    /// upload the meshes and compile the pick program.
    pub fn build(
        graph: SceneGraph,
        root: NodeId,
        library: MaterialLibrary,
        config: CombineConfig,
        backend: impl FnOnce(&CombineOutput, &MaterialManager) -> B,
    ) -> Self {
        let parts = CombinedParts::combine(graph, root, library, config);
        let backend = backend(&parts.output, &parts.manager);
        Self::new(parts, backend)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Run once per frame, before drawing.
    pub fn prepare_frame(&mut self, targets: FlushTargets<'_>) -> FrameReport {
        self.graph.update_world_matrices();
        let changed = self.graph.drain_world_matrix_changes();
        let moved = self.manager.sync_transforms(&self.graph, &changed);
        let uploaded = self.manager.flush(targets);
        if moved > 0 || uploaded > 0 {
            debug!("frame: {} instances moved, {} data textures uploaded", moved, uploaded);
        }
        self.picker.on_frame();
        FrameReport { moved, uploaded }
    }

    pub fn pick_async(&mut self, viewport: &Viewport, x: f32, y: f32) -> PickTicket {
        self.picker.pick_async(viewport, x, y)
    }
}

struct GroupDraw {
    group_index: u32,
    blends: bool,
    pipeline: wgpu::RenderPipeline,
    maps: wgpu::BindGroup,
}

/// GPU resources of one combined scene.
pub struct CombinedRenderer {
    pub layouts: CombinedLayouts,
    pub data: GpuDataTextures,
    scene_buffer: wgpu::Buffer,
    scene_bind_group: wgpu::BindGroup,
    /// Parallel to the combine output's meshes.
    meshes: Vec<(u32, Arc<GpuMesh>)>,
    groups: Vec<GroupDraw>,
    queue: wgpu::Queue,
}

impl CombinedRenderer {
    /// Upload meshes, create data textures and build the group pipelines.
    /// Texture maps are loaded here, which is why this is async.
    pub async fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        color_format: wgpu::TextureFormat,
        output: &CombineOutput,
        manager: &MaterialManager,
        library: &MaterialLibrary,
    ) -> anyhow::Result<Self> {
        let layouts = CombinedLayouts::new(device);
        let layout = manager.layout();
        let data = GpuDataTextures::new(
            device,
            queue,
            &layouts.data,
            [
                layout.transforms.side(),
                layout.instances.side(),
                layout.materials.side(),
            ],
        );
        let uniform = manager.scene_uniform(cgmath::SquareMatrix::identity());
        let scene_buffer = light::mk_buffer(device, uniform);
        let scene_bind_group = light::mk_bind_group(device, &layouts.scene, &scene_buffer);

        let meshes = output
            .meshes
            .iter()
            .enumerate()
            .map(|(i, mesh)| {
                (
                    mesh.group_index,
                    Arc::new(upload_combined_mesh(device, mesh, &format!("combined_{i}"))),
                )
            })
            .collect();

        let mut groups = Vec::with_capacity(manager.programs().len());
        for program in manager.programs() {
            let maps = program.features.maps();
            let maps_layout = map_layout(device, &maps);
            let textures = library
                .get(program.representative)
                .map(|m| m.textures.clone())
                .unwrap_or_default();
            let maps = load_map_bind_group(device, queue, &maps_layout, &textures, &maps).await?;
            groups.push(GroupDraw {
                group_index: program.group_index,
                blends: program.transparency.blends(),
                pipeline: mk_combined_pipeline(device, color_format, &layouts, &maps_layout, program),
                maps,
            });
        }
        // opaque groups first
        groups.sort_by_key(|g| g.blends);

        Ok(Self {
            layouts,
            data,
            scene_buffer,
            scene_bind_group,
            meshes,
            groups,
            queue: queue.clone(),
        })
    }

    /// A pick backend drawing this renderer's meshes.
    pub fn pick_backend(&self, device: &wgpu::Device, manager: &MaterialManager) -> WgpuPickBackend {
        WgpuPickBackend::new(
            device,
            &self.queue,
            &self.layouts,
            manager.pick_wgsl(),
            self.scene_bind_group.clone(),
            self.data.bind_group.clone(),
            self.meshes.iter().map(|(_, mesh)| mesh.clone()).collect(),
        )
    }

    pub fn flush_targets(&mut self) -> FlushTargets<'_> {
        self.data.targets()
    }

    pub fn update_scene(&self, uniform: SceneUniform) {
        self.queue
            .write_buffer(&self.scene_buffer, 0, bytemuck::cast_slice(&[uniform]));
    }

    /// Draw every combined mesh with the pipeline of its group.
    pub fn draw(&self, render_pass: &mut wgpu::RenderPass<'_>) {
        render_pass.set_bind_group(0, &self.scene_bind_group, &[]);
        render_pass.set_bind_group(1, &self.data.bind_group, &[]);
        for group in &self.groups {
            render_pass.set_pipeline(&group.pipeline);
            render_pass.set_bind_group(2, &group.maps, &[]);
            for (_, mesh) in self.meshes.iter().filter(|(g, _)| *g == group.group_index) {
                render_pass.draw_gpu_mesh(mesh);
            }
        }
    }

    /// Free the mesh buffers. Meshes still shared with a pick backend stay
    /// alive until it is dropped.
    pub fn destroy(self) {
        for (_, mesh) in self.meshes {
            if let Ok(mesh) = Arc::try_unwrap(mesh) {
                mesh.destroy();
            }
        }
    }
}
