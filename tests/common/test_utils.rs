use cgmath::{InnerSpace, Matrix4, Vector3, Vector4};
use merge_ngin::{
    CombineConfig, CombinedMesh, GeometryPiece, Material, MaterialId, MaterialLibrary,
    MaterialManager, NodeId, SceneGraph, TexelSink, Transform, VertexData,
    material::FlushTargets,
    pick::{PickBackend, PickSample, Readback, ScissorRect, TargetOrigin},
    render::CombinedScene,
};

/// Unit quad in the XY plane spanning `[0, 1]`, facing +Z.
pub fn quad() -> VertexData {
    VertexData::new(vec![
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [1.0, 1.0, 0.0],
        [0.0, 1.0, 0.0],
    ])
    .with_indices(vec![0, 1, 2, 0, 2, 3])
    .with_uvs(vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]])
}

/// Non-indexed triangles, `vertices` must be a multiple of 3.
pub fn triangle_soup(vertices: usize) -> VertexData {
    let positions = (0..vertices)
        .map(|i| {
            let corner = (i % 3) as f32;
            [corner, (i / 3) as f32, if i % 3 == 2 { 1.0 } else { 0.0 }]
        })
        .collect();
    VertexData::new(positions)
}

pub fn at(x: f32, y: f32) -> Transform {
    Transform::new().with_position(Vector3::new(x, y, 0.0))
}

/// A root with quads at the given grid cells, each with its own material.
pub struct QuadScene {
    pub graph: SceneGraph,
    pub root: NodeId,
    pub library: MaterialLibrary,
    pub quads: Vec<NodeId>,
    pub materials: Vec<MaterialId>,
}

pub fn quad_scene(cells: &[(f32, f32)]) -> QuadScene {
    let mut graph = SceneGraph::new();
    let mut library = MaterialLibrary::new();
    let root = graph.add_anchor("root", None);
    let mut quads = Vec::new();
    let mut materials = Vec::new();
    for (i, (x, y)) in cells.iter().enumerate() {
        let mut material = Material::new(format!("quad_{i}"));
        material.albedo = [i as f32 / cells.len() as f32, 0.5, 0.5];
        let material = library.add(material);
        materials.push(material);
        quads.push(graph.add_piece(
            format!("quad_{i}"),
            GeometryPiece::new(quad(), Some(material)),
            at(*x, *y),
            Some(root),
        ));
    }
    QuadScene {
        graph,
        root,
        library,
        quads,
        materials,
    }
}

/// Remembers every upload it receives.
#[derive(Default)]
pub struct RecordingSink {
    pub uploads: Vec<(u32, Vec<f32>)>,
}

impl TexelSink for RecordingSink {
    fn upload(&mut self, side: u32, texels: &[f32]) {
        self.uploads.push((side, texels.to_vec()));
    }
}

#[derive(Default)]
pub struct RecordingSinks {
    pub transforms: RecordingSink,
    pub instances: RecordingSink,
    pub materials: RecordingSink,
}

impl RecordingSinks {
    pub fn targets(&mut self) -> FlushTargets<'_> {
        FlushTargets {
            transforms: &mut self.transforms,
            instances: &mut self.instances,
            materials: &mut self.materials,
        }
    }

    pub fn total(&self) -> usize {
        self.transforms.uploads.len() + self.instances.uploads.len() + self.materials.uploads.len()
    }
}

/// Pick backend that rasterises the combined meshes on the CPU.
///
/// The camera looks down -Z with an orthographic projection of one world unit
/// per pixel: the center of screen pixel `(x, row)` is world `(x + 0.5,
/// row + 0.5)`, row 0 at the top. The nearest surface is the one with the
/// largest z.
pub struct SoftwarePickBackend {
    pub origin: TargetOrigin,
    meshes: Vec<CombinedMesh>,
    /// World matrix and visibility per instance index.
    instances: Vec<(Matrix4<f32>, bool)>,
    pub target: Option<(u32, u32)>,
    pub allocations: usize,
    pub renders: usize,
    /// Frames in which the pass draws nothing, as if the program were still
    /// compiling.
    pub stalled_frames: u32,
    /// Polls answered with `Pending` after each readback starts.
    pub readback_delay: u32,
    pub last_scissor: Option<ScissorRect>,
    rendered: Option<((u32, u32), PickSample)>,
    pending: Option<(PickSample, u32)>,
}

const CLEARED: PickSample = PickSample {
    position_index: [0.0, 0.0, 0.0, -1.0],
    normal: [0.0, 0.0, 0.0, 0.0],
};

impl SoftwarePickBackend {
    pub fn new(meshes: Vec<CombinedMesh>) -> Self {
        Self {
            origin: TargetOrigin::TopLeft,
            meshes,
            instances: Vec::new(),
            target: None,
            allocations: 0,
            renders: 0,
            stalled_frames: 0,
            readback_delay: 0,
            last_scissor: None,
            rendered: None,
            pending: None,
        }
    }

    /// Take over the transforms and visibility the manager holds.
    pub fn sync(&mut self, manager: &MaterialManager) {
        let count = manager.transforms().record_count();
        self.instances = (0..count)
            .map(|i| {
                let visible = manager.instance_data().record(i)[3] > 0.5;
                (manager.transforms().matrix(i), visible)
            })
            .collect();
    }

    fn shade(&self, x: u32, row: u32) -> PickSample {
        let (px, py) = (x as f32 + 0.5, row as f32 + 0.5);
        let mut best: Option<(f32, PickSample)> = None;
        for mesh in &self.meshes {
            for tri in mesh.indices.chunks_exact(3) {
                let vertices = [
                    mesh.vertices[tri[0] as usize],
                    mesh.vertices[tri[1] as usize],
                    mesh.vertices[tri[2] as usize],
                ];
                let instance = vertices[0].instance_index();
                let Some((world, visible)) = self.instances.get(instance as usize) else {
                    continue;
                };
                if !*visible {
                    continue;
                }
                let [a, b, c] = vertices.map(|v| {
                    let p = *world * Vector4::new(v.position[0], v.position[1], v.position[2], 1.0);
                    Vector3::new(p.x, p.y, p.z)
                });
                let Some(z) = depth_at(a, b, c, px, py) else {
                    continue;
                };
                if best.as_ref().is_some_and(|(best_z, _)| *best_z >= z) {
                    continue;
                }
                let n = (b - a).cross(c - a).normalize();
                best = Some((
                    z,
                    PickSample {
                        position_index: [px, py, z, instance as f32],
                        normal: [n.x, n.y, n.z, 1.0],
                    },
                ));
            }
        }
        best.map(|(_, sample)| sample).unwrap_or(CLEARED)
    }
}

/// Depth of the triangle under `(px, py)`, either winding.
fn depth_at(a: Vector3<f32>, b: Vector3<f32>, c: Vector3<f32>, px: f32, py: f32) -> Option<f32> {
    let area = (b.x - a.x) * (c.y - a.y) - (c.x - a.x) * (b.y - a.y);
    if area.abs() < f32::EPSILON {
        return None;
    }
    let w0 = ((b.x - px) * (c.y - py) - (c.x - px) * (b.y - py)) / area;
    let w1 = ((c.x - px) * (a.y - py) - (a.x - px) * (c.y - py)) / area;
    let w2 = 1.0 - w0 - w1;
    if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
        return None;
    }
    Some(w0 * a.z + w1 * b.z + w2 * c.z)
}

impl PickBackend for SoftwarePickBackend {
    fn origin(&self) -> TargetOrigin {
        self.origin
    }

    fn has_geometry(&self) -> bool {
        !self.meshes.is_empty()
    }

    fn prepare_target(&mut self, width: u32, height: u32) {
        if self.target != Some((width, height)) {
            self.target = Some((width, height));
            self.allocations += 1;
        }
    }

    fn render(&mut self, scissor: ScissorRect) -> u32 {
        if self.stalled_frames > 0 {
            self.stalled_frames -= 1;
            return 0;
        }
        let Some((_, height)) = self.target else {
            return 0;
        };
        self.renders += 1;
        self.last_scissor = Some(scissor);
        let row = match self.origin {
            TargetOrigin::TopLeft => scissor.y,
            TargetOrigin::BottomLeft => height - 1 - scissor.y,
        };
        self.rendered = Some(((scissor.x, scissor.y), self.shade(scissor.x, row)));
        self.meshes.len() as u32
    }

    fn begin_readback(&mut self, x: u32, y: u32) {
        // outside the scissor the target only holds the clear value
        let sample = match self.rendered.take() {
            Some((pixel, sample)) if pixel == (x, y) => sample,
            _ => CLEARED,
        };
        self.pending = Some((sample, self.readback_delay));
    }

    fn poll_readback(&mut self) -> Readback {
        match self.pending.as_mut() {
            None => Readback::Failed,
            Some((_, delay)) if *delay > 0 => {
                *delay -= 1;
                Readback::Pending
            }
            Some((sample, _)) => {
                let sample = *sample;
                self.pending = None;
                Readback::Ready(sample)
            }
        }
    }
}

/// Combine `scene` and attach a software pick backend.
pub fn software_scene(scene: QuadScene) -> CombinedScene<SoftwarePickBackend> {
    CombinedScene::build(
        scene.graph,
        scene.root,
        scene.library,
        CombineConfig::default(),
        |output, manager| {
            let mut backend = SoftwarePickBackend::new(output.meshes.clone());
            backend.sync(manager);
            backend
        },
    )
}

pub fn approx_eq(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-4
}

pub fn matrices_approx_eq(a: &Matrix4<f32>, b: &Matrix4<f32>) -> bool {
    let a: [[f32; 4]; 4] = (*a).into();
    let b: [[f32; 4]; 4] = (*b).into();
    a.as_flattened()
        .iter()
        .zip(b.as_flattened())
        .all(|(x, y)| approx_eq(*x, *y))
}
