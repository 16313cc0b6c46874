//! merge-ngin
//!
//! Draw-call reduction for scenes built from many small pieces of geometry.
//! Pieces are merged into a few large vertex buffers per material group while
//! every piece keeps an instance node with its own transform, tint, visibility
//! and material parameters. Those per-instance and per-material records live in
//! float data textures the shaders index with a per-vertex tag, so moving or
//! recoloring a piece never touches a vertex buffer. Picks are answered on the
//! GPU from a single rendered pixel.
//!
//! High-level modules
//! - `combine`: merges pieces into combined meshes and records the layout
//! - `data_texture`: structured float records in square textures
//! - `material`: the material manager and the generated WGSL programs
//! - `pick`: the GPU picker state machine
//! - `metadata`: interchange metadata written by combining, read on import
//! - `data_structures`: scene graph, geometry, materials and textures
//! - `pipelines` / `resources`: wgpu pipelines and GPU resources
//! - `render`: per-frame driving and drawing of combined scenes
//! - `input`: mouse buttons and double-click detection
//! - `context`: headless GPU context

pub mod combine;
pub mod context;
pub mod data_structures;
pub mod data_texture;
pub mod error;
pub mod input;
pub mod material;
pub mod metadata;
pub mod pick;
pub mod pipelines;
pub mod render;
pub mod resources;

pub use combine::{CombineConfig, CombineOutput, CombinedMesh, GeometryCombiner};
pub use data_structures::{
    geometry::{GeometryPiece, VertexData},
    instance::{InstanceNode, Transform},
    material::{Material, MaterialId, MaterialLibrary, TextureRef, TransparencyMode},
    scene_graph::{NodeId, SceneGraph},
};
pub use data_texture::{DataTexture, MatrixAndInvTexture, MatrixTexture, SlotWidth, TexelSink};
pub use error::{CombineError, Result};
pub use material::MaterialManager;
pub use pick::{GpuPicker, PickBackend, PickResult, PickTicket, TargetOrigin, Viewport};
pub use render::{CombinedRenderer, CombinedScene};

/// Install the platform logger. Safe to call more than once.
#[cfg_attr(target_arch = "wasm32", wasm_bindgen::prelude::wasm_bindgen)]
pub fn init_logger() {
    #[cfg(target_arch = "wasm32")]
    {
        let _ = console_log::init_with_level(log::Level::Info);
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        let _ = env_logger::try_init();
    }
}
