//! Render pipelines of combined meshes: one shaded pipeline per material group
//! and one pick pipeline for all of them.

pub mod combined;
pub mod light;
pub mod pick;
