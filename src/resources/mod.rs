/**
 * GPU resources of combined scenes: data textures, texture maps, merged
 * meshes and the pick pass. Texture maps may be loaded from external files.
 */
pub mod data_texture;
pub mod mesh;
pub mod pick;
pub mod texture;
