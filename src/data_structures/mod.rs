//! Engine data structures: scene graph, geometry, materials and textures.
//!
//! This module contains the core data types for scene representation:
//!
//! - `scene_graph` is the arena holding every node, its transform and metadata
//! - `geometry` holds the raw vertex data of the pieces waiting to be combined
//! - `material` describes source materials and their texture identities
//! - `instance` holds transforms and the instance handles left by combining
//! - `model` contains vertex layouts and GPU meshes
//! - `texture` contains GPU texture wrapper and creation utilities

pub mod geometry;
pub mod instance;
pub mod material;
pub mod model;
pub mod scene_graph;
pub mod texture;
