//! Node transforms and the instance handles that survive combining.
//!
//! A [`Transform`] is the local position/rotation/scale of a scene node. Once a
//! geometry piece has been merged into a batch, the node it lived on keeps its
//! transform and becomes an [`InstanceNode`]: an index into the data textures
//! rather than a drawable of its own.

use cgmath::One;

use crate::data_structures::scene_graph::NodeId;

/// Local transformation of a node: position, rotation (as quaternion), and scale.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: cgmath::Vector3<f32>,
    pub rotation: cgmath::Quaternion<f32>,
    pub scale: cgmath::Vector3<f32>,
}

impl Transform {
    /// Create a new transform with identity transformation (no move, rotate, or scale).
    pub fn new() -> Self {
        Self {
            position: cgmath::Vector3::new(0.0, 0.0, 0.0),
            // `Quaternion::one()` is the identity quaternion (no rotation)
            rotation: cgmath::Quaternion::one(),
            scale: cgmath::Vector3::new(1.0, 1.0, 1.0),
        }
    }

    pub fn to_matrix(&self) -> cgmath::Matrix4<f32> {
        cgmath::Matrix4::from_translation(self.position)
            * cgmath::Matrix4::from(self.rotation)
            * cgmath::Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }

    pub fn with_position(mut self, position: cgmath::Vector3<f32>) -> Self {
        self.position = position;
        self
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}

/// Transform-only placeholder left behind by the combiner.
///
/// The node is referenced by [`NodeId`] so the scene graph and the data
/// textures never hold pointers into each other.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InstanceNode {
    pub node: NodeId,
    /// Dense, 0-based and stable for the session.
    pub instance_index: u32,
    /// Row of the material parameter table used by this instance.
    pub material_index: u32,
    /// Batch group the instance's vertices were merged into.
    pub group_index: u32,
}
