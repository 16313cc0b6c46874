//! Scene graph and hierarchical scene organization.
//!
//! The graph is an arena: nodes live in one `Vec` and refer to each other by
//! [`NodeId`]. Combining rewrites nodes in place (a geometry piece becomes a
//! transform-only instance node), so parent links and children survive without
//! any reparenting.
//!
//! World matrices are propagated with an explicit stack instead of recursion and
//! every node whose world matrix changed is queued until the frame driver drains
//! the queue with [`SceneGraph::drain_world_matrix_changes`].

use cgmath::SquareMatrix;
use log::warn;

use crate::{
    data_structures::{geometry::GeometryPiece, instance::Transform, material::MaterialId},
    metadata::CombineMetadata,
};

/// Index of a node in its [`SceneGraph`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug)]
pub enum NodeKind {
    /// Root or grouping node. Never combined.
    Anchor,
    /// Transform only. Instance nodes left by the combiner are of this kind.
    Transform,
    /// Drawable geometry that has not been combined yet.
    Piece(GeometryPiece),
    /// Stand-in for the combined mesh with this index in the combine output.
    Batch(usize),
    /// Disabled placeholder keeping a material slot alive across export.
    MaterialSlot(MaterialId),
}

#[derive(Debug)]
pub struct Node {
    pub name: String,
    pub kind: NodeKind,
    pub enabled: bool,
    /// `None` for nodes that never draw anything.
    pub visible: Option<bool>,
    pub metadata: CombineMetadata,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    local: Transform,
    world: cgmath::Matrix4<f32>,
    dirty: bool,
}

impl Node {
    fn new(name: impl Into<String>, kind: NodeKind, local: Transform) -> Self {
        let visible = match kind {
            NodeKind::Piece(_) | NodeKind::Batch(_) => Some(true),
            NodeKind::Anchor | NodeKind::Transform | NodeKind::MaterialSlot(_) => None,
        };
        Self {
            name: name.into(),
            kind,
            enabled: true,
            visible,
            metadata: CombineMetadata::default(),
            parent: None,
            children: Vec::new(),
            local,
            world: cgmath::Matrix4::identity(),
            dirty: true,
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn local_transform(&self) -> &Transform {
        &self.local
    }

    pub fn world_matrix(&self) -> cgmath::Matrix4<f32> {
        self.world
    }

    pub fn piece(&self) -> Option<&GeometryPiece> {
        match &self.kind {
            NodeKind::Piece(piece) => Some(piece),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct SceneGraph {
    nodes: Vec<Node>,
    changed: Vec<NodeId>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, node: Node, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        if let Some(parent) = parent {
            self.set_parent(id, Some(parent));
        }
        id
    }

    pub fn add_anchor(&mut self, name: impl Into<String>, parent: Option<NodeId>) -> NodeId {
        self.push(Node::new(name, NodeKind::Anchor, Transform::new()), parent)
    }

    pub fn add_transform(
        &mut self,
        name: impl Into<String>,
        local: Transform,
        parent: Option<NodeId>,
    ) -> NodeId {
        self.push(Node::new(name, NodeKind::Transform, local), parent)
    }

    pub fn add_piece(
        &mut self,
        name: impl Into<String>,
        piece: GeometryPiece,
        local: Transform,
        parent: Option<NodeId>,
    ) -> NodeId {
        self.push(Node::new(name, NodeKind::Piece(piece), local), parent)
    }

    pub fn add_batch(&mut self, name: impl Into<String>, mesh: usize, parent: NodeId) -> NodeId {
        self.push(
            Node::new(name, NodeKind::Batch(mesh), Transform::new()),
            Some(parent),
        )
    }

    pub fn add_material_slot(
        &mut self,
        name: impl Into<String>,
        material: MaterialId,
        parent: NodeId,
    ) -> NodeId {
        let mut node = Node::new(name, NodeKind::MaterialSlot(material), Transform::new());
        node.enabled = false;
        self.push(node, Some(parent))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    /// All ids in creation order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId)
    }

    pub fn roots(&self) -> Vec<NodeId> {
        self.ids()
            .filter(|id| self.nodes[id.0].parent.is_none())
            .collect()
    }

    /// Move `child` under `parent` (or detach it). Cycles are refused.
    pub fn set_parent(&mut self, child: NodeId, parent: Option<NodeId>) -> bool {
        if child.0 >= self.nodes.len() || parent.is_some_and(|p| p.0 >= self.nodes.len()) {
            warn!("cannot parent {} to {:?}: unknown node", child, parent);
            return false;
        }
        if let Some(parent) = parent {
            let mut cursor = Some(parent);
            while let Some(id) = cursor {
                if id == child {
                    warn!("refusing to parent {} to its own descendant {}", child, parent);
                    return false;
                }
                cursor = self.nodes[id.0].parent;
            }
        }
        if let Some(old) = self.nodes[child.0].parent.take() {
            self.nodes[old.0].children.retain(|c| *c != child);
        }
        if let Some(parent) = parent {
            self.nodes[parent.0].children.push(child);
        }
        self.nodes[child.0].parent = parent;
        self.nodes[child.0].dirty = true;
        true
    }

    pub fn set_local_transform(&mut self, id: NodeId, local: Transform) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.local = local;
            node.dirty = true;
        } else {
            warn!("set_local_transform on unknown node {}", id);
        }
    }

    pub fn world_matrix(&self, id: NodeId) -> Option<cgmath::Matrix4<f32>> {
        self.get(id).map(|node| node.world)
    }

    /// Recompute the world matrix of every node whose local transform, or an
    /// ancestor's, changed since the last call. Changed nodes are queued.
    pub fn update_world_matrices(&mut self) {
        let mut stack: Vec<(NodeId, cgmath::Matrix4<f32>, bool)> = self
            .roots()
            .into_iter()
            .rev()
            .map(|id| (id, cgmath::Matrix4::identity(), false))
            .collect();
        while let Some((id, parent_world, parent_changed)) = stack.pop() {
            let node = &mut self.nodes[id.0];
            let changed = node.dirty || parent_changed;
            if changed {
                node.world = parent_world * node.local.to_matrix();
                node.dirty = false;
                self.changed.push(id);
            }
            let world = node.world;
            for child in node.children.iter().rev() {
                stack.push((*child, world, changed));
            }
        }
    }

    /// Nodes whose world matrix changed since the previous drain.
    pub fn drain_world_matrix_changes(&mut self) -> Vec<NodeId> {
        std::mem::take(&mut self.changed)
    }

    /// `root` followed by all of its descendants in preorder.
    pub fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        if root.0 >= self.nodes.len() {
            return out;
        }
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.nodes[id.0].children.iter().rev().copied());
        }
        out
    }

    /// Turn a piece node into a transform-only node and hand back its geometry.
    ///
    /// The node keeps its id, transform, parent and children.
    pub fn take_piece(&mut self, id: NodeId) -> Option<GeometryPiece> {
        let node = self.nodes.get_mut(id.0)?;
        if !matches!(node.kind, NodeKind::Piece(_)) {
            return None;
        }
        match std::mem::replace(&mut node.kind, NodeKind::Transform) {
            NodeKind::Piece(piece) => {
                node.visible = None;
                Some(piece)
            }
            _ => None,
        }
    }

    pub fn set_enabled(&mut self, id: NodeId, enabled: bool) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.enabled = enabled;
        }
    }

    /// Only drawable nodes carry a visibility flag; others ignore the call.
    pub fn set_visible(&mut self, id: NodeId, visible: bool) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            if node.visible.is_some() {
                node.visible = Some(visible);
            }
        }
    }

    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.ids().find(|id| self.nodes[id.0].name == name)
    }
}
