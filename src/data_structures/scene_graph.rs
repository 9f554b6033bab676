//! Scene graph: the node hierarchy of an imported model.
//!
//! Nodes live in an arena indexed by their glTF node index so animation
//! channels can address them directly. Each node keeps its local transform and
//! a world matrix; `update_world_transforms` propagates parents into children.

use cgmath::{Matrix4, SquareMatrix, Vector3};
use log::warn;

use crate::data_structures::{bounds::Aabb, instance::Instance};

#[derive(Clone, Debug)]
pub struct SceneNode {
    pub name: String,
    pub local: Instance,
    pub world: Matrix4<f32>,
    /// glTF mesh index drawn at this node.
    pub mesh: Option<usize>,
    pub children: Vec<usize>,
}

impl SceneNode {
    pub fn new(name: impl Into<String>, local: Instance) -> Self {
        Self {
            name: name.into(),
            local,
            world: local.to_matrix(),
            mesh: None,
            children: Vec::new(),
        }
    }

    pub fn world_position(&self) -> Vector3<f32> {
        self.world.w.truncate()
    }

    pub fn with_mesh(mut self, mesh: usize) -> Self {
        self.mesh = Some(mesh);
        self
    }
}

impl Default for SceneNode {
    fn default() -> Self {
        Self::new("", Instance::default())
    }
}

#[derive(Clone, Debug, Default)]
pub struct SceneGraph {
    pub nodes: Vec<SceneNode>,
    pub roots: Vec<usize>,
}

impl SceneGraph {
    pub fn new(nodes: Vec<SceneNode>, roots: Vec<usize>) -> Self {
        let mut graph = Self { nodes, roots };
        graph.update_world_transforms();
        graph
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, idx: usize) -> Option<&SceneNode> {
        self.nodes.get(idx)
    }

    pub fn set_local_transform(&mut self, idx: usize, instance: Instance) {
        match self.nodes.get_mut(idx) {
            Some(node) => node.local = instance,
            None => warn!(
                "You tried to transform node {}, but there are only {} nodes.",
                idx,
                self.nodes.len()
            ),
        }
    }

    pub fn local_transforms(&self) -> Vec<Instance> {
        self.nodes.iter().map(|node| node.local).collect()
    }

    /// Recompute world transforms from the roots down.
    pub fn update_world_transforms(&mut self) {
        let mut stack: Vec<(usize, Matrix4<f32>)> = self
            .roots
            .iter()
            .rev()
            .map(|&root| (root, Matrix4::identity()))
            .collect();
        let mut visited = vec![false; self.nodes.len()];
        while let Some((idx, parent)) = stack.pop() {
            let Some(node) = self.nodes.get_mut(idx) else {
                warn!("Scene graph references missing node {}", idx);
                continue;
            };
            if std::mem::replace(&mut visited[idx], true) {
                warn!("Node {} is reachable twice; skipping the second visit", idx);
                continue;
            }
            node.world = parent * node.local.to_matrix();
            let world = node.world;
            stack.extend(node.children.iter().rev().map(|&child| (child, world)));
        }
    }

    /// Depth-first walk over every node reachable from the roots.
    pub fn traverse(&self, mut visit: impl FnMut(usize, &SceneNode)) {
        let mut stack: Vec<usize> = self.roots.iter().rev().copied().collect();
        let mut visited = vec![false; self.nodes.len()];
        while let Some(idx) = stack.pop() {
            let Some(node) = self.nodes.get(idx) else {
                continue;
            };
            if std::mem::replace(&mut visited[idx], true) {
                continue;
            }
            visit(idx, node);
            stack.extend(node.children.iter().rev().copied());
        }
    }

    /// World-space bounds of all mesh nodes.
    ///
    /// `mesh_bounds[m]` are the local bounds of glTF mesh `m`. World transforms
    /// must be current.
    pub fn bounds(&self, mesh_bounds: &[Aabb]) -> Aabb {
        let mut out = Aabb::empty();
        self.traverse(|_, node| {
            if let Some(local) = node.mesh.and_then(|m| mesh_bounds.get(m)) {
                out = out.union(&local.transformed(&node.world));
            }
        });
        out
    }
}
