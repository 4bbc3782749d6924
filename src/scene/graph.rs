use glam::Mat4;

use crate::scene::Transform;

/// Generation-checked reference to a scene graph node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeHandle {
    index: u32,
    generation: u32,
}

impl NodeHandle {
    /// Handle used by meshes that are not attached to the graph; they
    /// resolve to the identity world transform.
    pub const DETACHED: Self = Self {
        index: u32::MAX,
        generation: 0,
    };
}

struct Node {
    local: Transform,
    world: Mat4,
    parent: Option<u32>,
    generation: u32,
    dirty: bool,
    alive: bool,
}

/// Arena-allocated transform hierarchy. Nodes reference parents by index,
/// and a parent's index is always smaller than its children's (enforced at
/// insert), so one forward pass over the arena propagates world transforms
/// and dirty flags without recursion.
///
/// Slots are never reused; removal bumps the generation so stale handles
/// fail the generation check instead of aliasing a new node.
#[derive(Default)]
pub struct SceneGraph {
    nodes: Vec<Node>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, parent: Option<NodeHandle>, local: Transform) -> NodeHandle {
        let parent_index = parent.and_then(|handle| {
            if self.is_alive(handle) {
                Some(handle.index)
            } else {
                log::warn!("Inserting under a removed node; attaching to root instead");
                None
            }
        });

        let index = self.nodes.len() as u32;
        self.nodes.push(Node {
            local,
            world: Mat4::IDENTITY,
            parent: parent_index,
            generation: 0,
            dirty: true,
            alive: true,
        });
        NodeHandle {
            index,
            generation: 0,
        }
    }

    pub fn remove(&mut self, handle: NodeHandle) {
        if !self.is_alive(handle) {
            return;
        }
        let index = handle.index;
        self.nodes[index as usize].alive = false;
        self.nodes[index as usize].generation += 1;

        // Orphaned children are re-attached to the root.
        let mut orphans = 0;
        for node in &mut self.nodes {
            if node.parent == Some(index) {
                node.parent = None;
                node.dirty = true;
                orphans += 1;
            }
        }
        if orphans > 0 {
            log::warn!("Removed node had {orphans} children; re-attached to root");
        }
    }

    pub fn is_alive(&self, handle: NodeHandle) -> bool {
        self.nodes
            .get(handle.index as usize)
            .is_some_and(|node| node.alive && node.generation == handle.generation)
    }

    pub fn set_local(&mut self, handle: NodeHandle, local: Transform) {
        if !self.is_alive(handle) {
            log::warn!("set_local on a removed node ignored");
            return;
        }
        let node = &mut self.nodes[handle.index as usize];
        node.local = local;
        node.dirty = true;
    }

    pub fn local(&self, handle: NodeHandle) -> Option<Transform> {
        if self.is_alive(handle) {
            Some(self.nodes[handle.index as usize].local)
        } else {
            None
        }
    }

    /// Cached world transform from the last `propagate()` pass. Detached
    /// or stale handles resolve to identity.
    pub fn world(&self, handle: NodeHandle) -> Mat4 {
        if self.is_alive(handle) {
            self.nodes[handle.index as usize].world
        } else {
            Mat4::IDENTITY
        }
    }

    /// One forward pass recomputing world transforms. A node is recomputed
    /// when it or any ancestor changed since the last pass.
    pub fn propagate(&mut self) {
        for index in 0..self.nodes.len() {
            if !self.nodes[index].alive {
                continue;
            }
            let parent_state = self.nodes[index]
                .parent
                .map(|p| (self.nodes[p as usize].world, self.nodes[p as usize].dirty));

            let node_dirty = self.nodes[index].dirty;
            match parent_state {
                Some((parent_world, parent_dirty)) => {
                    if node_dirty || parent_dirty {
                        self.nodes[index].world = parent_world * self.nodes[index].local.matrix();
                        // Keep the flag up so later children of this node
                        // also recompute; cleared in the second sweep.
                        self.nodes[index].dirty = true;
                    }
                }
                None => {
                    if node_dirty {
                        self.nodes[index].world = self.nodes[index].local.matrix();
                    }
                }
            }
        }
        for node in &mut self.nodes {
            node.dirty = false;
        }
    }
}
