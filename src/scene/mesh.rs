use glam::Mat4;

use crate::geom::Aabb;
use crate::renderer::Material;
use crate::scene::NodeHandle;

/// GPU geometry handles plus the local-space bounds of the vertex data.
/// The handles are opaque backend resources created at load time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Geometry {
    pub vertex_buffer: u32,
    pub index_buffer: u32,
    pub index_count: u32,
    pub bounds: Aabb,
}

/// One material/geometry pairing owned by a mesh. Immutable per frame; the
/// world transform comes from the owning mesh's scene node.
#[derive(Clone, Debug)]
pub struct RenderItem {
    pub material: Material,
    pub geometry: Geometry,
}

/// A mesh owns zero or more render items and a bounding box merged from all
/// owned geometries, recomputed lazily when geometry is added.
#[derive(Clone, Debug)]
pub struct Mesh {
    pub node: NodeHandle,
    items: Vec<RenderItem>,
    local_bounds: Aabb,
    bounds_dirty: bool,
}

impl Mesh {
    pub fn new(node: NodeHandle) -> Self {
        Self {
            node,
            items: Vec::new(),
            local_bounds: Aabb::EMPTY,
            bounds_dirty: false,
        }
    }

    pub fn add_item(&mut self, item: RenderItem) {
        self.items.push(item);
        self.bounds_dirty = true;
    }

    pub fn items(&self) -> &[RenderItem] {
        &self.items
    }

    pub fn local_bounds(&mut self) -> Aabb {
        if self.bounds_dirty {
            let mut bounds = Aabb::EMPTY;
            for item in &self.items {
                bounds.merge(&item.geometry.bounds);
            }
            self.local_bounds = bounds;
            self.bounds_dirty = false;
        }
        self.local_bounds
    }
}

/// Per-frame world-space view of a render item, consumed by culling and
/// the render stages.
#[derive(Clone, Copy, Debug)]
pub struct RenderItemSnapshot {
    pub material: Material,
    pub geometry: Geometry,
    pub world_from_local: Mat4,
    pub world_bounds: Aabb,
}

#[derive(Clone, Debug)]
pub struct MeshSnapshot {
    pub world_bounds: Aabb,
    pub items: Vec<RenderItemSnapshot>,
}
