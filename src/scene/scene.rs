use std::sync::Arc;

use glam::Vec3;

use crate::scene::{
    Camera, CameraSnapshot, Light, Mesh, MeshSnapshot, NodeHandle, RenderItemSnapshot, SceneGraph,
    Transform,
};

/// Cubemap pixel data shared with the post-process stage. `version` bumps
/// on every content change so stages can re-upload lazily.
#[derive(Clone, Debug)]
pub struct Skybox {
    pub pixels: Arc<Vec<u8>>,
    pub face_size: u32,
    pub version: u64,
}

/// Scene container: transform hierarchy, meshes, lights, the main camera
/// and scene-level resources. One camera exists per scene.
pub struct Scene {
    graph: SceneGraph,
    camera: Camera,
    lights: Vec<Light>,
    meshes: Vec<Mesh>,
    global_ambient: Vec3,
    skybox: Option<Skybox>,
}

impl Scene {
    pub fn new() -> Self {
        Self {
            graph: SceneGraph::new(),
            camera: Camera::default(),
            lights: Vec::new(),
            meshes: Vec::new(),
            global_ambient: Vec3::splat(0.05),
            skybox: None,
        }
    }

    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut SceneGraph {
        &mut self.graph
    }

    pub fn add_node(&mut self, parent: Option<NodeHandle>, local: Transform) -> NodeHandle {
        self.graph.insert(parent, local)
    }

    pub fn add_mesh(&mut self, mesh: Mesh) -> usize {
        self.meshes.push(mesh);
        self.meshes.len() - 1
    }

    pub fn add_light(&mut self, light: Light) -> usize {
        self.lights.push(light);
        self.lights.len() - 1
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    pub fn lights_mut(&mut self) -> &mut [Light] {
        &mut self.lights
    }

    pub fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    pub fn mesh_mut(&mut self, index: usize) -> Option<&mut Mesh> {
        self.meshes.get_mut(index)
    }

    pub fn main_camera(&self) -> &Camera {
        &self.camera
    }

    pub fn main_camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn global_ambient(&self) -> Vec3 {
        self.global_ambient
    }

    pub fn set_global_ambient(&mut self, ambient: Vec3) {
        self.global_ambient = ambient;
    }

    pub fn skybox(&self) -> Option<&Skybox> {
        self.skybox.as_ref()
    }

    pub fn set_skybox(&mut self, pixels: Vec<u8>, face_size: u32) {
        let version = self.skybox.as_ref().map_or(1, |s| s.version + 1);
        self.skybox = Some(Skybox {
            pixels: Arc::new(pixels),
            face_size,
            version,
        });
    }

    /// Propagates transforms, refreshes the camera and produces the
    /// immutable per-frame snapshot all render stages read. Nothing in the
    /// snapshot aliases mutable scene state, so stage updates can run in
    /// parallel against it.
    pub fn snapshot(&mut self) -> FrameSnapshot {
        self.graph.propagate();
        self.camera.refresh();

        let mut meshes = Vec::with_capacity(self.meshes.len());
        for mesh in &mut self.meshes {
            let world = self.graph.world(mesh.node);
            let local_bounds = mesh.local_bounds();
            let items = mesh
                .items()
                .iter()
                .map(|item| RenderItemSnapshot {
                    material: item.material,
                    geometry: item.geometry,
                    world_from_local: world,
                    world_bounds: item.geometry.bounds.transformed(&world),
                })
                .collect();
            meshes.push(MeshSnapshot {
                world_bounds: local_bounds.transformed(&world),
                items,
            });
        }

        FrameSnapshot {
            camera: self.camera.snapshot(),
            lights: self.lights.clone(),
            meshes,
            global_ambient: self.global_ambient,
            skybox: self.skybox.clone(),
        }
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only scene state for one frame. Shared by reference across the
/// worker pool during stage updates.
#[derive(Clone)]
pub struct FrameSnapshot {
    pub camera: CameraSnapshot,
    pub lights: Vec<Light>,
    pub meshes: Vec<MeshSnapshot>,
    pub global_ambient: Vec3,
    pub skybox: Option<Skybox>,
}

impl FrameSnapshot {
    pub fn all_render_items(&self) -> impl Iterator<Item = &RenderItemSnapshot> {
        self.meshes.iter().flat_map(|mesh| mesh.items.iter())
    }
}
