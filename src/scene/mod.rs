mod camera;
mod graph;
mod light;
mod mesh;
mod scene;
mod transform;

pub use camera::{Camera, CameraSnapshot, Projection};
pub use graph::{NodeHandle, SceneGraph};
pub use light::{Light, LightKind, MAX_CASCADES, MAX_LIGHTS, MAX_SHADOW_LIGHTS};
pub use mesh::{Geometry, Mesh, MeshSnapshot, RenderItem, RenderItemSnapshot};
pub use scene::{FrameSnapshot, Scene, Skybox};
pub use transform::Transform;
