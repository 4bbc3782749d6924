use glam::{Mat4, Vec3};

use crate::geom::Frustum;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Projection {
    Perspective { fov_y_radians: f32, aspect: f32 },
    Orthographic { width: f32, height: f32 },
}

/// Scene camera. Projection parameters and the eye transform are mutable;
/// the derived matrices and view frustum are recomputed lazily behind a
/// dirty flag whenever any of them change.
#[derive(Clone, Copy, Debug)]
pub struct Camera {
    eye: Vec3,
    target: Vec3,
    up: Vec3,
    projection: Projection,
    near: f32,
    far: f32,
    dirty: bool,
    cached: CameraSnapshot,
}

/// Immutable per-frame camera state consumed by render stages.
#[derive(Clone, Copy, Debug)]
pub struct CameraSnapshot {
    pub view: Mat4,
    pub proj: Mat4,
    pub view_proj: Mat4,
    pub frustum: Frustum,
    pub position: Vec3,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        let mut camera = Self {
            eye: Vec3::new(0.0, 0.0, 3.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            projection: Projection::Perspective {
                fov_y_radians: 60f32.to_radians(),
                aspect: 16.0 / 9.0,
            },
            near: 0.1,
            far: 100.0,
            dirty: true,
            cached: CameraSnapshot {
                view: Mat4::IDENTITY,
                proj: Mat4::IDENTITY,
                view_proj: Mat4::IDENTITY,
                frustum: Frustum::from_view_proj(Mat4::IDENTITY),
                position: Vec3::ZERO,
                near: 0.1,
                far: 100.0,
            },
        };
        camera.refresh();
        camera
    }
}

impl Camera {
    pub fn new(eye: Vec3, target: Vec3, projection: Projection, near: f32, far: f32) -> Self {
        let mut camera = Self::default();
        camera.eye = eye;
        camera.target = target;
        camera.projection = projection;
        camera.near = near;
        camera.far = far;
        camera.dirty = true;
        camera.refresh();
        camera
    }

    pub fn set_eye(&mut self, eye: Vec3) {
        self.eye = eye;
        self.dirty = true;
    }

    pub fn set_target(&mut self, target: Vec3) {
        self.target = target;
        self.dirty = true;
    }

    pub fn set_up(&mut self, up: Vec3) {
        self.up = up;
        self.dirty = true;
    }

    pub fn set_projection(&mut self, projection: Projection) {
        self.projection = projection;
        self.dirty = true;
    }

    pub fn set_clip_planes(&mut self, near: f32, far: f32) {
        self.near = near;
        self.far = far;
        self.dirty = true;
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        if let Projection::Perspective { fov_y_radians, .. } = self.projection {
            self.projection = Projection::Perspective {
                fov_y_radians,
                aspect,
            };
            self.dirty = true;
        }
    }

    pub fn eye(&self) -> Vec3 {
        self.eye
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    pub fn near(&self) -> f32 {
        self.near
    }

    pub fn far(&self) -> f32 {
        self.far
    }

    /// Recomputes the cached matrices and frustum if anything changed since
    /// the last refresh.
    pub fn refresh(&mut self) {
        if !self.dirty {
            return;
        }
        let view = Mat4::look_at_rh(self.eye, self.target, self.up);
        let proj = match self.projection {
            Projection::Perspective {
                fov_y_radians,
                aspect,
            } => Mat4::perspective_rh(fov_y_radians, aspect, self.near, self.far),
            Projection::Orthographic { width, height } => {
                let (hw, hh) = (width * 0.5, height * 0.5);
                Mat4::orthographic_rh(-hw, hw, -hh, hh, self.near, self.far)
            }
        };
        let view_proj = proj * view;
        self.cached = CameraSnapshot {
            view,
            proj,
            view_proj,
            frustum: Frustum::from_view_proj(view_proj),
            position: self.eye,
            near: self.near,
            far: self.far,
        };
        self.dirty = false;
    }

    /// Current derived state. Call `refresh()` first; the scene does this
    /// once per frame before snapshotting.
    pub fn snapshot(&self) -> CameraSnapshot {
        debug_assert!(!self.dirty, "camera snapshot taken before refresh()");
        self.cached
    }
}
