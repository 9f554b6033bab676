//! Perspective camera, its GPU uniform and auto-framing.
//!
//! The camera looks from `position` at `target`. [`fit_camera_to_bounds`]
//! moves it back along +z until a bounding box fits into the vertical field of
//! view, which is how a freshly loaded model is brought into view.

use cgmath::{Matrix4, Point3, Rad, Vector3};
use log::warn;

use crate::data_structures::bounds::Aabb;

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::from_cols(
    cgmath::Vector4::new(1.0, 0.0, 0.0, 0.0),
    cgmath::Vector4::new(0.0, 1.0, 0.0, 0.0),
    cgmath::Vector4::new(0.0, 0.0, 0.5, 0.0),
    cgmath::Vector4::new(0.0, 0.0, 0.5, 1.0),
);

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
}

impl Camera {
    pub fn new<P: Into<Point3<f32>>, T: Into<Point3<f32>>>(position: P, target: T) -> Self {
        Self {
            position: position.into(),
            target: target.into(),
            up: Vector3::unit_y(),
        }
    }

    pub fn look_at(&mut self, target: Point3<f32>) {
        self.target = target;
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.position, self.target, self.up)
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new((0.0, 0.0, 5.0), (0.0, 0.0, 0.0))
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projection {
    aspect: f32,
    pub fovy: Rad<f32>,
    pub znear: f32,
    pub zfar: f32,
}

impl Projection {
    pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: aspect_ratio(width, height),
            fovy: fovy.into(),
            znear,
            zfar,
        }
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = aspect_ratio(width, height);
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * cgmath::perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

fn aspect_ratio(width: u32, height: u32) -> f32 {
    if height == 0 {
        return 1.0;
    }
    width.max(1) as f32 / height as f32
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    view_position: [f32; 4],
    view_proj: [[f32; 4]; 4],
}

impl CameraUniform {
    pub fn new() -> Self {
        use cgmath::SquareMatrix;
        Self {
            view_position: [0.0; 4],
            view_proj: Matrix4::identity().into(),
        }
    }

    pub fn update_view_proj(&mut self, camera: &Camera, projection: &Projection) {
        self.view_position = camera.position.to_homogeneous().into();
        self.view_proj = (projection.calc_matrix() * camera.calc_matrix()).into();
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct CameraResources {
    pub camera: Camera,
    pub uniform: CameraUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

impl CameraResources {
    /// Push the current camera and projection to the GPU.
    pub fn write(&mut self, queue: &wgpu::Queue, projection: &Projection) {
        self.uniform.update_view_proj(&self.camera, projection);
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[self.uniform]));
    }
}

/// Where the camera ended up after framing a model.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Framing {
    pub center: Point3<f32>,
    pub size: Vector3<f32>,
    pub distance: f32,
}

/// Place `camera` on the +z side of `bounds` so the largest dimension fills
/// the vertical field of view, scaled by `padding`.
///
/// Returns `None` and leaves the camera alone when the bounds are empty or have
/// no extent. The far plane is pushed out when the model would be clipped.
pub fn fit_camera_to_bounds(
    camera: &mut Camera,
    projection: &mut Projection,
    bounds: &Aabb,
    padding: f32,
) -> Option<Framing> {
    if bounds.is_empty() {
        warn!("Cannot frame an empty model, keeping the camera where it is");
        return None;
    }
    let center = bounds.center();
    let size = bounds.size();
    let max_dim = bounds.max_dimension();
    if !(max_dim > f32::EPSILON) || !max_dim.is_finite() {
        warn!("Model has no extent ({:?}), keeping the camera where it is", size);
        return None;
    }

    let half_fov = projection.fovy.0 / 2.0;
    let distance = (max_dim / 2.0 / half_fov.tan()).abs() * padding;

    camera.position = Point3::new(center.x, center.y, center.z + distance);
    camera.look_at(center);

    let needed_far = distance + max_dim;
    if needed_far > projection.zfar {
        warn!(
            "Extending far plane from {} to {} to keep the model in view",
            projection.zfar, needed_far
        );
        projection.zfar = needed_far;
    }

    Some(Framing {
        center,
        size,
        distance,
    })
}
