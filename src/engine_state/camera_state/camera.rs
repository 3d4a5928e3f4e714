//! # Camera Implementation
//!
//! This module contains the core camera implementation including:
//! - A free-flying camera with a quaternion orientation
//! - Projection matrix handling
//! - Camera controller for input processing
//! - GPU uniform data
//!
//! ## Conventions
//! The camera looks down its local -Z axis with +Y up and +X right.
//! Rotations are applied in the camera's local frame, so there is no
//! preferred "up" direction and no pitch limit: the camera can roll and loop
//! freely.

use cgmath::*;
use web_time::Duration;

use crate::{config::CameraConfig, engine_state::PlayerAction};

/// Transformation matrix to convert from OpenGL's coordinate system to WGPU's.
///
/// Scales and translates clip-space Z from [-1, 1] to [0, 1]; X, Y and W are
/// unchanged.
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: cgmath::Matrix4<f32> = cgmath::Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

/// A free 6-DOF camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    /// The camera's position in world space
    pub position: Point3<f32>,
    /// Rotation from camera space to world space
    pub orientation: Quaternion<f32>,
}

impl Camera {
    /// Creates a camera at `position` looking down the world -Z axis.
    pub fn new<V: Into<Point3<f32>>>(position: V) -> Self {
        Self {
            position: position.into(),
            orientation: Quaternion::one(),
        }
    }

    /// Unit vector the camera looks along.
    pub fn forward(&self) -> Vector3<f32> {
        self.orientation.rotate_vector(-Vector3::unit_z())
    }

    /// Unit vector to the camera's right.
    pub fn right(&self) -> Vector3<f32> {
        self.orientation.rotate_vector(Vector3::unit_x())
    }

    /// Unit vector pointing up from the camera.
    pub fn up(&self) -> Vector3<f32> {
        self.orientation.rotate_vector(Vector3::unit_y())
    }

    /// Rotates the camera about one of its own axes.
    ///
    /// # Arguments
    /// * `local_axis` - Axis in camera space
    /// * `angle` - Right-handed angle about the axis
    pub fn rotate<A: Into<Rad<f32>>>(&mut self, local_axis: Vector3<f32>, angle: A) {
        self.orientation = (self.orientation * Quaternion::from_axis_angle(local_axis, angle)).normalize();
    }

    /// Calculates the view matrix, mapping world space to camera space.
    pub fn calc_matrix(&self) -> Matrix4<f32> {
        Matrix4::from(self.orientation.conjugate())
            * Matrix4::from_translation(-self.position.to_vec())
    }
}

/// The camera's perspective projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    /// Aspect ratio (width / height)
    aspect: f32,
    /// Vertical field of view in radians
    fovy: Rad<f32>,
    /// Near clipping plane distance
    znear: f32,
    /// Far clipping plane distance
    zfar: f32,
}

impl Projection {
    /// Creates a new projection with the given parameters.
    ///
    /// # Arguments
    /// * `width` - Viewport width in pixels
    /// * `height` - Viewport height in pixels
    /// * `fovy` - Vertical field of view
    /// * `znear` - Near clipping plane distance
    /// * `zfar` - Far clipping plane distance
    pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: aspect_ratio(width, height),
            fovy: fovy.into(),
            znear,
            zfar,
        }
    }

    /// Updates the aspect ratio after a viewport resize.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = aspect_ratio(width, height);
    }

    /// Calculates the projection matrix in wgpu clip space.
    pub fn calc_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

fn aspect_ratio(width: u32, height: u32) -> f32 {
    width.max(1) as f32 / height.max(1) as f32
}

/// Accumulates input between camera updates.
///
/// Translation and roll are driven by held keys and scale with elapsed time;
/// mouse rotation is a fixed angle per pixel of motion.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraController {
    // Movement directions in camera space (-1, 0 or 1 per axis)
    amount_right: f32,
    amount_up: f32,
    amount_forward: f32,
    amount_roll: f32,

    // Mouse rotation in degrees
    rotate_horizontal: f32,
    rotate_vertical: f32,

    // Configuration
    speed: f32,
    sensitivity: f32,
    roll_speed: f32,
}

impl CameraController {
    /// Creates a controller.
    ///
    /// # Arguments
    /// * `speed` - Movement speed in units per second
    /// * `sensitivity` - Mouse rotation in degrees per pixel
    /// * `roll_speed` - Roll speed in degrees per second
    pub fn new(speed: f32, sensitivity: f32, roll_speed: f32) -> Self {
        Self {
            amount_right: 0.0,
            amount_up: 0.0,
            amount_forward: 0.0,
            amount_roll: 0.0,
            rotate_horizontal: 0.0,
            rotate_vertical: 0.0,
            speed,
            sensitivity,
            roll_speed,
        }
    }

    /// Creates a controller with the speeds of `config`.
    pub fn from_config(config: &CameraConfig) -> Self {
        Self::new(config.move_speed, config.mouse_sensitivity, config.roll_speed)
    }

    /// Records the movement requested by `actions`.
    pub fn intake_actions(&mut self, actions: &PlayerAction) {
        let axis = |positive: bool, negative: bool| positive as i8 as f32 - negative as i8 as f32;

        self.amount_forward = axis(actions.move_forward, actions.move_backward);
        self.amount_right = axis(actions.move_right, actions.move_left);
        self.amount_up = axis(actions.move_up, actions.move_down);
        self.amount_roll = axis(actions.roll_right, actions.roll_left);

        if let Some((delta_x, delta_y)) = actions.rotate_view {
            self.rotate_horizontal += delta_x as f32 * self.sensitivity;
            self.rotate_vertical += delta_y as f32 * self.sensitivity;
        }
    }

    /// Checks if there are any pending updates that would affect the camera.
    pub fn has_updates(&self) -> bool {
        self.amount_forward != 0.0
            || self.amount_right != 0.0
            || self.amount_up != 0.0
            || self.amount_roll != 0.0
            || self.rotate_horizontal != 0.0
            || self.rotate_vertical != 0.0
    }

    /// Applies the pending movement to `camera` and clears the mouse rotation.
    ///
    /// Held keys stay active until the next [`CameraController::intake_actions`].
    ///
    /// # Arguments
    /// * `camera` - The camera to move
    /// * `dt` - Time elapsed since the last update
    pub fn update_camera(&mut self, camera: &mut Camera, dt: Duration) {
        let dt = dt.as_secs_f32();

        // Mouse right turns right, mouse down looks down.
        camera.rotate(Vector3::unit_y(), Deg(-self.rotate_horizontal));
        camera.rotate(Vector3::unit_x(), Deg(-self.rotate_vertical));
        // Rolling right is clockwise seen from behind the camera.
        camera.rotate(-Vector3::unit_z(), Deg(self.amount_roll * self.roll_speed * dt));
        self.rotate_horizontal = 0.0;
        self.rotate_vertical = 0.0;

        let step = self.speed * dt;
        camera.position += camera.forward() * self.amount_forward * step
            + camera.right() * self.amount_right * step
            + camera.up() * self.amount_up * step;
    }
}

/// GPU-friendly representation of camera data for shaders.
///
/// Matches the `CameraUniform` struct of the chunk and query shaders.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    view_proj: [[f32; 4]; 4],
    position: [f32; 4],
}

impl CameraUniform {
    /// Creates a uniform with an identity matrix and zero position.
    pub fn new() -> Self {
        Self {
            view_proj: Matrix4::identity().into(),
            position: [0.0; 4],
        }
    }

    /// Updates the view-projection matrix and position from the camera.
    pub fn update_view_proj_and_pos(&mut self, camera: &Camera, projection: &Projection) {
        self.view_proj = (projection.calc_matrix() * camera.calc_matrix()).into();
        self.position = camera.position.to_homogeneous().into();
    }

    /// The view-projection matrix.
    pub fn view_proj(&self) -> Matrix4<f32> {
        self.view_proj.into()
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: Vector3<f32>, b: Vector3<f32>) {
        assert!((a - b).magnitude() < 1e-4, "{a:?} != {b:?}");
    }

    fn actions() -> PlayerAction {
        PlayerAction::default()
    }

    #[test]
    fn test_initial_basis() {
        let camera = Camera::new([0.0, 0.0, 0.0]);
        assert_close(camera.forward(), -Vector3::unit_z());
        assert_close(camera.right(), Vector3::unit_x());
        assert_close(camera.up(), Vector3::unit_y());
    }

    #[test]
    fn test_basis_stays_orthonormal() {
        let mut camera = Camera::new([0.0, 0.0, 0.0]);
        let mut controller = CameraController::new(10.0, 0.2, 180.0);
        for i in 0..500 {
            controller.intake_actions(&PlayerAction {
                rotate_view: Some((i as f64 * 0.37, -(i as f64) * 0.11)),
                roll_right: i % 3 == 0,
                ..actions()
            });
            controller.update_camera(&mut camera, Duration::from_millis(16));
        }

        let (f, r, u) = (camera.forward(), camera.right(), camera.up());
        for v in [f, r, u] {
            assert!((v.magnitude() - 1.0).abs() < 1e-4);
        }
        assert!(f.dot(r).abs() < 1e-4 && f.dot(u).abs() < 1e-4 && r.dot(u).abs() < 1e-4);
        assert_close(r.cross(u), -f);
    }

    #[test]
    fn test_mouse_right_turns_right() {
        let mut camera = Camera::new([0.0, 0.0, 0.0]);
        let mut controller = CameraController::new(10.0, 0.2, 180.0);
        // 450 px at 0.2 degrees per pixel.
        controller.intake_actions(&PlayerAction {
            rotate_view: Some((450.0, 0.0)),
            ..actions()
        });
        controller.update_camera(&mut camera, Duration::ZERO);
        assert_close(camera.forward(), Vector3::unit_x());
        assert!(!controller.has_updates());
    }

    #[test]
    fn test_mouse_down_looks_down() {
        let mut camera = Camera::new([0.0, 0.0, 0.0]);
        let mut controller = CameraController::new(10.0, 0.2, 180.0);
        controller.intake_actions(&PlayerAction {
            rotate_view: Some((0.0, 450.0)),
            ..actions()
        });
        controller.update_camera(&mut camera, Duration::ZERO);
        assert_close(camera.forward(), -Vector3::unit_y());
    }

    #[test]
    fn test_roll_keeps_forward() {
        let mut camera = Camera::new([0.0, 0.0, 0.0]);
        let mut controller = CameraController::new(10.0, 0.2, 180.0);
        controller.intake_actions(&PlayerAction {
            roll_right: true,
            ..actions()
        });
        controller.update_camera(&mut camera, Duration::from_millis(500));
        assert_close(camera.forward(), -Vector3::unit_z());
        assert_close(camera.up(), Vector3::unit_x());

        // Another half second at 180 degrees per second turns it upside down.
        controller.update_camera(&mut camera, Duration::from_millis(500));
        assert_close(camera.up(), -Vector3::unit_y());
    }

    #[test]
    fn test_movement_follows_camera_axes() {
        let mut camera = Camera::new([1.0, 2.0, 3.0]);
        let mut controller = CameraController::new(10.0, 0.2, 180.0);
        controller.intake_actions(&PlayerAction {
            move_forward: true,
            move_up: true,
            ..actions()
        });
        controller.update_camera(&mut camera, Duration::from_secs(1));
        assert_close(camera.position.to_vec(), Vector3::new(1.0, 12.0, -7.0));

        // Opposite keys cancel.
        controller.intake_actions(&PlayerAction {
            move_left: true,
            move_right: true,
            ..actions()
        });
        assert!(!controller.has_updates());
    }

    #[test]
    fn test_view_matrix_moves_camera_to_origin() {
        let mut camera = Camera::new([4.0, -2.0, 7.0]);
        camera.rotate(Vector3::unit_y(), Deg(30.0));
        let view = camera.calc_matrix();

        let eye = view * camera.position.to_homogeneous();
        assert_close(eye.truncate(), Vector3::zero());

        let ahead = view * (camera.position + camera.forward() * 5.0).to_homogeneous();
        assert_close(ahead.truncate(), Vector3::new(0.0, 0.0, -5.0));
    }

    #[test]
    fn test_projection_maps_depth_to_unit_range() {
        let projection = Projection::new(640, 480, Deg(90.0), 0.1, 200.0);
        let matrix = projection.calc_matrix();
        let near = matrix * Vector4::new(0.0, 0.0, -0.1, 1.0);
        let far = matrix * Vector4::new(0.0, 0.0, -200.0, 1.0);
        assert!((near.z / near.w).abs() < 1e-4);
        assert!((far.z / far.w - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_uniform_tracks_camera() {
        let camera = Camera::new([1.0, 2.0, 3.0]);
        let projection = Projection::new(640, 480, Deg(90.0), 0.1, 200.0);
        let mut uniform = CameraUniform::new();
        uniform.update_view_proj_and_pos(&camera, &projection);
        assert_eq!(uniform.position, [1.0, 2.0, 3.0, 1.0]);
        assert_eq!(uniform.view_proj(), projection.calc_matrix() * camera.calc_matrix());
    }
}
