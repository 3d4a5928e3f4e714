//! # Camera State Management
//!
//! Bundles the camera with its projection, its input controller and the
//! uniform data uploaded to the GPU.
//!
//! ## Core Components
//! - `Camera`: position and quaternion orientation
//! - `CameraController`: turns player actions into camera motion
//! - `Projection`: the perspective projection
//! - `CameraUniform`: GPU representation of camera data for shaders

use cgmath::{Deg, Point3};
use web_time::Duration;

use crate::config::CameraConfig;

use super::{rendering::FrameView, PlayerAction};

pub mod camera;

/// Name of the GPU buffer used for camera uniform data
pub const CAMERA_BUFFER_NAME: &str = "camera_buffer";

/// The camera and everything derived from it.
pub struct CameraState {
    /// The current camera position and orientation
    pub camera: camera::Camera,
    /// The perspective projection
    pub projection: camera::Projection,
    /// GPU-optimized camera data for shaders
    pub camera_uniform: camera::CameraUniform,
    /// Handles player input and camera movement
    pub camera_controller: camera::CameraController,
}

impl CameraState {
    /// Creates the camera described by `config` for a `width` x `height`
    /// viewport.
    pub fn new(config: &CameraConfig, width: u32, height: u32) -> Self {
        let camera = camera::Camera::new(Point3::from(config.position));
        let projection = camera::Projection::new(
            width,
            height,
            Deg(config.fov_y_degrees),
            config.z_near,
            config.z_far,
        );

        let mut camera_uniform = camera::CameraUniform::new();
        camera_uniform.update_view_proj_and_pos(&camera, &projection);

        Self {
            camera,
            projection,
            camera_uniform,
            camera_controller: camera::CameraController::from_config(config),
        }
    }

    /// Processes player input actions and updates the camera controller state.
    pub fn intake_actions(&mut self, actions: &PlayerAction) {
        self.camera_controller.intake_actions(actions);
    }

    /// Moves the camera by the pending input and refreshes the uniform.
    ///
    /// # Returns
    /// Whether the camera moved
    pub fn update(&mut self, dt: Duration) -> bool {
        if !self.camera_controller.has_updates() {
            return false;
        }
        self.camera_controller.update_camera(&mut self.camera, dt);
        self.camera_uniform
            .update_view_proj_and_pos(&self.camera, &self.projection);
        true
    }

    /// Adapts the projection to a new viewport size.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.projection.resize(width, height);
        self.camera_uniform
            .update_view_proj_and_pos(&self.camera, &self.projection);
    }

    /// The view the visibility scheduler culls against.
    pub fn frame_view(&self) -> FrameView {
        FrameView {
            camera_position: self.camera.position,
            view_projection: self.camera_uniform.view_proj(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_without_input_keeps_camera() {
        let mut state = CameraState::new(&CameraConfig::default(), 640, 480);
        let before = state.camera;
        assert!(!state.update(Duration::from_millis(16)));
        assert_eq!(state.camera, before);
    }

    #[test]
    fn test_update_refreshes_frame_view() {
        let mut state = CameraState::new(&CameraConfig::default(), 640, 480);
        state.intake_actions(&PlayerAction {
            move_backward: true,
            ..PlayerAction::default()
        });
        assert!(state.update(Duration::from_secs(1)));

        let view = state.frame_view();
        assert_eq!(view.camera_position, Point3::new(0.0, 0.0, 10.0));
        assert_eq!(
            view.view_projection,
            state.projection.calc_matrix() * state.camera.calc_matrix()
        );
    }
}
