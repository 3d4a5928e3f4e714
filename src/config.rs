//! # Engine Configuration
//!
//! Runtime settings for the world volume, the camera and the renderer.
//!
//! The configuration is read from an optional JSON file. Every section and
//! every field falls back to its default, so a file only needs to name the
//! values it overrides:
//!
//! ```json
//! { "world": { "chunk_range": 2 }, "rendering": { "occlusion_culling": false } }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use wgpu::QUERY_SET_MAX_QUERIES;

use crate::error::EngineError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// World volume and scalar field settings.
    pub world: WorldConfig,
    /// Camera and projection settings.
    pub camera: CameraConfig,
    /// Window and renderer settings.
    pub rendering: RenderingConfig,
}

/// Settings for the chunk grid and the density field sampled to build it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorldConfig {
    /// Chunks span `[-chunk_range, chunk_range)` on each axis.
    pub chunk_range: i32,
    /// Edge length of a chunk in voxels.
    pub chunk_size: i32,
    /// A voxel is solid when its density is below this value.
    pub density_threshold: f32,
    /// Seed of the Perlin generator.
    pub noise_seed: u32,
    /// Scale applied to positions before sampling noise.
    pub noise_frequency: f64,
    /// Offset added to positions before scaling.
    pub noise_offset: [f64; 3],
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            chunk_range: 4,
            chunk_size: 32,
            density_threshold: 0.0,
            noise_seed: 0,
            noise_frequency: 0.1,
            noise_offset: [100.0, 100.0, 100.0],
        }
    }
}

impl WorldConfig {
    /// Number of chunks the configured grid holds.
    pub fn chunk_count(&self) -> u64 {
        let edge = 2 * self.chunk_range.max(0) as u64;
        edge.saturating_mul(edge).saturating_mul(edge)
    }
}

/// Camera placement, projection and movement speeds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CameraConfig {
    /// Starting position in world space.
    pub position: [f32; 3],
    /// Vertical field of view in degrees.
    pub fov_y_degrees: f32,
    /// Near clipping plane.
    pub z_near: f32,
    /// Far clipping plane.
    pub z_far: f32,
    /// Translation speed in units per second.
    pub move_speed: f32,
    /// Rotation per pixel of mouse motion, in degrees.
    pub mouse_sensitivity: f32,
    /// Roll speed in degrees per second.
    pub roll_speed: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 0.0],
            fov_y_degrees: 90.0,
            z_near: 0.1,
            z_far: 200.0,
            move_speed: 10.0,
            mouse_sensitivity: 0.2,
            roll_speed: 180.0,
        }
    }
}

/// Window and renderer settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RenderingConfig {
    /// Initial window width in physical pixels.
    pub window_width: u32,
    /// Initial window height in physical pixels.
    pub window_height: u32,
    /// Colour the frame is cleared to.
    pub clear_color: [f64; 3],
    /// Whether occlusion culling starts enabled.
    pub occlusion_culling: bool,
    /// Size of the frame timer query ring.
    pub timer_query_count: u32,
    /// Directory holding the WGSL sources.
    pub shader_directory: String,
}

impl Default for RenderingConfig {
    fn default() -> Self {
        Self {
            window_width: 640,
            window_height: 480,
            clear_color: [0.5, 0.8, 1.0],
            occlusion_culling: true,
            timer_query_count: 5,
            shader_directory: String::from("assets/shaders"),
        }
    }
}

impl EngineConfig {
    /// Loads the configuration from `path`, or returns the defaults when no
    /// path is given.
    ///
    /// # Arguments
    /// * `path` - Optional path of a JSON configuration file
    ///
    /// # Returns
    /// The validated configuration, or the read, parse or validation error
    pub fn load(path: Option<&Path>) -> Result<Self, EngineError> {
        let config = match path {
            Some(path) => {
                let contents =
                    std::fs::read_to_string(path).map_err(|source| EngineError::ConfigRead {
                        path: path.to_path_buf(),
                        source,
                    })?;
                Self::from_json(&contents)?
            }
            None => Self::default(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Parses a configuration from a JSON string without validating it.
    pub fn from_json(contents: &str) -> Result<Self, EngineError> {
        Ok(serde_json::from_str(contents)?)
    }

    /// Checks that the values can drive the engine.
    pub fn validate(&self) -> Result<(), EngineError> {
        let invalid = |message: String| Err(EngineError::InvalidConfig(message));

        if self.world.chunk_size < 1 {
            return invalid(format!("chunk_size must be at least 1, got {}", self.world.chunk_size));
        }
        if self.world.chunk_range < 1 {
            return invalid(format!(
                "chunk_range must be at least 1, got {}",
                self.world.chunk_range
            ));
        }
        // Every chunk owns one slot of a single occlusion query set.
        if self.world.chunk_count() > QUERY_SET_MAX_QUERIES as u64 {
            return invalid(format!(
                "chunk_range {} yields {} chunks, more than the {} occlusion queries a query set holds",
                self.world.chunk_range,
                self.world.chunk_count(),
                QUERY_SET_MAX_QUERIES
            ));
        }
        if self.rendering.timer_query_count < 2 {
            return invalid(format!(
                "timer_query_count must be at least 2, got {}",
                self.rendering.timer_query_count
            ));
        }
        if self.camera.z_near <= 0.0 || self.camera.z_far <= self.camera.z_near {
            return invalid(format!(
                "clip planes must satisfy 0 < z_near < z_far, got {} and {}",
                self.camera.z_near, self.camera.z_far
            ));
        }
        if self.rendering.window_width == 0 || self.rendering.window_height == 0 {
            return invalid(String::from("window dimensions must be non-zero"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_reference_scene() {
        let config = EngineConfig::default();
        assert_eq!(config.world.chunk_range, 4);
        assert_eq!(config.world.chunk_size, 32);
        assert_eq!(config.world.chunk_count(), 512);
        assert_eq!(config.rendering.timer_query_count, 5);
        assert!(config.rendering.occlusion_culling);
        assert_eq!(config.camera.fov_y_degrees, 90.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_other_defaults() {
        let config =
            EngineConfig::from_json(r#"{ "world": { "chunk_range": 1 }, "camera": { "z_far": 500.0 } }"#)
                .unwrap();
        assert_eq!(config.world.chunk_range, 1);
        assert_eq!(config.world.chunk_size, 32);
        assert_eq!(config.camera.z_far, 500.0);
        assert_eq!(config.rendering, RenderingConfig::default());
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        assert!(EngineConfig::from_json(r#"{ "future_setting": true }"#).is_ok());
    }

    #[test]
    fn test_invalid_json_is_a_parse_error() {
        let result = EngineConfig::from_json("{ not json");
        assert!(matches!(result, Err(EngineError::ConfigParse(_))));
    }

    #[test]
    fn test_validation_rejects_degenerate_values() {
        let mut config = EngineConfig::default();
        config.world.chunk_size = 0;
        assert!(matches!(config.validate(), Err(EngineError::InvalidConfig(_))));

        let mut config = EngineConfig::default();
        config.rendering.timer_query_count = 1;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.camera.z_far = config.camera.z_near;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.world.chunk_range = 9;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_huge_chunk_range_is_rejected_without_overflow() {
        let mut config = EngineConfig::default();
        config.world.chunk_range = i32::MAX;
        assert_eq!(config.world.chunk_count(), u64::MAX);
        assert!(matches!(config.validate(), Err(EngineError::InvalidConfig(_))));

        config.world.chunk_range = 1 << 30;
        assert_eq!(config.world.chunk_count(), u64::MAX);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, r#"{{ "rendering": {{ "occlusion_culling": false }} }}"#).unwrap();

        let config = EngineConfig::load(Some(&path)).unwrap();
        assert!(!config.rendering.occlusion_culling);
    }

    #[test]
    fn test_load_missing_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        match EngineConfig::load(Some(&path)) {
            Err(EngineError::ConfigRead { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("expected read error, got {other:?}"),
        }
    }

    #[test]
    fn test_load_without_path_uses_defaults() {
        assert_eq!(EngineConfig::load(None).unwrap(), EngineConfig::default());
    }
}
