//! # Scalar Field
//!
//! Density functions sampled to decide which voxels are solid.
//!
//! A voxel at `p` is solid when `density(p)` is below the world's threshold.
//! Fields must be deterministic: the mesher samples the same positions from
//! two neighbouring chunks and relies on both seeing the same value.

use cgmath::Point3;
use noise::{NoiseFn, Perlin};

use crate::config::WorldConfig;

/// A deterministic density function over world space.
pub trait ScalarField {
    /// Returns the density at `position`.
    fn density(&self, position: Point3<f32>) -> f32;
}

impl<F> ScalarField for F
where
    F: Fn(Point3<f32>) -> f32,
{
    fn density(&self, position: Point3<f32>) -> f32 {
        self(position)
    }
}

/// Perlin noise sampled at `frequency * (position + offset)`.
pub struct PerlinField {
    perlin: Perlin,
    frequency: f64,
    offset: [f64; 3],
}

impl PerlinField {
    /// Creates a field from an explicit seed, frequency and offset.
    pub fn new(seed: u32, frequency: f64, offset: [f64; 3]) -> Self {
        Self {
            perlin: Perlin::new(seed),
            frequency,
            offset,
        }
    }

    /// Creates the field described by the world configuration.
    pub fn from_config(config: &WorldConfig) -> Self {
        Self::new(config.noise_seed, config.noise_frequency, config.noise_offset)
    }
}

impl ScalarField for PerlinField {
    fn density(&self, position: Point3<f32>) -> f32 {
        let sample = [
            self.frequency * (position.x as f64 + self.offset[0]),
            self.frequency * (position.y as f64 + self.offset[1]),
            self.frequency * (position.z as f64 + self.offset[2]),
        ];
        self.perlin.get(sample) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perlin_field_is_deterministic() {
        let a = PerlinField::new(7, 0.1, [100.0; 3]);
        let b = PerlinField::new(7, 0.1, [100.0; 3]);
        for i in 0..64 {
            let p = Point3::new(i as f32 * 1.5, -(i as f32), (i * i) as f32 * 0.25);
            assert_eq!(a.density(p), b.density(p));
        }
    }

    #[test]
    fn test_perlin_field_varies_in_space() {
        let field = PerlinField::from_config(&WorldConfig::default());
        let samples: Vec<f32> = (0..32)
            .map(|i| field.density(Point3::new(i as f32 * 3.3, 0.0, 0.0)))
            .collect();
        assert!(samples.iter().any(|d| *d < 0.0));
        assert!(samples.iter().any(|d| *d > 0.0));
    }

    #[test]
    fn test_closures_are_fields() {
        let field = |p: Point3<f32>| p.y;
        assert_eq!(field.density(Point3::new(0.0, -2.0, 0.0)), -2.0);
    }
}
