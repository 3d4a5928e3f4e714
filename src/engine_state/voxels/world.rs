//! # World Module
//!
//! This module provides the `ChunkStore`, which owns every chunk of the voxel
//! world and the GPU resources behind them.
//!
//! ## Architecture
//!
//! The world volume is the grid `[-R, R)` on each axis, with chunks of edge
//! length `S`. The grid is never materialised on its own: it is only the
//! iteration range used while generating the chunks.
//!
//! Chunks are generated once, sequentially, at startup, and released together
//! at shutdown. No chunk is created or destroyed while frames are rendered,
//! but the store's order changes every frame as the visibility scheduler
//! sorts it by distance to the camera.
//!
//! ## Performance Considerations
//!
//! - Generation samples the scalar field `(2R)³ · S³` times plus neighbour
//!   samples for solid voxels, which takes noticeable time for the default
//!   world
//! - Sorting is `O(n log n)` per frame over a few hundred chunks

use cgmath::Point3;
use log::{debug, info};

use crate::{
    config::WorldConfig,
    engine_state::rendering::device::RenderDevice,
    error::RenderError,
};

use super::{chunk::Chunk, scalar_field::ScalarField};

/// Owns all chunks of the world.
///
/// # Examples
///
/// ```ignore
/// let field = PerlinField::from_config(&config);
/// let store = ChunkStore::generate(&field, &config, &mut device)?;
///
/// // At shutdown
/// store.destroy(&mut device);
/// ```
#[derive(Debug)]
pub struct ChunkStore {
    chunks: Vec<Chunk>,
    chunk_size: i32,
}

impl ChunkStore {
    /// Generates and uploads every chunk in the configured range.
    ///
    /// # Arguments
    /// * `field` - Density function defining solid voxels
    /// * `config` - Grid range, chunk size and solidity threshold
    /// * `device` - Device receiving the chunk resources
    ///
    /// # Returns
    /// The complete store, or the first allocation error. On error, every
    /// resource allocated before the failure has been released.
    pub fn generate<D: RenderDevice>(
        field: &impl ScalarField,
        config: &WorldConfig,
        device: &mut D,
    ) -> Result<Self, RenderError> {
        info!("generating chunks, this may take a while.");

        let range = config.chunk_range;
        let mut store = Self {
            chunks: Vec::with_capacity(config.chunk_count() as usize),
            chunk_size: config.chunk_size,
        };

        for x in -range..range {
            for y in -range..range {
                for z in -range..range {
                    let grid_position = Point3::new(x, y, z);
                    let chunk = match Chunk::generate(
                        field,
                        grid_position,
                        config.chunk_size,
                        config.density_threshold,
                        device,
                    ) {
                        Ok(chunk) => chunk,
                        Err(err) => {
                            store.destroy(device);
                            return Err(err);
                        }
                    };
                    debug!("chunk {:?}: {} quads", grid_position, chunk.quad_count);
                    store.chunks.push(chunk);
                }
            }
        }

        info!(
            "generated {} chunks with {} quads",
            store.chunks.len(),
            store.total_quad_count()
        );
        Ok(store)
    }

    /// All chunks, in the order of the last sort.
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Edge length of every chunk.
    pub fn chunk_size(&self) -> i32 {
        self.chunk_size
    }

    /// Number of chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether the store holds no chunks.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Sum of the quad counts of all chunks.
    pub fn total_quad_count(&self) -> u64 {
        self.chunks.iter().map(|chunk| chunk.quad_count as u64).sum()
    }

    /// Sorts the chunks by ascending distance from `viewer` to their centres.
    pub fn sort_by_distance(&mut self, viewer: Point3<f32>) {
        self.chunks
            .sort_by(|a, b| a.distance_to(viewer).total_cmp(&b.distance_to(viewer)));
    }

    /// Releases every chunk's resources. Consuming the store guarantees each
    /// resource is released exactly once.
    pub fn destroy<D: RenderDevice>(self, device: &mut D) {
        let count = self.chunks.len();
        for chunk in self.chunks {
            chunk.release(device);
        }
        debug!("released {} chunks", count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::rendering::device::testing::RecordingDevice;

    fn small_world(range: i32, size: i32) -> WorldConfig {
        WorldConfig {
            chunk_range: range,
            chunk_size: size,
            ..WorldConfig::default()
        }
    }

    #[test]
    fn test_single_solid_chunk_scenario() {
        // Solid only inside chunk (0, 0, 0) of a 2x2x2 world.
        let field = |p: Point3<f32>| {
            let inside = |c: f32| (0.0..32.0).contains(&c);
            if inside(p.x) && inside(p.y) && inside(p.z) {
                -1.0
            } else {
                1.0
            }
        };
        let mut device = RecordingDevice::new();
        let store = ChunkStore::generate(&field, &small_world(1, 32), &mut device).unwrap();

        assert_eq!(store.len(), 8);
        let non_empty: Vec<&Chunk> = store.chunks().iter().filter(|c| c.quad_count > 0).collect();
        assert_eq!(non_empty.len(), 1);
        assert_eq!(non_empty[0].grid_position, Point3::new(0, 0, 0));
        // The surface of a 32³ cube.
        assert_eq!(non_empty[0].quad_count, 6 * 32 * 32);
        assert_eq!(non_empty[0].center, Point3::new(16.0, 16.0, 16.0));
    }

    #[test]
    fn test_grid_covers_range() {
        let mut device = RecordingDevice::new();
        let store =
            ChunkStore::generate(&|_: Point3<f32>| 1.0, &small_world(2, 2), &mut device).unwrap();

        assert_eq!(store.len(), 64);
        let mut positions: Vec<_> = store.chunks().iter().map(|c| c.grid_position).collect();
        positions.sort_by_key(|p| (p.x, p.y, p.z));
        positions.dedup();
        assert_eq!(positions.len(), 64);
        assert!(positions.iter().all(|p| (-2..2).contains(&p.x) && (-2..2).contains(&p.y) && (-2..2).contains(&p.z)));
    }

    #[test]
    fn test_sort_orders_by_distance() {
        let mut device = RecordingDevice::new();
        let mut store =
            ChunkStore::generate(&|_: Point3<f32>| 1.0, &small_world(2, 4), &mut device).unwrap();
        let viewer = Point3::new(5.0, -3.0, 1.0);
        store.sort_by_distance(viewer);

        let distances: Vec<f32> = store.chunks().iter().map(|c| c.distance_to(viewer)).collect();
        assert!(distances.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_destroy_releases_every_resource() {
        let mut device = RecordingDevice::new();
        let store =
            ChunkStore::generate(&|p: Point3<f32>| p.y, &small_world(1, 4), &mut device).unwrap();
        assert_eq!(device.live_meshes.len(), 16);
        assert_eq!(device.live_occlusion_queries.len(), 8);

        store.destroy(&mut device);
        assert!(device.live_meshes.is_empty());
        assert!(device.live_occlusion_queries.is_empty());
    }

    #[test]
    fn test_allocation_failure_leaves_nothing_behind() {
        // Fails midway through the fourth chunk.
        let mut device = RecordingDevice::failing_after(10);
        let result = ChunkStore::generate(&|p: Point3<f32>| p.y, &small_world(1, 4), &mut device);

        assert!(matches!(result, Err(RenderError::Allocation(_))));
        assert!(device.live_meshes.is_empty());
        assert!(device.live_occlusion_queries.is_empty());
    }
}
