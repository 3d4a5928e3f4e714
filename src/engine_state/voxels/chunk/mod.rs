//! # Chunk Module
//!
//! A chunk is one cubical region of the voxel volume together with the GPU
//! resources that render it.
//!
//! Chunks are built once at startup and are immutable afterwards: the mesh,
//! the bounding box and the centre never change. The only per-frame state is
//! the result written into the chunk's occlusion query, which the device
//! overwrites every time the chunk is queried.

use cgmath::{MetricSpace, Point3};

use crate::{
    engine_state::rendering::{
        device::{MeshHandle, OcclusionQueryId, RenderDevice},
        meshing::{BoundingMesh, ChunkMesh},
    },
    error::RenderError,
};

use super::scalar_field::ScalarField;

/// One chunk of the voxel world.
#[derive(Debug)]
pub struct Chunk {
    /// Position of this chunk in chunk coordinates.
    pub grid_position: Point3<i32>,
    /// Geometric centre, `origin + chunk_size / 2` on each axis.
    pub center: Point3<f32>,
    /// Number of exposed faces in the chunk's mesh.
    pub quad_count: u32,
    /// The shaded face mesh.
    pub mesh: MeshHandle,
    /// The box drawn by the occlusion pass.
    pub bounding_mesh: MeshHandle,
    /// Occlusion query owned by this chunk and reused every frame.
    pub visibility_query: OcclusionQueryId,
}

impl Chunk {
    /// Meshes the chunk at `grid_position` and uploads its resources.
    ///
    /// If any allocation fails, the resources created so far are released
    /// before the error is returned.
    ///
    /// # Arguments
    /// * `field` - Density function defining solid voxels
    /// * `grid_position` - Chunk coordinates
    /// * `chunk_size` - Edge length in voxels
    /// * `threshold` - Density below which a voxel is solid
    /// * `device` - Device receiving the meshes and the query
    pub fn generate<D: RenderDevice>(
        field: &impl ScalarField,
        grid_position: Point3<i32>,
        chunk_size: i32,
        threshold: f32,
        device: &mut D,
    ) -> Result<Self, RenderError> {
        let origin = Point3::new(
            grid_position.x * chunk_size,
            grid_position.y * chunk_size,
            grid_position.z * chunk_size,
        );
        let half = 0.5 * chunk_size as f32;
        let center = Point3::new(
            origin.x as f32 + half,
            origin.y as f32 + half,
            origin.z as f32 + half,
        );

        let chunk_mesh = ChunkMesh::generate(field, origin, chunk_size, threshold);
        let bounds = BoundingMesh::generate(origin, chunk_size);

        let mesh = device.create_mesh(&chunk_mesh)?;
        let bounding_mesh = match device.create_bounding_mesh(&bounds) {
            Ok(handle) => handle,
            Err(err) => {
                device.destroy_mesh(mesh);
                return Err(err);
            }
        };
        let visibility_query = match device.create_occlusion_query() {
            Ok(query) => query,
            Err(err) => {
                device.destroy_mesh(bounding_mesh);
                device.destroy_mesh(mesh);
                return Err(err);
            }
        };

        Ok(Self {
            grid_position,
            center,
            quad_count: chunk_mesh.quad_count(),
            mesh,
            bounding_mesh,
            visibility_query,
        })
    }

    /// Number of indices drawn for the chunk's mesh.
    pub fn index_count(&self) -> u32 {
        self.quad_count * 6
    }

    /// Euclidean distance from `point` to the chunk's centre.
    pub fn distance_to(&self, point: Point3<f32>) -> f32 {
        self.center.distance(point)
    }

    /// Releases the chunk's GPU resources.
    pub fn release<D: RenderDevice>(self, device: &mut D) {
        device.destroy_occlusion_query(self.visibility_query);
        device.destroy_mesh(self.bounding_mesh);
        device.destroy_mesh(self.mesh);
    }
}
