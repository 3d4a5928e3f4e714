//! Mesh generation for voxel chunks.
//!
//! This module converts a chunk's region of the scalar field into GPU-ready
//! geometry: an exposed-face mesh for shading and a bounding box for
//! occlusion queries.
//!
//! # Architecture
//! - [`ChunkMesh`]: One unit quad per solid voxel face whose neighbour is empty
//! - `FaceDirection`: The six axis directions, their normals and quad corners
//! - [`BoundingMesh`]: The padded box enclosing all of a chunk's voxel cubes
//!
//! # Usage
//! ```ignore
//! use cgmath::Point3;
//!
//! let field = |p: Point3<f32>| p.y;
//! let mesh = ChunkMesh::generate(&field, Point3::new(0, -32, 0), 32, 0.0);
//! let bounds = BoundingMesh::generate(Point3::new(0, -32, 0), 32);
//! ```
//!
//! # Performance Considerations
//! - Each solid voxel costs one field sample plus six neighbour samples
//! - Voxels on a chunk edge sample across the edge, so boundary samples are
//!   evaluated by both neighbouring chunks
//! - No faces are merged: every solid voxel renders as a unit cube

mod bounding;
mod face;
mod mesh;

pub use bounding::{BoundingMesh, BOUNDING_BOX_INDICES};
pub use mesh::*;
