//! # Voxel World
//!
//! This module defines the static voxel world rendered by the engine.
//!
//! ## Architecture
//!
//! * **ScalarField**: The density function deciding which voxels are solid
//! * **Chunk**: One cubical region, its meshes, centre and occlusion query
//! * **World**: The `ChunkStore` owning every chunk of the grid
//!
//! ## Data Flow
//!
//! 1. The store iterates the chunk grid once at startup
//! 2. Each chunk samples the scalar field and builds its meshes
//! 3. Meshes are uploaded to the rendering device
//! 4. Every frame, the visibility scheduler reorders the store and draws it

pub mod chunk;
pub mod scalar_field;
pub mod world;
