//! Chunk meshing.
//!
//! Meshes are built once, when the chunk store is generated, and uploaded to
//! the rendering device. The world is static, so nothing here runs during the
//! frame loop.

mod mesh;

pub use mesh::*;
