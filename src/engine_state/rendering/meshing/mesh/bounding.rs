use cgmath::Point3;

use crate::engine_state::rendering::vertex::BoundingVertex;

/// Index list shared by every bounding box: two triangles per face, four
/// unshared vertices per face.
pub const BOUNDING_BOX_INDICES: [u32; 36] = [
    0, 1, 2, 2, 1, 3, //
    4, 5, 6, 6, 5, 7, //
    8, 9, 10, 10, 9, 11, //
    12, 13, 14, 14, 13, 15, //
    16, 17, 18, 18, 17, 19, //
    20, 21, 22, 22, 21, 23,
];

/// Box drawn in place of a chunk by the occlusion pass.
///
/// The box spans `[origin - 0.5, origin + size - 0.5]` on every axis so that it
/// encloses the unit cubes centred on the chunk's voxel positions.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundingMesh {
    /// 24 vertices, four per face
    pub vertices: [BoundingVertex; 24],
}

impl BoundingMesh {
    /// Builds the bounding box of the chunk whose first voxel is at `origin`.
    pub fn generate(origin: Point3<i32>, chunk_size: i32) -> Self {
        let lo = [origin.x as f32 - 0.5, origin.y as f32 - 0.5, origin.z as f32 - 0.5];
        let hi = [lo[0] + chunk_size as f32, lo[1] + chunk_size as f32, lo[2] + chunk_size as f32];
        let v = |x: f32, y: f32, z: f32| BoundingVertex { position: [x, y, z] };

        let vertices = [
            // +X
            v(hi[0], hi[1], hi[2]), v(hi[0], lo[1], hi[2]), v(hi[0], hi[1], lo[2]), v(hi[0], lo[1], lo[2]),
            // +Y
            v(hi[0], hi[1], hi[2]), v(hi[0], hi[1], lo[2]), v(lo[0], hi[1], hi[2]), v(lo[0], hi[1], lo[2]),
            // +Z
            v(hi[0], hi[1], hi[2]), v(lo[0], hi[1], hi[2]), v(hi[0], lo[1], hi[2]), v(lo[0], lo[1], hi[2]),
            // -X
            v(lo[0], hi[1], hi[2]), v(lo[0], hi[1], lo[2]), v(lo[0], lo[1], hi[2]), v(lo[0], lo[1], lo[2]),
            // -Y
            v(hi[0], lo[1], hi[2]), v(lo[0], lo[1], hi[2]), v(hi[0], lo[1], lo[2]), v(lo[0], lo[1], lo[2]),
            // -Z
            v(hi[0], hi[1], lo[2]), v(hi[0], lo[1], lo[2]), v(lo[0], hi[1], lo[2]), v(lo[0], lo[1], lo[2]),
        ];

        Self { vertices }
    }
}
