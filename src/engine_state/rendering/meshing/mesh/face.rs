use cgmath::{Point3, Vector3};

use crate::engine_state::rendering::vertex::Vertex;

/// One of the six axis-aligned faces of a voxel.
///
/// The order of [`FaceDirection::ALL`] is the order in which the mesher emits
/// the faces of a single voxel: +X, +Y, +Z, -X, -Y, -Z.
#[derive(PartialEq, Eq, Hash, Copy, Clone, Debug)]
pub enum FaceDirection {
    /// Facing positive X
    PosX,
    /// Facing positive Y
    PosY,
    /// Facing positive Z
    PosZ,
    /// Facing negative X
    NegX,
    /// Facing negative Y
    NegY,
    /// Facing negative Z
    NegZ,
}

impl FaceDirection {
    /// All six faces in emission order.
    pub const ALL: [FaceDirection; 6] = [
        FaceDirection::PosX,
        FaceDirection::PosY,
        FaceDirection::PosZ,
        FaceDirection::NegX,
        FaceDirection::NegY,
        FaceDirection::NegZ,
    ];

    /// Outward unit normal, which is also the step to the neighbouring voxel.
    pub fn normal(self) -> Vector3<f32> {
        match self {
            FaceDirection::PosX => Vector3::new(1.0, 0.0, 0.0),
            FaceDirection::PosY => Vector3::new(0.0, 1.0, 0.0),
            FaceDirection::PosZ => Vector3::new(0.0, 0.0, 1.0),
            FaceDirection::NegX => Vector3::new(-1.0, 0.0, 0.0),
            FaceDirection::NegY => Vector3::new(0.0, -1.0, 0.0),
            FaceDirection::NegZ => Vector3::new(0.0, 0.0, -1.0),
        }
    }

    /// Corner offsets of the face quad, in units of half a voxel.
    ///
    /// Ordered so that the triangles `(0,1,2)` and `(2,1,3)` wind
    /// counter-clockwise when seen from outside the voxel.
    fn corners(self) -> [[f32; 3]; 4] {
        match self {
            FaceDirection::PosX => [[1., 1., 1.], [1., -1., 1.], [1., 1., -1.], [1., -1., -1.]],
            FaceDirection::PosY => [[1., 1., 1.], [1., 1., -1.], [-1., 1., 1.], [-1., 1., -1.]],
            FaceDirection::PosZ => [[1., 1., 1.], [-1., 1., 1.], [1., -1., 1.], [-1., -1., 1.]],
            FaceDirection::NegX => [[-1., 1., 1.], [-1., 1., -1.], [-1., -1., 1.], [-1., -1., -1.]],
            FaceDirection::NegY => [[1., -1., 1.], [-1., -1., 1.], [1., -1., -1.], [-1., -1., -1.]],
            FaceDirection::NegZ => [[1., 1., -1.], [1., -1., -1.], [-1., 1., -1.], [-1., -1., -1.]],
        }
    }

    /// Builds the four vertices of this face for the voxel centred at `center`.
    pub fn quad_vertices(self, center: Point3<f32>) -> [Vertex; 4] {
        let normal = self.normal();
        self.corners().map(|[x, y, z]| {
            Vertex::new(center + 0.5 * Vector3::new(x, y, z), normal)
        })
    }
}
