use cgmath::{Point3, Vector3};

use crate::engine_state::{
    rendering::vertex::Vertex,
    voxels::scalar_field::ScalarField,
};

use super::face::FaceDirection;

/// The exposed-face mesh of one chunk.
///
/// Every quad contributes four vertices and six indices. A chunk that is
/// entirely solid or entirely empty yields an empty mesh.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ChunkMesh {
    /// Four vertices per quad, in emission order
    pub vertices: Vec<Vertex>,
    /// Six indices per quad
    pub indices: Vec<u32>,
}

impl ChunkMesh {
    /// Meshes the `chunk_size`³ voxels starting at `origin`.
    ///
    /// A voxel `p` is solid when `field.density(p) < threshold`. For each
    /// solid voxel, a quad is emitted on every side whose neighbour is not
    /// solid. Neighbours outside the chunk are sampled from the field
    /// directly, so each chunk is meshed independently and without seams.
    ///
    /// # Arguments
    /// * `field` - Density function to sample
    /// * `origin` - World position of the chunk's first voxel
    /// * `chunk_size` - Edge length of the chunk in voxels
    /// * `threshold` - Density below which a voxel is solid
    ///
    /// # Returns
    /// The mesh holding one quad per exposed voxel face
    pub fn generate(
        field: &impl ScalarField,
        origin: Point3<i32>,
        chunk_size: i32,
        threshold: f32,
    ) -> Self {
        let mut mesh = ChunkMesh::default();
        let origin = Point3::new(origin.x as f32, origin.y as f32, origin.z as f32);

        for x in 0..chunk_size {
            for y in 0..chunk_size {
                for z in 0..chunk_size {
                    let position = origin + Vector3::new(x as f32, y as f32, z as f32);
                    if field.density(position) >= threshold {
                        continue;
                    }

                    for direction in FaceDirection::ALL {
                        let neighbour = position + direction.normal();
                        if field.density(neighbour) >= threshold {
                            mesh.push_quad(direction, position);
                        }
                    }
                }
            }
        }

        mesh
    }

    /// Number of quads in the mesh.
    pub fn quad_count(&self) -> u32 {
        (self.vertices.len() / 4) as u32
    }

    /// Number of indices drawn for the mesh.
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    fn push_quad(&mut self, direction: FaceDirection, voxel_center: Point3<f32>) {
        let quad_index = self.quad_count();
        self.vertices
            .extend_from_slice(&direction.quad_vertices(voxel_center));
        self.indices.extend(generate_quad_indices(quad_index));
    }
}

/// Returns the six indices of quad number `quad_index`.
///
/// The quad's vertices are triangulated as `(0,1,2),(2,1,3)`.
pub fn generate_quad_indices(quad_index: u32) -> [u32; 6] {
    let base = quad_index * 4;
    [base, base + 1, base + 2, base + 2, base + 1, base + 3]
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::InnerSpace;
    use std::collections::HashSet;

    fn solid_box(min: i32, max: i32) -> impl Fn(Point3<f32>) -> f32 {
        move |p: Point3<f32>| {
            let inside = |c: f32| c >= min as f32 && c < max as f32;
            if inside(p.x) && inside(p.y) && inside(p.z) {
                -1.0
            } else {
                1.0
            }
        }
    }

    fn position(v: &Vertex) -> Vector3<f32> {
        Vector3::from(v.position)
    }

    #[test]
    fn test_uniform_fields_produce_no_quads() {
        for origin in [Point3::new(0, 0, 0), Point3::new(-64, 32, 96)] {
            let solid = ChunkMesh::generate(&|_: Point3<f32>| -1.0, origin, 8, 0.0);
            let empty = ChunkMesh::generate(&|_: Point3<f32>| 1.0, origin, 8, 0.0);
            assert_eq!(solid.quad_count(), 0);
            assert_eq!(empty.quad_count(), 0);
            assert!(solid.indices.is_empty());
        }
    }

    #[test]
    fn test_threshold_is_exclusive() {
        // Density equal to the threshold is empty.
        let mesh = ChunkMesh::generate(&|_: Point3<f32>| 0.0, Point3::new(0, 0, 0), 4, 0.0);
        assert_eq!(mesh.quad_count(), 0);
    }

    #[test]
    fn test_single_voxel_emits_six_outward_faces() {
        let field = |p: Point3<f32>| if p == Point3::new(1.0, 1.0, 1.0) { -1.0 } else { 1.0 };
        let mesh = ChunkMesh::generate(&field, Point3::new(0, 0, 0), 3, 0.0);

        assert_eq!(mesh.quad_count(), 6);
        assert_eq!(mesh.index_count(), 36);

        let normals: Vec<[f32; 3]> = mesh.vertices.chunks(4).map(|quad| quad[0].normal).collect();
        let expected: Vec<[f32; 3]> = FaceDirection::ALL.iter().map(|d| d.normal().into()).collect();
        assert_eq!(normals, expected);

        for quad in mesh.vertices.chunks(4) {
            let normal = Vector3::from(quad[0].normal);
            for vertex in quad {
                let offset = position(vertex) - Vector3::new(1.0, 1.0, 1.0);
                // Corners sit on the face plane, half a voxel out along the normal.
                assert!((offset.dot(normal) - 0.5).abs() < 1e-6);
                assert!((offset.magnitude2() - 0.75).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_triangles_wind_outward() {
        let mesh = ChunkMesh::generate(&solid_box(1, 3), Point3::new(0, 0, 0), 4, 0.0);
        assert!(mesh.quad_count() > 0);

        for triangle in mesh.indices.chunks(3) {
            let [a, b, c] = [0, 1, 2].map(|i| &mesh.vertices[triangle[i] as usize]);
            let winding = (position(b) - position(a)).cross(position(c) - position(a));
            assert!(winding.dot(Vector3::from(a.normal)) > 0.0);
        }
    }

    #[test]
    fn test_exposed_faces_match_field_boundaries() {
        let field = |p: Point3<f32>| ((p.x * 0.7).sin() + (p.y * 1.3).cos() * (p.z * 0.4).sin()) - 0.2;
        let origin = Point3::new(-4, 2, 0);
        let size = 6;
        let mesh = ChunkMesh::generate(&field, origin, size, 0.0);

        let mut emitted = HashSet::new();
        for quad in mesh.vertices.chunks(4) {
            let normal = Vector3::from(quad[0].normal);
            let center = quad
                .iter()
                .fold(Vector3::new(0.0, 0.0, 0.0), |acc, v| acc + position(v))
                / 4.0
                - 0.5 * normal;
            let key = (
                center.x.round() as i32,
                center.y.round() as i32,
                center.z.round() as i32,
                normal.x as i32,
                normal.y as i32,
                normal.z as i32,
            );
            assert!(emitted.insert(key), "duplicate quad {key:?}");
        }

        let mut expected = HashSet::new();
        for x in 0..size {
            for y in 0..size {
                for z in 0..size {
                    let p = Point3::new((origin.x + x) as f32, (origin.y + y) as f32, (origin.z + z) as f32);
                    for direction in FaceDirection::ALL {
                        let n = direction.normal();
                        if field(p) < 0.0 && field(p + n) >= 0.0 {
                            expected.insert((
                                p.x as i32, p.y as i32, p.z as i32, n.x as i32, n.y as i32, n.z as i32,
                            ));
                        }
                    }
                }
            }
        }

        assert_eq!(emitted, expected);
    }

    #[test]
    fn test_chunk_edges_sample_the_field() {
        // Solid everywhere except beyond x = 3: only the +X faces on the chunk
        // edge are exposed, because the neighbour is read from the field.
        let field = |p: Point3<f32>| if p.x > 3.0 { 1.0 } else { -1.0 };
        let mesh = ChunkMesh::generate(&field, Point3::new(0, 0, 0), 4, 0.0);
        assert_eq!(mesh.quad_count(), 16);
        assert!(mesh.vertices.iter().all(|v| v.normal == [1.0, 0.0, 0.0]));
    }

    #[test]
    fn test_quad_indices_pattern() {
        assert_eq!(generate_quad_indices(0), [0, 1, 2, 2, 1, 3]);
        assert_eq!(generate_quad_indices(3), [12, 13, 14, 14, 13, 15]);
    }
}
