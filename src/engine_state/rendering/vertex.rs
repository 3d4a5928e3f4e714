//! Vertex data structures and layouts for chunk rendering.
//!
//! Two formats are used: [`Vertex`] for the shaded chunk geometry and
//! [`BoundingVertex`] for the position-only boxes drawn by the occlusion pass.

use cgmath::{Point3, Vector3};

/// A vertex of a chunk's face mesh.
///
/// # Memory Layout
/// - Position: [f32; 3] (12 bytes)
/// - Normal: [f32; 3] (12 bytes)
///
/// Total size: 24 bytes
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    /// Position in world space
    pub position: [f32; 3],
    /// Outward normal of the face the vertex belongs to
    pub normal: [f32; 3],
}

impl Vertex {
    /// Creates a vertex from a world position and a face normal.
    pub fn new(position: Point3<f32>, normal: Vector3<f32>) -> Self {
        Self {
            position: position.into(),
            normal: normal.into(),
        }
    }

    /// Returns the vertex buffer layout description for the chunk pipeline.
    ///
    /// # Shader Attributes
    /// - `location = 0`: position (vec3<f32>)
    /// - `location = 1`: normal (vec3<f32>)
    pub fn desc<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// A vertex of a chunk's bounding box. Only the position is needed by the
/// occlusion query shader.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BoundingVertex {
    /// Position in world space
    pub position: [f32; 3],
}

impl BoundingVertex {
    /// Returns the vertex buffer layout description for the query pipeline.
    pub fn desc<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<BoundingVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x3,
            }],
        }
    }
}
