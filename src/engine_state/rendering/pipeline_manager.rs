//! Creates the render and compute pipelines of the renderer.
//!
//! # Architecture
//!
//! Three pipelines are built once at startup from WGSL files in the configured
//! shader directory:
//!
//! - `chunk`: shades chunk meshes in the draw pass. Back faces are culled and
//!   depth is tested and written.
//! - `query`: rasterises bounding boxes in the occlusion pass. No culling, so a
//!   camera inside a box still produces samples; depth is tested but never
//!   written, and there is no colour target.
//! - `visibility`: the compute pass converting resolved occlusion results into
//!   indirect draw instance counts.
//!
//! # Error Handling
//!
//! Shader modules and pipelines are created inside a validation error scope.
//! A captured error is reported as [`RenderError::ShaderCompilation`] naming
//! the shader file, instead of reaching the uncaptured error handler.

use std::path::Path;

use log::info;
use wgpu::{ComputePipeline, Device, RenderPipeline, ShaderModule, TextureFormat};

use crate::error::RenderError;

use super::{
    bind_group_state::{BindGroupState, CAMERA_BIND_GROUP_LAYOUT, VISIBILITY_BIND_GROUP_LAYOUT},
    texture,
    vertex::{BoundingVertex, Vertex},
};

/// File name of the chunk shading shader.
pub const CHUNK_SHADER: &str = "chunk_shader.wgsl";
/// File name of the bounding-box query shader.
pub const QUERY_SHADER: &str = "query_shader.wgsl";
/// File name of the visibility compute shader.
pub const VISIBILITY_SHADER: &str = "visibility_shader.wgsl";

/// The pipelines used by every frame.
pub struct PipelineManager {
    /// Shades chunk meshes in the draw pass
    pub chunk_pipeline: RenderPipeline,
    /// Draws bounding boxes in the occlusion pass
    pub query_pipeline: RenderPipeline,
    /// Turns occlusion results into draw instance counts
    pub visibility_pipeline: ComputePipeline,
}

impl PipelineManager {
    /// Loads the shaders and builds the pipelines.
    ///
    /// # Arguments
    /// * `device` - The WebGPU device
    /// * `texture_format` - Format of the surface the draw pass renders to
    /// * `bind_group_state` - Source of the bind group layouts
    /// * `shader_directory` - Directory holding the WGSL files
    pub fn new(
        device: &Device,
        texture_format: TextureFormat,
        bind_group_state: &BindGroupState,
        shader_directory: &Path,
    ) -> Result<Self, RenderError> {
        let camera_layout = layout(bind_group_state, CAMERA_BIND_GROUP_LAYOUT)?;
        let visibility_layout = layout(bind_group_state, VISIBILITY_BIND_GROUP_LAYOUT)?;

        let chunk_shader = load_shader(device, shader_directory, CHUNK_SHADER)?;
        let query_shader = load_shader(device, shader_directory, QUERY_SHADER)?;
        let visibility_shader = load_shader(device, shader_directory, VISIBILITY_SHADER)?;

        let render_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("camera pipeline layout"),
            bind_group_layouts: &[camera_layout],
            push_constant_ranges: &[],
        });

        let chunk_pipeline = validated(device, CHUNK_SHADER, || {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("chunk pipeline"),
                layout: Some(&render_layout),
                vertex: wgpu::VertexState {
                    module: &chunk_shader,
                    entry_point: Some("vs_main"),
                    compilation_options: Default::default(),
                    buffers: &[Vertex::desc()],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &chunk_shader,
                    entry_point: Some("fs_main"),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: texture_format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: Some(wgpu::Face::Back),
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: Some(depth_state(true)),
                multisample: Default::default(),
                multiview: None,
                cache: None,
            })
        })?;

        let query_pipeline = validated(device, QUERY_SHADER, || {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("query pipeline"),
                layout: Some(&render_layout),
                vertex: wgpu::VertexState {
                    module: &query_shader,
                    entry_point: Some("vs_main"),
                    compilation_options: Default::default(),
                    buffers: &[BoundingVertex::desc()],
                },
                fragment: None,
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    cull_mode: None,
                    ..Default::default()
                },
                depth_stencil: Some(depth_state(false)),
                multisample: Default::default(),
                multiview: None,
                cache: None,
            })
        })?;

        let compute_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("visibility pipeline layout"),
            bind_group_layouts: &[visibility_layout],
            push_constant_ranges: &[],
        });

        let visibility_pipeline = validated(device, VISIBILITY_SHADER, || {
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some("visibility pipeline"),
                layout: Some(&compute_layout),
                module: &visibility_shader,
                entry_point: Some("cs_main"),
                compilation_options: Default::default(),
                cache: None,
            })
        })?;

        info!("pipelines created from {}", shader_directory.display());

        Ok(Self {
            chunk_pipeline,
            query_pipeline,
            visibility_pipeline,
        })
    }
}

/// Depth state shared by both render pipelines.
fn depth_state(depth_write_enabled: bool) -> wgpu::DepthStencilState {
    wgpu::DepthStencilState {
        format: texture::Texture::DEPTH_FORMAT,
        depth_write_enabled,
        depth_compare: wgpu::CompareFunction::Less,
        stencil: wgpu::StencilState::default(),
        bias: wgpu::DepthBiasState::default(),
    }
}

fn layout<'a>(
    bind_group_state: &'a BindGroupState,
    name: &'static str,
) -> Result<&'a wgpu::BindGroupLayout, RenderError> {
    bind_group_state
        .get_bind_group_layout(name)
        .ok_or_else(|| RenderError::Device(format!("bind group layout `{name}` is missing")))
}

/// Reads a WGSL file and compiles it.
fn load_shader(device: &Device, directory: &Path, name: &str) -> Result<ShaderModule, RenderError> {
    let path = directory.join(name);
    let source = std::fs::read_to_string(&path)
        .map_err(|source| RenderError::ShaderSource { path, source })?;

    validated(device, name, || {
        device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(name),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        })
    })
}

/// Runs `create` inside a validation error scope.
fn validated<T>(device: &Device, name: &str, create: impl FnOnce() -> T) -> Result<T, RenderError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let created = create();
    match pollster::block_on(device.pop_error_scope()) {
        Some(err) => Err(RenderError::ShaderCompilation {
            name: name.to_string(),
            message: err.to_string(),
        }),
        None => Ok(created),
    }
}
