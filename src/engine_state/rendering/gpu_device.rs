//! The wgpu implementation of [`RenderDevice`].
//!
//! # Architecture
//!
//! Every frame is encoded into one `CommandEncoder` and submitted once, which
//! gives the in-order command stream the scheduler relies on:
//!
//! 1. `begin_frame` acquires the surface texture and records a clear pass.
//! 2. Pass commands are buffered until the pass ends, then replayed into a
//!    wgpu render pass. An occlusion pass is followed by the resolve and
//!    visibility compute steps of [`OcclusionState`].
//! 3. `end_frame` submits the encoder and presents.
//!
//! Meshes live in a slot table indexed by [`MeshHandle`]. Empty chunk meshes
//! take a slot but own no buffers and are never drawn. Bounding boxes share
//! one index buffer.
//!
//! # Error Handling
//!
//! Each frame runs inside validation and out-of-memory error scopes. An error
//! captured in either scope fails the frame with [`RenderError::Device`].
//! Resource creation outside a frame uses its own out-of-memory scope and
//! reports [`RenderError::Allocation`]. Errors raised outside any scope, for
//! example while reconfiguring the surface, are kept by the uncaptured-error
//! handler and fail the next frame.

use std::{
    path::Path,
    sync::{Arc, Mutex},
};

use log::{debug, error, warn};
use wgpu::{util::DeviceExt, Device, Queue, Surface, SurfaceConfiguration};

use crate::{
    config::RenderingConfig,
    engine_state::{
        buffer_state::BufferState,
        camera_state::{camera::CameraUniform, CAMERA_BUFFER_NAME},
    },
    error::RenderError,
};

use super::{
    bind_group_state::{BindGroupState, CAMERA_BIND_GROUP, VISIBILITY_BIND_GROUP},
    device::{MeshHandle, OcclusionQueryId, RenderDevice, TimerQueryId},
    meshing::{BoundingMesh, ChunkMesh, BOUNDING_BOX_INDICES},
    occlusion_state::{visibility_workgroups, OcclusionState, DRAW_ARGS_BUFFER},
    pipeline_manager::PipelineManager,
    raw_query_manager::RawQueryManager,
    texture,
};

/// Name of the index buffer shared by all bounding boxes.
const BOUNDING_INDEX_BUFFER: &str = "bounding_index_buffer";

/// Buffers of one uploaded mesh.
enum GpuMesh {
    /// A chunk mesh with at least one quad
    Chunk {
        vertex_buffer: wgpu::Buffer,
        index_buffer: wgpu::Buffer,
    },
    /// A chunk mesh without quads
    Empty,
    /// A bounding box, drawn with the shared index buffer
    Bounds { vertex_buffer: wgpu::Buffer },
}

impl GpuMesh {
    fn destroy(&self) {
        match self {
            GpuMesh::Chunk {
                vertex_buffer,
                index_buffer,
            } => {
                vertex_buffer.destroy();
                index_buffer.destroy();
            }
            GpuMesh::Empty => {}
            GpuMesh::Bounds { vertex_buffer } => vertex_buffer.destroy(),
        }
    }
}

/// A buffered command of the pass being recorded.
#[derive(Debug, Clone, Copy, PartialEq)]
enum PassCommand {
    BeginQuery(u32),
    DrawBounds(MeshHandle),
    EndQuery,
    Draw {
        mesh: MeshHandle,
        index_count: u32,
        gate: Option<OcclusionQueryId>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PassKind {
    Occlusion,
    Draw,
}

/// The first device error raised outside an error scope.
///
/// Shared with the device's uncaptured-error handler.
#[derive(Debug, Clone, Default)]
pub struct UncapturedErrors {
    first: Arc<Mutex<Option<String>>>,
}

impl UncapturedErrors {
    /// Keeps `message` unless an earlier error is still unreported.
    pub fn record(&self, message: String) {
        if let Ok(mut first) = self.first.lock() {
            first.get_or_insert(message);
        }
    }

    /// Reports and clears the kept error.
    pub fn take(&self) -> Result<(), RenderError> {
        match self.first.lock() {
            Ok(mut first) => match first.take() {
                Some(message) => Err(RenderError::Device(message)),
                None => Ok(()),
            },
            Err(_) => Err(RenderError::Device(String::from(
                "uncaptured error handler panicked",
            ))),
        }
    }
}

/// State of the frame being encoded.
struct Frame {
    surface_texture: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
    encoder: wgpu::CommandEncoder,
    pass: Option<PassKind>,
    commands: Vec<PassCommand>,
    gate: Option<OcclusionQueryId>,
    /// First error raised while recording, reported by `end_frame`
    failure: Option<RenderError>,
}

/// A rendering device on a wgpu surface.
pub struct GpuRenderDevice {
    surface: Surface<'static>,
    surface_config: SurfaceConfiguration,
    device: Device,
    queue: Queue,
    buffer_state: BufferState,
    bind_group_state: BindGroupState,
    pipeline_manager: PipelineManager,
    depth_texture: texture::Texture,
    occlusion: OcclusionState,
    timestamps: Option<RawQueryManager>,
    /// Timer ids handed out when timestamps are unsupported
    timer_fallback_ids: u32,
    meshes: Vec<Option<GpuMesh>>,
    free_meshes: Vec<u32>,
    clear_color: wgpu::Color,
    frame: Option<Frame>,
    uncaptured_errors: UncapturedErrors,
}

impl GpuRenderDevice {
    /// Creates the device-side resources of the renderer.
    ///
    /// # Arguments
    /// * `surface` - Configured window surface
    /// * `surface_config` - Its configuration
    /// * `device` - The WebGPU device
    /// * `queue` - The device's queue
    /// * `rendering` - Clear colour, shader directory and timer ring size
    /// * `occlusion_capacity` - Number of occlusion queries to provision, one
    ///   per chunk
    pub fn new(
        surface: Surface<'static>,
        surface_config: SurfaceConfiguration,
        device: Device,
        queue: Queue,
        rendering: &RenderingConfig,
        occlusion_capacity: u32,
    ) -> Result<Self, RenderError> {
        let uncaptured_errors = UncapturedErrors::default();
        let handler_errors = uncaptured_errors.clone();
        device.on_uncaptured_error(Box::new(move |err| {
            error!("uncaptured device error: {}", err);
            handler_errors.record(err.to_string());
        }));

        let mut buffer_state = BufferState::new();
        buffer_state.create_buffer_init(
            &device,
            CAMERA_BUFFER_NAME,
            &wgpu::util::BufferInitDescriptor {
                label: Some(CAMERA_BUFFER_NAME),
                contents: bytemuck::cast_slice(&[CameraUniform::new()]),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            },
        );
        buffer_state.create_buffer_init(
            &device,
            BOUNDING_INDEX_BUFFER,
            &wgpu::util::BufferInitDescriptor {
                label: Some(BOUNDING_INDEX_BUFFER),
                contents: bytemuck::cast_slice(&BOUNDING_BOX_INDICES),
                usage: wgpu::BufferUsages::INDEX,
            },
        );

        let occlusion = OcclusionState::new(&device, &mut buffer_state, occlusion_capacity);

        let timestamps = if device.features().contains(wgpu::Features::TIMESTAMP_QUERY) {
            Some(RawQueryManager::new(
                &device,
                &queue,
                &mut buffer_state,
                rendering.timer_query_count,
            ))
        } else {
            warn!("timestamp queries unsupported, frame times will not be reported");
            None
        };

        let bind_group_state = BindGroupState::new(&device, &buffer_state)?;
        let pipeline_manager = PipelineManager::new(
            &device,
            surface_config.format,
            &bind_group_state,
            Path::new(&rendering.shader_directory),
        )?;
        let depth_texture =
            texture::Texture::create_depth_texture(&device, &surface_config, "depth texture");

        let [r, g, b] = rendering.clear_color;
        debug!(
            "device resources: {} bytes in named buffers",
            buffer_state.get_total_allocated_memory()
        );

        Ok(Self {
            surface,
            surface_config,
            device,
            queue,
            buffer_state,
            bind_group_state,
            pipeline_manager,
            depth_texture,
            occlusion,
            timestamps,
            timer_fallback_ids: 0,
            meshes: Vec::new(),
            free_meshes: Vec::new(),
            clear_color: wgpu::Color { r, g, b, a: 1.0 },
            frame: None,
            uncaptured_errors,
        })
    }

    /// Reconfigures the surface and depth buffer for a new window size.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.surface_config.width = width;
        self.surface_config.height = height;
        self.surface.configure(&self.device, &self.surface_config);
        self.depth_texture.destroy();
        self.depth_texture =
            texture::Texture::create_depth_texture(&self.device, &self.surface_config, "depth texture");
    }

    /// Uploads the camera uniform for the next frame.
    pub fn write_camera_uniform(&mut self, uniform: &CameraUniform) -> Result<(), RenderError> {
        self.buffer_state.write_buffer(
            &self.queue,
            CAMERA_BUFFER_NAME,
            0,
            bytemuck::cast_slice(&[*uniform]),
        )
    }

    /// Starts a frame: acquires the surface texture and clears it.
    ///
    /// # Returns
    /// `Ok(false)` if the surface was not ready and the frame should be
    /// skipped, `Ok(true)` once the frame is open
    pub fn begin_frame(&mut self) -> Result<bool, RenderError> {
        if self.frame.is_some() {
            return Err(RenderError::Device(String::from("frame already open")));
        }
        self.uncaptured_errors.take()?;

        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let surface_texture = match self.surface.get_current_texture() {
            Ok(surface_texture) => surface_texture,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                debug!("surface lost or outdated, reconfiguring");
                self.surface.configure(&self.device, &self.surface_config);
                self.pop_error_scopes()?;
                return Ok(false);
            }
            Err(wgpu::SurfaceError::Timeout) => {
                warn!("surface texture acquisition timed out, skipping frame");
                self.pop_error_scopes()?;
                return Ok(false);
            }
            Err(err) => {
                let _ = self.pop_error_scopes();
                return Err(RenderError::Surface(err.to_string()));
            }
        };

        let view = surface_texture.texture.create_view(&Default::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("frame encoder") });
        {
            let _clear = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("clear pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        }

        self.frame = Some(Frame {
            surface_texture,
            view,
            encoder,
            pass: None,
            commands: Vec::new(),
            gate: None,
            failure: None,
        });
        Ok(true)
    }

    /// Submits and presents the open frame.
    ///
    /// # Errors
    /// Fails with the first error raised while recording, or with any error
    /// captured by the frame's error scopes
    pub fn end_frame(&mut self) -> Result<(), RenderError> {
        let Some(mut frame) = self.frame.take() else {
            return Ok(());
        };

        if let Some(kind) = frame.pass {
            warn!("frame ended inside an open {:?} pass", kind);
            self.flush_pass(&mut frame, kind);
        }

        let submission = self.queue.submit([frame.encoder.finish()]);
        if let Some(timestamps) = self.timestamps.as_mut() {
            timestamps.submitted(submission);
        }
        frame.surface_texture.present();

        let scoped = self.pop_error_scopes();
        match frame.failure {
            Some(err) => Err(err),
            None => scoped.and_then(|()| self.uncaptured_errors.take()),
        }
    }

    /// Pops the validation and out-of-memory scopes pushed by `begin_frame`.
    fn pop_error_scopes(&self) -> Result<(), RenderError> {
        let validation = pollster::block_on(self.device.pop_error_scope());
        let out_of_memory = pollster::block_on(self.device.pop_error_scope());
        match validation.or(out_of_memory) {
            Some(err) => Err(RenderError::Device(err.to_string())),
            None => Ok(()),
        }
    }

    /// Runs `create` inside an out-of-memory scope.
    fn allocate<T>(&self, what: &str, create: impl FnOnce(&Device) -> T) -> Result<T, RenderError> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let created = create(&self.device);
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(err) => Err(RenderError::Allocation(format!("{what}: {err}"))),
            None => Ok(created),
        }
    }

    fn insert_mesh(&mut self, mesh: GpuMesh) -> MeshHandle {
        match self.free_meshes.pop() {
            Some(slot) => {
                self.meshes[slot as usize] = Some(mesh);
                MeshHandle(slot)
            }
            None => {
                self.meshes.push(Some(mesh));
                MeshHandle(self.meshes.len() as u32 - 1)
            }
        }
    }

    fn mesh(&self, handle: MeshHandle) -> Option<&GpuMesh> {
        self.meshes.get(handle.0 as usize).and_then(Option::as_ref)
    }

    /// Records a pass command if a pass of `kind` is open.
    fn record(&mut self, kind: PassKind, command: PassCommand) {
        if let Some(frame) = self.frame.as_mut() {
            if frame.pass == Some(kind) {
                frame.commands.push(command);
            }
        }
    }

    fn open_pass(&mut self, kind: PassKind) {
        if let Some(frame) = self.frame.as_mut() {
            if frame.pass.is_some() {
                warn!("{:?} pass opened inside another pass", kind);
                return;
            }
            frame.pass = Some(kind);
        }
    }

    fn close_pass(&mut self, kind: PassKind) {
        let Some(mut frame) = self.frame.take() else {
            return;
        };
        if frame.pass == Some(kind) {
            self.flush_pass(&mut frame, kind);
        }
        self.frame = Some(frame);
    }

    /// Replays the buffered commands of the open pass into the encoder.
    fn flush_pass(&mut self, frame: &mut Frame, kind: PassKind) {
        let commands = std::mem::take(&mut frame.commands);
        frame.pass = None;
        frame.gate = None;

        let result = match kind {
            PassKind::Occlusion => self.encode_occlusion_pass(frame, &commands),
            PassKind::Draw => self.encode_draw_pass(frame, &commands),
        };
        if let Err(err) = result {
            frame.failure.get_or_insert(err);
        }
    }

    fn encode_occlusion_pass(&mut self, frame: &mut Frame, commands: &[PassCommand]) -> Result<(), RenderError> {
        let camera_bind_group = bind_group(&self.bind_group_state, CAMERA_BIND_GROUP)?;
        let bounding_indices = self.buffer_state.get_buffer(BOUNDING_INDEX_BUFFER)?;
        {
            let mut pass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("occlusion pass"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: Some(self.occlusion.query_set()),
            });
            pass.set_pipeline(&self.pipeline_manager.query_pipeline);
            pass.set_bind_group(0, camera_bind_group, &[]);
            pass.set_index_buffer(bounding_indices.slice(..), wgpu::IndexFormat::Uint32);

            for command in commands {
                match *command {
                    PassCommand::BeginQuery(query) => pass.begin_occlusion_query(query),
                    PassCommand::EndQuery => pass.end_occlusion_query(),
                    PassCommand::DrawBounds(handle) => {
                        if let Some(GpuMesh::Bounds { vertex_buffer }) = self.mesh(handle) {
                            pass.set_vertex_buffer(0, vertex_buffer.slice(..));
                            pass.draw_indexed(0..BOUNDING_BOX_INDICES.len() as u32, 0, 0..1);
                        }
                    }
                    PassCommand::Draw { .. } => {}
                }
            }
        }

        self.occlusion.resolve(&mut frame.encoder, &self.buffer_state)?;

        let visibility_bind_group = bind_group(&self.bind_group_state, VISIBILITY_BIND_GROUP)?;
        let mut compute = frame.encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("visibility pass"),
            timestamp_writes: None,
        });
        compute.set_pipeline(&self.pipeline_manager.visibility_pipeline);
        compute.set_bind_group(0, visibility_bind_group, &[]);
        compute.dispatch_workgroups(visibility_workgroups(self.occlusion.capacity()), 1, 1);
        Ok(())
    }

    fn encode_draw_pass(&self, frame: &mut Frame, commands: &[PassCommand]) -> Result<(), RenderError> {
        let camera_bind_group = bind_group(&self.bind_group_state, CAMERA_BIND_GROUP)?;
        let draw_args = self.buffer_state.get_buffer(DRAW_ARGS_BUFFER)?;

        let mut pass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("draw pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &frame.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth_texture.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(&self.pipeline_manager.chunk_pipeline);
        pass.set_bind_group(0, camera_bind_group, &[]);

        for command in commands {
            let PassCommand::Draw {
                mesh,
                index_count,
                gate,
            } = *command
            else {
                continue;
            };
            let Some(GpuMesh::Chunk {
                vertex_buffer,
                index_buffer,
            }) = self.mesh(mesh)
            else {
                continue;
            };
            if index_count == 0 {
                continue;
            }

            pass.set_vertex_buffer(0, vertex_buffer.slice(..));
            pass.set_index_buffer(index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            match gate {
                Some(query) => {
                    pass.draw_indexed_indirect(draw_args, OcclusionState::draw_args_offset(query))
                }
                None => pass.draw_indexed(0..index_count, 0, 0..1),
            }
        }
        Ok(())
    }

    /// Releases every device resource.
    pub fn destroy(mut self) {
        self.frame = None;
        for mesh in self.meshes.drain(..).flatten() {
            mesh.destroy();
        }
        self.occlusion.destroy();
        if let Some(timestamps) = self.timestamps.take() {
            timestamps.destroy();
        }
        self.depth_texture.destroy();
        self.buffer_state.destroy();
    }
}

fn bind_group<'a>(
    bind_group_state: &'a BindGroupState,
    name: &'static str,
) -> Result<&'a wgpu::BindGroup, RenderError> {
    bind_group_state
        .get_bind_group(name)
        .ok_or_else(|| RenderError::Device(format!("bind group `{name}` is missing")))
}

impl RenderDevice for GpuRenderDevice {
    fn create_mesh(&mut self, mesh: &ChunkMesh) -> Result<MeshHandle, RenderError> {
        if mesh.indices.is_empty() {
            return Ok(self.insert_mesh(GpuMesh::Empty));
        }

        let gpu_mesh = self.allocate("chunk mesh", |device| GpuMesh::Chunk {
            vertex_buffer: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("chunk vertex buffer"),
                contents: bytemuck::cast_slice(&mesh.vertices),
                usage: wgpu::BufferUsages::VERTEX,
            }),
            index_buffer: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("chunk index buffer"),
                contents: bytemuck::cast_slice(&mesh.indices),
                usage: wgpu::BufferUsages::INDEX,
            }),
        })?;
        Ok(self.insert_mesh(gpu_mesh))
    }

    fn create_bounding_mesh(&mut self, mesh: &BoundingMesh) -> Result<MeshHandle, RenderError> {
        let gpu_mesh = self.allocate("bounding mesh", |device| GpuMesh::Bounds {
            vertex_buffer: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("bounding vertex buffer"),
                contents: bytemuck::cast_slice(&mesh.vertices),
                usage: wgpu::BufferUsages::VERTEX,
            }),
        })?;
        Ok(self.insert_mesh(gpu_mesh))
    }

    fn destroy_mesh(&mut self, mesh: MeshHandle) {
        if let Some(gpu_mesh) = self.meshes.get_mut(mesh.0 as usize).and_then(Option::take) {
            gpu_mesh.destroy();
            self.free_meshes.push(mesh.0);
        }
    }

    fn create_occlusion_query(&mut self) -> Result<OcclusionQueryId, RenderError> {
        self.occlusion.allocate()
    }

    fn destroy_occlusion_query(&mut self, query: OcclusionQueryId) {
        self.occlusion.release(query);
    }

    fn create_timer_query(&mut self) -> Result<TimerQueryId, RenderError> {
        match self.timestamps.as_mut() {
            Some(timestamps) => timestamps
                .allocate()
                .map(TimerQueryId)
                .ok_or_else(|| RenderError::Allocation(String::from("timestamp query set is full"))),
            None => {
                self.timer_fallback_ids += 1;
                Ok(TimerQueryId(self.timer_fallback_ids - 1))
            }
        }
    }

    fn destroy_timer_query(&mut self, query: TimerQueryId) {
        if let Some(timestamps) = self.timestamps.as_mut() {
            timestamps.release(query.0);
        }
    }

    fn begin_timer_query(&mut self, query: TimerQueryId) {
        if let (Some(timestamps), Some(frame)) = (self.timestamps.as_ref(), self.frame.as_mut()) {
            timestamps.begin(&mut frame.encoder, query.0);
        }
    }

    fn end_timer_query(&mut self, query: TimerQueryId) {
        if let (Some(timestamps), Some(frame)) = (self.timestamps.as_mut(), self.frame.as_mut()) {
            if let Err(err) = timestamps.end(&mut frame.encoder, &self.buffer_state, query.0) {
                frame.failure.get_or_insert(err);
            }
        }
    }

    fn timer_query_result(&mut self, query: TimerQueryId) -> Result<Option<u64>, RenderError> {
        match self.timestamps.as_ref() {
            Some(timestamps) => timestamps.read(&self.device, query.0),
            None => Ok(None),
        }
    }

    fn begin_occlusion_pass(&mut self) {
        self.open_pass(PassKind::Occlusion);
    }

    fn begin_occlusion_query(&mut self, query: OcclusionQueryId) {
        self.record(PassKind::Occlusion, PassCommand::BeginQuery(query.0));
        if self.frame.as_ref().is_some_and(|frame| frame.pass == Some(PassKind::Occlusion)) {
            self.occlusion.mark_written(query);
        }
    }

    fn draw_bounding_mesh(&mut self, mesh: MeshHandle) {
        self.record(PassKind::Occlusion, PassCommand::DrawBounds(mesh));
    }

    fn end_occlusion_query(&mut self) {
        self.record(PassKind::Occlusion, PassCommand::EndQuery);
    }

    fn end_occlusion_pass(&mut self) {
        self.close_pass(PassKind::Occlusion);
    }

    fn begin_draw_pass(&mut self) {
        self.open_pass(PassKind::Draw);
    }

    fn begin_conditional_render(&mut self, query: OcclusionQueryId) {
        if let Some(frame) = self.frame.as_mut() {
            frame.gate = Some(query);
        }
    }

    fn draw_mesh(&mut self, mesh: MeshHandle, index_count: u32) {
        let Some(gate) = self.frame.as_ref().map(|frame| frame.gate) else {
            return;
        };
        if let Some(query) = gate {
            if let Err(err) =
                self.occlusion
                    .prepare_gate(&mut self.buffer_state, &self.queue, query, index_count)
            {
                if let Some(frame) = self.frame.as_mut() {
                    frame.failure.get_or_insert(err);
                }
                return;
            }
        }
        self.record(
            PassKind::Draw,
            PassCommand::Draw {
                mesh,
                index_count,
                gate,
            },
        );
    }

    fn end_conditional_render(&mut self) {
        if let Some(frame) = self.frame.as_mut() {
            frame.gate = None;
        }
    }

    fn end_draw_pass(&mut self) {
        self.close_pass(PassKind::Draw);
    }
}
