//! Occlusion queries and the indirect draws gated on them.
//!
//! WebGPU has no conditional rendering, so a gated draw is expressed as an
//! indirect draw whose instance count the GPU decides:
//!
//! 1. Bounding boxes are drawn inside occlusion queries of one query set.
//! 2. After the occlusion pass, each written query is resolved into its own
//!    256-byte slot of a storage buffer.
//! 3. A compute pass sets `instance_count` of every query's
//!    `DrawIndexedIndirectArgs` to 1 if any sample passed, 0 otherwise.
//! 4. The draw pass issues `draw_indexed_indirect` on those arguments.
//!
//! All four steps are recorded into the frame's single command encoder, so
//! the draw waits for the query result on the GPU and the CPU never blocks.
//!
//! The CPU writes the rest of each query's arguments (`index_count` of the
//! chunk mesh it gates) once, the first time the query gates a draw.

use std::mem::size_of;

use wgpu::{util::DrawIndexedIndirectArgs, Device, QuerySet, Queue};

use crate::{engine_state::buffer_state::BufferState, error::RenderError};

use super::device::OcclusionQueryId;

/// Name of the buffer holding resolved occlusion results.
pub const OCCLUSION_RESOLVE_BUFFER: &str = "occlusion_resolve_buffer";
/// Name of the buffer holding the indirect draw arguments of every query.
pub const DRAW_ARGS_BUFFER: &str = "draw_args_buffer";

/// Distance between two resolved results in the resolve buffer.
pub const RESULT_STRIDE: u64 = wgpu::QUERY_RESOLVE_BUFFER_ALIGNMENT;
/// Size of one query's indirect draw arguments.
pub const DRAW_ARGS_STRIDE: u64 = size_of::<DrawIndexedIndirectArgs>() as u64;
/// Workgroup size of the visibility compute shader.
pub const VISIBILITY_WORKGROUP_SIZE: u32 = 64;

/// Fixed-capacity allocator of query indices.
///
/// Released indices are reused before fresh ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPool {
    capacity: u32,
    next: u32,
    free: Vec<u32>,
}

impl QueryPool {
    /// Creates a pool handing out indices in `0..capacity`.
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            next: 0,
            free: Vec::new(),
        }
    }

    /// Number of indices the pool can hand out.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Number of indices currently handed out.
    pub fn in_use(&self) -> u32 {
        self.next - self.free.len() as u32
    }

    /// Takes an index, or `None` if all are in use.
    pub fn allocate(&mut self) -> Option<u32> {
        if let Some(index) = self.free.pop() {
            return Some(index);
        }
        if self.next < self.capacity {
            self.next += 1;
            return Some(self.next - 1);
        }
        None
    }

    /// Returns an index to the pool.
    pub fn release(&mut self, index: u32) {
        debug_assert!(index < self.next && !self.free.contains(&index));
        self.free.push(index);
    }
}

/// Number of workgroups needed to cover `capacity` queries.
pub fn visibility_workgroups(capacity: u32) -> u32 {
    capacity.div_ceil(VISIBILITY_WORKGROUP_SIZE)
}

/// The occlusion query set and the bookkeeping of gated draws.
pub struct OcclusionState {
    query_set: QuerySet,
    pool: QueryPool,
    /// Index count written into each query's draw arguments
    templates: Vec<Option<u32>>,
    /// Queries written by the occlusion pass being recorded
    written: Vec<u32>,
}

impl OcclusionState {
    /// Creates the query set and registers the resolve and argument buffers.
    ///
    /// # Arguments
    /// * `device` - The WebGPU device
    /// * `buffer_state` - Registry receiving the two buffers
    /// * `capacity` - Maximum number of live occlusion queries
    pub fn new(device: &Device, buffer_state: &mut BufferState, capacity: u32) -> Self {
        let capacity = capacity.clamp(1, wgpu::QUERY_SET_MAX_QUERIES);

        let query_set = device.create_query_set(&wgpu::QuerySetDescriptor {
            label: Some("occlusion query set"),
            ty: wgpu::QueryType::Occlusion,
            count: capacity,
        });

        buffer_state.create_buffer(
            device,
            OCCLUSION_RESOLVE_BUFFER,
            &wgpu::BufferDescriptor {
                label: Some("occlusion resolve buffer"),
                size: capacity as u64 * RESULT_STRIDE,
                usage: wgpu::BufferUsages::QUERY_RESOLVE | wgpu::BufferUsages::STORAGE,
                mapped_at_creation: false,
            },
        );
        buffer_state.create_buffer(
            device,
            DRAW_ARGS_BUFFER,
            &wgpu::BufferDescriptor {
                label: Some("draw args buffer"),
                size: capacity as u64 * DRAW_ARGS_STRIDE,
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::INDIRECT
                    | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            },
        );

        Self {
            query_set,
            pool: QueryPool::new(capacity),
            templates: vec![None; capacity as usize],
            written: Vec::new(),
        }
    }

    /// The query set attached to occlusion passes.
    pub fn query_set(&self) -> &QuerySet {
        &self.query_set
    }

    /// Maximum number of live queries.
    pub fn capacity(&self) -> u32 {
        self.pool.capacity()
    }

    /// Allocates a query index.
    pub fn allocate(&mut self) -> Result<OcclusionQueryId, RenderError> {
        self.pool.allocate().map(OcclusionQueryId).ok_or_else(|| {
            RenderError::Allocation(format!(
                "occlusion query set is full ({} queries)",
                self.pool.capacity()
            ))
        })
    }

    /// Releases a query index. Its cached draw arguments are forgotten.
    pub fn release(&mut self, query: OcclusionQueryId) {
        if let Some(template) = self.templates.get_mut(query.0 as usize) {
            *template = None;
        }
        self.pool.release(query.0);
    }

    /// Records that `query` is written by the occlusion pass being recorded.
    pub fn mark_written(&mut self, query: OcclusionQueryId) {
        self.written.push(query.0);
    }

    /// Makes sure the draw arguments of `query` draw `index_count` indices.
    ///
    /// The write is staged on the queue and lands before the frame's commands
    /// run; the visibility pass then overwrites only `instance_count`.
    pub fn prepare_gate(
        &mut self,
        buffer_state: &mut BufferState,
        queue: &Queue,
        query: OcclusionQueryId,
        index_count: u32,
    ) -> Result<(), RenderError> {
        let Some(template) = self.templates.get_mut(query.0 as usize) else {
            return Ok(());
        };
        if *template == Some(index_count) {
            return Ok(());
        }

        let args = DrawIndexedIndirectArgs {
            index_count,
            instance_count: 1,
            first_index: 0,
            base_vertex: 0,
            first_instance: 0,
        };
        buffer_state.write_buffer(
            queue,
            DRAW_ARGS_BUFFER,
            Self::draw_args_offset(query),
            args.as_bytes(),
        )?;
        *template = Some(index_count);
        Ok(())
    }

    /// Byte offset of the draw arguments gated on `query`.
    pub fn draw_args_offset(query: OcclusionQueryId) -> u64 {
        query.0 as u64 * DRAW_ARGS_STRIDE
    }

    /// Resolves every query written since the last call into its slot of the
    /// resolve buffer.
    ///
    /// Queries are resolved one by one so that slots of queries not written
    /// this pass keep their previous contents.
    pub fn resolve(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        buffer_state: &BufferState,
    ) -> Result<(), RenderError> {
        let resolve_buffer = buffer_state.get_buffer(OCCLUSION_RESOLVE_BUFFER)?;
        for query in self.written.drain(..) {
            encoder.resolve_query_set(
                &self.query_set,
                query..query + 1,
                resolve_buffer,
                query as u64 * RESULT_STRIDE,
            );
        }
        Ok(())
    }

    /// Releases the query set.
    pub fn destroy(self) {
        drop(self.query_set);
    }
}
