//! The rendering-device contract used by the chunk store, the visibility
//! scheduler and the frame timer.
//!
//! The contract mirrors an immediate-mode graphics API: resources are named by
//! opaque handles, and pass commands are issued one at a time on a single
//! ordered command stream. Implementations must execute that stream in order:
//! an occlusion query's result has to be visible to a conditional render
//! issued later in the same stream without any CPU-side synchronisation.

use crate::error::RenderError;

use super::meshing::{BoundingMesh, ChunkMesh};

/// Handle to a mesh uploaded to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshHandle(pub(crate) u32);

/// Handle to an occlusion query object.
///
/// A query is written (begin/end) at most once per frame and reused every
/// frame; each write overwrites the previous result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OcclusionQueryId(pub(crate) u32);

/// Handle to a timer query object measuring elapsed GPU time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerQueryId(pub(crate) u32);

/// Rendering device consumed by the engine.
///
/// Pass commands are only meaningful inside a frame; implementations ignore
/// them otherwise.
pub trait RenderDevice {
    /// Uploads a chunk's face mesh. Empty meshes are valid and never drawn.
    fn create_mesh(&mut self, mesh: &ChunkMesh) -> Result<MeshHandle, RenderError>;

    /// Uploads a chunk's bounding box.
    fn create_bounding_mesh(&mut self, mesh: &BoundingMesh) -> Result<MeshHandle, RenderError>;

    /// Releases a mesh created by either of the mesh constructors.
    fn destroy_mesh(&mut self, mesh: MeshHandle);

    /// Allocates an occlusion query object.
    fn create_occlusion_query(&mut self) -> Result<OcclusionQueryId, RenderError>;

    /// Releases an occlusion query object.
    fn destroy_occlusion_query(&mut self, query: OcclusionQueryId);

    /// Allocates a timer query object.
    fn create_timer_query(&mut self) -> Result<TimerQueryId, RenderError>;

    /// Releases a timer query object.
    fn destroy_timer_query(&mut self, query: TimerQueryId);

    /// Starts measuring elapsed GPU time into `query`.
    fn begin_timer_query(&mut self, query: TimerQueryId);

    /// Stops the measurement started by [`RenderDevice::begin_timer_query`].
    fn end_timer_query(&mut self, query: TimerQueryId);

    /// Reads the elapsed nanoseconds recorded by `query`.
    ///
    /// Blocks until the result is available. Returns `Ok(None)` when the
    /// device cannot measure time.
    fn timer_query_result(&mut self, query: TimerQueryId) -> Result<Option<u64>, RenderError>;

    /// Enters the occlusion state: no face culling, no depth or colour
    /// writes, position-only query shader.
    fn begin_occlusion_pass(&mut self);

    /// Starts counting samples that pass the depth test into `query`.
    fn begin_occlusion_query(&mut self, query: OcclusionQueryId);

    /// Draws a bounding box.
    fn draw_bounding_mesh(&mut self, mesh: MeshHandle);

    /// Ends the query opened by [`RenderDevice::begin_occlusion_query`].
    fn end_occlusion_query(&mut self);

    /// Leaves the occlusion state.
    fn end_occlusion_pass(&mut self);

    /// Enters the draw state: back-face culling, depth and colour writes,
    /// shading program.
    fn begin_draw_pass(&mut self);

    /// Gates the following draws on `query`: they rasterise only if the
    /// query recorded at least one passing sample. The device waits for the
    /// result on the GPU, region by region where it can.
    fn begin_conditional_render(&mut self, query: OcclusionQueryId);

    /// Draws `index_count` indices of a chunk mesh.
    fn draw_mesh(&mut self, mesh: MeshHandle, index_count: u32);

    /// Closes the scope opened by [`RenderDevice::begin_conditional_render`].
    fn end_conditional_render(&mut self);

    /// Leaves the draw state.
    fn end_draw_pass(&mut self);
}

#[cfg(test)]
pub mod testing {
    //! A device that records every command instead of rendering.

    use std::collections::{HashMap, HashSet};

    use super::*;

    /// A recorded device command.
    #[derive(Debug, Clone, PartialEq)]
    pub enum Command {
        BeginOcclusionPass,
        BeginOcclusionQuery(OcclusionQueryId),
        DrawBoundingMesh(MeshHandle),
        EndOcclusionQuery,
        EndOcclusionPass,
        BeginDrawPass,
        BeginConditionalRender(OcclusionQueryId),
        DrawMesh(MeshHandle, u32),
        EndConditionalRender,
        EndDrawPass,
        BeginTimerQuery(TimerQueryId),
        EndTimerQuery(TimerQueryId),
        ReadTimerQuery(TimerQueryId),
    }

    /// Records commands and tracks live resources.
    ///
    /// Releasing a handle twice, or one that was never created, panics.
    #[derive(Default)]
    pub struct RecordingDevice {
        pub commands: Vec<Command>,
        pub live_meshes: HashSet<MeshHandle>,
        pub live_occlusion_queries: HashSet<OcclusionQueryId>,
        pub live_timer_queries: HashSet<TimerQueryId>,
        /// Fail allocations once this many resources have been created.
        pub allocation_limit: Option<usize>,
        /// Queries whose bounding box is fully hidden.
        pub occluded: HashSet<OcclusionQueryId>,
        /// Elapsed time reported by timer queries.
        pub timer_nanoseconds: Option<u64>,
        mesh_quads: HashMap<MeshHandle, u32>,
        next_handle: u32,
        allocations: usize,
    }

    impl RecordingDevice {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing_after(allocations: usize) -> Self {
            Self {
                allocation_limit: Some(allocations),
                ..Self::default()
            }
        }

        fn allocate(&mut self) -> Result<u32, RenderError> {
            if self.allocation_limit.is_some_and(|limit| self.allocations >= limit) {
                return Err(RenderError::Allocation(String::from("recording device limit")));
            }
            self.allocations += 1;
            self.next_handle += 1;
            Ok(self.next_handle)
        }

        /// Quad count of a live mesh.
        pub fn quads_of(&self, mesh: MeshHandle) -> Option<u32> {
            self.mesh_quads.get(&mesh).copied()
        }

        /// Meshes that would reach the screen: every direct draw, plus gated
        /// draws whose query is not occluded.
        pub fn rasterized_meshes(&self) -> Vec<MeshHandle> {
            let mut gate = None;
            let mut drawn = Vec::new();
            for command in &self.commands {
                match command {
                    Command::BeginConditionalRender(query) => gate = Some(*query),
                    Command::EndConditionalRender => gate = None,
                    Command::DrawMesh(mesh, _) => {
                        if gate.is_none_or(|query| !self.occluded.contains(&query)) {
                            drawn.push(*mesh);
                        }
                    }
                    _ => {}
                }
            }
            drawn
        }
    }

    impl RenderDevice for RecordingDevice {
        fn create_mesh(&mut self, mesh: &ChunkMesh) -> Result<MeshHandle, RenderError> {
            let handle = MeshHandle(self.allocate()?);
            self.live_meshes.insert(handle);
            self.mesh_quads.insert(handle, mesh.quad_count());
            Ok(handle)
        }

        fn create_bounding_mesh(&mut self, _mesh: &BoundingMesh) -> Result<MeshHandle, RenderError> {
            let handle = MeshHandle(self.allocate()?);
            self.live_meshes.insert(handle);
            Ok(handle)
        }

        fn destroy_mesh(&mut self, mesh: MeshHandle) {
            assert!(self.live_meshes.remove(&mesh), "mesh {mesh:?} released twice");
            self.mesh_quads.remove(&mesh);
        }

        fn create_occlusion_query(&mut self) -> Result<OcclusionQueryId, RenderError> {
            let query = OcclusionQueryId(self.allocate()?);
            self.live_occlusion_queries.insert(query);
            Ok(query)
        }

        fn destroy_occlusion_query(&mut self, query: OcclusionQueryId) {
            assert!(self.live_occlusion_queries.remove(&query), "query {query:?} released twice");
        }

        fn create_timer_query(&mut self) -> Result<TimerQueryId, RenderError> {
            let query = TimerQueryId(self.allocate()?);
            self.live_timer_queries.insert(query);
            Ok(query)
        }

        fn destroy_timer_query(&mut self, query: TimerQueryId) {
            assert!(self.live_timer_queries.remove(&query), "timer {query:?} released twice");
        }

        fn begin_timer_query(&mut self, query: TimerQueryId) {
            self.commands.push(Command::BeginTimerQuery(query));
        }

        fn end_timer_query(&mut self, query: TimerQueryId) {
            self.commands.push(Command::EndTimerQuery(query));
        }

        fn timer_query_result(&mut self, query: TimerQueryId) -> Result<Option<u64>, RenderError> {
            self.commands.push(Command::ReadTimerQuery(query));
            Ok(self.timer_nanoseconds)
        }

        fn begin_occlusion_pass(&mut self) {
            self.commands.push(Command::BeginOcclusionPass);
        }

        fn begin_occlusion_query(&mut self, query: OcclusionQueryId) {
            self.commands.push(Command::BeginOcclusionQuery(query));
        }

        fn draw_bounding_mesh(&mut self, mesh: MeshHandle) {
            self.commands.push(Command::DrawBoundingMesh(mesh));
        }

        fn end_occlusion_query(&mut self) {
            self.commands.push(Command::EndOcclusionQuery);
        }

        fn end_occlusion_pass(&mut self) {
            self.commands.push(Command::EndOcclusionPass);
        }

        fn begin_draw_pass(&mut self) {
            self.commands.push(Command::BeginDrawPass);
        }

        fn begin_conditional_render(&mut self, query: OcclusionQueryId) {
            self.commands.push(Command::BeginConditionalRender(query));
        }

        fn draw_mesh(&mut self, mesh: MeshHandle, index_count: u32) {
            self.commands.push(Command::DrawMesh(mesh, index_count));
        }

        fn end_conditional_render(&mut self) {
            self.commands.push(Command::EndConditionalRender);
        }

        fn end_draw_pass(&mut self) {
            self.commands.push(Command::EndDrawPass);
        }
    }
}
