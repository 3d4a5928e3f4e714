//! Per-frame chunk ordering, frustum rejection and two-pass occlusion culling.
//!
//! # Algorithm
//!
//! 1. Sort the chunks by distance from the camera to their centres.
//! 2. Split the sorted list into distance bands. The first band holds the
//!    chunks closer than `S` (the chunk edge length); each following band
//!    extends the limit by `2S`.
//! 3. In each band, skip chunks that fail the frustum test.
//! 4. With occlusion culling on, draw the bounding box of every remaining
//!    chunk inside its own occlusion query, with no depth or colour writes.
//! 5. Draw the chunk meshes of the band. With occlusion culling on, each draw
//!    is gated on the chunk's query from step 4.
//!
//! A band's queries are all issued before its draws, and a band's draws are
//! issued before the next band's queries, so far bands are tested against the
//! depth written by nearer ones. Correctness relies on the device executing
//! the command stream in order.
//!
//! Turning occlusion culling off leaves a sorted, frustum-culled draw of the
//! same chunks. Culling only ever removes chunks whose bounding box is fully
//! hidden.

use std::ops::Range;

use cgmath::{Matrix4, MetricSpace, Point3};

use crate::engine_state::voxels::world::ChunkStore;

use super::device::RenderDevice;

/// Camera data consumed by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameView {
    /// Camera position in world space
    pub camera_position: Point3<f32>,
    /// Projection × view matrix
    pub view_projection: Matrix4<f32>,
}

/// A run of distance-sorted chunks closer than `max_distance`.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceBand {
    /// Exclusive upper bound on the distance of the band's chunks
    pub max_distance: f32,
    /// Indices of the band's chunks in the sorted store
    pub chunks: Range<usize>,
    /// Indices of the chunks that passed the frustum test
    pub visible: Vec<usize>,
}

/// The work for one frame, computed from a sorted store.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FramePlan {
    /// Bands in near-to-far order
    pub bands: Vec<DistanceBand>,
    /// Whether draws are gated on occlusion queries
    pub occlusion_culling: bool,
}

/// Counters for one executed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameStats {
    /// Number of non-empty bands
    pub bands: usize,
    /// Chunks rejected by the frustum test
    pub frustum_rejected: usize,
    /// Occlusion queries issued
    pub occlusion_queries: usize,
    /// Draw calls issued, gated or not
    pub draws: usize,
}

/// Schedules the chunk draws of every frame.
#[derive(Debug, Clone)]
pub struct VisibilityScheduler {
    occlusion_culling: bool,
}

impl VisibilityScheduler {
    /// Creates a scheduler with occlusion culling on or off.
    pub fn new(occlusion_culling: bool) -> Self {
        Self { occlusion_culling }
    }

    /// Whether occlusion culling is on.
    pub fn occlusion_culling(&self) -> bool {
        self.occlusion_culling
    }

    /// Flips occlusion culling and returns the new state.
    pub fn toggle_occlusion_culling(&mut self) -> bool {
        self.occlusion_culling = !self.occlusion_culling;
        self.occlusion_culling
    }

    /// Sorts the store for `view` and computes the frame's bands.
    ///
    /// # Arguments
    /// * `store` - Chunks to schedule; reordered near to far
    /// * `view` - Camera position and view-projection matrix
    ///
    /// # Returns
    /// The bands, each listing the chunks that survive the frustum test
    pub fn plan(&self, store: &mut ChunkStore, view: &FrameView) -> FramePlan {
        store.sort_by_distance(view.camera_position);

        let chunk_size = store.chunk_size() as f32;
        let distances: Vec<f32> = store
            .chunks()
            .iter()
            .map(|chunk| chunk.distance_to(view.camera_position))
            .collect();

        let bands = partition_bands(&distances, chunk_size)
            .into_iter()
            .map(|(max_distance, chunks)| {
                let visible = chunks
                    .clone()
                    .filter(|&index| {
                        !is_outside_frustum(
                            store.chunks()[index].center,
                            view.camera_position,
                            &view.view_projection,
                            chunk_size,
                        )
                    })
                    .collect();
                DistanceBand {
                    max_distance,
                    chunks,
                    visible,
                }
            })
            .collect();

        FramePlan {
            bands,
            occlusion_culling: self.occlusion_culling,
        }
    }

    /// Issues the device commands for `plan`.
    ///
    /// # Arguments
    /// * `plan` - Bands computed by [`VisibilityScheduler::plan`] for `store`
    /// * `store` - The store in the order the plan was computed for
    /// * `device` - Device receiving the pass commands
    pub fn execute<D: RenderDevice>(
        &self,
        plan: &FramePlan,
        store: &ChunkStore,
        device: &mut D,
    ) -> FrameStats {
        let chunks = store.chunks();
        let mut stats = FrameStats::default();

        for band in &plan.bands {
            stats.frustum_rejected += band.chunks.len() - band.visible.len();
            if band.visible.is_empty() {
                continue;
            }
            stats.bands += 1;

            if plan.occlusion_culling {
                device.begin_occlusion_pass();
                for &index in &band.visible {
                    let chunk = &chunks[index];
                    device.begin_occlusion_query(chunk.visibility_query);
                    device.draw_bounding_mesh(chunk.bounding_mesh);
                    device.end_occlusion_query();
                    stats.occlusion_queries += 1;
                }
                device.end_occlusion_pass();
            }

            device.begin_draw_pass();
            for &index in &band.visible {
                let chunk = &chunks[index];
                if plan.occlusion_culling {
                    device.begin_conditional_render(chunk.visibility_query);
                }
                device.draw_mesh(chunk.mesh, chunk.index_count());
                if plan.occlusion_culling {
                    device.end_conditional_render();
                }
                stats.draws += 1;
            }
            device.end_draw_pass();
        }

        stats
    }

    /// Plans and executes one frame.
    pub fn render<D: RenderDevice>(
        &self,
        store: &mut ChunkStore,
        view: &FrameView,
        device: &mut D,
    ) -> FrameStats {
        let plan = self.plan(store, view);
        self.execute(&plan, store, device)
    }
}

/// Splits ascending `distances` into contiguous bands.
///
/// The first band's limit is `chunk_size`; every following limit is `2 ×
/// chunk_size` further out. Limits that capture no chunk produce no band.
/// Trailing non-finite distances are gathered into one final band, so every
/// index lands in exactly one band.
///
/// # Returns
/// `(max_distance, index range)` pairs in ascending order
pub fn partition_bands(distances: &[f32], chunk_size: f32) -> Vec<(f32, Range<usize>)> {
    let mut bands = Vec::new();
    let mut start = 0;
    let mut max_distance = chunk_size;

    while start < distances.len() {
        let end = start
            + distances[start..]
                .iter()
                .take_while(|&&distance| distance < max_distance)
                .count();

        if end > start {
            bands.push((max_distance, start..end));
            start = end;
        } else if !distances[start].is_finite() {
            bands.push((f32::INFINITY, start..distances.len()));
            break;
        }

        max_distance += 2.0 * chunk_size;
    }

    bands
}

/// Approximate frustum test for a chunk.
///
/// A chunk is rejected when it is farther than `chunk_size` from the camera
/// and its projected centre lies more than `chunk_size` outside the clip
/// volume on x or y. Chunks within `chunk_size` of the camera are never
/// rejected, since the camera may be inside them.
pub fn is_outside_frustum(
    center: Point3<f32>,
    camera_position: Point3<f32>,
    view_projection: &Matrix4<f32>,
    chunk_size: f32,
) -> bool {
    if center.distance(camera_position) <= chunk_size {
        return false;
    }

    let projected = view_projection * center.to_homogeneous();
    projected.x.abs().max(projected.y.abs()) > projected.w + chunk_size
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::WorldConfig,
        engine_state::rendering::device::{
            testing::{Command, RecordingDevice},
            OcclusionQueryId,
        },
    };
    use cgmath::{perspective, Deg, Vector3};
    use std::collections::HashSet;

    fn world(range: i32, size: i32, field: impl Fn(Point3<f32>) -> f32) -> (ChunkStore, RecordingDevice) {
        let mut device = RecordingDevice::new();
        let config = WorldConfig {
            chunk_range: range,
            chunk_size: size,
            ..WorldConfig::default()
        };
        let store = ChunkStore::generate(&field, &config, &mut device).unwrap();
        device.commands.clear();
        (store, device)
    }

    fn view(eye: Point3<f32>, direction: Vector3<f32>) -> FrameView {
        let projection = perspective(Deg(90.0), 4.0 / 3.0, 0.1, 200.0);
        FrameView {
            camera_position: eye,
            view_projection: projection * Matrix4::look_to_rh(eye, direction, Vector3::unit_y()),
        }
    }

    #[test]
    fn test_bands_cover_every_chunk_once() {
        let (mut store, _) = world(3, 4, |_| 1.0);
        let scheduler = VisibilityScheduler::new(true);

        for eye in [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(11.0, -7.0, 3.5),
            Point3::new(400.0, 0.0, 0.0),
        ] {
            let plan = scheduler.plan(&mut store, &view(eye, Vector3::unit_x()));
            let mut next = 0;
            for band in &plan.bands {
                assert_eq!(band.chunks.start, next);
                assert!(band.chunks.end > band.chunks.start);
                next = band.chunks.end;
            }
            assert_eq!(next, store.len());
        }
    }

    #[test]
    fn test_band_limits_grow_by_two_chunk_sizes() {
        let (mut store, _) = world(3, 4, |_| 1.0);
        let scheduler = VisibilityScheduler::new(true);
        let eye = Point3::new(2.0, 2.0, 2.0);
        let plan = scheduler.plan(&mut store, &view(eye, Vector3::unit_z()));

        let mut previous_limit = 0.0;
        for band in &plan.bands {
            assert_eq!((band.max_distance - 4.0) % 8.0, 0.0);
            for index in band.chunks.clone() {
                let distance = store.chunks()[index].distance_to(eye);
                assert!(distance < band.max_distance);
                assert!(distance >= previous_limit);
            }
            previous_limit = band.max_distance;
        }
    }

    #[test]
    fn test_partition_skips_empty_limits() {
        let bands = partition_bands(&[1.0, 2.0, 50.0, 51.0], 4.0);
        assert_eq!(bands, vec![(4.0, 0..2), (52.0, 2..4)]);
    }

    #[test]
    fn test_partition_terminates_on_non_finite_distances() {
        let bands = partition_bands(&[1.0, f32::INFINITY, f32::NAN], 4.0);
        assert_eq!(bands.len(), 2);
        assert_eq!(bands[1].1, 1..3);
    }

    #[test]
    fn test_frustum_boundary_is_exclusive() {
        let camera = Point3::new(0.0, 0.0, 0.0);
        let huge = Matrix4::from_scale(1000.0);

        // Exactly one chunk size away: never rejected.
        assert!(!is_outside_frustum(Point3::new(32.0, 0.0, 0.0), camera, &huge, 32.0));
        // Just beyond, projected far outside the clip volume.
        assert!(is_outside_frustum(Point3::new(32.01, 0.0, 0.0), camera, &huge, 32.0));
    }

    #[test]
    fn test_frustum_margin() {
        let camera = Point3::new(0.0, 0.0, 0.0);
        let identity = Matrix4::from_scale(1.0);
        // Projected x = 40 against w + S = 1 + 32.
        assert!(is_outside_frustum(Point3::new(40.0, 0.0, 0.0), camera, &identity, 32.0));
        // Projected y = 33 is exactly on the margin and stays visible.
        assert!(!is_outside_frustum(Point3::new(0.0, 33.0, 0.0), camera, &identity, 32.0));
    }

    #[test]
    fn test_chunks_behind_camera_are_rejected() {
        let (mut store, mut device) = world(3, 8, |_| 1.0);
        let scheduler = VisibilityScheduler::new(false);
        let stats = scheduler.render(&mut store, &view(Point3::new(0.0, 0.0, 0.0), -Vector3::unit_z()), &mut device);
        assert!(stats.frustum_rejected > 0);
        assert_eq!(stats.draws + stats.frustum_rejected, store.len());
    }

    #[test]
    fn test_band_queries_precede_band_draws() {
        let (mut store, mut device) = world(2, 8, |p| p.y);
        let scheduler = VisibilityScheduler::new(true);
        scheduler.render(&mut store, &view(Point3::new(1.0, 2.0, 3.0), Vector3::unit_x()), &mut device);

        let mut commands = device.commands.iter().peekable();
        let mut bands = 0;
        while commands.peek().is_some() {
            assert_eq!(commands.next(), Some(&Command::BeginOcclusionPass));
            let mut queried = Vec::new();
            while let Some(Command::BeginOcclusionQuery(query)) = commands.peek().cloned() {
                commands.next();
                assert!(matches!(commands.next(), Some(Command::DrawBoundingMesh(_))));
                assert_eq!(commands.next(), Some(&Command::EndOcclusionQuery));
                queried.push(*query);
            }
            assert_eq!(commands.next(), Some(&Command::EndOcclusionPass));

            assert_eq!(commands.next(), Some(&Command::BeginDrawPass));
            let mut gated = Vec::new();
            while let Some(Command::BeginConditionalRender(query)) = commands.peek().cloned() {
                commands.next();
                assert!(matches!(commands.next(), Some(Command::DrawMesh(_, _))));
                assert_eq!(commands.next(), Some(&Command::EndConditionalRender));
                gated.push(*query);
            }
            assert_eq!(commands.next(), Some(&Command::EndDrawPass));

            // Draws are gated on this band's queries, in the same order.
            assert!(!queried.is_empty());
            assert_eq!(queried, gated);
            bands += 1;
        }
        assert!(bands > 1);
    }

    #[test]
    fn test_culling_disabled_draws_unconditionally() {
        let (mut store, mut device) = world(2, 8, |p| p.y);
        let scheduler = VisibilityScheduler::new(false);
        let stats = scheduler.render(&mut store, &view(Point3::new(0.0, 0.0, 0.0), Vector3::unit_x()), &mut device);

        assert_eq!(stats.occlusion_queries, 0);
        assert!(device.commands.iter().all(|c| !matches!(
            c,
            Command::BeginOcclusionPass | Command::BeginOcclusionQuery(_) | Command::BeginConditionalRender(_)
        )));
        let draws = device.commands.iter().filter(|c| matches!(c, Command::DrawMesh(..))).count();
        assert_eq!(draws, stats.draws);
    }

    #[test]
    fn test_occlusion_culling_only_removes_hidden_chunks() {
        let (mut store, mut device) = world(2, 8, |p| p.y);
        let frame = view(Point3::new(3.0, 1.0, -2.0), Vector3::new(1.0, -0.2, 0.3));

        let mut scheduler = VisibilityScheduler::new(false);
        scheduler.render(&mut store, &frame, &mut device);
        let unculled: HashSet<_> = device.rasterized_meshes().into_iter().collect();

        // Hide every other chunk.
        let hidden: HashSet<OcclusionQueryId> =
            store.chunks().iter().step_by(2).map(|c| c.visibility_query).collect();
        device.commands.clear();
        device.occluded = hidden.clone();
        scheduler.toggle_occlusion_culling();
        scheduler.render(&mut store, &frame, &mut device);
        let culled: HashSet<_> = device.rasterized_meshes().into_iter().collect();

        assert!(culled.is_subset(&unculled));
        let removed: HashSet<_> = unculled.difference(&culled).copied().collect();
        let expected: HashSet<_> = store
            .chunks()
            .iter()
            .filter(|c| hidden.contains(&c.visibility_query) && unculled.contains(&c.mesh))
            .map(|c| c.mesh)
            .collect();
        assert_eq!(removed, expected);
    }

    #[test]
    fn test_unoccluded_scene_is_identical_with_and_without_culling() {
        // 2x2x2 world, solid only in chunk (0, 0, 0), camera at the origin.
        let field = |p: Point3<f32>| {
            let inside = |c: f32| (0.0..32.0).contains(&c);
            if inside(p.x) && inside(p.y) && inside(p.z) { -1.0 } else { 1.0 }
        };
        let (mut store, mut device) = world(1, 32, field);
        let frame = view(Point3::new(0.0, 0.0, 0.0), Vector3::new(1.0, 1.0, 1.0));

        let mut scheduler = VisibilityScheduler::new(false);
        scheduler.render(&mut store, &frame, &mut device);
        let unculled = device.rasterized_meshes();

        device.commands.clear();
        scheduler.toggle_occlusion_culling();
        scheduler.render(&mut store, &frame, &mut device);
        let culled = device.rasterized_meshes();

        assert_eq!(unculled, culled);
        let solid = store.chunks().iter().find(|c| c.quad_count > 0).unwrap();
        assert!(culled.contains(&solid.mesh));
    }
}
