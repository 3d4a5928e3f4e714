//! Low-level GPU timer implementation on timestamp queries.
//!
//! Each timer slot owns two timestamps of one query set: `2s` is written when
//! the slot begins and `2s + 1` when it ends. Timestamps are written by empty
//! compute passes, which need no feature beyond `TIMESTAMP_QUERY`.
//!
//! When a slot ends, its two timestamps are resolved into the slot's region of
//! the resolve buffer and copied into the slot's own readback buffer. The
//! submission carrying that copy is remembered per slot. Reading a slot waits
//! for that submission only, so frames submitted after it keep running, and
//! unmaps the buffer again before the next submission.

use std::{mem::size_of, sync::mpsc};

use log::warn;
use wgpu::{Device, Queue, SubmissionIndex};

use crate::{engine_state::buffer_state::BufferState, error::RenderError};

use super::occlusion_state::QueryPool;

/// Name of the buffer timestamps are resolved into.
const TIMESTAMP_RESOLVE_BUFFER: &str = "timestamp_resolve_buffer";

/// Distance between two slots in the resolve buffer.
const RESOLVE_STRIDE: u64 = wgpu::QUERY_RESOLVE_BUFFER_ALIGNMENT;
/// Bytes of one slot's begin and end timestamps.
const SLOT_SIZE: u64 = 2 * size_of::<u64>() as u64;

/// Converts a pair of raw timestamps into nanoseconds.
///
/// # Arguments
/// * `begin` - Timestamp written when the slot began
/// * `end` - Timestamp written when the slot ended
/// * `period` - Nanoseconds per timestamp tick, from the queue
pub fn elapsed_nanoseconds(begin: u64, end: u64, period: f32) -> u64 {
    (end.wrapping_sub(begin) as f64 * period as f64).round() as u64
}

/// The submission each timer slot was last ended in.
///
/// Slots ended while a frame is recorded are pending until the frame is
/// submitted; the submission then applies to all of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotSubmissions<S> {
    submitted: Vec<Option<S>>,
    pending: Vec<u32>,
}

impl<S: Clone> SlotSubmissions<S> {
    /// Creates the bookkeeping of `capacity` slots, none submitted.
    pub fn new(capacity: u32) -> Self {
        Self {
            submitted: vec![None; capacity as usize],
            pending: Vec::new(),
        }
    }

    /// Forgets everything recorded for `slot`.
    pub fn forget(&mut self, slot: u32) {
        if let Some(submitted) = self.submitted.get_mut(slot as usize) {
            *submitted = None;
        }
        self.pending.retain(|&pending| pending != slot);
    }

    /// Marks `slot` as ended in the frame being recorded.
    pub fn ended(&mut self, slot: u32) {
        if (slot as usize) < self.submitted.len() && !self.pending.contains(&slot) {
            self.pending.push(slot);
        }
    }

    /// Assigns `index` to every slot ended since the previous submission.
    pub fn submitted(&mut self, index: S) {
        for slot in self.pending.drain(..) {
            self.submitted[slot as usize] = Some(index.clone());
        }
    }

    /// The submission that last carried `slot`'s timestamps.
    pub fn submission_of(&self, slot: u32) -> Option<&S> {
        self.submitted.get(slot as usize).and_then(Option::as_ref)
    }
}

/// Timer slots backed by a timestamp query set.
pub struct RawQueryManager {
    query_set: wgpu::QuerySet,
    pool: QueryPool,
    /// One mappable buffer per slot
    readback_buffers: Vec<wgpu::Buffer>,
    submissions: SlotSubmissions<SubmissionIndex>,
    timestamp_period: f32,
}

impl RawQueryManager {
    /// Creates `capacity` timer slots.
    ///
    /// # Arguments
    /// * `device` - Device with `TIMESTAMP_QUERY` enabled
    /// * `queue` - Queue reporting the timestamp period
    /// * `buffer_state` - Registry receiving the resolve buffer
    /// * `capacity` - Number of slots
    pub fn new(device: &Device, queue: &Queue, buffer_state: &mut BufferState, capacity: u32) -> Self {
        let capacity = capacity.clamp(1, wgpu::QUERY_SET_MAX_QUERIES / 2);

        let query_set = device.create_query_set(&wgpu::QuerySetDescriptor {
            label: Some("timestamp query set"),
            ty: wgpu::QueryType::Timestamp,
            count: 2 * capacity,
        });

        buffer_state.create_buffer(
            device,
            TIMESTAMP_RESOLVE_BUFFER,
            &wgpu::BufferDescriptor {
                label: Some("timestamp resolve buffer"),
                size: capacity as u64 * RESOLVE_STRIDE,
                usage: wgpu::BufferUsages::QUERY_RESOLVE | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            },
        );
        let readback_buffers = (0..capacity)
            .map(|_| {
                device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("timestamp readback buffer"),
                    size: SLOT_SIZE,
                    usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
                    mapped_at_creation: false,
                })
            })
            .collect();

        Self {
            query_set,
            pool: QueryPool::new(capacity),
            readback_buffers,
            submissions: SlotSubmissions::new(capacity),
            timestamp_period: queue.get_timestamp_period(),
        }
    }

    /// Allocates a slot.
    pub fn allocate(&mut self) -> Option<u32> {
        let slot = self.pool.allocate()?;
        self.submissions.forget(slot);
        Some(slot)
    }

    /// Releases a slot.
    pub fn release(&mut self, slot: u32) {
        self.pool.release(slot);
    }

    /// Records the begin timestamp of `slot`.
    pub fn begin(&self, encoder: &mut wgpu::CommandEncoder, slot: u32) {
        let _pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("timer begin"),
            timestamp_writes: Some(wgpu::ComputePassTimestampWrites {
                query_set: &self.query_set,
                beginning_of_pass_write_index: Some(2 * slot),
                end_of_pass_write_index: None,
            }),
        });
    }

    /// Records the end timestamp of `slot` and copies both timestamps to the
    /// slot's readback buffer.
    pub fn end(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        buffer_state: &BufferState,
        slot: u32,
    ) -> Result<(), RenderError> {
        let Some(readback_buffer) = self.readback_buffers.get(slot as usize) else {
            return Err(RenderError::QueryReadback(format!("timer slot {slot} does not exist")));
        };

        {
            let _pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("timer end"),
                timestamp_writes: Some(wgpu::ComputePassTimestampWrites {
                    query_set: &self.query_set,
                    beginning_of_pass_write_index: None,
                    end_of_pass_write_index: Some(2 * slot + 1),
                }),
            });
        }

        let resolve_buffer = buffer_state.get_buffer(TIMESTAMP_RESOLVE_BUFFER)?;
        let resolve_offset = slot as u64 * RESOLVE_STRIDE;

        encoder.resolve_query_set(&self.query_set, 2 * slot..2 * slot + 2, resolve_buffer, resolve_offset);
        encoder.copy_buffer_to_buffer(resolve_buffer, resolve_offset, readback_buffer, 0, SLOT_SIZE);

        self.submissions.ended(slot);
        Ok(())
    }

    /// Remembers the submission carrying the slots ended since the last one.
    pub fn submitted(&mut self, index: SubmissionIndex) {
        self.submissions.submitted(index);
    }

    /// Reads the elapsed time of `slot`, waiting for the submission that
    /// carried it and nothing newer.
    ///
    /// # Returns
    /// The elapsed nanoseconds, or `None` if the slot has not been submitted
    /// since it was allocated
    pub fn read(&self, device: &Device, slot: u32) -> Result<Option<u64>, RenderError> {
        let (Some(submission), Some(readback_buffer)) = (
            self.submissions.submission_of(slot),
            self.readback_buffers.get(slot as usize),
        ) else {
            return Ok(None);
        };

        let slice = readback_buffer.slice(..);
        let (sender, receiver) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        device
            .poll(wgpu::PollType::WaitForSubmissionIndex(submission.clone()))
            .map_err(|err| RenderError::QueryReadback(err.to_string()))?;

        match receiver.recv() {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(RenderError::QueryReadback(err.to_string())),
            Err(err) => return Err(RenderError::QueryReadback(err.to_string())),
        }

        let timestamps: [u64; 2] = {
            let view = slice.get_mapped_range();
            bytemuck::pod_read_unaligned(&view)
        };
        readback_buffer.unmap();

        if timestamps[1] < timestamps[0] {
            warn!("timer slot {} ended before it began", slot);
        }
        Ok(Some(elapsed_nanoseconds(
            timestamps[0],
            timestamps[1],
            self.timestamp_period,
        )))
    }

    /// Releases the readback buffers and the query set.
    pub fn destroy(self) {
        for buffer in &self.readback_buffers {
            buffer.destroy();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::rendering::query_manager::TimerQueryRing;

    #[test]
    fn test_elapsed_scales_by_period() {
        assert_eq!(elapsed_nanoseconds(1_000, 3_000, 1.0), 2_000);
        assert_eq!(elapsed_nanoseconds(10, 20, 83.333), 833);
    }

    #[test]
    fn test_elapsed_survives_counter_wrap() {
        assert_eq!(elapsed_nanoseconds(u64::MAX - 4, 5, 1.0), 10);
    }

    #[test]
    fn test_submission_applies_to_slots_ended_before_it() {
        let mut submissions = SlotSubmissions::new(4);
        submissions.ended(0);
        submissions.ended(2);
        submissions.submitted(7u64);
        submissions.ended(1);

        assert_eq!(submissions.submission_of(0), Some(&7));
        assert_eq!(submissions.submission_of(2), Some(&7));
        assert_eq!(submissions.submission_of(1), None);

        submissions.submitted(8);
        assert_eq!(submissions.submission_of(1), Some(&8));
        assert_eq!(submissions.submission_of(3), None);
    }

    #[test]
    fn test_forgotten_slot_reports_no_submission() {
        let mut submissions = SlotSubmissions::new(2);
        submissions.ended(1);
        submissions.submitted(3u64);
        submissions.forget(1);
        assert_eq!(submissions.submission_of(1), None);

        submissions.ended(0);
        submissions.forget(0);
        submissions.submitted(4);
        assert_eq!(submissions.submission_of(0), None);
    }

    #[test]
    fn test_ring_read_waits_only_on_its_own_frame() {
        // Submission `f` carries the slot ended in frame `f`.
        let n = 4u32;
        let mut ring = TimerQueryRing::new(n as usize);
        let mut submissions = SlotSubmissions::new(n);

        for frame in 0..20u64 {
            if let Some(slot) = ring.readable_slot() {
                let awaited = *submissions.submission_of(slot as u32).unwrap();
                assert_eq!(awaited, frame + 1 - n as u64);
                assert!(awaited < frame - 1, "frame {frame} waited on the previous frame");
            }
            submissions.ended(ring.current_slot() as u32);
            submissions.submitted(frame);
            ring.advance();
        }
    }

    #[test]
    fn test_slot_layout_respects_resolve_alignment() {
        assert_eq!(RESOLVE_STRIDE % wgpu::QUERY_RESOLVE_BUFFER_ALIGNMENT, 0);
        assert!(SLOT_SIZE <= RESOLVE_STRIDE);
        assert_eq!(SLOT_SIZE % wgpu::COPY_BUFFER_ALIGNMENT, 0);
    }
}
