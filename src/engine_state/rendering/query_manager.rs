//! High-level GPU frame timing.
//!
//! Frame time is measured with a ring of `N` timer queries. Every frame one
//! query wraps all of the frame's GPU work, and the query issued `N - 1`
//! frames earlier is read back. That query has almost certainly finished, so
//! the readback rarely stalls the pipeline.
//!
//! Devices without timer support report no time; the ring keeps cycling and
//! [`QueryManager::begin_frame`] returns `None`, mirroring the fallback path of
//! the timestamp feature check.

use log::debug;

use crate::error::RenderError;

use super::device::{RenderDevice, TimerQueryId};

/// Slot bookkeeping of the timer ring, independent of any device.
///
/// Frames are numbered from zero. Slot `frame % N` is written during `frame`,
/// and at the start of `frame` the slot written at `frame - N + 1` is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerQueryRing {
    cursor: usize,
    frame: u64,
    issued_at: Vec<Option<u64>>,
}

impl TimerQueryRing {
    /// Creates a ring of `size` slots, none of them issued yet.
    pub fn new(size: usize) -> Self {
        Self {
            cursor: 0,
            frame: 0,
            issued_at: vec![None; size],
        }
    }

    /// Number of slots in the ring.
    pub fn len(&self) -> usize {
        self.issued_at.len()
    }

    /// Whether the ring has no slots.
    pub fn is_empty(&self) -> bool {
        self.issued_at.is_empty()
    }

    /// Slot written by the current frame.
    pub fn current_slot(&self) -> usize {
        self.cursor
    }

    /// Slot to read at the start of the current frame, or `None` while that
    /// slot has never been issued.
    pub fn readable_slot(&self) -> Option<usize> {
        if self.is_empty() {
            return None;
        }
        let slot = (self.cursor + 1) % self.len();
        self.issued_at(slot).map(|_| slot)
    }

    /// Frame number during which `slot` was last issued.
    pub fn issued_at(&self, slot: usize) -> Option<u64> {
        self.issued_at.get(slot).copied().flatten()
    }

    /// Marks the current slot as issued and moves to the next frame.
    pub fn advance(&mut self) {
        if self.is_empty() {
            return;
        }
        self.issued_at[self.cursor] = Some(self.frame);
        self.cursor = (self.cursor + 1) % self.len();
        self.frame += 1;
    }
}

/// Manages the frame timer queries on a rendering device.
#[derive(Debug)]
pub struct QueryManager {
    queries: Vec<TimerQueryId>,
    ring: TimerQueryRing,
}

impl QueryManager {
    /// Allocates `count` timer queries on `device`.
    ///
    /// # Arguments
    /// * `device` - Device owning the queries
    /// * `count` - Ring size; at least 2 so the read query differs from the
    ///   written one
    ///
    /// # Returns
    /// The manager, or the first allocation error after releasing the queries
    /// allocated before it
    pub fn new<D: RenderDevice>(device: &mut D, count: usize) -> Result<Self, RenderError> {
        let mut queries = Vec::with_capacity(count);
        for _ in 0..count {
            match device.create_timer_query() {
                Ok(query) => queries.push(query),
                Err(err) => {
                    for query in queries {
                        device.destroy_timer_query(query);
                    }
                    return Err(err);
                }
            }
        }

        Ok(Self {
            queries,
            ring: TimerQueryRing::new(count),
        })
    }

    /// Reads the oldest pending measurement and starts timing this frame.
    ///
    /// # Returns
    /// The GPU time in milliseconds of the frame issued `N - 1` frames ago, or
    /// `None` during the first frames or without timer support
    pub fn begin_frame<D: RenderDevice>(&mut self, device: &mut D) -> Result<Option<f64>, RenderError> {
        let mut milliseconds = None;
        if let Some(slot) = self.ring.readable_slot() {
            if let Some(nanoseconds) = device.timer_query_result(self.queries[slot])? {
                let ms = nanoseconds as f64 / 1e6;
                debug!("{ms:.3} ms/frame");
                milliseconds = Some(ms);
            }
        }

        if let Some(&query) = self.queries.get(self.ring.current_slot()) {
            device.begin_timer_query(query);
        }
        Ok(milliseconds)
    }

    /// Stops timing this frame and advances the ring.
    pub fn end_frame<D: RenderDevice>(&mut self, device: &mut D) {
        if let Some(&query) = self.queries.get(self.ring.current_slot()) {
            device.end_timer_query(query);
        }
        self.ring.advance();
    }

    /// Releases the timer queries.
    pub fn destroy<D: RenderDevice>(self, device: &mut D) {
        for query in self.queries {
            device.destroy_timer_query(query);
        }
    }
}
