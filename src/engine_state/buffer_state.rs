//! # Buffer State Module
//!
//! This module provides a registry for the long-lived GPU buffers of the
//! renderer: the camera uniform, the shared bounding-box index buffer, and the
//! buffers behind occlusion and timer queries.
//!
//! ## Architecture
//!
//! Buffers are referenced by name (static string). Each registered buffer
//! carries usage analytics (allocated bytes and number of writes) so the
//! memory footprint of the renderer can be logged.
//!
//! Per-chunk mesh buffers are not registered here: there are hundreds of
//! them, they are never written after upload, and they are owned by the
//! rendering device's mesh table.
//!
//! ## Performance Considerations
//!
//! * Writes go through `Queue::write_buffer`, which stages the data and copies
//!   it at the next submission, before any command of that submission runs
//! * Out-of-bounds writes are rejected on the CPU instead of surfacing as
//!   device validation errors later

use std::collections::HashMap;

use log::debug;
use wgpu::{util::DeviceExt, Buffer, Device, Queue};

use crate::error::RenderError;

/// Analytics data for a GPU buffer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferAnalytics {
    /// Total memory allocated for the buffer in bytes
    pub allocated_memory: u64,
    /// Number of times the buffer has been written to
    pub times_written: u64,
}

impl BufferAnalytics {
    /// Checks a write of `size` bytes at `offset` and records it.
    ///
    /// # Returns
    /// `false` if the write would overflow the buffer, in which case nothing is
    /// recorded
    fn record_write(&mut self, offset: u64, size: u64) -> bool {
        match offset.checked_add(size) {
            Some(end) if end <= self.allocated_memory => {
                self.times_written += 1;
                true
            }
            _ => false,
        }
    }
}

/// Central registry for named GPU buffers
///
/// # Examples
///
/// ```ignore
/// let mut buffer_state = BufferState::new();
///
/// buffer_state.create_buffer_init(
///     &device,
///     CAMERA_BUFFER,
///     &wgpu::util::BufferInitDescriptor {
///         label: Some("camera buffer"),
///         contents: bytemuck::cast_slice(&[camera_uniform]),
///         usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
///     },
/// );
///
/// buffer_state.write_buffer(&queue, CAMERA_BUFFER, 0, bytemuck::cast_slice(&[camera_uniform]))?;
/// ```
#[derive(Debug, Default)]
pub struct BufferState {
    /// Map of buffer names to buffer objects
    buffers: HashMap<&'static str, Buffer>,
    /// Analytics data for each buffer
    buffer_analytics: HashMap<&'static str, BufferAnalytics>,
}

impl BufferState {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an uninitialised buffer under `buffer_name`
    ///
    /// # Arguments
    ///
    /// * `device` - Device allocating the buffer
    /// * `buffer_name` - Unique name for the buffer
    /// * `buffer_descriptor` - Buffer configuration descriptor
    pub fn create_buffer(
        &mut self,
        device: &Device,
        buffer_name: &'static str,
        buffer_descriptor: &wgpu::BufferDescriptor,
    ) {
        let buffer = device.create_buffer(buffer_descriptor);
        self.insert(
            buffer_name,
            buffer,
            BufferAnalytics {
                allocated_memory: buffer_descriptor.size,
                ..BufferAnalytics::default()
            },
        );
    }

    /// Creates a buffer under `buffer_name` and fills it with data
    ///
    /// # Arguments
    ///
    /// * `device` - Device allocating the buffer
    /// * `buffer_name` - Unique name for the buffer
    /// * `init_descriptor` - Buffer initialization descriptor with data
    pub fn create_buffer_init(
        &mut self,
        device: &Device,
        buffer_name: &'static str,
        init_descriptor: &wgpu::util::BufferInitDescriptor,
    ) {
        let size = init_descriptor.contents.len() as u64;
        let buffer = device.create_buffer_init(init_descriptor);
        self.insert(
            buffer_name,
            buffer,
            BufferAnalytics {
                allocated_memory: size,
                times_written: 1,
            },
        );
    }

    fn insert(&mut self, buffer_name: &'static str, buffer: Buffer, analytics: BufferAnalytics) {
        debug!(
            "registered buffer `{}` ({} bytes)",
            buffer_name, analytics.allocated_memory
        );
        if let Some(previous) = self.buffers.insert(buffer_name, buffer) {
            previous.destroy();
        }
        self.buffer_analytics.insert(buffer_name, analytics);
    }

    /// Writes raw byte data to a buffer
    ///
    /// # Arguments
    ///
    /// * `queue` - Queue staging the write
    /// * `buffer_name` - Name of the buffer to write to
    /// * `offset` - Byte offset in the buffer to start writing
    /// * `data` - Raw byte data to write
    ///
    /// # Errors
    ///
    /// Fails if the buffer does not exist or if the write would exceed its
    /// bounds
    pub fn write_buffer(
        &mut self,
        queue: &Queue,
        buffer_name: &'static str,
        offset: wgpu::BufferAddress,
        data: &[u8],
    ) -> Result<(), RenderError> {
        let buffer = self
            .buffers
            .get(buffer_name)
            .ok_or(RenderError::UnknownBuffer(buffer_name))?;
        let analytics = self
            .buffer_analytics
            .get_mut(buffer_name)
            .ok_or(RenderError::UnknownBuffer(buffer_name))?;

        let size = data.len() as u64;
        if !analytics.record_write(offset, size) {
            return Err(RenderError::BufferOverflow {
                name: buffer_name,
                offset,
                size,
            });
        }

        queue.write_buffer(buffer, offset, data);
        Ok(())
    }

    /// Gets a reference to a buffer by name
    pub fn get_buffer(&self, buffer_name: &'static str) -> Result<&Buffer, RenderError> {
        self.buffers
            .get(buffer_name)
            .ok_or(RenderError::UnknownBuffer(buffer_name))
    }

    /// Gets a binding resource for the entire buffer
    pub fn get_entire_binding(
        &self,
        buffer_name: &'static str,
    ) -> Result<wgpu::BindingResource<'_>, RenderError> {
        Ok(self.get_buffer(buffer_name)?.as_entire_binding())
    }

    /// Gets the total allocated memory across all buffers
    pub fn get_total_allocated_memory(&self) -> u64 {
        self.buffer_analytics
            .values()
            .map(|analytics| analytics.allocated_memory)
            .sum()
    }

    /// Destroys every registered buffer
    pub fn destroy(&mut self) {
        let writes: u64 = self
            .buffer_analytics
            .values()
            .map(|analytics| analytics.times_written)
            .sum();
        debug!(
            "releasing {} buffers ({} bytes, {} writes)",
            self.buffers.len(),
            self.get_total_allocated_memory(),
            writes
        );
        for (_, buffer) in self.buffers.drain() {
            buffer.destroy();
        }
        self.buffer_analytics.clear();
    }
}
