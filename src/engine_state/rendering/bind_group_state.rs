//! Manages WebGPU bind groups and their layouts.
//!
//! Two bind groups are used by the renderer:
//!
//! - the camera group, holding the view-projection uniform read by the chunk
//!   and query shaders
//! - the visibility group, binding the resolved occlusion results and the
//!   indirect draw arguments for the compute pass that turns one into the
//!   other

use std::collections::HashMap;

use wgpu::{BindGroup, BindGroupLayout, Device};

use crate::{
    engine_state::{buffer_state::BufferState, camera_state::CAMERA_BUFFER_NAME},
    error::RenderError,
};

use super::occlusion_state::{DRAW_ARGS_BUFFER, OCCLUSION_RESOLVE_BUFFER};

/// Name of the camera bind group
pub const CAMERA_BIND_GROUP: &str = "camera_bind_group";
/// Name of the camera bind group layout
pub const CAMERA_BIND_GROUP_LAYOUT: &str = "camera_bind_group_layout";
/// Name of the visibility bind group
pub const VISIBILITY_BIND_GROUP: &str = "visibility_bind_group";
/// Name of the visibility bind group layout
pub const VISIBILITY_BIND_GROUP_LAYOUT: &str = "visibility_bind_group_layout";

/// Named bind groups and layouts.
///
/// Every group is created once in [`BindGroupState::new`]; the buffers they
/// reference live for the whole run.
pub struct BindGroupState {
    /// Map of bind group names to their WebGPU bind group objects
    bind_groups: HashMap<&'static str, BindGroup>,
    /// Map of bind group layout names to their WebGPU bind group layout objects
    bind_group_layouts: HashMap<&'static str, BindGroupLayout>,
}

impl BindGroupState {
    /// Creates the camera and visibility bind groups.
    ///
    /// # Arguments
    /// * `device` - The WebGPU device
    /// * `buffer_state` - Registry holding the camera and occlusion buffers
    ///
    /// # Returns
    /// The bind groups, or an error if a referenced buffer is not registered
    pub fn new(device: &Device, buffer_state: &BufferState) -> Result<Self, RenderError> {
        let mut bind_groups = HashMap::new();
        let mut bind_group_layouts = HashMap::new();

        let (camera_bind_group, camera_bind_group_layout) =
            Self::generate_camera_bindgroups(device, buffer_state)?;
        bind_groups.insert(CAMERA_BIND_GROUP, camera_bind_group);
        bind_group_layouts.insert(CAMERA_BIND_GROUP_LAYOUT, camera_bind_group_layout);

        let (visibility_bind_group, visibility_bind_group_layout) =
            Self::generate_visibility_bindgroups(device, buffer_state)?;
        bind_groups.insert(VISIBILITY_BIND_GROUP, visibility_bind_group);
        bind_group_layouts.insert(VISIBILITY_BIND_GROUP_LAYOUT, visibility_bind_group_layout);

        Ok(Self {
            bind_groups,
            bind_group_layouts,
        })
    }

    /// Retrieves a bind group by name.
    pub fn get_bind_group(&self, name: &'static str) -> Option<&BindGroup> {
        self.bind_groups.get(name)
    }

    /// Retrieves a bind group layout by name.
    pub fn get_bind_group_layout(&self, name: &'static str) -> Option<&BindGroupLayout> {
        self.bind_group_layouts.get(name)
    }

    /// Creates the bind group for the camera uniform.
    fn generate_camera_bindgroups(
        device: &Device,
        buffer_state: &BufferState,
    ) -> Result<(BindGroup, BindGroupLayout), RenderError> {
        let camera_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
                label: Some(CAMERA_BIND_GROUP_LAYOUT),
            });

        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &camera_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer_state.get_entire_binding(CAMERA_BUFFER_NAME)?,
            }],
            label: Some(CAMERA_BIND_GROUP),
        });

        Ok((camera_bind_group, camera_bind_group_layout))
    }

    /// Creates the bind group read and written by the visibility compute pass.
    ///
    /// Binding 0 is the resolved occlusion results (read only), binding 1 the
    /// indirect draw arguments (read-write).
    fn generate_visibility_bindgroups(
        device: &Device,
        buffer_state: &BufferState,
    ) -> Result<(BindGroup, BindGroupLayout), RenderError> {
        let storage_entry = |binding, read_only| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let visibility_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                entries: &[storage_entry(0, true), storage_entry(1, false)],
                label: Some(VISIBILITY_BIND_GROUP_LAYOUT),
            });

        let visibility_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &visibility_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer_state.get_entire_binding(OCCLUSION_RESOLVE_BUFFER)?,
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: buffer_state.get_entire_binding(DRAW_ARGS_BUFFER)?,
                },
            ],
            label: Some(VISIBILITY_BIND_GROUP),
        });

        Ok((visibility_bind_group, visibility_bind_group_layout))
    }
}
