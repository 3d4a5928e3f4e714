//! Rendering system for the voxel engine.
//!
//! Rendering is split along the [`device::RenderDevice`] trait. The visibility
//! scheduler and the frame timer ring decide *what* to issue each frame and
//! talk only to the trait; [`gpu_device::GpuRenderDevice`] implements it on
//! wgpu. The split keeps the per-frame ordering rules testable without a GPU.
//!
//! # Frame Order
//!
//! 1. Upload the camera uniform and acquire the surface texture
//! 2. Begin the frame timer, reading the oldest finished frame time
//! 3. For each distance band: an occlusion pass over the band's bounding
//!    boxes, then a draw pass of the band's chunks gated on those queries
//! 4. End the frame timer, submit and present

pub mod bind_group_state;
pub mod device;
pub mod gpu_device;
pub mod meshing;
pub mod occlusion_state;
pub mod pipeline_manager;
pub mod query_manager;
pub mod raw_query_manager;
pub mod texture;
pub mod vertex;
pub mod visibility_scheduler;

// Re-export commonly used types
pub use gpu_device::GpuRenderDevice;
pub use query_manager::QueryManager;
pub use visibility_scheduler::{FrameStats, FrameView, VisibilityScheduler};
