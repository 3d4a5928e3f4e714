//! # Graphics Resources Builder
//!
//! Creates the window and the WebGPU context the engine renders with.
//!
//! Adapter and device requests are asynchronous in wgpu; they are driven to
//! completion with `pollster` on the event loop thread, inside `resumed`.

use std::sync::Arc;

use log::info;
use wgpu::{Device, Features, Queue, Surface, SurfaceConfiguration};
use winit::{dpi::PhysicalSize, event_loop::ActiveEventLoop, window::Window};

use crate::{
    config::RenderingConfig,
    error::{EngineError, RenderError},
};

/// Title shown until the first frame time is known.
pub const WINDOW_TITLE: &str = "voxel occlusion";

/// The window and the GPU context bound to it.
pub struct Graphics {
    /// The application window
    pub window: Arc<Window>,
    /// Surface of the window, configured with `surface_config`
    pub surface: Surface<'static>,
    /// Current surface configuration
    pub surface_config: SurfaceConfiguration,
    /// The logical device
    pub device: Device,
    /// The device's queue
    pub queue: Queue,
}

/// Features requested from the adapter.
///
/// Timestamp queries are only requested when the crate is built with
/// `wgpu_timestamp_query` and the adapter offers them.
fn required_features(adapter_features: Features) -> Features {
    #[allow(unused_mut)]
    let mut required_features = Features::empty();

    #[cfg(feature = "wgpu_timestamp_query")]
    {
        if adapter_features.contains(Features::TIMESTAMP_QUERY) {
            required_features |= Features::TIMESTAMP_QUERY;
        } else {
            log::warn!("adapter does not support timestamp queries");
        }
    }
    #[cfg(not(feature = "wgpu_timestamp_query"))]
    let _ = adapter_features;

    required_features
}

/// Creates the window, the surface and the device.
///
/// # Arguments
/// * `event_loop` - The active event loop used to create the window
/// * `rendering` - Initial window size
///
/// # Returns
/// The graphics context with the surface configured, or the first failure
pub fn create_graphics(
    event_loop: &ActiveEventLoop,
    rendering: &RenderingConfig,
) -> Result<Graphics, EngineError> {
    let window_attrs = Window::default_attributes()
        .with_title(WINDOW_TITLE)
        .with_inner_size(PhysicalSize::new(
            rendering.window_width,
            rendering.window_height,
        ));
    let window = Arc::new(
        event_loop
            .create_window(window_attrs)
            .map_err(|err| EngineError::Window(err.to_string()))?,
    );

    // Backends::PRIMARY => Vulkan + Metal + DX12 + Browser WebGPU
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::PRIMARY,
        flags: wgpu::InstanceFlags::empty(),
        backend_options: wgpu::BackendOptions::from_env_or_default(),
    });

    let surface = instance
        .create_surface(window.clone())
        .map_err(|err| RenderError::Surface(err.to_string()))?;

    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::default(),
        compatible_surface: Some(&surface),
        force_fallback_adapter: false,
    }))
    .map_err(|err| RenderError::Adapter(err.to_string()))?;

    let adapter_info = adapter.get_info();
    info!("using {} ({:?})", adapter_info.name, adapter_info.backend);

    let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("voxel occlusion device"),
        required_features: required_features(adapter.features()),
        required_limits: wgpu::Limits::default(),
        memory_hints: wgpu::MemoryHints::MemoryUsage,
        trace: wgpu::Trace::Off,
    }))
    .map_err(|err| RenderError::DeviceRequest(err.to_string()))?;

    let size = window.inner_size();
    let surface_caps = surface.get_capabilities(&adapter);
    let Some(&first_format) = surface_caps.formats.first() else {
        return Err(RenderError::Surface(String::from("surface reports no formats")).into());
    };
    let surface_format = surface_caps
        .formats
        .iter()
        .find(|f| f.is_srgb())
        .copied()
        .unwrap_or(first_format);

    let surface_config = wgpu::SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        format: surface_format,
        width: size.width.max(1),
        height: size.height.max(1),
        present_mode: surface_caps
            .present_modes
            .first()
            .copied()
            .unwrap_or(wgpu::PresentMode::Fifo),
        alpha_mode: surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto),
        view_formats: vec![],
        desired_maximum_frame_latency: 2,
    };
    surface.configure(&device, &surface_config);

    Ok(Graphics {
        window,
        surface,
        surface_config,
        device,
        queue,
    })
}
