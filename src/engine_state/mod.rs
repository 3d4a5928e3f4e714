//! # Engine State Module
//!
//! The coordinator tying the voxel world, the camera and the renderer
//! together.
//!
//! ## Key Components
//!
//! * `EngineState` - The main state container for the engine
//! * `buffer_state` - Named GPU buffer registry
//! * `camera_state` - Camera, projection and input controller
//! * `rendering` - Rendering device, visibility scheduler and frame timers
//! * `voxels` - Scalar field, chunks and the chunk store
//!
//! ## Architecture
//!
//! `EngineState` owns the rendering device and everything allocated on it.
//! The chunk store and the timer queries are released through the device at
//! [`EngineState::shutdown`], before the device itself.
//!
//! ## Performance Considerations
//!
//! * All chunks are generated before the first frame, so startup is slow and
//!   frames never wait on meshing
//! * Frames never block on occlusion results: draws wait on the GPU
//! * The only CPU wait is the frame timer readback, which targets a frame
//!   submitted `N - 1` frames earlier

use log::info;
use wgpu::{Device, Queue, Surface, SurfaceConfiguration};
use winit::{event::MouseButton, keyboard::KeyCode};

use camera_state::CameraState;
use rendering::{FrameStats, GpuRenderDevice, QueryManager, VisibilityScheduler};
use voxels::{scalar_field::PerlinField, world::ChunkStore};

use crate::{
    application_state::input_state::ProcessedInputState,
    config::EngineConfig,
    error::{EngineError, RenderError},
};

pub mod buffer_state;
pub mod camera_state;
pub mod rendering;
pub mod voxels;

/// The main state container for the voxel engine.
///
/// # Examples
///
/// ```ignore
/// let mut engine_state = EngineState::new(surface, surface_config, device, queue, &config)?;
///
/// // Main loop
/// loop {
///     engine_state.set_input_commands(input_manager.get_and_reset_processed_input());
///     engine_state.process_input(delta_time);
///     engine_state.render()?;
/// }
///
/// engine_state.shutdown();
/// ```
pub struct EngineState {
    /// Camera state managing position, orientation and movement
    pub camera_state: CameraState,
    /// Current player actions derived from input
    pub player_actions: PlayerAction,
    device: GpuRenderDevice,
    store: ChunkStore,
    scheduler: VisibilityScheduler,
    query_manager: QueryManager,
    /// Latest frame time read back from the timer ring
    last_frame_ms: Option<f64>,
}

impl EngineState {
    /// Creates the renderer and generates the world.
    ///
    /// # Arguments
    /// * `surface` - The configured window surface
    /// * `surface_config` - Configuration of the surface
    /// * `device` - The GPU device
    /// * `queue` - The GPU command queue
    /// * `config` - Engine configuration
    ///
    /// # Returns
    /// The engine, or the first initialisation error. Resources allocated
    /// before a failure are released.
    pub fn new(
        surface: Surface<'static>,
        surface_config: SurfaceConfiguration,
        device: Device,
        queue: Queue,
        config: &EngineConfig,
    ) -> Result<Self, EngineError> {
        let (width, height) = (surface_config.width, surface_config.height);

        // Validation bounds the chunk count by the query-set limit.
        let occlusion_capacity = u32::try_from(config.world.chunk_count()).map_err(|_| {
            EngineError::InvalidConfig(String::from("chunk count does not fit a query set"))
        })?;
        let mut device = GpuRenderDevice::new(
            surface,
            surface_config,
            device,
            queue,
            &config.rendering,
            occlusion_capacity,
        )?;

        let field = PerlinField::from_config(&config.world);
        let store = match ChunkStore::generate(&field, &config.world, &mut device) {
            Ok(store) => store,
            Err(err) => {
                device.destroy();
                return Err(err.into());
            }
        };

        let query_manager =
            match QueryManager::new(&mut device, config.rendering.timer_query_count as usize) {
                Ok(query_manager) => query_manager,
                Err(err) => {
                    store.destroy(&mut device);
                    device.destroy();
                    return Err(err.into());
                }
            };

        let scheduler = VisibilityScheduler::new(config.rendering.occlusion_culling);
        info!(
            "occlusion culling {}",
            on_off(scheduler.occlusion_culling())
        );

        Ok(Self {
            camera_state: CameraState::new(&config.camera, width, height),
            player_actions: PlayerAction::default(),
            device,
            store,
            scheduler,
            query_manager,
            last_frame_ms: None,
        })
    }

    /// Resizes the rendering surface when the window size changes.
    pub fn resize_surface(&mut self, size: winit::dpi::PhysicalSize<u32>) {
        if size.width == 0 || size.height == 0 {
            return;
        }
        self.device.resize(size.width, size.height);
        self.camera_state.resize(size.width, size.height);
    }

    /// Renders one frame.
    ///
    /// # Returns
    /// The frame's scheduling statistics, or `None` if the surface was not
    /// ready and the frame was skipped
    ///
    /// # Errors
    /// Any device error; the caller treats it as fatal
    pub fn render(&mut self) -> Result<Option<FrameStats>, RenderError> {
        self.device
            .write_camera_uniform(&self.camera_state.camera_uniform)?;
        if !self.device.begin_frame()? {
            return Ok(None);
        }

        if let Some(ms) = self.query_manager.begin_frame(&mut self.device)? {
            self.last_frame_ms = Some(ms);
        }
        let view = self.camera_state.frame_view();
        let stats = self
            .scheduler
            .render(&mut self.store, &view, &mut self.device);
        self.query_manager.end_frame(&mut self.device);

        self.device.end_frame()?;
        Ok(Some(stats))
    }

    /// Advances the camera by the current player actions.
    ///
    /// # Arguments
    /// * `wait_duration` - The time elapsed since the last call
    pub fn process_input(&mut self, wait_duration: web_time::Duration) {
        self.camera_state.intake_actions(&self.player_actions);
        self.camera_state.update(wait_duration);
    }

    /// Sets the player actions from this frame's input and applies toggles.
    pub fn set_input_commands(&mut self, input: ProcessedInputState) {
        self.player_actions = PlayerAction::from_input(&input);

        if self.player_actions.toggle_occlusion_culling {
            let enabled = self.scheduler.toggle_occlusion_culling();
            info!("occlusion culling {}", on_off(enabled));
        }
    }

    /// The most recent frame time in milliseconds, once one has been read.
    pub fn last_frame_ms(&self) -> Option<f64> {
        self.last_frame_ms
    }

    /// Whether occlusion culling is on.
    pub fn occlusion_culling(&self) -> bool {
        self.scheduler.occlusion_culling()
    }

    /// Releases the chunks, the timer queries and the device.
    pub fn shutdown(self) {
        let Self {
            mut device,
            store,
            query_manager,
            ..
        } = self;
        store.destroy(&mut device);
        query_manager.destroy(&mut device);
        device.destroy();
        info!("engine shut down");
    }
}

/// Formats a toggle state for logs and the window title.
pub fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}

/// Player actions derived from one frame of input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerAction {
    /// W held
    pub move_forward: bool,
    /// S held
    pub move_backward: bool,
    /// A held
    pub move_left: bool,
    /// D held
    pub move_right: bool,
    /// R held
    pub move_up: bool,
    /// F held
    pub move_down: bool,
    /// Q held
    pub roll_left: bool,
    /// E held
    pub roll_right: bool,

    /// Mouse motion in pixels, set only while the left button is held
    pub rotate_view: Option<(f64, f64)>,

    /// Set on the frame Space goes down
    pub toggle_occlusion_culling: bool,
}

impl PlayerAction {
    /// Translates processed input into actions.
    pub fn from_input(input: &ProcessedInputState) -> Self {
        let held = |key| input.get_key_state(key).is_active();

        let rotate_view = input
            .mouse_delta
            .filter(|_| input.get_mouse_button_state(MouseButton::Left).is_active());

        Self {
            move_forward: held(KeyCode::KeyW),
            move_backward: held(KeyCode::KeyS),
            move_left: held(KeyCode::KeyA),
            move_right: held(KeyCode::KeyD),
            move_up: held(KeyCode::KeyR),
            move_down: held(KeyCode::KeyF),
            roll_left: held(KeyCode::KeyQ),
            roll_right: held(KeyCode::KeyE),
            rotate_view,
            toggle_occlusion_culling: input.get_key_state(KeyCode::Space).is_just_pressed(),
        }
    }
}
