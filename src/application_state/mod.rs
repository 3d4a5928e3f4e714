//! # Application State Management
//!
//! This module handles the application's lifecycle:
//! - Window and graphics initialization on `resumed`
//! - Input handling
//! - Frame pacing and rendering
//! - Teardown when the event loop exits
//!
//! Any initialization or frame error is fatal. It is stored in
//! [`ApplicationState::fatal_error`] and the event loop exits, so [`crate::run`]
//! can return it after teardown.

pub mod graphics_resources_builder;
pub mod input_manager;
pub mod input_state;

use std::sync::Arc;

use graphics_resources_builder::{create_graphics, Graphics};
use input_manager::InputManager;
use winit::{
    application::ApplicationHandler,
    event::{DeviceEvent, DeviceId, ElementState, KeyEvent, WindowEvent},
    event_loop::ActiveEventLoop,
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use crate::{
    config::EngineConfig,
    engine_state::{on_off, EngineState},
    error::EngineError,
};

/// The application as seen by the winit event loop.
pub struct ApplicationState {
    /// Configuration the engine is built from
    pub config: EngineConfig,
    /// The running application, once graphics and world are ready
    pub state: Option<InitializedApplicationState>,
    /// The error that stopped the application, if any
    pub fatal_error: Option<EngineError>,
}

/// The fully initialized and running application.
pub struct InitializedApplicationState {
    /// The core engine state and logic
    pub engine_state: EngineState,
    /// Handle to the application window
    pub window: Arc<Window>,
    /// Manages input state and event processing
    pub input_manager: InputManager,
    /// Timestamp of the last frame for delta time calculations
    pub last_wait_time: web_time::Instant,
    /// Title currently shown on the window
    title: String,
}

impl ApplicationState {
    /// Creates the application for `config`. Nothing is initialized until the
    /// event loop resumes it.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            state: None,
            fatal_error: None,
        }
    }

    /// Builds the window, the GPU context and the engine.
    fn initialize_application_state(
        &self,
        event_loop: &ActiveEventLoop,
    ) -> Result<InitializedApplicationState, EngineError> {
        let Graphics {
            window,
            surface,
            surface_config,
            device,
            queue,
        } = create_graphics(event_loop, &self.config.rendering)?;

        let engine_state = EngineState::new(surface, surface_config, device, queue, &self.config)?;

        Ok(InitializedApplicationState {
            engine_state,
            window,
            input_manager: InputManager::new(),
            last_wait_time: web_time::Instant::now(),
            title: String::from(graphics_resources_builder::WINDOW_TITLE),
        })
    }

    /// Records a fatal error and stops the event loop.
    fn fail(&mut self, event_loop: &ActiveEventLoop, err: EngineError) {
        self.fatal_error = Some(err);
        event_loop.exit();
    }
}

impl InitializedApplicationState {
    /// Shows the latest frame time and the culling state in the title bar.
    fn update_title(&mut self) {
        let culling = on_off(self.engine_state.occlusion_culling());
        let title = match self.engine_state.last_frame_ms() {
            Some(ms) => format!("{ms:.3} ms/frame, culling {culling}"),
            None => format!("culling {culling}"),
        };
        if title != self.title {
            self.window.set_title(&title);
            self.title = title;
        }
    }
}

impl ApplicationHandler for ApplicationState {
    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(state) = &mut self.state else {
            if let WindowEvent::CloseRequested = event {
                event_loop.exit();
            }
            return;
        };

        state.input_manager.intake_input(&event);

        match event {
            WindowEvent::Resized(size) => {
                state.engine_state.resize_surface(size);
            }
            WindowEvent::Focused(false) => {
                state.input_manager.release_all();
            }
            WindowEvent::RedrawRequested => match state.engine_state.render() {
                Ok(Some(_)) => state.update_title(),
                Ok(None) => {}
                Err(err) => self.fail(event_loop, err.into()),
            },
            WindowEvent::CloseRequested
            | WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        state: ElementState::Pressed,
                        physical_key: PhysicalKey::Code(KeyCode::Escape),
                        ..
                    },
                ..
            } => event_loop.exit(),
            _ => (),
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: DeviceId,
        event: DeviceEvent,
    ) {
        if let Some(state) = &mut self.state {
            if let DeviceEvent::MouseMotion { delta } = event {
                state.input_manager.intake_mouse_motion(delta);
            }
        }
    }

    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() || self.fatal_error.is_some() {
            return;
        }
        match self.initialize_application_state(event_loop) {
            Ok(state) => self.state = Some(state),
            Err(err) => self.fail(event_loop, err),
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = &mut self.state {
            let now = web_time::Instant::now();
            let wait_dt = now - state.last_wait_time;

            let processed_input = state.input_manager.get_and_reset_processed_input();
            state.engine_state.set_input_commands(processed_input);
            state.engine_state.process_input(wait_dt);

            state.last_wait_time = now;
            state.window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = self.state.take() {
            state.engine_state.shutdown();
        }
    }
}
