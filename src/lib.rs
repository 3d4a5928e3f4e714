#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::invalid_rust_codeblocks)]

//! # Voxel Occlusion
//!
//! A static voxel world rendered with two-pass hardware occlusion culling,
//! built with Rust and WGPU.
//!
//! ## Key Modules
//!
//! * `application_state` - Window, input and the event loop lifecycle
//! * `config` - JSON configuration
//! * `engine_state` - Chunks, camera, the visibility scheduler and the renderer
//! * `error` - Error types
//!
//! ## Architecture
//!
//! A scalar field is sampled once at startup into a grid of chunks, each with
//! an exposed-face mesh and a bounding box. Every frame the chunks are sorted
//! front to back and split into distance bands. For each band, bounding boxes
//! are first rasterised inside occlusion queries against the depth of nearer
//! bands, then chunk meshes are drawn only where their query saw samples.
//! GPU frame time is measured with a ring of timer queries read a few frames
//! late, so the CPU never waits for the current frame.
//!
//! ## Usage
//!
//! ```no_run
//! fn main() {
//!     if let Err(err) = voxel_occlusion::run() {
//!         log::error!("{err}");
//!         std::process::exit(1);
//!     }
//! }
//! ```

use std::path::PathBuf;

use application_state::ApplicationState;
use config::EngineConfig;
use error::EngineError;
use log::{info, LevelFilter};
use winit::event_loop::EventLoop;

mod application_state;
pub mod config;
mod engine_state;
pub mod error;

/// Runs the application until the window closes.
///
/// The first command-line argument, if any, is the path of a JSON
/// configuration file.
///
/// # Returns
/// `Ok` after a normal exit, or the error that stopped the application
pub fn run() -> Result<(), EngineError> {
    env_logger::Builder::new()
        .target(env_logger::Target::Stdout)
        .filter_level(LevelFilter::Info)
        .parse_env("RUST_LOG")
        .init();

    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = EngineConfig::load(config_path.as_deref())?;
    info!("Logger initialized");

    let event_loop = EventLoop::new().map_err(|err| EngineError::Window(err.to_string()))?;
    let mut state = ApplicationState::new(config);
    event_loop
        .run_app(&mut state)
        .map_err(|err| EngineError::Window(err.to_string()))?;

    match state.fatal_error.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
