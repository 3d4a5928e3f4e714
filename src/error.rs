//! # Error Types
//!
//! Errors raised while bootstrapping or running the engine.
//!
//! `RenderError` covers everything that goes wrong inside the rendering device
//! (adapter, device, surface, shaders, GPU resources, frame submission).
//! `EngineError` is the top-level error returned by [`crate::run`] and wraps
//! configuration and windowing failures as well.

use std::path::PathBuf;

/// Failures reported by the rendering device.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// No adapter compatible with the window surface was found.
    #[error("no suitable GPU adapter: {0}")]
    Adapter(String),

    /// The adapter refused to create a logical device.
    #[error("failed to create GPU device: {0}")]
    DeviceRequest(String),

    /// The window surface could not be created, configured or acquired.
    #[error("surface error: {0}")]
    Surface(String),

    /// A WGSL module or the pipeline built from it failed validation.
    #[error("shader `{name}` failed to compile: {message}")]
    ShaderCompilation {
        /// Name of the shader file.
        name: String,
        /// Diagnostic reported by the device.
        message: String,
    },

    /// A shader source file could not be read.
    #[error("failed to read shader {path}: {source}")]
    ShaderSource {
        /// Path of the shader file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A GPU buffer or query set could not be allocated.
    #[error("GPU resource allocation failed: {0}")]
    Allocation(String),

    /// A named buffer was looked up before it was registered.
    #[error("buffer `{0}` is not registered")]
    UnknownBuffer(&'static str),

    /// A buffer write would run past the end of the buffer.
    #[error("write of {size} bytes at offset {offset} overflows buffer `{name}`")]
    BufferOverflow {
        /// Name of the buffer.
        name: &'static str,
        /// Byte offset of the write.
        offset: u64,
        /// Length of the write in bytes.
        size: u64,
    },

    /// The device reported an error while executing a frame.
    #[error("device error during frame: {0}")]
    Device(String),

    /// Mapping a query readback buffer failed.
    #[error("query readback failed: {0}")]
    QueryReadback(String),
}

/// Top-level errors. Every variant is fatal for the run.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The configuration file could not be read.
    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        /// Path that was requested.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON for [`crate::config::EngineConfig`].
    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// The configuration parsed but holds values the engine cannot run with.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// The event loop or the window could not be created.
    #[error("window error: {0}")]
    Window(String),

    /// A rendering device failure.
    #[error(transparent)]
    Render(#[from] RenderError),
}
