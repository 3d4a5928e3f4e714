//! # Voxel Occlusion Entry Point
//!
//! Runs the application and turns a fatal error into exit status 1.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release -- [config.json]
//! ```

fn main() {
    if let Err(err) = voxel_occlusion::run() {
        log::error!("{err}");
        std::process::exit(1);
    }
}
