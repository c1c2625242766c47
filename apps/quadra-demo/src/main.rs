//! Quadra demo
//!
//! Draws one white quad at the origin while the camera slowly rotates.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p quadra-demo
//! ```
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Set log level (e.g., info, debug, trace)

mod app;

use quadra_app::{run_app, AppConfig, RendererCapabilities};

use crate::app::Demo;

const WIDTH: u32 = 1280;
const HEIGHT: u32 = 720;
const MAX_INDICES: u32 = 9996;

fn main() -> anyhow::Result<()> {
    run_app::<Demo>(
        AppConfig::new("Quadra Demo")
            .with_size(WIDTH, HEIGHT)
            .with_capabilities(RendererCapabilities::new(MAX_INDICES)),
    )
}
