//! Fixed settings for the demo scene.

use std::path::Path;

use geometry::Extent;
use graphics::{DiagnosticPolicy, GraphicsConfig};

pub const WINDOW_TITLE: &str = "CG2";

pub const WINDOW_WIDTH: u32 = 1280;
pub const WINDOW_HEIGHT: u32 = 720;

pub const LOG_DIRECTORY: &str = "logs";
pub const LOG_FILE_PREFIX: &str = "sandbox.log";

/// Compiler warnings fail the build, same as errors.
pub const SHADER_DIAGNOSTICS: DiagnosticPolicy = DiagnosticPolicy::Deny;

pub fn window_size() -> Extent<u32> {
    Extent::new(WINDOW_WIDTH, WINDOW_HEIGHT)
}

pub fn shader_dir() -> &'static Path {
    Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/resources/hlsl"))
}

pub fn checker_texture() -> &'static Path {
    Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/resources/uvChecker.png"))
}

pub fn graphics() -> GraphicsConfig {
    GraphicsConfig::default()
}
