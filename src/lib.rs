//! Deltaviewer
//!
//! Rendering and resource-management core of a 3D model viewer built on wgpu.

pub mod config;
pub mod gfx;
pub mod logging;
pub mod prelude;
pub mod viewer;
pub mod wgpu_utils;

// Re-export main types for convenience
pub use viewer::{FrameInput, Viewer};
