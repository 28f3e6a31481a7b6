//! # Graphics Module
//!
//! The rendering core of the viewer, organized bottom-up:
//!
//! - **Device** ([`device`]) - the [`RenderDevice`](device::RenderDevice) boundary
//!   with a wgpu backend and a recording backend for tests
//! - **Geometry** ([`geometry`]) - one bump-allocated arena holding every mesh
//! - **Resources** ([`resources`]) - hot-reloadable shaders, textures, materials
//!   and the cache that shares them
//! - **Scene** ([`scene`]) - camera, entities, light, clipping planes and OBJ loading
//! - **Rendering** ([`rendering`]) - the shader-sorted two-pass frame renderer
//! - **Camera** ([`camera`]) - fly camera and the `CameraData` uniform layout
//!
//! ## Usage
//!
//! Most callers go through [`Viewer`](crate::Viewer), which wires these together:
//!
//! ```no_run
//! use deltaviewer::{config::ViewerConfig, gfx::device::RecordingDevice, Viewer};
//!
//! let mut viewer = Viewer::new(RecordingDevice::new(), ViewerConfig::default()).unwrap();
//! viewer.render_frame();
//! ```

pub mod camera;
pub mod device;
pub mod error;
pub mod geometry;
pub mod rendering;
pub mod resources;
pub mod scene;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use camera::FlyCamera;
pub use device::RenderDevice;
pub use rendering::FrameRenderer;
