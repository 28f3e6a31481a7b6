//! # Deltaviewer Prelude
//!
//! The types most viewer code needs, in one import:
//!
//! ```rust
//! use deltaviewer::prelude::*;
//! ```

// Viewer and configuration
pub use crate::config::{CameraConfig, GeometryConfig, PathConfig, RenderConfig, ViewerConfig};
pub use crate::logging::{init_logging, LoggingConfig};
pub use crate::viewer::{FrameInput, Viewer};

// Device boundary
pub use crate::gfx::device::{RecordingDevice, RenderDevice, WgpuDevice};
pub use crate::gfx::error::{ModelError, SceneError, ShaderError, TextureError, ViewerError};

// Scene and resources
pub use crate::gfx::camera::{CameraMovement, FlyCamera};
pub use crate::gfx::geometry::{generate_cube, generate_plane, generate_quad, GeometryData};
pub use crate::gfx::rendering::FrameStats;
pub use crate::gfx::resources::{Material, ResourceCache, SharedMaterial, SharedShader, TextureKind};
pub use crate::gfx::scene::{EntityId, SceneGraph, Transform};

// Common math types
pub use cgmath::{InnerSpace, Vector3, Vector4};
