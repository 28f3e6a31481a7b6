//! # Viewer Configuration
//!
//! Plain settings structs with the viewer's defaults. Nothing here reads files;
//! callers build a [`ViewerConfig`] and override what they need.
//!
//! ```
//! use deltaviewer::config::ViewerConfig;
//!
//! let mut config = ViewerConfig::default();
//! config.camera.fov = 60.0;
//! assert_eq!(config.window_size, (1280, 960));
//! ```

use std::path::PathBuf;

use cgmath::{Point3, Vector3};

/// Frame-level rendering settings
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    pub clear_color: [f32; 4],
    pub light_position: Vector3<f32>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            clear_color: [0.1, 0.1, 0.2, 1.0],
            light_position: Vector3::new(2.0, 2.0, 2.0),
        }
    }
}

/// Fly-camera settings; angles in degrees
#[derive(Debug, Clone, PartialEq)]
pub struct CameraConfig {
    pub movement_speed: f32,
    pub sensitivity: f32,
    pub fov: f32,
    pub near_plane: f32,
    pub far_plane: f32,
    pub start_position: Point3<f32>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            movement_speed: 2.5,
            sensitivity: 0.1,
            fov: 45.0,
            near_plane: 0.1,
            far_plane: 100.0,
            start_position: Point3::new(0.0, 0.0, 7.5),
        }
    }
}

/// Geometry arena capacities in bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeometryConfig {
    pub vertex_capacity: u64,
    pub index_capacity: u64,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            vertex_capacity: 32 * 1024 * 1024,
            index_capacity: 32 * 1024 * 1024,
        }
    }
}

/// Shader source locations. Each program is a vertex/fragment file pair.
#[derive(Debug, Clone, PartialEq)]
pub struct PathConfig {
    pub mesh_vertex_shader: PathBuf,
    pub mesh_fragment_shader: PathBuf,
    pub plane_vertex_shader: PathBuf,
    pub plane_fragment_shader: PathBuf,
}

impl PathConfig {
    /// Paths of the bundled shaders under `root`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        let shaders = root.into().join("shaders");
        Self {
            mesh_vertex_shader: shaders.join("mesh.vert.wgsl"),
            mesh_fragment_shader: shaders.join("mesh.frag.wgsl"),
            plane_vertex_shader: shaders.join("plane.vert.wgsl"),
            plane_fragment_shader: shaders.join("plane.frag.wgsl"),
        }
    }
}

impl Default for PathConfig {
    fn default() -> Self {
        Self::with_root("assets")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewerConfig {
    pub render: RenderConfig,
    pub camera: CameraConfig,
    pub geometry: GeometryConfig,
    pub paths: PathConfig,
    pub window_size: (u32, u32),
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            render: RenderConfig::default(),
            camera: CameraConfig::default(),
            geometry: GeometryConfig::default(),
            paths: PathConfig::default(),
            window_size: (1280, 960),
        }
    }
}

impl ViewerConfig {
    pub fn aspect_ratio(&self) -> f32 {
        let (width, height) = self.window_size;
        width as f32 / height.max(1) as f32
    }
}
