//! Shared fixtures for the unit tests: the bundled shaders written into a
//! temporary directory, ready to be compiled against a `RecordingDevice`.

use std::path::PathBuf;

use tempfile::TempDir;

pub const MESH_VS: &str = include_str!("../../assets/shaders/mesh.vert.wgsl");
pub const MESH_FS: &str = include_str!("../../assets/shaders/mesh.frag.wgsl");
pub const PLANE_VS: &str = include_str!("../../assets/shaders/plane.vert.wgsl");
pub const PLANE_FS: &str = include_str!("../../assets/shaders/plane.frag.wgsl");

/// Temporary directory holding shader sources
pub struct ShaderDir {
    dir: TempDir,
}

impl ShaderDir {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    /// Writes a vertex/fragment pair named `name` and returns both paths.
    pub fn write(&self, name: &str, vertex: &str, fragment: &str) -> (PathBuf, PathBuf) {
        let vs = self.dir.path().join(format!("{name}.vert.wgsl"));
        let fs = self.dir.path().join(format!("{name}.frag.wgsl"));
        std::fs::write(&vs, vertex).unwrap();
        std::fs::write(&fs, fragment).unwrap();
        (vs, fs)
    }

    pub fn mesh(&self, name: &str) -> (PathBuf, PathBuf) {
        self.write(name, MESH_VS, MESH_FS)
    }

    pub fn plane(&self, name: &str) -> (PathBuf, PathBuf) {
        self.write(name, PLANE_VS, PLANE_FS)
    }

    pub fn path(&self) -> &std::path::Path {
        self.dir.path()
    }
}
