//! # Geometry
//!
//! GPU-resident mesh storage and procedural shapes.
//!
//! - [`GeometryArena`] - one shared buffer holding every mesh, bump-allocated
//! - [`GeometryHandle`] - base vertex / index range of one uploaded mesh
//! - [`Vertex`] - the interleaved vertex format stored in the arena
//! - [`generate_quad`], [`generate_cube`], [`generate_plane`] - primitives
//!
//! ## Usage
//!
//! ```no_run
//! use deltaviewer::gfx::device::RecordingDevice;
//! use deltaviewer::gfx::geometry::{generate_quad, GeometryArena};
//!
//! let mut device = RecordingDevice::new();
//! let mut arena = GeometryArena::new(&mut device, 1 << 20, 1 << 20).unwrap();
//!
//! let (vertices, indices) = generate_quad().to_vertices();
//! let handle = arena.upload(&mut device, &vertices, &indices);
//! assert!(handle.is_valid());
//! ```

pub mod arena;
pub mod mesh;
pub mod primitives;
pub mod vertex;

pub use arena::{ArenaStats, GeometryArena};
pub use mesh::GeometryHandle;
pub use primitives::*;
pub use vertex::Vertex;

/// Generated geometry in separate attribute streams
#[derive(Debug, Clone, Default)]
pub struct GeometryData {
    /// Vertex positions (x, y, z)
    pub vertices: Vec<[f32; 3]>,
    /// Texture coordinates (u, v)
    pub tex_coords: Vec<[f32; 2]>,
    /// Normal vectors (x, y, z)
    pub normals: Vec<[f32; 3]>,
    /// Triangle indices (counter-clockwise winding)
    pub indices: Vec<u32>,
}

impl GeometryData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Interleaves the streams into arena vertices.
    ///
    /// Missing normals default to +Z and missing texture coordinates to zero.
    pub fn to_vertices(&self) -> (Vec<Vertex>, Vec<u32>) {
        let vertices = self
            .vertices
            .iter()
            .enumerate()
            .map(|(i, position)| Vertex {
                position: *position,
                normal: self.normals.get(i).copied().unwrap_or([0.0, 0.0, 1.0]),
                tex_coords: self.tex_coords.get(i).copied().unwrap_or([0.0, 0.0]),
            })
            .collect();

        (vertices, self.indices.clone())
    }
}
