//! # Vertex Format
//!
//! The single vertex format stored in the geometry arena.

use std::mem;

use crate::gfx::device::{AttributeFormat, VertexAttribute, VertexLayout};

/// A mesh vertex with position, normal and texture coordinates.
///
/// # Memory Layout
///
/// `#[repr(C)]`, 32 bytes, tightly packed. Attribute locations are fixed:
///
/// | location | field        | format      |
/// |----------|--------------|-------------|
/// | 0        | `position`   | `Float32x3` |
/// | 1        | `normal`     | `Float32x3` |
/// | 2        | `tex_coords` | `Float32x2` |
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coords: [f32; 2],
}

impl Vertex {
    pub const SIZE: u64 = mem::size_of::<Vertex>() as u64;

    pub fn new(position: [f32; 3], normal: [f32; 3], tex_coords: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            tex_coords,
        }
    }

    /// Attribute layout bound once on the arena's vertex array.
    pub fn layout() -> VertexLayout {
        VertexLayout {
            stride: Self::SIZE,
            attributes: vec![
                VertexAttribute {
                    location: 0,
                    format: AttributeFormat::Float32x3,
                    offset: 0,
                },
                VertexAttribute {
                    location: 1,
                    format: AttributeFormat::Float32x3,
                    offset: mem::size_of::<[f32; 3]>() as u64,
                },
                VertexAttribute {
                    location: 2,
                    format: AttributeFormat::Float32x2,
                    offset: mem::size_of::<[f32; 6]>() as u64,
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_is_32_bytes() {
        assert_eq!(Vertex::SIZE, 32);
        let layout = Vertex::layout();
        assert_eq!(layout.stride, 32);
        assert_eq!(layout.attributes[2].offset, 24);
    }
}
