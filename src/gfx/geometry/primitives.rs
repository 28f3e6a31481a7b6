//! # Primitive Shape Generation
//!
//! Procedural shapes used by the clip-plane visualizer, the default scene and
//! tests. All shapes are generated with outward normals and texture
//! coordinates in `[0, 1]`.

use super::GeometryData;

/// Unit quad in the XY plane, centered at the origin, facing +Z.
///
/// Four vertices and two triangles. This is the quad drawn for each clipping
/// plane.
pub fn generate_quad() -> GeometryData {
    generate_plane(1.0, 1.0, 1, 1)
}

/// Generate a unit cube centered at the origin
///
/// Vertices span -0.5 to 0.5 on all axes. Each face has its own four vertices
/// so normals stay flat.
#[rustfmt::skip]
pub fn generate_cube() -> GeometryData {
    let positions = [
        // +Z
        [-0.5, -0.5,  0.5], [ 0.5, -0.5,  0.5], [ 0.5,  0.5,  0.5], [-0.5,  0.5,  0.5],
        // -Z
        [-0.5, -0.5, -0.5], [-0.5,  0.5, -0.5], [ 0.5,  0.5, -0.5], [ 0.5, -0.5, -0.5],
        // -X
        [-0.5, -0.5, -0.5], [-0.5, -0.5,  0.5], [-0.5,  0.5,  0.5], [-0.5,  0.5, -0.5],
        // +X
        [ 0.5, -0.5,  0.5], [ 0.5, -0.5, -0.5], [ 0.5,  0.5, -0.5], [ 0.5,  0.5,  0.5],
        // +Y
        [-0.5,  0.5,  0.5], [ 0.5,  0.5,  0.5], [ 0.5,  0.5, -0.5], [-0.5,  0.5, -0.5],
        // -Y
        [-0.5, -0.5, -0.5], [ 0.5, -0.5, -0.5], [ 0.5, -0.5,  0.5], [-0.5, -0.5,  0.5],
    ];
    let face_normals = [
        [0.0, 0.0, 1.0],
        [0.0, 0.0, -1.0],
        [-1.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, -1.0, 0.0],
    ];
    let corner_uvs = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];

    let mut data = GeometryData::new();
    data.vertices = positions.to_vec();
    for normal in face_normals {
        for uv in corner_uvs {
            data.normals.push(normal);
            data.tex_coords.push(uv);
        }
    }
    for face in 0..6u32 {
        let base = face * 4;
        data.indices
            .extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
    }
    data
}

/// Generate a plane in the XY plane facing +Z
///
/// # Arguments
/// * `width` - size along X
/// * `height` - size along Y
/// * `width_segments` / `height_segments` - subdivisions, at least 1
pub fn generate_plane(
    width: f32,
    height: f32,
    width_segments: u32,
    height_segments: u32,
) -> GeometryData {
    let mut data = GeometryData::new();

    let w_segs = width_segments.max(1);
    let h_segs = height_segments.max(1);

    for y in 0..=h_segs {
        let v = y as f32 / h_segs as f32;
        let pos_y = (v - 0.5) * height;

        for x in 0..=w_segs {
            let u = x as f32 / w_segs as f32;
            let pos_x = (u - 0.5) * width;

            data.vertices.push([pos_x, pos_y, 0.0]);
            data.normals.push([0.0, 0.0, 1.0]);
            data.tex_coords.push([u, v]);
        }
    }

    // Counter-clockwise seen from +Z
    for y in 0..h_segs {
        for x in 0..w_segs {
            let i = y * (w_segs + 1) + x;
            let next_row = i + w_segs + 1;

            data.indices.extend_from_slice(&[i, i + 1, next_row + 1]);
            data.indices.extend_from_slice(&[next_row + 1, next_row, i]);
        }
    }

    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quad_generation() {
        let quad = generate_quad();
        assert_eq!(quad.vertex_count(), 4);
        assert_eq!(quad.indices.len(), 6);
        assert!(quad.normals.iter().all(|n| *n == [0.0, 0.0, 1.0]));
        assert!(quad
            .vertices
            .iter()
            .all(|p| p[0].abs() == 0.5 && p[1].abs() == 0.5));
    }

    #[test]
    fn test_cube_generation() {
        let cube = generate_cube();
        assert_eq!(cube.vertices.len(), 24);
        assert_eq!(cube.indices.len(), 36);
        assert_eq!(cube.triangle_count(), 12);
        assert!(cube.indices.iter().all(|&i| i < 24));
    }

    #[test]
    fn test_plane_generation() {
        let plane = generate_plane(2.0, 2.0, 2, 2);
        assert_eq!(plane.vertices.len(), 9);
        assert_eq!(plane.indices.len(), 24);
    }

    #[test]
    fn test_to_vertices_interleaves_attributes() {
        let (vertices, indices) = generate_quad().to_vertices();
        assert_eq!(vertices.len(), 4);
        assert_eq!(indices, vec![0, 1, 3, 3, 2, 0]);
        assert_eq!(vertices[3].tex_coords, [1.0, 1.0]);
        assert_eq!(vertices[3].position, [0.5, 0.5, 0.0]);
    }
}
