use cgmath::{Matrix4, Point3, SquareMatrix};

/// Anything the frame renderer can take view data from
pub trait Camera {
    fn view_matrix(&self) -> Matrix4<f32>;

    fn projection_matrix(&self) -> Matrix4<f32>;

    fn position(&self) -> Point3<f32>;
}

/// GPU layout of the `CameraData` uniform block.
///
/// ```text
/// struct CameraData {
///     view: mat4x4<f32>,
///     projection: mat4x4<f32>,
///     view_pos: vec3<f32>,
///     _pad: f32,
/// }
/// ```
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable, Debug, PartialEq)]
pub struct CameraUniform {
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    /// Eye position; padded to 16 bytes
    pub view_pos: [f32; 3],
    pub _pad: f32,
}

impl CameraUniform {
    pub const SIZE: u64 = std::mem::size_of::<CameraUniform>() as u64;

    pub fn from_camera(camera: &dyn Camera) -> Self {
        let position = camera.position();
        Self {
            view: convert_matrix4_to_array(camera.view_matrix()),
            projection: convert_matrix4_to_array(camera.projection_matrix()),
            view_pos: [position.x, position.y, position.z],
            _pad: 0.0,
        }
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self {
            view: convert_matrix4_to_array(Matrix4::identity()),
            projection: convert_matrix4_to_array(Matrix4::identity()),
            view_pos: [0.0; 3],
            _pad: 0.0,
        }
    }
}

pub fn convert_matrix4_to_array(matrix4: Matrix4<f32>) -> [[f32; 4]; 4] {
    matrix4.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_uniform_is_144_bytes() {
        assert_eq!(CameraUniform::SIZE, 144);
    }

    #[test]
    fn test_matrix_conversion_is_column_major() {
        let m = Matrix4::from_translation(cgmath::vec3(1.0, 2.0, 3.0));
        let array = convert_matrix4_to_array(m);
        assert_eq!(array[3], [1.0, 2.0, 3.0, 1.0]);
    }
}
