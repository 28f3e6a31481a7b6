pub mod camera_utils;
pub mod fly_camera;

// Re-export main types
pub use camera_utils::{convert_matrix4_to_array, Camera, CameraUniform};
pub use fly_camera::{CameraMovement, FlyCamera, OPENGL_TO_WGPU_MATRIX};
