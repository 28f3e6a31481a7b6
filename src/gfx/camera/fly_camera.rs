use cgmath::{perspective, Deg, InnerSpace, Matrix4, Point3, Vector3};

use super::camera_utils::Camera;
use crate::config::CameraConfig;

/// Remaps clip-space depth from OpenGL's `[-1, 1]` to wgpu's `[0, 1]`:
/// `z' = 0.5 z + 0.5 w`. Arguments are column by column.
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: cgmath::Matrix4<f32> = cgmath::Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

const PITCH_LIMIT: f32 = 89.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraMovement {
    Forward,
    Backward,
    Left,
    Right,
    Up,
    Down,
}

/// First-person camera driven by keyboard movement and mouse look.
///
/// Yaw and pitch are in degrees; yaw -90 looks down -Z.
#[derive(Debug, Clone)]
pub struct FlyCamera {
    pub position: Point3<f32>,
    front: Vector3<f32>,
    up: Vector3<f32>,
    right: Vector3<f32>,
    world_up: Vector3<f32>,
    yaw: f32,
    pitch: f32,
    pub movement_speed: f32,
    pub mouse_sensitivity: f32,
    fov: f32,
    aspect: f32,
    near: f32,
    far: f32,
}

impl FlyCamera {
    pub fn new(config: &CameraConfig, aspect: f32) -> Self {
        let mut camera = Self {
            position: config.start_position,
            front: -Vector3::unit_z(),
            up: Vector3::unit_y(),
            right: Vector3::unit_x(),
            world_up: Vector3::unit_y(),
            yaw: -90.0,
            pitch: 0.0,
            movement_speed: config.movement_speed,
            mouse_sensitivity: config.sensitivity,
            fov: config.fov,
            aspect,
            near: config.near_plane,
            far: config.far_plane,
        };
        camera.update_vectors();
        camera
    }

    pub fn front(&self) -> Vector3<f32> {
        self.front
    }

    pub fn right(&self) -> Vector3<f32> {
        self.right
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn fov(&self) -> f32 {
        self.fov
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn set_aspect_ratio(&mut self, width: f32, height: f32) {
        if height > 0.0 {
            self.aspect = width / height;
        }
    }

    pub fn process_keyboard(&mut self, direction: CameraMovement, delta_time: f32) {
        let velocity = self.movement_speed * delta_time;
        match direction {
            CameraMovement::Forward => self.position += self.front * velocity,
            CameraMovement::Backward => self.position -= self.front * velocity,
            CameraMovement::Left => self.position -= self.right * velocity,
            CameraMovement::Right => self.position += self.right * velocity,
            CameraMovement::Up => self.position += self.world_up * velocity,
            CameraMovement::Down => self.position -= self.world_up * velocity,
        }
    }

    pub fn process_mouse_movement(&mut self, x_offset: f32, y_offset: f32, constrain_pitch: bool) {
        self.yaw += x_offset * self.mouse_sensitivity;
        self.pitch += y_offset * self.mouse_sensitivity;

        if constrain_pitch {
            self.pitch = self.pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT);
        }

        self.update_vectors();
    }

    fn update_vectors(&mut self) {
        let (yaw, pitch) = (self.yaw.to_radians(), self.pitch.to_radians());
        self.front = Vector3::new(yaw.cos() * pitch.cos(), pitch.sin(), yaw.sin() * pitch.cos())
            .normalize();
        self.right = self.front.cross(self.world_up).normalize();
        self.up = self.right.cross(self.front).normalize();
    }
}

impl Camera for FlyCamera {
    fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.position, self.position + self.front, self.up)
    }

    fn projection_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * perspective(Deg(self.fov), self.aspect, self.near, self.far)
    }

    fn position(&self) -> Point3<f32> {
        self.position
    }
}

impl Default for FlyCamera {
    fn default() -> Self {
        Self::new(&CameraConfig::default(), 1280.0 / 960.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::camera::CameraUniform;
    use cgmath::{Transform, Vector4};

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn test_default_camera_looks_down_negative_z() {
        let camera = FlyCamera::default();
        assert!(close(camera.front().z, -1.0));
        assert_eq!(camera.position, Point3::new(0.0, 0.0, 7.5));
    }

    #[test]
    fn test_pitch_is_clamped() {
        let mut camera = FlyCamera::default();
        camera.process_mouse_movement(0.0, 10_000.0, true);
        assert_eq!(camera.pitch(), 89.0);

        camera.process_mouse_movement(0.0, -100_000.0, true);
        assert_eq!(camera.pitch(), -89.0);

        camera.process_mouse_movement(0.0, -100.0, false);
        assert!(camera.pitch() < -89.0);
    }

    #[test]
    fn test_keyboard_moves_along_front_and_right() {
        let mut camera = FlyCamera::default();
        camera.process_keyboard(CameraMovement::Forward, 1.0);
        assert!(close(camera.position.z, 5.0));

        camera.process_keyboard(CameraMovement::Right, 2.0);
        assert!(close(camera.position.x, 5.0));

        camera.process_keyboard(CameraMovement::Up, 0.4);
        assert!(close(camera.position.y, 1.0));
    }

    #[test]
    fn test_view_matrix_maps_eye_to_origin() {
        let camera = FlyCamera::default();
        let eye = camera.view_matrix().transform_point(camera.position);
        assert!(close(eye.x, 0.0) && close(eye.y, 0.0) && close(eye.z, 0.0));
    }

    #[test]
    fn test_projection_maps_near_plane_to_zero_depth() {
        let camera = FlyCamera::default();
        let clip = camera.projection_matrix() * cgmath::vec4(0.0, 0.0, -0.1, 1.0);
        assert!(close(clip.z / clip.w, 0.0));
    }

    #[test]
    fn test_uploaded_matrices_map_depth_to_unit_range() {
        let camera = FlyCamera::default();
        let uniform = CameraUniform::from_camera(&camera);
        let view_projection = Matrix4::from(uniform.projection) * Matrix4::from(uniform.view);
        let clip = |z: f32| view_projection * Vector4::new(0.0, 0.0, z, 1.0);

        // Camera sits at z = 7.5 looking down -Z; near 0.1, far 100
        let near = clip(7.4);
        assert!((near.z / near.w).abs() < 1e-4);

        let far = clip(7.5 - 100.0);
        assert!((far.z / far.w - 1.0).abs() < 1e-4);

        // w is the view-space distance
        let origin = clip(0.0);
        assert!(close(origin.w, 7.5));
        assert!(origin.z / origin.w > 0.0 && origin.z / origin.w < 1.0);

        assert_eq!(uniform.view_pos, [0.0, 0.0, 7.5]);
    }
}
