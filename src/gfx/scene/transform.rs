use std::cell::Cell;

use cgmath::{Deg, InnerSpace, Matrix4, Quaternion, SquareMatrix, Vector3, Vector4};

/// Position, Euler rotation and scale of an entity.
///
/// Rotation is in degrees and applied X, then Y, then Z in the local frame:
/// `model = T * Rx * Ry * Rz * S`. The matrix is rebuilt lazily after a
/// setter runs.
#[derive(Debug, Clone)]
pub struct Transform {
    position: Vector3<f32>,
    rotation: Vector3<f32>,
    scale: Vector3<f32>,
    cached: Cell<Option<Matrix4<f32>>>,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vector3::new(0.0, 0.0, 0.0),
            rotation: Vector3::new(0.0, 0.0, 0.0),
            scale: Vector3::new(1.0, 1.0, 1.0),
            cached: Cell::new(None),
        }
    }
}

impl PartialEq for Transform {
    fn eq(&self, other: &Self) -> bool {
        self.position == other.position
            && self.rotation == other.rotation
            && self.scale == other.scale
    }
}

impl Transform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_position(position: Vector3<f32>) -> Self {
        let mut transform = Self::default();
        transform.set_position(position);
        transform
    }

    pub fn with_rotation(mut self, rotation: Vector3<f32>) -> Self {
        self.set_rotation(rotation);
        self
    }

    pub fn with_scale(mut self, scale: Vector3<f32>) -> Self {
        self.set_scale(scale);
        self
    }

    pub fn position(&self) -> Vector3<f32> {
        self.position
    }

    /// Euler angles in degrees
    pub fn rotation(&self) -> Vector3<f32> {
        self.rotation
    }

    pub fn scale(&self) -> Vector3<f32> {
        self.scale
    }

    pub fn set_position(&mut self, position: Vector3<f32>) {
        self.position = position;
        self.cached.set(None);
    }

    pub fn set_rotation(&mut self, rotation: Vector3<f32>) {
        self.rotation = rotation;
        self.cached.set(None);
    }

    pub fn set_scale(&mut self, scale: Vector3<f32>) {
        self.scale = scale;
        self.cached.set(None);
    }

    pub fn model_matrix(&self) -> Matrix4<f32> {
        if let Some(matrix) = self.cached.get() {
            return matrix;
        }

        let matrix = Matrix4::from_translation(self.position)
            * Matrix4::from_angle_x(Deg(self.rotation.x))
            * Matrix4::from_angle_y(Deg(self.rotation.y))
            * Matrix4::from_angle_z(Deg(self.rotation.z))
            * Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z);
        self.cached.set(Some(matrix));
        matrix
    }
}

/// Scale of the quad drawn for each clipping plane
pub const CLIP_PLANE_VISUAL_SCALE: f32 = 5.0;

/// Model matrix placing a +Z-facing quad on a clipping plane.
///
/// `plane` is `(normal.xyz, distance)`; the quad is centered at
/// `-normal * distance`, rotated so +Z maps onto the normal, and scaled by
/// [`CLIP_PLANE_VISUAL_SCALE`].
pub fn clip_plane_transform(plane: Vector4<f32>) -> Matrix4<f32> {
    let normal = plane.truncate();
    let position = -normal * plane.w;

    let rotation = if normal.magnitude2() > f32::EPSILON {
        Matrix4::from(Quaternion::from_arc(
            Vector3::unit_z(),
            normal.normalize(),
            Some(Vector3::unit_x()),
        ))
    } else {
        Matrix4::identity()
    };

    Matrix4::from_translation(position) * rotation * Matrix4::from_scale(CLIP_PLANE_VISUAL_SCALE)
}
