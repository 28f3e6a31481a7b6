use std::fmt;

use cgmath::{InnerSpace, Vector3, Vector4};

use crate::{
    config::{CameraConfig, RenderConfig},
    gfx::{
        camera::FlyCamera, error::SceneError, geometry::GeometryHandle,
        resources::SharedMaterial,
    },
};

use super::transform::Transform;

/// Most clipping planes a scene can hold; matches the shader array size
pub const MAX_CLIP_PLANES: usize = 8;

/// Stable identity of an entity inside one scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(u32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity {}", self.0)
    }
}

/// Something drawable placed in the scene. Entities missing either geometry
/// or material are kept but never drawn.
#[derive(Debug, Clone)]
pub struct Entity {
    id: EntityId,
    pub transform: Transform,
    pub geometry: Option<GeometryHandle>,
    pub material: Option<SharedMaterial>,
}

impl Entity {
    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn is_drawable(&self) -> bool {
        self.geometry.is_some() && self.material.is_some()
    }
}

/// Camera, entities, light and clipping planes of one viewer session
#[derive(Debug)]
pub struct SceneGraph {
    camera: FlyCamera,
    entities: Vec<Entity>,
    next_entity: u32,
    light_position: Vector3<f32>,
    /// `(normal.xyz, distance)`; points with `dot(n, p) + d < 0` are clipped
    clip_planes: Vec<Vector4<f32>>,
}

impl SceneGraph {
    pub fn new(camera: &CameraConfig, render: &RenderConfig, aspect: f32) -> Self {
        Self {
            camera: FlyCamera::new(camera, aspect),
            entities: Vec::new(),
            next_entity: 0,
            light_position: render.light_position,
            clip_planes: Vec::new(),
        }
    }

    pub fn camera(&self) -> &FlyCamera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut FlyCamera {
        &mut self.camera
    }

    pub fn add_entity(
        &mut self,
        geometry: Option<GeometryHandle>,
        material: Option<SharedMaterial>,
        transform: Transform,
    ) -> EntityId {
        let id = EntityId(self.next_entity);
        self.next_entity += 1;
        self.entities.push(Entity {
            id,
            transform,
            geometry,
            material,
        });
        id
    }

    /// Removes an entity, keeping the order of the others
    pub fn remove_entity(&mut self, id: EntityId) -> Option<Entity> {
        let index = self.entities.iter().position(|e| e.id == id)?;
        Some(self.entities.remove(index))
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id == id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|e| e.id == id)
    }

    /// Entities in insertion order
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn clear_entities(&mut self) {
        self.entities.clear();
    }

    pub fn light_position(&self) -> Vector3<f32> {
        self.light_position
    }

    pub fn set_light_position(&mut self, position: Vector3<f32>) {
        self.light_position = position;
    }

    pub fn clip_planes(&self) -> &[Vector4<f32>] {
        &self.clip_planes
    }

    /// Appends a plane and returns its index.
    pub fn add_clip_plane(&mut self, plane: Vector4<f32>) -> Result<usize, SceneError> {
        if self.clip_planes.len() >= MAX_CLIP_PLANES {
            return Err(SceneError::ClipPlaneLimit {
                limit: MAX_CLIP_PLANES,
            });
        }
        self.clip_planes.push(plane);
        Ok(self.clip_planes.len() - 1)
    }

    pub fn set_clip_plane(&mut self, index: usize, plane: Vector4<f32>) -> bool {
        match self.clip_planes.get_mut(index) {
            Some(slot) => {
                *slot = plane;
                true
            }
            None => false,
        }
    }

    pub fn remove_clip_plane(&mut self, index: usize) -> Option<Vector4<f32>> {
        (index < self.clip_planes.len()).then(|| self.clip_planes.remove(index))
    }

    /// Rescales a plane's normal to unit length. Near-zero normals are left
    /// untouched. The distance component is not changed.
    pub fn normalize_clip_plane(&mut self, index: usize) -> bool {
        let Some(plane) = self.clip_planes.get_mut(index) else {
            return false;
        };
        let normal = plane.truncate();
        if normal.magnitude() <= 1e-4 {
            return false;
        }
        *plane = normal.normalize().extend(plane.w);
        true
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new(
            &CameraConfig::default(),
            &RenderConfig::default(),
            crate::config::ViewerConfig::default().aspect_ratio(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ninth_clip_plane_is_rejected() {
        let mut scene = SceneGraph::default();
        for i in 0..MAX_CLIP_PLANES {
            assert_eq!(scene.add_clip_plane(Vector4::new(0.0, 1.0, 0.0, i as f32)), Ok(i));
        }

        let err = scene.add_clip_plane(Vector4::new(1.0, 0.0, 0.0, 0.0));
        assert_eq!(err, Err(SceneError::ClipPlaneLimit { limit: 8 }));
        assert_eq!(scene.clip_planes().len(), 8);
        assert_eq!(scene.clip_planes()[7].w, 7.0);
    }

    #[test]
    fn test_removing_a_plane_frees_a_slot() {
        let mut scene = SceneGraph::default();
        for _ in 0..MAX_CLIP_PLANES {
            scene.add_clip_plane(Vector4::unit_y()).unwrap();
        }
        assert_eq!(scene.remove_clip_plane(3), Some(Vector4::unit_y()));
        assert_eq!(scene.remove_clip_plane(42), None);
        assert!(scene.add_clip_plane(Vector4::unit_x()).is_ok());
    }

    #[test]
    fn test_normalize_clip_plane() {
        let mut scene = SceneGraph::default();
        scene.add_clip_plane(Vector4::new(0.0, 3.0, 4.0, 2.0)).unwrap();
        scene.add_clip_plane(Vector4::new(0.0, 0.0, 0.0, 1.0)).unwrap();

        assert!(scene.normalize_clip_plane(0));
        let plane = scene.clip_planes()[0];
        assert!((plane - Vector4::new(0.0, 0.6, 0.8, 2.0)).magnitude() < 1e-6);

        assert!(!scene.normalize_clip_plane(1));
        assert!(!scene.normalize_clip_plane(5));
    }

    #[test]
    fn test_entities_keep_order_after_removal() {
        let mut scene = SceneGraph::default();
        let a = scene.add_entity(None, None, Transform::new());
        let b = scene.add_entity(Some(GeometryHandle::INVALID), None, Transform::new());
        let c = scene.add_entity(None, None, Transform::new());

        let removed = scene.remove_entity(b).unwrap();
        assert_eq!(removed.id(), b);
        assert!(!removed.is_drawable());

        let ids: Vec<_> = scene.entities().iter().map(Entity::id).collect();
        assert_eq!(ids, vec![a, c]);
        assert!(scene.remove_entity(b).is_none());

        // Ids are never reused
        let d = scene.add_entity(None, None, Transform::new());
        assert_ne!(d, b);
    }

    #[test]
    fn test_light_defaults_from_config() {
        let scene = SceneGraph::default();
        assert_eq!(scene.light_position(), Vector3::new(2.0, 2.0, 2.0));
    }
}
