//! Translucent quads showing where the clipping planes are

use cgmath::Vector4;

use super::frame_renderer::FrameRenderer;
use crate::{
    config::PathConfig,
    gfx::{
        device::RenderDevice,
        geometry::{generate_plane, GeometryArena, GeometryHandle},
        resources::{Material, ResourceCache, SharedMaterial},
        scene::{clip_plane_transform, SceneGraph},
    },
};

pub const PLANE_SHADER: &str = "plane";
pub const PLANE_COLOR: [f32; 4] = [0.8, 0.8, 0.8, 0.1];

#[derive(Debug)]
pub struct ClipPlaneVisualizer {
    geometry: GeometryHandle,
    material: SharedMaterial,
}

impl ClipPlaneVisualizer {
    /// Uploads a 2x2 quad and builds the transparent plane material.
    pub fn new(
        device: &mut dyn RenderDevice,
        arena: &mut GeometryArena,
        cache: &mut ResourceCache,
        paths: &PathConfig,
    ) -> Self {
        let (vertices, indices) = generate_plane(2.0, 2.0, 1, 1).to_vertices();
        let geometry = arena.upload(device, &vertices, &indices);

        let shader = cache.load_shader(
            device,
            PLANE_SHADER,
            &paths.plane_vertex_shader,
            &paths.plane_fragment_shader,
        );
        let mut material = Material::new(shader);
        material.set_vec4("color", Vector4::from(PLANE_COLOR));
        material.set_transparent(true);

        Self {
            geometry,
            material: material.shared(),
        }
    }

    pub fn material(&self) -> &SharedMaterial {
        &self.material
    }

    /// Queues one quad per clipping plane of `scene`. Call between
    /// `begin_scene` and `end_scene`.
    pub fn submit(&self, renderer: &mut FrameRenderer, scene: &SceneGraph) {
        for plane in scene.clip_planes() {
            renderer.submit(
                self.geometry,
                self.material.clone(),
                clip_plane_transform(*plane),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::{
        device::RecordingDevice,
        test_support::{PLANE_FS, PLANE_VS},
    };

    #[test]
    fn test_one_transparent_quad_per_plane() {
        let root = tempfile::tempdir().unwrap();
        let shaders = root.path().join("shaders");
        std::fs::create_dir(&shaders).unwrap();
        std::fs::write(shaders.join("plane.vert.wgsl"), PLANE_VS).unwrap();
        std::fs::write(shaders.join("plane.frag.wgsl"), PLANE_FS).unwrap();
        let paths = PathConfig::with_root(root.path());

        let mut device = RecordingDevice::new();
        let mut arena = GeometryArena::new(&mut device, 1 << 16, 1 << 16).unwrap();
        let mut cache = ResourceCache::new();
        let mut renderer = FrameRenderer::new(&mut device).unwrap();
        let visualizer = ClipPlaneVisualizer::new(&mut device, &mut arena, &mut cache, &paths);

        let mut scene = SceneGraph::default();
        scene.add_clip_plane(Vector4::new(0.0, 1.0, 0.0, 0.0)).unwrap();
        scene.add_clip_plane(Vector4::new(1.0, 0.0, 0.0, 1.0)).unwrap();

        renderer.begin_scene(&mut device, &scene);
        visualizer.submit(&mut renderer, &scene);
        renderer.end_scene(&mut device, &arena);

        let draws = device.draws();
        assert_eq!(draws.len(), 2);
        assert!(draws.iter().all(|d| !d.depth_write && d.index_count == 6));
        assert_eq!(draws[1].model, Some(clip_plane_transform(scene.clip_planes()[1])));
        assert!(cache.get_shader(PLANE_SHADER).unwrap().is_valid());
    }
}
