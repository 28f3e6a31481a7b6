//! # Viewer
//!
//! Wires the rendering core together for one device: geometry arena, resource
//! cache, scene, frame renderer and the clipping-plane overlay. The viewer does
//! not own a window; whoever drives it feeds camera input through
//! [`Viewer::update`] and calls [`Viewer::render_frame`] once per frame.
//!
//! ```no_run
//! use deltaviewer::{config::ViewerConfig, gfx::device::RecordingDevice, Viewer};
//!
//! let mut viewer = Viewer::new(RecordingDevice::new(), ViewerConfig::default()).unwrap();
//! viewer.load_model("assets/models/teapot.obj").unwrap();
//! let stats = viewer.render_frame();
//! println!("{} draw calls", stats.draw_calls);
//! ```

use std::path::Path;

use cgmath::Vector4;

use crate::{
    config::ViewerConfig,
    gfx::{
        camera::CameraMovement,
        device::RenderDevice,
        error::{ModelError, ViewerError},
        geometry::{GeometryArena, GeometryData},
        rendering::{ClipPlaneVisualizer, FrameRenderer, FrameStats},
        resources::{Material, ResourceCache, SharedMaterial, SharedShader},
        scene::{EntityId, ModelLoader, SceneGraph, Transform},
    },
};

/// Cache name of the lit mesh shader
pub const MESH_SHADER: &str = "mesh";

/// Input gathered by the windowing layer for one frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameInput {
    pub movements: Vec<CameraMovement>,
    /// Mouse delta in pixels; positive y looks up
    pub mouse_delta: (f32, f32),
}

pub struct Viewer<D: RenderDevice> {
    config: ViewerConfig,
    device: D,
    arena: GeometryArena,
    cache: ResourceCache,
    scene: SceneGraph,
    renderer: FrameRenderer,
    clip_planes: ClipPlaneVisualizer,
    mesh_shader: SharedShader,
}

impl<D: RenderDevice> Viewer<D> {
    /// Creates the arena and renderer and compiles the bundled shaders.
    ///
    /// Shader compile failures are logged, not returned: the viewer starts
    /// with invalid programs that [`reload_shaders`](Self::reload_shaders)
    /// can fix.
    pub fn new(mut device: D, config: ViewerConfig) -> Result<Self, ViewerError> {
        let mut arena = GeometryArena::new(
            &mut device,
            config.geometry.vertex_capacity,
            config.geometry.index_capacity,
        )?;
        let renderer = FrameRenderer::new(&mut device)?;
        renderer.set_clear_color(&mut device, config.render.clear_color);

        let mut cache = ResourceCache::new();
        let mesh_shader = cache.load_shader(
            &mut device,
            MESH_SHADER,
            &config.paths.mesh_vertex_shader,
            &config.paths.mesh_fragment_shader,
        );
        let clip_planes = ClipPlaneVisualizer::new(&mut device, &mut arena, &mut cache, &config.paths);
        let scene = SceneGraph::new(&config.camera, &config.render, config.aspect_ratio());

        log::info!(
            "Viewer ready: {}x{}, arena {} + {} bytes",
            config.window_size.0,
            config.window_size.1,
            config.geometry.vertex_capacity,
            config.geometry.index_capacity
        );

        Ok(Self {
            config,
            device,
            arena,
            cache,
            scene,
            renderer,
            clip_planes,
            mesh_shader,
        })
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut SceneGraph {
        &mut self.scene
    }

    pub fn arena(&self) -> &GeometryArena {
        &self.arena
    }

    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    pub fn mesh_shader(&self) -> &SharedShader {
        &self.mesh_shader
    }

    pub fn last_frame(&self) -> FrameStats {
        self.renderer.stats()
    }

    /// Loads an OBJ model with the mesh shader and adds it at the origin.
    pub fn load_model(&mut self, path: impl AsRef<Path>) -> Result<Vec<EntityId>, ModelError> {
        let model = ModelLoader::load_obj(
            &mut self.device,
            &mut self.arena,
            &mut self.cache,
            path,
            &self.mesh_shader,
        )?;
        Ok(model.add_to_scene(&mut self.scene, Transform::new()))
    }

    /// Uploads generated geometry and adds it with a plain colored material.
    ///
    /// Returns `None` when the arena is full.
    pub fn add_shape(
        &mut self,
        shape: &GeometryData,
        color: Vector4<f32>,
        transform: Transform,
    ) -> Option<EntityId> {
        let (vertices, indices) = shape.to_vertices();
        let geometry = self.arena.upload(&mut self.device, &vertices, &indices);
        if !geometry.is_valid() {
            return None;
        }
        Some(
            self.scene
                .add_entity(Some(geometry), Some(self.solid_material(color)), transform),
        )
    }

    /// A new untextured material on the mesh shader
    pub fn solid_material(&self, color: Vector4<f32>) -> SharedMaterial {
        let mut material = Material::new(self.mesh_shader.clone());
        material.set_vec4("color", color);
        material.set_float("shininess", 32.0);
        material.set_bool("use_textures", false);
        material.set_transparent(color.w < 1.0);
        material.shared()
    }

    /// Applies one frame of camera input.
    pub fn update(&mut self, delta_time: f32, input: &FrameInput) {
        let camera = self.scene.camera_mut();
        for movement in &input.movements {
            camera.process_keyboard(*movement, delta_time);
        }
        let (dx, dy) = input.mouse_delta;
        if dx != 0.0 || dy != 0.0 {
            camera.process_mouse_movement(dx, dy, true);
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.window_size = (width, height);
        self.device.resize(width, height);
        self.scene
            .camera_mut()
            .set_aspect_ratio(width as f32, height as f32);
    }

    pub fn set_clear_color(&mut self, color: [f32; 4]) {
        self.config.render.clear_color = color;
        self.renderer.set_clear_color(&mut self.device, color);
    }

    /// Clears, draws the scene and the clipping-plane overlay, then frees
    /// resources whose last owner went away.
    pub fn render_frame(&mut self) -> FrameStats {
        self.renderer.clear(&mut self.device);
        self.renderer.begin_scene(&mut self.device, &self.scene);
        self.clip_planes.submit(&mut self.renderer, &self.scene);
        self.renderer.end_scene(&mut self.device, &self.arena);
        self.device.collect_released();
        self.renderer.stats()
    }

    /// Recompiles every cached shader from disk.
    pub fn reload_shaders(&mut self) -> usize {
        self.cache.reload_all_shaders(&mut self.device)
    }

    /// Drops everything the viewer owns on the device and hands it back.
    pub fn shutdown(mut self) -> D {
        self.scene.clear_entities();
        self.arena.shutdown(&mut self.device);
        self.renderer.shutdown(&mut self.device);
        drop(self.clip_planes);
        drop(self.mesh_shader);
        self.cache.clear(&mut self.device);
        self.device
    }
}
