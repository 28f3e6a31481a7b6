//! Frame orchestration
//!
//! ```text
//! Idle --begin_scene--> SceneBound --end_scene--> Idle
//!                          |  ^
//!                          submit
//! ```
//!
//! `begin_scene` uploads the camera block and turns every drawable entity
//! into a [`RenderCommand`]. `end_scene` sorts by shader, then draws opaque
//! commands with depth writes on and transparent ones with depth writes off.

use std::rc::Rc;

use cgmath::{Matrix4, Vector3, Vector4, Zero};

use super::render_queue::{RenderCommand, RenderQueue};
use crate::gfx::{
    camera::CameraUniform,
    device::{BufferDescriptor, BufferId, BufferUsage, RenderDevice},
    error::DeviceError,
    geometry::{GeometryArena, GeometryHandle},
    resources::{ShaderId, SharedMaterial, CAMERA_BLOCK_BINDING},
    scene::SceneGraph,
};

/// Uniform names the renderer sets on every shader it switches to
pub const LIGHT_POSITION_UNIFORM: &str = "light_pos";
pub const CLIP_PLANE_COUNT_UNIFORM: &str = "clip_plane_count";
pub const CLIP_PLANES_UNIFORM: &str = "clip_planes";
pub const MODEL_UNIFORM: &str = "model";

/// Counters for the last finished frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub draw_calls: u32,
    pub program_binds: u32,
    pub material_binds: u32,
    pub opaque: u32,
    pub transparent: u32,
    /// Commands dropped for an invalid geometry handle or shader
    pub skipped: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameState {
    Idle,
    SceneBound,
}

/// Values every shader receives once per switch
#[derive(Debug, Clone, PartialEq)]
struct FrameGlobals {
    light_position: Vector3<f32>,
    clip_planes: Vec<Vector4<f32>>,
}

impl FrameGlobals {
    fn empty() -> Self {
        Self {
            light_position: Vector3::zero(),
            clip_planes: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub struct FrameRenderer {
    camera_buffer: BufferId,
    queue: RenderQueue,
    state: FrameState,
    globals: FrameGlobals,
    stats: FrameStats,
}

impl FrameRenderer {
    /// Enables depth testing and blending and creates the camera uniform
    /// buffer on binding 0.
    pub fn new(device: &mut dyn RenderDevice) -> Result<Self, DeviceError> {
        device.set_depth_test(true);
        device.set_blend(true);

        let camera_buffer = device.create_buffer(&BufferDescriptor {
            label: "camera uniform",
            size: CameraUniform::SIZE,
            usage: BufferUsage::Uniform,
        })?;
        device.bind_uniform_buffer(CAMERA_BLOCK_BINDING, camera_buffer);

        log::info!("Frame renderer initialized");

        Ok(Self {
            camera_buffer,
            queue: RenderQueue::new(),
            state: FrameState::Idle,
            globals: FrameGlobals::empty(),
            stats: FrameStats::default(),
        })
    }

    pub fn set_clear_color(&self, device: &mut dyn RenderDevice, color: [f32; 4]) {
        device.set_clear_color(color);
    }

    pub fn clear(&self, device: &mut dyn RenderDevice) {
        device.clear();
    }

    pub fn camera_buffer(&self) -> BufferId {
        self.camera_buffer
    }

    pub fn is_scene_bound(&self) -> bool {
        self.state == FrameState::SceneBound
    }

    /// Commands queued so far this frame
    pub fn queued(&self) -> &[RenderCommand] {
        self.queue.commands()
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Snapshots the scene for this frame.
    pub fn begin_scene(&mut self, device: &mut dyn RenderDevice, scene: &SceneGraph) {
        if self.state == FrameState::SceneBound {
            log::warn!("begin_scene called twice; discarding the unfinished frame");
        }

        let camera = CameraUniform::from_camera(scene.camera());
        if let Err(e) = device.write_buffer(self.camera_buffer, 0, bytemuck::bytes_of(&camera)) {
            log::error!("Camera upload failed: {}", e);
        }

        self.globals = FrameGlobals {
            light_position: scene.light_position(),
            clip_planes: scene.clip_planes().to_vec(),
        };

        self.queue.clear();
        for entity in scene.entities() {
            if let (Some(geometry), Some(material)) = (entity.geometry, &entity.material) {
                self.queue.push(RenderCommand::new(
                    geometry,
                    Rc::clone(material),
                    entity.transform.model_matrix(),
                ));
            }
        }

        self.state = FrameState::SceneBound;
    }

    /// Queues an extra draw for the current frame.
    pub fn submit(&mut self, geometry: GeometryHandle, material: SharedMaterial, model: Matrix4<f32>) {
        if self.state != FrameState::SceneBound {
            log::warn!("submit called outside begin_scene/end_scene; ignored");
            return;
        }
        self.queue.push(RenderCommand::new(geometry, material, model));
    }

    /// Sorts, partitions and draws everything queued since `begin_scene`.
    pub fn end_scene(&mut self, device: &mut dyn RenderDevice, arena: &GeometryArena) {
        if self.state != FrameState::SceneBound {
            log::warn!("end_scene called without begin_scene");
            return;
        }
        self.state = FrameState::Idle;

        let commands = self.queue.take_partitioned();
        let mut stats = FrameStats {
            opaque: commands.opaque.len() as u32,
            transparent: commands.transparent.len() as u32,
            ..FrameStats::default()
        };

        let Some(vertex_array) = arena.vertex_array() else {
            log::error!("Geometry arena is shut down; dropping the frame");
            stats.skipped = stats.opaque + stats.transparent;
            self.stats = stats;
            return;
        };
        device.bind_vertex_array(vertex_array);

        device.set_depth_write(true);
        draw_pass(device, &commands.opaque, &self.globals, &mut stats);

        device.set_depth_write(false);
        draw_pass(device, &commands.transparent, &self.globals, &mut stats);

        device.set_depth_write(true);

        log::debug!("Frame: {:?}", stats);
        self.stats = stats;
    }

    /// Releases the camera buffer.
    pub fn shutdown(self, device: &mut dyn RenderDevice) {
        device.destroy_buffer(self.camera_buffer);
    }
}

/// Draws one pass of already sorted commands.
///
/// The program is switched only when the shader changes, and each switch
/// re-sends the frame globals. A material is re-applied only when it differs
/// from the previous draw's.
fn draw_pass(
    device: &mut dyn RenderDevice,
    commands: &[RenderCommand],
    globals: &FrameGlobals,
    stats: &mut FrameStats,
) {
    let mut current_shader: Option<ShaderId> = None;
    let mut current_material: Option<&SharedMaterial> = None;

    for command in commands {
        if !command.geometry.is_valid() {
            stats.skipped += 1;
            continue;
        }

        let material = command.material.borrow();
        let shader = material.shader();
        if !shader.is_valid() {
            stats.skipped += 1;
            continue;
        }

        if current_shader != Some(shader.id()) {
            shader.use_program(device);
            shader.set_uniform_vec3(device, LIGHT_POSITION_UNIFORM, globals.light_position);
            shader.set_uniform_int(
                device,
                CLIP_PLANE_COUNT_UNIFORM,
                globals.clip_planes.len() as i32,
            );
            shader.set_uniform_vec4_array(device, CLIP_PLANES_UNIFORM, &globals.clip_planes);

            current_shader = Some(shader.id());
            current_material = None;
            stats.program_binds += 1;
        }

        if !current_material.is_some_and(|m| Rc::ptr_eq(m, &command.material)) {
            material.apply(device);
            current_material = Some(&command.material);
            stats.material_binds += 1;
        }

        shader.set_uniform_mat4(device, MODEL_UNIFORM, command.model);
        command.geometry.draw_geometry(device);
        stats.draw_calls += 1;
    }
}
