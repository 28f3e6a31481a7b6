//! Shader programs compiled from a vertex/fragment source pair.
//!
//! A [`ShaderProgram`] is shared through [`SharedShader`] and recompiled in
//! place on reload, so every material holding it picks up the new program
//! without re-fetching anything.

use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
    fmt, fs,
    path::{Path, PathBuf},
    rc::Rc,
    sync::atomic::{AtomicU32, Ordering},
};

use cgmath::{Matrix4, Vector3, Vector4};

use crate::gfx::{
    device::{GpuResource, ProgramId, ReleaseQueue, RenderDevice, UniformLocation, UniformValue},
    error::{ShaderError, ShaderStage},
};

/// Name of the camera uniform block and the binding it is attached to
pub const CAMERA_BLOCK: &str = "CameraData";
pub const CAMERA_BLOCK_BINDING: u32 = 0;

static NEXT_SHADER_ID: AtomicU32 = AtomicU32::new(1);

/// Process-unique shader identity.
///
/// Used as the renderer's sort key; any total order that groups identical
/// shaders works, this one is creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShaderId(u32);

impl ShaderId {
    fn next() -> Self {
        ShaderId(NEXT_SHADER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ShaderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub type SharedShader = Rc<ShaderProgram>;

pub struct ShaderProgram {
    id: ShaderId,
    name: String,
    vertex_path: PathBuf,
    fragment_path: PathBuf,
    program: Cell<Option<ProgramId>>,
    /// `None` entries are uniforms the program does not have; they were
    /// warned about once already
    locations: RefCell<HashMap<String, Option<UniformLocation>>>,
    release_queue: RefCell<Option<ReleaseQueue>>,
}

impl fmt::Debug for ShaderProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShaderProgram")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("program", &self.program.get())
            .finish()
    }
}

impl ShaderProgram {
    /// Creates an uncompiled program; call [`compile`](Self::compile) next.
    pub fn new(
        name: impl Into<String>,
        vertex_path: impl Into<PathBuf>,
        fragment_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id: ShaderId::next(),
            name: name.into(),
            vertex_path: vertex_path.into(),
            fragment_path: fragment_path.into(),
            program: Cell::new(None),
            locations: RefCell::new(HashMap::new()),
            release_queue: RefCell::new(None),
        }
    }

    /// Creates and compiles a program. Failures are logged and leave the
    /// program invalid but reloadable.
    pub fn load(
        device: &mut dyn RenderDevice,
        name: impl Into<String>,
        vertex_path: impl Into<PathBuf>,
        fragment_path: impl Into<PathBuf>,
    ) -> SharedShader {
        let shader = Self::new(name, vertex_path, fragment_path);
        shader.compile(device);
        Rc::new(shader)
    }

    pub fn id(&self) -> ShaderId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vertex_path(&self) -> &Path {
        &self.vertex_path
    }

    pub fn fragment_path(&self) -> &Path {
        &self.fragment_path
    }

    pub fn program(&self) -> Option<ProgramId> {
        self.program.get()
    }

    pub fn is_valid(&self) -> bool {
        self.program.get().is_some()
    }

    fn read_source(stage: ShaderStage, path: &Path) -> Result<String, ShaderError> {
        fs::read_to_string(path).map_err(|source| ShaderError::SourceRead {
            stage,
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reads, compiles and links both stages.
    ///
    /// Does nothing to an already valid program; use [`reload`](Self::reload)
    /// to replace one.
    pub fn try_compile(&self, device: &mut dyn RenderDevice) -> Result<(), ShaderError> {
        if self.is_valid() {
            return Ok(());
        }

        let vertex_source = Self::read_source(ShaderStage::Vertex, &self.vertex_path)?;
        let fragment_source = Self::read_source(ShaderStage::Fragment, &self.fragment_path)?;
        let program = device.create_program(&self.name, &vertex_source, &fragment_source)?;

        if !device.bind_uniform_block(program, CAMERA_BLOCK, CAMERA_BLOCK_BINDING) {
            log::debug!("Shader '{}' declares no {} block", self.name, CAMERA_BLOCK);
        }

        self.program.set(Some(program));
        *self.release_queue.borrow_mut() = Some(device.release_queue());
        Ok(())
    }

    /// Compiles the program, logging any failure. Returns whether the program
    /// is valid afterwards.
    pub fn compile(&self, device: &mut dyn RenderDevice) -> bool {
        match self.try_compile(device) {
            Ok(()) => {
                log::info!("Shader '{}' compiled", self.name);
                true
            }
            Err(e) => {
                log::error!("Shader '{}': {}", self.name, e);
                false
            }
        }
    }

    /// Destroys the current program (if any), forgets every cached uniform
    /// location and compiles again from the source files.
    pub fn reload(&self, device: &mut dyn RenderDevice) -> bool {
        if let Some(program) = self.program.take() {
            device.destroy_program(program);
        }
        self.locations.borrow_mut().clear();
        self.compile(device)
    }

    /// Makes this the active program. Warns and does nothing when invalid.
    pub fn use_program(&self, device: &mut dyn RenderDevice) {
        match self.program.get() {
            Some(program) => device.use_program(program),
            None => log::warn!("Shader '{}' is not compiled, cannot use it", self.name),
        }
    }

    /// Resolves a uniform, caching the answer per name.
    pub fn location(&self, device: &mut dyn RenderDevice, name: &str) -> Option<UniformLocation> {
        let program = self.program.get()?;

        if let Some(cached) = self.locations.borrow().get(name) {
            return *cached;
        }

        let location = device.uniform_location(program, name);
        if location.is_none() {
            log::warn!("Uniform '{}' doesn't exist in shader '{}'", name, self.name);
        }
        self.locations
            .borrow_mut()
            .insert(name.to_string(), location);
        location
    }

    /// Writes a uniform; unknown names are a no-op.
    pub fn set_uniform(&self, device: &mut dyn RenderDevice, name: &str, value: &UniformValue) {
        if let Some(location) = self.location(device, name) {
            device.set_uniform(location, value);
        }
    }

    pub fn set_uniform_float(&self, device: &mut dyn RenderDevice, name: &str, value: f32) {
        self.set_uniform(device, name, &UniformValue::Float(value));
    }

    pub fn set_uniform_int(&self, device: &mut dyn RenderDevice, name: &str, value: i32) {
        self.set_uniform(device, name, &UniformValue::Int(value));
    }

    pub fn set_uniform_bool(&self, device: &mut dyn RenderDevice, name: &str, value: bool) {
        self.set_uniform(device, name, &UniformValue::Bool(value));
    }

    pub fn set_uniform_vec3(&self, device: &mut dyn RenderDevice, name: &str, value: Vector3<f32>) {
        self.set_uniform(device, name, &UniformValue::Vec3(value));
    }

    pub fn set_uniform_vec4(&self, device: &mut dyn RenderDevice, name: &str, value: Vector4<f32>) {
        self.set_uniform(device, name, &UniformValue::Vec4(value));
    }

    pub fn set_uniform_mat4(&self, device: &mut dyn RenderDevice, name: &str, value: Matrix4<f32>) {
        self.set_uniform(device, name, &UniformValue::Mat4(value));
    }

    pub fn set_uniform_vec4_array(
        &self,
        device: &mut dyn RenderDevice,
        name: &str,
        values: &[Vector4<f32>],
    ) {
        self.set_uniform(device, name, &UniformValue::Vec4Array(values.to_vec()));
    }
}

impl Drop for ShaderProgram {
    fn drop(&mut self) {
        if let (Some(program), Some(queue)) = (self.program.get(), self.release_queue.get_mut()) {
            queue.push(GpuResource::Program(program));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::device::{DeviceCommand, RecordingDevice};
    use std::io::Write;

    pub(crate) const VS: &str = r#"
struct CameraData {
    view: mat4x4<f32>,
    projection: mat4x4<f32>,
    view_pos: vec3<f32>,
    _pad: f32,
}
@group(0) @binding(0) var<uniform> camera: CameraData;

struct Uniforms {
    model: mat4x4<f32>,
    strength: f32,
}
@group(1) @binding(0) var<uniform> u: Uniforms;

@vertex
fn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return camera.projection * camera.view * u.model * vec4<f32>(position * u.strength, 1.0);
}
"#;

    pub(crate) const FS: &str = r#"
@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(1.0, 1.0, 1.0, 1.0);
}
"#;

    fn write(dir: &tempfile::TempDir, name: &str, source: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(source.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_compile_binds_camera_block() {
        let dir = tempfile::tempdir().unwrap();
        let vs = write(&dir, "a.vert.wgsl", VS);
        let fs = write(&dir, "a.frag.wgsl", FS);
        let mut device = RecordingDevice::new();

        let shader = ShaderProgram::load(&mut device, "a", vs, fs);
        let program = shader.program().unwrap();
        assert_eq!(device.block_binding(program, CAMERA_BLOCK), Some(0));
    }

    #[test]
    fn test_missing_source_leaves_program_invalid() {
        let mut device = RecordingDevice::new();
        let shader = ShaderProgram::new("missing", "/nonexistent/a.wgsl", "/nonexistent/b.wgsl");

        let err = shader.try_compile(&mut device).unwrap_err();
        assert!(matches!(
            err,
            ShaderError::SourceRead {
                stage: ShaderStage::Vertex,
                ..
            }
        ));
        assert!(!shader.is_valid());

        // Using an invalid program is a logged no-op
        shader.use_program(&mut device);
        shader.set_uniform_float(&mut device, "strength", 1.0);
        assert!(device.commands().is_empty());
    }

    #[test]
    fn test_missing_uniform_is_cached_noop() {
        let dir = tempfile::tempdir().unwrap();
        let vs = write(&dir, "a.vert.wgsl", VS);
        let fs = write(&dir, "a.frag.wgsl", FS);
        let mut device = RecordingDevice::new();
        let shader = ShaderProgram::load(&mut device, "a", vs, fs);
        device.take_commands();

        shader.set_uniform_float(&mut device, "does_not_exist", 1.0);
        shader.set_uniform_float(&mut device, "does_not_exist", 2.0);
        assert!(device.commands().is_empty());
        assert_eq!(shader.locations.borrow().get("does_not_exist"), Some(&None));

        shader.set_uniform_float(&mut device, "strength", 2.0);
        assert!(matches!(
            device.commands(),
            [DeviceCommand::SetUniform { name, .. }] if name == "strength"
        ));
    }

    #[test]
    fn test_reload_recovers_from_compile_failure() {
        let dir = tempfile::tempdir().unwrap();
        let vs = write(&dir, "a.vert.wgsl", "this is not wgsl");
        let fs = write(&dir, "a.frag.wgsl", FS);
        let mut device = RecordingDevice::new();

        let shader = ShaderProgram::load(&mut device, "a", &vs, &fs);
        assert!(!shader.is_valid());

        write(&dir, "a.vert.wgsl", VS);
        assert!(shader.reload(&mut device));
        assert!(shader.is_valid());
        assert!(shader.location(&mut device, "model").is_some());
    }

    #[test]
    fn test_reload_replaces_program_and_clears_locations() {
        let dir = tempfile::tempdir().unwrap();
        let vs = write(&dir, "a.vert.wgsl", VS);
        let fs = write(&dir, "a.frag.wgsl", FS);
        let mut device = RecordingDevice::new();

        let shader = ShaderProgram::load(&mut device, "a", vs, fs);
        let before = shader.program().unwrap();
        let location = shader.location(&mut device, "strength").unwrap();
        assert_eq!(location.program, before);

        assert!(shader.reload(&mut device));
        let after = shader.program().unwrap();
        assert_ne!(before, after);
        assert!(!device.is_live_program(before));
        assert_eq!(shader.location(&mut device, "strength").unwrap().program, after);
    }

    #[test]
    fn test_drop_queues_program_release() {
        let dir = tempfile::tempdir().unwrap();
        let vs = write(&dir, "a.vert.wgsl", VS);
        let fs = write(&dir, "a.frag.wgsl", FS);
        let mut device = RecordingDevice::new();

        let shader = ShaderProgram::load(&mut device, "a", vs, fs);
        assert_eq!(device.live_programs(), 1);
        drop(shader);
        device.collect_released();
        assert_eq!(device.live_programs(), 0);
    }

    #[test]
    fn test_ids_are_unique() {
        let a = ShaderProgram::new("a", "a.vert", "a.frag");
        let b = ShaderProgram::new("a", "a.vert", "a.frag");
        assert_ne!(a.id(), b.id());
    }
}
