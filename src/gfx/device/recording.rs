//! Headless [`RenderDevice`] that validates programs and records every call.

use std::collections::HashMap;

use cgmath::Matrix4;

use super::{
    reflect::{self, ProgramReflection, UniformKind},
    BufferDescriptor, BufferId, BufferUsage, GpuResource, ProgramId, ReleaseQueue, RenderDevice,
    TextureDescriptor, TextureId, UniformLocation, UniformValue, VertexArrayId, VertexLayout,
};
use crate::gfx::error::{DeviceError, ShaderError};

/// Largest buffer the recording device agrees to allocate by default (256 MiB)
pub const DEFAULT_MAX_BUFFER_SIZE: u64 = 256 << 20;

/// One indexed draw as the device saw it
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedDraw {
    pub program: Option<ProgramId>,
    pub vertex_array: Option<VertexArrayId>,
    pub index_count: u32,
    pub index_byte_offset: u32,
    pub base_vertex: u32,
    pub depth_write: bool,
    pub blend: bool,
    /// Value of the `model` uniform at draw time, if the program has one
    pub model: Option<Matrix4<f32>>,
    /// Texture bound to each texture uniform, by uniform name
    pub textures: Vec<(String, Option<TextureId>)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCommand {
    CreateBuffer { buffer: BufferId, size: u64 },
    WriteBuffer { buffer: BufferId, offset: u64, len: u64 },
    DestroyBuffer(BufferId),
    CreateVertexArray(VertexArrayId),
    BindVertexArray(VertexArrayId),
    DestroyVertexArray(VertexArrayId),
    CreateProgram(ProgramId),
    DestroyProgram(ProgramId),
    UseProgram(ProgramId),
    SetUniform { program: ProgramId, name: String, value: UniformValue },
    CreateTexture(TextureId),
    DestroyTexture(TextureId),
    BindTexture { unit: u32, texture: TextureId },
    BindUniformBuffer { binding: u32, buffer: BufferId },
    SetDepthTest(bool),
    SetBlend(bool),
    SetDepthWrite(bool),
    SetClearColor([f32; 4]),
    Clear,
    Resize { width: u32, height: u32 },
    Draw(RecordedDraw),
}

#[derive(Debug)]
struct RecordedBuffer {
    usage: BufferUsage,
    data: Vec<u8>,
}

#[derive(Debug)]
struct RecordedProgram {
    label: String,
    reflection: ProgramReflection,
    staging: Vec<u8>,
    /// Texture unit per texture uniform index
    texture_units: HashMap<u32, u32>,
    block_bindings: HashMap<String, u32>,
}

#[derive(Debug)]
struct RecordedTexture {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

#[derive(Debug)]
pub struct RecordingDevice {
    next_id: u32,
    max_buffer_size: u64,
    buffers: HashMap<BufferId, RecordedBuffer>,
    vertex_arrays: HashMap<VertexArrayId, (BufferId, VertexLayout)>,
    programs: HashMap<ProgramId, RecordedProgram>,
    textures: HashMap<TextureId, RecordedTexture>,
    current_program: Option<ProgramId>,
    bound_vertex_array: Option<VertexArrayId>,
    texture_units: HashMap<u32, TextureId>,
    uniform_buffers: HashMap<u32, BufferId>,
    depth_test: bool,
    depth_write: bool,
    blend: bool,
    clear_color: [f32; 4],
    commands: Vec<DeviceCommand>,
    release_queue: ReleaseQueue,
}

impl Default for RecordingDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self::with_max_buffer_size(DEFAULT_MAX_BUFFER_SIZE)
    }

    /// Buffers larger than `max_buffer_size` fail to allocate.
    pub fn with_max_buffer_size(max_buffer_size: u64) -> Self {
        Self {
            next_id: 1,
            max_buffer_size,
            buffers: HashMap::new(),
            vertex_arrays: HashMap::new(),
            programs: HashMap::new(),
            textures: HashMap::new(),
            current_program: None,
            bound_vertex_array: None,
            texture_units: HashMap::new(),
            uniform_buffers: HashMap::new(),
            depth_test: false,
            depth_write: true,
            blend: false,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            commands: Vec::new(),
            release_queue: ReleaseQueue::new(),
        }
    }

    fn allocate_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn commands(&self) -> &[DeviceCommand] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<DeviceCommand> {
        std::mem::take(&mut self.commands)
    }

    pub fn draws(&self) -> Vec<&RecordedDraw> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DeviceCommand::Draw(draw) => Some(draw),
                _ => None,
            })
            .collect()
    }

    /// Programs made current, in order
    pub fn program_binds(&self) -> Vec<ProgramId> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DeviceCommand::UseProgram(p) => Some(*p),
                _ => None,
            })
            .collect()
    }

    pub fn buffer_contents(&self, buffer: BufferId) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(|b| b.data.as_slice())
    }

    pub fn buffer_usage(&self, buffer: BufferId) -> Option<BufferUsage> {
        self.buffers.get(&buffer).map(|b| b.usage)
    }

    pub fn texture_size(&self, texture: TextureId) -> Option<(u32, u32)> {
        self.textures.get(&texture).map(|t| (t.width, t.height))
    }

    pub fn texture_pixels(&self, texture: TextureId) -> Option<&[u8]> {
        self.textures.get(&texture).map(|t| t.data.as_slice())
    }

    pub fn program_label(&self, program: ProgramId) -> Option<&str> {
        self.programs.get(&program).map(|p| p.label.as_str())
    }

    /// Binding point of `block` as set through `bind_uniform_block`
    pub fn block_binding(&self, program: ProgramId, block: &str) -> Option<u32> {
        self.programs
            .get(&program)?
            .block_bindings
            .get(block)
            .copied()
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn is_live_program(&self, program: ProgramId) -> bool {
        self.programs.contains_key(&program)
    }

    pub fn depth_write(&self) -> bool {
        self.depth_write
    }

    pub fn depth_test(&self) -> bool {
        self.depth_test
    }

    pub fn blend(&self) -> bool {
        self.blend
    }

    pub fn clear_color(&self) -> [f32; 4] {
        self.clear_color
    }

    pub fn uniform_buffer(&self, binding: u32) -> Option<BufferId> {
        self.uniform_buffers.get(&binding).copied()
    }

    /// Current value of a numeric uniform as raw floats (ints are reinterpreted)
    pub fn uniform_floats(&self, program: ProgramId, name: &str) -> Option<Vec<f32>> {
        let program = self.programs.get(&program)?;
        let uniform = program.reflection.uniform(program.reflection.find(name)?)?;
        let start = uniform.offset as usize;
        let bytes = program.staging.get(start..start + uniform.size as usize)?;
        Some(
            bytes
                .chunks_exact(4)
                .map(bytemuck::pod_read_unaligned::<f32>)
                .collect(),
        )
    }

    fn model_matrix(program: &RecordedProgram) -> Option<Matrix4<f32>> {
        let uniform = program.reflection.uniform(program.reflection.find("model")?)?;
        if uniform.kind != UniformKind::Mat4 {
            return None;
        }
        let start = uniform.offset as usize;
        let bytes = program.staging.get(start..start + 64)?;
        let cols: [[f32; 4]; 4] = bytemuck::pod_read_unaligned(bytes);
        Some(Matrix4::from(cols))
    }

    fn bound_textures(&self, program: &RecordedProgram) -> Vec<(String, Option<TextureId>)> {
        program
            .reflection
            .uniforms
            .iter()
            .enumerate()
            .filter(|(_, u)| matches!(u.kind, UniformKind::Texture { .. }))
            .map(|(index, u)| {
                let unit = program.texture_units.get(&(index as u32)).copied().unwrap_or(0);
                (u.name.clone(), self.texture_units.get(&unit).copied())
            })
            .collect()
    }
}

impl RenderDevice for RecordingDevice {
    fn create_buffer(&mut self, desc: &BufferDescriptor<'_>) -> Result<BufferId, DeviceError> {
        if desc.size > self.max_buffer_size {
            return Err(DeviceError::AllocationFailed {
                label: desc.label.to_string(),
                size: desc.size,
                reason: format!("exceeds the device limit of {} bytes", self.max_buffer_size),
            });
        }
        let buffer = BufferId(self.allocate_id());
        self.buffers.insert(
            buffer,
            RecordedBuffer {
                usage: desc.usage,
                data: vec![0; desc.size as usize],
            },
        );
        self.commands.push(DeviceCommand::CreateBuffer {
            buffer,
            size: desc.size,
        });
        Ok(buffer)
    }

    fn write_buffer(
        &mut self,
        buffer: BufferId,
        offset: u64,
        data: &[u8],
    ) -> Result<(), DeviceError> {
        let target = self
            .buffers
            .get_mut(&buffer)
            .ok_or(DeviceError::UnknownResource {
                kind: "buffer",
                id: buffer.0,
            })?;
        let size = target.data.len() as u64;
        let len = data.len() as u64;
        if offset % 4 != 0 || len % 4 != 0 {
            return Err(DeviceError::Misaligned {
                buffer: buffer.0,
                offset,
                len,
            });
        }
        let end = match offset.checked_add(len) {
            Some(end) if end <= size => end,
            _ => {
                return Err(DeviceError::OutOfBounds {
                    buffer: buffer.0,
                    offset,
                    len,
                    size,
                })
            }
        };
        target.data[offset as usize..end as usize].copy_from_slice(data);
        self.commands
            .push(DeviceCommand::WriteBuffer { buffer, offset, len });
        Ok(())
    }

    fn destroy_buffer(&mut self, buffer: BufferId) {
        if self.buffers.remove(&buffer).is_some() {
            self.uniform_buffers.retain(|_, b| *b != buffer);
            self.commands.push(DeviceCommand::DestroyBuffer(buffer));
        }
    }

    fn create_vertex_array(
        &mut self,
        buffer: BufferId,
        layout: &VertexLayout,
    ) -> Result<VertexArrayId, DeviceError> {
        if !self.buffers.contains_key(&buffer) {
            return Err(DeviceError::UnknownResource {
                kind: "buffer",
                id: buffer.0,
            });
        }
        let vertex_array = VertexArrayId(self.allocate_id());
        self.vertex_arrays
            .insert(vertex_array, (buffer, layout.clone()));
        self.commands
            .push(DeviceCommand::CreateVertexArray(vertex_array));
        Ok(vertex_array)
    }

    fn bind_vertex_array(&mut self, vertex_array: VertexArrayId) {
        if !self.vertex_arrays.contains_key(&vertex_array) {
            log::warn!("Binding unknown vertex array {}", vertex_array);
            return;
        }
        self.bound_vertex_array = Some(vertex_array);
        self.commands
            .push(DeviceCommand::BindVertexArray(vertex_array));
    }

    fn destroy_vertex_array(&mut self, vertex_array: VertexArrayId) {
        if self.vertex_arrays.remove(&vertex_array).is_some() {
            if self.bound_vertex_array == Some(vertex_array) {
                self.bound_vertex_array = None;
            }
            self.commands
                .push(DeviceCommand::DestroyVertexArray(vertex_array));
        }
    }

    fn create_program(
        &mut self,
        label: &str,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<ProgramId, ShaderError> {
        let reflection = reflect::reflect_program(vertex_source, fragment_source)?;
        let program = ProgramId(self.allocate_id());
        self.programs.insert(
            program,
            RecordedProgram {
                label: label.to_string(),
                staging: reflection.staging_block(),
                reflection,
                texture_units: HashMap::new(),
                block_bindings: HashMap::new(),
            },
        );
        self.commands.push(DeviceCommand::CreateProgram(program));
        Ok(program)
    }

    fn destroy_program(&mut self, program: ProgramId) {
        if self.programs.remove(&program).is_some() {
            if self.current_program == Some(program) {
                self.current_program = None;
            }
            self.commands.push(DeviceCommand::DestroyProgram(program));
        }
    }

    fn uniform_location(&mut self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        let index = self.programs.get(&program)?.reflection.find(name)?;
        Some(UniformLocation { program, index })
    }

    fn bind_uniform_block(&mut self, program: ProgramId, block: &str, binding: u32) -> bool {
        let Some(program) = self.programs.get_mut(&program) else {
            return false;
        };
        if program.reflection.block_binding(block).is_none() {
            return false;
        }
        program.block_bindings.insert(block.to_string(), binding);
        true
    }

    fn use_program(&mut self, program: ProgramId) {
        if !self.programs.contains_key(&program) {
            log::warn!("Using unknown program {}", program);
            return;
        }
        self.current_program = Some(program);
        self.commands.push(DeviceCommand::UseProgram(program));
    }

    fn set_uniform(&mut self, location: UniformLocation, value: &UniformValue) {
        let Some(program) = self.programs.get_mut(&location.program) else {
            return;
        };
        let Some(uniform) = program.reflection.uniform(location.index) else {
            return;
        };
        let name = uniform.name.clone();
        let written = match uniform.kind {
            UniformKind::Texture { .. } => match reflect::texture_unit(value) {
                Some(unit) => {
                    program.texture_units.insert(location.index, unit);
                    true
                }
                None => false,
            },
            _ => {
                let uniform = uniform.clone();
                reflect::write_uniform(&mut program.staging, &uniform, value)
            }
        };
        if !written {
            log::warn!(
                "Uniform '{}' of program {} does not accept {:?}",
                name,
                location.program,
                value
            );
            return;
        }
        self.commands.push(DeviceCommand::SetUniform {
            program: location.program,
            name,
            value: value.clone(),
        });
    }

    fn create_texture(&mut self, desc: &TextureDescriptor<'_>) -> Result<TextureId, DeviceError> {
        if desc.data.len() != desc.expected_len() {
            return Err(DeviceError::InvalidTextureData {
                label: desc.label.to_string(),
                expected: desc.expected_len(),
                actual: desc.data.len(),
            });
        }
        let texture = TextureId(self.allocate_id());
        self.textures.insert(
            texture,
            RecordedTexture {
                width: desc.width,
                height: desc.height,
                data: desc.data.to_vec(),
            },
        );
        self.commands.push(DeviceCommand::CreateTexture(texture));
        Ok(texture)
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        if self.textures.remove(&texture).is_some() {
            self.texture_units.retain(|_, t| *t != texture);
            self.commands.push(DeviceCommand::DestroyTexture(texture));
        }
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureId) {
        self.texture_units.insert(unit, texture);
        self.commands
            .push(DeviceCommand::BindTexture { unit, texture });
    }

    fn bind_uniform_buffer(&mut self, binding: u32, buffer: BufferId) {
        self.uniform_buffers.insert(binding, buffer);
        self.commands
            .push(DeviceCommand::BindUniformBuffer { binding, buffer });
    }

    fn set_depth_test(&mut self, enabled: bool) {
        self.depth_test = enabled;
        self.commands.push(DeviceCommand::SetDepthTest(enabled));
    }

    fn set_blend(&mut self, enabled: bool) {
        self.blend = enabled;
        self.commands.push(DeviceCommand::SetBlend(enabled));
    }

    fn set_depth_write(&mut self, enabled: bool) {
        self.depth_write = enabled;
        self.commands.push(DeviceCommand::SetDepthWrite(enabled));
    }

    fn set_clear_color(&mut self, color: [f32; 4]) {
        self.clear_color = color;
        self.commands.push(DeviceCommand::SetClearColor(color));
    }

    fn clear(&mut self) {
        self.commands.push(DeviceCommand::Clear);
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.commands.push(DeviceCommand::Resize { width, height });
    }

    fn draw_indexed(&mut self, index_count: u32, index_byte_offset: u32, base_vertex: u32) {
        let (model, textures) = match self
            .current_program
            .and_then(|p| self.programs.get(&p))
        {
            Some(program) => (Self::model_matrix(program), self.bound_textures(program)),
            None => {
                log::warn!("Draw issued without a current program");
                (None, Vec::new())
            }
        };
        self.commands.push(DeviceCommand::Draw(RecordedDraw {
            program: self.current_program,
            vertex_array: self.bound_vertex_array,
            index_count,
            index_byte_offset,
            base_vertex,
            depth_write: self.depth_write,
            blend: self.blend,
            model,
            textures,
        }));
    }

    fn release_queue(&self) -> ReleaseQueue {
        self.release_queue.clone()
    }
}

impl RecordingDevice {
    /// Every resource id still alive on this device
    pub fn live_resources(&self) -> Vec<GpuResource> {
        let mut resources: Vec<GpuResource> = Vec::new();
        resources.extend(self.buffers.keys().map(|b| GpuResource::Buffer(*b)));
        resources.extend(
            self.vertex_arrays
                .keys()
                .map(|v| GpuResource::VertexArray(*v)),
        );
        resources.extend(self.programs.keys().map(|p| GpuResource::Program(*p)));
        resources.extend(self.textures.keys().map(|t| GpuResource::Texture(*t)));
        resources
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VS: &str = r#"
struct Uniforms {
    model: mat4x4<f32>,
    tint: vec4<f32>,
}
@group(1) @binding(0) var<uniform> u: Uniforms;

@vertex
fn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return u.model * vec4<f32>(position, 1.0);
}
"#;

    const FS: &str = r#"
struct Uniforms {
    model: mat4x4<f32>,
    tint: vec4<f32>,
}
@group(1) @binding(0) var<uniform> u: Uniforms;

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return u.tint;
}
"#;

    #[test]
    fn test_buffer_writes_are_bounds_checked() {
        let mut device = RecordingDevice::new();
        let buffer = device
            .create_buffer(&BufferDescriptor {
                label: "test",
                size: 16,
                usage: BufferUsage::Uniform,
            })
            .unwrap();

        device.write_buffer(buffer, 8, &[1, 2, 3, 4]).unwrap();
        assert_eq!(&device.buffer_contents(buffer).unwrap()[8..12], &[1, 2, 3, 4]);

        let err = device.write_buffer(buffer, 12, &[0; 8]).unwrap_err();
        assert!(matches!(err, DeviceError::OutOfBounds { size: 16, .. }));
        assert!(matches!(
            device.write_buffer(buffer, 2, &[0; 4]),
            Err(DeviceError::Misaligned { .. })
        ));
        assert!(device
            .write_buffer(BufferId(999), 0, &[0; 4])
            .is_err());
    }

    #[test]
    fn test_allocation_limit() {
        let mut device = RecordingDevice::with_max_buffer_size(1024);
        let result = device.create_buffer(&BufferDescriptor {
            label: "too big",
            size: 2048,
            usage: BufferUsage::Geometry,
        });
        assert!(matches!(result, Err(DeviceError::AllocationFailed { .. })));
        assert_eq!(device.live_buffers(), 0);
    }

    #[test]
    fn test_uniforms_and_draw_capture() {
        let mut device = RecordingDevice::new();
        let program = device.create_program("tint", VS, FS).unwrap();
        device.use_program(program);

        let tint = device.uniform_location(program, "tint").unwrap();
        device.set_uniform(tint, &UniformValue::Vec4(cgmath::vec4(1.0, 0.5, 0.25, 1.0)));
        assert_eq!(
            device.uniform_floats(program, "tint"),
            Some(vec![1.0, 0.5, 0.25, 1.0])
        );
        assert!(device.uniform_location(program, "nope").is_none());

        let model = device.uniform_location(program, "model").unwrap();
        let translation = Matrix4::from_translation(cgmath::vec3(1.0, 2.0, 3.0));
        device.set_uniform(model, &UniformValue::Mat4(translation));

        device.draw_indexed(6, 0, 4);
        let draws = device.draws();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].program, Some(program));
        assert_eq!(draws[0].base_vertex, 4);
        assert_eq!(draws[0].model, Some(translation));
    }

    #[test]
    fn test_collect_released_destroys_queued_resources() {
        let mut device = RecordingDevice::new();
        let program = device.create_program("tint", VS, FS).unwrap();
        let texture = device
            .create_texture(&TextureDescriptor {
                label: "white",
                width: 1,
                height: 1,
                data: &[255; 4],
            })
            .unwrap();

        let queue = device.release_queue();
        queue.push(GpuResource::Program(program));
        queue.push(GpuResource::Texture(texture));
        device.collect_released();

        assert!(queue.is_empty());
        assert_eq!(device.live_programs(), 0);
        assert_eq!(device.live_textures(), 0);
    }

    #[test]
    fn test_texture_data_length_is_checked() {
        let mut device = RecordingDevice::new();
        let result = device.create_texture(&TextureDescriptor {
            label: "bad",
            width: 2,
            height: 2,
            data: &[0; 4],
        });
        assert!(matches!(
            result,
            Err(DeviceError::InvalidTextureData {
                expected: 16,
                actual: 4,
                ..
            })
        ));
    }
}
