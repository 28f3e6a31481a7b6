//! # GPU Device Boundary
//!
//! The rendering core never talks to a graphics API directly. Everything goes
//! through [`RenderDevice`], a small set of immediate-mode primitives (buffers,
//! programs, named uniforms, texture units, depth/blend state, indexed draws)
//! addressed by plain integer ids.
//!
//! Two implementations ship with the crate:
//!
//! - [`WgpuDevice`](wgpu_device::WgpuDevice) - the real backend. Programs become
//!   wgpu render pipelines, draws are recorded and replayed in one render pass
//!   when the frame is presented.
//! - [`RecordingDevice`](recording::RecordingDevice) - a headless backend that
//!   validates shaders exactly like the real one and records every call. Used
//!   by the test suite and by tooling that needs to inspect draw streams.
//!
//! ## Shader conventions
//!
//! Programs are written in WGSL and split over two files:
//!
//! - the vertex file exposes `vs_main`, the fragment file exposes `fs_main`
//! - the `CameraData` block lives at `@group(0) @binding(0)`
//! - named uniforms are the members of the struct at `@group(1) @binding(0)`
//! - textures and samplers live in `@group(2)`

use std::{cell::RefCell, rc::Rc};

use cgmath::{Matrix4, Vector3, Vector4};

use super::error::{DeviceError, ShaderError};

pub mod recording;
pub mod reflect;
pub mod wgpu_device;

pub use recording::{DeviceCommand, RecordedDraw, RecordingDevice};
pub use reflect::{ProgramReflection, ReflectedUniform, UniformKind};
pub use wgpu_device::WgpuDevice;

macro_rules! resource_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

resource_id!(
    /// Handle to a device buffer
    BufferId
);
resource_id!(
    /// Handle to a vertex-array object (buffer + attribute layout)
    VertexArrayId
);
resource_id!(
    /// Handle to a compiled and linked program
    ProgramId
);
resource_id!(
    /// Handle to a 2D texture
    TextureId
);

/// What a buffer is going to be used for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsage {
    /// Vertex and index data sharing one allocation
    Geometry,
    /// Uniform block storage
    Uniform,
}

#[derive(Debug, Clone)]
pub struct BufferDescriptor<'a> {
    pub label: &'a str,
    pub size: u64,
    pub usage: BufferUsage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeFormat {
    Float32x2,
    Float32x3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    pub location: u32,
    pub format: AttributeFormat,
    pub offset: u64,
}

/// Interleaved vertex layout bound once per vertex array
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexLayout {
    pub stride: u64,
    pub attributes: Vec<VertexAttribute>,
}

/// RGBA8 pixel data for a 2D texture
#[derive(Debug, Clone)]
pub struct TextureDescriptor<'a> {
    pub label: &'a str,
    pub width: u32,
    pub height: u32,
    pub data: &'a [u8],
}

impl TextureDescriptor<'_> {
    /// Expected byte length of `data`
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

/// A value that can be written to a named uniform
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    Bool(bool),
    Vec3(Vector3<f32>),
    Vec4(Vector4<f32>),
    Mat4(Matrix4<f32>),
    Vec4Array(Vec<Vector4<f32>>),
}

/// Resolved location of a named uniform inside a program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation {
    pub program: ProgramId,
    pub index: u32,
}

/// A GPU object whose owner went away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpuResource {
    Buffer(BufferId),
    VertexArray(VertexArrayId),
    Program(ProgramId),
    Texture(TextureId),
}

/// Deferred-release list shared between a device and the reference-counted
/// resources it created. Resources push themselves on drop, the device frees
/// them on the next [`RenderDevice::collect_released`].
#[derive(Debug, Clone, Default)]
pub struct ReleaseQueue(Rc<RefCell<Vec<GpuResource>>>);

impl ReleaseQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, resource: GpuResource) {
        self.0.borrow_mut().push(resource);
    }

    pub fn drain(&self) -> Vec<GpuResource> {
        std::mem::take(&mut *self.0.borrow_mut())
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }
}

/// Immediate-mode GPU interface used by the whole rendering core
///
/// All calls are issued from the thread that owns the device. State set through
/// this trait (current program, texture units, depth writes, bound vertex
/// array) persists until changed, and uniform values persist per program.
pub trait RenderDevice {
    fn create_buffer(&mut self, desc: &BufferDescriptor<'_>) -> Result<BufferId, DeviceError>;

    /// Partial update of an existing buffer. Never reallocates.
    fn write_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8])
        -> Result<(), DeviceError>;

    fn destroy_buffer(&mut self, buffer: BufferId);

    fn create_vertex_array(
        &mut self,
        buffer: BufferId,
        layout: &VertexLayout,
    ) -> Result<VertexArrayId, DeviceError>;

    fn bind_vertex_array(&mut self, vertex_array: VertexArrayId);

    fn destroy_vertex_array(&mut self, vertex_array: VertexArrayId);

    /// Compiles both stages and links them into a program.
    fn create_program(
        &mut self,
        label: &str,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<ProgramId, ShaderError>;

    fn destroy_program(&mut self, program: ProgramId);

    /// Looks up an active uniform. `None` when the program has no such uniform.
    fn uniform_location(&mut self, program: ProgramId, name: &str) -> Option<UniformLocation>;

    /// Binds the named uniform block to `binding`. Returns false when the
    /// program does not declare the block.
    fn bind_uniform_block(&mut self, program: ProgramId, block: &str, binding: u32) -> bool;

    fn use_program(&mut self, program: ProgramId);

    fn set_uniform(&mut self, location: UniformLocation, value: &UniformValue);

    fn create_texture(&mut self, desc: &TextureDescriptor<'_>) -> Result<TextureId, DeviceError>;

    fn destroy_texture(&mut self, texture: TextureId);

    fn bind_texture(&mut self, unit: u32, texture: TextureId);

    /// Attaches a uniform buffer to a block binding point.
    fn bind_uniform_buffer(&mut self, binding: u32, buffer: BufferId);

    fn set_depth_test(&mut self, enabled: bool);

    fn set_blend(&mut self, enabled: bool);

    fn set_depth_write(&mut self, enabled: bool);

    fn set_clear_color(&mut self, color: [f32; 4]);

    fn clear(&mut self);

    /// Resizes size-dependent attachments such as the depth buffer.
    fn resize(&mut self, _width: u32, _height: u32) {}

    /// Indexed triangle-list draw with the bound vertex array and program.
    fn draw_indexed(&mut self, index_count: u32, index_byte_offset: u32, base_vertex: u32);

    /// Queue that reference-counted resources created on this device push
    /// their ids into when dropped.
    fn release_queue(&self) -> ReleaseQueue;

    /// Frees every resource queued for release.
    fn collect_released(&mut self) {
        for resource in self.release_queue().drain() {
            match resource {
                GpuResource::Buffer(id) => self.destroy_buffer(id),
                GpuResource::VertexArray(id) => self.destroy_vertex_array(id),
                GpuResource::Program(id) => self.destroy_program(id),
                GpuResource::Texture(id) => self.destroy_texture(id),
            }
        }
    }
}
