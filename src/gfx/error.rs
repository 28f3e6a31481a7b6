//! Error types for the rendering core
//!
//! Every component handles its own failures locally (log + degraded state), so
//! these types mostly travel between a component and its immediate caller.

use std::{fmt, io, path::PathBuf};

use thiserror::Error;

/// Pipeline stage a shader source belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => write!(f, "vertex"),
            ShaderStage::Fragment => write!(f, "fragment"),
        }
    }
}

/// Failures raised by a [`RenderDevice`](crate::gfx::device::RenderDevice) implementation
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("failed to allocate {size} bytes for '{label}': {reason}")]
    AllocationFailed {
        label: String,
        size: u64,
        reason: String,
    },

    #[error("write of {len} bytes at offset {offset} exceeds buffer {buffer} of {size} bytes")]
    OutOfBounds {
        buffer: u32,
        offset: u64,
        len: u64,
        size: u64,
    },

    #[error("write of {len} bytes at offset {offset} into buffer {buffer} is not 4-byte aligned")]
    Misaligned { buffer: u32, offset: u64, len: u64 },

    #[error("unknown {kind} id {id}")]
    UnknownResource { kind: &'static str, id: u32 },

    #[error("invalid texture data for '{label}': expected {expected} bytes, got {actual}")]
    InvalidTextureData {
        label: String,
        expected: usize,
        actual: usize,
    },
}

/// Geometry arena failures
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("vertex buffer overflow: {requested} bytes requested, {remaining} bytes remaining")]
    VertexOverflow { requested: u64, remaining: u64 },

    #[error("index buffer overflow: {requested} bytes requested, {remaining} bytes remaining")]
    IndexOverflow { requested: u64, remaining: u64 },

    #[error("invalid arena capacity: {0}")]
    InvalidCapacity(String),

    #[error(transparent)]
    Device(#[from] DeviceError),
}

/// Shader program failures; all of them leave the program reloadable
#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("failed to read {stage} shader source '{}': {source}", path.display())]
    SourceRead {
        stage: ShaderStage,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{stage} shader failed to compile:\n{diagnostics}")]
    Compile {
        stage: ShaderStage,
        diagnostics: String,
    },

    #[error("program failed to link:\n{diagnostics}")]
    Link { diagnostics: String },
}

/// Texture loading failures
#[derive(Debug, Error)]
pub enum TextureError {
    #[error("failed to decode texture '{}': {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error(transparent)]
    Device(#[from] DeviceError),
}

/// Scene graph mutations that were rejected
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SceneError {
    #[error("clipping plane limit of {limit} reached")]
    ClipPlaneLimit { limit: usize },
}

/// Model loading failures
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to load model '{}': {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: tobj::LoadError,
    },

    #[error("model '{}' contains no uploadable meshes", path.display())]
    Empty { path: PathBuf },

    #[error(transparent)]
    Texture(#[from] TextureError),
}

/// Viewer bootstrap failures
#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("failed to create the geometry arena: {0}")]
    Geometry(#[from] GeometryError),

    #[error("failed to initialize the frame renderer: {0}")]
    Device(#[from] DeviceError),
}
