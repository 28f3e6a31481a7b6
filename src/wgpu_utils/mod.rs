// src/wgpu_utils/mod.rs
//! WGPU utility functions and helpers
//!
//! Small wrappers used by the wgpu device backend.

pub mod binding_types;
pub mod uniform_buffer;

pub use binding_types::*;
pub use uniform_buffer::{DynamicUniformBuffer, UniformBuffer};
