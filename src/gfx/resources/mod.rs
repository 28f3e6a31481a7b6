//! Shaders, textures and materials, plus the cache that shares them
//!
//! Everything here is reference counted. Reloading a shader mutates the shared
//! instance in place, and dropping the last reference to a GPU-backed resource
//! queues its release on the device that created it.

pub mod material;
pub mod resource_cache;
pub mod shader;
pub mod texture;

pub use material::{Material, SharedMaterial};
pub use resource_cache::ResourceCache;
pub use shader::{ShaderId, ShaderProgram, SharedShader, CAMERA_BLOCK, CAMERA_BLOCK_BINDING};
pub use texture::{SharedTexture, Texture, TextureKind, PLACEHOLDER_COLOR};
