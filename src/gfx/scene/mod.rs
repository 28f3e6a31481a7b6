//! # Scene
//!
//! What gets drawn: a [`SceneGraph`] holding the fly camera, a flat list of
//! entities (geometry + material + [`Transform`]), one point light and up to
//! [`MAX_CLIP_PLANES`] clipping planes. [`ModelLoader`] fills it from OBJ
//! files.

pub mod model;
pub mod scene;
pub mod transform;

pub use model::{Model, ModelLoader, ModelPart};
pub use scene::{Entity, EntityId, SceneGraph, MAX_CLIP_PLANES};
pub use transform::{clip_plane_transform, Transform, CLIP_PLANE_VISUAL_SCALE};
