//! Per-frame rendering
//!
//! [`FrameRenderer`] turns a [`SceneGraph`](crate::gfx::scene::SceneGraph)
//! into sorted draw calls on a [`RenderDevice`](crate::gfx::device::RenderDevice).

pub mod clip_planes;
pub mod frame_renderer;
pub mod render_queue;

pub use clip_planes::ClipPlaneVisualizer;
pub use frame_renderer::{FrameRenderer, FrameStats};
pub use render_queue::{PartitionedCommands, RenderCommand, RenderQueue};
