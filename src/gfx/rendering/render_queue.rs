//! Per-frame draw list
//!
//! Commands are collected in submission order, then sorted by shader so
//! state changes are minimal and split into an opaque and a transparent
//! pass. Both steps are stable: draws that compare equal keep their
//! submission order.

use cgmath::Matrix4;

use crate::gfx::{
    geometry::GeometryHandle,
    resources::{ShaderId, SharedMaterial},
};

/// One draw for the current frame
#[derive(Debug, Clone)]
pub struct RenderCommand {
    pub geometry: GeometryHandle,
    pub material: SharedMaterial,
    pub model: Matrix4<f32>,
}

impl RenderCommand {
    pub fn new(geometry: GeometryHandle, material: SharedMaterial, model: Matrix4<f32>) -> Self {
        Self {
            geometry,
            material,
            model,
        }
    }

    pub fn shader_id(&self) -> ShaderId {
        self.material.borrow().shader().id()
    }

    pub fn is_transparent(&self) -> bool {
        self.material.borrow().is_transparent()
    }
}

/// Sorted draws split by pass
#[derive(Debug, Default)]
pub struct PartitionedCommands {
    pub opaque: Vec<RenderCommand>,
    pub transparent: Vec<RenderCommand>,
}

#[derive(Debug, Default)]
pub struct RenderQueue {
    commands: Vec<RenderCommand>,
}

impl RenderQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: RenderCommand) {
        self.commands.push(command);
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn commands(&self) -> &[RenderCommand] {
        &self.commands
    }

    /// Empties the queue into shader-sorted opaque and transparent lists.
    ///
    /// Transparent draws are not depth-sorted; they stay in shader order.
    pub fn take_partitioned(&mut self) -> PartitionedCommands {
        let mut commands = std::mem::take(&mut self.commands);
        commands.sort_by_cached_key(RenderCommand::shader_id);

        let (transparent, opaque) = commands
            .into_iter()
            .partition(RenderCommand::is_transparent);
        PartitionedCommands {
            opaque,
            transparent,
        }
    }
}
