//! # Geometry Arena
//!
//! All mesh data lives in one GPU buffer split into two fixed regions:
//!
//! ```text
//! [0 .. vertex_capacity)                       vertex region
//! [vertex_capacity .. vertex_capacity + index_capacity)  index region
//! ```
//!
//! Uploads bump-allocate from the front of each region. Nothing is ever
//! freed individually; the whole buffer goes away on [`GeometryArena::shutdown`].
//! A single vertex array is configured once over the vertex region, so the
//! renderer binds it once per frame and every mesh is drawn with a base-vertex
//! offset.

use crate::gfx::{
    device::{BufferDescriptor, BufferId, BufferUsage, RenderDevice, VertexArrayId},
    error::GeometryError,
};

use super::{GeometryHandle, Vertex};

const INDEX_SIZE: u64 = std::mem::size_of::<u32>() as u64;

/// Cursor snapshot for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArenaStats {
    pub vertex_bytes_used: u64,
    pub vertex_capacity: u64,
    pub index_bytes_used: u64,
    pub index_capacity: u64,
    pub uploads: u32,
}

impl ArenaStats {
    pub fn vertex_count(&self) -> u64 {
        self.vertex_bytes_used / Vertex::SIZE
    }

    pub fn index_count(&self) -> u64 {
        self.index_bytes_used / INDEX_SIZE
    }
}

#[derive(Debug)]
pub struct GeometryArena {
    buffer: Option<BufferId>,
    vertex_array: Option<VertexArrayId>,
    vertex_capacity: u64,
    index_capacity: u64,
    vertex_head: u64,
    index_head: u64,
    uploads: u32,
}

impl GeometryArena {
    /// Allocates the shared buffer and configures the vertex array.
    ///
    /// Both capacities are in bytes. They must be multiples of 4 and their sum
    /// must be addressable with 32-bit offsets.
    pub fn new(
        device: &mut dyn RenderDevice,
        vertex_capacity: u64,
        index_capacity: u64,
    ) -> Result<Self, GeometryError> {
        if vertex_capacity % 4 != 0 || index_capacity % 4 != 0 {
            return Err(GeometryError::InvalidCapacity(format!(
                "capacities must be multiples of 4 bytes (vertex {vertex_capacity}, index {index_capacity})"
            )));
        }
        let total = vertex_capacity
            .checked_add(index_capacity)
            .filter(|total| *total <= u32::MAX as u64)
            .ok_or_else(|| {
                GeometryError::InvalidCapacity(format!(
                    "vertex {vertex_capacity} + index {index_capacity} bytes exceeds 32-bit offsets"
                ))
            })?;

        let buffer = device.create_buffer(&BufferDescriptor {
            label: "Geometry Arena",
            size: total,
            usage: BufferUsage::Geometry,
        })?;
        let vertex_array = match device.create_vertex_array(buffer, &Vertex::layout()) {
            Ok(vertex_array) => vertex_array,
            Err(e) => {
                device.destroy_buffer(buffer);
                return Err(e.into());
            }
        };

        log::info!(
            "Geometry arena initialized: {} KiB vertex, {} KiB index",
            vertex_capacity / 1024,
            index_capacity / 1024
        );

        Ok(Self {
            buffer: Some(buffer),
            vertex_array: Some(vertex_array),
            vertex_capacity,
            index_capacity,
            vertex_head: 0,
            index_head: 0,
            uploads: 0,
        })
    }

    /// Copies a mesh into the arena.
    ///
    /// Capacity is checked for both regions before anything is written, so a
    /// failed upload leaves the arena untouched.
    pub fn try_upload(
        &mut self,
        device: &mut dyn RenderDevice,
        vertices: &[Vertex],
        indices: &[u32],
    ) -> Result<GeometryHandle, GeometryError> {
        let buffer = self.buffer.ok_or_else(|| {
            GeometryError::InvalidCapacity("arena has been shut down".to_string())
        })?;

        let vertex_bytes: &[u8] = bytemuck::cast_slice(vertices);
        let index_bytes: &[u8] = bytemuck::cast_slice(indices);
        let vertex_size = vertex_bytes.len() as u64;
        let index_size = index_bytes.len() as u64;

        let vertex_remaining = self.vertex_capacity - self.vertex_head;
        if vertex_size > vertex_remaining {
            return Err(GeometryError::VertexOverflow {
                requested: vertex_size,
                remaining: vertex_remaining,
            });
        }
        let index_remaining = self.index_capacity - self.index_head;
        if index_size > index_remaining {
            return Err(GeometryError::IndexOverflow {
                requested: index_size,
                remaining: index_remaining,
            });
        }

        let index_offset = self.vertex_capacity + self.index_head;
        device.write_buffer(buffer, self.vertex_head, vertex_bytes)?;
        device.write_buffer(buffer, index_offset, index_bytes)?;

        let handle = GeometryHandle {
            base_vertex: (self.vertex_head / Vertex::SIZE) as u32,
            index_byte_offset: index_offset as u32,
            index_count: indices.len() as u32,
        };

        self.vertex_head += vertex_size;
        self.index_head += index_size;
        self.uploads += 1;

        Ok(handle)
    }

    /// Like [`try_upload`](Self::try_upload), but logs failures and returns
    /// [`GeometryHandle::INVALID`] instead.
    pub fn upload(
        &mut self,
        device: &mut dyn RenderDevice,
        vertices: &[Vertex],
        indices: &[u32],
    ) -> GeometryHandle {
        match self.try_upload(device, vertices, indices) {
            Ok(handle) => handle,
            Err(e) => {
                log::error!("Geometry upload failed: {}", e);
                GeometryHandle::INVALID
            }
        }
    }

    /// Releases the buffer and vertex array. Later uploads fail.
    pub fn shutdown(&mut self, device: &mut dyn RenderDevice) {
        if let Some(vertex_array) = self.vertex_array.take() {
            device.destroy_vertex_array(vertex_array);
        }
        if let Some(buffer) = self.buffer.take() {
            device.destroy_buffer(buffer);
            log::info!("Geometry arena released ({} uploads)", self.uploads);
        }
    }

    pub fn vertex_array(&self) -> Option<VertexArrayId> {
        self.vertex_array
    }

    pub fn buffer(&self) -> Option<BufferId> {
        self.buffer
    }

    pub fn vertex_head(&self) -> u64 {
        self.vertex_head
    }

    pub fn index_head(&self) -> u64 {
        self.index_head
    }

    pub fn vertex_capacity(&self) -> u64 {
        self.vertex_capacity
    }

    pub fn index_capacity(&self) -> u64 {
        self.index_capacity
    }

    pub fn stats(&self) -> ArenaStats {
        ArenaStats {
            vertex_bytes_used: self.vertex_head,
            vertex_capacity: self.vertex_capacity,
            index_bytes_used: self.index_head,
            index_capacity: self.index_capacity,
            uploads: self.uploads,
        }
    }
}
