use crate::gfx::device::RenderDevice;

/// A view into the geometry arena describing one uploaded mesh.
///
/// Handles are plain values: they do not own arena memory and are never
/// destroyed individually. [`GeometryHandle::INVALID`] is what a failed upload
/// returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct GeometryHandle {
    /// First vertex of the mesh, in vertices (not bytes)
    pub base_vertex: u32,
    /// Byte offset of the first index inside the shared buffer
    pub index_byte_offset: u32,
    pub index_count: u32,
}

impl GeometryHandle {
    pub const INVALID: GeometryHandle = GeometryHandle {
        base_vertex: 0,
        index_byte_offset: 0,
        index_count: 0,
    };

    pub fn is_valid(&self) -> bool {
        self.index_count > 0
    }

    /// Issues one indexed draw for this mesh.
    ///
    /// The arena's vertex array must already be bound.
    pub fn draw_geometry(&self, device: &mut dyn RenderDevice) {
        if !self.is_valid() {
            return;
        }
        device.draw_indexed(self.index_count, self.index_byte_offset, self.base_vertex);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::device::RecordingDevice;

    #[test]
    fn test_invalid_handle_does_not_draw() {
        let mut device = RecordingDevice::new();
        GeometryHandle::INVALID.draw_geometry(&mut device);
        assert!(device.draws().is_empty());
        assert!(!GeometryHandle::default().is_valid());
    }

    #[test]
    fn test_draw_passes_offsets_through() {
        let mut device = RecordingDevice::new();
        let handle = GeometryHandle {
            base_vertex: 4,
            index_byte_offset: 1024,
            index_count: 6,
        };
        handle.draw_geometry(&mut device);

        let draws = device.draws();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].base_vertex, 4);
        assert_eq!(draws[0].index_byte_offset, 1024);
        assert_eq!(draws[0].index_count, 6);
    }
}
