// src/wgpu_utils/uniform_buffer.rs
use std::{marker::PhantomData, num::NonZeroU64};

/// Typed uniform buffer written once at creation
pub struct UniformBuffer<Content> {
    buffer: wgpu::Buffer,
    content_type: PhantomData<Content>,
}

impl<Content: bytemuck::Pod> UniformBuffer<Content> {
    fn name() -> &'static str {
        let type_name = std::any::type_name::<Content>();
        let pos = type_name.rfind(':').unwrap_or(0);
        if pos > 0 {
            &type_name[(pos + 1)..]
        } else {
            type_name
        }
    }

    /// Create buffer with initial data
    pub fn new_with_data(device: &wgpu::Device, initial_content: &Content) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("UniformBuffer: {}", Self::name())),
            size: std::mem::size_of::<Content>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: true,
        });

        buffer
            .slice(..)
            .get_mapped_range_mut()
            .clone_from_slice(bytemuck::bytes_of(initial_content));
        buffer.unmap();

        UniformBuffer {
            buffer,
            content_type: PhantomData,
        }
    }

    pub fn binding_resource(&self) -> wgpu::BindingResource {
        self.buffer.as_entire_binding()
    }
}

/// Per-frame uniform storage addressed with dynamic offsets.
///
/// Blocks of different sizes are packed back to back, each starting at the
/// device's uniform offset alignment. The buffer grows to fit the largest frame
/// seen and is reused afterwards.
pub struct DynamicUniformBuffer {
    buffer: wgpu::Buffer,
    capacity: u64,
    alignment: u64,
    staging: Vec<u8>,
    binding_size: u64,
}

impl DynamicUniformBuffer {
    pub fn new(device: &wgpu::Device, initial_capacity: u64) -> Self {
        let alignment = device.limits().min_uniform_buffer_offset_alignment as u64;
        let capacity = initial_capacity.max(alignment);
        Self {
            buffer: Self::create(device, capacity),
            capacity,
            alignment,
            staging: Vec::new(),
            binding_size: 0,
        }
    }

    fn create(device: &wgpu::Device, size: u64) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("DynamicUniformBuffer"),
            size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Starts a new frame; previously pushed blocks are discarded.
    pub fn reset(&mut self) {
        self.staging.clear();
        self.binding_size = 0;
    }

    /// Appends a block and returns its dynamic offset.
    pub fn push(&mut self, block: &[u8]) -> u32 {
        let offset = wgpu::util::align_to(self.staging.len() as u64, self.alignment);
        self.staging.resize(offset as usize, 0);
        self.staging.extend_from_slice(block);
        self.binding_size = self.binding_size.max(block.len() as u64);
        offset as u32
    }

    /// Size every dynamic binding covers: the largest block of the frame
    pub fn binding_size(&self) -> u64 {
        self.binding_size.max(wgpu::COPY_BUFFER_ALIGNMENT)
    }

    /// Uploads the frame's blocks, growing the buffer when needed.
    ///
    /// Returns true when the buffer was reallocated and bind groups referencing
    /// it must be recreated.
    pub fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) -> bool {
        // The last offset plus a full binding must stay inside the buffer
        let required = wgpu::util::align_to(self.staging.len() as u64, self.alignment)
            + self.binding_size();
        let mut reallocated = false;
        if required > self.capacity {
            self.capacity = required.next_power_of_two();
            self.buffer = Self::create(device, self.capacity);
            reallocated = true;
        }
        if !self.staging.is_empty() {
            queue.write_buffer(&self.buffer, 0, &self.staging);
        }
        reallocated
    }

    pub fn binding_resource(&self) -> wgpu::BindingResource {
        wgpu::BindingResource::Buffer(wgpu::BufferBinding {
            buffer: &self.buffer,
            offset: 0,
            size: NonZeroU64::new(self.binding_size()),
        })
    }
}
