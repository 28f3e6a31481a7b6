//! # wgpu Backend
//!
//! Maps the immediate-mode [`RenderDevice`] calls onto wgpu.
//!
//! - programs are WGSL module pairs; render pipelines are created lazily per
//!   vertex array and depth/blend state
//! - every program keeps a staging copy of its uniform struct, so uniform
//!   values persist per program the way GL program state does
//! - `draw_indexed` snapshots the staging block and texture bindings; all draws
//!   of a frame are replayed in a single render pass by [`WgpuDevice::present`]
//!   with the snapshots packed into one dynamic-offset uniform buffer

use std::{borrow::Cow, collections::HashMap};

use super::{
    reflect::{self, ProgramReflection, UniformKind},
    AttributeFormat, BufferDescriptor, BufferId, BufferUsage, ProgramId, ReleaseQueue,
    RenderDevice, TextureDescriptor, TextureId, UniformLocation, UniformValue, VertexArrayId,
    VertexLayout,
};
use crate::{
    gfx::{
        camera::CameraUniform,
        error::{DeviceError, ShaderError},
    },
    wgpu_utils::{binding_types, DynamicUniformBuffer, UniformBuffer},
};

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Staging size for programs without named uniforms
const MIN_UNIFORM_BLOCK: usize = 16;

struct GpuBuffer {
    buffer: wgpu::Buffer,
    size: u64,
}

struct GpuVertexArray {
    buffer: BufferId,
    stride: u64,
    attributes: Vec<wgpu::VertexAttribute>,
}

struct GpuTexture {
    view: wgpu::TextureView,
    // Kept alive for the view
    _texture: wgpu::Texture,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PipelineKey {
    vertex_array: VertexArrayId,
    depth_test: bool,
    depth_write: bool,
    blend: bool,
}

struct GpuProgram {
    label: String,
    reflection: ProgramReflection,
    vertex_module: wgpu::ShaderModule,
    fragment_module: wgpu::ShaderModule,
    texture_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    staging: Vec<u8>,
    texture_units: HashMap<u32, u32>,
    camera_binding: Option<u32>,
}

/// A draw waiting for the next `present`
struct PendingDraw {
    program: ProgramId,
    key: PipelineKey,
    uniforms: Vec<u8>,
    /// (binding, texture) for every texture uniform of the program
    textures: Vec<(u32, Option<TextureId>)>,
    camera: Option<BufferId>,
    index_count: u32,
    first_index: u32,
    base_vertex: i32,
}

/// Depth attachment matching the current target size
struct DepthTarget {
    view: wgpu::TextureView,
    _texture: wgpu::Texture,
}

impl DepthTarget {
    fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Depth Texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            view,
            _texture: texture,
        }
    }
}

pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    color_format: wgpu::TextureFormat,
    depth: DepthTarget,

    camera_layout: wgpu::BindGroupLayout,
    uniform_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    fallback_texture: GpuTexture,
    fallback_camera: UniformBuffer<CameraUniform>,
    draw_uniforms: DynamicUniformBuffer,

    next_id: u32,
    buffers: HashMap<BufferId, GpuBuffer>,
    vertex_arrays: HashMap<VertexArrayId, GpuVertexArray>,
    programs: HashMap<ProgramId, GpuProgram>,
    textures: HashMap<TextureId, GpuTexture>,

    current_program: Option<ProgramId>,
    bound_vertex_array: Option<VertexArrayId>,
    texture_units: HashMap<u32, TextureId>,
    uniform_buffers: HashMap<u32, BufferId>,
    depth_test: bool,
    depth_write: bool,
    blend: bool,
    clear_color: [f32; 4],
    clear_requested: bool,

    pending: Vec<PendingDraw>,
    release_queue: ReleaseQueue,
}

impl WgpuDevice {
    /// Wraps an existing device, e.g. one created alongside a window surface.
    pub fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        color_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> Self {
        let camera_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Camera Bind Group Layout"),
            entries: &[binding_types::entry(0, binding_types::uniform())],
        });
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Uniform Bind Group Layout"),
            entries: &[binding_types::entry(0, binding_types::dynamic_uniform())],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Texture Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let fallback_texture = upload_rgba(&device, &queue, "Fallback White Texture", 1, 1, &[255; 4]);
        let fallback_camera = UniformBuffer::new_with_data(&device, &CameraUniform::default());
        let draw_uniforms = DynamicUniformBuffer::new(&device, 64 * 1024);
        let depth = DepthTarget::new(&device, width, height);

        Self {
            device,
            queue,
            color_format,
            depth,
            camera_layout,
            uniform_layout,
            sampler,
            fallback_texture,
            fallback_camera,
            draw_uniforms,
            next_id: 1,
            buffers: HashMap::new(),
            vertex_arrays: HashMap::new(),
            programs: HashMap::new(),
            textures: HashMap::new(),
            current_program: None,
            bound_vertex_array: None,
            texture_units: HashMap::new(),
            uniform_buffers: HashMap::new(),
            depth_test: false,
            depth_write: true,
            blend: false,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            clear_requested: false,
            pending: Vec::new(),
            release_queue: ReleaseQueue::new(),
        }
    }

    /// Creates a device without a window for offscreen rendering.
    pub fn new_headless(
        color_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> Result<Self, DeviceError> {
        pollster::block_on(async {
            let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
                backends: wgpu::Backends::all(),
                ..Default::default()
            });

            let adapter = instance
                .request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::HighPerformance,
                    compatible_surface: None,
                    force_fallback_adapter: false,
                })
                .await
                .map_err(|e| DeviceError::AllocationFailed {
                    label: "adapter".to_string(),
                    size: 0,
                    reason: e.to_string(),
                })?;

            let (device, queue) = adapter
                .request_device(&wgpu::DeviceDescriptor {
                    label: Some("Headless Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::default(),
                    trace: wgpu::Trace::Off,
                })
                .await
                .map_err(|e| DeviceError::AllocationFailed {
                    label: "device".to_string(),
                    size: 0,
                    reason: e.to_string(),
                })?;

            log::info!("Headless device created on {}", adapter.get_info().name);
            Ok(Self::new(device, queue, color_format, width, height))
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn color_format(&self) -> wgpu::TextureFormat {
        self.color_format
    }

    /// Number of draws recorded since the last `present`
    pub fn pending_draws(&self) -> usize {
        self.pending.len()
    }

    fn allocate_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn pipeline_for(&mut self, program_id: ProgramId, key: PipelineKey) -> bool {
        let Some(vertex_array) = self.vertex_arrays.get(&key.vertex_array) else {
            return false;
        };
        let Some(program) = self.programs.get_mut(&program_id) else {
            return false;
        };
        if program.pipelines.contains_key(&key) {
            return true;
        }

        let vertex_layout = wgpu::VertexBufferLayout {
            array_stride: vertex_array.stride,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &vertex_array.attributes,
        };

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(program.label.as_str()),
                layout: Some(&program.pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &program.vertex_module,
                    entry_point: Some(reflect::VERTEX_ENTRY),
                    buffers: &[vertex_layout],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &program.fragment_module,
                    entry_point: Some(reflect::FRAGMENT_ENTRY),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: self.color_format,
                        blend: key.blend.then_some(wgpu::BlendState::ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: key.depth_test && key.depth_write,
                    depth_compare: if key.depth_test {
                        wgpu::CompareFunction::Less
                    } else {
                        wgpu::CompareFunction::Always
                    },
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            });
        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            log::error!("Failed to create pipeline for '{}': {}", program.label, error);
            return false;
        }

        program.pipelines.insert(key, pipeline);
        true
    }

    fn texture_bind_group(&self, program: &GpuProgram, draw: &PendingDraw) -> wgpu::BindGroup {
        let mut entries = Vec::new();
        for (binding, texture) in &draw.textures {
            let view = texture
                .and_then(|t| self.textures.get(&t))
                .unwrap_or(&self.fallback_texture);
            entries.push(wgpu::BindGroupEntry {
                binding: *binding,
                resource: wgpu::BindingResource::TextureView(&view.view),
            });
        }
        for binding in &program.reflection.sampler_bindings {
            entries.push(wgpu::BindGroupEntry {
                binding: *binding,
                resource: wgpu::BindingResource::Sampler(&self.sampler),
            });
        }
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Texture Bind Group"),
            layout: &program.texture_layout,
            entries: &entries,
        })
    }

    /// Replays every draw recorded since the last call into `target`.
    ///
    /// The color and depth attachments are cleared when `clear` was requested
    /// since the last present and loaded otherwise.
    pub fn present(&mut self, target: &wgpu::TextureView) {
        let draws = std::mem::take(&mut self.pending);
        let clear = std::mem::take(&mut self.clear_requested);

        // Pack every draw's uniform snapshot into one buffer
        self.draw_uniforms.reset();
        let offsets: Vec<u32> = draws
            .iter()
            .map(|draw| self.draw_uniforms.push(&draw.uniforms))
            .collect();
        self.draw_uniforms.upload(&self.device, &self.queue);

        let uniform_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Draw Uniform Bind Group"),
            layout: &self.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: self.draw_uniforms.binding_resource(),
            }],
        });

        let mut camera_groups: HashMap<Option<BufferId>, wgpu::BindGroup> = HashMap::new();
        for draw in &draws {
            camera_groups.entry(draw.camera).or_insert_with(|| {
                let resource = draw
                    .camera
                    .and_then(|b| self.buffers.get(&b))
                    .map(|b| b.buffer.as_entire_binding())
                    .unwrap_or_else(|| self.fallback_camera.binding_resource());
                self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Camera Bind Group"),
                    layout: &self.camera_layout,
                    entries: &[wgpu::BindGroupEntry {
                        binding: 0,
                        resource,
                    }],
                })
            });
        }

        let texture_groups: Vec<Option<wgpu::BindGroup>> = draws
            .iter()
            .map(|draw| {
                self.programs
                    .get(&draw.program)
                    .map(|program| self.texture_bind_group(program, draw))
            })
            .collect();

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        {
            let [r, g, b, a] = self.clear_color;
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Forward Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: if clear {
                            wgpu::LoadOp::Clear(wgpu::Color {
                                r: r as f64,
                                g: g as f64,
                                b: b as f64,
                                a: a as f64,
                            })
                        } else {
                            wgpu::LoadOp::Load
                        },
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: if clear {
                            wgpu::LoadOp::Clear(1.0)
                        } else {
                            wgpu::LoadOp::Load
                        },
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            for ((draw, offset), texture_group) in draws.iter().zip(&offsets).zip(&texture_groups) {
                let (Some(program), Some(texture_group)) =
                    (self.programs.get(&draw.program), texture_group)
                else {
                    continue;
                };
                let Some(pipeline) = program.pipelines.get(&draw.key) else {
                    continue;
                };
                let Some(buffer) = self
                    .vertex_arrays
                    .get(&draw.key.vertex_array)
                    .and_then(|va| self.buffers.get(&va.buffer))
                else {
                    continue;
                };
                let Some(camera_group) = camera_groups.get(&draw.camera) else {
                    continue;
                };

                render_pass.set_pipeline(pipeline);
                render_pass.set_bind_group(0, camera_group, &[]);
                render_pass.set_bind_group(1, &uniform_group, &[*offset]);
                render_pass.set_bind_group(2, texture_group, &[]);
                render_pass.set_vertex_buffer(0, buffer.buffer.slice(..));
                render_pass.set_index_buffer(buffer.buffer.slice(..), wgpu::IndexFormat::Uint32);
                render_pass.draw_indexed(
                    draw.first_index..draw.first_index + draw.index_count,
                    draw.base_vertex,
                    0..1,
                );
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        log::trace!("Presented {} draws", draws.len());
    }
}

fn upload_rgba(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    width: u32,
    height: u32,
    data: &[u8],
) -> GpuTexture {
    let size = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        data,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * width),
            rows_per_image: Some(height),
        },
        size,
    );

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    GpuTexture {
        view,
        _texture: texture,
    }
}

impl RenderDevice for WgpuDevice {
    fn create_buffer(&mut self, desc: &BufferDescriptor<'_>) -> Result<BufferId, DeviceError> {
        let max = self.device.limits().max_buffer_size;
        if desc.size > max {
            return Err(DeviceError::AllocationFailed {
                label: desc.label.to_string(),
                size: desc.size,
                reason: format!("exceeds the device limit of {max} bytes"),
            });
        }

        let usage = match desc.usage {
            BufferUsage::Geometry => {
                wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST
            }
            BufferUsage::Uniform => wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        };

        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(desc.label),
            size: wgpu::util::align_to(desc.size, wgpu::COPY_BUFFER_ALIGNMENT),
            usage,
            mapped_at_creation: false,
        });
        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(DeviceError::AllocationFailed {
                label: desc.label.to_string(),
                size: desc.size,
                reason: error.to_string(),
            });
        }

        let id = BufferId(self.allocate_id());
        self.buffers.insert(
            id,
            GpuBuffer {
                buffer,
                size: desc.size,
            },
        );
        Ok(id)
    }

    fn write_buffer(
        &mut self,
        buffer: BufferId,
        offset: u64,
        data: &[u8],
    ) -> Result<(), DeviceError> {
        let target = self
            .buffers
            .get(&buffer)
            .ok_or(DeviceError::UnknownResource {
                kind: "buffer",
                id: buffer.0,
            })?;
        let len = data.len() as u64;
        match offset.checked_add(len) {
            Some(end) if end <= target.size => {}
            _ => {
                return Err(DeviceError::OutOfBounds {
                    buffer: buffer.0,
                    offset,
                    len,
                    size: target.size,
                })
            }
        }

        // wgpu copies in 4-byte units
        if offset % wgpu::COPY_BUFFER_ALIGNMENT != 0 || len % wgpu::COPY_BUFFER_ALIGNMENT != 0 {
            return Err(DeviceError::Misaligned {
                buffer: buffer.0,
                offset,
                len,
            });
        }
        self.queue.write_buffer(&target.buffer, offset, data);
        Ok(())
    }

    fn destroy_buffer(&mut self, buffer: BufferId) {
        if let Some(gpu) = self.buffers.remove(&buffer) {
            self.uniform_buffers.retain(|_, b| *b != buffer);
            gpu.buffer.destroy();
        }
    }

    fn create_vertex_array(
        &mut self,
        buffer: BufferId,
        layout: &VertexLayout,
    ) -> Result<VertexArrayId, DeviceError> {
        if !self.buffers.contains_key(&buffer) {
            return Err(DeviceError::UnknownResource {
                kind: "buffer",
                id: buffer.0,
            });
        }
        let attributes = layout
            .attributes
            .iter()
            .map(|a| wgpu::VertexAttribute {
                format: match a.format {
                    AttributeFormat::Float32x2 => wgpu::VertexFormat::Float32x2,
                    AttributeFormat::Float32x3 => wgpu::VertexFormat::Float32x3,
                },
                offset: a.offset,
                shader_location: a.location,
            })
            .collect();

        let id = VertexArrayId(self.allocate_id());
        self.vertex_arrays.insert(
            id,
            GpuVertexArray {
                buffer,
                stride: layout.stride,
                attributes,
            },
        );
        Ok(id)
    }

    fn bind_vertex_array(&mut self, vertex_array: VertexArrayId) {
        if self.vertex_arrays.contains_key(&vertex_array) {
            self.bound_vertex_array = Some(vertex_array);
        } else {
            log::warn!("Binding unknown vertex array {}", vertex_array);
        }
    }

    fn destroy_vertex_array(&mut self, vertex_array: VertexArrayId) {
        if self.vertex_arrays.remove(&vertex_array).is_some() {
            for program in self.programs.values_mut() {
                program
                    .pipelines
                    .retain(|key, _| key.vertex_array != vertex_array);
            }
            if self.bound_vertex_array == Some(vertex_array) {
                self.bound_vertex_array = None;
            }
        }
    }

    fn create_program(
        &mut self,
        label: &str,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<ProgramId, ShaderError> {
        let reflection = reflect::reflect_program(vertex_source, fragment_source)?;

        let vertex_label = format!("{label} (vertex)");
        let fragment_label = format!("{label} (fragment)");
        let layout_label = format!("{label} Pipeline Layout");

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let vertex_module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(vertex_label.as_str()),
                source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(vertex_source)),
            });
        let fragment_module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(fragment_label.as_str()),
                source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(fragment_source)),
            });

        let texture_entries: Vec<wgpu::BindGroupLayoutEntry> = reflection
            .texture_bindings
            .iter()
            .map(|&binding| binding_types::entry(binding, binding_types::texture_2d()))
            .chain(reflection.sampler_bindings.iter().map(|&binding| {
                binding_types::entry(
                    binding,
                    binding_types::sampler(wgpu::SamplerBindingType::Filtering),
                )
            }))
            .collect();
        let texture_layout = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Program Texture Layout"),
                entries: &texture_entries,
            });

        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(layout_label.as_str()),
                bind_group_layouts: &[&self.camera_layout, &self.uniform_layout, &texture_layout],
                push_constant_ranges: &[],
            });

        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(ShaderError::Link {
                diagnostics: error.to_string(),
            });
        }

        let mut staging = reflection.staging_block();
        if staging.len() < MIN_UNIFORM_BLOCK {
            staging.resize(MIN_UNIFORM_BLOCK, 0);
        }

        let id = ProgramId(self.allocate_id());
        self.programs.insert(
            id,
            GpuProgram {
                label: label.to_string(),
                reflection,
                vertex_module,
                fragment_module,
                texture_layout,
                pipeline_layout,
                pipelines: HashMap::new(),
                staging,
                texture_units: HashMap::new(),
                camera_binding: None,
            },
        );
        Ok(id)
    }

    fn destroy_program(&mut self, program: ProgramId) {
        if self.programs.remove(&program).is_some() && self.current_program == Some(program) {
            self.current_program = None;
        }
    }

    fn uniform_location(&mut self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        let index = self.programs.get(&program)?.reflection.find(name)?;
        Some(UniformLocation { program, index })
    }

    fn bind_uniform_block(&mut self, program: ProgramId, block: &str, binding: u32) -> bool {
        let Some(program) = self.programs.get_mut(&program) else {
            return false;
        };
        // Block bindings are fixed by the WGSL source; only the camera group is
        // rebindable.
        match program.reflection.block_binding(block) {
            Some(_) => {
                program.camera_binding = Some(binding);
                true
            }
            None => false,
        }
    }

    fn use_program(&mut self, program: ProgramId) {
        if self.programs.contains_key(&program) {
            self.current_program = Some(program);
        } else {
            log::warn!("Using unknown program {}", program);
        }
    }

    fn set_uniform(&mut self, location: UniformLocation, value: &UniformValue) {
        let Some(program) = self.programs.get_mut(&location.program) else {
            return;
        };
        let Some(uniform) = program.reflection.uniform(location.index).cloned() else {
            return;
        };
        let written = match uniform.kind {
            UniformKind::Texture { .. } => match reflect::texture_unit(value) {
                Some(unit) => {
                    program.texture_units.insert(location.index, unit);
                    true
                }
                None => false,
            },
            _ => reflect::write_uniform(&mut program.staging, &uniform, value),
        };
        if !written {
            log::warn!(
                "Uniform '{}' of program '{}' does not accept {:?}",
                uniform.name,
                program.label,
                value
            );
        }
    }

    fn create_texture(&mut self, desc: &TextureDescriptor<'_>) -> Result<TextureId, DeviceError> {
        if desc.data.len() != desc.expected_len() || desc.width == 0 || desc.height == 0 {
            return Err(DeviceError::InvalidTextureData {
                label: desc.label.to_string(),
                expected: desc.expected_len(),
                actual: desc.data.len(),
            });
        }
        let texture = upload_rgba(
            &self.device,
            &self.queue,
            desc.label,
            desc.width,
            desc.height,
            desc.data,
        );
        let id = TextureId(self.allocate_id());
        self.textures.insert(id, texture);
        Ok(id)
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        if self.textures.remove(&texture).is_some() {
            self.texture_units.retain(|_, t| *t != texture);
        }
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureId) {
        self.texture_units.insert(unit, texture);
    }

    fn bind_uniform_buffer(&mut self, binding: u32, buffer: BufferId) {
        self.uniform_buffers.insert(binding, buffer);
    }

    fn set_depth_test(&mut self, enabled: bool) {
        self.depth_test = enabled;
    }

    fn set_blend(&mut self, enabled: bool) {
        self.blend = enabled;
    }

    fn set_depth_write(&mut self, enabled: bool) {
        self.depth_write = enabled;
    }

    fn set_clear_color(&mut self, color: [f32; 4]) {
        self.clear_color = color;
    }

    /// Recreates the depth attachment for a new target size.
    fn resize(&mut self, width: u32, height: u32) {
        self.depth = DepthTarget::new(&self.device, width, height);
    }

    fn clear(&mut self) {
        self.clear_requested = true;
    }

    fn draw_indexed(&mut self, index_count: u32, index_byte_offset: u32, base_vertex: u32) {
        let (Some(program_id), Some(vertex_array)) =
            (self.current_program, self.bound_vertex_array)
        else {
            log::warn!("Draw issued without a current program and vertex array");
            return;
        };

        let key = PipelineKey {
            vertex_array,
            depth_test: self.depth_test,
            depth_write: self.depth_write,
            blend: self.blend,
        };
        if !self.pipeline_for(program_id, key) {
            return;
        }

        let Some(program) = self.programs.get(&program_id) else {
            return;
        };
        let textures = program
            .reflection
            .uniforms
            .iter()
            .enumerate()
            .filter_map(|(index, uniform)| match uniform.kind {
                UniformKind::Texture { binding } => {
                    let unit = program
                        .texture_units
                        .get(&(index as u32))
                        .copied()
                        .unwrap_or(0);
                    Some((binding, self.texture_units.get(&unit).copied()))
                }
                _ => None,
            })
            .collect();
        let camera = program
            .camera_binding
            .and_then(|binding| self.uniform_buffers.get(&binding).copied());

        self.pending.push(PendingDraw {
            program: program_id,
            key,
            uniforms: program.staging.clone(),
            textures,
            camera,
            index_count,
            first_index: index_byte_offset / 4,
            base_vertex: base_vertex as i32,
        });
    }

    fn release_queue(&self) -> ReleaseQueue {
        self.release_queue.clone()
    }
}
