//! WGSL program validation and uniform reflection.
//!
//! Both device backends run programs through [`reflect_program`] so a shader
//! that fails here fails identically on the real GPU and in headless tests.

use std::collections::BTreeMap;

use wgpu::naga::{
    self,
    valid::{Capabilities, ValidationFlags, Validator},
    AddressSpace, ArraySize, ImageClass, ScalarKind, TypeInner, VectorSize,
};

use super::UniformValue;
use crate::gfx::error::{ShaderError, ShaderStage};

pub const VERTEX_ENTRY: &str = "vs_main";
pub const FRAGMENT_ENTRY: &str = "fs_main";

/// Bind group holding the camera block
pub const CAMERA_GROUP: u32 = 0;
/// Bind group holding the struct of named uniforms
pub const UNIFORM_GROUP: u32 = 1;
/// Bind group holding textures and samplers
pub const TEXTURE_GROUP: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformKind {
    Float,
    /// `i32`/`u32`; booleans are written as 0/1
    Int,
    Vec3,
    Vec4,
    Mat4,
    Vec4Array { len: u32, stride: u32 },
    /// A `texture_2d` variable; its value is the texture unit it samples from
    Texture { binding: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflectedUniform {
    pub name: String,
    pub kind: UniformKind,
    /// Byte offset inside the uniform block (0 for textures)
    pub offset: u32,
    pub size: u32,
}

/// Everything a device needs to know about a linked program
#[derive(Debug, Clone, Default)]
pub struct ProgramReflection {
    /// Indexed by `UniformLocation::index`
    pub uniforms: Vec<ReflectedUniform>,
    /// Size of the `@group(1) @binding(0)` struct, 0 when absent
    pub uniform_block_size: u32,
    /// Struct type names of the blocks declared in group 0, by binding
    pub blocks: BTreeMap<u32, String>,
    pub texture_bindings: Vec<u32>,
    pub sampler_bindings: Vec<u32>,
}

impl ProgramReflection {
    pub fn find(&self, name: &str) -> Option<u32> {
        self.uniforms
            .iter()
            .position(|u| u.name == name)
            .map(|i| i as u32)
    }

    pub fn uniform(&self, index: u32) -> Option<&ReflectedUniform> {
        self.uniforms.get(index as usize)
    }

    /// Binding of the group-0 block whose struct is called `block`
    pub fn block_binding(&self, block: &str) -> Option<u32> {
        self.blocks
            .iter()
            .find(|(_, name)| name.as_str() == block)
            .map(|(binding, _)| *binding)
    }

    /// A zeroed staging block of the right size
    pub fn staging_block(&self) -> Vec<u8> {
        vec![0; self.uniform_block_size as usize]
    }
}

/// Parses and validates both stages and merges their resource declarations.
pub fn reflect_program(
    vertex_source: &str,
    fragment_source: &str,
) -> Result<ProgramReflection, ShaderError> {
    let vertex = parse_stage(ShaderStage::Vertex, vertex_source)?;
    let fragment = parse_stage(ShaderStage::Fragment, fragment_source)?;

    require_entry(&vertex, ShaderStage::Vertex)?;
    require_entry(&fragment, ShaderStage::Fragment)?;

    let mut reflection = ProgramReflection::default();
    let mut block: Option<Vec<ReflectedUniform>> = None;
    let mut textures = BTreeMap::new();

    for module in [&vertex, &fragment] {
        let stage_block = collect_resources(module, &mut reflection, &mut textures)?;
        if let Some((members, size)) = stage_block {
            match &block {
                Some(existing) if *existing != members || reflection.uniform_block_size != size => {
                    return Err(ShaderError::Link {
                        diagnostics: "uniform block layout differs between vertex and fragment stages"
                            .to_string(),
                    });
                }
                Some(_) => {}
                None => {
                    reflection.uniform_block_size = size;
                    block = Some(members);
                }
            }
        }
    }

    reflection.uniforms = block.unwrap_or_default();
    for (name, binding) in textures {
        reflection.texture_bindings.push(binding);
        reflection.uniforms.push(ReflectedUniform {
            name,
            kind: UniformKind::Texture { binding },
            offset: 0,
            size: 0,
        });
    }
    reflection.texture_bindings.sort_unstable();
    reflection.sampler_bindings.sort_unstable();
    reflection.sampler_bindings.dedup();

    Ok(reflection)
}

fn parse_stage(stage: ShaderStage, source: &str) -> Result<naga::Module, ShaderError> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| ShaderError::Compile {
        stage,
        diagnostics: e.emit_to_string(source),
    })?;

    Validator::new(ValidationFlags::all(), Capabilities::all())
        .validate(&module)
        .map_err(|e| ShaderError::Compile {
            stage,
            diagnostics: e.emit_to_string(source),
        })?;

    Ok(module)
}

fn require_entry(module: &naga::Module, stage: ShaderStage) -> Result<(), ShaderError> {
    let (name, naga_stage) = match stage {
        ShaderStage::Vertex => (VERTEX_ENTRY, naga::ShaderStage::Vertex),
        ShaderStage::Fragment => (FRAGMENT_ENTRY, naga::ShaderStage::Fragment),
    };
    if module
        .entry_points
        .iter()
        .any(|ep| ep.name == name && ep.stage == naga_stage)
    {
        Ok(())
    } else {
        Err(ShaderError::Link {
            diagnostics: format!("{stage} stage has no entry point `{name}`"),
        })
    }
}

/// Walks the module globals. Returns the named-uniform struct if the module
/// declares one.
fn collect_resources(
    module: &naga::Module,
    reflection: &mut ProgramReflection,
    textures: &mut BTreeMap<String, u32>,
) -> Result<Option<(Vec<ReflectedUniform>, u32)>, ShaderError> {
    let mut block = None;

    for (_, var) in module.global_variables.iter() {
        let Some(binding) = &var.binding else {
            continue;
        };
        let ty = &module.types[var.ty];

        match (var.space, binding.group) {
            (AddressSpace::Uniform, CAMERA_GROUP) => {
                let name = ty.name.clone().unwrap_or_default();
                if let Some(existing) = reflection.blocks.get(&binding.binding) {
                    if *existing != name {
                        return Err(ShaderError::Link {
                            diagnostics: format!(
                                "block at binding {} is `{existing}` in one stage and `{name}` in the other",
                                binding.binding
                            ),
                        });
                    }
                }
                reflection.blocks.insert(binding.binding, name);
            }
            (AddressSpace::Uniform, UNIFORM_GROUP) if binding.binding == 0 => {
                let TypeInner::Struct { members, .. } = &ty.inner else {
                    return Err(ShaderError::Link {
                        diagnostics: "uniforms at @group(1) @binding(0) must be a struct".to_string(),
                    });
                };
                let size = ty.inner.size(module.to_ctx());
                let mut uniforms = Vec::with_capacity(members.len());
                for member in members {
                    let Some(name) = &member.name else { continue };
                    let member_ty = &module.types[member.ty].inner;
                    let Some(kind) = uniform_kind(module, member_ty) else {
                        log::debug!("Uniform '{}' has an unsupported type, skipping", name);
                        continue;
                    };
                    uniforms.push(ReflectedUniform {
                        name: name.clone(),
                        kind,
                        offset: member.offset,
                        size: member_ty.size(module.to_ctx()),
                    });
                }
                block = Some((uniforms, size));
            }
            (AddressSpace::Handle, TEXTURE_GROUP) => match &ty.inner {
                TypeInner::Image {
                    class: ImageClass::Sampled { .. },
                    ..
                } => {
                    let name = var.name.clone().unwrap_or_default();
                    if let Some(&existing) = textures.get(&name) {
                        if existing != binding.binding {
                            return Err(ShaderError::Link {
                                diagnostics: format!(
                                    "texture `{name}` is bound at {existing} and {} in different stages",
                                    binding.binding
                                ),
                            });
                        }
                    }
                    textures.insert(name, binding.binding);
                }
                TypeInner::Sampler { .. } => reflection.sampler_bindings.push(binding.binding),
                _ => {}
            },
            _ => {}
        }
    }

    Ok(block)
}

fn uniform_kind(module: &naga::Module, inner: &TypeInner) -> Option<UniformKind> {
    match *inner {
        TypeInner::Scalar(scalar) => match scalar.kind {
            ScalarKind::Float => Some(UniformKind::Float),
            ScalarKind::Sint | ScalarKind::Uint | ScalarKind::Bool => Some(UniformKind::Int),
            _ => None,
        },
        TypeInner::Vector { size, scalar } if scalar.kind == ScalarKind::Float => match size {
            VectorSize::Tri => Some(UniformKind::Vec3),
            VectorSize::Quad => Some(UniformKind::Vec4),
            _ => None,
        },
        TypeInner::Matrix {
            columns: VectorSize::Quad,
            rows: VectorSize::Quad,
            ..
        } => Some(UniformKind::Mat4),
        // Only `array<vec4<f32>, N>` is settable
        TypeInner::Array {
            base,
            size: ArraySize::Constant(len),
            stride,
        } => match module.types[base].inner {
            TypeInner::Vector {
                size: VectorSize::Quad,
                scalar,
            } if scalar.kind == ScalarKind::Float && scalar.width == 4 => {
                Some(UniformKind::Vec4Array {
                    len: len.get(),
                    stride,
                })
            }
            _ => None,
        },
        _ => None,
    }
}

/// Writes `value` into the staging bytes of `uniform`.
///
/// Returns false when the value does not fit the uniform's declared type.
pub fn write_uniform(staging: &mut [u8], uniform: &ReflectedUniform, value: &UniformValue) -> bool {
    let offset = uniform.offset as usize;

    match (uniform.kind, value) {
        (UniformKind::Float, UniformValue::Float(v)) => put(staging, offset, bytemuck::bytes_of(v)),
        (UniformKind::Int, UniformValue::Int(v)) => put(staging, offset, bytemuck::bytes_of(v)),
        (UniformKind::Int, UniformValue::Bool(v)) => {
            put(staging, offset, bytemuck::bytes_of(&(*v as i32)))
        }
        (UniformKind::Vec3, UniformValue::Vec3(v)) => {
            let v: &[f32; 3] = v.as_ref();
            put(staging, offset, bytemuck::cast_slice(v))
        }
        (UniformKind::Vec4, UniformValue::Vec4(v)) => {
            let v: &[f32; 4] = v.as_ref();
            put(staging, offset, bytemuck::cast_slice(v))
        }
        (UniformKind::Mat4, UniformValue::Mat4(m)) => {
            let cols: &[[f32; 4]; 4] = m.as_ref();
            put(staging, offset, bytemuck::cast_slice(cols))
        }
        (UniformKind::Vec4Array { len, stride }, UniformValue::Vec4Array(values)) => {
            values.iter().take(len as usize).enumerate().all(|(i, v)| {
                let v: &[f32; 4] = v.as_ref();
                put(staging, offset + i * stride as usize, bytemuck::cast_slice(v))
            })
        }
        _ => false,
    }
}

/// Texture unit carried by a value written to a texture uniform
pub fn texture_unit(value: &UniformValue) -> Option<u32> {
    match value {
        UniformValue::Int(unit) => u32::try_from(*unit).ok(),
        _ => None,
    }
}

fn put(staging: &mut [u8], offset: usize, bytes: &[u8]) -> bool {
    match staging.get_mut(offset..offset + bytes.len()) {
        Some(dst) => {
            dst.copy_from_slice(bytes);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{Matrix4, SquareMatrix, Vector4};

    const VS: &str = r#"
struct CameraData {
    view: mat4x4<f32>,
    projection: mat4x4<f32>,
    view_pos: vec3<f32>,
    _pad: f32,
}
@group(0) @binding(0) var<uniform> camera: CameraData;

struct Uniforms {
    model: mat4x4<f32>,
    color: vec4<f32>,
    clip_planes: array<vec4<f32>, 8>,
    light_pos: vec3<f32>,
    clip_plane_count: i32,
}
@group(1) @binding(0) var<uniform> u: Uniforms;

@vertex
fn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return camera.projection * camera.view * u.model * vec4<f32>(position, 1.0);
}
"#;

    const FS: &str = r#"
struct Uniforms {
    model: mat4x4<f32>,
    color: vec4<f32>,
    clip_planes: array<vec4<f32>, 8>,
    light_pos: vec3<f32>,
    clip_plane_count: i32,
}
@group(1) @binding(0) var<uniform> u: Uniforms;
@group(2) @binding(0) var texture_diffuse: texture_2d<f32>;
@group(2) @binding(1) var texture_sampler: sampler;

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return u.color * textureSample(texture_diffuse, texture_sampler, vec2<f32>(0.5, 0.5));
}
"#;

    #[test]
    fn test_reflects_uniforms_blocks_and_textures() {
        let reflection = reflect_program(VS, FS).unwrap();

        assert_eq!(reflection.block_binding("CameraData"), Some(0));
        assert_eq!(reflection.texture_bindings, vec![0]);
        assert_eq!(reflection.sampler_bindings, vec![1]);

        let model = reflection.uniform(reflection.find("model").unwrap()).unwrap();
        assert_eq!(model.kind, UniformKind::Mat4);
        assert_eq!(model.offset, 0);

        let planes = reflection
            .uniform(reflection.find("clip_planes").unwrap())
            .unwrap();
        assert_eq!(planes.kind, UniformKind::Vec4Array { len: 8, stride: 16 });
        assert_eq!(planes.offset, 80);

        let diffuse = reflection
            .uniform(reflection.find("texture_diffuse").unwrap())
            .unwrap();
        assert_eq!(diffuse.kind, UniformKind::Texture { binding: 0 });

        assert!(reflection.find("missing").is_none());
        assert_eq!(reflection.uniform_block_size % 16, 0);
    }

    #[test]
    fn test_only_vec4_arrays_are_reflected() {
        let extra = "clip_plane_count: i32,\n    bones: array<mat4x4<f32>, 2>,\n    ids: array<vec4<i32>, 2>,\n}";
        let vs = VS.replace("clip_plane_count: i32,\n}", extra);
        let fs = FS.replace("clip_plane_count: i32,\n}", extra);
        let reflection = reflect_program(&vs, &fs).unwrap();

        assert!(reflection.find("bones").is_none());
        assert!(reflection.find("ids").is_none());
        let planes = reflection
            .uniform(reflection.find("clip_planes").unwrap())
            .unwrap();
        assert_eq!(planes.kind, UniformKind::Vec4Array { len: 8, stride: 16 });
    }

    #[test]
    fn test_parse_error_reports_stage() {
        let err = reflect_program("fn vs_main( {", FS).unwrap_err();
        match err {
            ShaderError::Compile { stage, diagnostics } => {
                assert_eq!(stage, ShaderStage::Vertex);
                assert!(!diagnostics.is_empty());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_entry_point_is_link_error() {
        let fs = FS.replace("fs_main", "main");
        assert!(matches!(
            reflect_program(VS, &fs),
            Err(ShaderError::Link { .. })
        ));
    }

    #[test]
    fn test_mismatched_blocks_fail_to_link() {
        let fs = FS.replace("color: vec4<f32>,", "color: vec4<f32>,\n    extra: vec4<f32>,");
        assert!(matches!(
            reflect_program(VS, &fs),
            Err(ShaderError::Link { .. })
        ));
    }

    #[test]
    fn test_write_uniform_checks_types() {
        let reflection = reflect_program(VS, FS).unwrap();
        let mut staging = reflection.staging_block();
        let model = reflection.uniform(reflection.find("model").unwrap()).unwrap();

        assert!(write_uniform(
            &mut staging,
            model,
            &UniformValue::Mat4(Matrix4::identity())
        ));
        assert_eq!(&staging[0..4], bytemuck::bytes_of(&1.0f32));
        assert!(!write_uniform(&mut staging, model, &UniformValue::Float(1.0)));

        let count = reflection
            .uniform(reflection.find("clip_plane_count").unwrap())
            .unwrap();
        assert!(write_uniform(&mut staging, count, &UniformValue::Bool(true)));

        let planes = reflection
            .uniform(reflection.find("clip_planes").unwrap())
            .unwrap();
        let values = vec![Vector4::new(0.0, 1.0, 0.0, 0.0); 9];
        assert!(write_uniform(
            &mut staging,
            planes,
            &UniformValue::Vec4Array(values)
        ));
    }
}
