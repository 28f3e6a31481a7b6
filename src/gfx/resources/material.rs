//! Materials: a shared shader plus the uniform values and textures it is
//! drawn with.
//!
//! Values are cached on the CPU and pushed to the program every time the
//! material is bound, so several materials can share one shader.

use std::{cell::RefCell, collections::BTreeMap, rc::Rc};

use cgmath::{Matrix4, Vector3, Vector4};

use super::{shader::SharedShader, texture::SharedTexture};
use crate::gfx::device::{RenderDevice, UniformValue};

pub type SharedMaterial = Rc<RefCell<Material>>;

#[derive(Debug, Clone)]
pub struct Material {
    shader: SharedShader,
    uniforms: BTreeMap<String, UniformValue>,
    /// Bound to consecutive texture units in name order
    textures: BTreeMap<String, SharedTexture>,
    transparent: bool,
}

impl Material {
    pub fn new(shader: SharedShader) -> Self {
        Self {
            shader,
            uniforms: BTreeMap::new(),
            textures: BTreeMap::new(),
            transparent: false,
        }
    }

    /// Wraps the material for sharing between entities
    pub fn shared(self) -> SharedMaterial {
        Rc::new(RefCell::new(self))
    }

    pub fn shader(&self) -> &SharedShader {
        &self.shader
    }

    /// Makes the shader active and applies every cached value.
    pub fn bind(&self, device: &mut dyn RenderDevice) {
        self.shader.use_program(device);
        self.apply(device);
    }

    /// Pushes the cached uniforms and binds the textures to units 0, 1, ...
    /// without changing the active program.
    pub fn apply(&self, device: &mut dyn RenderDevice) {
        if !self.shader.is_valid() {
            return;
        }

        for (name, value) in &self.uniforms {
            self.shader.set_uniform(device, name, value);
        }

        for (unit, (name, texture)) in self.textures.iter().enumerate() {
            let unit = unit as u32;
            texture.bind(device, unit);
            self.shader.set_uniform_int(device, name, unit as i32);
        }
    }

    pub fn set_uniform(&mut self, name: &str, value: UniformValue) {
        self.uniforms.insert(name.to_string(), value);
    }

    pub fn set_float(&mut self, name: &str, value: f32) {
        self.set_uniform(name, UniformValue::Float(value));
    }

    pub fn set_int(&mut self, name: &str, value: i32) {
        self.set_uniform(name, UniformValue::Int(value));
    }

    pub fn set_bool(&mut self, name: &str, value: bool) {
        self.set_uniform(name, UniformValue::Bool(value));
    }

    pub fn set_vec3(&mut self, name: &str, value: Vector3<f32>) {
        self.set_uniform(name, UniformValue::Vec3(value));
    }

    pub fn set_vec4(&mut self, name: &str, value: Vector4<f32>) {
        self.set_uniform(name, UniformValue::Vec4(value));
    }

    pub fn set_mat4(&mut self, name: &str, value: Matrix4<f32>) {
        self.set_uniform(name, UniformValue::Mat4(value));
    }

    pub fn set_texture(&mut self, name: &str, texture: SharedTexture) {
        self.textures.insert(name.to_string(), texture);
    }

    pub fn uniform(&self, name: &str) -> Option<&UniformValue> {
        self.uniforms.get(name)
    }

    pub fn texture(&self, name: &str) -> Option<&SharedTexture> {
        self.textures.get(name)
    }

    pub fn textures(&self) -> impl Iterator<Item = (&str, &SharedTexture)> {
        self.textures.iter().map(|(name, t)| (name.as_str(), t))
    }

    pub fn set_transparent(&mut self, transparent: bool) {
        self.transparent = transparent;
    }

    pub fn is_transparent(&self) -> bool {
        self.transparent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::{
        device::{DeviceCommand, RecordingDevice},
        resources::{
            shader::ShaderProgram,
            texture::{Texture, TextureKind},
        },
        test_support::ShaderDir,
    };
    use std::path::Path;

    fn mesh_shader(device: &mut RecordingDevice, dir: &ShaderDir) -> SharedShader {
        let (vs, fs) = dir.mesh("mesh");
        ShaderProgram::load(device, "mesh", vs, fs)
    }

    #[test]
    fn test_bind_pushes_uniforms_after_use() {
        let dir = ShaderDir::new();
        let mut device = RecordingDevice::new();
        let shader = mesh_shader(&mut device, &dir);
        let program = shader.program().unwrap();

        let mut material = Material::new(shader);
        material.set_vec4("color", Vector4::new(1.0, 0.5, 0.25, 1.0));
        material.set_float("shininess", 16.0);
        device.take_commands();

        material.bind(&mut device);
        let commands = device.take_commands();
        assert_eq!(commands[0], DeviceCommand::UseProgram(program));
        assert_eq!(commands.len(), 3);
        assert_eq!(
            device.uniform_floats(program, "color"),
            Some(vec![1.0, 0.5, 0.25, 1.0])
        );
        assert_eq!(device.uniform_floats(program, "shininess"), Some(vec![16.0]));
    }

    #[test]
    fn test_last_write_wins() {
        let dir = ShaderDir::new();
        let mut device = RecordingDevice::new();
        let mut material = Material::new(mesh_shader(&mut device, &dir));

        material.set_float("shininess", 8.0);
        material.set_float("shininess", 64.0);
        assert_eq!(material.uniform("shininess"), Some(&UniformValue::Float(64.0)));

        material.bind(&mut device);
        let program = material.shader().program().unwrap();
        assert_eq!(device.uniform_floats(program, "shininess"), Some(vec![64.0]));
    }

    #[test]
    fn test_textures_bind_to_sequential_units() {
        let dir = ShaderDir::new();
        let mut device = RecordingDevice::new();
        let mut material = Material::new(mesh_shader(&mut device, &dir));

        let diffuse = Rc::new(
            Texture::load(&mut device, Path::new("missing_d.png"), TextureKind::Diffuse).unwrap(),
        );
        let specular = Rc::new(
            Texture::load(&mut device, Path::new("missing_s.png"), TextureKind::Specular).unwrap(),
        );
        material.set_texture("texture_specular", specular.clone());
        material.set_texture("texture_diffuse", diffuse.clone());
        device.take_commands();

        material.bind(&mut device);
        let binds: Vec<_> = device
            .commands()
            .iter()
            .filter_map(|c| match c {
                DeviceCommand::BindTexture { unit, texture } => Some((*unit, *texture)),
                _ => None,
            })
            .collect();
        assert_eq!(binds, vec![(0, diffuse.id()), (1, specular.id())]);

        assert!(device.commands().contains(&DeviceCommand::SetUniform {
            program: material.shader().program().unwrap(),
            name: "texture_specular".to_string(),
            value: UniformValue::Int(1),
        }));
    }

    #[test]
    fn test_bind_with_invalid_shader_is_noop() {
        let mut device = RecordingDevice::new();
        let shader = Rc::new(ShaderProgram::new("broken", "/nope.vert", "/nope.frag"));
        let mut material = Material::new(shader);
        material.set_float("shininess", 1.0);

        material.bind(&mut device);
        assert!(device.commands().is_empty());
    }

    #[test]
    fn test_transparency_defaults_off() {
        let shader = Rc::new(ShaderProgram::new("s", "a", "b"));
        let mut material = Material::new(shader);
        assert!(!material.is_transparent());
        material.set_transparent(true);
        assert!(material.is_transparent());
    }
}
