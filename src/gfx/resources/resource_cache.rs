//! Deduplicating cache for shaders and textures
//!
//! Shaders are keyed by logical name, textures by path. Every key maps to one
//! shared instance for as long as the cache holds it, so loading the same
//! asset twice hands out the same `Rc`.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    rc::Rc,
};

use super::{
    shader::{ShaderProgram, SharedShader},
    texture::{SharedTexture, Texture, TextureKind},
};
use crate::gfx::{device::RenderDevice, error::TextureError};

#[derive(Debug, Default)]
pub struct ResourceCache {
    shaders: HashMap<String, SharedShader>,
    textures: HashMap<PathBuf, SharedTexture>,
}

impl ResourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the shader cached under `name`, compiling it from the given
    /// sources on first use.
    ///
    /// On a cache hit the paths are ignored. A shader that fails to compile is
    /// still cached so a later [`reload_all_shaders`](Self::reload_all_shaders)
    /// can bring it back.
    pub fn load_shader(
        &mut self,
        device: &mut dyn RenderDevice,
        name: &str,
        vertex_path: impl AsRef<Path>,
        fragment_path: impl AsRef<Path>,
    ) -> SharedShader {
        if let Some(shader) = self.shaders.get(name) {
            return Rc::clone(shader);
        }

        let shader = ShaderProgram::load(
            device,
            name,
            vertex_path.as_ref(),
            fragment_path.as_ref(),
        );
        self.shaders.insert(name.to_string(), Rc::clone(&shader));
        shader
    }

    /// Returns the texture cached under `path`, loading it on first use.
    ///
    /// Unreadable images are replaced by the magenta placeholder, which is
    /// cached like any other texture. The error case is the device refusing
    /// the upload altogether.
    pub fn load_texture(
        &mut self,
        device: &mut dyn RenderDevice,
        path: impl AsRef<Path>,
        kind: TextureKind,
    ) -> Result<SharedTexture, TextureError> {
        let path = path.as_ref();
        if let Some(texture) = self.textures.get(path) {
            return Ok(Rc::clone(texture));
        }

        let texture = Rc::new(Texture::load(device, path, kind)?);
        self.textures.insert(path.to_path_buf(), Rc::clone(&texture));
        Ok(texture)
    }

    pub fn get_shader(&self, name: &str) -> Option<SharedShader> {
        self.shaders.get(name).cloned()
    }

    pub fn get_texture(&self, path: impl AsRef<Path>) -> Option<SharedTexture> {
        self.textures.get(path.as_ref()).cloned()
    }

    /// Recompiles every cached shader in place. Returns how many compiled.
    pub fn reload_all_shaders(&mut self, device: &mut dyn RenderDevice) -> usize {
        let mut names: Vec<&String> = self.shaders.keys().collect();
        names.sort();

        let mut compiled = 0;
        for name in names {
            if self.shaders[name].reload(device) {
                compiled += 1;
            }
        }
        log::info!(
            "Reloaded shaders: {}/{} compiled",
            compiled,
            self.shaders.len()
        );
        compiled
    }

    /// Drops every cached reference and frees whatever nobody else holds.
    pub fn clear(&mut self, device: &mut dyn RenderDevice) {
        self.shaders.clear();
        self.textures.clear();
        device.collect_released();
    }

    pub fn shader_count(&self) -> usize {
        self.shaders.len()
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::{
        device::RecordingDevice,
        resources::material::Material,
        test_support::{ShaderDir, PLANE_FS, PLANE_VS},
    };

    #[test]
    fn test_load_shader_is_idempotent_by_name() {
        let dir = ShaderDir::new();
        let (vs, fs) = dir.mesh("mesh");
        let (other_vs, other_fs) = dir.plane("plane");
        let mut device = RecordingDevice::new();
        let mut cache = ResourceCache::new();

        let first = cache.load_shader(&mut device, "x", &vs, &fs);
        let second = cache.load_shader(&mut device, "x", &other_vs, &other_fs);

        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(second.vertex_path(), vs.as_path());
        assert_eq!(cache.shader_count(), 1);
        assert_eq!(device.live_programs(), 1);
    }

    #[test]
    fn test_load_texture_is_idempotent_by_path() {
        let mut device = RecordingDevice::new();
        let mut cache = ResourceCache::new();

        let first = cache
            .load_texture(&mut device, "missing.png", TextureKind::Diffuse)
            .unwrap();
        let second = cache
            .load_texture(&mut device, "missing.png", TextureKind::Diffuse)
            .unwrap();

        assert!(Rc::ptr_eq(&first, &second));
        assert!(first.is_placeholder());
        assert_eq!(cache.texture_count(), 1);
        assert_eq!(device.live_textures(), 1);
        assert!(cache.get_texture("missing.png").is_some());
    }

    #[test]
    fn test_reload_all_propagates_to_materials() {
        let dir = ShaderDir::new();
        let (vs, fs) = dir.mesh("mesh");
        let mut device = RecordingDevice::new();
        let mut cache = ResourceCache::new();

        let shader = cache.load_shader(&mut device, "mesh", &vs, &fs);
        let material = Material::new(Rc::clone(&shader)).shared();
        let old_program = shader.program().unwrap();

        assert_eq!(cache.reload_all_shaders(&mut device), 1);
        let new_program = cache.get_shader("mesh").unwrap().program().unwrap();
        assert_ne!(old_program, new_program);

        device.take_commands();
        material.borrow().bind(&mut device);
        assert_eq!(device.program_binds(), vec![new_program]);
    }

    #[test]
    fn test_reload_all_recovers_broken_shader() {
        let dir = ShaderDir::new();
        let (vs, fs) = dir.write("plane", "fn broken(", PLANE_FS);
        let mut device = RecordingDevice::new();
        let mut cache = ResourceCache::new();

        let shader = cache.load_shader(&mut device, "plane", &vs, &fs);
        assert!(!shader.is_valid());

        dir.write("plane", PLANE_VS, PLANE_FS);
        assert_eq!(cache.reload_all_shaders(&mut device), 1);
        assert!(shader.is_valid());
    }

    #[test]
    fn test_clear_releases_unshared_resources() {
        let dir = ShaderDir::new();
        let (vs, fs) = dir.plane("plane");
        let mut device = RecordingDevice::new();
        let mut cache = ResourceCache::new();

        let kept = cache.load_shader(&mut device, "plane", &vs, &fs);
        cache
            .load_texture(&mut device, "missing.png", TextureKind::Diffuse)
            .unwrap();

        cache.clear(&mut device);
        assert_eq!(cache.shader_count(), 0);
        assert_eq!(cache.texture_count(), 0);
        assert_eq!(device.live_textures(), 0);
        // Still referenced outside the cache
        assert_eq!(device.live_programs(), 1);

        drop(kept);
        device.collect_released();
        assert_eq!(device.live_programs(), 0);
    }
}
