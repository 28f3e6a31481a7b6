//! Image textures
//!
//! Decodes image files into RGBA8, flips them vertically so row 0 is the
//! bottom of the image (the texture-coordinate convention of the bundled
//! meshes) and uploads them through the [`RenderDevice`].

use std::{
    fmt,
    path::{Path, PathBuf},
    rc::Rc,
};

use crate::gfx::{
    device::{GpuResource, ReleaseQueue, RenderDevice, TextureDescriptor, TextureId},
    error::TextureError,
};

/// Pixel of the fallback texture used for missing images
pub const PLACEHOLDER_COLOR: [u8; 4] = [255, 0, 255, 255];

/// What a texture is sampled for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureKind {
    #[default]
    None,
    Diffuse,
    Specular,
    Normal,
    Height,
}

impl TextureKind {
    /// Conventional sampler uniform name for this kind
    pub fn uniform_name(self) -> Option<&'static str> {
        match self {
            TextureKind::None => None,
            TextureKind::Diffuse => Some("texture_diffuse"),
            TextureKind::Specular => Some("texture_specular"),
            TextureKind::Normal => Some("texture_normal"),
            TextureKind::Height => Some("texture_height"),
        }
    }
}

impl fmt::Display for TextureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TextureKind::None => "none",
            TextureKind::Diffuse => "diffuse",
            TextureKind::Specular => "specular",
            TextureKind::Normal => "normal",
            TextureKind::Height => "height",
        };
        f.write_str(name)
    }
}

pub type SharedTexture = Rc<Texture>;

/// A 2D texture living on the device
pub struct Texture {
    id: TextureId,
    kind: TextureKind,
    width: u32,
    height: u32,
    path: PathBuf,
    placeholder: bool,
    release_queue: ReleaseQueue,
}

impl fmt::Debug for Texture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Texture")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("size", &(self.width, self.height))
            .field("path", &self.path)
            .field("placeholder", &self.placeholder)
            .finish()
    }
}

impl Texture {
    /// Uploads raw RGBA8 pixels.
    pub fn from_rgba(
        device: &mut dyn RenderDevice,
        label: &str,
        width: u32,
        height: u32,
        pixels: &[u8],
        kind: TextureKind,
    ) -> Result<Self, TextureError> {
        let id = device.create_texture(&TextureDescriptor {
            label,
            width,
            height,
            data: pixels,
        })?;

        Ok(Self {
            id,
            kind,
            width,
            height,
            path: PathBuf::from(label),
            placeholder: false,
            release_queue: device.release_queue(),
        })
    }

    /// Decodes an image file and uploads it.
    pub fn from_file(
        device: &mut dyn RenderDevice,
        path: &Path,
        kind: TextureKind,
    ) -> Result<Self, TextureError> {
        let image = image::open(path).map_err(|source| TextureError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
        let rgba = image.flipv().to_rgba8();
        let (width, height) = rgba.dimensions();

        let label = path.display().to_string();
        let mut texture = Self::from_rgba(device, &label, width, height, rgba.as_raw(), kind)?;
        texture.path = path.to_path_buf();
        Ok(texture)
    }

    /// A 1x1 magenta texture standing in for `path`.
    pub fn placeholder(
        device: &mut dyn RenderDevice,
        path: &Path,
        kind: TextureKind,
    ) -> Result<Self, TextureError> {
        let label = format!("placeholder for {}", path.display());
        let mut texture = Self::from_rgba(device, &label, 1, 1, &PLACEHOLDER_COLOR, kind)?;
        texture.path = path.to_path_buf();
        texture.placeholder = true;
        Ok(texture)
    }

    /// Loads `path`, falling back to the placeholder when it cannot be read
    /// or decoded. Fails only when the device rejects even the placeholder.
    pub fn load(
        device: &mut dyn RenderDevice,
        path: &Path,
        kind: TextureKind,
    ) -> Result<Self, TextureError> {
        match Self::from_file(device, path, kind) {
            Ok(texture) => {
                log::info!(
                    "Loaded {} texture '{}' ({}x{})",
                    kind,
                    path.display(),
                    texture.width,
                    texture.height
                );
                Ok(texture)
            }
            Err(e) => {
                log::error!("{}; using placeholder", e);
                Self::placeholder(device, path, kind)
            }
        }
    }

    pub fn id(&self) -> TextureId {
        self.id
    }

    pub fn kind(&self) -> TextureKind {
        self.kind
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    pub fn bind(&self, device: &mut dyn RenderDevice, unit: u32) {
        device.bind_texture(unit, self.id);
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        self.release_queue.push(GpuResource::Texture(self.id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::device::RecordingDevice;

    #[test]
    fn test_missing_file_yields_magenta_placeholder() {
        let mut device = RecordingDevice::new();
        let texture = Texture::load(
            &mut device,
            Path::new("/nonexistent/diffuse.png"),
            TextureKind::Diffuse,
        )
        .unwrap();

        assert!(texture.is_placeholder());
        assert_eq!((texture.width(), texture.height()), (1, 1));
        assert_eq!(texture.kind(), TextureKind::Diffuse);
        assert_eq!(texture.path(), Path::new("/nonexistent/diffuse.png"));
        assert_eq!(device.texture_pixels(texture.id()), Some(&PLACEHOLDER_COLOR[..]));
    }

    #[test]
    fn test_decoded_image_is_flipped_vertically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stripes.png");
        // Top row red, bottom row blue
        let stripes = image::RgbaImage::from_fn(2, 2, |_, y| {
            if y == 0 {
                image::Rgba([255, 0, 0, 255])
            } else {
                image::Rgba([0, 0, 255, 255])
            }
        });
        stripes.save(&path).unwrap();

        let mut device = RecordingDevice::new();
        let texture = Texture::load(&mut device, &path, TextureKind::Specular).unwrap();
        assert!(!texture.is_placeholder());
        assert_eq!(device.texture_size(texture.id()), Some((2, 2)));

        let pixels = device.texture_pixels(texture.id()).unwrap();
        assert_eq!(&pixels[0..4], &[0, 0, 255, 255]);
        assert_eq!(&pixels[8..12], &[255, 0, 0, 255]);
    }

    #[test]
    fn test_undecodable_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not an image").unwrap();

        let mut device = RecordingDevice::new();
        let texture = Texture::load(&mut device, &path, TextureKind::Diffuse).unwrap();
        assert!(texture.is_placeholder());
    }

    #[test]
    fn test_drop_queues_release() {
        let mut device = RecordingDevice::new();
        let texture = Texture::from_rgba(&mut device, "white", 1, 1, &[255; 4], TextureKind::None)
            .unwrap();
        assert_eq!(device.live_textures(), 1);

        drop(texture);
        device.collect_released();
        assert_eq!(device.live_textures(), 0);
    }

    #[test]
    fn test_kind_uniform_names() {
        assert_eq!(TextureKind::Diffuse.uniform_name(), Some("texture_diffuse"));
        assert_eq!(TextureKind::None.uniform_name(), None);
    }
}
