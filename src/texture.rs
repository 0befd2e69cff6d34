use crate::context::RenderContext;
use crate::device::{GraphicsDevice, TextureDescriptor, TextureId};
use crate::error::TextureError;
use std::path::Path;
use std::rc::Rc;

/// Texel filtering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FilterMode {
    Nearest,
    Linear,
}

/// Behaviour of texture coordinates outside `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WrapMode {
    Repeat,
    MirroredRepeat,
    ClampToEdge,
}

/// Sampling state of a texture.
///
/// The default samples linearly (including between mip levels), repeats
/// in both directions and generates a full mip chain on upload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureSettings {
    pub min_filter: FilterMode,
    pub mag_filter: FilterMode,
    pub mipmap_filter: FilterMode,
    pub wrap_s: WrapMode,
    pub wrap_t: WrapMode,
    /// Downsample the image into every mip level after upload.
    pub mipmaps: bool,
}

impl Default for TextureSettings {
    fn default() -> Self {
        Self {
            min_filter: FilterMode::Linear,
            mag_filter: FilterMode::Linear,
            mipmap_filter: FilterMode::Linear,
            wrap_s: WrapMode::Repeat,
            wrap_t: WrapMode::Repeat,
            mipmaps: true,
        }
    }
}

impl TextureSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Nearest filtering everywhere, for crisp pixel art.
    pub fn nearest() -> Self {
        Self::default().filter(FilterMode::Nearest)
    }

    /// Sets min, mag and mipmap filtering at once.
    pub fn filter(mut self, filter: FilterMode) -> Self {
        self.min_filter = filter;
        self.mag_filter = filter;
        self.mipmap_filter = filter;
        self
    }

    /// Sets wrapping on both axes.
    pub fn wrap(mut self, wrap: WrapMode) -> Self {
        self.wrap_s = wrap;
        self.wrap_t = wrap;
        self
    }

    pub fn mipmaps(mut self, mipmaps: bool) -> Self {
        self.mipmaps = mipmaps;
        self
    }
}

/// A GPU texture that can be bound to a texture unit.
///
/// Textures are RGBA8. The GPU image is released when the value is dropped.
pub struct Texture {
    device: Rc<dyn GraphicsDevice>,
    id: TextureId,
    pub width: u32,
    pub height: u32,
    settings: TextureSettings,
}

impl std::fmt::Debug for Texture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture")
            .field("id", &self.id)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

impl Texture {
    pub(crate) fn upload(
        device: &Rc<dyn GraphicsDevice>,
        data: &[u8],
        width: u32,
        height: u32,
        settings: TextureSettings,
    ) -> Result<Self, TextureError> {
        check_size(width, height)?;
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(TextureError::SizeMismatch {
                width,
                height,
                expected,
                actual: data.len(),
            });
        }
        let desc = TextureDescriptor::new(width, height, settings);
        let id = device.create_texture(&desc, data);
        log::debug!("created texture {id:?} ({width}x{height})");
        Ok(Self {
            device: Rc::clone(device),
            id,
            width,
            height,
            settings,
        })
    }

    /// Opaque white texture. Callers pass non-zero sizes.
    pub(crate) fn white(
        device: &Rc<dyn GraphicsDevice>,
        width: u32,
        height: u32,
        settings: TextureSettings,
    ) -> Self {
        let data = vec![u8::MAX; width as usize * height as usize * 4];
        let desc = TextureDescriptor::new(width, height, settings);
        let id = device.create_texture(&desc, &data);
        log::debug!("created blank texture {id:?} ({width}x{height})");
        Self {
            device: Rc::clone(device),
            id,
            width,
            height,
            settings,
        }
    }

    /// Create a texture from raw RGBA data, top row first.
    pub fn from_rgba(
        ctx: &RenderContext,
        data: &[u8],
        width: u32,
        height: u32,
        settings: TextureSettings,
    ) -> Result<Self, TextureError> {
        Self::upload(ctx.device(), data, width, height, settings)
    }

    /// Allocate a texture filled with opaque white.
    pub fn blank(
        ctx: &RenderContext,
        width: u32,
        height: u32,
        settings: TextureSettings,
    ) -> Result<Self, TextureError> {
        check_size(width, height)?;
        Ok(Self::white(ctx.device(), width, height, settings))
    }

    /// Load a texture from an image file.
    ///
    /// The image is flipped vertically so that UV `(0, 0)` samples the
    /// bottom-left corner of the picture.
    pub fn from_file(
        ctx: &RenderContext,
        path: impl AsRef<Path>,
        settings: TextureSettings,
    ) -> Result<Self, TextureError> {
        let bytes = std::fs::read(path.as_ref())?;
        Self::from_bytes(ctx, &bytes, settings)
    }

    /// Load a texture from encoded image bytes (PNG, JPEG, ...).
    pub fn from_bytes(
        ctx: &RenderContext,
        bytes: &[u8],
        settings: TextureSettings,
    ) -> Result<Self, TextureError> {
        let img = image::load_from_memory(bytes)?.flipv().to_rgba8();
        let (width, height) = img.dimensions();
        Self::from_rgba(ctx, &img, width, height, settings)
    }

    /// Binds this texture to a texture unit.
    pub fn bind(&self, unit: u32) {
        self.device.bind_texture(unit, self.id);
    }

    pub fn id(&self) -> TextureId {
        self.id
    }

    pub fn settings(&self) -> TextureSettings {
        self.settings
    }
}

fn check_size(width: u32, height: u32) -> Result<(), TextureError> {
    if width == 0 || height == 0 {
        return Err(TextureError::EmptySize { width, height });
    }
    Ok(())
}

impl Drop for Texture {
    fn drop(&mut self) {
        log::debug!("deleting texture {:?}", self.id);
        self.device.delete_texture(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceCommand, HeadlessDevice};

    #[test]
    fn blank_is_opaque_white() {
        let (ctx, device) = RenderContext::headless();
        let texture = Texture::blank(&ctx, 2, 3, TextureSettings::default()).unwrap();
        let data = device.texture(texture.id()).unwrap();
        assert_eq!(data.pixels.len(), 2 * 3 * 4);
        assert!(data.pixels.iter().all(|&b| b == 255));
    }

    #[test]
    fn from_rgba_checks_size() {
        let (ctx, _device) = RenderContext::headless();
        let err = Texture::from_rgba(&ctx, &[0; 7], 1, 2, TextureSettings::default()).unwrap_err();
        assert!(matches!(
            err,
            TextureError::SizeMismatch {
                expected: 8,
                actual: 7,
                ..
            }
        ));
    }

    #[test]
    fn from_file_flips_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("two_rows.png");
        let mut img = image::RgbaImage::new(1, 2);
        img.put_pixel(0, 0, image::Rgba([255, 0, 0, 255]));
        img.put_pixel(0, 1, image::Rgba([0, 0, 255, 255]));
        img.save(&path).unwrap();

        let (ctx, device) = RenderContext::headless();
        let texture = Texture::from_file(&ctx, &path, TextureSettings::nearest()).unwrap();
        assert_eq!((texture.width, texture.height), (1, 2));

        let data = device.texture(texture.id()).unwrap();
        assert_eq!(&data.pixels[0..4], &[0, 0, 255, 255]);
        assert_eq!(&data.pixels[4..8], &[255, 0, 0, 255]);
        assert_eq!(data.desc.settings.mag_filter, FilterMode::Nearest);
    }

    #[test]
    fn zero_sized_textures_are_rejected() {
        let (ctx, device) = RenderContext::headless();
        let err = Texture::blank(&ctx, 0, 4, TextureSettings::default()).unwrap_err();
        assert!(matches!(
            err,
            TextureError::EmptySize {
                width: 0,
                height: 4
            }
        ));
        let err = Texture::from_rgba(&ctx, &[], 3, 0, TextureSettings::default()).unwrap_err();
        assert!(matches!(err, TextureError::EmptySize { .. }));
        // Only the context's default texture reached the device.
        assert_eq!(device.live_textures(), 1);
    }

    #[test]
    fn mip_chain_covers_largest_side() {
        let (ctx, device) = RenderContext::headless();
        let texture = Texture::blank(&ctx, 256, 64, TextureSettings::default()).unwrap();
        assert_eq!(device.texture(texture.id()).unwrap().desc.mip_level_count, 9);

        let odd = Texture::blank(&ctx, 5, 3, TextureSettings::default()).unwrap();
        assert_eq!(device.texture(odd.id()).unwrap().desc.mip_level_count, 3);

        let flat =
            Texture::blank(&ctx, 256, 64, TextureSettings::default().mipmaps(false)).unwrap();
        assert_eq!(device.texture(flat.id()).unwrap().desc.mip_level_count, 1);
    }

    #[test]
    fn from_file_reports_missing_file() {
        let (ctx, _device) = RenderContext::headless();
        let err = Texture::from_file(&ctx, "does/not/exist.png", TextureSettings::default())
            .unwrap_err();
        assert!(matches!(err, TextureError::Io(_)));
    }

    #[test]
    fn drop_releases_once() {
        let device = Rc::new(HeadlessDevice::new());
        let dyn_device: Rc<dyn GraphicsDevice> = device.clone();
        let texture = Texture::white(&dyn_device, 1, 1, TextureSettings::default());
        let id = texture.id();
        drop(texture);

        let deletes = device
            .commands()
            .into_iter()
            .filter(|c| *c == DeviceCommand::DeleteTexture(id))
            .count();
        assert_eq!(deletes, 1);
        assert_eq!(device.live_textures(), 0);
    }
}
