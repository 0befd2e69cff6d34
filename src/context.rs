use crate::device::{GraphicsDevice, HeadlessDevice};
use crate::texture::{Texture, TextureSettings};
use std::rc::Rc;

/// Shared rendering state handed to every resource constructor.
///
/// Owns the device handle and the 1×1 white texture that materials bind for
/// texture uniforms nobody has set. Create one per device after the device
/// exists and call [`RenderContext::shutdown`] (or drop it) once rendering is
/// over. Resources created from the context keep the device alive on their
/// own, so they may outlive it.
pub struct RenderContext {
    device: Rc<dyn GraphicsDevice>,
    default_texture: Rc<Texture>,
}

impl RenderContext {
    pub fn new(device: Rc<dyn GraphicsDevice>) -> Self {
        let default_texture = Rc::new(Texture::white(&device, 1, 1, TextureSettings::default()));
        log::debug!("render context ready, default texture {:?}", default_texture.id());
        Self {
            device,
            default_texture,
        }
    }

    /// A context over a fresh [`HeadlessDevice`], returned alongside it.
    pub fn headless() -> (Self, Rc<HeadlessDevice>) {
        let device = Rc::new(HeadlessDevice::new());
        (Self::new(device.clone()), device)
    }

    pub fn device(&self) -> &Rc<dyn GraphicsDevice> {
        &self.device
    }

    /// The shared texture bound for unset texture uniforms.
    pub fn default_texture(&self) -> &Rc<Texture> {
        &self.default_texture
    }

    /// Tears the context down.
    ///
    /// The default texture is released here unless a material still holds it,
    /// in which case it goes with the last such material.
    pub fn shutdown(self) {
        let holders = Rc::strong_count(&self.default_texture) - 1;
        if holders > 0 {
            log::debug!(
                "shutting down with {holders} material(s) still holding the default texture"
            );
        } else {
            log::debug!("render context shut down");
        }
    }
}
