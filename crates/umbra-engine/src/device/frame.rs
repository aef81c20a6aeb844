use crate::render::FrameSurface;

/// One acquired surface texture plus the encoder every pass records into.
///
/// Finish it with [`Gpu::submit`](super::Gpu::submit), or drop it through
/// [`Gpu::discard`](super::Gpu::discard) when recording failed. Holding it
/// blocks acquisition of the next frame.
pub struct GpuFrame {
    pub surface_texture: wgpu::SurfaceTexture,
    pub view: wgpu::TextureView,
    pub encoder: wgpu::CommandEncoder,
}

impl GpuFrame {
    /// Borrows the encoder and the surface view as the lighting pass target.
    pub fn surface(&mut self) -> FrameSurface<'_> {
        FrameSurface::new(&mut self.encoder, &self.view)
    }

    /// Surface size in physical pixels.
    pub fn size(&self) -> (u32, u32) {
        let size = self.surface_texture.texture.size();
        (size.width, size.height)
    }
}
