use super::backend::{GpuImage, ImageBackend};
use super::error::{RenderError, RenderResult};
use super::format::{AttachmentDesc, AttachmentFormat, Backing};

/// One 2D image used as a color or depth target.
///
/// An attachment is declared first and allocated later; until then it has no
/// image and its owning target is incomplete.
#[derive(Debug)]
pub struct Attachment<I = GpuImage> {
    desc: AttachmentDesc,
    image: Option<I>,
}

impl<I> Attachment<I> {
    pub(crate) fn declare(desc: AttachmentDesc) -> Self {
        Self { desc, image: None }
    }

    /// Allocates the backing image.
    ///
    /// Fails with `Allocation` on zero size, a size above the backend limit, an
    /// unrepresentable format, or a comparison depth texture the backend cannot
    /// sample in comparison mode.
    pub(crate) fn allocate<B>(&mut self, backend: &B, label: &str) -> RenderResult<()>
    where
        B: ImageBackend<Image = I>,
    {
        let d = &self.desc;

        if d.width == 0 || d.height == 0 {
            return Err(RenderError::allocation(
                label,
                format!("zero-sized attachment {}x{}", d.width, d.height),
            ));
        }

        let max = backend.max_extent();
        if d.width > max || d.height > max {
            return Err(RenderError::allocation(
                label,
                format!("{}x{} exceeds device limit {max}", d.width, d.height),
            ));
        }

        if d.format.to_wgpu().is_none() {
            return Err(RenderError::allocation(
                label,
                format!("format {:?} has no portable equivalent", d.format),
            ));
        }

        if let AttachmentFormat::Depth {
            format,
            comparison: true,
        } = d.format
        {
            if d.backing != Backing::Sampled {
                return Err(RenderError::allocation(
                    label,
                    "comparison sampling requires a sampled depth texture",
                ));
            }
            if !backend.supports_comparison(format) {
                return Err(RenderError::allocation(
                    label,
                    format!("{format:?} does not support comparison sampling"),
                ));
            }
        }

        self.image = Some(backend.create_image(label, d)?);
        Ok(())
    }

    pub fn desc(&self) -> &AttachmentDesc {
        &self.desc
    }

    pub fn format(&self) -> AttachmentFormat {
        self.desc.format
    }

    pub fn backing(&self) -> Backing {
        self.desc.backing
    }

    pub fn width(&self) -> u32 {
        self.desc.width
    }

    pub fn height(&self) -> u32 {
        self.desc.height
    }

    /// `(width, height)` in texels.
    pub fn size(&self) -> (u32, u32) {
        (self.desc.width, self.desc.height)
    }

    pub fn is_allocated(&self) -> bool {
        self.image.is_some()
    }

    pub fn image(&self) -> Option<&I> {
        self.image.as_ref()
    }
}

impl Attachment<GpuImage> {
    /// View for use as a render attachment or shader input.
    pub fn view(&self) -> RenderResult<&wgpu::TextureView> {
        self.image
            .as_ref()
            .map(GpuImage::view)
            .ok_or_else(|| RenderError::binding("attachment", "image not allocated"))
    }

    pub fn texture(&self) -> RenderResult<&wgpu::Texture> {
        self.image
            .as_ref()
            .map(GpuImage::texture)
            .ok_or_else(|| RenderError::binding("attachment", "image not allocated"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backend::headless::HeadlessBackend;
    use crate::render::format::{ColorFormat, DepthFormat};

    fn color(w: u32, h: u32) -> AttachmentDesc {
        AttachmentDesc {
            format: AttachmentFormat::Color(ColorFormat::RGBA16_FLOAT),
            width: w,
            height: h,
            backing: Backing::Sampled,
        }
    }

    #[test]
    fn allocates_with_requested_size() {
        let backend = HeadlessBackend::new();
        let mut a = Attachment::declare(color(320, 200));
        assert!(!a.is_allocated());
        a.allocate(&backend, "color").unwrap();
        assert!(a.is_allocated());
        assert_eq!(a.size(), (320, 200));
        assert_eq!(a.image().unwrap().desc.width, 320);
    }

    #[test]
    fn zero_size_is_allocation_error() {
        let backend = HeadlessBackend::new();
        let mut a = Attachment::declare(color(0, 16));
        let err = a.allocate(&backend, "color").unwrap_err();
        assert!(matches!(err, RenderError::Allocation { .. }));
        assert!(!a.is_allocated());
    }

    #[test]
    fn oversize_is_allocation_error() {
        let mut backend = HeadlessBackend::new();
        backend.max_extent = 1024;
        let mut a = Attachment::declare(color(2048, 16));
        assert!(matches!(
            a.allocate(&backend, "color"),
            Err(RenderError::Allocation { .. })
        ));
    }

    #[test]
    fn comparison_unsupported_is_allocation_error() {
        let mut backend = HeadlessBackend::new();
        backend.comparison = false;
        let mut a = Attachment::declare(AttachmentDesc {
            format: AttachmentFormat::Depth {
                format: DepthFormat::Depth32Float,
                comparison: true,
            },
            width: 512,
            height: 512,
            backing: Backing::Sampled,
        });
        assert!(matches!(
            a.allocate(&backend, "shadow"),
            Err(RenderError::Allocation { .. })
        ));
    }

    #[test]
    fn comparison_on_renderbuffer_is_allocation_error() {
        let backend = HeadlessBackend::new();
        let mut a = Attachment::declare(AttachmentDesc {
            format: AttachmentFormat::Depth {
                format: DepthFormat::Depth32Float,
                comparison: true,
            },
            width: 64,
            height: 64,
            backing: Backing::Renderbuffer,
        });
        assert!(a.allocate(&backend, "depth").is_err());
    }
}
