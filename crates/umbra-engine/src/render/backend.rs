//! Image allocation seam.
//!
//! Render targets allocate their attachment images through [`ImageBackend`]. The
//! production implementation is `wgpu::Device`; tests use a headless backend that
//! only records sizes.

use super::error::{RenderError, RenderResult};
use super::format::{AttachmentDesc, DepthFormat};

/// Creates attachment images.
///
/// Validation common to every backend (zero size, device limit, format
/// resolution, comparison support) happens before `create_image` is called.
pub trait ImageBackend {
    type Image;

    /// Largest supported width/height of a 2D image.
    fn max_extent(&self) -> u32;

    /// Whether a sampled depth texture of `format` can be read with a comparison sampler.
    fn supports_comparison(&self, format: DepthFormat) -> bool;

    /// Creates the image described by `desc`.
    fn create_image(&self, label: &str, desc: &AttachmentDesc) -> RenderResult<Self::Image>;
}

/// GPU-resident image: texture plus its default view.
#[derive(Debug)]
pub struct GpuImage {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl GpuImage {
    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }
}

impl ImageBackend for wgpu::Device {
    type Image = GpuImage;

    fn max_extent(&self) -> u32 {
        self.limits().max_texture_dimension_2d
    }

    fn supports_comparison(&self, format: DepthFormat) -> bool {
        format.to_wgpu().has_depth_aspect()
    }

    fn create_image(&self, label: &str, desc: &AttachmentDesc) -> RenderResult<GpuImage> {
        let Some(format) = desc.format.to_wgpu() else {
            return Err(RenderError::allocation(
                label,
                format!("format {:?} has no wgpu equivalent", desc.format),
            ));
        };

        // Scopes pop innermost first.
        let oom = self.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let validation = self.push_error_scope(wgpu::ErrorFilter::Validation);

        let texture = self.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: desc.usage(),
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let validation = pollster::block_on(validation.pop());
        let oom = pollster::block_on(oom.pop());
        check_scopes(label, [validation, oom])?;

        Ok(GpuImage { texture, view })
    }
}

/// Maps the first error captured by the creation scopes to an allocation failure.
fn check_scopes(
    label: &str,
    captured: impl IntoIterator<Item = Option<wgpu::Error>>,
) -> RenderResult<()> {
    match captured.into_iter().flatten().next() {
        Some(err) => {
            log::warn!("image `{label}` rejected by device: {err}");
            Err(RenderError::allocation(label, err.to_string()))
        }
        None => Ok(()),
    }
}

#[cfg(test)]
pub(crate) mod headless {
    use std::cell::Cell;

    use super::*;
    use crate::render::RenderError;

    /// Image stand-in recording what was requested.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) struct HeadlessImage {
        pub desc: AttachmentDesc,
    }

    /// Backend without a GPU.
    ///
    /// `budget` limits how many images may be created before allocation starts
    /// failing, which lets tests exercise partial-allocation failure.
    pub(crate) struct HeadlessBackend {
        pub max_extent: u32,
        pub comparison: bool,
        pub budget: Cell<Option<usize>>,
        pub created: Cell<usize>,
    }

    impl HeadlessBackend {
        pub(crate) fn new() -> Self {
            Self {
                max_extent: 8192,
                comparison: true,
                budget: Cell::new(None),
                created: Cell::new(0),
            }
        }

        pub(crate) fn with_budget(images: usize) -> Self {
            let b = Self::new();
            b.budget.set(Some(images));
            b
        }
    }

    impl ImageBackend for HeadlessBackend {
        type Image = HeadlessImage;

        fn max_extent(&self) -> u32 {
            self.max_extent
        }

        fn supports_comparison(&self, _format: DepthFormat) -> bool {
            self.comparison
        }

        fn create_image(&self, label: &str, desc: &AttachmentDesc) -> RenderResult<HeadlessImage> {
            if let Some(left) = self.budget.get() {
                if left == 0 {
                    return Err(RenderError::allocation(label, "out of memory"));
                }
                self.budget.set(Some(left - 1));
            }
            self.created.set(self.created.get() + 1);
            Ok(HeadlessImage { desc: *desc })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── device error scopes ───────────────────────────────────────────────

    #[test]
    fn clean_scopes_allocate() {
        assert!(check_scopes("umbra gbuffer", [None, None]).is_ok());
    }

    #[test]
    fn out_of_memory_becomes_allocation_error() {
        let oom = wgpu::Error::OutOfMemory {
            source: Box::new(std::fmt::Error),
        };
        let err = check_scopes("umbra gbuffer", [None, Some(oom)]).unwrap_err();
        assert!(matches!(
            err,
            RenderError::Allocation { ref target, .. } if target == "umbra gbuffer"
        ));
    }

    #[test]
    fn validation_error_is_reported_first() {
        let validation = wgpu::Error::Validation {
            source: Box::new(std::fmt::Error),
            description: "texture too large".to_string(),
        };
        let oom = wgpu::Error::OutOfMemory {
            source: Box::new(std::fmt::Error),
        };
        let err = check_scopes("umbra shadow map", [Some(validation), Some(oom)]).unwrap_err();
        match err {
            RenderError::Allocation { target, reason } => {
                assert_eq!(target, "umbra shadow map");
                assert!(reason.contains("texture too large"), "{reason}");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
