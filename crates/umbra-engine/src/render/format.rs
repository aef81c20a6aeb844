//! Attachment formats, backings and depth policies.
//!
//! Formats are described as channel layout x bit width x numeric kind and resolved
//! to a concrete `wgpu::TextureFormat` at allocation time. Combinations without a
//! portable wgpu equivalent resolve to `None` and fail allocation.

/// Channel layout of a color attachment.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Channels {
    R,
    Rg,
    Rgba,
}

/// Bits per channel.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BitWidth {
    B8,
    B16,
    B32,
}

/// Numeric interpretation of each channel.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum NumericKind {
    Float,
    Unorm,
    Uint,
    Sint,
}

/// Color attachment format.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct ColorFormat {
    pub channels: Channels,
    pub bits: BitWidth,
    pub kind: NumericKind,
}

impl ColorFormat {
    /// G-buffer default: four half floats per texel.
    pub const RGBA16_FLOAT: Self = Self::new(Channels::Rgba, BitWidth::B16, NumericKind::Float);
    /// Occlusion output.
    pub const R16_FLOAT: Self = Self::new(Channels::R, BitWidth::B16, NumericKind::Float);
    /// Noise tile rotation vectors.
    pub const RG32_FLOAT: Self = Self::new(Channels::Rg, BitWidth::B32, NumericKind::Float);
    pub const RGBA8_UNORM: Self = Self::new(Channels::Rgba, BitWidth::B8, NumericKind::Unorm);

    #[inline]
    pub const fn new(channels: Channels, bits: BitWidth, kind: NumericKind) -> Self {
        Self {
            channels,
            bits,
            kind,
        }
    }

    /// Resolves to a wgpu format, or `None` if the combination is not portable.
    pub fn to_wgpu(self) -> Option<wgpu::TextureFormat> {
        use BitWidth::*;
        use Channels::*;
        use NumericKind::*;
        use wgpu::TextureFormat as F;

        let f = match (self.channels, self.bits, self.kind) {
            (R, B8, Unorm) => F::R8Unorm,
            (R, B8, Uint) => F::R8Uint,
            (R, B8, Sint) => F::R8Sint,
            (R, B16, Float) => F::R16Float,
            (R, B16, Uint) => F::R16Uint,
            (R, B16, Sint) => F::R16Sint,
            (R, B32, Float) => F::R32Float,
            (R, B32, Uint) => F::R32Uint,
            (R, B32, Sint) => F::R32Sint,

            (Rg, B8, Unorm) => F::Rg8Unorm,
            (Rg, B8, Uint) => F::Rg8Uint,
            (Rg, B8, Sint) => F::Rg8Sint,
            (Rg, B16, Float) => F::Rg16Float,
            (Rg, B16, Uint) => F::Rg16Uint,
            (Rg, B16, Sint) => F::Rg16Sint,
            (Rg, B32, Float) => F::Rg32Float,
            (Rg, B32, Uint) => F::Rg32Uint,
            (Rg, B32, Sint) => F::Rg32Sint,

            (Rgba, B8, Unorm) => F::Rgba8Unorm,
            (Rgba, B8, Uint) => F::Rgba8Uint,
            (Rgba, B8, Sint) => F::Rgba8Sint,
            (Rgba, B16, Float) => F::Rgba16Float,
            (Rgba, B16, Uint) => F::Rgba16Uint,
            (Rgba, B16, Sint) => F::Rgba16Sint,
            (Rgba, B32, Float) => F::Rgba32Float,
            (Rgba, B32, Uint) => F::Rgba32Uint,
            (Rgba, B32, Sint) => F::Rgba32Sint,

            // 8-bit floats do not exist; 16-bit normalized needs an optional feature.
            _ => return None,
        };
        Some(f)
    }
}

/// Depth attachment format.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum DepthFormat {
    Depth16Unorm,
    Depth24Plus,
    Depth24PlusStencil8,
    Depth32Float,
}

impl DepthFormat {
    pub fn to_wgpu(self) -> wgpu::TextureFormat {
        match self {
            DepthFormat::Depth16Unorm => wgpu::TextureFormat::Depth16Unorm,
            DepthFormat::Depth24Plus => wgpu::TextureFormat::Depth24Plus,
            DepthFormat::Depth24PlusStencil8 => wgpu::TextureFormat::Depth24PlusStencil8,
            DepthFormat::Depth32Float => wgpu::TextureFormat::Depth32Float,
        }
    }
}

/// Storage behind an attachment.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Backing {
    /// Texture that later passes can sample.
    Sampled,
    /// Render-only image; never bound as a shader input.
    Renderbuffer,
}

/// What kind of depth attachment a target carries.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum DepthPolicy {
    None,
    Renderbuffer(DepthFormat),
    /// Sampled depth texture. `comparison` requests comparison-mode sampling
    /// (shadow maps); allocation fails if the backend cannot provide it.
    Sampled {
        format: DepthFormat,
        comparison: bool,
    },
}

/// Format of a single attachment.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum AttachmentFormat {
    Color(ColorFormat),
    Depth {
        format: DepthFormat,
        comparison: bool,
    },
}

impl AttachmentFormat {
    pub fn to_wgpu(self) -> Option<wgpu::TextureFormat> {
        match self {
            AttachmentFormat::Color(c) => c.to_wgpu(),
            AttachmentFormat::Depth { format, .. } => Some(format.to_wgpu()),
        }
    }

    pub fn is_depth(self) -> bool {
        matches!(self, AttachmentFormat::Depth { .. })
    }
}

/// Full description of one attachment image.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct AttachmentDesc {
    pub format: AttachmentFormat,
    pub width: u32,
    pub height: u32,
    pub backing: Backing,
}

impl AttachmentDesc {
    /// Texture usages implied by the backing. Sampled color images also accept
    /// uploads (the noise tile); depth images never do.
    pub fn usage(&self) -> wgpu::TextureUsages {
        let base = wgpu::TextureUsages::RENDER_ATTACHMENT;
        match (self.backing, self.format.is_depth()) {
            (Backing::Renderbuffer, _) => base,
            (Backing::Sampled, true) => base | wgpu::TextureUsages::TEXTURE_BINDING,
            (Backing::Sampled, false) => {
                base | wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gbuffer_formats_resolve() {
        assert_eq!(ColorFormat::RGBA16_FLOAT.to_wgpu(), Some(wgpu::TextureFormat::Rgba16Float));
        assert_eq!(ColorFormat::R16_FLOAT.to_wgpu(), Some(wgpu::TextureFormat::R16Float));
        assert_eq!(ColorFormat::RG32_FLOAT.to_wgpu(), Some(wgpu::TextureFormat::Rg32Float));
    }

    #[test]
    fn eight_bit_float_is_unrepresentable() {
        let f = ColorFormat::new(Channels::Rgba, BitWidth::B8, NumericKind::Float);
        assert_eq!(f.to_wgpu(), None);
    }

    #[test]
    fn sixteen_bit_unorm_is_unrepresentable() {
        let f = ColorFormat::new(Channels::R, BitWidth::B16, NumericKind::Unorm);
        assert_eq!(f.to_wgpu(), None);
    }

    #[test]
    fn sampled_depth_is_not_a_copy_destination() {
        let desc = AttachmentDesc {
            format: AttachmentFormat::Depth {
                format: DepthFormat::Depth32Float,
                comparison: true,
            },
            width: 4,
            height: 4,
            backing: Backing::Sampled,
        };
        assert!(desc.usage().contains(wgpu::TextureUsages::TEXTURE_BINDING));
        assert!(!desc.usage().contains(wgpu::TextureUsages::COPY_DST));
    }

    #[test]
    fn renderbuffer_is_not_sampleable() {
        let desc = AttachmentDesc {
            format: AttachmentFormat::Depth {
                format: DepthFormat::Depth32Float,
                comparison: false,
            },
            width: 4,
            height: 4,
            backing: Backing::Renderbuffer,
        };
        assert!(!desc.usage().contains(wgpu::TextureUsages::TEXTURE_BINDING));
        assert!(desc.usage().contains(wgpu::TextureUsages::RENDER_ATTACHMENT));
    }
}
