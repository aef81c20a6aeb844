//! Tiled rotation noise for SSAO.

use glam::Vec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::attachment::Attachment;
use super::error::{RenderError, RenderResult};
use super::format::{AttachmentDesc, AttachmentFormat, Backing, ColorFormat};

/// Default tile edge in texels.
pub const DEFAULT_NOISE_SIZE: u32 = 4;

/// Largest accepted tile edge in texels.
pub const MAX_NOISE_SIZE: u32 = 256;

/// Square tile of random rotation vectors around +Z.
///
/// Each texel stores `(x, y)` in `[-1, 1]`; the implied third component is 0.
/// The tile is repeated across the screen, so the SSAO shader indexes it by
/// fragment coordinate modulo the tile size.
#[derive(Debug, Clone, PartialEq)]
pub struct NoiseTile {
    size: u32,
    texels: Vec<Vec2>,
}

impl NoiseTile {
    pub fn generate(size: u32, seed: u64) -> RenderResult<Self> {
        if size == 0 || size > MAX_NOISE_SIZE {
            return Err(RenderError::OutOfRange {
                what: "noise size",
                index: size as usize,
                len: MAX_NOISE_SIZE as usize + 1,
            });
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let texels = (0..size * size)
            .map(|_| {
                Vec2::new(
                    rng.random_range(-1.0..=1.0),
                    rng.random_range(-1.0..=1.0),
                )
            })
            .collect();
        Ok(Self { size, texels })
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn texels(&self) -> &[Vec2] {
        &self.texels
    }

    /// Texel at `(x, y)` with repeat addressing.
    pub fn texel(&self, x: u32, y: u32) -> Vec2 {
        let (x, y) = (x % self.size, y % self.size);
        self.texels[(y * self.size + x) as usize]
    }

    /// Uploads the tile into a sampled `Rg32Float` attachment.
    pub fn upload(&self, device: &wgpu::Device, queue: &wgpu::Queue) -> RenderResult<Attachment> {
        let mut attachment = Attachment::declare(AttachmentDesc {
            format: AttachmentFormat::Color(ColorFormat::RG32_FLOAT),
            width: self.size,
            height: self.size,
            backing: Backing::Sampled,
        });
        attachment.allocate(device, "umbra ssao noise")?;
        let texture = attachment.texture()?;

        let bytes: &[u8] = bytemuck::cast_slice(&self.texels);
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytes,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(self.size * 8),
                rows_per_image: Some(self.size),
            },
            wgpu::Extent3d {
                width: self.size,
                height: self.size,
                depth_or_array_layers: 1,
            },
        );
        Ok(attachment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tile_has_size_squared_texels_in_range() {
        let tile = NoiseTile::generate(4, 11).unwrap();
        assert_eq!(tile.texels().len(), 16);
        for t in tile.texels() {
            assert!((-1.0..=1.0).contains(&t.x));
            assert!((-1.0..=1.0).contains(&t.y));
        }
    }

    #[test]
    fn texel_lookup_repeats() {
        let tile = NoiseTile::generate(4, 11).unwrap();
        assert_eq!(tile.texel(1, 2), tile.texel(5, 6));
        assert_eq!(tile.texel(0, 0), tile.texel(4, 8));
    }

    #[test]
    fn zero_size_is_rejected() {
        assert!(NoiseTile::generate(0, 1).is_err());
    }

    #[test]
    fn oversized_tile_is_rejected_before_allocating() {
        assert!(NoiseTile::generate(MAX_NOISE_SIZE, 1).is_ok());
        for size in [MAX_NOISE_SIZE + 1, 1 << 16, u32::MAX] {
            assert!(matches!(
                NoiseTile::generate(size, 1),
                Err(RenderError::OutOfRange { what: "noise size", .. })
            ));
        }
    }
}
