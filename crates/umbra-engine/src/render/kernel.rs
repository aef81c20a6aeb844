//! Hemispherical SSAO sample kernel.

use glam::{Vec3, Vec4};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::error::{RenderError, RenderResult};

/// Capacity of the sample array declared by the SSAO shader.
pub const MAX_KERNEL_SIZE: usize = 64;

/// Default kernel size.
pub const DEFAULT_KERNEL_SIZE: usize = 64;

/// Ordered sample offsets inside the +Z unit hemisphere.
///
/// Sample `i` is scaled by [`bias_scale`], so early samples cluster near the
/// origin and occlusion is weighted toward close geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingKernel {
    samples: Vec<Vec3>,
}

impl SamplingKernel {
    /// Generates `size` samples from a seeded generator.
    pub fn generate(size: usize, seed: u64) -> RenderResult<Self> {
        Self::with_rng(size, &mut StdRng::seed_from_u64(seed))
    }

    pub fn with_rng<R: Rng>(size: usize, rng: &mut R) -> RenderResult<Self> {
        if size == 0 || size > MAX_KERNEL_SIZE {
            return Err(RenderError::OutOfRange {
                what: "kernel size",
                index: size,
                len: MAX_KERNEL_SIZE + 1,
            });
        }

        let samples = (0..size)
            .map(|i| {
                let dir = Vec3::new(
                    rng.random_range(-1.0..=1.0),
                    rng.random_range(-1.0..=1.0),
                    rng.random_range(0.0..=1.0),
                )
                .normalize_or_zero();
                let length: f32 = rng.random_range(0.0..=1.0);
                dir * length * bias_scale(i, size)
            })
            .collect();

        Ok(Self { samples })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Vec3] {
        &self.samples
    }

    pub fn get(&self, i: usize) -> RenderResult<Vec3> {
        self.samples.get(i).copied().ok_or(RenderError::OutOfRange {
            what: "kernel sample",
            index: i,
            len: self.samples.len(),
        })
    }

    /// Samples widened to vec4 and padded with zeros to [`MAX_KERNEL_SIZE`],
    /// matching the shader's fixed-size array.
    pub fn to_uniform_array(&self) -> [Vec4; MAX_KERNEL_SIZE] {
        let mut out = [Vec4::ZERO; MAX_KERNEL_SIZE];
        for (dst, s) in out.iter_mut().zip(&self.samples) {
            *dst = s.extend(0.0);
        }
        out
    }
}

/// `lerp(0.1, 1.0, (i / k)^2)`.
#[inline]
pub fn bias_scale(i: usize, k: usize) -> f32 {
    let t = i as f32 / k as f32;
    0.1 + (1.0 - 0.1) * t * t
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_exactly_k_samples() {
        for k in [1, 16, 64] {
            assert_eq!(SamplingKernel::generate(k, 7).unwrap().len(), k);
        }
    }

    #[test]
    fn samples_lie_in_unit_hemisphere() {
        let kernel = SamplingKernel::generate(64, 42).unwrap();
        for s in kernel.samples() {
            assert!((0.0..=1.0).contains(&s.z), "z = {}", s.z);
            assert!(s.length() <= 1.0 + 1e-6, "|v| = {}", s.length());
        }
    }

    #[test]
    fn samples_respect_bias_curve() {
        let kernel = SamplingKernel::generate(64, 3).unwrap();
        for (i, s) in kernel.samples().iter().enumerate() {
            assert!(s.length() <= bias_scale(i, 64) + 1e-6);
        }
    }

    #[test]
    fn bias_curve_is_non_decreasing() {
        let k = 64;
        assert!((bias_scale(0, k) - 0.1).abs() < 1e-6);
        for i in 1..k {
            assert!(bias_scale(i, k) >= bias_scale(i - 1, k));
        }
        assert!(bias_scale(k - 1, k) < 1.0);
    }

    #[test]
    fn same_seed_same_kernel() {
        let a = SamplingKernel::generate(32, 99).unwrap();
        let b = SamplingKernel::generate(32, 99).unwrap();
        let c = SamplingKernel::generate(32, 100).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn size_zero_or_above_capacity_is_out_of_range() {
        assert!(matches!(
            SamplingKernel::generate(0, 1),
            Err(RenderError::OutOfRange { .. })
        ));
        assert!(matches!(
            SamplingKernel::generate(MAX_KERNEL_SIZE + 1, 1),
            Err(RenderError::OutOfRange { .. })
        ));
    }

    #[test]
    fn uniform_array_is_zero_padded() {
        let kernel = SamplingKernel::generate(8, 5).unwrap();
        let arr = kernel.to_uniform_array();
        assert_eq!(arr[3].truncate(), kernel.get(3).unwrap());
        assert_eq!(arr[3].w, 0.0);
        assert_eq!(arr[8], Vec4::ZERO);
        assert!(kernel.get(8).is_err());
    }
}
