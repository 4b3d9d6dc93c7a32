//! Frame preprocessing: luma extraction and Gaussian smoothing.

use anyhow::{anyhow, Result};

use crate::frame::{Frame, LumaFrame};
use crate::ingest::normalize::{clamp_to_u8, luma_plane};

pub const DEFAULT_BLUR_KERNEL: u32 = 11;

/// Converts captured frames into a denoised intensity field.
///
/// The blur is a separable Gaussian. Sigma follows the kernel size
/// (`0.3 * ((k - 1) * 0.5 - 1) + 0.8`) and borders reflect without repeating the
/// edge sample. Larger kernels suppress more sensor noise but also wash out small
/// or fast-moving objects.
#[derive(Clone, Debug)]
pub struct Preprocessor {
    kernel: Vec<f32>,
}

impl Preprocessor {
    pub fn new(kernel_size: u32) -> Result<Self> {
        if kernel_size == 0 || kernel_size % 2 == 0 {
            return Err(anyhow!(
                "blur kernel size must be a positive odd number, got {}",
                kernel_size
            ));
        }
        Ok(Self {
            kernel: gaussian_kernel(kernel_size as usize),
        })
    }

    pub fn kernel_size(&self) -> u32 {
        self.kernel.len() as u32
    }

    /// Luma extraction followed by blur.
    pub fn process(&self, frame: &Frame) -> LumaFrame {
        let luma = luma_plane(frame.pixels(), frame.width, frame.height, frame.format);
        self.blur_plane(luma, frame.width, frame.height)
    }

    pub fn blur(&self, luma: &LumaFrame) -> LumaFrame {
        self.blur_plane(luma.as_slice().to_vec(), luma.width, luma.height)
    }

    fn blur_plane(&self, plane: Vec<u8>, width: u32, height: u32) -> LumaFrame {
        if self.kernel.len() == 1 {
            return LumaFrame::from_parts(plane, width, height);
        }
        let w = width as usize;
        let h = height as usize;
        let radius = (self.kernel.len() / 2) as isize;

        let mut horizontal = vec![0f32; w * h];
        for y in 0..h {
            let row = &plane[y * w..(y + 1) * w];
            for x in 0..w {
                let mut acc = 0f32;
                for (k, weight) in self.kernel.iter().enumerate() {
                    let sx = reflect_101(x as isize + k as isize - radius, w);
                    acc += weight * row[sx] as f32;
                }
                horizontal[y * w + x] = acc;
            }
        }

        let mut out = vec![0u8; w * h];
        for y in 0..h {
            for x in 0..w {
                let mut acc = 0f32;
                for (k, weight) in self.kernel.iter().enumerate() {
                    let sy = reflect_101(y as isize + k as isize - radius, h);
                    acc += weight * horizontal[sy * w + x];
                }
                out[y * w + x] = clamp_to_u8(acc);
            }
        }
        LumaFrame::from_parts(out, width, height)
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self {
            kernel: gaussian_kernel(DEFAULT_BLUR_KERNEL as usize),
        }
    }
}

fn gaussian_kernel(size: usize) -> Vec<f32> {
    let sigma = 0.3 * ((size as f64 - 1.0) * 0.5 - 1.0) + 0.8;
    let center = (size / 2) as f64;
    let weights: Vec<f64> = (0..size)
        .map(|i| {
            let d = i as f64 - center;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let total: f64 = weights.iter().sum();
    weights.iter().map(|w| (w / total) as f32).collect()
}

/// Mirror an out-of-range index back into `0..len` (`dcb|abcd|cba`).
fn reflect_101(mut i: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let n = len as isize;
    loop {
        if i < 0 {
            i = -i;
        } else if i >= n {
            i = 2 * n - 2 - i;
        } else {
            return i as usize;
        }
    }
}
