use anyhow::{anyhow, Result};

use crate::frame::PixelFormat;

/// Byte length of a frame with the given layout.
pub(crate) fn expected_len(width: u32, height: u32, format: PixelFormat) -> Result<usize> {
    let plane = (width as usize)
        .checked_mul(height as usize)
        .ok_or_else(|| anyhow!("{:?} frame dimensions overflow", format))?;
    let len = match format {
        PixelFormat::Gray8 => Some(plane),
        PixelFormat::Rgb24 => plane.checked_mul(3),
        PixelFormat::Nv12 => plane.checked_add(plane / 2),
    };
    len.ok_or_else(|| anyhow!("{:?} frame dimensions overflow", format))
}

/// Extract an 8-bit luma plane from a validated frame buffer.
///
/// RGB uses BT.601 weights, NV12 already carries luma in its Y plane, and
/// grayscale passes through.
pub(crate) fn luma_plane(pixels: &[u8], width: u32, height: u32, format: PixelFormat) -> Vec<u8> {
    let plane = width as usize * height as usize;
    match format {
        PixelFormat::Gray8 => pixels[..plane].to_vec(),
        PixelFormat::Nv12 => pixels[..plane].to_vec(),
        PixelFormat::Rgb24 => pixels
            .chunks_exact(3)
            .take(plane)
            .map(|rgb| rgb_to_luma(rgb[0], rgb[1], rgb[2]))
            .collect(),
    }
}

fn rgb_to_luma(r: u8, g: u8, b: u8) -> u8 {
    clamp_to_u8(0.299_f32 * r as f32 + 0.587_f32 * g as f32 + 0.114_f32 * b as f32)
}

pub(crate) fn clamp_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nv12_luma_is_y_plane() -> Result<()> {
        let width = 2;
        let height = 2;
        let y_plane = vec![10u8, 20, 30, 40];
        let uv_plane = vec![128u8; 2];
        let nv12 = [y_plane.clone(), uv_plane].concat();
        assert_eq!(expected_len(width, height, PixelFormat::Nv12)?, nv12.len());

        let luma = luma_plane(&nv12, width, height, PixelFormat::Nv12);
        assert_eq!(luma, y_plane);
        Ok(())
    }

    #[test]
    fn rgb_gray_pixels_keep_their_intensity() {
        let pixels = vec![128u8; 12];
        let luma = luma_plane(&pixels, 2, 2, PixelFormat::Rgb24);
        assert_eq!(luma, vec![128u8; 4]);
    }

    #[test]
    fn rgb_weights_follow_bt601() {
        assert_eq!(rgb_to_luma(255, 0, 0), 76);
        assert_eq!(rgb_to_luma(0, 255, 0), 150);
        assert_eq!(rgb_to_luma(0, 0, 255), 29);
        assert_eq!(rgb_to_luma(255, 255, 255), 255);
    }

    #[test]
    fn clamp_saturates() {
        assert_eq!(clamp_to_u8(-3.0), 0);
        assert_eq!(clamp_to_u8(300.0), 255);
        assert_eq!(clamp_to_u8(49.6), 50);
    }
}
